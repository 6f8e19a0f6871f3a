//! HTTP request handlers

use super::types::{
    BannerResponse, ChatRequest, ChatResponse, ErrorResponse, HealthResponse, ModelsResponse,
    SessionListResponse, SessionResponse, SuccessResponse,
};
use super::AppState;
use crate::runtime::{StoreError, TurnError};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/health", get(health))
        // One conversation turn
        .route("/api/v1/chat", post(chat))
        // Session side channel
        .route("/api/v1/sessions", get(list_sessions))
        .route(
            "/api/v1/sessions/:id",
            get(get_session).delete(delete_session),
        )
        // Model info
        .route("/api/v1/models", get(list_models))
        .with_state(state)
}

// ============================================================
// Service info
// ============================================================

async fn banner() -> Json<BannerResponse> {
    Json(BannerResponse {
        message: "WiFi Doctor API",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "OK" })
}

// ============================================================
// Chat
// ============================================================

async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let outcome = state
        .runtime
        .handle_turn(&req.session_id, &req.message, req.auto_test_results)
        .await?;
    Ok(Json(outcome.into()))
}

// ============================================================
// Sessions
// ============================================================

async fn list_sessions(
    State(state): State<AppState>,
) -> Result<Json<SessionListResponse>, AppError> {
    let sessions = state.runtime.list_sessions().await?;
    Ok(Json(SessionListResponse { sessions }))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state.runtime.session(&id).await?;
    Ok(Json(session.into()))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.runtime.delete_session(&id).await?;
    tracing::info!(session_id = %id, "Deleted session");
    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================
// Models
// ============================================================

async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: state.llm_registry.available_model_info(),
        default: state.llm_registry.default_model_id().to_string(),
    })
}

// ============================================================
// Error Handling
// ============================================================

enum AppError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => AppError::NotFound(e.to_string()),
            StoreError::Backend(_) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<TurnError> for AppError {
    fn from(e: TurnError) -> Self {
        match e {
            TurnError::EmptySessionId | TurnError::Transition(_) => {
                AppError::BadRequest(e.to_string())
            }
            TurnError::Store(store) => store.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
