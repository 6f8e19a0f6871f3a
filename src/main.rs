//! wifi_doctor - guided WiFi troubleshooting service
//!
//! A Rust backend driving a turn-based diagnostic conversation: network
//! test ingestion, targeted questions and a reboot-or-escalate verdict.

mod api;
mod db;
mod diagnosis;
mod llm;
mod narration;
mod runtime;
mod state_machine;

use api::{create_router, AppState};
use axum::http::HeaderValue;
use db::Database;
use llm::{LlmConfig, ModelRegistry};
use runtime::{DatabaseStorage, InMemorySessionStore, RuntimeConfig, SessionStore};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wifi_doctor=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let port: u16 = std::env::var("WIFI_DOCTOR_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);

    let store = open_store()?;

    // Initialize LLM registry
    let llm_config = LlmConfig::from_env();
    let llm_registry = Arc::new(ModelRegistry::new(&llm_config));

    if llm_registry.has_models() {
        tracing::info!(
            models = ?llm_registry.available_models(),
            default = %llm_registry.default_model_id(),
            "LLM registry initialized"
        );
    } else {
        tracing::warn!(
            "No LLM API keys configured. Set OPENAI_API_KEY, ANTHROPIC_API_KEY or LLM_GATEWAY. \
             Falling back to fixed questions and conclusions."
        );
    }

    let runtime_config = RuntimeConfig {
        generator_timeout: llm_config.request_timeout,
    };
    let state = AppState::new(store, llm_registry, runtime_config);

    let app = create_router(state)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("wifi_doctor listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// SQLite when `WIFI_DOCTOR_DB_PATH` is set, otherwise process memory
fn open_store() -> Result<Arc<dyn SessionStore>, Box<dyn std::error::Error>> {
    let Ok(db_path) = std::env::var("WIFI_DOCTOR_DB_PATH") else {
        tracing::info!("WIFI_DOCTOR_DB_PATH not set, sessions are kept in memory");
        return Ok(Arc::new(InMemorySessionStore::new()));
    };

    // Ensure database directory exists
    if let Some(parent) = PathBuf::from(&db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %db_path, "Opening database");
    let db = Database::open(&db_path)?;
    Ok(Arc::new(DatabaseStorage::new(db)))
}

/// Origins from `WIFI_DOCTOR_CORS_ORIGINS` (comma separated), any when unset or `*`
fn cors_layer() -> CorsLayer {
    let origins = std::env::var("WIFI_DOCTOR_CORS_ORIGINS").unwrap_or_default();
    let listed: Vec<HeaderValue> = origins
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty() && *o != "*")
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let allow_origin = if listed.is_empty() || origins.split(',').any(|o| o.trim() == "*") {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(listed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}
