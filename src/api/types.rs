//! API request and response types

use crate::diagnosis::{AnalysisResult, Evidence, QuestionPath, UserSymptoms};
use crate::runtime::TurnOutcome;
use crate::state_machine::{ConvState, Session};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One inbound chat turn
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, deserialize_with = "lenient_evidence")]
    pub auto_test_results: Option<Evidence>,
}

/// Test results the client could not shape into an object are treated as absent
fn lenient_evidence<'de, D>(deserializer: D) -> Result<Option<Evidence>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| match serde_json::from_value(value) {
        Ok(evidence) => Some(evidence),
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring unreadable auto_test_results");
            None
        }
    }))
}

/// Reply to one chat turn
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub message: String,
    pub state: ConvState,
    pub next_question: Option<String>,
    pub current_question_number: Option<usize>,
    pub total_questions: Option<usize>,
    pub is_conversation_ended: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reboot_recommended: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution_analysis: Option<AnalysisResult>,
    pub symptoms: UserSymptoms,
}

impl From<TurnOutcome> for ChatResponse {
    fn from(outcome: TurnOutcome) -> Self {
        Self {
            message: outcome.message,
            state: outcome.state,
            next_question: outcome.next_question,
            current_question_number: outcome.current_question_number,
            total_questions: outcome.total_questions,
            is_conversation_ended: outcome.is_conversation_ended,
            reboot_recommended: outcome.reboot_recommended,
            solution_analysis: outcome.solution_analysis,
            symptoms: outcome.symptoms,
        }
    }
}

/// Snapshot of a stored session
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub state: ConvState,
    pub issue_description: String,
    pub test_results: Option<Evidence>,
    pub question_path: Option<QuestionPath>,
    pub asked_questions: Vec<String>,
    pub answers: Vec<String>,
    pub question_index: usize,
    pub symptoms: UserSymptoms,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        let symptoms = session.symptoms();
        Self {
            session_id: session.id,
            state: session.state,
            issue_description: session.issue_description,
            test_results: session.test_results,
            question_path: session.question_path,
            asked_questions: session.asked_questions,
            answers: session.answers,
            question_index: session.question_index,
            symptoms,
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<String>,
}

/// Model information for the API
#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub provider: String,
    pub description: String,
}

/// Response for model list
#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
    pub default: String,
}

#[derive(Debug, Serialize)]
pub struct BannerResponse {
    pub message: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Generic success response
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
