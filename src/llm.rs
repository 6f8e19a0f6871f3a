//! LLM provider abstraction
//!
//! Hosted chat models are only used to phrase text: follow-up questions,
//! the closing diagnosis, and yes/no relevance checks. Each provider
//! implements [`LlmService`]; the registry hands them out already wrapped
//! in [`LoggingService`].

mod anthropic;
mod error;
mod models;
mod openai;
mod registry;
mod types;

pub use anthropic::AnthropicService;
pub use error::{LlmError, LlmErrorKind};
pub use models::{all_models, ModelDef, Provider};
pub use openai::OpenAIService;
pub use registry::{LlmConfig, ModelRegistry};
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

#[async_trait]
pub trait LlmService: Send + Sync {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    fn model_id(&self) -> &str;

    /// Completion reduced to its trimmed text. A reply with no text counts
    /// as a failed call so callers fall back the same way.
    async fn complete_text(&self, request: &LlmRequest) -> Result<String, LlmError> {
        let response = self.complete(request).await?;
        let text = response.text.trim();
        if text.is_empty() {
            return Err(LlmError::unknown(format!(
                "{} returned an empty completion",
                self.model_id()
            )));
        }
        Ok(text.to_string())
    }
}

/// Decorator that records every call made through a provider
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let started = Instant::now();
        let prompt_chars: usize = request.messages.iter().map(|m| m.text.len()).sum();
        let result = self.inner.complete(request).await;
        let duration_ms = started.elapsed().as_millis();

        match &result {
            Ok(response) => tracing::info!(
                model = %self.model_id,
                duration_ms = %duration_ms,
                prompt_chars,
                input_tokens = response.usage.input_tokens,
                output_tokens = response.usage.output_tokens,
                end_turn = response.end_turn,
                "LLM completion"
            ),
            Err(e) => tracing::error!(
                model = %self.model_id,
                duration_ms = %duration_ms,
                prompt_chars,
                kind = ?e.kind,
                retryable = e.kind.is_retryable(),
                retry_after_secs = ?e.retry_after.map(|d| d.as_secs()),
                error = %e.message,
                "LLM completion failed"
            ),
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
