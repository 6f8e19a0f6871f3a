//! Trait abstractions for runtime I/O
//!
//! These traits let the executor run against mock collaborators in tests.

use crate::db::{Database, DbError};
use crate::llm::{LlmError, LlmService, ModelRegistry};
use crate::narration::{self, ConclusionContext, QuestionContext};
use crate::state_machine::Session;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Session not found: {0}")]
    NotFound(String),
    #[error("Storage failure: {0}")]
    Backend(String),
}

impl From<DbError> for StoreError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::SessionNotFound(id) => StoreError::NotFound(id),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Storage for troubleshooting sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session, creating a fresh one for an unseen id
    async fn get_or_create(&self, id: &str) -> Result<Session, StoreError>;

    async fn get(&self, id: &str) -> Result<Session, StoreError>;

    /// Insert or replace the whole session
    async fn save(&self, session: &Session) -> Result<(), StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    async fn list_ids(&self) -> Result<Vec<String>, StoreError>;
}

/// Text generation the conversation depends on
///
/// Implementations only phrase things. The content contract (one question,
/// no repeats, the reboot confirmation line) is enforced by the caller.
#[async_trait]
pub trait Narrator: Send + Sync {
    async fn generate_question(&self, ctx: &QuestionContext) -> Result<String, LlmError>;

    async fn generate_conclusion(&self, ctx: &ConclusionContext) -> Result<String, LlmError>;

    /// Whether `answer` is a relevant reply to `question`
    async fn validate_answer(&self, question: &str, answer: &str) -> Result<bool, LlmError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn get_or_create(&self, id: &str) -> Result<Session, StoreError> {
        (**self).get_or_create(id).await
    }

    async fn get(&self, id: &str) -> Result<Session, StoreError> {
        (**self).get(id).await
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        (**self).save(session).await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        (**self).delete(id).await
    }

    async fn list_ids(&self) -> Result<Vec<String>, StoreError> {
        (**self).list_ids().await
    }
}

#[async_trait]
impl<T: Narrator + ?Sized> Narrator for Arc<T> {
    async fn generate_question(&self, ctx: &QuestionContext) -> Result<String, LlmError> {
        (**self).generate_question(ctx).await
    }

    async fn generate_conclusion(&self, ctx: &ConclusionContext) -> Result<String, LlmError> {
        (**self).generate_conclusion(ctx).await
    }

    async fn validate_answer(&self, question: &str, answer: &str) -> Result<bool, LlmError> {
        (**self).validate_answer(question, answer).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Process-local session store
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(&self, id: &str) -> Result<Session, StoreError> {
        let mut sessions = self.sessions.write().await;
        Ok(sessions
            .entry(id.to_string())
            .or_insert_with(|| Session::new(id))
            .clone())
    }

    async fn get(&self, id: &str) -> Result<Session, StoreError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn list_ids(&self) -> Result<Vec<String>, StoreError> {
        let sessions = self.sessions.read().await;
        let mut ids: Vec<_> = sessions.values().collect();
        ids.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        Ok(ids.into_iter().map(|s| s.id.clone()).collect())
    }
}

/// Adapter to use Database as a SessionStore
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
}

impl DatabaseStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for DatabaseStorage {
    async fn get_or_create(&self, id: &str) -> Result<Session, StoreError> {
        Ok(self.db.get_or_create_session(id)?)
    }

    async fn get(&self, id: &str) -> Result<Session, StoreError> {
        Ok(self.db.get_session(id)?)
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        Ok(self.db.save_session(session)?)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        Ok(self.db.delete_session(id)?)
    }

    async fn list_ids(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.db.list_session_ids()?)
    }
}

/// Adapter to phrase questions and conclusions with the configured models
///
/// Questions and conclusions go to the default model; answer validation
/// goes to the cheap one.
pub struct RegistryNarrator {
    registry: Arc<ModelRegistry>,
}

impl RegistryNarrator {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    fn main_model(&self) -> Result<Arc<dyn LlmService>, LlmError> {
        self.registry.default().ok_or_else(LlmError::unavailable)
    }
}

#[async_trait]
impl Narrator for RegistryNarrator {
    async fn generate_question(&self, ctx: &QuestionContext) -> Result<String, LlmError> {
        self.main_model()?
            .complete_text(&narration::question_request(ctx))
            .await
    }

    async fn generate_conclusion(&self, ctx: &ConclusionContext) -> Result<String, LlmError> {
        self.main_model()?
            .complete_text(&narration::conclusion_request(ctx))
            .await
    }

    async fn validate_answer(&self, question: &str, answer: &str) -> Result<bool, LlmError> {
        let llm = self
            .registry
            .get_cheap_model()
            .ok_or_else(LlmError::unavailable)?;
        let reply = llm
            .complete_text(&narration::validation_request(question, answer))
            .await?;
        Ok(narration::interpret_validation(&reply))
    }
}
