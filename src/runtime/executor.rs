//! Conversation turn executor

use super::traits::{Narrator, SessionStore, StoreError};

use crate::diagnosis::{AnalysisResult, Evidence, UserSymptoms};
use crate::narration::{self, ConclusionContext, QuestionContext};
use crate::llm::LlmError;
use crate::state_machine::{
    transition, ConvContext, ConvState, Effect, Event, Session, TransitionError,
};
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Runtime tuning knobs
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Upper bound on each generator call before the fallback is used
    pub generator_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            generator_timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Error, Debug)]
pub enum TurnError {
    #[error("session_id is required")]
    EmptySessionId,
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Everything the caller needs to render one reply
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub message: String,
    pub state: ConvState,
    pub next_question: Option<String>,
    /// 1-based
    pub current_question_number: Option<usize>,
    pub total_questions: Option<usize>,
    pub is_conversation_ended: bool,
    pub reboot_recommended: Option<bool>,
    pub solution_analysis: Option<AnalysisResult>,
    pub symptoms: UserSymptoms,
}

/// Reply pieces collected while effects run
#[derive(Default)]
struct Reply {
    parts: Vec<String>,
    next_question: Option<String>,
    question_number: Option<usize>,
    total_questions: Option<usize>,
    ended: bool,
    analysis: Option<AnalysisResult>,
}

impl Reply {
    fn into_outcome(self, session: &Session) -> TurnOutcome {
        TurnOutcome {
            message: self.parts.join("\n\n"),
            state: session.state,
            next_question: self.next_question,
            current_question_number: self.question_number,
            total_questions: self.total_questions,
            is_conversation_ended: self.ended,
            reboot_recommended: self.analysis.as_ref().map(|a| a.reboot_recommended),
            solution_analysis: self.analysis,
            symptoms: session.symptoms(),
        }
    }
}

type TurnLocks = HashMap<String, Arc<tokio::sync::Mutex<()>>>;

/// Claim on one session's turn lock
///
/// Dropping the last claim removes the map entry, so the map only holds ids
/// with a turn or delete in flight.
struct TurnLease<'a> {
    locks: &'a Mutex<TurnLocks>,
    session_id: String,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for TurnLease<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // new claims are only handed out under the map lock, so the count is stable here
        let idle = locks.get(&self.session_id).is_some_and(|entry| {
            Arc::ptr_eq(entry, &self.lock) && Arc::strong_count(&self.lock) == 2
        });
        if idle {
            locks.remove(&self.session_id);
        }
    }
}

/// Drives turns for any number of sessions
///
/// Turns for one session id are serialized by an in-process lock; turns for
/// different ids run concurrently. The lock does not extend across processes:
/// two processes sharing one database can interleave turns for the same id,
/// and the last `save` wins.
pub struct ConversationRuntime<S, N>
where
    S: SessionStore,
    N: Narrator,
{
    store: S,
    narrator: N,
    config: RuntimeConfig,
    turn_locks: Mutex<TurnLocks>,
}

impl<S, N> ConversationRuntime<S, N>
where
    S: SessionStore,
    N: Narrator,
{
    pub fn new(store: S, narrator: N, config: RuntimeConfig) -> Self {
        Self {
            store,
            narrator,
            config,
            turn_locks: Mutex::new(HashMap::new()),
        }
    }

    fn turn_lock(&self, session_id: &str) -> TurnLease<'_> {
        let mut locks = self.turn_locks.lock().unwrap_or_else(PoisonError::into_inner);
        let lock = locks.entry(session_id.to_string()).or_default().clone();
        TurnLease {
            locks: &self.turn_locks,
            session_id: session_id.to_string(),
            lock,
        }
    }

    /// Process one inbound message for `session_id`
    ///
    /// The session is loaded (or created), advanced on a working copy and
    /// saved only when every transition in the turn succeeded.
    pub async fn handle_turn(
        &self,
        session_id: &str,
        message: &str,
        evidence: Option<Evidence>,
    ) -> Result<TurnOutcome, TurnError> {
        if session_id.trim().is_empty() {
            return Err(TurnError::EmptySessionId);
        }

        let lease = self.turn_lock(session_id);
        let _guard = lease.lock.lock().await;
        let start = Instant::now();

        let stored = self.store.get_or_create(session_id).await?;
        let context = ConvContext::new(session_id);
        let mut session = stored.clone();
        let mut reply = Reply::default();

        let mut events_to_process = VecDeque::from([Event::user_message(message, evidence)]);
        while let Some(event) = events_to_process.pop_front() {
            let from = session.state;
            let result = transition(&session, &context, event)?;
            session = result.session;

            if from != session.state {
                tracing::debug!(
                    session_id,
                    from = %from,
                    to = %session.state,
                    "State transition"
                );
            }

            for effect in result.effects {
                let follow_up = self
                    .execute_effect(effect, &session, &context, &mut reply)
                    .await;
                if let Some(event) = follow_up {
                    events_to_process.push_back(event);
                }
            }
        }

        if session != stored {
            session.updated_at = Utc::now();
            self.store.save(&session).await?;
        }

        tracing::info!(
            session_id,
            state = %session.state,
            question_number = ?reply.question_number,
            duration_ms = %start.elapsed().as_millis(),
            "Turn completed"
        );

        Ok(reply.into_outcome(&session))
    }

    /// Run one effect, returning the event it resolves into, if any
    async fn execute_effect(
        &self,
        effect: Effect,
        session: &Session,
        context: &ConvContext,
        reply: &mut Reply,
    ) -> Option<Event> {
        match effect {
            Effect::Say(text) => {
                reply.parts.push(text);
                None
            }

            Effect::ValidateAnswer { question, answer } => {
                let verdict = self
                    .bounded(
                        "validate_answer",
                        &session.id,
                        self.narrator.validate_answer(&question, &answer),
                    )
                    .await;
                // an unreachable validator never blocks the user
                let valid = verdict.unwrap_or(true);
                Some(Event::AnswerValidated { answer, valid })
            }

            Effect::GenerateQuestion { index } => {
                let ctx = QuestionContext::from_session(session, index, context.max_questions);
                let candidate = self
                    .bounded(
                        "generate_question",
                        &session.id,
                        self.narrator.generate_question(&ctx),
                    )
                    .await;
                let settled = narration::settle_question(candidate.as_deref(), &ctx);
                Some(Event::QuestionGenerated {
                    index,
                    text: settled.text,
                    target: settled.target,
                })
            }

            Effect::PresentQuestion {
                text,
                number,
                total,
            } => {
                reply.parts.push(text.clone());
                reply.next_question = Some(text);
                reply.question_number = Some(number);
                reply.total_questions = Some(total);
                None
            }

            Effect::ReportAnalysis(analysis) => {
                tracing::info!(
                    session_id = %session.id,
                    score = analysis.score,
                    reboot_recommended = analysis.reboot_recommended,
                    confidence = ?analysis.confidence,
                    "Diagnosis complete"
                );
                reply.analysis = Some(analysis);
                None
            }

            Effect::GenerateConclusion(analysis) => {
                let ctx = ConclusionContext::from_session(session, analysis);
                let candidate = self
                    .bounded(
                        "generate_conclusion",
                        &session.id,
                        self.narrator.generate_conclusion(&ctx),
                    )
                    .await;
                let text = narration::settle_conclusion(candidate.as_deref(), &ctx.analysis);
                Some(Event::ConclusionGenerated {
                    text,
                    reboot_recommended: ctx.analysis.reboot_recommended,
                })
            }

            Effect::DeliverRebootInstructions { text } => {
                reply.parts.push(text);
                Some(Event::RebootInstructionsSent)
            }

            Effect::EndConversation => {
                reply.ended = true;
                None
            }
        }
    }

    /// Await a generator call under the configured timeout
    ///
    /// Failures and timeouts are logged and collapse to `None`.
    async fn bounded<T, F>(&self, operation: &'static str, session_id: &str, call: F) -> Option<T>
    where
        F: Future<Output = Result<T, LlmError>>,
    {
        match tokio::time::timeout(self.config.generator_timeout, call).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                tracing::warn!(
                    session_id,
                    operation,
                    error = %e.message,
                    "Generator failed, using fallback"
                );
                None
            }
            Err(_) => {
                tracing::warn!(
                    session_id,
                    operation,
                    timeout_ms = %self.config.generator_timeout.as_millis(),
                    "Generator timed out, using fallback"
                );
                None
            }
        }
    }

    /// Current snapshot of a session
    pub async fn session(&self, session_id: &str) -> Result<Session, StoreError> {
        self.store.get(session_id).await
    }

    /// Remove a session, waiting for any turn in flight for it
    pub async fn delete_session(&self, session_id: &str) -> Result<(), StoreError> {
        let lease = self.turn_lock(session_id);
        let _guard = lease.lock.lock().await;
        self.store.delete(session_id).await
    }

    pub async fn list_sessions(&self) -> Result<Vec<String>, StoreError> {
        self.store.list_ids().await
    }
}
