//! Mock implementations for testing
//!
//! These mocks drive the runtime end-to-end without a real LLM.

use super::traits::*;
use crate::llm::LlmError;
use crate::narration::{ConclusionContext, QuestionContext};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Mock Narrator
// ============================================================================

type Queue<T> = Mutex<VecDeque<Result<T, LlmError>>>;

/// Narrator that returns queued responses
///
/// An empty queue answers with a network error, which exercises the same
/// fallbacks as an unreachable provider.
#[derive(Default)]
pub struct MockNarrator {
    questions: Queue<String>,
    conclusions: Queue<String>,
    validations: Queue<bool>,
    /// Record of question requests made
    pub question_requests: Mutex<Vec<QuestionContext>>,
    /// Record of conclusion requests made
    pub conclusion_requests: Mutex<Vec<ConclusionContext>>,
    /// Record of (question, answer) pairs sent for validation
    pub validation_requests: Mutex<Vec<(String, String)>>,
}

fn next_or_error<T>(queue: &Queue<T>) -> Result<T, LlmError> {
    queue
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
}

impl MockNarrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_question(&self, text: impl Into<String>) {
        self.questions.lock().unwrap().push_back(Ok(text.into()));
    }

    pub fn queue_question_error(&self, error: LlmError) {
        self.questions.lock().unwrap().push_back(Err(error));
    }

    pub fn queue_conclusion(&self, text: impl Into<String>) {
        self.conclusions.lock().unwrap().push_back(Ok(text.into()));
    }

    pub fn queue_validation(&self, valid: bool) {
        self.validations.lock().unwrap().push_back(Ok(valid));
    }

    pub fn recorded_question_requests(&self) -> Vec<QuestionContext> {
        self.question_requests.lock().unwrap().clone()
    }

    pub fn recorded_validations(&self) -> Vec<(String, String)> {
        self.validation_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Narrator for MockNarrator {
    async fn generate_question(&self, ctx: &QuestionContext) -> Result<String, LlmError> {
        self.question_requests.lock().unwrap().push(ctx.clone());
        next_or_error(&self.questions)
    }

    async fn generate_conclusion(&self, ctx: &ConclusionContext) -> Result<String, LlmError> {
        self.conclusion_requests.lock().unwrap().push(ctx.clone());
        next_or_error(&self.conclusions)
    }

    async fn validate_answer(&self, question: &str, answer: &str) -> Result<bool, LlmError> {
        self.validation_requests
            .lock()
            .unwrap()
            .push((question.to_string(), answer.to_string()));
        next_or_error(&self.validations)
    }
}

/// Narrator that takes `delay` to answer anything
pub struct DelayedNarrator {
    delay: Duration,
}

impl DelayedNarrator {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Narrator for DelayedNarrator {
    async fn generate_question(&self, _ctx: &QuestionContext) -> Result<String, LlmError> {
        tokio::time::sleep(self.delay).await;
        Ok("Did this arrive too late?".to_string())
    }

    async fn generate_conclusion(&self, _ctx: &ConclusionContext) -> Result<String, LlmError> {
        tokio::time::sleep(self.delay).await;
        Ok("Too late.".to_string())
    }

    async fn validate_answer(&self, _question: &str, _answer: &str) -> Result<bool, LlmError> {
        tokio::time::sleep(self.delay).await;
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::diagnosis::{Confidence, Evidence, QuestionPath, Symptom};
    use crate::narration::REBOOT_CONFIRMATION;
    use crate::runtime::{ConversationRuntime, RuntimeConfig, TurnError};
    use crate::state_machine::transition::{
        AWAITING_RESULTS, ENDED_MESSAGE, REASK_PREFIX, SKIPPED_TEST, SUCCESS_MESSAGE,
        SUPPORT_MESSAGE, TESTING_ACK,
    };
    use crate::state_machine::{ConvState, Session};

    type TestRuntime = ConversationRuntime<Arc<InMemorySessionStore>, Arc<MockNarrator>>;

    fn runtime() -> (TestRuntime, Arc<InMemorySessionStore>, Arc<MockNarrator>) {
        let store = Arc::new(InMemorySessionStore::new());
        let narrator = Arc::new(MockNarrator::new());
        let rt = ConversationRuntime::new(store.clone(), narrator.clone(), RuntimeConfig::default());
        (rt, store, narrator)
    }

    fn slow_evidence() -> Evidence {
        Evidence {
            connectivity: Some(true),
            speed: Some(2.1),
            latency: Some(250.0),
            connection_type: Some("wifi".to_string()),
            ..Default::default()
        }
    }

    fn offline_evidence() -> Evidence {
        Evidence {
            connectivity: Some(false),
            ..Default::default()
        }
    }

    /// Greeting plus test results, leaving the session at question 1
    async fn start(rt: &TestRuntime, id: &str, evidence: Evidence) {
        rt.handle_turn(id, "My wifi is acting up", None).await.unwrap();
        rt.handle_turn(id, "", Some(evidence)).await.unwrap();
    }

    #[tokio::test]
    async fn test_greeting_then_results_starts_questions() {
        let (rt, store, narrator) = runtime();

        let first = rt.handle_turn("a", "My wifi is slow", None).await.unwrap();
        assert_eq!(first.state, ConvState::AutoTesting);
        assert!(first.message.contains(TESTING_ACK));
        assert_eq!(first.next_question, None);
        assert!(!first.is_conversation_ended);

        narrator.queue_question("1. Are other devices on your network slow too?");
        let second = rt.handle_turn("a", "", Some(slow_evidence())).await.unwrap();
        assert_eq!(second.state, ConvState::TargetedQuestions);
        assert!(second.message.contains("Test Results"));
        assert_eq!(
            second.next_question.as_deref(),
            Some("Are other devices on your network slow too?")
        );
        assert_eq!(second.current_question_number, Some(1));
        assert_eq!(second.total_questions, Some(5));

        let session = store.get("a").await.unwrap();
        assert_eq!(session.issue_description, "My wifi is slow");
        assert_eq!(session.question_path, Some(QuestionPath::SlowSpeed));
        assert_eq!(session.question_index, 0);
        assert_eq!(session.asked_questions.len(), 1);
        assert_eq!(session.test_results, Some(slow_evidence()));

        let requests = narrator.recorded_question_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].index, 0);
        assert_eq!(requests[0].path, QuestionPath::SlowSpeed);
    }

    #[tokio::test]
    async fn test_missing_results_reprompt_and_skip() {
        let (rt, store, _narrator) = runtime();
        rt.handle_turn("b", "Internet is broken", None).await.unwrap();

        let waiting = rt.handle_turn("b", "hello?", None).await.unwrap();
        assert_eq!(waiting.state, ConvState::AutoTesting);
        assert_eq!(waiting.message, AWAITING_RESULTS);

        let skipped = rt.handle_turn("b", "Skip", None).await.unwrap();
        assert_eq!(skipped.state, ConvState::TargetedQuestions);
        assert!(skipped.message.starts_with(SKIPPED_TEST));
        assert_eq!(
            skipped.next_question.as_deref(),
            Some(QuestionPath::Default.questions()[0].text)
        );
        assert_eq!(
            store.get("b").await.unwrap().question_path,
            Some(QuestionPath::Default)
        );
    }

    #[tokio::test]
    async fn test_greeting_with_results_continues_in_one_turn() {
        let (rt, _store, _narrator) = runtime();

        let outcome = rt
            .handle_turn("c", "No internet at all", Some(offline_evidence()))
            .await
            .unwrap();
        assert_eq!(outcome.state, ConvState::TargetedQuestions);
        assert!(outcome.message.starts_with(TESTING_ACK));
        assert_eq!(
            outcome.next_question.as_deref(),
            Some(QuestionPath::NoConnectivity.questions()[0].text)
        );
        assert_eq!(outcome.symptoms.internet_completely_down, Some(true));
    }

    #[tokio::test]
    async fn test_generator_error_uses_fixed_question() {
        let (rt, _store, narrator) = runtime();
        rt.handle_turn("d", "slow", None).await.unwrap();

        narrator.queue_question_error(LlmError::server_error("boom"));
        let outcome = rt.handle_turn("d", "", Some(slow_evidence())).await.unwrap();
        assert_eq!(
            outcome.next_question.as_deref(),
            Some(QuestionPath::SlowSpeed.questions()[0].text)
        );
    }

    #[tokio::test]
    async fn test_invalid_answer_reasks_same_question() {
        let (rt, store, narrator) = runtime();
        start(&rt, "e", slow_evidence()).await;
        let question = store.get("e").await.unwrap().asked_questions[0].clone();

        narrator.queue_validation(false);
        let outcome = rt.handle_turn("e", "purple elephants", None).await.unwrap();
        assert!(outcome.message.starts_with(REASK_PREFIX));
        assert_eq!(outcome.next_question.as_deref(), Some(question.as_str()));
        assert_eq!(outcome.current_question_number, Some(1));

        let blank = rt.handle_turn("e", "   ", None).await.unwrap();
        assert!(blank.message.starts_with(REASK_PREFIX));

        let session = store.get("e").await.unwrap();
        assert_eq!(session.question_index, 0);
        assert!(session.answers.is_empty());
        assert_eq!(session.asked_questions, vec![question.clone()]);
        // blank answers never reach the validator
        assert_eq!(
            narrator.recorded_validations(),
            vec![(question, "purple elephants".to_string())]
        );
    }

    #[tokio::test]
    async fn test_five_answers_reach_reboot_and_resolution() {
        let (rt, store, narrator) = runtime();
        start(&rt, "f", slow_evidence()).await;

        let answers = ["yes", "solid green", "10 days", "yes", "no"];
        for (i, answer) in answers.iter().take(4).enumerate() {
            let outcome = rt.handle_turn("f", answer, None).await.unwrap();
            assert_eq!(outcome.state, ConvState::TargetedQuestions);
            assert_eq!(outcome.current_question_number, Some(i + 2));
            assert_eq!(outcome.solution_analysis, None);
        }

        narrator.queue_conclusion("Your router needs a rest.\n\nDid the reboot help? Let me know!");
        let outcome = rt.handle_turn("f", answers[4], None).await.unwrap();
        assert_eq!(outcome.state, ConvState::PostRebootCheck);
        assert_eq!(outcome.reboot_recommended, Some(true));
        assert!(outcome.message.ends_with(REBOOT_CONFIRMATION));
        assert!(!outcome.is_conversation_ended);

        let analysis = outcome.solution_analysis.unwrap();
        assert_eq!(analysis.score, 5);
        assert_eq!(analysis.confidence, Confidence::Medium);

        let session = store.get("f").await.unwrap();
        assert_eq!(session.answers.len(), 5);
        assert_eq!(session.asked_questions.len(), 5);
        assert_eq!(session.question_index, 4);

        let done = rt.handle_turn("f", "Yes, it works now", None).await.unwrap();
        assert_eq!(done.state, ConvState::Resolved);
        assert_eq!(done.message, SUCCESS_MESSAGE);
        assert!(done.is_conversation_ended);
    }

    #[tokio::test]
    async fn test_low_score_escalates() {
        let (rt, _store, _narrator) = runtime();
        start(&rt, "g", slow_evidence()).await;

        let mut last = None;
        for answer in ["no", "all solid", "2 days", "no", "no"] {
            last = Some(rt.handle_turn("g", answer, None).await.unwrap());
        }
        let outcome = last.unwrap();
        assert_eq!(outcome.state, ConvState::Escalation);
        assert_eq!(outcome.reboot_recommended, Some(false));
        assert!(outcome.is_conversation_ended);
        assert!(outcome.message.ends_with(SUPPORT_MESSAGE));
        assert!(!outcome.message.contains(REBOOT_CONFIRMATION));
        assert_eq!(outcome.solution_analysis.unwrap().alternative_solutions.len(), 4);
    }

    #[tokio::test]
    async fn test_disconnected_alone_recommends_reboot() {
        let (rt, _store, _narrator) = runtime();
        start(&rt, "h", offline_evidence()).await;

        let mut last = None;
        for answer in ["no", "blinking orange", "1 day", "yes", "yes"] {
            last = Some(rt.handle_turn("h", answer, None).await.unwrap());
        }
        let outcome = last.unwrap();
        let analysis = outcome.solution_analysis.unwrap();
        assert_eq!(analysis.score, 4);
        assert!(analysis.reboot_recommended);
        assert_eq!(analysis.confidence, Confidence::Medium);
        assert_eq!(outcome.state, ConvState::PostRebootCheck);
        assert!(outcome.message.ends_with(REBOOT_CONFIRMATION));

        let escalated = rt.handle_turn("h", "Nope, still down", None).await.unwrap();
        assert_eq!(escalated.state, ConvState::Escalation);
        assert_eq!(escalated.message, SUPPORT_MESSAGE);

        let after = rt.handle_turn("h", "hello again", None).await.unwrap();
        assert_eq!(after.state, ConvState::Escalation);
        assert_eq!(after.message, ENDED_MESSAGE);
        assert!(after.is_conversation_ended);
    }

    #[tokio::test]
    async fn test_answers_follow_substituted_question() {
        let (rt, store, narrator) = runtime();
        let questions = QuestionPath::NoConnectivity.questions();
        // the model opens with the lights question, then fails on round two
        narrator.queue_question(questions[1].text);
        narrator.queue_question_error(LlmError::server_error("boom"));
        start(&rt, "swap", offline_evidence()).await;

        let first = rt.handle_turn("swap", "blinking red", None).await.unwrap();
        assert_eq!(first.next_question.as_deref(), Some(questions[0].text));

        let mut last = None;
        for answer in ["yes, every device is offline", "1 day", "yes", "yes"] {
            last = Some(rt.handle_turn("swap", answer, None).await.unwrap());
        }
        let outcome = last.unwrap();
        assert_eq!(outcome.symptoms.multiple_devices_affected, Some(true));
        assert_eq!(
            outcome.symptoms.router_lights_status.as_deref(),
            Some("blinking red")
        );

        let analysis = outcome.solution_analysis.unwrap();
        assert_eq!(analysis.score, 7);
        assert_eq!(analysis.confidence, Confidence::High);

        let session = store.get("swap").await.unwrap();
        assert_eq!(
            session.question_targets[..2],
            [
                Some(Symptom::RouterLightsStatus),
                Some(Symptom::MultipleDevicesAffected)
            ]
        );
    }

    #[tokio::test]
    async fn test_slow_generator_times_out_to_fallback() {
        let store = Arc::new(InMemorySessionStore::new());
        let rt = ConversationRuntime::new(
            store.clone(),
            Arc::new(DelayedNarrator::new(Duration::from_secs(30))),
            RuntimeConfig {
                generator_timeout: Duration::from_millis(20),
            },
        );

        rt.handle_turn("slow", "slow wifi", None).await.unwrap();
        let outcome = rt
            .handle_turn("slow", "", Some(slow_evidence()))
            .await
            .unwrap();
        assert_eq!(
            outcome.next_question.as_deref(),
            Some(QuestionPath::SlowSpeed.questions()[0].text)
        );

        // a timed-out validation counts as valid
        let answered = rt.handle_turn("slow", "yes", None).await.unwrap();
        assert_eq!(answered.current_question_number, Some(2));
        assert_eq!(store.get("slow").await.unwrap().answers, vec!["yes".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_turn_leaves_session_untouched() {
        let (rt, store, _narrator) = runtime();

        let mut stuck = Session::new("stuck");
        stuck.state = ConvState::SolutionAnalysis;
        store.save(&stuck).await.unwrap();

        let err = rt.handle_turn("stuck", "hello", None).await.unwrap_err();
        assert!(matches!(err, TurnError::Transition(_)));
        assert_eq!(store.get("stuck").await.unwrap(), stuck);
    }

    #[tokio::test]
    async fn test_empty_session_id_rejected() {
        let (rt, store, _narrator) = runtime();
        let err = rt.handle_turn("  ", "hi", None).await.unwrap_err();
        assert!(matches!(err, TurnError::EmptySessionId));
        assert!(store.list_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_and_unknown_session() {
        let (rt, _store, _narrator) = runtime();
        rt.handle_turn("gone", "hello", None).await.unwrap();

        rt.delete_session("gone").await.unwrap();
        assert!(matches!(rt.session("gone").await, Err(StoreError::NotFound(_))));
        assert!(matches!(
            rt.delete_session("gone").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_turns() {
        let (rt, store, _narrator) = runtime();
        let rt = Arc::new(rt);

        let mut handles = Vec::new();
        for i in 0..8 {
            let rt = rt.clone();
            handles.push(tokio::spawn(async move {
                let id = format!("user-{}", i % 4);
                rt.handle_turn(&id, &format!("problem {i}"), None).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let mut ids = store.list_ids().await.unwrap();
        ids.sort();
        assert_eq!(ids, vec!["user-0", "user-1", "user-2", "user-3"]);
        for id in ids {
            let session = store.get(&id).await.unwrap();
            // the second turn for each id saw AUTO_TESTING, not GREETING
            assert_eq!(session.state, ConvState::AutoTesting);
            assert!(session.issue_description.starts_with("problem "));
        }
    }

    #[tokio::test]
    async fn test_network_results_survive_sqlite_store() {
        let store: Arc<dyn SessionStore> =
            Arc::new(DatabaseStorage::new(Database::open_in_memory().unwrap()));
        let narrator: Arc<dyn Narrator> = Arc::new(MockNarrator::new());
        let rt = ConversationRuntime::new(store.clone(), narrator, RuntimeConfig::default());

        let evidence: Evidence = serde_json::from_value(serde_json::json!({
            "connectivity": { "connected": true, "latency": 120 },
            "speed": { "speed": 3.5 },
            "connectionInfo": { "type": "4g", "downlink": 10, "rtt": 50 },
            "deviceType": "mobile"
        }))
        .unwrap();

        rt.handle_turn("db", "slow phone", Some(evidence.clone()))
            .await
            .unwrap();
        let session = store.get("db").await.unwrap();
        assert_eq!(session.test_results, Some(evidence));
        assert_eq!(session.question_path, Some(QuestionPath::SlowSpeed));
        assert_eq!(session.state, ConvState::TargetedQuestions);
    }
}
