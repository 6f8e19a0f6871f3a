//! Conversation state types

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::diagnosis::{Evidence, QuestionPath, Symptom, UserSymptoms};

/// Number of targeted questions asked before the analysis runs
pub const MAX_QUESTIONS: usize = 5;

/// Conversation state
///
/// States only ever move forward in declaration order. `Resolved` and
/// `Escalation` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConvState {
    /// Waiting for the user to describe the problem
    #[default]
    Greeting,

    /// Waiting for the client-side network test results
    AutoTesting,

    /// Asking targeted questions
    TargetedQuestions,

    /// All answers collected, conclusion being produced (never persisted)
    SolutionAnalysis,

    /// Reboot instructions being delivered (never persisted)
    RebootInstructions,

    /// Waiting to hear whether the reboot helped
    PostRebootCheck,

    Resolved,

    Escalation,
}

impl ConvState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ConvState::Resolved | ConvState::Escalation)
    }

    /// Position in the forward-only ordering. Both terminal states share
    /// the last rank.
    pub fn rank(self) -> u8 {
        match self {
            ConvState::Greeting => 0,
            ConvState::AutoTesting => 1,
            ConvState::TargetedQuestions => 2,
            ConvState::SolutionAnalysis => 3,
            ConvState::RebootInstructions => 4,
            ConvState::PostRebootCheck => 5,
            ConvState::Resolved | ConvState::Escalation => 6,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConvState::Greeting => "GREETING",
            ConvState::AutoTesting => "AUTO_TESTING",
            ConvState::TargetedQuestions => "TARGETED_QUESTIONS",
            ConvState::SolutionAnalysis => "SOLUTION_ANALYSIS",
            ConvState::RebootInstructions => "REBOOT_INSTRUCTIONS",
            ConvState::PostRebootCheck => "POST_REBOOT_CHECK",
            ConvState::Resolved => "RESOLVED",
            ConvState::Escalation => "ESCALATION",
        }
    }
}

impl fmt::Display for ConvState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConvState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "GREETING" => ConvState::Greeting,
            "AUTO_TESTING" => ConvState::AutoTesting,
            "TARGETED_QUESTIONS" => ConvState::TargetedQuestions,
            "SOLUTION_ANALYSIS" => ConvState::SolutionAnalysis,
            "REBOOT_INSTRUCTIONS" => ConvState::RebootInstructions,
            "POST_REBOOT_CHECK" => ConvState::PostRebootCheck,
            "RESOLVED" => ConvState::Resolved,
            "ESCALATION" => ConvState::Escalation,
            other => return Err(format!("unknown conversation state: {other}")),
        })
    }
}

// ============================================================================
// Session
// ============================================================================

/// Everything the engine knows about one troubleshooting conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub state: ConvState,
    /// Initial complaint, written once in the greeting turn
    pub issue_description: String,
    pub test_results: Option<Evidence>,
    /// Chosen when the questions begin, never changed afterwards
    pub question_path: Option<QuestionPath>,
    pub asked_questions: Vec<String>,
    /// Symptom each asked question targets, index-aligned with
    /// `asked_questions`. `None` for questions that match no symptom.
    #[serde(default)]
    pub question_targets: Vec<Option<Symptom>>,
    /// Index-aligned with `asked_questions`
    pub answers: Vec<String>,
    /// Completed question/answer rounds cursor, 0-based
    pub question_index: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            state: ConvState::default(),
            issue_description: String::new(),
            test_results: None,
            question_path: None,
            asked_questions: Vec::new(),
            question_targets: Vec::new(),
            answers: Vec::new(),
            question_index: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn path(&self) -> QuestionPath {
        self.question_path.unwrap_or_default()
    }

    /// Question awaiting an answer, if one has been asked for this round
    pub fn current_question(&self) -> Option<&str> {
        if self.state != ConvState::TargetedQuestions {
            return None;
        }
        self.asked_questions
            .get(self.question_index)
            .map(String::as_str)
    }

    /// Test results, or an all-unknown snapshot when the test was skipped
    pub fn evidence(&self) -> Evidence {
        self.test_results.clone().unwrap_or_default()
    }

    /// Structured view of the answers collected so far
    pub fn symptoms(&self) -> UserSymptoms {
        let mut symptoms = UserSymptoms::from_answers(&self.answer_targets(), &self.answers);
        symptoms.internet_completely_down = self
            .test_results
            .as_ref()
            .and_then(|e| e.connectivity)
            .map(|connected| !connected);
        symptoms
    }

    /// Target for every answered round. Rounds saved without a recorded
    /// target fall back to the path question at the same index.
    fn answer_targets(&self) -> Vec<Option<Symptom>> {
        (0..self.answers.len())
            .map(|i| match self.question_targets.get(i) {
                Some(target) => *target,
                None => self.path().question(i).map(|q| q.target),
            })
            .collect()
    }
}

/// Per-turn context that does not live in the session itself
#[derive(Debug, Clone)]
pub struct ConvContext {
    pub session_id: String,
    pub max_questions: usize,
}

impl ConvContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            max_questions: MAX_QUESTIONS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names_round_trip() {
        for state in [
            ConvState::Greeting,
            ConvState::AutoTesting,
            ConvState::TargetedQuestions,
            ConvState::SolutionAnalysis,
            ConvState::RebootInstructions,
            ConvState::PostRebootCheck,
            ConvState::Resolved,
            ConvState::Escalation,
        ] {
            assert_eq!(state.as_str().parse::<ConvState>().unwrap(), state);
            assert_eq!(
                serde_json::to_value(state).unwrap(),
                serde_json::Value::String(state.as_str().to_string())
            );
        }
        assert!("IDLE".parse::<ConvState>().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(ConvState::Resolved.is_terminal());
        assert!(ConvState::Escalation.is_terminal());
        assert!(!ConvState::PostRebootCheck.is_terminal());
        assert!(ConvState::PostRebootCheck.rank() < ConvState::Escalation.rank());
    }

    #[test]
    fn test_new_session_defaults() {
        let session = Session::new("abc");
        assert_eq!(session.state, ConvState::Greeting);
        assert_eq!(session.question_index, 0);
        assert!(session.asked_questions.is_empty());
        assert_eq!(session.path(), QuestionPath::Default);
        assert_eq!(session.current_question(), None);
    }

    #[test]
    fn test_symptoms_include_connectivity() {
        let mut session = Session::new("abc");
        session.test_results = Some(Evidence {
            connectivity: Some(false),
            ..Default::default()
        });
        session.question_path = Some(QuestionPath::NoConnectivity);
        session.answers = vec!["yes".to_string()];

        let symptoms = session.symptoms();
        assert_eq!(symptoms.internet_completely_down, Some(true));
        assert_eq!(symptoms.multiple_devices_affected, Some(true));
    }

    #[test]
    fn test_symptoms_follow_recorded_targets() {
        let mut session = Session::new("abc");
        session.question_path = Some(QuestionPath::NoConnectivity);
        session.asked_questions = vec![
            "What do the lights look like?".into(),
            "Other devices?".into(),
        ];
        session.question_targets = vec![
            Some(Symptom::RouterLightsStatus),
            Some(Symptom::MultipleDevicesAffected),
        ];
        session.answers = vec!["solid red".into(), "yes, all of them".into()];

        let symptoms = session.symptoms();
        assert_eq!(symptoms.router_lights_status.as_deref(), Some("solid red"));
        assert_eq!(symptoms.multiple_devices_affected, Some(true));
    }

    #[test]
    fn test_session_without_targets_deserializes() {
        let mut value = serde_json::to_value(Session::new("old")).unwrap();
        value.as_object_mut().unwrap().remove("question_targets");
        let session: Session = serde_json::from_value(value).unwrap();
        assert!(session.question_targets.is_empty());
    }
}
