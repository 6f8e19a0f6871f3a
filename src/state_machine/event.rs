//! Events that drive a conversation forward

use crate::diagnosis::{Evidence, Symptom};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    UserMessage {
        text: String,
        evidence: Option<Evidence>,
    },

    // Generator events
    AnswerValidated {
        answer: String,
        valid: bool,
    },
    QuestionGenerated {
        /// 0-based index of the question round
        index: usize,
        text: String,
        /// Symptom the answer to this question is recorded against
        target: Option<Symptom>,
    },
    ConclusionGenerated {
        text: String,
        reboot_recommended: bool,
    },

    // Delivery events
    RebootInstructionsSent,
}

impl Event {
    pub fn user_message(text: impl Into<String>, evidence: Option<Evidence>) -> Self {
        Event::UserMessage {
            text: text.into(),
            evidence,
        }
    }
}
