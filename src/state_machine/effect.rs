//! Effects produced by state transitions

use crate::diagnosis::AnalysisResult;

/// Work for the runtime to do after a transition.
///
/// Effects that consult the text generator resolve into a follow-up
/// [`Event`](super::Event) processed in the same turn.
#[derive(Debug, Clone)]
pub enum Effect {
    /// Append text to the reply
    Say(String),

    /// Ask the generator whether `answer` addresses `question`
    ValidateAnswer { question: String, answer: String },

    /// Produce the question for round `index`
    GenerateQuestion { index: usize },

    /// Show a question to the user. `number` is 1-based.
    PresentQuestion {
        text: String,
        number: usize,
        total: usize,
    },

    /// Attach the analysis to the reply
    ReportAnalysis(AnalysisResult),

    /// Produce the conclusion narrative for this analysis
    GenerateConclusion(AnalysisResult),

    /// Show reboot instructions and wait for the user's confirmation
    DeliverRebootInstructions { text: String },

    /// The conversation reached a terminal state
    EndConversation,
}

impl Effect {
    pub fn say(text: impl Into<String>) -> Self {
        Effect::Say(text.into())
    }
}
