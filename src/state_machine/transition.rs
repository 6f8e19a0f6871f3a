//! Pure state transition function

use super::{ConvContext, ConvState, Effect, Event, Session};
use crate::diagnosis::{analyze, is_issue_resolved, select_path, Evidence};
use thiserror::Error;

pub const GREETING_PROMPT: &str =
    "Hi! I'm here to help with your WiFi. Please describe the problem you're having.";
pub const TESTING_ACK: &str = "Got it. Running a quick test on your network...";
pub const AWAITING_RESULTS: &str = "I'm still waiting for the network test results. \
They are collected automatically by your browser; if the test can't run, reply \"skip\" \
and I'll continue with a few questions.";
pub const SKIPPED_TEST: &str = "No problem, we'll skip the network test. \
Let me ask you a few questions to better understand the issue.";
pub const REASK_PREFIX: &str =
    "Sorry, I didn't quite catch that. Could you answer this question?";
pub const SUCCESS_MESSAGE: &str = "🎉 I'm so glad I could help! Your WiFi issue appears to be \
resolved. If you experience any problems in the future, feel free to reach out. Have a great day!";
pub const SUPPORT_MESSAGE: &str =
    "Sorry about that. Please call customer support at 888-888-8888 for further assistance.";
pub const ENDED_MESSAGE: &str =
    "This conversation has ended. Please start a new session if you need more help.";

const SKIP_SIGNAL: &str = "skip";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub session: Session,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

fn invalid(state: ConvState, event: &Event) -> TransitionError {
    TransitionError::InvalidTransition(format!("{event:?} is not accepted in state {state}"))
}

/// Pure transition function
///
/// Given the same session and event it always produces the same result.
/// The input session is never modified; the returned one replaces it.
pub fn transition(
    session: &Session,
    context: &ConvContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    let state = session.state;
    let mut next = session.clone();

    match (state, event) {
        // ============================================================
        // Terminal states
        // ============================================================
        (s, Event::UserMessage { .. }) if s.is_terminal() => Ok(TransitionResult::new(next)
            .with_effect(Effect::say(ENDED_MESSAGE))
            .with_effect(Effect::EndConversation)),

        // ============================================================
        // Greeting
        // ============================================================
        (ConvState::Greeting, Event::UserMessage { text, evidence }) => {
            let evidence = evidence.filter(|e| !e.is_empty());
            let text = text.trim();

            if text.is_empty() && evidence.is_none() {
                return Ok(TransitionResult::new(next).with_effect(Effect::say(GREETING_PROMPT)));
            }

            next.issue_description = text.to_string();
            next.state = ConvState::AutoTesting;
            let mut effects = vec![Effect::say(TESTING_ACK)];

            // the web client usually runs the test before the first message
            if evidence.is_some() {
                effects.extend(begin_questions(&mut next, evidence));
            }

            Ok(TransitionResult::new(next).with_effects(effects))
        }

        // ============================================================
        // Auto testing
        // ============================================================
        (ConvState::AutoTesting, Event::UserMessage { text, evidence }) => {
            match evidence.filter(|e| !e.is_empty()) {
                Some(evidence) => {
                    let effects = begin_questions(&mut next, Some(evidence));
                    Ok(TransitionResult::new(next).with_effects(effects))
                }
                None if text.trim().eq_ignore_ascii_case(SKIP_SIGNAL) => {
                    let effects = begin_questions(&mut next, None);
                    Ok(TransitionResult::new(next).with_effects(effects))
                }
                None => Ok(TransitionResult::new(next).with_effect(Effect::say(AWAITING_RESULTS))),
            }
        }

        // ============================================================
        // Targeted questions
        // ============================================================
        (ConvState::TargetedQuestions, Event::UserMessage { text, .. }) => {
            let Some(question) = session.current_question() else {
                // question for this round never made it into the session
                let index = session.question_index;
                return Ok(TransitionResult::new(next)
                    .with_effect(Effect::GenerateQuestion { index }));
            };

            let answer = text.trim();
            if answer.is_empty() {
                let effects = reask(session, context, question);
                return Ok(TransitionResult::new(next).with_effects(effects));
            }

            Ok(
                TransitionResult::new(next).with_effect(Effect::ValidateAnswer {
                    question: question.to_string(),
                    answer: answer.to_string(),
                }),
            )
        }

        (ConvState::TargetedQuestions, Event::AnswerValidated { answer, valid }) => {
            let Some(question) = session.current_question() else {
                return Err(invalid(state, &Event::AnswerValidated { answer, valid }));
            };

            if !valid {
                let effects = reask(session, context, question);
                return Ok(TransitionResult::new(next).with_effects(effects));
            }

            next.answers.push(answer);

            if next.question_index + 1 < context.max_questions {
                next.question_index += 1;
                let index = next.question_index;
                return Ok(TransitionResult::new(next)
                    .with_effect(Effect::GenerateQuestion { index }));
            }

            next.state = ConvState::SolutionAnalysis;
            let analysis = analyze(&next.evidence(), &next.symptoms());
            Ok(TransitionResult::new(next)
                .with_effect(Effect::ReportAnalysis(analysis.clone()))
                .with_effect(Effect::GenerateConclusion(analysis)))
        }

        (
            ConvState::TargetedQuestions,
            Event::QuestionGenerated {
                index,
                text,
                target,
            },
        ) if index == session.question_index && session.asked_questions.len() == index => {
            // rounds saved before targets were recorded map by path position
            let path = next.path();
            next.question_targets.truncate(index);
            let recorded = next.question_targets.len();
            next.question_targets
                .extend((recorded..index).map(|i| path.question(i).map(|q| q.target)));
            next.question_targets.push(target);
            next.asked_questions.push(text.clone());
            Ok(
                TransitionResult::new(next).with_effect(Effect::PresentQuestion {
                    text,
                    number: index + 1,
                    total: context.max_questions,
                }),
            )
        }

        // ============================================================
        // Analysis and reboot
        // ============================================================
        (
            ConvState::SolutionAnalysis,
            Event::ConclusionGenerated {
                text,
                reboot_recommended: true,
            },
        ) => {
            next.state = ConvState::RebootInstructions;
            Ok(TransitionResult::new(next)
                .with_effect(Effect::DeliverRebootInstructions { text }))
        }

        (
            ConvState::SolutionAnalysis,
            Event::ConclusionGenerated {
                text,
                reboot_recommended: false,
            },
        ) => {
            next.state = ConvState::Escalation;
            Ok(TransitionResult::new(next)
                .with_effect(Effect::Say(text))
                .with_effect(Effect::say(SUPPORT_MESSAGE))
                .with_effect(Effect::EndConversation))
        }

        (ConvState::RebootInstructions, Event::RebootInstructionsSent) => {
            next.state = ConvState::PostRebootCheck;
            Ok(TransitionResult::new(next))
        }

        (ConvState::PostRebootCheck, Event::UserMessage { text, .. }) => {
            let (state, message) = if is_issue_resolved(&text) {
                (ConvState::Resolved, SUCCESS_MESSAGE)
            } else {
                (ConvState::Escalation, SUPPORT_MESSAGE)
            };
            next.state = state;
            Ok(TransitionResult::new(next)
                .with_effect(Effect::say(message))
                .with_effect(Effect::EndConversation))
        }

        (state, event) => Err(invalid(state, &event)),
    }
}

/// Store the evidence, lock in the question path and ask for question #1
fn begin_questions(session: &mut Session, evidence: Option<Evidence>) -> Vec<Effect> {
    let intro = evidence
        .as_ref()
        .map_or_else(|| SKIPPED_TEST.to_string(), Evidence::summary);

    session.question_path = Some(select_path(&evidence.clone().unwrap_or_default()));
    session.test_results = evidence;
    session.state = ConvState::TargetedQuestions;
    session.question_index = 0;

    vec![Effect::Say(intro), Effect::GenerateQuestion { index: 0 }]
}

fn reask(session: &Session, context: &ConvContext, question: &str) -> Vec<Effect> {
    vec![
        Effect::say(REASK_PREFIX),
        Effect::PresentQuestion {
            text: question.to_string(),
            number: session.question_index + 1,
            total: context.max_questions,
        },
    ]
}
