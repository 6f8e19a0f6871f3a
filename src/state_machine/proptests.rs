//! Property-based tests for the state machine
//!
//! These tests drive whole conversations through `transition`, resolving
//! generator effects synchronously, and check the session invariants after
//! every step.

use super::*;
use crate::diagnosis::{analyze_signals, select_path, Evidence, QuestionPath, Signal};
use proptest::prelude::*;
use std::collections::VecDeque;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context() -> ConvContext {
    ConvContext::new("prop-session")
}

#[derive(Debug, Clone)]
enum Input {
    Text(String),
    Blank,
    Skip,
    WithEvidence(String, Evidence),
}

impl Input {
    fn into_event(self) -> Event {
        match self {
            Input::Text(text) => Event::user_message(text, None),
            Input::Blank => Event::user_message("   ", None),
            Input::Skip => Event::user_message("skip", None),
            Input::WithEvidence(text, evidence) => Event::user_message(text, Some(evidence)),
        }
    }
}

/// Outcome of one driven turn
struct Turn {
    sessions: Vec<Session>,
    failed: bool,
}

/// Run one user turn, answering generator effects from `validity`
fn drive_turn(session: &Session, input: Input, validity: &mut impl Iterator<Item = bool>) -> Turn {
    let context = test_context();
    let mut current = session.clone();
    let mut sessions = vec![];
    let mut queue = VecDeque::from([input.into_event()]);

    while let Some(event) = queue.pop_front() {
        let Ok(result) = transition(&current, &context, event) else {
            return Turn {
                sessions,
                failed: true,
            };
        };
        current = result.session;
        sessions.push(current.clone());

        for effect in result.effects {
            match effect {
                Effect::ValidateAnswer { answer, .. } => queue.push_back(Event::AnswerValidated {
                    answer,
                    valid: validity.next().unwrap_or(true),
                }),
                Effect::GenerateQuestion { index } => {
                    let question = current.path().question(index);
                    let text =
                        question.map_or_else(|| format!("Question {index}?"), |q| q.text.to_string());
                    queue.push_back(Event::QuestionGenerated {
                        index,
                        text,
                        target: question.map(|q| q.target),
                    });
                }
                Effect::GenerateConclusion(analysis) => {
                    queue.push_back(Event::ConclusionGenerated {
                        text: "conclusion".to_string(),
                        reboot_recommended: analysis.reboot_recommended,
                    });
                }
                Effect::DeliverRebootInstructions { .. } => {
                    queue.push_back(Event::RebootInstructionsSent);
                }
                Effect::Say(_)
                | Effect::PresentQuestion { .. }
                | Effect::ReportAnalysis(_)
                | Effect::EndConversation => {}
            }
        }
    }

    Turn {
        sessions,
        failed: false,
    }
}

fn check_invariants(prev: &Session, next: &Session) -> Result<(), TestCaseError> {
    prop_assert!(next.state.rank() >= prev.state.rank(), "{} -> {}", prev.state, next.state);
    prop_assert!(next.question_index >= prev.question_index);
    prop_assert!(next.answers.len() <= next.asked_questions.len());
    prop_assert!(next.asked_questions.len() <= next.question_index + 1);
    prop_assert_eq!(next.question_targets.len(), next.asked_questions.len());
    prop_assert!(next.question_index < MAX_QUESTIONS);
    if prev.state != ConvState::Greeting {
        prop_assert_eq!(&next.issue_description, &prev.issue_description);
    }
    if prev.question_path.is_some() {
        prop_assert_eq!(next.question_path, prev.question_path);
    }
    Ok(())
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

/// Multiples of 0.5 so values survive a JSON round trip exactly
fn arb_half_units(max: u32) -> impl Strategy<Value = f64> {
    (0..max).prop_map(|n| f64::from(n) * 0.5)
}

fn arb_evidence() -> impl Strategy<Value = Evidence> {
    (
        proptest::option::of(any::<bool>()),
        proptest::option::of(arb_half_units(400)),
        proptest::option::of(arb_half_units(6000)),
        proptest::option::of(prop_oneof![Just("wifi".to_string()), Just("4g".to_string())]),
    )
        .prop_map(|(connectivity, speed, latency, connection_type)| Evidence {
            connectivity,
            speed,
            latency,
            connection_type,
            ..Default::default()
        })
}

fn arb_input() -> impl Strategy<Value = Input> {
    prop_oneof![
        4 => "[a-z ]{1,20}".prop_map(Input::Text),
        1 => Just(Input::Blank),
        1 => Just(Input::Skip),
        2 => ("[a-z ]{0,10}", arb_evidence()).prop_map(|(t, e)| Input::WithEvidence(t, e)),
    ]
}

fn arb_signal() -> impl Strategy<Value = Signal> {
    prop_oneof![
        Just(Signal::Disconnected),
        (0.0f64..1.0).prop_map(|mbps| Signal::VerySlowSpeed { mbps }),
        (1000.5f64..5000.0).prop_map(|ms| Signal::HighLatency { ms }),
        Just(Signal::MultipleDevices),
        (7u32..400).prop_map(|days| Signal::StaleReboot { days }),
        Just(Signal::NetworkNotVisible),
        Just(Signal::CannotConnect),
    ]
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn conversation_invariants_hold(
        inputs in prop::collection::vec(arb_input(), 1..25),
        validity in prop::collection::vec(any::<bool>(), 0..40),
    ) {
        let mut session = Session::new("prop-session");
        let mut validity = validity.into_iter();

        for input in inputs {
            let turn = drive_turn(&session, input, &mut validity);
            prop_assert!(!turn.failed, "turn failed from state {}", session.state);

            let mut prev = session.clone();
            for next in turn.sessions {
                check_invariants(&prev, &next)?;
                prev = next;
            }
            session = prev;

            // transient states are always passed through within the turn
            prop_assert!(!matches!(
                session.state,
                ConvState::SolutionAnalysis | ConvState::RebootInstructions
            ));
        }
    }

    #[test]
    fn terminal_states_absorb_input(
        input in arb_input(),
        resolved in any::<bool>(),
    ) {
        let mut session = Session::new("prop-session");
        session.state = if resolved { ConvState::Resolved } else { ConvState::Escalation };

        let result = transition(&session, &test_context(), input.into_event()).unwrap();
        prop_assert_eq!(&result.session, &session);
        prop_assert!(matches!(result.effects.last(), Some(Effect::EndConversation)));
    }

    #[test]
    fn disconnected_selects_no_connectivity(mut evidence in arb_evidence()) {
        evidence.connectivity = Some(false);
        prop_assert_eq!(select_path(&evidence), QuestionPath::NoConnectivity);
    }

    #[test]
    fn score_is_order_independent(
        (signals, shuffled) in prop::collection::vec(arb_signal(), 0..10)
            .prop_flat_map(|signals| {
                let shuffled = Just(signals.clone()).prop_shuffle();
                (Just(signals), shuffled)
            })
    ) {
        let a = analyze_signals(&signals);
        let b = analyze_signals(&shuffled);
        prop_assert_eq!(a.score, b.score);
        prop_assert_eq!(a.reboot_recommended, b.reboot_recommended);
        prop_assert_eq!(a.confidence, b.confidence);
        prop_assert_eq!(a.primary_issue, b.primary_issue);
    }

    #[test]
    fn evidence_survives_storage_encoding(evidence in arb_evidence()) {
        let json = serde_json::to_string(&evidence).unwrap();
        let parsed: Evidence = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(parsed, evidence);
    }
}
