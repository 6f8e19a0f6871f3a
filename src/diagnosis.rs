//! Diagnostic domain model
//!
//! Evidence from the client-side network test, structured symptoms parsed
//! from the user's answers, question path selection and the reboot analyzer.
//! Everything in here is pure: no I/O, no clocks, no LLM.

mod analyzer;
mod evidence;
mod path;
mod symptoms;

pub use analyzer::{analyze, AnalysisResult, Confidence, PrimaryIssue};
#[cfg(test)]
pub use analyzer::{analyze_signals, Signal};
pub use evidence::Evidence;
pub use path::{select_path, PathQuestion, QuestionPath};
pub use symptoms::{is_issue_resolved, parse_yes_no, Symptom, UserSymptoms};
