//! Question and conclusion narration
//!
//! The wording comes from an LLM, but the content contract lives here: one
//! question per round, never a repeat, a fixed question when the model fails,
//! and a reboot conclusion that always ends on the confirmation prompt.

use std::fmt::Write;

use crate::diagnosis::{
    parse_yes_no, AnalysisResult, Evidence, PathQuestion, QuestionPath, Symptom,
};
use crate::llm::LlmRequest;
use crate::state_machine::Session;

/// Closing line of every reboot conclusion
pub const REBOOT_CONFIRMATION: &str = "Did the reboot improve your connection? (Yes/No)";

const LAST_RESORT_QUESTION: &str =
    "Is there anything else you've noticed about when the problem happens?";
const MAX_ISSUE_CHARS: usize = 500;
const TEMPERATURE: f32 = 0.2;

const QUESTION_SYSTEM_PROMPT: &str = "You are a friendly WiFi troubleshooting assistant. \
You ask short, specific diagnostic questions, one at a time, that a non-technical person can answer.";

const CONCLUSION_SYSTEM_PROMPT: &str = "You are a friendly WiFi troubleshooting assistant. \
You explain diagnostic conclusions in plain language using short markdown sections.";

const VALIDATION_SYSTEM_PROMPT: &str = "You check whether a customer's reply is a relevant \
answer to a troubleshooting question. Reply with exactly one word: YES or NO.";

/// What the generator knows when phrasing question `index`
#[derive(Debug, Clone)]
pub struct QuestionContext {
    pub issue_description: String,
    pub evidence: Evidence,
    pub path: QuestionPath,
    /// 0-based round
    pub index: usize,
    pub total: usize,
    pub asked_questions: Vec<String>,
    /// Symptoms already covered by earlier rounds
    pub asked_targets: Vec<Option<Symptom>>,
    pub answers: Vec<String>,
}

impl QuestionContext {
    pub fn from_session(session: &Session, index: usize, total: usize) -> Self {
        Self {
            issue_description: session.issue_description.clone(),
            evidence: session.evidence(),
            path: session.path(),
            index,
            total,
            asked_questions: session.asked_questions.clone(),
            asked_targets: session.question_targets.clone(),
            answers: session.answers.clone(),
        }
    }

    /// Fixed questions in preference order: this round's, then the rest of
    /// the path, then the default path
    fn fixed_questions(&self) -> impl Iterator<Item = &'static PathQuestion> {
        self.path
            .question(self.index)
            .into_iter()
            .chain(self.path.questions())
            .chain(QuestionPath::Default.questions())
    }

    fn covers(&self, target: Symptom) -> bool {
        self.asked_targets.contains(&Some(target))
    }
}

/// What the generator knows when writing the conclusion
#[derive(Debug, Clone)]
pub struct ConclusionContext {
    pub issue_description: String,
    pub evidence: Evidence,
    pub analysis: AnalysisResult,
    pub asked_questions: Vec<String>,
    pub answers: Vec<String>,
}

impl ConclusionContext {
    pub fn from_session(session: &Session, analysis: AnalysisResult) -> Self {
        Self {
            issue_description: session.issue_description.clone(),
            evidence: session.evidence(),
            analysis,
            asked_questions: session.asked_questions.clone(),
            answers: session.answers.clone(),
        }
    }
}

// ============================================================================
// Question contract
// ============================================================================

fn normalize(question: &str) -> String {
    question
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(['?', '.', '!'])
        .to_lowercase()
}

fn already_asked(question: &str, asked: &[String]) -> bool {
    let key = normalize(question);
    asked.iter().any(|q| normalize(q) == key)
}

/// Reduce model output to a single question, or `None` if there isn't one
fn clean_question(raw: &str) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|l| l.contains('?'))?;
    let question = line.split_inclusive('?').next()?;
    let question = question
        .trim_start_matches(|c: char| c.is_ascii_digit() || matches!(c, '.' | ')' | '-' | '#'))
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, '"' | '*' | '`' | '\''));

    let question = match question.split_once(':') {
        // "Question 2: Are ..." style prefixes
        Some((prefix, rest)) if prefix.to_lowercase().starts_with("question") => rest.trim(),
        _ => question,
    };

    let question = question.trim_start_matches(['"', '*']).trim();
    (question.len() > 1).then(|| question.to_string())
}

/// A question ready to ask, with the symptom its answer is recorded against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettledQuestion {
    pub text: String,
    pub target: Option<Symptom>,
}

/// Turn a generator candidate into the question actually asked.
///
/// Falls back to the path's fixed question for this round when the
/// candidate is missing, malformed or a repeat, and keeps looking through
/// the remaining fixed questions if that one was already asked. The target
/// follows the question that is actually asked, never the round index.
pub fn settle_question(candidate: Option<&str>, ctx: &QuestionContext) -> SettledQuestion {
    let asked = &ctx.asked_questions;

    if let Some(question) = candidate.and_then(clean_question) {
        if !already_asked(&question, asked) {
            let key = normalize(&question);
            // a model rewording keeps the round's intent unless it is already covered
            let target = ctx
                .fixed_questions()
                .find(|q| normalize(q.text) == key)
                .or_else(|| ctx.fixed_questions().find(|q| !ctx.covers(q.target)))
                .map(|q| q.target);
            return SettledQuestion {
                text: question,
                target,
            };
        }
    }

    let unasked = |q: &&PathQuestion| !already_asked(q.text, asked);
    ctx.fixed_questions()
        .filter(unasked)
        .find(|q| !ctx.covers(q.target))
        .or_else(|| ctx.fixed_questions().find(unasked))
        .map_or_else(
            || SettledQuestion {
                text: LAST_RESORT_QUESTION.to_string(),
                target: None,
            },
            |q| SettledQuestion {
                text: q.text.to_string(),
                target: Some(q.target),
            },
        )
}

// ============================================================================
// Conclusion contract
// ============================================================================

/// Enforce the closing line on reboot conclusions and keep it out of the
/// others.
pub fn settle_conclusion(candidate: Option<&str>, analysis: &AnalysisResult) -> String {
    let Some(text) = candidate.map(str::trim).filter(|t| !t.is_empty()) else {
        return fallback_conclusion(analysis);
    };

    if analysis.reboot_recommended {
        let body = text
            .split_once(REBOOT_CONFIRMATION)
            .map_or(text, |(before, _)| before)
            .trim_end_matches(|c: char| c.is_whitespace() || matches!(c, '*' | '"' | '#' | '_'));
        if body.is_empty() {
            REBOOT_CONFIRMATION.to_string()
        } else {
            format!("{body}\n\n{REBOOT_CONFIRMATION}")
        }
    } else {
        let body = text.replace(REBOOT_CONFIRMATION, "");
        let body = body.trim();
        if body.is_empty() {
            fallback_conclusion(analysis)
        } else {
            body.to_string()
        }
    }
}

/// Conclusion used when the generator is unavailable
pub fn fallback_conclusion(analysis: &AnalysisResult) -> String {
    let mut out = String::new();

    if analysis.reboot_recommended {
        out.push_str(
            "🔧 **Recommendation: restart your router**\n\n\
             Based on the test results and your answers, a router restart is the best next step.\n",
        );
        if !analysis.reasoning.is_empty() {
            out.push_str("\n**Why:**\n");
            for reason in &analysis.reasoning {
                let _ = writeln!(out, "• {reason}");
            }
        }
        out.push_str(
            "\n**How to restart your router:**\n\
             1. Unplug the power cable from your router and modem.\n\
             2. Wait 30 seconds.\n\
             3. Plug the modem back in first and wait until its lights are steady.\n\
             4. Plug the router back in and wait 2-3 minutes for it to fully start.\n\n",
        );
        out.push_str(REBOOT_CONFIRMATION);
    } else {
        out.push_str(
            "💡 **A router restart is unlikely to fix this**\n\n\
             Here are some other things to try:\n",
        );
        for (i, solution) in analysis.alternative_solutions.iter().enumerate() {
            let _ = writeln!(out, "{}. {solution}", i + 1);
        }
        out.truncate(out.trim_end().len());
    }

    out
}

// ============================================================================
// Prompts
// ============================================================================

fn truncated_issue(issue: &str) -> String {
    let issue = issue.trim();
    if issue.is_empty() {
        return "(not described)".to_string();
    }
    if issue.chars().count() > MAX_ISSUE_CHARS {
        let head: String = issue.chars().take(MAX_ISSUE_CHARS).collect();
        format!("{head}...")
    } else {
        issue.to_string()
    }
}

fn write_transcript(out: &mut String, asked: &[String], answers: &[String]) {
    if asked.is_empty() {
        return;
    }
    out.push_str("\nPrevious questions and answers:\n");
    for (i, question) in asked.iter().enumerate() {
        let answer = answers.get(i).map_or("(no answer yet)", String::as_str);
        let _ = writeln!(out, "Q{}: {question}\nA{}: {answer}", i + 1, i + 1);
    }
}

pub fn question_request(ctx: &QuestionContext) -> LlmRequest {
    let mut user = String::new();
    let _ = writeln!(user, "Customer issue: {}", truncated_issue(&ctx.issue_description));
    let _ = writeln!(user, "Network test: {}", ctx.evidence.prompt_line());
    let _ = writeln!(user, "Diagnostic path: {}", ctx.path.as_str());
    write_transcript(&mut user, &ctx.asked_questions, &ctx.answers);

    user.push_str(
        "\nCover these areas in order, one per question: network congestion/bandwidth, \
         physical/hardware, router configuration, signal/interference, device-specific.\n",
    );
    if let Some(hint) = ctx.path.question(ctx.index) {
        let _ = writeln!(
            user,
            "This question should cover {}. Reference question: {}",
            hint.category.label(),
            hint.text
        );
    }
    let _ = write!(
        user,
        "\nWrite question {} of {}. Rules: ask exactly one question, do not repeat a previous \
         question, keep it under 25 words, output only the question text.",
        ctx.index + 1,
        ctx.total
    );

    LlmRequest::prompt(QUESTION_SYSTEM_PROMPT, user)
        .with_max_tokens(120)
        .with_temperature(TEMPERATURE)
}

pub fn conclusion_request(ctx: &ConclusionContext) -> LlmRequest {
    let analysis = &ctx.analysis;
    let mut user = String::new();
    let _ = writeln!(user, "Customer issue: {}", truncated_issue(&ctx.issue_description));
    let _ = writeln!(user, "Network test: {}", ctx.evidence.prompt_line());
    write_transcript(&mut user, &ctx.asked_questions, &ctx.answers);
    let _ = writeln!(
        user,
        "\nAnalysis: score {}, confidence {:?}, reboot recommended: {}",
        analysis.score, analysis.confidence, analysis.reboot_recommended
    );
    for reason in &analysis.reasoning {
        let _ = writeln!(user, "- {reason}");
    }

    if analysis.reboot_recommended {
        let _ = write!(
            user,
            "\nExplain briefly why restarting the router should help, then give step-by-step \
             restart instructions (unplug, wait 30 seconds, modem first, wait 2-3 minutes). \
             End with exactly this line and nothing after it: {REBOOT_CONFIRMATION}"
        );
    } else {
        user.push_str("\nExplain briefly that a restart is unlikely to help and suggest these instead:\n");
        for solution in &analysis.alternative_solutions {
            let _ = writeln!(user, "- {solution}");
        }
        user.push_str("Do not ask the customer to restart the router.");
    }

    LlmRequest::prompt(CONCLUSION_SYSTEM_PROMPT, user)
        .with_max_tokens(600)
        .with_temperature(TEMPERATURE)
}

pub fn validation_request(question: &str, answer: &str) -> LlmRequest {
    let user = format!(
        "Question: {question}\nReply: {answer}\n\nIs the reply a relevant answer to the question \
         (including \"I don't know\")? Answer YES or NO."
    );
    LlmRequest::prompt(VALIDATION_SYSTEM_PROMPT, user)
        .with_max_tokens(5)
        .with_temperature(0.0)
}

/// Read the classifier's verdict. Anything unclear counts as valid.
pub fn interpret_validation(reply: &str) -> bool {
    parse_yes_no(reply).unwrap_or(true)
}
