//! Structured symptoms and keyword answer parsing
//!
//! Answers are free text. Each one is mapped back onto the symptom its
//! question targeted, using a deliberately small closed vocabulary.

use serde::{Deserialize, Serialize};


/// A fact about the user's situation that a question tries to establish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Symptom {
    CanSeeNetwork,
    CanConnect,
    MultipleDevicesAffected,
    DaysSinceLastReboot,
    SlowSpeeds,
    IntermittentConnection,
    SpecificWebsitesAffected,
    ErrorMessagesSeen,
    RouterLightsStatus,
}

/// How an answer to a question about a symptom is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerShape {
    YesNo,
    Days,
    FreeText,
}

impl Symptom {
    pub fn shape(self) -> AnswerShape {
        match self {
            Symptom::DaysSinceLastReboot => AnswerShape::Days,
            Symptom::RouterLightsStatus => AnswerShape::FreeText,
            _ => AnswerShape::YesNo,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Symptom::CanSeeNetwork => "can_see_network",
            Symptom::CanConnect => "can_connect",
            Symptom::MultipleDevicesAffected => "multiple_devices_affected",
            Symptom::DaysSinceLastReboot => "days_since_last_reboot",
            Symptom::SlowSpeeds => "slow_speeds",
            Symptom::IntermittentConnection => "intermittent_connection",
            Symptom::SpecificWebsitesAffected => "specific_websites_affected",
            Symptom::ErrorMessagesSeen => "error_messages_seen",
            Symptom::RouterLightsStatus => "router_lights_status",
        }
    }
}

/// Everything learned from the user's answers so far.
///
/// `None` means the question was not asked or the answer was not
/// understood; the analyzer treats both the same.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSymptoms {
    pub can_see_network: Option<bool>,
    pub can_connect: Option<bool>,
    pub multiple_devices_affected: Option<bool>,
    pub days_since_last_reboot: Option<u32>,
    pub internet_completely_down: Option<bool>,
    pub slow_speeds: Option<bool>,
    pub intermittent_connection: Option<bool>,
    pub specific_websites_affected: Option<bool>,
    pub error_messages_seen: Option<bool>,
    pub router_lights_status: Option<String>,
}

impl UserSymptoms {
    /// Map each answer onto the symptom its question targeted. Answers to
    /// questions without a target are kept in the transcript only.
    pub fn from_answers(targets: &[Option<Symptom>], answers: &[String]) -> Self {
        let mut symptoms = Self::default();
        for (target, answer) in targets.iter().zip(answers) {
            if let Some(symptom) = target {
                symptoms.record(*symptom, answer);
            }
        }
        symptoms
    }

    /// Interpret one answer for one symptom. Unparseable answers leave the
    /// field untouched.
    pub fn record(&mut self, symptom: Symptom, answer: &str) {
        match symptom.shape() {
            AnswerShape::YesNo => {
                let Some(flag) = parse_yes_no(answer) else {
                    return;
                };
                let field = match symptom {
                    Symptom::CanSeeNetwork => &mut self.can_see_network,
                    Symptom::CanConnect => &mut self.can_connect,
                    Symptom::MultipleDevicesAffected => &mut self.multiple_devices_affected,
                    Symptom::SlowSpeeds => &mut self.slow_speeds,
                    Symptom::IntermittentConnection => &mut self.intermittent_connection,
                    Symptom::SpecificWebsitesAffected => &mut self.specific_websites_affected,
                    Symptom::ErrorMessagesSeen => &mut self.error_messages_seen,
                    Symptom::DaysSinceLastReboot | Symptom::RouterLightsStatus => return,
                };
                *field = Some(flag);
            }
            AnswerShape::Days => {
                if let Some(days) = parse_days(answer) {
                    self.days_since_last_reboot = Some(days);
                }
            }
            AnswerShape::FreeText => {
                let text = answer.trim();
                if !text.is_empty() {
                    self.router_lights_status = Some(text.to_string());
                }
            }
        }
    }
}

// ============================================================================
// Keyword parsing
// ============================================================================

const UNCERTAIN_PHRASES: &[&str] = &[
    "not sure",
    "unsure",
    "don't know",
    "dont know",
    "no idea",
    "maybe",
    "idk",
    "can't tell",
    "not certain",
];

const YES_WORDS: &[&str] = &[
    "yes",
    "yeah",
    "yep",
    "yup",
    "ya",
    "y",
    "sure",
    "correct",
    "right",
    "true",
    "definitely",
    "absolutely",
    "affirmative",
    "indeed",
    "can",
    "all",
    "both",
    "every",
    "everything",
];

const NO_WORDS: &[&str] = &[
    "no",
    "nope",
    "nah",
    "n",
    "not",
    "never",
    "none",
    "negative",
    "false",
    "cannot",
    "can't",
    "cant",
    "don't",
    "dont",
    "doesn't",
    "doesnt",
    "isn't",
    "isnt",
    "aren't",
    "arent",
    "won't",
    "wont",
    "only",
    "just",
];

const RESOLVED_WORDS: &[&str] = &[
    "fine", "works", "fixed", "yes", "good", "better", "resolved", "solved",
];

fn tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .replace('\u{2019}', "'")
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|t| t.trim_matches('\'').to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Classify a free-text reply as yes, no, or not understood.
///
/// The first yes/no keyword wins, so "no, only my laptop" is a no and
/// "yes, I can't browse" is a yes. A yes word directly followed by "not"
/// counts as a no ("I can not see it").
pub fn parse_yes_no(text: &str) -> Option<bool> {
    let lowered = text.to_lowercase().replace('\u{2019}', "'");
    if UNCERTAIN_PHRASES.iter().any(|p| lowered.contains(p)) {
        return None;
    }

    let words = tokens(&lowered);
    words.iter().enumerate().find_map(|(i, token)| {
        if YES_WORDS.contains(&token.as_str()) {
            // "can not", "yes not really": a yes word negated by the next one
            let negated = words.get(i + 1).is_some_and(|next| next == "not");
            Some(!negated)
        } else if NO_WORDS.contains(&token.as_str()) {
            Some(false)
        } else {
            None
        }
    })
}

fn number_word(word: &str) -> Option<u32> {
    Some(match word {
        "a" | "an" | "one" => 1,
        "two" | "couple" => 2,
        "three" | "few" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        _ => return None,
    })
}

fn unit_days(word: &str) -> Option<u32> {
    Some(match word {
        "day" | "days" => 1,
        "week" | "weeks" | "wk" | "wks" => 7,
        "month" | "months" => 30,
        "year" | "years" | "yr" | "yrs" => 365,
        "hour" | "hours" | "hr" | "hrs" | "minute" | "minutes" | "min" | "mins" => 0,
        _ => return None,
    })
}

/// Extract a day count from answers like "3 days", "a couple of weeks",
/// "yesterday" or a bare "10".
pub fn parse_days(text: &str) -> Option<u32> {
    let words = tokens(text);

    if words.iter().any(|w| w == "today") {
        return Some(0);
    }
    if words.iter().any(|w| w == "yesterday") {
        return Some(1);
    }
    if words.iter().any(|w| w == "never") {
        return Some(365);
    }

    // (quantity, came from digits)
    let mut pending: Option<(u32, bool)> = None;
    for word in &words {
        let digits: String = word.chars().take_while(char::is_ascii_digit).collect();
        let rest = word.trim_start_matches(|c: char| c.is_ascii_digit());

        if !digits.is_empty() {
            if let Ok(n) = digits.parse::<u32>() {
                pending = Some((n, true));
            }
            if let Some(mult) = unit_days(rest) {
                let qty = pending.map_or(1, |(n, _)| n);
                return Some(qty.saturating_mul(mult));
            }
            continue;
        }

        if let Some(n) = number_word(word) {
            pending = Some((n, false));
        } else if let Some(mult) = unit_days(word) {
            let qty = pending.map_or(1, |(n, _)| n);
            return Some(qty.saturating_mul(mult));
        }
    }

    match pending {
        Some((n, true)) => Some(n),
        _ => None,
    }
}

/// Whether a post-reboot reply reports the problem as gone
pub fn is_issue_resolved(text: &str) -> bool {
    let lowered = text.to_lowercase();
    RESOLVED_WORDS.iter().any(|w| lowered.contains(w))
}
