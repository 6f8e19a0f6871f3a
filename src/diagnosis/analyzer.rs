//! Reboot recommendation scoring
//!
//! Each piece of evidence or answered symptom that points at the router
//! contributes a fixed weight. The total decides whether a reboot is worth
//! trying and how confident we are about it.

use serde::{Deserialize, Serialize};

use super::evidence::Evidence;
use super::symptoms::UserSymptoms;

const VERY_SLOW_SPEED_MBPS: f64 = 1.0;
const VERY_HIGH_LATENCY_MS: f64 = 1000.0;
const STALE_REBOOT_DAYS: u32 = 7;

const HIGH_CONFIDENCE_SCORE: u32 = 6;
const REBOOT_SCORE: u32 = 4;

/// Suggestions offered when a reboot is not expected to help
pub const ALTERNATIVE_SOLUTIONS: [&str; 4] = [
    "Contact your Internet Service Provider (ISP) to check for service issues",
    "Check for outages in your area on your provider's status page",
    "Update the network drivers on your device",
    "Move the router to a central, elevated spot away from walls, microwaves and other interference",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    // Part of the reported vocabulary; current scoring never produces it
    #[allow(dead_code)]
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryIssue {
    NoConnectivity,
    SlowSpeed,
}

/// A single scored observation
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Disconnected,
    VerySlowSpeed { mbps: f64 },
    HighLatency { ms: f64 },
    MultipleDevices,
    StaleReboot { days: u32 },
    NetworkNotVisible,
    CannotConnect,
}

impl Signal {
    pub fn weight(&self) -> u32 {
        match self {
            Signal::Disconnected => 4,
            Signal::VerySlowSpeed { .. } | Signal::MultipleDevices | Signal::NetworkNotVisible => 3,
            Signal::HighLatency { .. } | Signal::StaleReboot { .. } | Signal::CannotConnect => 2,
        }
    }

    fn primary_issue(&self) -> Option<PrimaryIssue> {
        match self {
            Signal::Disconnected => Some(PrimaryIssue::NoConnectivity),
            Signal::VerySlowSpeed { .. } => Some(PrimaryIssue::SlowSpeed),
            _ => None,
        }
    }

    pub fn reason(&self) -> String {
        match self {
            Signal::Disconnected => "No internet connectivity detected".to_string(),
            Signal::VerySlowSpeed { mbps } => format!("Very slow speed detected ({mbps} Mbps)"),
            Signal::HighLatency { ms } => format!("High latency detected ({ms} ms)"),
            Signal::MultipleDevices => "Multiple devices are affected".to_string(),
            Signal::StaleReboot { days } => {
                format!("Router has not been restarted in {days} days")
            }
            Signal::NetworkNotVisible => "WiFi network is not visible".to_string(),
            Signal::CannotConnect => "Device cannot connect to the WiFi network".to_string(),
        }
    }
}

/// Outcome of the diagnostic analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub score: u32,
    pub reboot_recommended: bool,
    pub confidence: Confidence,
    pub primary_issue: Option<PrimaryIssue>,
    pub reasoning: Vec<String>,
    /// Only populated when no reboot is recommended
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternative_solutions: Vec<String>,
}

/// Collect the scored observations, evidence first then answers
pub fn detect_signals(evidence: &Evidence, symptoms: &UserSymptoms) -> Vec<Signal> {
    let mut signals = Vec::new();

    // unknown connectivity is not the same as disconnected
    if evidence.connectivity == Some(false) {
        signals.push(Signal::Disconnected);
    }
    if let Some(mbps) = evidence.speed.filter(|s| *s < VERY_SLOW_SPEED_MBPS) {
        signals.push(Signal::VerySlowSpeed { mbps });
    }
    if let Some(ms) = evidence.latency.filter(|l| *l > VERY_HIGH_LATENCY_MS) {
        signals.push(Signal::HighLatency { ms });
    }

    if symptoms.multiple_devices_affected == Some(true) {
        signals.push(Signal::MultipleDevices);
    }
    if let Some(days) = symptoms
        .days_since_last_reboot
        .filter(|d| *d >= STALE_REBOOT_DAYS)
    {
        signals.push(Signal::StaleReboot { days });
    }
    if symptoms.can_see_network == Some(false) {
        signals.push(Signal::NetworkNotVisible);
    }
    if symptoms.can_connect == Some(false) {
        signals.push(Signal::CannotConnect);
    }

    signals
}

/// Score a set of signals. The result does not depend on their order.
pub fn analyze_signals(signals: &[Signal]) -> AnalysisResult {
    let score = signals.iter().map(Signal::weight).sum::<u32>();

    // no_connectivity outranks slow_speed regardless of detection order
    let primary_issue = signals.iter().filter_map(Signal::primary_issue).min_by_key(|issue| match issue {
        PrimaryIssue::NoConnectivity => 0,
        PrimaryIssue::SlowSpeed => 1,
    });

    let (reboot_recommended, confidence) = if score >= HIGH_CONFIDENCE_SCORE {
        (true, Confidence::High)
    } else if score >= REBOOT_SCORE {
        (true, Confidence::Medium)
    } else {
        (false, Confidence::Medium)
    };

    let alternative_solutions = if reboot_recommended {
        Vec::new()
    } else {
        ALTERNATIVE_SOLUTIONS.iter().map(ToString::to_string).collect()
    };

    AnalysisResult {
        score,
        reboot_recommended,
        confidence,
        primary_issue,
        reasoning: signals.iter().map(Signal::reason).collect(),
        alternative_solutions,
    }
}

pub fn analyze(evidence: &Evidence, symptoms: &UserSymptoms) -> AnalysisResult {
    analyze_signals(&detect_signals(evidence, symptoms))
}
