//! Question path selection

use serde::{Deserialize, Serialize};

use super::evidence::Evidence;
use super::symptoms::Symptom;

/// Download speed below which the slow-speed path is taken
pub const SLOW_SPEED_THRESHOLD_MBPS: f64 = 5.0;

/// Round-trip latency above which the connection is treated as unstable
pub const HIGH_LATENCY_THRESHOLD_MS: f64 = 500.0;

/// The set of questions asked in a session, chosen once from the evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionPath {
    NoConnectivity,
    SlowSpeed,
    Intermittent,
    #[default]
    Default,
}

/// Diagnostic area a question covers. Questions are asked in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum QuestionCategory {
    BandwidthCongestion,
    HardwarePhysical,
    RouterConfiguration,
    SignalInterference,
    DeviceSpecific,
}

impl QuestionCategory {
    pub fn label(self) -> &'static str {
        match self {
            QuestionCategory::BandwidthCongestion => "network congestion/bandwidth",
            QuestionCategory::HardwarePhysical => "physical/hardware",
            QuestionCategory::RouterConfiguration => "router configuration",
            QuestionCategory::SignalInterference => "signal/interference",
            QuestionCategory::DeviceSpecific => "device-specific",
        }
    }
}

/// One fixed question of a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathQuestion {
    pub text: &'static str,
    pub category: QuestionCategory,
    pub target: Symptom,
}

impl PathQuestion {
    const fn new(text: &'static str, category: QuestionCategory, target: Symptom) -> Self {
        Self {
            text,
            category,
            target,
        }
    }
}

use QuestionCategory::{
    BandwidthCongestion, DeviceSpecific, HardwarePhysical, RouterConfiguration, SignalInterference,
};

const ROUTER_LIGHTS: PathQuestion = PathQuestion::new(
    "What do the lights on your router or modem look like right now (color, blinking or solid)?",
    HardwarePhysical,
    Symptom::RouterLightsStatus,
);

const LAST_REBOOT: PathQuestion = PathQuestion::new(
    "How many days has it been since your router was last restarted?",
    RouterConfiguration,
    Symptom::DaysSinceLastReboot,
);

const DEFAULT_QUESTIONS: [PathQuestion; 5] = [
    PathQuestion::new(
        "Are other devices in your home also having trouble with the internet right now?",
        BandwidthCongestion,
        Symptom::MultipleDevicesAffected,
    ),
    ROUTER_LIGHTS,
    LAST_REBOOT,
    PathQuestion::new(
        "Can you see your WiFi network name in the list of available networks on your device?",
        SignalInterference,
        Symptom::CanSeeNetwork,
    ),
    PathQuestion::new(
        "Is your device able to connect to the WiFi network when you select it?",
        DeviceSpecific,
        Symptom::CanConnect,
    ),
];

const NO_CONNECTIVITY_QUESTIONS: [PathQuestion; 5] = [
    PathQuestion::new(
        "Are other devices in your home also unable to get online?",
        BandwidthCongestion,
        Symptom::MultipleDevicesAffected,
    ),
    ROUTER_LIGHTS,
    LAST_REBOOT,
    PathQuestion::new(
        "Does your WiFi network name show up in the list of available networks?",
        SignalInterference,
        Symptom::CanSeeNetwork,
    ),
    PathQuestion::new(
        "When you select your network and enter the password, does your device connect successfully?",
        DeviceSpecific,
        Symptom::CanConnect,
    ),
];

const SLOW_SPEED_QUESTIONS: [PathQuestion; 5] = [
    PathQuestion::new(
        "Are other devices on your network also experiencing slow speeds?",
        BandwidthCongestion,
        Symptom::MultipleDevicesAffected,
    ),
    ROUTER_LIGHTS,
    LAST_REBOOT,
    PathQuestion::new(
        "Is the connection noticeably slower when you are farther from the router?",
        SignalInterference,
        Symptom::SlowSpeeds,
    ),
    PathQuestion::new(
        "Is the slowness limited to specific websites or apps while others load normally?",
        DeviceSpecific,
        Symptom::SpecificWebsitesAffected,
    ),
];

const INTERMITTENT_QUESTIONS: [PathQuestion; 5] = [
    PathQuestion::new(
        "Do the dropouts happen on other devices in your home at the same time?",
        BandwidthCongestion,
        Symptom::MultipleDevicesAffected,
    ),
    ROUTER_LIGHTS,
    LAST_REBOOT,
    PathQuestion::new(
        "Does the connection drop more often in certain rooms or at particular times of day?",
        SignalInterference,
        Symptom::IntermittentConnection,
    ),
    PathQuestion::new(
        "Does your device show any error messages when the connection drops?",
        DeviceSpecific,
        Symptom::ErrorMessagesSeen,
    ),
];

impl QuestionPath {
    pub fn questions(self) -> &'static [PathQuestion] {
        match self {
            QuestionPath::NoConnectivity => &NO_CONNECTIVITY_QUESTIONS,
            QuestionPath::SlowSpeed => &SLOW_SPEED_QUESTIONS,
            QuestionPath::Intermittent => &INTERMITTENT_QUESTIONS,
            QuestionPath::Default => &DEFAULT_QUESTIONS,
        }
    }

    /// The fixed question at `index`, if the path has one
    pub fn question(self, index: usize) -> Option<&'static PathQuestion> {
        self.questions().get(index)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QuestionPath::NoConnectivity => "no_connectivity",
            QuestionPath::SlowSpeed => "slow_speed",
            QuestionPath::Intermittent => "intermittent",
            QuestionPath::Default => "default",
        }
    }
}

/// Pick the question path for a session from its test results.
///
/// Priority: no connectivity, then slow speed, then high latency. Unknown
/// measurements never trigger a path.
pub fn select_path(evidence: &Evidence) -> QuestionPath {
    if evidence.connectivity == Some(false) {
        QuestionPath::NoConnectivity
    } else if evidence
        .speed
        .is_some_and(|s| s < SLOW_SPEED_THRESHOLD_MBPS)
    {
        QuestionPath::SlowSpeed
    } else if evidence
        .latency
        .is_some_and(|l| l > HIGH_LATENCY_THRESHOLD_MS)
    {
        QuestionPath::Intermittent
    } else {
        QuestionPath::Default
    }
}
