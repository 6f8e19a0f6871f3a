//! Network test evidence
//!
//! The web client has shipped several payload shapes over time (flat values,
//! nested browser probe results, a typed record). They are all accepted here
//! and normalized once into [`Evidence`]; nothing downstream ever looks at
//! the wire shape again.

use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Canonical snapshot of the automated network test.
///
/// Every field is optional. Missing data degrades the diagnosis but is never
/// an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "EvidencePayload")]
pub struct Evidence {
    /// Whether the test reached the internet
    pub connectivity: Option<bool>,
    /// Measured download speed in Mbps
    pub speed: Option<f64>,
    /// Measured round-trip latency in milliseconds
    pub latency: Option<f64>,
    pub connection_type: Option<String>,
    pub device_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packet_loss: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_timestamp: Option<String>,
}

const UNKNOWN: &str = "unknown";

impl Evidence {
    /// True when no field carries any data
    pub fn is_empty(&self) -> bool {
        self.connectivity.is_none()
            && self.speed.is_none()
            && self.latency.is_none()
            && self.connection_type.is_none()
            && self.device_type.is_none()
            && self.packet_loss.is_none()
    }

    pub fn speed_label(&self) -> String {
        self.speed.map_or_else(|| UNKNOWN.to_string(), |s| s.to_string())
    }

    pub fn latency_label(&self) -> String {
        self.latency
            .map_or_else(|| UNKNOWN.to_string(), |l| l.to_string())
    }

    pub fn connection_type_label(&self) -> &str {
        self.connection_type.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn device_type_label(&self) -> &str {
        self.device_type.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn connectivity_label(&self) -> &'static str {
        match self.connectivity {
            Some(true) => "connected",
            Some(false) => "disconnected",
            None => UNKNOWN,
        }
    }

    /// One-line summary used in generator prompts
    pub fn prompt_line(&self) -> String {
        format!(
            "Connectivity: {}, Speed: {} Mbps, Latency: {} ms, Connection Type: {}, Device Type: {}",
            self.connectivity_label(),
            self.speed_label(),
            self.latency_label(),
            self.connection_type_label(),
            self.device_type_label(),
        )
    }

    /// Markdown summary shown to the user when the results arrive
    pub fn summary(&self) -> String {
        let connectivity = match self.connectivity {
            Some(true) => "✅ Working",
            Some(false) => "❌ Issues detected",
            None => "❔ Not measured",
        };

        let mut out = String::from("📊 **Test Results:**\n");
        let _ = writeln!(out, "• **Speed:** {} Mbps", self.speed_label());
        let _ = writeln!(out, "• **Latency:** {} ms", self.latency_label());
        let _ = writeln!(out, "• **Connection Type:** {}", self.connection_type_label());
        let _ = writeln!(out, "• **Connectivity:** {connectivity}");
        if let Some(loss) = self.packet_loss {
            let _ = writeln!(out, "• **Packet Loss:** {loss}%");
        }
        out.push_str(
            "\nBased on these results, let me ask you a few questions to better understand the issue.",
        );
        out
    }
}

// ============================================================================
// Wire shapes
// ============================================================================

/// Union of every field name the clients have been observed to send
#[derive(Debug, Default, Deserialize)]
struct EvidencePayload {
    #[serde(default, alias = "connectivity_status")]
    connectivity: Option<ConnectivityField>,
    #[serde(default, alias = "speed_mbps")]
    speed: Option<SpeedField>,
    #[serde(default, alias = "latency_ms")]
    latency: Option<Measure>,
    #[serde(default, rename = "connectionInfo", alias = "connection_info")]
    connection_info: Option<ConnectionInfo>,
    #[serde(default, alias = "type", alias = "effective_connection_type")]
    connection_type: Option<String>,
    #[serde(default, alias = "deviceType")]
    device_type: Option<String>,
    #[serde(default)]
    packet_loss: Option<Measure>,
    #[serde(default, alias = "testTimestamp")]
    test_timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ConnectivityField {
    Flag(bool),
    Probe {
        #[serde(default)]
        connected: Option<bool>,
        #[serde(default)]
        latency: Option<Measure>,
    },
    Unrecognized(serde_json::Value),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SpeedField {
    Probe {
        #[serde(default)]
        speed: Option<Measure>,
        #[serde(default)]
        latency: Option<Measure>,
    },
    Scalar(Measure),
}

#[derive(Debug, Default, Deserialize)]
struct ConnectionInfo {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    downlink: Option<Measure>,
    #[serde(default)]
    rtt: Option<Measure>,
}

/// A numeric measurement that may arrive as a number, a numeric string or junk
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Measure {
    Number(f64),
    Text(String),
    Unrecognized(serde_json::Value),
}

impl Measure {
    fn value(&self) -> Option<f64> {
        let raw = match self {
            Measure::Number(n) => *n,
            Measure::Text(s) => s.trim().parse().ok()?,
            Measure::Unrecognized(_) => return None,
        };
        (raw.is_finite() && raw >= 0.0).then_some(raw)
    }
}

fn measure(field: Option<&Measure>) -> Option<f64> {
    field.and_then(Measure::value)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl From<EvidencePayload> for Evidence {
    fn from(payload: EvidencePayload) -> Self {
        let (connectivity, probe_latency) = match payload.connectivity {
            Some(ConnectivityField::Flag(flag)) => (Some(flag), None),
            Some(ConnectivityField::Probe { connected, latency }) => {
                (connected, measure(latency.as_ref()))
            }
            Some(ConnectivityField::Unrecognized(_)) | None => (None, None),
        };

        let (speed, speed_latency) = match payload.speed {
            Some(SpeedField::Probe { speed, latency }) => {
                (measure(speed.as_ref()), measure(latency.as_ref()))
            }
            Some(SpeedField::Scalar(m)) => (m.value(), None),
            None => (None, None),
        };

        let info = payload.connection_info.unwrap_or_default();

        Evidence {
            connectivity,
            speed: speed.or_else(|| measure(info.downlink.as_ref())),
            latency: measure(payload.latency.as_ref())
                .or(probe_latency)
                .or(speed_latency)
                .or_else(|| measure(info.rtt.as_ref())),
            connection_type: non_blank(payload.connection_type).or_else(|| non_blank(info.kind)),
            device_type: non_blank(payload.device_type),
            packet_loss: measure(payload.packet_loss.as_ref()),
            test_timestamp: non_blank(payload.test_timestamp),
        }
    }
}
