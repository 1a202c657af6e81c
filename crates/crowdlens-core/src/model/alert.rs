// ── Pushed realtime events ──

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};

use super::time::parse_timestamp;

/// Alert severity, ordered `Low < Medium < High`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
}

impl Severity {
    /// Total mapping from any backend string; unrecognized input is `Low`.
    pub fn normalize(raw: &str) -> Self {
        raw.trim().parse().unwrap_or_default()
    }
}

/// One normalized crowd alert.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    pub name: String,
    pub zone: String,
    pub severity: Severity,
    pub action_type: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person_id: Option<String>,
}

impl AlertEvent {
    /// Normalize a raw `alert` payload. `now` stands in for a missing or
    /// unparseable timestamp.
    pub fn from_payload(payload: &Value, now: DateTime<Utc>) -> Self {
        let severity = first_text(payload, &["severity", "priority"])
            .map_or(Severity::Low, |raw| Severity::normalize(&raw));
        let timestamp = ["timestamp", "time"]
            .iter()
            .filter_map(|key| payload.get(*key))
            .find_map(parse_timestamp)
            .unwrap_or(now);

        Self {
            name: first_text(payload, &["name", "personName"]).unwrap_or_else(|| "Unknown".into()),
            zone: first_text(payload, &["zone", "zoneId", "zoneName"])
                .unwrap_or_else(|| "Unknown".into()),
            severity,
            action_type: first_text(payload, &["actionType", "action"])
                .unwrap_or_else(|| "Entered".into()),
            timestamp,
            site_id: first_text(payload, &["siteId"]),
            person_id: first_text(payload, &["personId"]),
        }
    }
}

/// One pushed `liveOccupancy` reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupancyReading {
    pub occupancy: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl OccupancyReading {
    /// `None` unless the payload carries a numeric `occupancy`.
    pub fn from_payload(payload: &Value, now: DateTime<Utc>) -> Option<Self> {
        let occupancy = match payload.get("occupancy")? {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.trim().parse().ok()?,
            _ => return None,
        };
        Some(Self {
            occupancy,
            site_id: first_text(payload, &["siteId"]),
            received_at: now,
        })
    }
}

/// First field among `keys` holding a non-empty string or a number.
fn first_text(payload: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match payload.get(*key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
