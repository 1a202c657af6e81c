// ── Analytics domain types ──

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// Whether the numbers came from the backend.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum DataMode {
    #[default]
    Live,
    /// Some sections are placeholders; `reason` says which and why.
    Partial { reason: String },
    /// Everything is placeholder data.
    Degraded { reason: String },
}

impl DataMode {
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }
}

impl fmt::Display for DataMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => f.write_str("live"),
            Self::Partial { reason } => write!(f, "partial ({reason})"),
            Self::Degraded { reason } => write!(f, "degraded ({reason})"),
        }
    }
}

/// Average dwell time in fractional minutes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DwellTime {
    pub minutes: f64,
}

impl DwellTime {
    /// Whole minutes and whole seconds of the fractional part.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::as_conversions)]
    pub fn parts(self) -> (u64, u64) {
        let minutes = self.minutes.max(0.0);
        let whole = minutes.floor();
        let seconds = ((minutes - whole) * 60.0).floor();
        (whole as u64, seconds as u64)
    }

    /// `MMmin SSsec`.
    pub fn display(self) -> String {
        let (m, s) = self.parts();
        format!("{m:02}min {s:02}sec")
    }

    /// `MM:SS`, as used in the entry/exit table.
    pub fn clock(self) -> String {
        let (m, s) = self.parts();
        format!("{m:02}:{s:02}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupancyPoint {
    /// `HH:MM` (UTC) or the backend's own label.
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at: Option<DateTime<Utc>>,
    pub occupancy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DemographicsPoint {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at: Option<DateTime<Utc>>,
    pub male: f64,
    pub female: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenderSlice {
    pub name: String,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
}

/// Everything the overview screen shows for one site and day.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub site_id: String,
    pub date: NaiveDate,
    pub dwell: Option<DwellTime>,
    pub footfall: Option<f64>,
    /// Latest occupancy: the snapshot value or the last bucket.
    pub live_occupancy: Option<f64>,
    pub occupancy: Vec<OccupancyPoint>,
    pub demographics: Vec<DemographicsPoint>,
    pub gender_split: Vec<GenderSlice>,
    #[serde(flatten)]
    pub mode: DataMode,
}

/// One visit in the entry/exit log.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person_id: Option<String>,
    pub name: String,
    pub gender: String,
    /// Local time string from the backend, or `HH:MM` UTC, or `--`.
    pub entry: String,
    pub exit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dwell: Option<DwellTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
}

impl EntryRecord {
    /// `MM:SS`, or `--` when unknown.
    pub fn dwell_clock(&self) -> String {
        self.dwell.map_or_else(|| "--".to_owned(), DwellTime::clock)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntriesPage {
    pub site_id: String,
    pub date: NaiveDate,
    pub page_number: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub records: Vec<EntryRecord>,
    #[serde(flatten)]
    pub mode: DataMode,
}
