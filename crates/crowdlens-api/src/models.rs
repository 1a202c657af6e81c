// Wire types for the analytics backend.
//
// The backend schema is owned elsewhere and drifts between deployments, so
// most response fields are optional and alternative field names are kept
// side by side. Normalization into domain types happens in crowdlens-core.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

// ── Identity ─────────────────────────────────────────────────────────

/// User identifier; the backend has used both numeric and string ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Number(i64),
    Text(String),
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Operator profile returned by the login endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Everything else the backend sends about the user.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl UserProfile {
    /// Profile synthesized from the login email when the backend omits `user`.
    pub fn from_email(email: &str) -> Self {
        Self {
            email: Some(email.to_owned()),
            login_id: Some(email.to_owned()),
            ..Self::default()
        }
    }

    /// Best human-readable label: name, then email, then login id.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .or(self.login_id.as_deref())
            .unwrap_or("unknown")
    }
}

// ── Auth ─────────────────────────────────────────────────────────────

/// `POST auth/login` body.
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    #[serde(serialize_with = "serialize_secret")]
    pub password: &'a SecretString,
}

fn serialize_secret<S: Serializer>(secret: &&SecretString, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(secret.expose_secret())
}

/// `POST auth/login` response. The token arrives under either name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

impl LoginResponse {
    /// The bearer token, preferring `token` over `access_token`. Empty strings count as absent.
    pub fn bearer_token(&self) -> Option<&str> {
        self.token
            .as_deref()
            .filter(|t| !t.is_empty())
            .or_else(|| self.access_token.as_deref().filter(|t| !t.is_empty()))
    }
}

// ── Sites ────────────────────────────────────────────────────────────

/// A monitored location.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    /// Stable identifier used to scope every analytics request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Site {
    /// The site id, treating an empty string as undefined.
    pub fn id(&self) -> Option<&str> {
        self.site_id.as_deref().filter(|id| !id.is_empty())
    }

    /// `"City, Country"` with whichever parts are known.
    pub fn location(&self) -> String {
        [self.city.as_deref(), self.country.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Site list responses arrive bare or wrapped in `data`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum SitesEnvelope {
    Bare(Vec<Site>),
    Wrapped { data: Vec<Site> },
}

impl SitesEnvelope {
    pub(crate) fn into_sites(self) -> Vec<Site> {
        match self {
            Self::Bare(sites) | Self::Wrapped { data: sites } => sites,
        }
    }
}

/// Single-site responses, bare or wrapped in `data`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum SiteEnvelope {
    Wrapped { data: Site },
    Bare(Site),
}

impl SiteEnvelope {
    pub(crate) fn into_site(self) -> Site {
        match self {
            Self::Wrapped { data: site } | Self::Bare(site) => site,
        }
    }
}

// ── Analytics requests ───────────────────────────────────────────────

/// Body of every `analytics/*` call: a site and a UTC millisecond window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsQuery {
    pub site_id: String,
    pub from_utc: i64,
    pub to_utc: i64,
}

/// Body of `analytics/entry-exit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryExitQuery {
    #[serde(flatten)]
    pub range: AnalyticsQuery,
    pub page_number: u32,
    pub page_size: u32,
}

// ── Analytics responses ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DwellResponse {
    #[serde(default)]
    pub avg_dwell_minutes: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FootfallResponse {
    #[serde(default)]
    pub footfall: Option<f64>,
}

/// One hourly occupancy bucket. The timestamp and count have each appeared
/// under three different names.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupancyBucket {
    #[serde(default)]
    pub hour_utc: Option<Value>,
    #[serde(default)]
    pub timestamp: Option<Value>,
    #[serde(default)]
    pub time: Option<Value>,
    #[serde(default)]
    pub count: Option<f64>,
    #[serde(default)]
    pub occupancy: Option<f64>,
    #[serde(default)]
    pub value: Option<f64>,
}

impl OccupancyBucket {
    pub fn at(&self) -> Option<&Value> {
        self.hour_utc
            .as_ref()
            .or(self.timestamp.as_ref())
            .or(self.time.as_ref())
    }

    pub fn count(&self) -> f64 {
        self.count.or(self.occupancy).or(self.value).unwrap_or(0.0)
    }
}

/// Pre-labelled chart point used by snapshot-style responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChartPoint {
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub occupancy: Option<f64>,
    #[serde(default)]
    pub male: Option<f64>,
    #[serde(default)]
    pub female: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupancySnapshot {
    #[serde(default)]
    pub current_occupancy: Option<f64>,
    #[serde(default)]
    pub timeseries: Option<Vec<ChartPoint>>,
}

/// `analytics/occupancy` answers with either a bucket series or a snapshot.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OccupancyResponse {
    Series(Vec<OccupancyBucket>),
    Snapshot(OccupancySnapshot),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemographicsBucket {
    #[serde(default)]
    pub hour_utc: Option<Value>,
    #[serde(default)]
    pub timestamp: Option<Value>,
    #[serde(default)]
    pub male: Option<f64>,
    #[serde(default)]
    pub female: Option<f64>,
}

impl DemographicsBucket {
    pub fn at(&self) -> Option<&Value> {
        self.hour_utc.as_ref().or(self.timestamp.as_ref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PieSlice {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemographicsBreakdown {
    #[serde(default)]
    pub pie_chart: Option<Vec<PieSlice>>,
    #[serde(default)]
    pub timeseries: Option<Vec<ChartPoint>>,
}

/// `analytics/demographics` answers with either buckets or a breakdown.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DemographicsResponse {
    Series(Vec<DemographicsBucket>),
    Breakdown(DemographicsBreakdown),
}

/// One person's visit in `analytics/entry-exit`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryExitRecord {
    #[serde(default)]
    pub person_id: Option<String>,
    #[serde(default)]
    pub person_name: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default)]
    pub entry_local: Option<String>,
    #[serde(default)]
    pub entry_utc: Option<Value>,
    #[serde(default)]
    pub exit_local: Option<String>,
    #[serde(default)]
    pub exit_utc: Option<Value>,
    #[serde(default)]
    pub dwell_minutes: Option<f64>,
    #[serde(default)]
    pub zone_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryExitPage {
    #[serde(default)]
    pub records: Vec<EntryExitRecord>,
    #[serde(default)]
    pub total_pages: Option<u32>,
}
