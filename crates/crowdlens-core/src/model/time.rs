use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;

/// Millisecond epoch bounds of one UTC calendar day, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayRange {
    pub from_utc: i64,
    pub to_utc: i64,
}

/// `00:00:00.000` to `23:59:59.999` UTC of `date`.
pub fn day_utc_range(date: NaiveDate) -> DayRange {
    let start = date.and_time(NaiveTime::MIN).and_utc();
    DayRange {
        from_utc: start.timestamp_millis(),
        to_utc: start.timestamp_millis() + 86_400_000 - 1,
    }
}

/// Interpret a backend timestamp: epoch milliseconds (number or numeric
/// string) or an RFC 3339 string.
pub(crate) fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(ms) = s.parse::<i64>() {
                return Utc.timestamp_millis_opt(ms).single();
            }
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        }
        _ => None,
    }
}

/// `HH:MM` chart label.
pub(crate) fn hour_label(at: &DateTime<Utc>) -> String {
    at.format("%H:%M").to_string()
}
