// Wire response → domain shape. Every fallback the screens rely on is
// applied here; sections that had to be filled in say so via `note`.

use chrono::{DateTime, NaiveDate, Utc};
use crowdlens_api::models::ChartPoint;
use crowdlens_api::{
    DemographicsBucket, DemographicsResponse, EntryExitPage, EntryExitRecord, OccupancyBucket,
    OccupancyResponse,
};
use serde_json::Value;

use super::placeholder;
use crate::model::time::{hour_label, parse_timestamp};
use crate::model::{
    DataMode, DemographicsPoint, DwellTime, EntriesPage, EntryRecord, GenderSlice, OccupancyPoint,
};

pub(crate) struct OccupancySection {
    pub points: Vec<OccupancyPoint>,
    pub live: Option<f64>,
    pub note: Option<&'static str>,
}

pub(crate) struct DemographicsSection {
    pub timeline: Vec<DemographicsPoint>,
    pub split: Vec<GenderSlice>,
    pub note: Option<&'static str>,
}

pub(crate) fn dwell(avg_minutes: Option<f64>) -> DwellTime {
    DwellTime {
        minutes: avg_minutes.unwrap_or(0.0),
    }
}

/// Label from a parsed instant, else the raw string, else `--`.
fn label(raw: Option<&Value>, at: Option<&DateTime<Utc>>) -> String {
    match (at, raw) {
        (Some(at), _) => hour_label(at),
        (None, Some(Value::String(s))) if !s.is_empty() => s.clone(),
        _ => "--".to_owned(),
    }
}

fn chart_label(point: &ChartPoint) -> String {
    point.time.clone().unwrap_or_else(|| "--".to_owned())
}

// ── Occupancy ────────────────────────────────────────────────────────

pub(crate) fn occupancy(response: OccupancyResponse) -> OccupancySection {
    match response {
        OccupancyResponse::Series(buckets) => {
            let points: Vec<_> = buckets.iter().map(occupancy_point).collect();
            let live = Some(points.last().map_or(0.0, |p| p.occupancy));
            OccupancySection {
                points,
                live,
                note: None,
            }
        }
        OccupancyResponse::Snapshot(snapshot) => {
            let mut note = None;
            let live = snapshot.current_occupancy.unwrap_or_else(|| {
                note = Some("current occupancy missing");
                placeholder::LIVE_OCCUPANCY
            });
            let points = match snapshot.timeseries {
                Some(series) if !series.is_empty() => series
                    .iter()
                    .map(|p| OccupancyPoint {
                        label: chart_label(p),
                        at: None,
                        occupancy: p.occupancy.unwrap_or(0.0),
                    })
                    .collect(),
                _ => {
                    note = Some("occupancy timeseries missing");
                    placeholder::occupancy_series()
                }
            };
            OccupancySection {
                points,
                live: Some(live),
                note,
            }
        }
    }
}

fn occupancy_point(bucket: &OccupancyBucket) -> OccupancyPoint {
    let at = bucket.at().and_then(parse_timestamp);
    OccupancyPoint {
        label: label(bucket.at(), at.as_ref()),
        at,
        occupancy: bucket.count(),
    }
}

// ── Demographics ─────────────────────────────────────────────────────

pub(crate) fn demographics(response: DemographicsResponse) -> DemographicsSection {
    match response {
        DemographicsResponse::Series(buckets) => {
            let timeline: Vec<_> = buckets.iter().map(demographics_point).collect();
            let male = timeline.iter().map(|p| p.male).sum();
            let female = timeline.iter().map(|p| p.female).sum();
            DemographicsSection {
                timeline,
                split: gender_split(male, female),
                note: None,
            }
        }
        DemographicsResponse::Breakdown(breakdown) => {
            let mut note = None;
            let split = match breakdown.pie_chart {
                Some(pie) if !pie.is_empty() => with_percent(
                    pie.into_iter()
                        .map(|slice| (slice.name, slice.value))
                        .collect(),
                ),
                _ => {
                    note = Some("gender split missing");
                    placeholder::gender_split()
                }
            };
            let timeline = match breakdown.timeseries {
                Some(series) if !series.is_empty() => series
                    .iter()
                    .map(|p| DemographicsPoint {
                        label: chart_label(p),
                        at: None,
                        male: p.male.unwrap_or(0.0),
                        female: p.female.unwrap_or(0.0),
                    })
                    .collect(),
                _ => {
                    note = Some("demographics timeseries missing");
                    placeholder::demographics_series()
                }
            };
            DemographicsSection {
                timeline,
                split,
                note,
            }
        }
    }
}

fn demographics_point(bucket: &DemographicsBucket) -> DemographicsPoint {
    let at = bucket.at().and_then(parse_timestamp);
    DemographicsPoint {
        label: label(bucket.at(), at.as_ref()),
        at,
        male: bucket.male.unwrap_or(0.0),
        female: bucket.female.unwrap_or(0.0),
    }
}

pub(crate) fn gender_split(male: f64, female: f64) -> Vec<GenderSlice> {
    with_percent(vec![("Male".to_owned(), male), ("Female".to_owned(), female)])
}

/// Attach each slice's share of the total; 0 when the total is 0.
fn with_percent(slices: Vec<(String, f64)>) -> Vec<GenderSlice> {
    let total: f64 = slices.iter().map(|(_, v)| v).sum();
    slices
        .into_iter()
        .map(|(name, value)| GenderSlice {
            name,
            value,
            percent: Some(if total > 0.0 { value / total * 100.0 } else { 0.0 }),
        })
        .collect()
}

// ── Entry / exit ─────────────────────────────────────────────────────

pub(crate) fn entry_record(record: EntryExitRecord) -> EntryRecord {
    let gender = [record.gender, record.sex]
        .into_iter()
        .flatten()
        .find(|g| !g.is_empty())
        .unwrap_or_else(|| "Unknown".to_owned());

    EntryRecord {
        person_id: record.person_id.filter(|id| !id.is_empty()),
        name: record
            .person_name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "Unknown".to_owned()),
        gender,
        entry: clock_time(record.entry_local, record.entry_utc.as_ref()),
        exit: clock_time(record.exit_local, record.exit_utc.as_ref()),
        dwell: record.dwell_minutes.map(|minutes| DwellTime { minutes }),
        zone: record.zone_name,
    }
}

/// Backend local string, else the UTC instant as `HH:MM`, else `--`.
fn clock_time(local: Option<String>, utc: Option<&Value>) -> String {
    local
        .filter(|s| !s.is_empty())
        .or_else(|| utc.and_then(parse_timestamp).map(|at| hour_label(&at)))
        .unwrap_or_else(|| "--".to_owned())
}

pub(crate) fn entries_page(
    site_id: String,
    date: NaiveDate,
    page_number: u32,
    page_size: u32,
    page: EntryExitPage,
) -> EntriesPage {
    let total_pages = if page.records.is_empty() {
        1
    } else {
        page.total_pages.filter(|n| *n > 0).unwrap_or(1)
    };
    EntriesPage {
        site_id,
        date,
        page_number,
        page_size,
        total_pages,
        records: page.records.into_iter().map(entry_record).collect(),
        mode: DataMode::Live,
    }
}
