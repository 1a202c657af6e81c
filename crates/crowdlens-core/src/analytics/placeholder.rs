// Deterministic stand-in data for sections the backend could not provide.
// Values are fixed so repeated renders and tests agree.

use chrono::NaiveDate;

use crate::model::{
    DataMode, DemographicsPoint, DwellTime, EntriesPage, EntryRecord, GenderSlice, OccupancyPoint,
    Overview,
};

pub(crate) const LIVE_OCCUPANCY: f64 = 734.0;
pub(crate) const FOOTFALL: f64 = 2436.0;
pub(crate) const DWELL_MINUTES: f64 = 8.5;
pub(crate) const ENTRY_TOTAL_PAGES: u32 = 5;

const HOURS: [&str; 11] = [
    "8:00", "9:00", "10:00", "11:00", "12:00", "13:00", "14:00", "15:00", "16:00", "17:00",
    "18:00",
];

const NAMES: [&str; 10] = [
    "Alice Johnson",
    "Brian Smith",
    "Chen Wei",
    "Diana Prince",
    "Emeka Obi",
    "Fatima Khan",
    "George Miller",
    "Hana Sato",
    "Ivan Petrov",
    "Julia Costa",
];

const ZONES: [&str; 3] = ["Main Entrance", "Food Court", "Exit Gate"];

/// Spread `step` over `0..span` so neighbouring hours differ.
fn wobble(i: u32, step: u32, span: u32) -> f64 {
    f64::from((i * step) % span)
}

fn indexed<T>(items: &[T]) -> impl Iterator<Item = (u32, &T)> {
    (0u32..).zip(items)
}

/// Eleven hourly points, 8:00 to 18:00, values in 100..200.
pub(crate) fn occupancy_series() -> Vec<OccupancyPoint> {
    indexed(&HOURS)
        .map(|(i, label)| OccupancyPoint {
            label: (*label).to_owned(),
            at: None,
            occupancy: 100.0 + wobble(i, 37, 100),
        })
        .collect()
}

/// Eleven hourly points; male in 200..250, female in 180..230.
pub(crate) fn demographics_series() -> Vec<DemographicsPoint> {
    indexed(&HOURS)
        .map(|(i, label)| DemographicsPoint {
            label: (*label).to_owned(),
            at: None,
            male: 200.0 + wobble(i, 13, 50),
            female: 180.0 + wobble(i, 29, 50),
        })
        .collect()
}

/// Male 55 / Female 45.
pub(crate) fn gender_split() -> Vec<GenderSlice> {
    vec![
        GenderSlice {
            name: "Male".into(),
            value: 55.0,
            percent: Some(55.0),
        },
        GenderSlice {
            name: "Female".into(),
            value: 45.0,
            percent: Some(45.0),
        },
    ]
}

pub(crate) fn overview(site_id: String, date: NaiveDate, reason: String) -> Overview {
    Overview {
        site_id,
        date,
        dwell: Some(DwellTime {
            minutes: DWELL_MINUTES,
        }),
        footfall: Some(FOOTFALL),
        live_occupancy: Some(LIVE_OCCUPANCY),
        occupancy: occupancy_series(),
        demographics: demographics_series(),
        gender_split: gender_split(),
        mode: DataMode::Degraded { reason },
    }
}

pub(crate) fn entries(
    site_id: String,
    date: NaiveDate,
    page_number: u32,
    page_size: u32,
    reason: String,
) -> EntriesPage {
    let records = indexed(&NAMES)
        .zip(ZONES.iter().cycle())
        .map(|((i, name), zone)| {
            let hour = 8 + i;
            EntryRecord {
                person_id: Some(format!("demo-{}", i + 1)),
                name: (*name).to_owned(),
                gender: if i % 2 == 0 { "Female" } else { "Male" }.to_owned(),
                entry: format!("{hour:02}:{:02}", (i * 17) % 60),
                exit: format!("{:02}:{:02}", hour + 1, (i * 23) % 60),
                dwell: Some(DwellTime {
                    minutes: 20.0 + wobble(i, 11, 40),
                }),
                zone: Some((*zone).to_owned()),
            }
        })
        .collect();

    EntriesPage {
        site_id,
        date,
        page_number,
        page_size,
        total_pages: ENTRY_TOTAL_PAGES,
        records,
        mode: DataMode::Degraded { reason },
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn series_stay_in_range() {
        let occupancy = occupancy_series();
        assert_eq!(occupancy.len(), 11);
        assert_eq!(occupancy[0].label, "8:00");
        assert_eq!(occupancy[10].label, "18:00");
        assert!(occupancy.iter().all(|p| (100.0..200.0).contains(&p.occupancy)));

        let demographics = demographics_series();
        assert!(demographics.iter().all(|p| (200.0..250.0).contains(&p.male)));
        assert!(demographics.iter().all(|p| (180.0..230.0).contains(&p.female)));
    }

    #[test]
    fn placeholders_are_deterministic() {
        assert_eq!(occupancy_series(), occupancy_series());
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let a = entries("s1".into(), date, 1, 10, "down".into());
        let b = entries("s1".into(), date, 1, 10, "down".into());
        assert_eq!(a, b);
    }

    #[test]
    fn degraded_overview_constants() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let overview = overview("s1".into(), date, "backend down".into());
        assert_eq!(overview.live_occupancy, Some(734.0));
        assert_eq!(overview.footfall, Some(2436.0));
        assert_eq!(overview.dwell.unwrap().clock(), "08:30");
        assert!(matches!(overview.mode, DataMode::Degraded { .. }));
    }

    #[test]
    fn degraded_entries_have_five_pages() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let page = entries("s1".into(), date, 2, 10, "backend down".into());
        assert_eq!(page.total_pages, 5);
        assert_eq!(page.records.len(), 10);
        assert_eq!(page.page_number, 2);
    }
}
