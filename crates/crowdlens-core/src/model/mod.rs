// ── Dashboard domain model ──
//
// Normalized forms of what the backend pushes and returns. Wire types live
// in crowdlens-api; everything here has its fallbacks already applied.

pub mod alert;
pub mod analytics;
pub(crate) mod time;

pub use alert::{AlertEvent, OccupancyReading, Severity};
pub use analytics::{
    DataMode, DemographicsPoint, DwellTime, EntriesPage, EntryRecord, GenderSlice, OccupancyPoint,
    Overview,
};
pub use time::{DayRange, day_utc_range};
