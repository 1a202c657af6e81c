//! Client core for the crowd-monitoring dashboard, between `crowdlens-api`
//! and UI consumers (CLI).
//!
//! - **[`Dashboard`]**: Owned context wiring everything below. Cheap to
//!   clone; construction never touches the network.
//!
//! - **[`StateStore`]**: Cached session and site state in front of a
//!   [`LocalStore`] backend (`FileStore` on disk, `MemoryStore` in tests).
//!
//! - **[`SessionManager`]**: Login, logout and restore. Its
//!   [`SessionGuard`] is the gateway's `SessionHooks`, so a rejected token
//!   anywhere tears the session down and publishes [`Navigation::Login`].
//!
//! - **[`SiteContext`]**: Site list and current selection, with a scope
//!   generation that lets [`Analytics`] discard responses for an old site.
//!
//! - **[`LiveFeeds`]**: The alert ring and live occupancy gauge fed by the
//!   realtime channel.

pub mod analytics;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod live;
pub mod model;
pub mod session;
pub mod sites;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use analytics::{Analytics, DEFAULT_PAGE_SIZE, EntriesRequest, MAX_PAGE_SIZE};
pub use config::{DashboardConfig, DevFixtures};
pub use dashboard::Dashboard;
pub use error::CoreError;
pub use live::{ALERT_CAPACITY, AlertFeed, AlertStream, LiveFeeds, OccupancyGauge};
pub use session::{
    AuthState, Credentials, LoginError, LoginOutcome, LogoutReason, Navigation, SessionGuard,
    SessionManager,
};
pub use sites::{ScopeToken, SiteContext};
pub use store::{FileStore, LocalStore, MemoryStore, PersistedState, StateStore};

pub use model::{
    AlertEvent, DataMode, DayRange, DemographicsPoint, DwellTime, EntriesPage, EntryRecord,
    GenderSlice, OccupancyPoint, OccupancyReading, Overview, Severity, day_utc_range,
};

// Wire types consumers handle directly.
pub use crowdlens_api::{ChannelState, ErrorKind, Site, TlsMode, TransportKind, UserProfile};
