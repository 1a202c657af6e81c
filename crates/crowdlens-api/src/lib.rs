// crowdlens-api: Async Rust client for the crowd analytics backend (REST + realtime)

pub mod error;
pub mod gateway;
pub mod models;
pub mod realtime;
pub mod resources;
pub mod transport;

pub use error::{Error, ErrorKind};
pub use gateway::{ForcedLogoutReason, Gateway, NoSession, SessionHooks, LOGIN_PATH};
pub use models::{
    AnalyticsQuery, DemographicsBucket, DemographicsResponse, DwellResponse, EntryExitPage,
    EntryExitQuery, EntryExitRecord, FootfallResponse, LoginResponse, OccupancyBucket,
    OccupancyResponse, Site, UserId, UserProfile,
};
pub use realtime::{
    ALERT_EVENT, ChannelState, LIVE_OCCUPANCY_EVENT, RealtimeChannel, RealtimeConfig,
    ReconnectConfig, Subscription, TransportKind,
};
pub use transport::{TlsMode, TransportConfig};
