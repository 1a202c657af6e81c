// ── Dashboard context ──
//
// Wires the store, realtime channel, gateway, site context, live feeds,
// session manager and analytics into one owned context. Nothing here is a
// process-wide singleton; a second `Dashboard` is fully independent.

use std::sync::Arc;

use crowdlens_api::{Gateway, RealtimeChannel, SessionHooks};
use serde_json::Value;
use tracing::{debug, info};

use crate::analytics::Analytics;
use crate::config::DashboardConfig;
use crate::error::CoreError;
use crate::live::LiveFeeds;
use crate::session::{SessionGuard, SessionManager};
use crate::sites::SiteContext;
use crate::store::{FileStore, LocalStore, MemoryStore, StateStore};

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<DashboardInner>`. Construction never touches
/// the network; call [`boot()`](Self::boot) to resume a stored session or
/// [`SessionManager::login`] to start one.
#[derive(Clone)]
pub struct Dashboard {
    inner: Arc<DashboardInner>,
}

struct DashboardInner {
    config: DashboardConfig,
    store: Arc<StateStore>,
    channel: RealtimeChannel,
    gateway: Arc<Gateway>,
    sites: SiteContext,
    feeds: LiveFeeds,
    session: SessionManager,
    analytics: Analytics,
}

impl Dashboard {
    /// Build from configuration, persisting to `config.state_file` when set.
    pub fn new(config: DashboardConfig) -> Result<Self, CoreError> {
        let backend: Arc<dyn LocalStore> = match &config.state_file {
            Some(path) => Arc::new(FileStore::new(path)),
            None => Arc::new(MemoryStore::new()),
        };
        Self::with_store(config, backend)
    }

    /// Build with an explicit state backend.
    pub fn with_store(
        config: DashboardConfig,
        backend: Arc<dyn LocalStore>,
    ) -> Result<Self, CoreError> {
        let store = Arc::new(StateStore::open(backend)?);
        let channel = RealtimeChannel::new(config.realtime());
        let feeds = LiveFeeds::new();
        let guard = Arc::new(SessionGuard::new(
            Arc::clone(&store),
            channel.clone(),
            feeds.clone(),
        ));
        let hooks: Arc<dyn SessionHooks> = guard.clone();
        let gateway = Arc::new(Gateway::new(&config.api_url, &config.transport(), hooks)?);
        let sites = SiteContext::new(Arc::clone(&gateway), Arc::clone(&store));
        let session = SessionManager::new(
            Arc::clone(&gateway),
            guard,
            sites.clone(),
            config.fixtures.clone(),
        );
        let analytics = Analytics::new(Arc::clone(&gateway), sites.clone());

        debug!(api = %config.api_url, socket = %config.socket_url, "dashboard context built");
        Ok(Self {
            inner: Arc::new(DashboardInner {
                config,
                store,
                channel,
                gateway,
                sites,
                feeds,
                session,
                analytics,
            }),
        })
    }

    /// Resume the stored session, if any. Must run inside a Tokio runtime.
    pub fn boot(&self) -> bool {
        let restored = self.inner.session.restore();
        info!(restored, "dashboard booted");
        restored
    }

    /// [`boot()`](Self::boot), then wait for the site hydration it started,
    /// so a one-shot caller sees the site list before scoping a request.
    pub async fn resume(&self) -> bool {
        if !self.boot() {
            return false;
        }
        self.inner.session.wait_for_hydration().await;
        true
    }

    /// Close the realtime channel without touching the stored session.
    pub fn shutdown(&self) {
        self.inner.feeds.detach();
        self.inner.channel.disconnect();
    }

    // ── Simulation ───────────────────────────────────────────────────

    pub async fn start_simulation(&self) -> Result<Value, CoreError> {
        self.inner.session.require_session()?;
        let response = self.inner.gateway.start_simulation().await?;
        info!("simulation started");
        Ok(response)
    }

    pub async fn stop_simulation(&self) -> Result<Value, CoreError> {
        self.inner.session.require_session()?;
        let response = self.inner.gateway.stop_simulation().await?;
        info!("simulation stopped");
        Ok(response)
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn config(&self) -> &DashboardConfig {
        &self.inner.config
    }

    pub fn session(&self) -> &SessionManager {
        &self.inner.session
    }

    pub fn sites(&self) -> &SiteContext {
        &self.inner.sites
    }

    pub fn analytics(&self) -> &Analytics {
        &self.inner.analytics
    }

    pub fn feeds(&self) -> &LiveFeeds {
        &self.inner.feeds
    }

    pub fn channel(&self) -> &RealtimeChannel {
        &self.inner.channel
    }

    pub fn gateway(&self) -> &Gateway {
        &self.inner.gateway
    }

    pub fn store(&self) -> &StateStore {
        &self.inner.store
    }
}

impl std::fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("api_url", &self.inner.config.api_url.as_str())
            .field("session", &self.inner.session)
            .field("channel", &self.inner.channel)
            .finish_non_exhaustive()
    }
}
