//! Realtime event channel.
//!
//! One persistent Socket.IO connection to the backend, authenticated with
//! the session token, fanning named push events out to any number of
//! subscribers. The connection is driven by a background task that tries
//! WebSocket first, falls back to HTTP long-polling and reconnects with
//! exponential backoff + jitter.
//!
//! # Example
//!
//! ```rust,ignore
//! use crowdlens_api::realtime::{RealtimeChannel, RealtimeConfig};
//!
//! let channel = RealtimeChannel::new(RealtimeConfig::new(socket_url));
//! channel.connect(&token);
//!
//! let _alerts = channel.subscribe_to_alerts(|payload| {
//!     println!("alert: {payload}");
//! });
//! ```

mod connection;
mod packet;
mod polling;
mod registry;
mod websocket;

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

pub use registry::{Listener, Subscription};

use crate::transport::TransportConfig;
use connection::Shared;
use registry::Registry;

/// Pushed crowd alerts.
pub const ALERT_EVENT: &str = "alert";

/// Pushed live occupancy readings.
pub const LIVE_OCCUPANCY_EVENT: &str = "liveOccupancy";

// ── Configuration ────────────────────────────────────────────────────

/// Underlying transport for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    WebSocket,
    Polling,
}

impl TransportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WebSocket => "websocket",
            Self::Polling => "polling",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exponential backoff configuration for reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

/// Where and how to reach the realtime server.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Server origin, e.g. `https://backend.example.com`.
    pub socket_url: Url,
    /// Mount path of the Socket.IO server. Default: `socket.io`.
    pub path: String,
    /// Transports tried in order on every connection attempt.
    pub transports: Vec<TransportKind>,
    pub reconnect: ReconnectConfig,
    /// TLS, user agent, and the handshake timeout.
    pub transport: TransportConfig,
}

impl RealtimeConfig {
    pub fn new(socket_url: Url) -> Self {
        Self {
            socket_url,
            path: "socket.io".into(),
            transports: vec![TransportKind::WebSocket, TransportKind::Polling],
            reconnect: ReconnectConfig::default(),
            transport: TransportConfig::default(),
        }
    }
}

// ── ChannelState ─────────────────────────────────────────────────────

/// Connection state, published on a watch channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected { transport: TransportKind, sid: String },
    Reconnecting { attempt: u32 },
    /// Rejected by the server or out of retries. A new `connect` starts over.
    Failed { reason: String },
}

impl ChannelState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

// ── RealtimeChannel ──────────────────────────────────────────────────

/// Handle to the realtime channel. Cheap to clone; all clones share one
/// connection and one subscriber registry.
#[derive(Clone)]
pub struct RealtimeChannel {
    inner: Arc<ChannelInner>,
}

struct ChannelInner {
    shared: Arc<Shared>,
    state_rx: watch::Receiver<ChannelState>,
    active: Mutex<Option<ActiveConnection>>,
}

struct ActiveConnection {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RealtimeChannel {
    pub fn new(config: RealtimeConfig) -> Self {
        let (state, state_rx) = watch::channel(ChannelState::Disconnected);
        Self {
            inner: Arc::new(ChannelInner {
                shared: Arc::new(Shared {
                    config,
                    registry: Arc::new(Registry::default()),
                    state,
                }),
                state_rx,
                active: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.inner.shared.config
    }

    /// Open the connection, authenticated with `token`.
    ///
    /// No-op while a connection task is already running (connected or
    /// retrying). Returns `true` if a new connection task was started.
    /// Must be called from within a tokio runtime.
    pub fn connect(&self, token: &SecretString) -> bool {
        let mut active = self.lock_active();
        if active.as_ref().is_some_and(|a| !a.task.is_finished()) {
            debug!("realtime channel already active, ignoring connect");
            return false;
        }

        let cancel = CancellationToken::new();
        let token = SecretString::from(token.expose_secret().to_owned());
        let task = tokio::spawn(connection::run(
            Arc::clone(&self.inner.shared),
            token,
            cancel.clone(),
        ));

        info!(url = %self.inner.shared.config.socket_url, "realtime channel connecting");
        *active = Some(ActiveConnection { cancel, task });
        true
    }

    /// Close the connection and drop every subscription. Safe to call
    /// when already disconnected.
    pub fn disconnect(&self) {
        let previous = self.lock_active().take();
        let was_active = previous.is_some();
        if let Some(active) = previous {
            active.cancel.cancel();
        }

        self.inner.shared.registry.clear();
        self.inner
            .shared
            .state
            .send_replace(ChannelState::Disconnected);

        if was_active {
            info!("realtime channel disconnected");
        }
    }

    /// `true` while a connection task exists, even if it is still connecting.
    pub fn is_active(&self) -> bool {
        self.lock_active()
            .as_ref()
            .is_some_and(|a| !a.task.is_finished())
    }

    /// `true` once the server accepted the socket connect.
    pub fn is_connected(&self) -> bool {
        self.inner.state_rx.borrow().is_connected()
    }

    pub fn current_state(&self) -> ChannelState {
        self.inner.state_rx.borrow().clone()
    }

    /// Watch connection state transitions.
    pub fn state(&self) -> watch::Receiver<ChannelState> {
        self.inner.state_rx.clone()
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Register `callback` for `event`.
    ///
    /// Returns `None` when the channel has not been connected. Any number
    /// of subscribers may listen to the same event; each handle removes
    /// only its own registration. Registrations survive reconnects.
    pub fn subscribe<F>(&self, event: &str, callback: F) -> Option<Subscription>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        if self.lock_active().is_none() {
            debug!(event, "subscribe before connect, no subscription established");
            return None;
        }
        Some(self.inner.shared.registry.register(event, Arc::new(callback)))
    }

    /// Subscribe to the `alert` stream.
    pub fn subscribe_to_alerts<F>(&self, callback: F) -> Option<Subscription>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.subscribe(ALERT_EVENT, callback)
    }

    /// Subscribe to the `liveOccupancy` stream.
    pub fn subscribe_to_live_occupancy<F>(&self, callback: F) -> Option<Subscription>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.subscribe(LIVE_OCCUPANCY_EVENT, callback)
    }

    /// Number of listeners currently registered for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.inner.shared.registry.listener_count(event)
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, Option<ActiveConnection>> {
        self.inner
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for RealtimeChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeChannel")
            .field("socket_url", &self.inner.shared.config.socket_url.as_str())
            .field("state", &*self.inner.state_rx.borrow())
            .finish_non_exhaustive()
    }
}

impl Drop for ChannelInner {
    fn drop(&mut self) {
        let active = self
            .active
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(active) = active.take() {
            active.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> RealtimeChannel {
        RealtimeChannel::new(RealtimeConfig::new(
            Url::parse("http://127.0.0.1:9").unwrap(),
        ))
    }

    #[test]
    fn subscribe_before_connect_returns_none() {
        let channel = channel();
        assert!(channel.subscribe_to_alerts(|_| {}).is_none());
        assert!(channel.subscribe_to_live_occupancy(|_| {}).is_none());
        assert_eq!(channel.listener_count(ALERT_EVENT), 0);
    }

    #[test]
    fn disconnect_when_idle_is_safe() {
        let channel = channel();
        channel.disconnect();
        channel.disconnect();
        assert_eq!(channel.current_state(), ChannelState::Disconnected);
        assert!(!channel.is_active());
    }

    #[tokio::test]
    async fn connect_is_idempotent_and_disconnect_drops_subscriptions() {
        let channel = channel();
        let token = SecretString::from("t".to_owned());

        assert!(channel.connect(&token));
        assert!(!channel.connect(&token));

        let sub = channel.subscribe_to_alerts(|_| {}).unwrap();
        assert!(sub.is_active());
        assert_eq!(channel.listener_count(ALERT_EVENT), 1);

        channel.disconnect();
        assert!(!sub.is_active());
        assert_eq!(channel.listener_count(ALERT_EVENT), 0);
        assert!(channel.subscribe_to_alerts(|_| {}).is_none());
    }
}
