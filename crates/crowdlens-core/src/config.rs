// ── Runtime dashboard configuration ──
//
// These types describe *where* the backend lives and how to talk to it.
// They never touch disk: crowdlens-config (or a test) builds a
// `DashboardConfig` and hands it to `Dashboard::new`.

use std::path::PathBuf;
use std::time::Duration;

use crowdlens_api::{RealtimeConfig, ReconnectConfig, TlsMode, TransportConfig, TransportKind};
use url::Url;

/// Development-only behaviors. All disabled by default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DevFixtures {
    /// When the login call answers 502, fabricate a local session instead
    /// of failing. Lets the dashboard run against a half-deployed backend.
    pub offline_login: bool,
}

/// Configuration for one dashboard client.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// API root, e.g. `https://backend.example.com/api`.
    pub api_url: Url,
    /// Realtime server origin, e.g. `https://backend.example.com`.
    pub socket_url: Url,
    /// Client-wide request timeout.
    pub timeout: Duration,
    pub tls: TlsMode,
    /// Realtime transports in preference order.
    pub transports: Vec<TransportKind>,
    pub reconnect: ReconnectConfig,
    /// Where the persisted session/site state lives. `None` keeps it in memory.
    pub state_file: Option<PathBuf>,
    pub fixtures: DevFixtures,
}

impl DashboardConfig {
    /// Config with defaults for everything but the two endpoints.
    pub fn new(api_url: Url, socket_url: Url) -> Self {
        Self {
            api_url,
            socket_url,
            timeout: crowdlens_api::transport::DEFAULT_TIMEOUT,
            tls: TlsMode::System,
            transports: vec![TransportKind::WebSocket, TransportKind::Polling],
            reconnect: ReconnectConfig::default(),
            state_file: None,
            fixtures: DevFixtures::default(),
        }
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: self.tls.clone(),
            ..TransportConfig::default()
        }
        .with_timeout(self.timeout)
    }

    pub(crate) fn realtime(&self) -> RealtimeConfig {
        let mut config = RealtimeConfig::new(self.socket_url.clone());
        config.transports.clone_from(&self.transports);
        config.reconnect = self.reconnect.clone();
        config.transport = self.transport();
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn realtime_config_inherits_transport_settings() {
        let mut config = DashboardConfig::new(
            Url::parse("https://b.example.com/api").unwrap(),
            Url::parse("https://b.example.com").unwrap(),
        );
        config.timeout = Duration::from_secs(3);
        config.transports = vec![TransportKind::Polling];

        let realtime = config.realtime();
        assert_eq!(realtime.transport.timeout, Duration::from_secs(3));
        assert_eq!(realtime.transports, vec![TransportKind::Polling]);
        assert_eq!(realtime.socket_url.as_str(), "https://b.example.com/");
        assert!(!config.fixtures.offline_login);
    }
}
