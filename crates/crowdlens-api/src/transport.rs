// Shared transport configuration for building reqwest::Client instances.
//
// The REST gateway and the realtime channel's polling transport share TLS,
// timeout and user-agent settings through this module.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::Error;

/// Default client-wide request budget.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// TLS verification mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsMode {
    /// Use the system certificate store.
    #[default]
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (self-signed staging backends).
    DangerAcceptInvalid,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: DEFAULT_TIMEOUT,
            user_agent: concat!("crowdlens/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        self.build_client_with_timeout(self.timeout)
    }

    /// Build a client whose per-request timeout differs from the configured one.
    ///
    /// Long-polling requests are held open by the server for up to a full
    /// ping interval, so they need a larger budget than ordinary API calls.
    pub fn build_client_with_timeout(&self, timeout: Duration) -> Result<reqwest::Client, Error> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(self.user_agent.as_str())
            .default_headers(headers);

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timeout_is_ten_seconds() {
        let config = TransportConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.tls, TlsMode::System);
        assert!(config.user_agent.starts_with("crowdlens/"));
    }

    #[test]
    fn missing_ca_file_is_a_tls_error() {
        let config = TransportConfig {
            tls: TlsMode::CustomCa(PathBuf::from("/nonexistent/ca.pem")),
            ..TransportConfig::default()
        };
        let err = config.build_client().unwrap_err();
        assert!(matches!(err, Error::Tls(_)), "got {err:?}");
    }
}
