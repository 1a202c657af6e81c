//! Shared configuration for crowdlens clients.
//!
//! TOML profiles, password resolution (env + keyring + plaintext), and
//! translation to `crowdlens_core::DashboardConfig`. The CLI layers its
//! global flags on top.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crowdlens_core::{DashboardConfig, DevFixtures, TlsMode, TransportKind};

const KEYRING_SERVICE: &str = "crowdlens";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("unknown profile '{profile}'")]
    UnknownProfile { profile: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named backend profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Name of the profile to use: the explicit one, else the default.
    pub fn profile_name<'a>(&'a self, explicit: Option<&'a str>) -> &'a str {
        explicit
            .or(self.default_profile.as_deref())
            .unwrap_or("default")
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    10
}

/// A named backend profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// API root (e.g., "https://backend.example.com/api").
    pub api_url: String,

    /// Realtime origin. Defaults to the origin of `api_url`.
    pub socket_url: Option<String>,

    /// Login email.
    pub email: Option<String>,

    /// Plaintext password. Prefer the keyring or `password_env`.
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Override request timeout (seconds).
    pub timeout: Option<u64>,

    /// Where the session and site selection are kept.
    pub state_file: Option<PathBuf>,

    /// Realtime transports in preference order ("websocket", "polling").
    pub transports: Option<Vec<String>>,

    /// Accept invalid TLS certificates (staging backends).
    pub insecure: Option<bool>,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Fabricate a local session when login answers 502. Development only.
    #[serde(default)]
    pub offline_login_fixture: bool,
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "crowdlens", "crowdlens")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default state file for `profile_name`.
pub fn state_path(profile_name: &str) -> PathBuf {
    let file = format!("{profile_name}.json");
    project_dirs().map_or_else(
        || dirs_fallback().join("state").join(&file),
        |dirs| dirs.data_local_dir().join("state").join(&file),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("crowdlens");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from file + environment.
///
/// Environment keys use `__` between levels, e.g.
/// `CROWDLENS_PROFILES__DEFAULT__API_URL`.
pub fn load_config() -> Result<Config, ConfigError> {
    let path = config_path();

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("CROWDLENS_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(&path, toml_str)?;
    Ok(path)
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, ConfigError> {
    Ok(keyring::Entry::new(
        KEYRING_SERVICE,
        &format!("{profile_name}/password"),
    )?)
}

/// Resolve the login password: profile env var, `CROWDLENS_PASSWORD`,
/// system keyring, then plaintext.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Env vars
    let env_names = profile
        .password_env
        .as_deref()
        .into_iter()
        .chain(std::iter::once("CROWDLENS_PASSWORD"));
    for name in env_names {
        if let Ok(val) = std::env::var(name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring_entry(profile_name) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Save a password in the system keyring for `profile_name`.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(password)?;
    Ok(())
}

// ── Profile → DashboardConfig ───────────────────────────────────────

fn parse_url(field: &str, raw: &str) -> Result<url::Url, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL: {raw}"),
    })
}

/// `scheme://host[:port]/` of `url`, the default realtime origin.
pub fn socket_origin(url: &url::Url) -> url::Url {
    let mut origin = url.clone();
    origin.set_path("/");
    origin.set_query(None);
    origin.set_fragment(None);
    origin
}

pub fn parse_transport(raw: &str) -> Result<TransportKind, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "websocket" | "ws" => Ok(TransportKind::WebSocket),
        "polling" => Ok(TransportKind::Polling),
        other => Err(ConfigError::Validation {
            field: "transports".into(),
            reason: format!("expected 'websocket' or 'polling', got '{other}'"),
        }),
    }
}

/// Build a `DashboardConfig` from a profile, without CLI flag overrides.
pub fn profile_to_dashboard_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<DashboardConfig, ConfigError> {
    let api_url = parse_url("api_url", &profile.api_url)?;
    let socket_url = match profile.socket_url.as_deref() {
        Some(raw) => parse_url("socket_url", raw)?,
        None => socket_origin(&api_url),
    };

    let mut config = DashboardConfig::new(api_url, socket_url);
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.state_file = Some(
        profile
            .state_file
            .clone()
            .unwrap_or_else(|| state_path(profile_name)),
    );
    if let Some(ref transports) = profile.transports {
        config.transports = transports
            .iter()
            .map(|t| parse_transport(t))
            .collect::<Result<_, _>>()?;
    }
    config.tls = if profile.insecure.unwrap_or(false) {
        TlsMode::DangerAcceptInvalid
    } else if let Some(ref ca) = profile.ca_cert {
        TlsMode::CustomCa(ca.clone())
    } else {
        TlsMode::System
    };
    config.fixtures = DevFixtures {
        offline_login: profile.offline_login_fixture,
    };
    Ok(config)
}

/// Parse a human duration ("10s", "1m 30s") as a timeout override.
pub fn parse_timeout(raw: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(raw).map_err(|e| ConfigError::Validation {
        field: "timeout".into(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Config {
        toml::from_str(
            r#"
            default_profile = "staging"

            [profiles.staging]
            api_url = "https://backend.example.com/api"
            email = "ops@example.com"
            transports = ["polling"]
            timeout = 3
            offline_login_fixture = true
            "#,
        )
        .unwrap()
    }

    #[test]
    fn defaults_fill_missing_sections() {
        let cfg = sample();
        assert_eq!(cfg.defaults.output, "table");
        assert_eq!(cfg.defaults.timeout, 10);
        assert_eq!(cfg.profile_name(None), "staging");
        assert_eq!(cfg.profile_name(Some("prod")), "prod");
        assert!(matches!(cfg.profile("prod"), Err(ConfigError::UnknownProfile { .. })));
    }

    #[test]
    fn profile_translates_to_dashboard_config() {
        let cfg = sample();
        let profile = cfg.profile("staging").unwrap();
        let dash = profile_to_dashboard_config(profile, "staging", &cfg.defaults).unwrap();

        assert_eq!(dash.api_url.as_str(), "https://backend.example.com/api");
        assert_eq!(dash.socket_url.as_str(), "https://backend.example.com/");
        assert_eq!(dash.timeout, Duration::from_secs(3));
        assert_eq!(dash.transports, vec![TransportKind::Polling]);
        assert!(dash.fixtures.offline_login);
        assert!(dash.state_file.unwrap().ends_with("state/staging.json"));
    }

    #[test]
    fn bad_values_are_validation_errors() {
        let profile = Profile {
            api_url: "not a url".into(),
            ..Profile::default()
        };
        assert!(matches!(
            profile_to_dashboard_config(&profile, "x", &Defaults::default()),
            Err(ConfigError::Validation { .. })
        ));
        assert!(parse_transport("carrier-pigeon").is_err());
        assert_eq!(parse_timeout("1m 30s").unwrap(), Duration::from_secs(90));
    }

    #[test]
    fn plaintext_password_is_last_resort() {
        let profile = Profile {
            password: Some("pw".into()),
            password_env: Some("CROWDLENS_TEST_UNSET_PASSWORD_VAR".into()),
            ..Profile::default()
        };
        // Keyring lookups fail in CI sandboxes; the plaintext value wins.
        if std::env::var("CROWDLENS_PASSWORD").is_err() {
            let secret = resolve_password(&profile, "no-such-profile-in-keyring").unwrap();
            assert_eq!(secrecy::ExposeSecret::expose_secret(&secret), "pw");
        }
    }
}
