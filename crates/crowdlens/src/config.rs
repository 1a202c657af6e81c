//! CLI configuration: a thin layer over `crowdlens_config`.
//!
//! Adds resolution that respects `GlobalOpts` overrides (--api-url,
//! --socket-url, --timeout, --insecure).

use crowdlens_core::{DashboardConfig, TlsMode};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use crowdlens_config::{
    Config, Defaults, Profile, config_path, load_config_or_default, save_config, state_path,
};

/// The active profile and the runtime config built from it.
pub struct Resolved {
    pub profile_name: String,
    pub profile: Option<Profile>,
    pub dashboard: DashboardConfig,
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.profile_name(global.profile.as_deref()).to_owned()
}

pub(crate) fn available_profiles(config: &Config) -> String {
    let mut names: Vec<_> = config.profiles.keys().cloned().collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort();
    names.join(", ")
}

fn parse_url(field: &str, raw: &str) -> Result<url::Url, CliError> {
    raw.parse().map_err(|_| CliError::Validation {
        field: field.into(),
        reason: format!("invalid URL: {raw}"),
    })
}

/// Build the runtime config from the config file, profile and CLI overrides.
///
/// Without a matching profile, `--api-url` alone is enough.
pub fn resolve(global: &GlobalOpts) -> Result<Resolved, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);
    let profile = cfg.profiles.get(&profile_name).cloned();

    let mut dashboard = match (&profile, global.api_url.as_deref()) {
        (Some(profile), _) => {
            crowdlens_config::profile_to_dashboard_config(profile, &profile_name, &cfg.defaults)?
        }
        (None, Some(api_url)) => {
            let api_url = parse_url("api-url", api_url)?;
            let socket_url = crowdlens_config::socket_origin(&api_url);
            let mut dashboard = DashboardConfig::new(api_url, socket_url);
            dashboard.state_file = Some(state_path(&profile_name));
            dashboard.timeout = std::time::Duration::from_secs(cfg.defaults.timeout);
            dashboard
        }
        (None, None) if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: available_profiles(&cfg),
            });
        }
        (None, None) => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
    };

    // Flag > env > profile
    if let Some(raw) = global.api_url.as_deref() {
        dashboard.api_url = parse_url("api-url", raw)?;
        if global.socket_url.is_none() && profile.as_ref().is_none_or(|p| p.socket_url.is_none()) {
            dashboard.socket_url = crowdlens_config::socket_origin(&dashboard.api_url);
        }
    }
    if let Some(raw) = global.socket_url.as_deref() {
        dashboard.socket_url = parse_url("socket-url", raw)?;
    }
    if let Some(raw) = global.timeout.as_deref() {
        dashboard.timeout = crowdlens_config::parse_timeout(raw)?;
    }
    if global.insecure {
        dashboard.tls = TlsMode::DangerAcceptInvalid;
    }

    Ok(Resolved {
        profile_name,
        profile,
        dashboard,
    })
}
