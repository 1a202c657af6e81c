//! Config subcommand handlers.

use std::fmt::Write as _;

use dialoguer::{Confirm, Input, Select};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Defaults, Profile};
use crate::error::CliError;
use crate::output;

use super::util::{self, prompt_err};

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking the plaintext password.
fn format_config_redacted(cfg: &Config) -> String {
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "api_url = \"{}\"", p.api_url);
        if let Some(ref socket) = p.socket_url {
            let _ = writeln!(out, "socket_url = \"{socket}\"");
        }
        if let Some(ref email) = p.email {
            let _ = writeln!(out, "email = \"{email}\"");
        }
        if p.password.is_some() {
            let _ = writeln!(out, "password = \"****\"");
        }
        if let Some(ref env) = p.password_env {
            let _ = writeln!(out, "password_env = \"{env}\"");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
        if let Some(ref state) = p.state_file {
            let _ = writeln!(out, "state_file = \"{}\"", state.display());
        }
        if let Some(ref transports) = p.transports {
            let _ = writeln!(out, "transports = {transports:?}");
        }
        if let Some(insecure) = p.insecure {
            let _ = writeln!(out, "insecure = {insecure}");
        }
        if let Some(ref ca) = p.ca_cert {
            let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
        }
        if p.offline_login_fixture {
            let _ = writeln!(out, "offline_login_fixture = true");
        }
    }
    out
}

fn redacted(cfg: &Config) -> Config {
    Config {
        default_profile: cfg.default_profile.clone(),
        defaults: Defaults {
            output: cfg.defaults.output.clone(),
            color: cfg.defaults.color.clone(),
            timeout: cfg.defaults.timeout,
        },
        profiles: cfg
            .profiles
            .iter()
            .map(|(name, p)| {
                let mut p = p.clone();
                if p.password.is_some() {
                    p.password = Some("****".into());
                }
                (name.clone(), p)
            })
            .collect(),
    }
}

fn parse_bool(field: &str, value: &str) -> Result<bool, CliError> {
    value.parse().map_err(|_| CliError::Validation {
        field: field.into(),
        reason: "must be 'true' or 'false'".into(),
    })
}

fn save(cfg: &Config) -> Result<std::path::PathBuf, CliError> {
    Ok(config::save_config(cfg)?)
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(),

        ConfigCommand::Show => {
            let cfg = redacted(&config::load_config_or_default());
            let out = output::render_single(&global.output, &cfg, format_config_redacted, |_| {
                "config".into()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Set { key, value } => {
            let mut cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);
            let profile = cfg.profiles.entry(profile_name.clone()).or_default();

            match key.as_str() {
                "api_url" | "api-url" => {
                    crowdlens_config::profile_to_dashboard_config(
                        &Profile {
                            api_url: value.clone(),
                            ..Profile::default()
                        },
                        &profile_name,
                        &Defaults::default(),
                    )?;
                    profile.api_url = value;
                }
                "socket_url" | "socket-url" => profile.socket_url = Some(value),
                "email" => profile.email = Some(value),
                "password_env" | "password-env" => profile.password_env = Some(value),
                "timeout" => {
                    profile.timeout = Some(value.parse().map_err(|_| CliError::Validation {
                        field: "timeout".into(),
                        reason: "must be a number (seconds)".into(),
                    })?);
                }
                "state_file" | "state-file" => profile.state_file = Some(value.into()),
                "transports" => {
                    let transports: Vec<String> =
                        value.split(',').map(|t| t.trim().to_owned()).collect();
                    for t in &transports {
                        crowdlens_config::parse_transport(t)?;
                    }
                    profile.transports = Some(transports);
                }
                "insecure" => profile.insecure = Some(parse_bool("insecure", &value)?),
                "ca_cert" | "ca-cert" => profile.ca_cert = Some(value.into()),
                "offline_login_fixture" | "offline-login-fixture" => {
                    profile.offline_login_fixture = parse_bool("offline_login_fixture", &value)?;
                }
                other => {
                    return Err(CliError::Validation {
                        field: other.into(),
                        reason: format!(
                            "unknown config key '{other}'. Valid keys: api_url, socket_url, \
                             email, password_env, timeout, state_file, transports, insecure, \
                             ca_cert, offline_login_fixture"
                        ),
                    });
                }
            }

            save(&cfg)?;
            util::note(global, format!("✓ Set {key} on profile '{profile_name}'"));
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                util::note(global, "No profiles configured. Run: crowdlens config init");
            } else {
                let mut names: Vec<_> = cfg.profiles.keys().collect();
                names.sort();
                for name in names {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    available: config::available_profiles(&cfg),
                    name,
                });
            }
            cfg.default_profile = Some(name.clone());
            save(&cfg)?;
            util::note(global, format!("✓ Default profile set to '{name}'"));
            Ok(())
        }

        ConfigCommand::SetPassword { profile } => {
            let cfg = config::load_config_or_default();
            let profile_name =
                profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));
            if !cfg.profiles.contains_key(&profile_name) {
                return Err(CliError::ProfileNotFound {
                    available: config::available_profiles(&cfg),
                    name: profile_name,
                });
            }

            let secret = rpassword::prompt_password("Password: ").map_err(prompt_err)?;
            if secret.is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "value cannot be empty".into(),
                });
            }
            crowdlens_config::store_password(&profile_name, &secret)?;
            util::note(
                global,
                format!("✓ Password stored in system keyring for profile '{profile_name}'"),
            );
            Ok(())
        }

        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }
    }
}

// ── Init: interactive wizard ─────────────────────────────────────────

fn init() -> Result<(), CliError> {
    let config_path = config::config_path();
    eprintln!("crowdlens configuration wizard");
    eprintln!("   Config path: {}\n", config_path.display());

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default("default".into())
        .interact_text()
        .map_err(prompt_err)?;

    let api_url: String = Input::new()
        .with_prompt("API URL")
        .default("http://localhost:3000/api".into())
        .interact_text()
        .map_err(prompt_err)?;

    let socket_url: String = Input::new()
        .with_prompt("Realtime URL (empty for the API origin)")
        .allow_empty(true)
        .interact_text()
        .map_err(prompt_err)?;

    let email: String = Input::new()
        .with_prompt("Login email")
        .interact_text()
        .map_err(prompt_err)?;

    let store_choices = &[
        "Store password in system keyring (recommended)",
        "Save to config file (plaintext)",
        "Ask at login",
    ];
    let store_selection = Select::new()
        .with_prompt("Where to keep the password?")
        .items(store_choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    let password = match store_selection {
        0 | 1 => {
            let pass = rpassword::prompt_password("Password: ").map_err(prompt_err)?;
            if pass.is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "password cannot be empty".into(),
                });
            }
            if store_selection == 0 {
                crowdlens_config::store_password(&profile_name, &pass)?;
                eprintln!("   ✓ Password stored in system keyring");
                None
            } else {
                Some(pass)
            }
        }
        _ => None,
    };

    let insecure = Confirm::new()
        .with_prompt("Accept invalid TLS certificates?")
        .default(false)
        .interact()
        .map_err(prompt_err)?;

    let profile = Profile {
        api_url,
        socket_url: Some(socket_url).filter(|s| !s.trim().is_empty()),
        email: Some(email).filter(|s| !s.trim().is_empty()),
        password,
        insecure: insecure.then_some(true),
        ..Profile::default()
    };
    // Reject a bad URL before writing anything.
    crowdlens_config::profile_to_dashboard_config(&profile, &profile_name, &Defaults::default())?;

    let mut cfg = config::load_config_or_default();
    cfg.profiles.insert(profile_name.clone(), profile);
    cfg.default_profile = Some(profile_name.clone());

    let path = save(&cfg)?;
    eprintln!("\n✓ Configuration written to {}", path.display());
    eprintln!("  Active profile: {profile_name}");
    eprintln!("\n  Next: crowdlens login");
    Ok(())
}
