//! Login, logout and status handlers.

use std::io::BufRead;

use dialoguer::Input;
use secrecy::SecretString;
use serde::Serialize;

use crowdlens_config::ConfigError;
use crowdlens_core::{Credentials, Dashboard};

use crate::cli::{GlobalOpts, LoginArgs};
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

use super::util;

// ── Views ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct LoginView {
    user: String,
    site: Option<String>,
    sites: usize,
}

#[derive(Serialize)]
struct StatusView {
    profile: String,
    api_url: String,
    socket_url: String,
    state_file: Option<String>,
    authenticated: bool,
    user: Option<String>,
    site_id: Option<String>,
    site: Option<String>,
    known_sites: usize,
}

fn format_status(s: &StatusView) -> String {
    let dash = "-";
    [
        format!("Profile:     {}", s.profile),
        format!("API:         {}", s.api_url),
        format!("Realtime:    {}", s.socket_url),
        format!("State file:  {}", s.state_file.as_deref().unwrap_or(dash)),
        format!(
            "Session:     {}",
            s.user
                .as_deref()
                .map_or_else(|| "not logged in".to_owned(), |u| format!("logged in as {u}"))
        ),
        format!(
            "Site:        {}",
            match (&s.site, &s.site_id) {
                (Some(name), Some(id)) => format!("{name} ({id})"),
                _ => dash.to_owned(),
            }
        ),
        format!("Known sites: {}", s.known_sites),
    ]
    .join("\n")
}

// ── Credentials ─────────────────────────────────────────────────────

fn resolve_email(args: &LoginArgs, resolved: &Resolved) -> Result<String, CliError> {
    if let Some(email) = args
        .email
        .clone()
        .or_else(|| resolved.profile.as_ref().and_then(|p| p.email.clone()))
    {
        return Ok(email);
    }
    Input::new()
        .with_prompt("Email")
        .interact_text()
        .map_err(util::prompt_err)
}

fn resolve_password(args: &LoginArgs, resolved: &Resolved) -> Result<SecretString, CliError> {
    if args.password_stdin {
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        return Ok(SecretString::from(line.trim_end_matches(['\r', '\n']).to_owned()));
    }

    if let Some(profile) = &resolved.profile {
        match crowdlens_config::resolve_password(profile, &resolved.profile_name) {
            Ok(secret) => return Ok(secret),
            Err(ConfigError::NoCredentials { .. }) => {}
            Err(e) => return Err(e.into()),
        }
    }

    let typed = rpassword::prompt_password("Password: ").map_err(util::prompt_err)?;
    Ok(SecretString::from(typed))
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn login(
    dashboard: &Dashboard,
    resolved: &Resolved,
    args: LoginArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let email = resolve_email(&args, resolved)?;
    let password = resolve_password(&args, resolved)?;
    let credentials = Credentials::new(email, password);

    let spinner = util::spinner("Logging in...", global);
    let outcome = dashboard.session().login(&credentials).await;
    let user = match outcome {
        Ok(user) => user,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e.into());
        }
    };

    spinner.set_message("Loading sites...");
    dashboard.session().wait_for_hydration().await;
    spinner.finish_and_clear();

    let view = LoginView {
        user: user.display_name().to_owned(),
        site: dashboard.sites().current_site().map(|s| s.name),
        sites: dashboard.sites().sites().len(),
    };
    let out = output::render_single(
        &global.output,
        &view,
        |v| match &v.site {
            Some(site) => format!("Logged in as {} ({} sites, current: {site})", v.user, v.sites),
            None => format!("Logged in as {} (no sites yet)", v.user),
        },
        |v| v.user.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

pub fn logout(dashboard: &Dashboard, global: &GlobalOpts) -> Result<(), CliError> {
    let was_logged_in = dashboard.store().session().is_some();
    dashboard.session().logout();
    if was_logged_in {
        util::note(global, "Logged out");
    } else {
        util::note(global, "Not logged in");
    }
    Ok(())
}

pub fn status(
    dashboard: &Dashboard,
    resolved: &Resolved,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let store = dashboard.store();
    let user = store.user().filter(|_| store.token().is_some());
    let site = store.current_site();
    let config = dashboard.config();

    let view = StatusView {
        profile: resolved.profile_name.clone(),
        api_url: config.api_url.to_string(),
        socket_url: config.socket_url.to_string(),
        state_file: config.state_file.as_ref().map(|p| p.display().to_string()),
        authenticated: user.is_some(),
        user: user.as_ref().map(|u| u.display_name().to_owned()),
        site_id: site.as_ref().and_then(|s| s.id().map(str::to_owned)),
        site: site.map(|s| s.name),
        known_sites: store.sites().len(),
    };
    let out = output::render_single(&global.output, &view, format_status, |v| {
        v.user.clone().unwrap_or_default()
    });
    output::print_output(&out, global.quiet);
    Ok(())
}
