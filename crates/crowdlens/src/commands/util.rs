//! Shared helpers for command handlers.

use std::time::Duration;

use chrono::{NaiveDate, Utc};
use indicatif::{ProgressBar, ProgressStyle};

use crowdlens_core::{Dashboard, UserProfile};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Resume the stored session and its sites, or fail with a hint to log in.
pub async fn require_session(dashboard: &Dashboard) -> Result<UserProfile, CliError> {
    if !dashboard.resume().await {
        return Err(CliError::NotLoggedIn);
    }
    Ok(dashboard.session().require_session()?)
}

/// Parse `--date`, defaulting to today (UTC).
pub fn parse_date(raw: Option<&str>) -> Result<NaiveDate, CliError> {
    match raw {
        None => Ok(Utc::now().date_naive()),
        Some(raw) => {
            NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| CliError::Validation {
                field: "date".into(),
                reason: format!("expected YYYY-MM-DD: {e}"),
            })
        }
    }
}

/// Parse a human duration flag like `--for 30s`.
pub fn parse_duration(field: &str, raw: &str) -> Result<Duration, CliError> {
    humantime::parse_duration(raw).map_err(|e| CliError::Validation {
        field: field.into(),
        reason: e.to_string(),
    })
}

/// A stderr spinner, hidden in quiet mode.
pub fn spinner(message: &str, global: &GlobalOpts) -> ProgressBar {
    if global.quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        bar.set_style(style);
    }
    bar.set_message(message.to_owned());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Map a dialoguer / interactive I/O failure into CliError.
pub fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// Print a status line on stderr unless `--quiet`.
pub fn note(global: &GlobalOpts, message: impl std::fmt::Display) {
    if !global.quiet {
        eprintln!("{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_parse_strictly() {
        assert_eq!(
            parse_date(Some("2024-03-15")).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
        );
        assert!(parse_date(Some("15/03/2024")).is_err());
        assert!(parse_date(None).is_ok());
    }

    #[test]
    fn durations_use_humantime() {
        assert_eq!(parse_duration("for", "1m 5s").unwrap(), Duration::from_secs(65));
        assert!(parse_duration("for", "soon").is_err());
    }
}
