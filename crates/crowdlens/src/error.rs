//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError`, `LoginError` and `ConfigError` into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use crowdlens_config::ConfigError;
use crowdlens_core::{CoreError, ErrorKind, LoginError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the backend: {message}")]
    #[diagnostic(
        code(crowdlens::connection_failed),
        help(
            "Check that the backend is running and the profile's api_url is correct.\n\
             Try: crowdlens status"
        )
    )]
    ConnectionFailed { message: String },

    #[error("Realtime channel failed: {reason}")]
    #[diagnostic(
        code(crowdlens::realtime_failed),
        help("Check socket_url in your profile, or pass --socket-url.")
    )]
    RealtimeFailed { reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(code(crowdlens::login_failed))]
    LoginFailed { message: String, kind: ErrorKind },

    #[error("Not logged in")]
    #[diagnostic(code(crowdlens::not_logged_in), help("Run: crowdlens login"))]
    NotLoggedIn,

    #[error("Session rejected by the backend; it has been cleared")]
    #[diagnostic(code(crowdlens::session_rejected), help("Log in again: crowdlens login"))]
    SessionRejected,

    #[error("No password configured for profile '{profile}'")]
    #[diagnostic(
        code(crowdlens::no_credentials),
        help(
            "Store one with: crowdlens config set-password --profile {profile}\n\
             Or set CROWDLENS_PASSWORD, or pass --password-stdin."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(crowdlens::not_found),
        help("Run: crowdlens {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("No site selected")]
    #[diagnostic(
        code(crowdlens::no_site),
        help("Run: crowdlens sites list, then crowdlens sites select <ID>")
    )]
    NoSiteSelected,

    // ── API ──────────────────────────────────────────────────────────
    #[error("Backend error ({kind:?}): {message}")]
    #[diagnostic(code(crowdlens::api_error))]
    Api { kind: ErrorKind, message: String },

    #[error("{message}")]
    #[diagnostic(code(crowdlens::interrupted))]
    Interrupted { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(crowdlens::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(crowdlens::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: crowdlens config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No backend configured")]
    #[diagnostic(
        code(crowdlens::no_config),
        help(
            "Create a profile with: crowdlens config init\n\
             Or pass --api-url. Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(crowdlens::config))]
    Config(Box<ConfigError>),

    #[error("State file {path}: {message}")]
    #[diagnostic(
        code(crowdlens::state_file),
        help("Remove the file to start over; it only holds the session and site selection.")
    )]
    StateFile { path: String, message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::RealtimeFailed { .. } => exit_code::CONNECTION,
            Self::LoginFailed { kind, .. } => match kind {
                ErrorKind::Network => exit_code::CONNECTION,
                ErrorKind::Validation => exit_code::USAGE,
                _ => exit_code::AUTH,
            },
            Self::NotLoggedIn | Self::SessionRejected | Self::NoCredentials { .. } => {
                exit_code::AUTH
            }
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::NoSiteSelected => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::NotAuthenticated => CliError::NotLoggedIn,

            CoreError::NoSiteSelected => CliError::NoSiteSelected,

            CoreError::SiteNotFound { site_id } => CliError::NotFound {
                resource_type: "site".into(),
                identifier: site_id,
                list_command: "sites list".into(),
            },

            CoreError::Superseded | CoreError::Cancelled => CliError::Interrupted {
                message: err.to_string(),
            },

            CoreError::Api(api) => match api.kind() {
                ErrorKind::Network => CliError::ConnectionFailed {
                    message: api.to_string(),
                },
                ErrorKind::Auth => CliError::SessionRejected,
                kind => CliError::Api {
                    kind,
                    message: api.backend_message().unwrap_or_else(|| api.to_string()),
                },
            },

            CoreError::Store { path, message } => CliError::StateFile {
                path: path.display().to_string(),
                message,
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
        }
    }
}

impl From<LoginError> for CliError {
    fn from(err: LoginError) -> Self {
        CliError::LoginFailed {
            message: err.message,
            kind: err.kind,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::UnknownProfile { profile } => CliError::ProfileNotFound {
                name: profile,
                available: String::new(),
            },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(Box::new(other)),
        }
    }
}
