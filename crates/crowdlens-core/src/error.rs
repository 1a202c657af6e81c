// ── Core error types ──
//
// Errors surfaced to consumers of crowdlens-core. API failures keep their
// classification (`ErrorKind`) so screens can branch on one value; the
// `From<crowdlens_api::Error>` impl carries the original error along.

use std::path::PathBuf;

use crowdlens_api::ErrorKind;
use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Input ────────────────────────────────────────────────────────
    #[error("{message}")]
    Validation { message: String },

    // ── Session / scope ──────────────────────────────────────────────
    #[error("Not logged in")]
    NotAuthenticated,

    #[error("No site selected; the request cannot be scoped")]
    NoSiteSelected,

    #[error("Site not found: {site_id}")]
    SiteNotFound { site_id: String },

    /// The site changed while the request was in flight; the result was discarded.
    #[error("Result discarded: site selection changed while the request was in flight")]
    Superseded,

    #[error("Request cancelled")]
    Cancelled,

    // ── Backend ──────────────────────────────────────────────────────
    #[error(transparent)]
    Api(#[from] crowdlens_api::Error),

    // ── Local state ──────────────────────────────────────────────────
    #[error("State file {path}: {message}")]
    Store { path: PathBuf, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Classification shared with the gateway taxonomy.
    ///
    /// Errors raised locally (no site, cancelled, state file) have no kind.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Validation { .. } => Some(ErrorKind::Validation),
            Self::NotAuthenticated => Some(ErrorKind::Auth),
            Self::Api(e) => Some(e.kind()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::SiteNotFound { .. } => true,
            Self::Api(e) => e.is_not_found(),
            _ => false,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
