use thiserror::Error;

/// Coarse failure classification shared by every crate in the workspace.
///
/// The gateway normalizes transport and HTTP outcomes into one of these
/// kinds so callers branch on a single value instead of status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or malformed input, caught before any network call.
    Validation,
    /// No response reached the client, or the backend is temporarily unavailable.
    Network,
    /// 401/403 from the backend.
    Auth,
    /// 400 from the backend (payload shape mismatch).
    BadRequest,
    /// 404, 500 and every other non-success status.
    Server,
    /// A markup document (or undecodable body) where JSON was expected.
    MalformedResponse,
}

/// Top-level error type for the `crowdlens-api` crate.
///
/// Covers every failure mode of the REST gateway and the realtime channel.
/// `crowdlens-core` wraps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// No response was received (connection refused, DNS, timeout, abort),
    /// or the backend answered 502/503.
    #[error("{message}")]
    Network {
        message: String,
        url: String,
        /// HTTP status for synthesized 502/503 errors.
        status: Option<u16>,
        /// The request was sent but the connection dropped before any status line.
        aborted: bool,
    },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or HTTP client construction error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── HTTP status ─────────────────────────────────────────────────
    /// 401 or 403.
    #[error("Not authorized (HTTP {status}) for {url}")]
    Auth {
        status: u16,
        url: String,
        body: String,
    },

    /// 400 -- the backend rejected the payload shape.
    #[error("Bad request to {url}: {message}")]
    BadRequest {
        url: String,
        message: String,
        body: String,
    },

    /// Any other non-success status, propagated unchanged.
    #[error("HTTP {status} from {url}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// A success status with a markup content type: the request was routed
    /// to an error page instead of the API.
    #[error("Server returned an error page instead of JSON ({url})")]
    HtmlResponse {
        url: String,
        status: u16,
        content_type: String,
        body_preview: String,
    },

    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Realtime ────────────────────────────────────────────────────
    /// The realtime transport could not be established or dropped.
    #[error("Realtime connection failed: {0}")]
    RealtimeConnect(String),

    /// The server refused the Socket.IO connect (usually a bad token).
    #[error("Realtime connection rejected: {message}")]
    RealtimeRejected { message: String },

    /// An unparseable or unexpected Engine.IO / Socket.IO packet.
    #[error("Realtime protocol error: {0}")]
    RealtimeProtocol(String),
}

impl Error {
    /// Classify this error into the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. }
            | Self::Tls(_)
            | Self::RealtimeConnect(_)
            | Self::RealtimeProtocol(_) => ErrorKind::Network,
            Self::InvalidUrl(_) => ErrorKind::Validation,
            Self::Auth { .. } | Self::RealtimeRejected { .. } => ErrorKind::Auth,
            Self::BadRequest { .. } => ErrorKind::BadRequest,
            Self::Status { .. } => ErrorKind::Server,
            Self::HtmlResponse { .. } | Self::Deserialization { .. } => {
                ErrorKind::MalformedResponse
            }
        }
    }

    /// `true` for transport failures and synthesized 502/503 errors.
    pub fn is_network_error(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// `true` when a success status carried an HTML body.
    pub fn is_html_response(&self) -> bool {
        matches!(self, Self::HtmlResponse { .. })
    }

    /// HTTP status attached to this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Network { status, .. } => *status,
            Self::Auth { status, .. }
            | Self::Status { status, .. }
            | Self::HtmlResponse { status, .. } => Some(*status),
            Self::BadRequest { .. } => Some(400),
            _ => None,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404) && matches!(self, Self::Status { .. })
    }

    /// The `message` or `error` field of a JSON error body, if present.
    pub fn backend_message(&self) -> Option<String> {
        let body = match self {
            Self::Auth { body, .. } | Self::BadRequest { body, .. } | Self::Status { body, .. } => {
                body
            }
            _ => return None,
        };
        message_from_body(body)
    }
}

/// Extract `message` (or `error`) from a JSON error body.
pub(crate) fn message_from_body(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .and_then(serde_json::Value::as_str)
        .or_else(|| value.get("error").and_then(serde_json::Value::as_str))
        .map(String::from)
}
