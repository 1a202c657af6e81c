// Request gateway
//
// Every REST call to the analytics backend goes through one configured
// `reqwest::Client` and three interceptor stages:
//
// - request stage: attach `Authorization: Bearer <token>` when a session exists
// - response stage: reject success responses that carry an HTML document
// - error stage: classify transport/HTTP failures and force a logout on
//   authorization failures (except for the login call itself)
//
// Endpoint wrappers live in `resources/` as inherent methods on `Gateway`.

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};
use url::Url;

use crate::error::{Error, message_from_body};
use crate::transport::TransportConfig;

/// Path of the authentication endpoint, exempt from forced logout.
pub const LOGIN_PATH: &str = "auth/login";

const BODY_PREVIEW_LEN: usize = 200;

// ── Session hooks ────────────────────────────────────────────────────

/// Why the gateway tore down the local session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForcedLogoutReason {
    /// The backend answered 401 or 403.
    Unauthorized { status: u16 },
    /// The request was aborted before any HTTP status was received.
    ConnectionAborted,
}

/// Seam between the gateway and whoever owns the session.
///
/// The gateway reads the bearer token before every request and calls
/// [`force_logout`](Self::force_logout) when the backend rejects it.
pub trait SessionHooks: Send + Sync {
    /// Current bearer token, if a session exists.
    fn bearer_token(&self) -> Option<SecretString>;

    /// Clear the local session and send the operator back to the login screen.
    fn force_logout(&self, reason: ForcedLogoutReason);
}

/// Hooks for anonymous use: no token, forced logouts are only logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSession;

impl SessionHooks for NoSession {
    fn bearer_token(&self) -> Option<SecretString> {
        None
    }

    fn force_logout(&self, reason: ForcedLogoutReason) {
        debug!(?reason, "forced logout without a session owner");
    }
}

// ── Gateway ──────────────────────────────────────────────────────────

/// The single HTTP client for the analytics backend.
pub struct Gateway {
    http: reqwest::Client,
    base_url: Url,
    hooks: Arc<dyn SessionHooks>,
}

impl Gateway {
    /// Create a gateway from a `TransportConfig`.
    ///
    /// `base_url` is the API root (e.g. `https://backend.example.com/api`);
    /// a trailing slash is added so relative endpoint paths join under it.
    pub fn new(
        base_url: &Url,
        transport: &TransportConfig,
        hooks: Arc<dyn SessionHooks>,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, hooks))
    }

    /// Create a gateway around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: &Url, hooks: Arc<dyn SessionHooks>) -> Self {
        Self {
            http,
            base_url: normalize_base_url(base_url),
            hooks,
        }
    }

    /// The API root every endpoint path is joined onto.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Join a relative endpoint path onto the API root.
    pub(crate) fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// Build a URL from individually percent-encoded path segments.
    pub(crate) fn segments_url(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.url(path)?;
        self.send(Method::GET, url, path, None::<&()>).await
    }

    pub(crate) async fn get_url<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        let path = url.path().to_owned();
        self.send(Method::GET, url, &path, None::<&()>).await
    }

    pub(crate) async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        let url = self.url(path)?;
        self.send(Method::POST, url, path, Some(body)).await
    }

    /// Run one request through all three interceptor stages.
    async fn send<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        method: Method,
        url: Url,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, Error> {
        debug!("{} {}", method, url);

        let mut builder = self.http.request(method.clone(), url.clone());
        if let Some(body) = body {
            builder = builder.json(body);
        }
        builder = self.authorize(builder);

        let call = Call {
            method: &method,
            url: &url,
            login: is_login_endpoint(path),
            payload: body.and_then(|b| serde_json::to_string(b).ok()),
        };

        match builder.send().await {
            Ok(resp) => self.handle_response(resp, &call).await,
            Err(e) => Err(self.handle_transport_error(&e, &call)),
        }
    }

    // ── Request stage ────────────────────────────────────────────────

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.hooks.bearer_token() {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    // ── Response stage ───────────────────────────────────────────────

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
        call: &Call<'_>,
    ) -> Result<T, Error> {
        let status = resp.status();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned();

        let body = match resp.text().await {
            Ok(body) => body,
            Err(e) => return Err(self.handle_transport_error(&e, call)),
        };

        if !status.is_success() {
            return Err(self.handle_status(status, body, call));
        }

        if content_type.contains("text/html") {
            warn!(url = %call.url, "received HTML instead of JSON, probably an error page");
            return Err(Error::HtmlResponse {
                url: call.url.to_string(),
                status: status.as_u16(),
                content_type,
                body_preview: preview(&body).to_owned(),
            });
        }

        decode_body(&body)
    }

    // ── Error stage ──────────────────────────────────────────────────

    /// No HTTP status was received.
    fn handle_transport_error(&self, err: &reqwest::Error, call: &Call<'_>) -> Error {
        let aborted = !err.is_timeout() && !err.is_connect() && (err.is_request() || err.is_body());

        error!(
            method = %call.method,
            url = %call.url,
            timeout = err.is_timeout(),
            connect = err.is_connect(),
            aborted,
            error = %err,
            "network error"
        );

        if aborted && !call.login {
            self.hooks.force_logout(ForcedLogoutReason::ConnectionAborted);
        }

        let message = if err.is_timeout() {
            "Network Error: request timed out".to_owned()
        } else {
            format!("Network Error: {err}")
        };

        Error::Network {
            message,
            url: call.url.to_string(),
            status: None,
            aborted,
        }
    }

    /// A non-success HTTP status was received.
    fn handle_status(&self, status: StatusCode, body: String, call: &Call<'_>) -> Error {
        let url = call.url.to_string();

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                if !call.login {
                    warn!(status = status.as_u16(), %url, "authorization rejected, forcing logout");
                    self.hooks.force_logout(ForcedLogoutReason::Unauthorized {
                        status: status.as_u16(),
                    });
                }
                Error::Auth {
                    status: status.as_u16(),
                    url,
                    body,
                }
            }
            StatusCode::BAD_GATEWAY => {
                error!(%url, "502 Bad Gateway - server may be down or unreachable");
                Error::Network {
                    message: "Server is temporarily unavailable. Please try again later.".into(),
                    url,
                    status: Some(502),
                    aborted: false,
                }
            }
            StatusCode::SERVICE_UNAVAILABLE => Error::Network {
                message: "Service is temporarily unavailable. Please try again later.".into(),
                url,
                status: Some(503),
                aborted: false,
            },
            StatusCode::BAD_REQUEST => {
                let message = message_from_body(&body)
                    .unwrap_or_else(|| "Bad Request - Invalid payload".to_owned());
                error!(
                    method = %call.method,
                    %url,
                    payload = call.payload.as_deref().unwrap_or(""),
                    response = preview(&body),
                    %message,
                    "400 Bad Request"
                );
                Error::BadRequest { url, message, body }
            }
            _ => Error::Status {
                status: status.as_u16(),
                url,
                body,
            },
        }
    }
}

/// Per-request facts the error stage needs.
struct Call<'a> {
    method: &'a Method,
    url: &'a Url,
    login: bool,
    payload: Option<String>,
}

// ── Helpers ──────────────────────────────────────────────────────────

/// Whether `path` targets the authentication endpoint.
pub(crate) fn is_login_endpoint(path: &str) -> bool {
    let path = path.split('?').next().unwrap_or_default().trim_matches('/');
    path == LOGIN_PATH || path.ends_with("/auth/login") || path.ends_with("login")
}

fn normalize_base_url(base: &Url) -> Url {
    let mut url = base.clone();
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn decode_body<T: DeserializeOwned>(body: &str) -> Result<T, Error> {
    let text = if body.trim().is_empty() { "null" } else { body };
    serde_json::from_str(text).map_err(|e| Error::Deserialization {
        message: format!("{e} (body preview: {:?})", preview(body)),
        body: body.to_owned(),
    })
}

fn preview(body: &str) -> &str {
    match body.char_indices().nth(BODY_PREVIEW_LEN) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
