// ── Session manager ──
//
// Login, logout and restore of the authenticated session. The guard half
// is shared with the gateway (as its `SessionHooks`) so a rejected token
// anywhere tears the session down the same way an explicit logout does.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use crowdlens_api::{
    ErrorKind, ForcedLogoutReason, Gateway, RealtimeChannel, SessionHooks, UserId, UserProfile,
};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::DevFixtures;
use crate::error::CoreError;
use crate::live::LiveFeeds;
use crate::sites::SiteContext;
use crate::store::StateStore;

const FILL_ALL_FIELDS: &str = "Please fill in all fields";
const LOGIN_FAILED: &str = "Login failed. Please check your credentials.";
const INVALID_LOGIN_RESPONSE: &str = "Invalid response from server.";
const NETWORK_UNREACHABLE: &str = "Network Error: Unable to connect to the server. Please check your internet connection and try again.";
const SERVER_502: &str = "Server Error (502): The API server is temporarily unavailable. This may be due to server maintenance or network issues. Please try again later or contact support.";
const SERVER_503: &str =
    "Service Unavailable (503): The service is temporarily down. Please try again later.";

// ── State ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    Unauthenticated,
    Authenticated { user: UserProfile },
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    UserRequested,
    /// The backend rejected the token (401/403).
    Unauthorized { status: u16 },
    /// A request was cut off before any response arrived.
    ConnectionAborted,
}

impl From<ForcedLogoutReason> for LogoutReason {
    fn from(reason: ForcedLogoutReason) -> Self {
        match reason {
            ForcedLogoutReason::Unauthorized { status } => Self::Unauthorized { status },
            ForcedLogoutReason::ConnectionAborted => Self::ConnectionAborted,
        }
    }
}

impl fmt::Display for LogoutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserRequested => f.write_str("logged out"),
            Self::Unauthorized { status } => {
                write!(f, "session rejected by the server (HTTP {status})")
            }
            Self::ConnectionAborted => f.write_str("connection to the server was aborted"),
        }
    }
}

/// Where the front end should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Navigation {
    #[default]
    Idle,
    Dashboard,
    Login { reason: LogoutReason },
}

// ── Login input / output ─────────────────────────────────────────────

pub struct Credentials {
    pub email: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: SecretString) -> Self {
        Self {
            email: email.into(),
            password,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// A failed login, already phrased for the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginError {
    pub kind: ErrorKind,
    pub message: String,
}

impl LoginError {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for LoginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for LoginError {}

pub type LoginOutcome = Result<UserProfile, LoginError>;

// ── Guard ────────────────────────────────────────────────────────────

/// Owns the teardown path and hands the gateway its bearer token.
pub struct SessionGuard {
    store: Arc<StateStore>,
    channel: RealtimeChannel,
    feeds: LiveFeeds,
    auth: watch::Sender<AuthState>,
    navigation: watch::Sender<Navigation>,
}

impl SessionGuard {
    pub fn new(store: Arc<StateStore>, channel: RealtimeChannel, feeds: LiveFeeds) -> Self {
        let (auth, _) = watch::channel(AuthState::Unauthenticated);
        let (navigation, _) = watch::channel(Navigation::Idle);
        Self {
            store,
            channel,
            feeds,
            auth,
            navigation,
        }
    }

    /// Disconnect, forget token and user, and route to login.
    /// Safe to call any number of times.
    pub fn teardown(&self, reason: LogoutReason) {
        self.channel.disconnect();
        self.feeds.reset();
        if let Err(e) = self.store.clear_session() {
            warn!(error = %e, "failed to clear the stored session");
        }
        self.auth.send_replace(AuthState::Unauthenticated);
        self.navigation.send_replace(Navigation::Login { reason });
    }

    fn establish(&self, token: &SecretString, user: &UserProfile) {
        self.channel.connect(token);
        self.feeds.attach(&self.channel);
        self.auth.send_replace(AuthState::Authenticated { user: user.clone() });
        self.navigation.send_replace(Navigation::Dashboard);
    }
}

impl SessionHooks for SessionGuard {
    fn bearer_token(&self) -> Option<SecretString> {
        self.store.token()
    }

    fn force_logout(&self, reason: ForcedLogoutReason) {
        warn!(?reason, "forcing logout");
        self.teardown(reason.into());
    }
}

impl fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGuard")
            .field("auth", &*self.auth.borrow())
            .field("navigation", &*self.navigation.borrow())
            .finish_non_exhaustive()
    }
}

// ── Manager ──────────────────────────────────────────────────────────

pub struct SessionManager {
    gateway: Arc<Gateway>,
    guard: Arc<SessionGuard>,
    sites: SiteContext,
    fixtures: DevFixtures,
    hydration: Mutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    pub fn new(
        gateway: Arc<Gateway>,
        guard: Arc<SessionGuard>,
        sites: SiteContext,
        fixtures: DevFixtures,
    ) -> Self {
        Self {
            gateway,
            guard,
            sites,
            fixtures,
            hydration: Mutex::new(None),
        }
    }

    /// Resume a stored session. Needs both token and user; otherwise the
    /// manager stays unauthenticated and returns `false`.
    pub fn restore(&self) -> bool {
        let Some((token, user)) = self.guard.store.session() else {
            debug!("no stored session");
            return false;
        };
        info!(user = user.display_name(), "restoring session");
        self.guard.establish(&token, &user);
        self.spawn_hydration();
        true
    }

    /// Authenticate against the backend.
    ///
    /// On success the session is stored, the realtime channel connected and
    /// site hydration started in the background. Failures come back as an
    /// operator-facing [`LoginError`].
    pub async fn login(&self, credentials: &Credentials) -> LoginOutcome {
        let email = credentials.email.trim();
        if email.is_empty() || credentials.password.expose_secret().is_empty() {
            return Err(LoginError::new(ErrorKind::Validation, FILL_ALL_FIELDS));
        }

        debug!(email, "logging in");
        let response = match self.gateway.login(email, &credentials.password).await {
            Ok(response) => response,
            Err(e) => return self.login_failed(email, &e),
        };

        let Some(token) = response.bearer_token().map(str::to_owned) else {
            warn!(has_user = response.user.is_some(), "login response carried no token");
            return Err(LoginError::new(
                ErrorKind::MalformedResponse,
                INVALID_LOGIN_RESPONSE,
            ));
        };
        let token = SecretString::from(token);
        let user = response
            .user
            .unwrap_or_else(|| UserProfile::from_email(email));

        self.persist(&token, &user);
        self.guard.establish(&token, &user);
        self.spawn_hydration();
        info!(user = user.display_name(), "logged in");
        Ok(user)
    }

    fn login_failed(&self, email: &str, err: &crowdlens_api::Error) -> LoginOutcome {
        warn!(error = %err, status = ?err.status(), "login failed");
        match err.status() {
            Some(502) if self.fixtures.offline_login => Ok(self.offline_session(email)),
            Some(502) => Err(LoginError::new(ErrorKind::Network, SERVER_502)),
            Some(503) => Err(LoginError::new(ErrorKind::Network, SERVER_503)),
            None if err.is_network_error() => {
                Err(LoginError::new(ErrorKind::Network, NETWORK_UNREACHABLE))
            }
            _ => {
                let message = err.backend_message().unwrap_or_else(|| match err.kind() {
                    ErrorKind::Auth => LOGIN_FAILED.to_owned(),
                    _ => err.to_string(),
                });
                Err(LoginError::new(err.kind(), message))
            }
        }
    }

    /// Local session for a backend whose login answers 502. Sites are not
    /// fetched.
    fn offline_session(&self, email: &str) -> UserProfile {
        warn!("backend unavailable, starting an offline development session");
        let token = SecretString::from(format!("mock-token-{}", Utc::now().timestamp_millis()));
        let user = UserProfile {
            id: Some(UserId::Number(1)),
            ..UserProfile::from_email(email)
        };
        self.persist(&token, &user);
        self.guard.establish(&token, &user);
        user
    }

    fn persist(&self, token: &SecretString, user: &UserProfile) {
        if let Err(e) = self.guard.store.set_session(token, user.clone()) {
            warn!(error = %e, "session not persisted; it will not survive a restart");
        }
    }

    fn spawn_hydration(&self) {
        let sites = self.sites.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = sites.hydrate_if_empty().await {
                warn!(error = %e, "site hydration failed");
            }
        });
        let previous = self
            .hydration
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Wait for the background site hydration started by the last login
    /// or restore, if any.
    pub async fn wait_for_hydration(&self) {
        let handle = self
            .hydration
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "site hydration task panicked");
                }
            }
        }
    }

    /// End the session. Idempotent; site selections are kept.
    pub fn logout(&self) {
        if let Some(handle) = self
            .hydration
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
        info!("logging out");
        self.guard.teardown(LogoutReason::UserRequested);
    }

    /// Fails with [`CoreError::NotAuthenticated`] outside a session.
    pub fn require_session(&self) -> Result<UserProfile, CoreError> {
        self.current_user().ok_or(CoreError::NotAuthenticated)
    }

    pub fn is_authenticated(&self) -> bool {
        self.guard.auth.borrow().is_authenticated()
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        match &*self.guard.auth.borrow() {
            AuthState::Authenticated { user } => Some(user.clone()),
            AuthState::Unauthenticated => None,
        }
    }

    pub fn auth_state(&self) -> watch::Receiver<AuthState> {
        self.guard.auth.subscribe()
    }

    pub fn navigation(&self) -> watch::Receiver<Navigation> {
        self.guard.navigation.subscribe()
    }

    pub fn guard(&self) -> &Arc<SessionGuard> {
        &self.guard
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("guard", &self.guard)
            .field("fixtures", &self.fixtures)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crowdlens_api::RealtimeConfig;
    use url::Url;

    fn guard(store: Arc<StateStore>) -> SessionGuard {
        let channel = RealtimeChannel::new(RealtimeConfig::new(
            Url::parse("http://127.0.0.1:9").unwrap(),
        ));
        SessionGuard::new(store, channel, LiveFeeds::new())
    }

    #[test]
    fn forced_logout_clears_token_and_routes_to_login() {
        let store = Arc::new(StateStore::in_memory());
        store
            .set_session(
                &SecretString::from("tok".to_owned()),
                UserProfile::from_email("a@b.c"),
            )
            .unwrap();
        let guard = guard(Arc::clone(&store));
        let nav = guard.navigation.subscribe();

        guard.force_logout(ForcedLogoutReason::Unauthorized { status: 401 });

        assert!(store.token().is_none());
        assert!(guard.bearer_token().is_none());
        assert_eq!(
            *nav.borrow(),
            Navigation::Login {
                reason: LogoutReason::Unauthorized { status: 401 }
            }
        );

        // Twice is harmless.
        guard.force_logout(ForcedLogoutReason::ConnectionAborted);
        assert!(!guard.auth.borrow().is_authenticated());
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let creds = Credentials::new("a@b.c", SecretString::from("hunter2".to_owned()));
        let debug = format!("{creds:?}");
        assert!(debug.contains("a@b.c"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn logout_reason_display() {
        assert_eq!(
            LogoutReason::Unauthorized { status: 403 }.to_string(),
            "session rejected by the server (HTTP 403)"
        );
    }
}
