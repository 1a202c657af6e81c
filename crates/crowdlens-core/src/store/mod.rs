// ── Persistent local store ──
//
// One cached `PersistedState` in front of a `LocalStore` backend. Reads are
// wait-free (`ArcSwap`); writes are serialized, update the cache first and
// then save, so a failing disk never desynchronizes the running session.

mod local;
mod persisted;

use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use crowdlens_api::{Site, UserProfile};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

pub use local::{FileStore, LocalStore, MemoryStore};
pub use persisted::PersistedState;

use crate::error::CoreError;

pub struct StateStore {
    backend: Arc<dyn LocalStore>,
    cache: ArcSwap<PersistedState>,
    write_lock: Mutex<()>,
}

impl StateStore {
    /// Load the backend's state into the cache.
    pub fn open(backend: Arc<dyn LocalStore>) -> Result<Self, CoreError> {
        let state = backend.load()?;
        debug!(?state, "state loaded");
        Ok(Self {
            backend,
            cache: ArcSwap::from_pointee(state),
            write_lock: Mutex::new(()),
        })
    }

    /// In-memory store with no persistence.
    pub fn in_memory() -> Self {
        Self {
            backend: Arc::new(MemoryStore::new()),
            cache: ArcSwap::from_pointee(PersistedState::default()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> Arc<PersistedState> {
        self.cache.load_full()
    }

    // ── Session fields ───────────────────────────────────────────────

    pub fn token(&self) -> Option<SecretString> {
        self.cache
            .load()
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(|t| SecretString::from(t.to_owned()))
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.cache.load().user.clone()
    }

    /// Token and user, only when both are present.
    pub fn session(&self) -> Option<(SecretString, UserProfile)> {
        let state = self.cache.load();
        if !state.has_session() {
            return None;
        }
        Some((self.token()?, state.user.clone()?))
    }

    pub fn set_session(&self, token: &SecretString, user: UserProfile) -> Result<(), CoreError> {
        let token = token.expose_secret().to_owned();
        self.update(move |state| {
            state.token = Some(token);
            state.user = Some(user);
        })
    }

    /// Remove token and user. Site fields are kept.
    pub fn clear_session(&self) -> Result<(), CoreError> {
        self.update(|state| {
            state.token = None;
            state.user = None;
        })
    }

    // ── Site fields ──────────────────────────────────────────────────

    pub fn sites(&self) -> Vec<Site> {
        self.cache.load().sites.clone()
    }

    pub fn current_site(&self) -> Option<Site> {
        self.cache.load().current_site.clone()
    }

    pub fn site_id(&self) -> Option<String> {
        self.cache.load().site_id.clone()
    }

    /// Replace the site list and, when given, the current site.
    pub fn store_sites(&self, sites: Vec<Site>, current: Option<Site>) -> Result<(), CoreError> {
        self.update(move |state| {
            state.sites = sites;
            if let Some(site) = current {
                state.set_current(site);
            }
        })
    }

    pub fn set_current_site(&self, site: Site) -> Result<(), CoreError> {
        self.update(move |state| state.set_current(site))
    }

    /// Forget everything.
    pub fn clear(&self) -> Result<(), CoreError> {
        self.update(|state| *state = PersistedState::default())
    }

    fn update(&self, mutate: impl FnOnce(&mut PersistedState)) -> Result<(), CoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = PersistedState::clone(&self.cache.load());
        mutate(&mut next);
        let next = Arc::new(next);
        self.cache.store(Arc::clone(&next));
        self.backend.save(&next)
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("state", &self.cache.load())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(id: &str) -> Site {
        Site {
            site_id: Some(id.into()),
            name: format!("Site {id}"),
            ..Site::default()
        }
    }

    #[test]
    fn session_round_trip_through_backend() {
        let backend = Arc::new(MemoryStore::new());
        let store = StateStore::open(backend.clone()).unwrap();

        store
            .set_session(
                &SecretString::from("tok".to_owned()),
                UserProfile::from_email("a@b.c"),
            )
            .unwrap();
        assert!(backend.saved().has_session());
        assert!(store.session().is_some());

        store.clear_session().unwrap();
        assert!(store.session().is_none());
        assert_eq!(backend.saved().token, None);
    }

    #[test]
    fn clearing_the_session_keeps_sites() {
        let store = StateStore::in_memory();
        store.store_sites(vec![site("s1")], Some(site("s1"))).unwrap();
        store
            .set_session(&SecretString::from("tok".to_owned()), UserProfile::default())
            .unwrap();

        store.clear_session().unwrap();
        assert_eq!(store.sites().len(), 1);
        assert_eq!(store.site_id().as_deref(), Some("s1"));
    }

    #[test]
    fn current_site_mirrors_site_id() {
        let store = StateStore::in_memory();
        store.set_current_site(site("s7")).unwrap();
        assert_eq!(store.site_id().as_deref(), Some("s7"));
        assert_eq!(store.current_site().unwrap().name, "Site s7");

        store.clear().unwrap();
        assert_eq!(store.site_id(), None);
    }

    #[test]
    fn token_without_user_is_not_a_session() {
        let backend = Arc::new(MemoryStore::with_state(PersistedState {
            token: Some("orphan".into()),
            ..PersistedState::default()
        }));
        let store = StateStore::open(backend).unwrap();
        assert!(store.token().is_some());
        assert!(store.session().is_none());
    }
}
