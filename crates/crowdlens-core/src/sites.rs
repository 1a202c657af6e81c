// ── Site context ──
//
// The list of monitorable sites and the single current selection that
// scopes every analytics request. Memory is seeded from the state store and
// every change is written back and published on watch channels. Each
// selection bumps a generation counter so results fetched for an older
// selection can be recognized and dropped.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crowdlens_api::{Gateway, Site};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::store::StateStore;

/// Identifies the selection a request was issued under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeToken {
    pub site_id: String,
    pub generation: u64,
}

#[derive(Clone)]
pub struct SiteContext {
    inner: Arc<SiteInner>,
}

struct SiteInner {
    gateway: Arc<Gateway>,
    store: Arc<StateStore>,
    sites: watch::Sender<Arc<Vec<Site>>>,
    current: watch::Sender<Option<Site>>,
    generation: AtomicU64,
    fetch_lock: Mutex<()>,
}

impl SiteContext {
    pub fn new(gateway: Arc<Gateway>, store: Arc<StateStore>) -> Self {
        let (sites, _) = watch::channel(Arc::new(store.sites()));
        let (current, _) = watch::channel(store.current_site().filter(|s| s.id().is_some()));
        Self {
            inner: Arc::new(SiteInner {
                gateway,
                store,
                sites,
                current,
                generation: AtomicU64::new(0),
                fetch_lock: Mutex::new(()),
            }),
        }
    }

    // ── Hydration ────────────────────────────────────────────────────

    /// Restore the stored site list without a network call when one exists;
    /// otherwise fetch it.
    pub async fn hydrate_if_empty(&self) -> Result<(), CoreError> {
        let stored = self.inner.store.sites();
        if stored.is_empty() {
            debug!("no stored sites, fetching");
            self.refresh_sites().await?;
            return Ok(());
        }

        let current = self.inner.store.current_site().filter(|s| s.id().is_some());
        debug!(count = stored.len(), "restoring stored sites");
        match current {
            Some(site) => {
                self.inner.sites.send_replace(Arc::new(stored));
                self.inner.current.send_replace(Some(site));
            }
            None => {
                // A list with no selection: fall back to the first site.
                self.apply(stored)?;
            }
        }
        Ok(())
    }

    /// Re-fetch the site list unconditionally.
    ///
    /// A prior selection whose id is still listed is kept (refreshed to the
    /// fetched copy); otherwise the first site becomes current.
    pub async fn refresh_sites(&self) -> Result<Arc<Vec<Site>>, CoreError> {
        let _guard = self.inner.fetch_lock.lock().await;
        let fetched = self.inner.gateway.list_sites().await?;
        self.apply(fetched)?;
        Ok(self.sites())
    }

    fn apply(&self, fetched: Vec<Site>) -> Result<(), CoreError> {
        let sites = sanitize(fetched);
        let Some(first) = sites.first() else {
            warn!("backend returned no sites with an id");
            return Ok(());
        };

        let prior = self.current_site_id_quiet();
        let current = prior
            .as_deref()
            .and_then(|id| sites.iter().find(|s| s.id() == Some(id)))
            .unwrap_or(first)
            .clone();
        let changed = prior.as_deref() != current.id();

        info!(count = sites.len(), current = ?current.id(), "sites loaded");
        self.inner.sites.send_replace(Arc::new(sites.clone()));
        self.inner.current.send_replace(Some(current.clone()));
        if changed {
            self.bump();
        }

        self.inner.store.store_sites(sites, Some(current))
    }

    // ── Selection ────────────────────────────────────────────────────

    /// Make `site` current. Returns `false` (and logs) when it has no id.
    pub fn select_site(&self, site: &Site) -> bool {
        let Some(site_id) = site.id() else {
            warn!(name = %site.name, "cannot select a site without a siteId");
            return false;
        };

        self.inner.current.send_replace(Some(site.clone()));
        let generation = self.bump();
        info!(site_id, generation, "site selected");

        if let Err(e) = self.inner.store.set_current_site(site.clone()) {
            warn!(error = %e, "site selection not persisted");
        }
        true
    }

    /// Select a site from the loaded list by id.
    pub fn select_site_by_id(&self, site_id: &str) -> Result<Site, CoreError> {
        let site = self
            .sites()
            .iter()
            .find(|s| s.id() == Some(site_id))
            .cloned()
            .ok_or_else(|| CoreError::SiteNotFound {
                site_id: site_id.to_owned(),
            })?;
        self.select_site(&site);
        Ok(site)
    }

    pub fn current_site(&self) -> Option<Site> {
        self.inner.current.borrow().clone()
    }

    /// Id of the current site. `None` (with a warning) before any selection.
    pub fn current_site_id(&self) -> Option<String> {
        let id = self.current_site_id_quiet();
        if id.is_none() {
            warn!("no site selected yet; fetch sites first");
        }
        id
    }

    fn current_site_id_quiet(&self) -> Option<String> {
        self.inner
            .current
            .borrow()
            .as_ref()
            .and_then(Site::id)
            .map(str::to_owned)
    }

    pub fn sites(&self) -> Arc<Vec<Site>> {
        Arc::clone(&self.inner.sites.borrow())
    }

    /// Fetch one site from the backend.
    pub async fn site(&self, site_id: &str) -> Result<Site, CoreError> {
        match self.inner.gateway.get_site(site_id).await {
            Ok(site) => Ok(site),
            Err(e) if e.is_not_found() => Err(CoreError::SiteNotFound {
                site_id: site_id.to_owned(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    // ── Scope generation ─────────────────────────────────────────────

    /// Capture the current selection for a request about to be issued.
    pub fn scope(&self) -> Result<ScopeToken, CoreError> {
        let site_id = self.current_site_id().ok_or(CoreError::NoSiteSelected)?;
        Ok(ScopeToken {
            site_id,
            generation: self.generation(),
        })
    }

    /// Whether `token` still describes the current selection.
    pub fn is_current(&self, token: &ScopeToken) -> bool {
        token.generation == self.generation()
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    fn bump(&self) -> u64 {
        self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    // ── Watches ──────────────────────────────────────────────────────

    /// Fires on every selection; screens re-fetch on change.
    pub fn watch_current(&self) -> watch::Receiver<Option<Site>> {
        self.inner.current.subscribe()
    }

    pub fn watch_sites(&self) -> watch::Receiver<Arc<Vec<Site>>> {
        self.inner.sites.subscribe()
    }
}

/// Drop entries without a usable id and duplicate ids (first one wins).
fn sanitize(fetched: Vec<Site>) -> Vec<Site> {
    let mut seen = HashSet::new();
    fetched
        .into_iter()
        .filter(|site| match site.id() {
            None => {
                warn!(name = %site.name, "dropping site without a siteId");
                false
            }
            Some(id) => {
                let fresh = seen.insert(id.to_owned());
                if !fresh {
                    warn!(site_id = id, "dropping duplicate site");
                }
                fresh
            }
        })
        .collect()
}
