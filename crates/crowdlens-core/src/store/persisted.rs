use std::fmt;

use crowdlens_api::{Site, UserProfile};
use serde::{Deserialize, Serialize};

/// Everything the dashboard keeps across restarts.
///
/// Serialized as one JSON object with the keys `token`, `user`, `sites`,
/// `currentSite` and `siteId`. `site_id` mirrors `current_site.site_id`
/// for quick lookup.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sites: Vec<Site>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_site: Option<Site>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,
}

impl PersistedState {
    /// A session exists iff both token and user are present.
    pub fn has_session(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty()) && self.user.is_some()
    }

    pub(crate) fn set_current(&mut self, site: Site) {
        self.site_id = site.id().map(str::to_owned);
        self.current_site = Some(site);
    }
}

impl fmt::Debug for PersistedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistedState")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("user", &self.user)
            .field("sites", &self.sites.len())
            .field("current_site", &self.current_site.as_ref().map(|s| &s.name))
            .field("site_id", &self.site_id)
            .finish()
    }
}
