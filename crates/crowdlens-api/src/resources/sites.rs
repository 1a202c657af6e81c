// Site endpoints

use tracing::debug;

use crate::error::Error;
use crate::gateway::Gateway;
use crate::models::{Site, SiteEnvelope, SitesEnvelope};

impl Gateway {
    /// List every site visible to the operator.
    ///
    /// `GET sites` (bare array or `{"data": [...]}`)
    pub async fn list_sites(&self) -> Result<Vec<Site>, Error> {
        debug!("listing sites");
        let envelope: SitesEnvelope = self.get("sites").await?;
        Ok(envelope.into_sites())
    }

    /// Fetch a single site.
    ///
    /// `GET sites/{id}`
    pub async fn get_site(&self, site_id: &str) -> Result<Site, Error> {
        debug!(site_id, "fetching site");
        let url = self.segments_url(&["sites", site_id])?;
        let envelope: SiteEnvelope = self.get_url(url).await?;
        Ok(envelope.into_site())
    }
}
