// Analytics endpoints
//
// Every call is a POST scoped to one site and a UTC millisecond window.
// Responses are returned in wire shape; crowdlens-core normalizes them.

use tracing::debug;

use crate::error::Error;
use crate::gateway::Gateway;
use crate::models::{
    AnalyticsQuery, DemographicsResponse, DwellResponse, EntryExitPage, EntryExitQuery,
    FootfallResponse, OccupancyResponse,
};

impl Gateway {
    /// `POST analytics/dwell`
    pub async fn dwell_time(&self, query: &AnalyticsQuery) -> Result<DwellResponse, Error> {
        debug!(site_id = %query.site_id, "fetching dwell time");
        self.post("analytics/dwell", query).await
    }

    /// `POST analytics/footfall`
    pub async fn footfall(&self, query: &AnalyticsQuery) -> Result<FootfallResponse, Error> {
        debug!(site_id = %query.site_id, "fetching footfall");
        self.post("analytics/footfall", query).await
    }

    /// `POST analytics/occupancy`
    pub async fn occupancy(&self, query: &AnalyticsQuery) -> Result<OccupancyResponse, Error> {
        debug!(site_id = %query.site_id, "fetching occupancy");
        self.post("analytics/occupancy", query).await
    }

    /// `POST analytics/demographics`
    pub async fn demographics(&self, query: &AnalyticsQuery) -> Result<DemographicsResponse, Error> {
        debug!(site_id = %query.site_id, "fetching demographics");
        self.post("analytics/demographics", query).await
    }

    /// Paged entry/exit records.
    ///
    /// `POST analytics/entry-exit` with the range plus `pageNumber`/`pageSize`
    pub async fn entry_exit(&self, query: &EntryExitQuery) -> Result<EntryExitPage, Error> {
        debug!(
            site_id = %query.range.site_id,
            page = query.page_number,
            size = query.page_size,
            "fetching entry/exit records"
        );
        self.post("analytics/entry-exit", query).await
    }
}
