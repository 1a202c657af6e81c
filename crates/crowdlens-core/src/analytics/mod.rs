// ── Analytics ──
//
// Site-scoped analytics requests. Each call captures the current selection
// (site id + generation), builds the UTC day window, and checks the
// generation again when the response lands: a selection change in between
// resolves the call with `Superseded`. Every call also races a caller-owned
// `CancellationToken`.

mod normalize;
mod placeholder;

use std::future::Future;
use std::sync::Arc;

use chrono::NaiveDate;
use crowdlens_api::{AnalyticsQuery, EntryExitQuery, ErrorKind, Gateway};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::{DataMode, DwellTime, EntriesPage, Overview, day_utc_range};
use crate::sites::{ScopeToken, SiteContext};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// One page of the entry/exit log for one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntriesRequest {
    pub date: NaiveDate,
    pub page_number: u32,
    pub page_size: u32,
}

impl EntriesRequest {
    /// Page 1 of `date`, default page size.
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            page_number: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn page(mut self, page_number: u32) -> Self {
        self.page_number = page_number;
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.page_number == 0 {
            return Err(CoreError::validation("Page numbers start at 1"));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(CoreError::validation(format!(
                "Page size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct Analytics {
    gateway: Arc<Gateway>,
    sites: SiteContext,
}

impl Analytics {
    pub fn new(gateway: Arc<Gateway>, sites: SiteContext) -> Self {
        Self { gateway, sites }
    }

    fn scoped(&self, date: NaiveDate) -> Result<(ScopeToken, AnalyticsQuery), CoreError> {
        let scope = self.sites.scope()?;
        let range = day_utc_range(date);
        let query = AnalyticsQuery {
            site_id: scope.site_id.clone(),
            from_utc: range.from_utc,
            to_utc: range.to_utc,
        };
        Ok((scope, query))
    }

    /// Await `fut` unless cancelled, then drop the output if the selection
    /// moved on.
    async fn run<T>(
        &self,
        scope: &ScopeToken,
        cancel: &CancellationToken,
        fut: impl Future<Output = T>,
    ) -> Result<T, CoreError> {
        let output = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(CoreError::Cancelled),
            output = fut => output,
        };
        if !self.sites.is_current(scope) {
            debug!(site_id = %scope.site_id, "discarding response for a previous selection");
            return Err(CoreError::Superseded);
        }
        Ok(output)
    }

    // ── Single metrics ───────────────────────────────────────────────

    pub async fn dwell(
        &self,
        date: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<DwellTime, CoreError> {
        let (scope, query) = self.scoped(date)?;
        let response = self
            .run(&scope, cancel, self.gateway.dwell_time(&query))
            .await??;
        Ok(normalize::dwell(response.avg_dwell_minutes))
    }

    pub async fn footfall(
        &self,
        date: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<f64, CoreError> {
        let (scope, query) = self.scoped(date)?;
        let response = self
            .run(&scope, cancel, self.gateway.footfall(&query))
            .await??;
        Ok(response.footfall.unwrap_or(0.0))
    }

    // ── Overview ─────────────────────────────────────────────────────

    /// All four overview metrics for the current site on `date`.
    ///
    /// An occupancy 404 fills only that section with placeholder data and
    /// marks the result [`DataMode::Partial`]; any other failure is returned.
    pub async fn overview(
        &self,
        date: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<Overview, CoreError> {
        let (scope, query) = self.scoped(date)?;
        let gateway = &self.gateway;
        let (dwell, footfall, occupancy, demographics) = self
            .run(&scope, cancel, async {
                tokio::join!(
                    gateway.dwell_time(&query),
                    gateway.footfall(&query),
                    gateway.occupancy(&query),
                    gateway.demographics(&query),
                )
            })
            .await?;

        let dwell = dwell?;
        let footfall = footfall?;
        let mut notes = Vec::new();

        let occupancy = match occupancy {
            Ok(response) => normalize::occupancy(response),
            Err(e) if e.is_not_found() => {
                warn!(site_id = %scope.site_id, "occupancy endpoint returned 404, using placeholder data");
                notes.push("occupancy endpoint not found");
                normalize::OccupancySection {
                    points: placeholder::occupancy_series(),
                    live: Some(placeholder::LIVE_OCCUPANCY),
                    note: None,
                }
            }
            Err(e) => return Err(e.into()),
        };
        let demographics = normalize::demographics(demographics?);
        notes.extend(occupancy.note);
        notes.extend(demographics.note);

        let mode = if notes.is_empty() {
            DataMode::Live
        } else {
            DataMode::Partial {
                reason: notes.join("; "),
            }
        };

        Ok(Overview {
            site_id: scope.site_id,
            date,
            dwell: Some(normalize::dwell(dwell.avg_dwell_minutes)),
            footfall: Some(footfall.footfall.unwrap_or(0.0)),
            live_occupancy: occupancy.live,
            occupancy: occupancy.points,
            demographics: demographics.timeline,
            gender_split: demographics.split,
            mode,
        })
    }

    /// [`overview`](Self::overview), or placeholder data tagged
    /// [`DataMode::Degraded`] when the backend fails.
    ///
    /// Cancellation, supersession, a missing selection and auth failures are
    /// still returned as errors.
    pub async fn overview_or_degraded(
        &self,
        date: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<Overview, CoreError> {
        match self.overview(date, cancel).await {
            Err(e) if degradable(&e) => {
                warn!(error = %e, "analytics unavailable, showing placeholder overview");
                Ok(placeholder::overview(
                    self.sites.current_site_id().unwrap_or_default(),
                    date,
                    e.to_string(),
                ))
            }
            other => other,
        }
    }

    // ── Entry / exit ─────────────────────────────────────────────────

    pub async fn entries(
        &self,
        request: EntriesRequest,
        cancel: &CancellationToken,
    ) -> Result<EntriesPage, CoreError> {
        request.validate()?;
        let (scope, range) = self.scoped(request.date)?;
        let query = EntryExitQuery {
            range,
            page_number: request.page_number,
            page_size: request.page_size,
        };
        let page = self
            .run(&scope, cancel, self.gateway.entry_exit(&query))
            .await??;
        Ok(normalize::entries_page(
            scope.site_id,
            request.date,
            request.page_number,
            request.page_size,
            page,
        ))
    }

    /// [`entries`](Self::entries), or a placeholder page on backend failure.
    pub async fn entries_or_degraded(
        &self,
        request: EntriesRequest,
        cancel: &CancellationToken,
    ) -> Result<EntriesPage, CoreError> {
        match self.entries(request, cancel).await {
            Err(e) if degradable(&e) => {
                warn!(error = %e, "entry log unavailable, showing placeholder entries");
                Ok(placeholder::entries(
                    self.sites.current_site_id().unwrap_or_default(),
                    request.date,
                    request.page_number,
                    request.page_size,
                    e.to_string(),
                ))
            }
            other => other,
        }
    }
}

/// Backend failures degrade; auth and local outcomes do not.
fn degradable(err: &CoreError) -> bool {
    matches!(err, CoreError::Api(e) if e.kind() != ErrorKind::Auth)
}
