//! Overview and entry-log handlers.

use std::fmt::Write as _;

use tabled::Tabled;
use tokio_util::sync::CancellationToken;

use crowdlens_core::{
    Dashboard, DemographicsPoint, DwellTime, EntriesPage, EntriesRequest, EntryRecord,
    OccupancyPoint, Overview,
};

use crate::cli::{EntriesArgs, GlobalOpts, OverviewArgs};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct OccupancyRow {
    #[tabled(rename = "Time")]
    label: String,
    #[tabled(rename = "Occupancy")]
    occupancy: String,
}

impl From<&OccupancyPoint> for OccupancyRow {
    fn from(p: &OccupancyPoint) -> Self {
        Self {
            label: p.label.clone(),
            occupancy: format!("{:.0}", p.occupancy),
        }
    }
}

#[derive(Tabled)]
struct DemographicsRow {
    #[tabled(rename = "Time")]
    label: String,
    #[tabled(rename = "Male")]
    male: String,
    #[tabled(rename = "Female")]
    female: String,
}

impl From<&DemographicsPoint> for DemographicsRow {
    fn from(p: &DemographicsPoint) -> Self {
        Self {
            label: p.label.clone(),
            male: format!("{:.0}", p.male),
            female: format!("{:.0}", p.female),
        }
    }
}

#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Sex")]
    gender: String,
    #[tabled(rename = "Entry")]
    entry: String,
    #[tabled(rename = "Exit")]
    exit: String,
    #[tabled(rename = "Dwell")]
    dwell: String,
}

impl From<&EntryRecord> for EntryRow {
    fn from(r: &EntryRecord) -> Self {
        Self {
            name: r.name.clone(),
            gender: r.gender.clone(),
            entry: r.entry.clone(),
            exit: r.exit.clone(),
            dwell: r.dwell_clock(),
        }
    }
}

// ── Detail views ────────────────────────────────────────────────────

fn number(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_owned(), |v| format!("{v:.0}"))
}

fn format_overview(ov: &Overview, color: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Site {} on {}", ov.site_id, ov.date);
    if let Some(banner) = output::mode_banner(&ov.mode, color) {
        let _ = writeln!(out, "{banner}");
    }
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Avg dwell time:  {}",
        ov.dwell.map_or_else(|| "-".to_owned(), DwellTime::display)
    );
    let _ = writeln!(out, "Footfall:        {}", number(ov.footfall));
    let _ = writeln!(out, "Live occupancy:  {}", number(ov.live_occupancy));

    if !ov.gender_split.is_empty() {
        let split = ov
            .gender_split
            .iter()
            .map(|g| match g.percent {
                Some(pct) => format!("{} {:.0} ({pct:.1}%)", g.name, g.value),
                None => format!("{} {:.0}", g.name, g.value),
            })
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(out, "Gender split:    {split}");
    }

    if !ov.occupancy.is_empty() {
        let rows: Vec<OccupancyRow> = ov.occupancy.iter().map(OccupancyRow::from).collect();
        let _ = writeln!(out, "\nOccupancy\n{}", output::render_table(&rows));
    }
    if !ov.demographics.is_empty() {
        let rows: Vec<DemographicsRow> =
            ov.demographics.iter().map(DemographicsRow::from).collect();
        let _ = writeln!(out, "\nDemographics\n{}", output::render_table(&rows));
    }
    out.trim_end().to_owned()
}

fn format_entries(page: &EntriesPage, color: bool) -> String {
    let mut out = String::new();
    if let Some(banner) = output::mode_banner(&page.mode, color) {
        let _ = writeln!(out, "{banner}");
    }
    let rows: Vec<EntryRow> = page.records.iter().map(EntryRow::from).collect();
    let _ = writeln!(out, "{}", output::render_table(&rows));
    let _ = write!(
        out,
        "Page {} of {} ({} on {})",
        page.page_number, page.total_pages, page.site_id, page.date
    );
    out
}

// ── Handlers ────────────────────────────────────────────────────────

/// Token cancelled by Ctrl-C, so a slow request can be abandoned cleanly.
fn cancel_on_interrupt() -> CancellationToken {
    let token = CancellationToken::new();
    let guard = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            guard.cancel();
        }
    });
    token
}

pub async fn overview(
    dashboard: &Dashboard,
    args: OverviewArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let date = util::parse_date(args.date.as_deref())?;
    util::require_session(dashboard).await?;
    let cancel = cancel_on_interrupt();

    let spinner = util::spinner("Loading analytics...", global);
    let analytics = dashboard.analytics();
    let result = if args.strict {
        analytics.overview(date, &cancel).await
    } else {
        analytics.overview_or_degraded(date, &cancel).await
    };
    spinner.finish_and_clear();
    let overview = result?;

    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &overview,
        |ov| format_overview(ov, color),
        |ov| number(ov.footfall),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn entries(
    dashboard: &Dashboard,
    args: EntriesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let date = util::parse_date(args.date.as_deref())?;
    util::require_session(dashboard).await?;
    let request = EntriesRequest::new(date)
        .page(args.page)
        .page_size(args.page_size);
    let cancel = cancel_on_interrupt();

    let spinner = util::spinner("Loading entries...", global);
    let analytics = dashboard.analytics();
    let result = if args.strict {
        analytics.entries(request, &cancel).await
    } else {
        analytics.entries_or_degraded(request, &cancel).await
    };
    spinner.finish_and_clear();
    let page = result?;

    let color = output::should_color(&global.color);
    let out = match global.output {
        crate::cli::OutputFormat::Plain => page
            .records
            .iter()
            .map(|r| r.name.clone())
            .collect::<Vec<_>>()
            .join("\n"),
        _ => output::render_single(
            &global.output,
            &page,
            |p| format_entries(p, color),
            |_| String::new(),
        ),
    };
    output::print_output(&out, global.quiet);
    Ok(())
}
