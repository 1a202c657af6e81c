//! Live alert and occupancy streaming.

use std::time::Duration;

use tokio::sync::{broadcast, watch};

use crowdlens_core::{AlertEvent, ChannelState, Dashboard, OccupancyReading, Severity};

use crate::cli::{GlobalOpts, LiveArgs, LiveCommand, OutputFormat, SeverityFilter, WatchOpts};
use crate::error::CliError;
use crate::output;

use super::util;

impl From<SeverityFilter> for Severity {
    fn from(f: SeverityFilter) -> Self {
        match f {
            SeverityFilter::Low => Severity::Low,
            SeverityFilter::Medium => Severity::Medium,
            SeverityFilter::High => Severity::High,
        }
    }
}

// ── Line formatting ─────────────────────────────────────────────────

fn alert_line(alert: &AlertEvent, format: &OutputFormat, color: bool) -> String {
    match format {
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(alert, true),
        OutputFormat::Yaml => format!("---\n{}", output::render_yaml(alert).trim_end()),
        OutputFormat::Table | OutputFormat::Plain => format!(
            "{}  {:<6}  {:<16}  {:<20}  {}",
            alert.timestamp.format("%H:%M:%S"),
            output::paint_severity(alert.severity, color),
            alert.zone,
            alert.name,
            alert.action_type,
        ),
    }
}

fn occupancy_line(reading: &OccupancyReading, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(reading, true),
        OutputFormat::Yaml => format!("---\n{}", output::render_yaml(reading).trim_end()),
        OutputFormat::Plain => format!("{:.0}", reading.occupancy),
        OutputFormat::Table => format!(
            "{}  occupancy {:.0}",
            reading.received_at.format("%H:%M:%S"),
            reading.occupancy
        ),
    }
}

// ── Connection ──────────────────────────────────────────────────────

/// Wait until the channel reports `Connected`, failing on `Failed`.
async fn wait_connected(
    state: &mut watch::Receiver<ChannelState>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let spinner = util::spinner("Connecting to realtime channel...", global);
    let result = loop {
        match state.borrow_and_update().clone() {
            ChannelState::Connected { transport, .. } => {
                tracing::info!(transport = transport.as_str(), "realtime channel connected");
                break Ok(());
            }
            ChannelState::Failed { reason } => break Err(CliError::RealtimeFailed { reason }),
            ChannelState::Reconnecting { attempt } => {
                spinner.set_message(format!("Reconnecting (attempt {attempt})..."));
            }
            ChannelState::Connecting | ChannelState::Disconnected => {}
        }
        if state.changed().await.is_err() {
            break Err(CliError::RealtimeFailed {
                reason: "channel closed".into(),
            });
        }
    };
    spinner.finish_and_clear();
    result
}

async fn sleep_or_forever(duration: Option<Duration>) {
    match duration {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending().await,
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    dashboard: &Dashboard,
    args: LiveArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    util::require_session(dashboard).await?;
    match args.command {
        LiveCommand::Alerts(opts) => alerts(dashboard, &opts, global).await,
        LiveCommand::Occupancy(opts) => occupancy(dashboard, &opts, global).await,
    }
}

async fn alerts(dashboard: &Dashboard, opts: &WatchOpts, global: &GlobalOpts) -> Result<(), CliError> {
    let duration = opts
        .duration
        .as_deref()
        .map(|raw| util::parse_duration("for", raw))
        .transpose()?;
    let min = opts.min_severity.map_or(Severity::Low, Severity::from);
    let color = output::should_color(&global.color);

    // Subscribe first so nothing arriving during the handshake is lost.
    let mut events = dashboard.feeds().alerts.events();
    let mut state = dashboard.channel().state();
    wait_connected(&mut state, global).await?;
    util::note(global, "Watching alerts (Ctrl-C to stop)");

    let deadline = sleep_or_forever(duration);
    tokio::pin!(deadline);
    let mut seen = 0usize;

    loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => break,
            () = &mut deadline => break,
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = state.borrow_and_update().clone();
                if let ChannelState::Failed { reason } = current {
                    return Err(CliError::RealtimeFailed { reason });
                }
                tracing::debug!(state = ?current, "realtime state changed");
            }
            received = events.recv() => match received {
                Ok(alert) => {
                    if alert.severity < min {
                        continue;
                    }
                    output::print_output(&alert_line(&alert, &global.output, color), global.quiet);
                    seen += 1;
                    if opts.count.is_some_and(|n| seen >= n) {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "alert stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    Ok(())
}

async fn occupancy(
    dashboard: &Dashboard,
    opts: &WatchOpts,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let duration = opts
        .duration
        .as_deref()
        .map(|raw| util::parse_duration("for", raw))
        .transpose()?;

    let mut readings = dashboard.feeds().occupancy.watch();
    let mut state = dashboard.channel().state();
    wait_connected(&mut state, global).await?;
    util::note(global, "Watching live occupancy (Ctrl-C to stop)");

    let deadline = sleep_or_forever(duration);
    tokio::pin!(deadline);
    let mut seen = 0usize;

    loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => break,
            () = &mut deadline => break,
            changed = readings.changed() => {
                if changed.is_err() {
                    break;
                }
                let latest = readings.borrow_and_update().clone();
                let Some(reading) = latest else { continue };
                output::print_output(&occupancy_line(&reading, &global.output), global.quiet);
                seen += 1;
                if opts.count.is_some_and(|n| seen >= n) {
                    break;
                }
            }
        }
    }
    Ok(())
}
