//! Site command handlers.

use tabled::Tabled;

use crowdlens_core::{Dashboard, Site};

use crate::cli::{GlobalOpts, SitesArgs, SitesCommand};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct SiteRow {
    #[tabled(rename = "")]
    current: &'static str,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Location")]
    location: String,
}

fn site_row(site: &Site, current: Option<&str>) -> SiteRow {
    SiteRow {
        current: if site.id().is_some() && site.id() == current {
            "*"
        } else {
            ""
        },
        id: site.id().unwrap_or_default().to_owned(),
        name: site.name.clone(),
        location: site.location(),
    }
}

fn site_detail(site: &Site) -> String {
    let mut lines = vec![
        format!("ID:       {}", site.id().unwrap_or("-")),
        format!("Name:     {}", site.name),
    ];
    let location = site.location();
    if !location.is_empty() {
        lines.push(format!("Location: {location}"));
    }
    for (key, value) in &site.extra {
        lines.push(format!("{key}: {value}"));
    }
    lines.join("\n")
}

fn site_id(site: &Site) -> String {
    site.id().unwrap_or_default().to_owned()
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    dashboard: &Dashboard,
    args: SitesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    util::require_session(dashboard).await?;
    let sites = dashboard.sites();

    match args.command {
        SitesCommand::List { refresh } => {
            if refresh {
                sites.refresh_sites().await?;
            } else {
                sites.hydrate_if_empty().await?;
            }
            let all = sites.sites();
            let current = sites.current_site().and_then(|s| s.id().map(str::to_owned));
            let out = output::render_list(
                &global.output,
                all.as_slice(),
                |s| site_row(s, current.as_deref()),
                site_id,
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SitesCommand::Get { id } => {
            let site = sites.site(&id).await?;
            let out = output::render_single(&global.output, &site, site_detail, site_id);
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SitesCommand::Select { id } => {
            sites.hydrate_if_empty().await?;
            let site = sites.select_site_by_id(&id)?;
            util::note(global, format!("Current site: {} ({id})", site.name));
            Ok(())
        }

        SitesCommand::Current => {
            let site = sites.current_site().ok_or(CliError::NoSiteSelected)?;
            let out = output::render_single(&global.output, &site, site_detail, site_id);
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
