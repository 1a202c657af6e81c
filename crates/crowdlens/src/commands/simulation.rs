//! Simulation toggles.

use crowdlens_core::Dashboard;

use crate::cli::{GlobalOpts, SimulationArgs, SimulationCommand};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(
    dashboard: &Dashboard,
    args: SimulationArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    util::require_session(dashboard).await?;

    let (response, done) = match args.command {
        SimulationCommand::Start => (dashboard.start_simulation().await?, "Simulation started"),
        SimulationCommand::Stop => (dashboard.stop_simulation().await?, "Simulation stopped"),
    };

    let out = output::render_single(
        &global.output,
        &response,
        |_| done.to_owned(),
        |_| done.to_owned(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
