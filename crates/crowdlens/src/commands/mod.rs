//! Command dispatch: bridges CLI args -> dashboard operations -> output formatting.

pub mod analytics;
pub mod config_cmd;
pub mod live;
pub mod session;
pub mod simulation;
pub mod sites;
pub mod util;

use crowdlens_core::Dashboard;

use crate::cli::{Command, GlobalOpts};
use crate::config::Resolved;
use crate::error::CliError;

/// Dispatch a backend-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    dashboard: &Dashboard,
    resolved: &Resolved,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Login(args) => session::login(dashboard, resolved, args, global).await,
        Command::Logout => session::logout(dashboard, global),
        Command::Status => session::status(dashboard, resolved, global),
        Command::Sites(args) => sites::handle(dashboard, args, global).await,
        Command::Overview(args) => analytics::overview(dashboard, args, global).await,
        Command::Entries(args) => analytics::entries(dashboard, args, global).await,
        Command::Live(args) => live::handle(dashboard, args, global).await,
        Command::Simulation(args) => simulation::handle(dashboard, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
