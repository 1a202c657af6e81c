mod cli;
mod commands;
mod config;
mod error;
mod output;

use std::path::Path;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crowdlens_core::Dashboard;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Held until exit so buffered log lines reach the file.
    let _guard = init_tracing(cli.global.verbose, cli.global.log_file.as_deref());

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, log_file: Option<&Path>) -> Option<WorkerGuard> {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let Some(path) = log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
        return None;
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = path
        .file_name()
        .unwrap_or(std::ffi::OsStr::new("crowdlens.log"));
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        )
        .init();
    Some(guard)
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a backend
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "crowdlens", &mut std::io::stdout());
            Ok(())
        }

        cmd => {
            let resolved = config::resolve(&cli.global)?;
            let dashboard = Dashboard::new(resolved.dashboard.clone())?;

            tracing::debug!(command = ?cmd, profile = %resolved.profile_name, "dispatching command");
            let result = commands::dispatch(cmd, &dashboard, &resolved, &cli.global).await;
            dashboard.shutdown();
            result
        }
    }
}
