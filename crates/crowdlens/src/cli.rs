//! Clap derive structures for the `crowdlens` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// crowdlens -- crowd-monitoring dashboard from the command line
#[derive(Debug, Parser)]
#[command(
    name = "crowdlens",
    version,
    about = "Crowd-monitoring dashboard from the command line",
    long_about = "Log in to a crowd-monitoring backend, pick a site, and read its\n\
        footfall, dwell time, occupancy and demographics analytics.\n\n\
        Live alerts and occupancy stream over the realtime channel.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Backend profile to use
    #[arg(long, short = 'p', env = "CROWDLENS_PROFILE", global = true)]
    pub profile: Option<String>,

    /// API root URL (overrides profile)
    #[arg(long, env = "CROWDLENS_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Realtime origin URL (defaults to the API origin)
    #[arg(long, env = "CROWDLENS_SOCKET_URL", global = true)]
    pub socket_url: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "CROWDLENS_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept invalid TLS certificates
    #[arg(long, short = 'k', env = "CROWDLENS_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout, e.g. "10s" or "1m"
    #[arg(long, env = "CROWDLENS_TIMEOUT", global = true)]
    pub timeout: Option<String>,

    /// Write logs to this file instead of stderr
    #[arg(long, env = "CROWDLENS_LOG_FILE", global = true)]
    pub log_file: Option<PathBuf>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in and store the session for this profile
    Login(LoginArgs),

    /// Clear the stored session
    Logout,

    /// Show the session, selected site and realtime endpoint
    Status,

    /// List and select sites
    #[command(alias = "s")]
    Sites(SitesArgs),

    /// Dwell time, footfall, occupancy and demographics for one day
    #[command(alias = "ov")]
    Overview(OverviewArgs),

    /// Paged entry/exit log for one day
    Entries(EntriesArgs),

    /// Stream live alerts or occupancy from the realtime channel
    Live(LiveArgs),

    /// Start or stop the backend's crowd simulation
    #[command(alias = "sim")]
    Simulation(SimulationArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SESSION
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Login email (defaults to the profile's email, else prompts)
    #[arg(long, short = 'e')]
    pub email: Option<String>,

    /// Read the password from stdin instead of the keyring or a prompt
    #[arg(long)]
    pub password_stdin: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SITES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct SitesArgs {
    #[command(subcommand)]
    pub command: SitesCommand,
}

#[derive(Debug, Subcommand)]
pub enum SitesCommand {
    /// List known sites (fetches them if none are stored)
    #[command(alias = "ls")]
    List {
        /// Re-fetch from the backend even if sites are stored
        #[arg(long, short = 'r')]
        refresh: bool,
    },

    /// Show one site, fetched from the backend
    Get {
        /// Site ID
        id: String,
    },

    /// Make a site the current one for analytics commands
    Select {
        /// Site ID
        id: String,
    },

    /// Show the current site
    Current,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  ANALYTICS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct OverviewArgs {
    /// Day to report, YYYY-MM-DD (defaults to today, UTC)
    #[arg(long, short = 'd')]
    pub date: Option<String>,

    /// Fail instead of showing placeholder data when the backend errors
    #[arg(long)]
    pub strict: bool,
}

#[derive(Debug, Args)]
pub struct EntriesArgs {
    /// Day to report, YYYY-MM-DD (defaults to today, UTC)
    #[arg(long, short = 'd')]
    pub date: Option<String>,

    /// Page number, starting at 1
    #[arg(long, default_value = "1")]
    pub page: u32,

    /// Records per page (1-100)
    #[arg(long, short = 'l', default_value = "10")]
    pub page_size: u32,

    /// Fail instead of showing placeholder data when the backend errors
    #[arg(long)]
    pub strict: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  LIVE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct LiveArgs {
    #[command(subcommand)]
    pub command: LiveCommand,
}

#[derive(Debug, Subcommand)]
pub enum LiveCommand {
    /// Print alerts as they arrive
    Alerts(WatchOpts),

    /// Print live occupancy readings as they arrive
    Occupancy(WatchOpts),
}

#[derive(Debug, Args)]
pub struct WatchOpts {
    /// Stop after this long, e.g. "30s" (default: until Ctrl-C)
    #[arg(long = "for")]
    pub duration: Option<String>,

    /// Stop after this many events
    #[arg(long, short = 'n')]
    pub count: Option<usize>,

    /// Only show alerts at or above this severity
    #[arg(long)]
    pub min_severity: Option<SeverityFilter>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SeverityFilter {
    Low,
    Medium,
    High,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SIMULATION
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct SimulationArgs {
    #[command(subcommand)]
    pub command: SimulationCommand,
}

#[derive(Debug, Subcommand)]
pub enum SimulationCommand {
    /// Start generating simulated visitors
    Start,
    /// Stop the simulation
    Stop,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current configuration (secrets masked)
    Show,

    /// Set a value on the active profile
    Set {
        /// Profile key, e.g. "api_url" or "offline_login_fixture"
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store the login password in the system keyring
    SetPassword {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,
    },

    /// Print the config file path
    Path,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
