//! Clap derive structures for the `circlescope` CLI.
//!
//! Defines the command tree, global flags, and shared output types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// circlescope -- live dashboard for circle-measurement inspection lines
#[derive(Debug, Parser)]
#[command(
    name = "circlescope",
    version,
    about = "Watch and query circle-measurement inspection lines",
    long_about = "Terminal client for the inspection dashboard server.\n\n\
        `watch` merges the live event stream with periodic REST snapshots\n\
        into one dashboard; the other commands are one-shot queries.",
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
    /// Server profile to use
    #[arg(long, short = 'p', env = "CIRCLESCOPE_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Dashboard server origin, e.g. http://line-3:8000 (overrides profile)
    #[arg(long, short = 's', env = "CIRCLESCOPE_SERVER", global = true)]
    pub server: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "CIRCLESCOPE_OUTPUT",
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

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "CIRCLESCOPE_INSECURE", global = true)]
    pub insecure: bool,

    /// REST request timeout in seconds (overrides profile)
    #[arg(long, env = "CIRCLESCOPE_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table / text (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
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
    /// Live dashboard: stream events + periodic snapshots, redrawn on change
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Print every live stream event as it arrives
    Tail(TailArgs),

    /// Fetch one REST snapshot
    #[command(alias = "get")]
    Snapshot(SnapshotArgs),

    /// Show recent inspection results
    #[command(alias = "hist")]
    History(HistoryArgs),

    /// Download the statistics CSV export
    Export(ExportArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Watch / Tail ─────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Run the startup load, render once, and exit
    #[arg(long)]
    pub once: bool,

    /// Append each frame instead of redrawing the screen
    #[arg(long)]
    pub no_clear: bool,
}

#[derive(Debug, Args)]
pub struct TailArgs {
    /// Only print these event names (repeatable)
    #[arg(long, short = 'e')]
    pub event: Vec<String>,

    /// Exit after this many printed events
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

// ── Snapshot ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SnapshotArgs {
    #[command(subcommand)]
    pub resource: SnapshotResource,
}

#[derive(Debug, Subcommand)]
pub enum SnapshotResource {
    /// Camera, run state, FPS and current recipe
    Status,
    /// Inspection counters, OK rate, throughput, runtime
    #[command(alias = "stats")]
    Statistics,
    /// Available recipes
    Recipes,
    /// One recipe's detection and tolerance settings
    Recipe {
        /// Recipe name
        name: String,
    },
    /// PLC IO indicators
    Io,
    /// Pixel-to-millimetre calibration
    Calibration,
}

// ── History / Export ─────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Number of results (1-1000)
    #[arg(long, short = 'l', default_value = "50")]
    pub limit: u32,

    /// Pagination offset
    #[arg(long, default_value = "0")]
    pub offset: u32,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Destination file; "-" writes to stdout
    #[arg(long, short = 'f', default_value = "statistics.csv")]
    pub file: PathBuf,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create the config file with one profile
    Init {
        /// Dashboard server origin
        #[arg(long)]
        server: String,

        /// Profile name
        #[arg(long, default_value = "default")]
        name: String,

        /// Replace an existing profile of the same name
        #[arg(long)]
        force: bool,
    },

    /// Display the loaded configuration
    Show,

    /// Print the config file path
    Path,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
