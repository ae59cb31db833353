//! Hydrant — template hydration and review-unit sync CLI.
//!
//! # Usage
//!
//! ```text
//! hydrant render --base DIR --overlays DIR --sot FILE --output DIR
//!                [--entity NAME | --group NAME | --tag TAG ...]
//!                [--layout group|entity|flat] [--dry-run]
//! hydrant diff   <same inputs as render>
//! hydrant sync   <same inputs> --unit ID --trigger-commit SHA
//!                (--host-root DIR | --host-url URL) [--token TOKEN]
//!                [--source-branch BRANCH] [--target-branch BRANCH] [--dry-run]
//! hydrant runs   --unit ID (--host-root DIR | --host-url URL) [--json]
//! ```
//!
//! Exit codes: 0 success (a no-op sync is success), 2 source-data error,
//! 3 template error, 4 sync conflict (head moved), 5 host or output I/O
//! failure, 1 anything else. Usage errors follow clap's own exit 2.

mod commands;
mod config;
mod host_http;

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use commands::{diff::DiffArgs, render::RenderArgs, runs::RunsArgs, sync::SyncArgs};
use hydrant_engine::OutputLayout;
use hydrant_sync::{HostError, SyncError};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "hydrant",
    version,
    about = "Hydrate config templates against a source of truth and sync them onto review units",
    long_about = None,
)]
struct Cli {
    /// Silence everything below errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// More log detail (-v info, -vv debug).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Hydrate templates and reconcile the output root with the result.
    Render(RenderArgs),

    /// Show a unified diff of what render would change.
    Diff(DiffArgs),

    /// Hydrate and land the changeset on a review unit.
    Sync(SyncArgs),

    /// List recorded hydration runs for a review unit.
    Runs(RunsArgs),
}

// ---------------------------------------------------------------------------
// Shared layout argument — parsed from CLI strings, converts to engine type
// ---------------------------------------------------------------------------

/// Thin wrapper so clap can parse `OutputLayout` from CLI args.
#[derive(Debug, Clone, Default)]
pub struct LayoutArg(pub OutputLayout);

impl FromStr for LayoutArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "group" => Ok(Self(OutputLayout::PerGroup)),
            "entity" => Ok(Self(OutputLayout::PerEntity)),
            "flat" => Ok(Self(OutputLayout::Flat)),
            other => Err(format!(
                "unknown layout '{other}'; expected: group, entity, flat"
            )),
        }
    }
}

impl fmt::Display for LayoutArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_str())
    }
}

// ---------------------------------------------------------------------------
// Logging and exit codes
// ---------------------------------------------------------------------------

fn init_logging(quiet: bool, verbose: u8) {
    let level = if quiet {
        log::LevelFilter::Error
    } else {
        match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        }
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .parse_default_env()
        .init();
}

/// Map a failed run onto the documented exit codes.
fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(sync_err) = err.downcast_ref::<SyncError>() {
        return match sync_err {
            SyncError::Source(_) => 2,
            SyncError::Engine(e) if e.is_data_error() => 2,
            SyncError::Engine(_) => 3,
            SyncError::Store(_) => 3,
            SyncError::Host(HostError::HeadMoved { .. }) => 4,
            SyncError::Host(_) => 5,
            SyncError::BranchMismatch { .. } => 5,
            SyncError::Io { .. } => 5,
        };
    }
    1
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Render(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::Sync(args) => args.run(),
        Commands::Runs(args) => args.run(),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        std::process::exit(exit_code(&err));
    }
}
