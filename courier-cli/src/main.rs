//! Courier: content snapshot import CLI.
//!
//! # Usage
//!
//! ```text
//! courier import [--folder <dir>] [--force-override] [--preserve-ids] [--incremental] [--dry-run] [-v]
//! courier plan [--folder <dir>] [--json]
//! courier diff <uuid> [--folder <dir>]
//! courier watermark [--folder <dir>] [--json]
//! ```
//!
//! Without `--folder` the `content_folder` of `~/.courier/config.yaml` is used.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{diff::DiffArgs, import::ImportArgs, plan::PlanArgs, watermark::WatermarkArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "courier",
    version,
    about = "Reconcile exported content snapshots with a content store",
    long_about = None,
)]
struct Cli {
    /// Report every file and log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Import a snapshot folder into the store.
    Import(ImportArgs),

    /// Show the execution plan for a snapshot folder.
    Plan(PlanArgs),

    /// Show a unified diff between one snapshot and its stored entity.
    Diff(DiffArgs),

    /// Show the stored watermark of a snapshot folder.
    Watermark(WatermarkArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Import(args) => args.run(cli.verbose),
        Commands::Plan(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::Watermark(args) => args.run(),
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
