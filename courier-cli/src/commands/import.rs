//! `courier import`: reconcile a snapshot folder with the store.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use courier_import::{FileReport, ImportOptions, Outcome, RunSummary};

use super::Setup;

/// Arguments for `courier import`.
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Snapshot folder (defaults to `content_folder` from the config).
    #[arg(long)]
    pub folder: Option<PathBuf>,

    /// Overwrite stored entities even when they are not older than the snapshot.
    #[arg(short, long)]
    pub force_override: bool,

    /// Create entities with the ids their snapshots carry.
    #[arg(long)]
    pub preserve_ids: bool,

    /// Skip snapshots exported before the folder's last import.
    #[arg(long)]
    pub incremental: bool,

    /// Classify every snapshot without writing anything.
    #[arg(long)]
    pub dry_run: bool,
}

impl ImportArgs {
    pub fn run(self, verbose: bool) -> Result<()> {
        let setup = Setup::load(self.folder)?;
        let mut store = setup.open_store()?;
        let mut watermarks = setup.watermarks();
        let options = ImportOptions {
            force_override: self.force_override,
            preserve_ids: self.preserve_ids,
            incremental: self.incremental,
            verbose,
            dry_run: self.dry_run,
        };

        let summary = setup
            .engine(options, &mut store, &mut watermarks)
            .import()
            .with_context(|| format!("import of {} failed", setup.folder.display()))?;

        print_summary(&summary, self.dry_run);
        Ok(())
    }
}

fn print_summary(summary: &RunSummary, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    for report in &summary.reports {
        print_report(prefix, report);
    }

    let line = format!("{prefix}{}", summary.message());
    if summary.success && summary.failed == 0 {
        println!("{}", line.green());
    } else if summary.success {
        println!("{}", line.yellow());
    } else {
        println!("{}", line.red());
    }
    if let Some(timestamp) = summary.watermark {
        println!("{prefix}watermark raised to {timestamp}");
    }
}

fn print_report(prefix: &str, report: &FileReport) {
    let Some(message) = &report.message else {
        return;
    };
    match report.outcome {
        Outcome::Failed(_) => eprintln!("{prefix}{}", message.red()),
        Outcome::Skipped(_) | Outcome::CorrectionSkipped => {
            println!("{prefix}{}", message.dimmed())
        }
        _ => println!("{prefix}{message}"),
    }
}
