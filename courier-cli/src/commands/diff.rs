//! `courier diff`: compare one snapshot with its stored entity.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use courier_core::UniqueId;
use courier_import::ImportOptions;

use super::Setup;

/// Arguments for `courier diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Uuid of the snapshot to compare.
    pub uuid: String,

    /// Snapshot folder (defaults to `content_folder` from the config).
    #[arg(long)]
    pub folder: Option<PathBuf>,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let setup = Setup::load(self.folder)?;
        let mut store = setup.open_store()?;
        let mut watermarks = setup.watermarks();
        let mut engine = setup.engine(ImportOptions::default(), &mut store, &mut watermarks);
        engine
            .prepare()
            .with_context(|| format!("failed to scan {}", setup.folder.display()))?;

        let uuid = UniqueId::from(self.uuid.as_str());
        let Some(diff) = engine
            .diff(&uuid)
            .with_context(|| format!("diff failed for '{uuid}'"))?
        else {
            bail!("no snapshot with uuid '{uuid}' in {}", setup.folder.display());
        };

        match diff.local_id {
            Some(id) => println!("{} {} (stored as {id})", diff.entity_type, diff.uuid),
            None => println!("{} {} (not stored yet)", diff.entity_type, diff.uuid),
        }
        if diff.differences.is_empty() {
            println!("{}", "✓ no changes".green());
            return Ok(());
        }
        for line in diff.unified_diff.lines() {
            if line.starts_with('+') && !line.starts_with("+++") {
                println!("{}", line.green());
            } else if line.starts_with('-') && !line.starts_with("---") {
                println!("{}", line.red());
            } else {
                println!("{line}");
            }
        }
        Ok(())
    }
}
