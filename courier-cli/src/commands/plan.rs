//! `courier plan`: show the execution order of a snapshot folder.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use courier_import::{ImportOptions, PlanEntry};

use super::Setup;

/// Arguments for `courier plan`.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Snapshot folder (defaults to `content_folder` from the config).
    #[arg(long)]
    pub folder: Option<PathBuf>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize, Tabled)]
struct PlanRow {
    #[tabled(rename = "#")]
    order: usize,
    #[tabled(rename = "pass")]
    pass: String,
    #[tabled(rename = "entity type")]
    entity_type: String,
    #[tabled(rename = "uuid")]
    uuid: String,
}

impl PlanArgs {
    pub fn run(self) -> Result<()> {
        let setup = Setup::load(self.folder)?;
        let mut store = setup.open_store()?;
        let mut watermarks = setup.watermarks();
        let mut engine = setup.engine(ImportOptions::default(), &mut store, &mut watermarks);
        engine
            .prepare()
            .with_context(|| format!("failed to scan {}", setup.folder.display()))?;

        let rows = rows(&engine.plan());
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&rows).context("failed to serialize plan JSON")?
            );
            return Ok(());
        }
        if rows.is_empty() {
            println!("Nothing to import.");
            return Ok(());
        }
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}

fn rows(plan: &[PlanEntry]) -> Vec<PlanRow> {
    plan.iter()
        .enumerate()
        .map(|(i, entry)| PlanRow {
            order: i + 1,
            pass: entry.pass.to_string(),
            entity_type: entry.descriptor.entity_type.to_string(),
            uuid: entry.descriptor.uuid.to_string(),
        })
        .collect()
}
