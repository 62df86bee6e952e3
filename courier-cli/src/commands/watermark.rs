//! `courier watermark`: show the last applied export time of a folder.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::DateTime;
use clap::Args;
use serde::Serialize;

use courier_core::WatermarkStore;

use super::Setup;

/// Arguments for `courier watermark`.
#[derive(Args, Debug)]
pub struct WatermarkArgs {
    /// Snapshot folder (defaults to `content_folder` from the config).
    #[arg(long)]
    pub folder: Option<PathBuf>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct WatermarkJson {
    folder: String,
    key: String,
    timestamp: i64,
}

impl WatermarkArgs {
    pub fn run(self) -> Result<()> {
        let setup = Setup::load(self.folder)?;
        let key = setup.watermark_key();
        let timestamp = setup
            .watermarks()
            .get(&key)
            .context("failed to read watermarks")?;

        if self.json {
            let payload = WatermarkJson {
                folder: setup.folder.display().to_string(),
                key,
                timestamp,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload)
                    .context("failed to serialize watermark JSON")?
            );
            return Ok(());
        }

        println!("{}", setup.folder.display());
        println!("  key:       {key}");
        if timestamp == 0 {
            println!("  watermark: never imported");
        } else {
            let when = DateTime::from_timestamp(timestamp, 0)
                .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_default();
            println!("  watermark: {timestamp} ({when})");
        }
        Ok(())
    }
}
