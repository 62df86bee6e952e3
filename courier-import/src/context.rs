//! Run-wide state shared by every file of one import.
//!
//! Exactly one [`RunContext`] exists per run. It is serializable so a
//! suspended batch can be resumed with the same state. Per-file changes are
//! collected in a [`FileEffect`] and applied in one call once the file is
//! done, so a failed file never leaves the context half updated.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use courier_core::UniqueId;

/// Options of one import run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOptions {
    /// Overwrite live entities even when they are not older than the snapshot.
    pub force_override: bool,
    /// Create entities with the ids carried by their snapshots.
    pub preserve_ids: bool,
    /// Skip snapshots exported before the source's stored watermark.
    pub incremental: bool,
    /// Emit a progress message for every file.
    pub verbose: bool,
    /// Classify only; persist neither entities nor the watermark.
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContext {
    pub start_time: DateTime<Utc>,
    /// Highest export timestamp seen on a file that completed.
    pub max_export_timestamp: i64,
    /// Uuids whose correction pass must be skipped.
    pub skip_correction: BTreeSet<UniqueId>,
    pub verbose: bool,
    pub preserve_ids: bool,
    pub incremental: bool,
    pub dry_run: bool,
    pub watermark_key: String,
}

/// What one completed file contributes to the [`RunContext`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileEffect {
    pub skip_correction: bool,
    pub export_timestamp: Option<i64>,
}

impl RunContext {
    pub fn new(options: &ImportOptions, watermark_key: String) -> Self {
        Self {
            start_time: Utc::now(),
            max_export_timestamp: 0,
            skip_correction: BTreeSet::new(),
            verbose: options.verbose,
            preserve_ids: options.preserve_ids,
            incremental: options.incremental,
            dry_run: options.dry_run,
            watermark_key,
        }
    }

    /// Applies the outcome of one completed file.
    pub fn apply(&mut self, uuid: &UniqueId, effect: FileEffect) {
        if effect.skip_correction {
            self.skip_correction.insert(uuid.clone());
        }
        if let Some(timestamp) = effect.export_timestamp {
            self.max_export_timestamp = self.max_export_timestamp.max(timestamp);
        }
    }

    /// Honors a pending skip mark, clearing it. Returns whether one was set.
    pub fn take_skip_correction(&mut self, uuid: &UniqueId) -> bool {
        self.skip_correction.remove(uuid)
    }

    /// Minutes since the run started, e.g. `"0.25 minutes"`.
    pub fn elapsed(&self) -> String {
        let seconds = (Utc::now() - self.start_time).num_milliseconds().max(0) as f64 / 1000.0;
        format!("{:.2} minutes", seconds / 60.0)
    }
}

/// Watermark key of a source folder: `last_import.<sha256 of the path>`.
pub fn watermark_key(folder: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(folder.to_string_lossy().as_bytes());
    format!("last_import.{}", hex::encode(hasher.finalize()))
}
