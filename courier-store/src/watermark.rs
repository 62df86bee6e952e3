//! Watermark store: last applied export timestamp per source folder.
//!
//! Persists a `WatermarkFile` JSON document at `<home>/.courier/watermarks.json`.
//! Writes use the same atomic `.tmp` + rename pattern as the entity store.
//! Every `get`/`set` goes back to disk, so a `set` never clobbers keys
//! written by another run in the meantime.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use courier_core::error::io_err;
use courier_core::{StoreError, WatermarkStore};

/// On-disk watermark payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WatermarkFile {
    pub updated_at: DateTime<Utc>,
    pub marks: BTreeMap<String, i64>,
}

/// `~/.courier/watermarks.json`
pub fn watermark_path_at(home: &Path) -> PathBuf {
    home.join(".courier").join("watermarks.json")
}

/// Load the watermark file. Returns an empty file if it does not yet exist.
pub fn load_at(home: &Path) -> Result<WatermarkFile, StoreError> {
    let path = watermark_path_at(home);
    if !path.exists() {
        return Ok(WatermarkFile {
            updated_at: Utc::now(),
            marks: BTreeMap::new(),
        });
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    Ok(serde_json::from_str(&contents)?)
}

/// Save the watermark file atomically.
///
/// Writes to `<path>.tmp` then renames to `<path>`.
pub fn save_at(home: &Path, file: &WatermarkFile) -> Result<(), StoreError> {
    let path = watermark_path_at(home);
    let Some(dir) = path.parent() else {
        return Err(io_err(
            path,
            std::io::Error::other("invalid watermark path"),
        ));
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let json = serde_json::to_string_pretty(file)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(())
}

/// [`WatermarkStore`] over `<home>/.courier/watermarks.json`.
#[derive(Debug, Clone)]
pub struct FileWatermarkStore {
    home: PathBuf,
}

impl FileWatermarkStore {
    pub fn at(home: &Path) -> Self {
        Self {
            home: home.to_path_buf(),
        }
    }
}

impl WatermarkStore for FileWatermarkStore {
    fn get(&self, key: &str) -> Result<i64, StoreError> {
        Ok(load_at(&self.home)?.marks.get(key).copied().unwrap_or(0))
    }

    fn set(&mut self, key: &str, timestamp: i64) -> Result<(), StoreError> {
        let mut file = load_at(&self.home)?;
        file.marks.insert(key.to_string(), timestamp);
        file.updated_at = Utc::now();
        save_at(&self.home, &file)?;
        tracing::info!(key, timestamp, "watermark stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_key_reads_as_zero() {
        let tmp = TempDir::new().unwrap();
        let store = FileWatermarkStore::at(tmp.path());
        assert_eq!(store.get("last_import.x").unwrap(), 0);
    }

    #[test]
    fn set_keeps_other_keys() {
        let tmp = TempDir::new().unwrap();
        let mut a = FileWatermarkStore::at(tmp.path());
        let mut b = FileWatermarkStore::at(tmp.path());
        a.set("one", 10).unwrap();
        b.set("two", 20).unwrap();
        assert_eq!(a.get("one").unwrap(), 10);
        assert_eq!(a.get("two").unwrap(), 20);
    }

    #[test]
    fn tmp_file_cleaned_up_after_save() {
        let tmp = TempDir::new().unwrap();
        FileWatermarkStore::at(tmp.path()).set("k", 1).unwrap();
        let tmp_path = watermark_path_at(tmp.path()).with_extension("json.tmp");
        assert!(!tmp_path.exists());
    }

    #[test]
    fn unstructured_file_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = watermark_path_at(tmp.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"last_import.abc": 1700000000}"#).unwrap();

        let store = FileWatermarkStore::at(tmp.path());
        assert!(matches!(store.get("last_import.abc"), Err(StoreError::Json(_))));
    }

    #[test]
    fn stored_file_round_trips() {
        let tmp = TempDir::new().unwrap();
        FileWatermarkStore::at(tmp.path()).set("k", 42).unwrap();
        let file = load_at(tmp.path()).unwrap();
        assert_eq!(file.marks.get("k"), Some(&42));
    }
}
