//! Snapshot discovery.
//!
//! Files live at `<root>/<entity_type>/<uuid>.json`, possibly nested deeper;
//! the entity type is always the name of the file's immediate parent
//! directory. Anything whose path contains [`DELETED_MARKER`] is a
//! soft-deleted export and is ignored.

use std::path::Path;

use walkdir::WalkDir;

use courier_core::{EntityTypeId, SnapshotDescriptor, UniqueId};

use crate::error::{io_err, ImportError};

pub const SNAPSHOT_EXTENSION: &str = "json";
pub const DELETED_MARKER: &str = "_deleted";

/// Recursively collect snapshot descriptors under `root`, in path order.
///
/// Fails with [`ImportError::Io`] when `root` (or a directory below it)
/// cannot be read. Directories and non-snapshot files are skipped silently.
pub fn scan(root: &Path, force_override: bool) -> Result<Vec<SnapshotDescriptor>, ImportError> {
    let meta = std::fs::metadata(root).map_err(|e| io_err(root, e))?;
    if !meta.is_dir() {
        return Err(io_err(root, std::io::Error::other("not a directory")));
    }

    let mut descriptors = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            io_err(path, e.into())
        })?;
        if entry.file_type().is_dir() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(SNAPSHOT_EXTENSION)
            || path.to_string_lossy().contains(DELETED_MARKER)
        {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy();
        let uuid = file_name
            .strip_suffix(".json")
            .unwrap_or(&file_name)
            .to_string();
        let Some(entity_type) = path
            .parent()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
        else {
            continue;
        };

        descriptors.push(SnapshotDescriptor {
            entity_type: EntityTypeId::from(entity_type),
            uuid: UniqueId::from(uuid),
            source: path.to_path_buf(),
            force_override,
        });
    }

    tracing::debug!(root = %root.display(), found = descriptors.len(), "scanned snapshots");
    Ok(descriptors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn collects_typed_descriptors_and_skips_noise() {
        let root = assert_fs::TempDir::new().unwrap();
        root.child("node/uuid-1.json").write_str("{}").unwrap();
        root.child("taxonomy_term/uuid-2.json").write_str("{}").unwrap();
        root.child("node/readme.txt").write_str("x").unwrap();
        root.child("node_deleted/uuid-3.json").write_str("{}").unwrap();
        root.child("nested/deeper/media/uuid-4.json")
            .write_str("{}")
            .unwrap();

        let found = scan(root.path(), true).unwrap();
        let pairs: Vec<(String, String)> = found
            .iter()
            .map(|d| (d.entity_type.0.clone(), d.uuid.0.clone()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("media".to_string(), "uuid-4".to_string()),
                ("node".to_string(), "uuid-1".to_string()),
                ("taxonomy_term".to_string(), "uuid-2".to_string()),
            ]
        );
        assert!(found.iter().all(|d| d.force_override));
    }

    #[test]
    fn missing_root_is_an_io_error() {
        let root = assert_fs::TempDir::new().unwrap();
        let err = scan(&root.path().join("absent"), false).unwrap_err();
        assert!(matches!(err, ImportError::Io { .. }), "got: {err}");
    }
}
