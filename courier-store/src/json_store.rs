//! File-backed entity storage.
//!
//! A [`MemoryRepository`] persisted as `<dir>/store.json`. Every mutation is
//! flushed before it returns, using the `.tmp` + rename pattern, so an entity
//! reported as saved survives a crash of the run that saved it.

use std::path::{Path, PathBuf};

use courier_core::error::io_err;
use courier_core::{Entity, EntityId, EntityRepository, EntityTypeId, Record, StoreError, UniqueId};

use crate::memory::MemoryRepository;

/// `<dir>/store.json`: pure, no I/O.
pub fn store_path(dir: &Path) -> PathBuf {
    dir.join("store.json")
}

#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    inner: MemoryRepository,
}

impl JsonStore {
    /// Open the store in `dir`. An absent store file yields an empty store.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        let path = store_path(dir);
        let inner = if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
            serde_json::from_str(&contents)?
        } else {
            MemoryRepository::new()
        };
        Ok(Self { path, inner })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn repository(&self) -> &MemoryRepository {
        &self.inner
    }

    fn persist(&self) -> Result<(), StoreError> {
        let Some(dir) = self.path.parent() else {
            return Err(io_err(
                &self.path,
                std::io::Error::other("invalid store path"),
            ));
        };
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

        let json = serde_json::to_string_pretty(&self.inner)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| io_err(&self.path, e))?;
        Ok(())
    }
}

impl EntityRepository for JsonStore {
    fn load_by_uuid(
        &self,
        entity_type: &EntityTypeId,
        uuid: &UniqueId,
    ) -> Result<Option<Entity>, StoreError> {
        self.inner.load_by_uuid(entity_type, uuid)
    }

    fn load_by_id(
        &self,
        entity_type: &EntityTypeId,
        id: EntityId,
    ) -> Result<Option<Entity>, StoreError> {
        self.inner.load_by_id(entity_type, id)
    }

    fn save(&mut self, record: Record, is_new: bool) -> Result<Entity, StoreError> {
        let entity = self.inner.save(record, is_new)?;
        self.persist()?;
        Ok(entity)
    }

    fn write_credential_hash(
        &mut self,
        entity_type: &EntityTypeId,
        id: EntityId,
        field: &str,
        hash: &str,
    ) -> Result<(), StoreError> {
        self.inner
            .write_credential_hash(entity_type, id, field, hash)?;
        self.persist()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use serde_json::{json, Map};
    use tempfile::TempDir;

    fn page(uuid: &str) -> Record {
        let mut fields = Map::new();
        fields.insert("title".to_string(), json!([{ "value": "About" }]));
        Record {
            entity_type: "node".into(),
            bundle: Some("page".to_string()),
            id: None,
            uuid: uuid.into(),
            revisionable: true,
            fields,
            references: BTreeMap::new(),
            credential_field: None,
        }
    }

    #[test]
    fn empty_store_when_file_missing() {
        let tmp = TempDir::new().unwrap();
        let store = JsonStore::open(tmp.path()).unwrap();
        assert!(store.repository().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn saved_entities_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        let mut store = JsonStore::open(tmp.path()).unwrap();
        let saved = store.save(page("p-1"), true).unwrap();

        let reopened = JsonStore::open(tmp.path()).unwrap();
        let loaded = reopened
            .load_by_uuid(&"node".into(), &"p-1".into())
            .unwrap()
            .expect("persisted");
        assert_eq!(loaded, saved);
    }

    #[test]
    fn revision_counter_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let mut store = JsonStore::open(tmp.path()).unwrap();
        let first = store.save(page("p-1"), true).unwrap();

        let mut reopened = JsonStore::open(tmp.path()).unwrap();
        let second = reopened.save(page("p-2"), true).unwrap();
        assert!(second.revision_id > first.revision_id);
    }

    #[test]
    fn tmp_file_cleaned_up_after_save() {
        let tmp = TempDir::new().unwrap();
        let mut store = JsonStore::open(tmp.path()).unwrap();
        store.save(page("p-1"), true).unwrap();
        let tmp_path = store_path(tmp.path()).with_extension("json.tmp");
        assert!(
            !tmp_path.exists(),
            "tmp file should be removed after atomic rename"
        );
    }
}
