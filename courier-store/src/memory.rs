//! In-memory entity storage.
//!
//! Ids are assigned per entity type (max + 1); revision ids come from one
//! counter shared by all types, so a re-saved entity always gets a revision
//! id no other entity has used.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use courier_core::{
    Entity, EntityId, EntityRepository, EntityTypeId, Record, RevisionId, StoreError, UniqueId,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryRepository {
    #[serde(default)]
    entities: BTreeMap<EntityTypeId, BTreeMap<EntityId, Entity>>,
    #[serde(default)]
    last_revision: u64,
    #[serde(skip)]
    saves: usize,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of [`EntityRepository::save`] calls that succeeded.
    pub fn saves(&self) -> usize {
        self.saves
    }

    /// Total number of stored entities.
    pub fn len(&self) -> usize {
        self.entities.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn rejected(entity_type: &EntityTypeId, reason: String) -> StoreError {
        StoreError::Rejected {
            entity_type: entity_type.clone(),
            reason,
        }
    }
}

impl EntityRepository for MemoryRepository {
    fn load_by_uuid(
        &self,
        entity_type: &EntityTypeId,
        uuid: &UniqueId,
    ) -> Result<Option<Entity>, StoreError> {
        Ok(self
            .entities
            .get(entity_type)
            .and_then(|bucket| bucket.values().find(|e| &e.uuid == uuid))
            .cloned())
    }

    fn load_by_id(
        &self,
        entity_type: &EntityTypeId,
        id: EntityId,
    ) -> Result<Option<Entity>, StoreError> {
        Ok(self
            .entities
            .get(entity_type)
            .and_then(|bucket| bucket.get(&id))
            .cloned())
    }

    fn save(&mut self, record: Record, is_new: bool) -> Result<Entity, StoreError> {
        let bucket = self.entities.entry(record.entity_type.clone()).or_default();

        let id = if is_new {
            if bucket.values().any(|e| e.uuid == record.uuid) {
                return Err(Self::rejected(
                    &record.entity_type,
                    format!("uuid {} already exists", record.uuid),
                ));
            }
            match record.id {
                Some(id) if bucket.contains_key(&id) => {
                    return Err(Self::rejected(
                        &record.entity_type,
                        format!("id {id} already exists"),
                    ));
                }
                Some(id) => id,
                None => EntityId(bucket.keys().next_back().map_or(1, |last| last.0 + 1)),
            }
        } else {
            let Some(id) = record.id else {
                return Err(Self::rejected(
                    &record.entity_type,
                    "update without an id".to_string(),
                ));
            };
            if !bucket.contains_key(&id) {
                return Err(StoreError::NotFound {
                    entity_type: record.entity_type,
                    id,
                });
            }
            id
        };

        let revision_id = if record.revisionable {
            self.last_revision += 1;
            Some(RevisionId(self.last_revision))
        } else {
            None
        };

        let mut fields = record.fields;
        if let (false, Some(field)) = (is_new, &record.credential_field) {
            if !fields.contains_key(field) {
                if let Some(stored) = bucket.get(&id).and_then(|e| e.fields.get(field)) {
                    fields.insert(field.clone(), stored.clone());
                }
            }
        }

        let entity = Entity {
            entity_type: record.entity_type,
            bundle: record.bundle,
            id,
            uuid: record.uuid,
            revision_id,
            fields,
            references: record.references,
        };
        bucket.insert(id, entity.clone());
        self.saves += 1;
        tracing::debug!(
            entity_type = %entity.entity_type,
            id = %entity.id,
            is_new,
            "saved entity"
        );
        Ok(entity)
    }

    fn write_credential_hash(
        &mut self,
        entity_type: &EntityTypeId,
        id: EntityId,
        field: &str,
        hash: &str,
    ) -> Result<(), StoreError> {
        let entity = self
            .entities
            .get_mut(entity_type)
            .and_then(|bucket| bucket.get_mut(&id))
            .ok_or_else(|| StoreError::NotFound {
                entity_type: entity_type.clone(),
                id,
            })?;
        entity
            .fields
            .insert(field.to_string(), json!([{ "value": hash }]));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn record(uuid: &str, id: Option<u64>) -> Record {
        Record {
            entity_type: "node".into(),
            bundle: Some("page".to_string()),
            id: id.map(EntityId),
            uuid: uuid.into(),
            revisionable: true,
            fields: Map::new(),
            references: BTreeMap::new(),
            credential_field: None,
        }
    }

    #[test]
    fn create_assigns_sequential_ids_and_revisions() {
        let mut repo = MemoryRepository::new();
        let a = repo.save(record("a", None), true).unwrap();
        let b = repo.save(record("b", None), true).unwrap();
        assert_eq!(a.id, EntityId(1));
        assert_eq!(b.id, EntityId(2));
        assert_eq!(b.revision_id, Some(RevisionId(2)));
        assert_eq!(repo.saves(), 2);
    }

    #[test]
    fn create_keeps_literal_id() {
        let mut repo = MemoryRepository::new();
        let e = repo.save(record("a", Some(40)), true).unwrap();
        assert_eq!(e.id, EntityId(40));
        let next = repo.save(record("b", None), true).unwrap();
        assert_eq!(next.id, EntityId(41));
    }

    #[test]
    fn create_rejects_duplicate_id_and_uuid() {
        let mut repo = MemoryRepository::new();
        repo.save(record("a", Some(3)), true).unwrap();
        assert!(matches!(
            repo.save(record("b", Some(3)), true),
            Err(StoreError::Rejected { .. })
        ));
        assert!(matches!(
            repo.save(record("a", None), true),
            Err(StoreError::Rejected { .. })
        ));
    }

    #[test]
    fn update_bumps_revision_and_requires_existing_id() {
        let mut repo = MemoryRepository::new();
        let created = repo.save(record("a", None), true).unwrap();
        let updated = repo.save(record("a", Some(created.id.0)), false).unwrap();
        assert!(updated.revision_id > created.revision_id);
        assert!(matches!(
            repo.save(record("z", Some(99)), false),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn credential_hash_is_written_in_place() {
        let mut repo = MemoryRepository::new();
        let mut user = record("u", None);
        user.entity_type = "user".into();
        user.revisionable = false;
        let saved = repo.save(user, true).unwrap();
        repo.write_credential_hash(&"user".into(), saved.id, "pass", "$2y$10$abc")
            .unwrap();
        let loaded = repo.load_by_id(&"user".into(), saved.id).unwrap().unwrap();
        assert_eq!(loaded.fields["pass"][0]["value"], "$2y$10$abc");
        assert_eq!(repo.saves(), 1, "raw write is not a save");
    }

    #[test]
    fn update_keeps_stored_credential_when_record_has_none() {
        let mut repo = MemoryRepository::new();
        let mut user = record("u", None);
        user.entity_type = "user".into();
        user.credential_field = Some("pass".to_string());
        let saved = repo.save(user.clone(), true).unwrap();
        repo.write_credential_hash(&"user".into(), saved.id, "pass", "$2y$10$abc")
            .unwrap();

        user.id = Some(saved.id);
        let updated = repo.save(user.clone(), false).unwrap();
        assert_eq!(updated.fields["pass"][0]["value"], "$2y$10$abc");

        user.credential_field = None;
        let cleared = repo.save(user, false).unwrap();
        assert!(!cleared.fields.contains_key("pass"));
    }
}
