//! Collaborator interfaces the importer is built against.
//!
//! Storage, the serialization codec, link-type lookup and watermark
//! persistence are injected into the importer through these traits;
//! `courier-store` provides the concrete implementations.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::entity_type::EntityTypeDef;
use crate::error::StoreError;
use crate::payload::SnapshotPayload;
use crate::types::{Entity, EntityId, EntityTypeId, Record, UniqueId};

/// Entity storage.
pub trait EntityRepository {
    fn load_by_uuid(
        &self,
        entity_type: &EntityTypeId,
        uuid: &UniqueId,
    ) -> Result<Option<Entity>, StoreError>;

    /// Cheap existence probe that does not load the full entity.
    fn exists_by_uuid(
        &self,
        entity_type: &EntityTypeId,
        uuid: &UniqueId,
    ) -> Result<bool, StoreError> {
        Ok(self.load_by_uuid(entity_type, uuid)?.is_some())
    }

    fn load_by_id(
        &self,
        entity_type: &EntityTypeId,
        id: EntityId,
    ) -> Result<Option<Entity>, StoreError>;

    /// Persists `record`. With `is_new` set the record is created (keeping
    /// its literal id when it carries one); otherwise the entity with the
    /// record's id is replaced.
    fn save(&mut self, record: Record, is_new: bool) -> Result<Entity, StoreError>;

    /// Raw write of an already hashed credential, bypassing [`save`].
    ///
    /// [`save`]: EntityRepository::save
    fn write_credential_hash(
        &mut self,
        entity_type: &EntityTypeId,
        id: EntityId,
        field: &str,
        hash: &str,
    ) -> Result<(), StoreError>;
}

/// Snapshot serialization format.
pub trait Codec {
    /// Raw snapshot bytes to a structured document.
    fn decode(&self, bytes: &[u8]) -> Result<Map<String, Value>, StoreError>;

    /// Re-serializes a live entity the way the exporter would, with links
    /// rooted at `link_domain`.
    fn encode(
        &self,
        entity: &Entity,
        def: &EntityTypeDef,
        link_domain: &str,
    ) -> Result<Vec<u8>, StoreError>;

    /// Builds a live record from a payload. Embedded references are resolved
    /// against `repository` where their targets already exist.
    fn denormalize(
        &self,
        payload: &SnapshotPayload,
        def: &EntityTypeDef,
        repository: &dyn EntityRepository,
    ) -> Result<Record, StoreError>;
}

/// Maps HAL type links to entity types.
pub trait LinkTypes {
    fn resolve_type_from_url(&self, url: &str) -> Option<EntityTypeId>;

    /// Drops any cached link metadata.
    fn invalidate(&self);
}

/// Cross-run store of the last applied export timestamp per source.
pub trait WatermarkStore {
    /// Stored timestamp for `key`, 0 when none was ever written.
    fn get(&self, key: &str) -> Result<i64, StoreError>;

    fn set(&mut self, key: &str, timestamp: i64) -> Result<(), StoreError>;
}

impl WatermarkStore for HashMap<String, i64> {
    fn get(&self, key: &str) -> Result<i64, StoreError> {
        Ok(HashMap::get(self, key).copied().unwrap_or(0))
    }

    fn set(&mut self, key: &str, timestamp: i64) -> Result<(), StoreError> {
        self.insert(key.to_string(), timestamp);
        Ok(())
    }
}

/// Extension point run on every record right before it is saved.
pub trait PreSaveHook {
    fn pre_save(&self, record: &mut Record, payload: &SnapshotPayload);
}
