//! Courier core library: domain types, snapshot payloads, entity-type
//! capabilities, collaborator traits, configuration, errors.
//!
//! Public API surface:
//! - [`types`]: newtypes, descriptors, live entities and records
//! - [`payload`]: [`SnapshotPayload`], the decoded HAL document of one file
//! - [`entity_type`]: the entity-type capability table
//! - [`collaborators`]: repository / codec / link-type / watermark traits
//! - [`config`]: `~/.courier/config.yaml` load
//! - [`error`]: [`StoreError`], [`ConfigError`]

pub mod collaborators;
pub mod config;
pub mod entity_type;
pub mod error;
pub mod payload;
pub mod types;

pub use collaborators::{Codec, EntityRepository, LinkTypes, PreSaveHook, WatermarkStore};
pub use config::Config;
pub use entity_type::{EntityTypeDef, EntityTypeRegistry};
pub use error::{ConfigError, StoreError};
pub use payload::{EmbeddedReference, ExportMetadata, SnapshotPayload};
pub use types::{
    Entity, EntityId, EntityTypeId, Record, RevisionId, SnapshotDescriptor, StoredReference,
    UniqueId,
};
