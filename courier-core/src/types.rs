//! Domain types shared by the importer and its collaborators.
//!
//! Filesystem locations are `PathBuf`; identifiers are newtypes so an entity
//! type can never be passed where a uuid is expected.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::payload::max_timestamp;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Machine name of an entity type, e.g. `node` or `path_alias`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityTypeId(pub String);

impl EntityTypeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for EntityTypeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EntityTypeId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Stable cross-environment identifier of an entity (a UUID in practice).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UniqueId(pub String);

impl UniqueId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for UniqueId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UniqueId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Local storage id of an entity. Differs between environments unless ids
/// are preserved on import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl EntityId {
    /// Reads an id out of a JSON scalar; numeric strings are accepted.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_u64().map(Self),
            Value::String(s) => s.trim().parse().ok().map(Self),
            _ => None,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Revision id of a revisionable entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionId(pub u64);

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for RevisionId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Snapshot descriptors
// ---------------------------------------------------------------------------

/// One snapshot file discovered under the source folder.
///
/// Immutable once discovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDescriptor {
    /// Entity type, taken from the name of the file's parent directory.
    pub entity_type: EntityTypeId,
    /// Unique id, taken from the file stem.
    pub uuid: UniqueId,
    /// Absolute path of the snapshot file.
    pub source: PathBuf,
    /// Overwrite the live entity even when it is not older than the snapshot.
    pub force_override: bool,
}

// ---------------------------------------------------------------------------
// Live entities
// ---------------------------------------------------------------------------

/// A reference from one entity to another as held by storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredReference {
    pub target_type: EntityTypeId,
    pub target_uuid: UniqueId,
    /// `None` while the target does not exist locally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_revision_id: Option<RevisionId>,
    /// HAL type link of the target (`…/rest/type/<type>/<bundle>`).
    pub type_href: String,
}

/// An entity as persisted by the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub entity_type: EntityTypeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<String>,
    pub id: EntityId,
    pub uuid: UniqueId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_id: Option<RevisionId>,
    /// Field data in HAL shape (`"field": [{"value": …}]`), without id,
    /// revision, links or embedded references.
    #[serde(default)]
    pub fields: Map<String, Value>,
    /// Outbound references keyed by HAL relation link.
    #[serde(default)]
    pub references: BTreeMap<String, Vec<StoredReference>>,
}

impl Entity {
    /// Latest `changed` time across all translations, in unix seconds.
    pub fn changed_across_translations(&self) -> Option<i64> {
        self.fields.get("changed").and_then(max_timestamp)
    }
}

/// A live record built from a snapshot payload, ready to be saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub entity_type: EntityTypeId,
    pub bundle: Option<String>,
    /// `None` lets storage assign an id on create.
    pub id: Option<EntityId>,
    pub uuid: UniqueId,
    /// Storage creates a new revision on every save when set.
    pub revisionable: bool,
    pub fields: Map<String, Value>,
    pub references: BTreeMap<String, Vec<StoredReference>>,
    /// Credential field the record never carries. On update storage keeps
    /// the stored value of this field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_field: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn newtype_display() {
        assert_eq!(EntityTypeId::from("node").to_string(), "node");
        assert_eq!(UniqueId::from("abc").to_string(), "abc");
        assert_eq!(EntityId(7).to_string(), "7");
    }

    #[test]
    fn entity_id_from_loose_scalars() {
        assert_eq!(EntityId::from_value(&json!(12)), Some(EntityId(12)));
        assert_eq!(EntityId::from_value(&json!("12")), Some(EntityId(12)));
        assert_eq!(EntityId::from_value(&json!("twelve")), None);
        assert_eq!(EntityId::from_value(&json!(null)), None);
    }

    #[test]
    fn changed_across_translations_takes_the_latest() {
        let mut fields = Map::new();
        fields.insert(
            "changed".to_string(),
            json!([
                {"value": "2021-01-01T00:00:00+00:00", "lang": "en"},
                {"value": "2021-01-02T00:00:00+00:00", "lang": "de"},
            ]),
        );
        let entity = Entity {
            entity_type: "node".into(),
            bundle: None,
            id: EntityId(1),
            uuid: "u".into(),
            revision_id: None,
            fields,
            references: BTreeMap::new(),
        };
        assert_eq!(entity.changed_across_translations(), Some(1_609_545_600));
    }
}
