//! Decoded snapshot documents.
//!
//! A snapshot is a HAL JSON document: field arrays (`"title": [{"value": …}]`),
//! a `_links` object, an optional `_embedded` object of reference stubs, and
//! the exporter's `_meta` object. [`SnapshotPayload`] lifts `_meta` out of the
//! document on construction so that what remains is comparable with a live
//! entity re-encoded by the codec.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::entity_type::EntityTypeDef;
use crate::types::{EntityId, RevisionId, UniqueId};

pub const LINKS_KEY: &str = "_links";
pub const EMBEDDED_KEY: &str = "_embedded";
pub const META_KEY: &str = "_meta";
pub const TARGET_REVISION_KEY: &str = "target_revision_id";

/// Exporter metadata carried under `_meta`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportMetadata {
    /// Unix seconds at which the snapshot was exported.
    #[serde(default)]
    pub export_timestamp: Option<i64>,
    /// Whether references must be re-resolved in the correction pass.
    #[serde(default = "default_true")]
    pub correction_required: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ExportMetadata {
    fn default() -> Self {
        Self {
            export_timestamp: None,
            correction_required: true,
        }
    }
}

/// One embedded reference stub, read out of `_embedded`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedReference {
    /// HAL relation the stub is listed under.
    pub link_key: String,
    /// Position of the stub inside its relation list.
    pub position: usize,
    /// Type link of the referenced entity.
    pub target_url: String,
    pub target_uuid: UniqueId,
    pub target_revision_id: Option<RevisionId>,
}

/// The decoded document of one snapshot file plus the key names needed to
/// read it.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotPayload {
    id_field: String,
    revision_field: Option<String>,
    document: Map<String, Value>,
    metadata: ExportMetadata,
}

impl SnapshotPayload {
    /// Wraps a decoded document, lifting `_meta` out of it.
    ///
    /// A `_meta` value that does not have the expected shape is dropped and
    /// treated as absent.
    pub fn new(mut document: Map<String, Value>, def: &EntityTypeDef) -> Self {
        let metadata = document
            .remove(META_KEY)
            .and_then(|meta| serde_json::from_value(meta).ok())
            .unwrap_or_default();
        Self {
            id_field: def.id_key.clone(),
            revision_field: def.revision_key.clone(),
            document,
            metadata,
        }
    }

    pub fn metadata(&self) -> &ExportMetadata {
        &self.metadata
    }

    pub fn export_timestamp(&self) -> Option<i64> {
        self.metadata.export_timestamp
    }

    pub fn document(&self) -> &Map<String, Value> {
        &self.document
    }

    pub fn into_document(self) -> Map<String, Value> {
        self.document
    }

    /// `_links.self.href`.
    pub fn self_link(&self) -> Option<&str> {
        self.link("self")
    }

    /// `_links.type.href`.
    pub fn type_link(&self) -> Option<&str> {
        self.link("type")
    }

    fn link(&self, rel: &str) -> Option<&str> {
        self.document
            .get(LINKS_KEY)?
            .get(rel)?
            .get("href")?
            .as_str()
    }

    /// First `value` of a field array.
    pub fn field_value(&self, field: &str) -> Option<&Value> {
        first_value(self.document.get(field)?)
    }

    /// Replaces a field with a single-item `[{"value": …}]` array.
    pub fn set_field_value(&mut self, field: &str, value: Value) {
        self.document
            .insert(field.to_string(), json!([{ "value": value }]));
    }

    pub fn remove_field(&mut self, field: &str) -> Option<Value> {
        self.document.shift_remove(field)
    }

    /// The literal id carried by the snapshot.
    pub fn id(&self) -> Option<EntityId> {
        self.field_value(&self.id_field).and_then(EntityId::from_value)
    }

    pub fn set_id(&mut self, id: EntityId) {
        let field = self.id_field.clone();
        self.set_field_value(&field, json!(id.0));
    }

    pub fn remove_id(&mut self) {
        let field = self.id_field.clone();
        self.remove_field(&field);
    }

    /// Drops the revision id field, if the entity type has one.
    pub fn remove_revision(&mut self) {
        if let Some(field) = self.revision_field.clone() {
            self.remove_field(&field);
        }
    }

    /// Latest `changed` time across all translations, in unix seconds.
    ///
    /// `None` when the snapshot has no `changed` field at all (exports made
    /// before the entity type tracked modification times).
    pub fn max_changed(&self) -> Option<i64> {
        self.document.get("changed").and_then(max_timestamp)
    }

    /// All well-formed embedded reference stubs, in document order.
    pub fn embedded_references(&self) -> Vec<EmbeddedReference> {
        let Some(Value::Object(embedded)) = self.document.get(EMBEDDED_KEY) else {
            return Vec::new();
        };
        let mut refs = Vec::new();
        for (link_key, stubs) in embedded {
            let Value::Array(stubs) = stubs else { continue };
            for (position, stub) in stubs.iter().enumerate() {
                let target_url = stub
                    .get(LINKS_KEY)
                    .and_then(|l| l.get("type"))
                    .and_then(|t| t.get("href"))
                    .and_then(Value::as_str);
                let target_uuid = stub
                    .get("uuid")
                    .and_then(first_value)
                    .and_then(Value::as_str);
                let (Some(target_url), Some(target_uuid)) = (target_url, target_uuid) else {
                    continue;
                };
                refs.push(EmbeddedReference {
                    link_key: link_key.clone(),
                    position,
                    target_url: target_url.to_string(),
                    target_uuid: UniqueId::from(target_uuid),
                    target_revision_id: stub
                        .get(TARGET_REVISION_KEY)
                        .and_then(EntityId::from_value)
                        .map(|id| RevisionId(id.0)),
                });
            }
        }
        refs
    }

    /// Overwrites the revision pointer of one embedded stub.
    ///
    /// Returns `false` when no stub exists at that position.
    pub fn set_target_revision(
        &mut self,
        link_key: &str,
        position: usize,
        revision: RevisionId,
    ) -> bool {
        let stub = self
            .document
            .get_mut(EMBEDDED_KEY)
            .and_then(|e| e.get_mut(link_key))
            .and_then(|stubs| stubs.get_mut(position))
            .and_then(Value::as_object_mut);
        match stub {
            Some(stub) => {
                stub.insert(TARGET_REVISION_KEY.to_string(), json!(revision.0));
                true
            }
            None => false,
        }
    }
}

/// `value` of the first item of a HAL field array.
pub fn first_value(field: &Value) -> Option<&Value> {
    field.as_array()?.first()?.get("value")
}

/// Maximum timestamp over the items of a HAL field array.
///
/// Items that do not parse count as 0, so a present-but-garbled field yields
/// `Some(0)` rather than `None`.
pub fn max_timestamp(field: &Value) -> Option<i64> {
    let items = field.as_array()?;
    Some(
        items
            .iter()
            .map(|item| item.get("value").map(parse_timestamp).unwrap_or(0))
            .fold(0, i64::max),
    )
}

/// Parses an RFC 3339 string, a numeric string or a number into unix seconds.
pub fn parse_timestamp(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n.as_i64().unwrap_or(0),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.timestamp())
            .or_else(|_| s.trim().parse::<i64>())
            .unwrap_or(0),
        _ => 0,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
