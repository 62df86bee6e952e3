//! Snapshot-versus-live preview for `courier diff`.

use serde_json::{Map, Value};
use similar::TextDiff;

use courier_core::payload::LINKS_KEY;
use courier_core::{
    Codec, EntityId, EntityRepository, EntityTypeDef, EntityTypeId, SnapshotDescriptor,
    SnapshotPayload, UniqueId,
};

use crate::classify::comparable_document;
use crate::compare::{loose_diff, Difference};
use crate::error::ImportError;
use crate::resolve::{link_domain, ReferenceResolver};

/// Differences between one snapshot and its live entity.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotDiff {
    pub entity_type: EntityTypeId,
    pub uuid: UniqueId,
    /// `None` when the entity does not exist locally.
    pub local_id: Option<EntityId>,
    /// Loose-comparison differences; empty when the import would skip.
    pub differences: Vec<Difference>,
    /// Unified diff of the two documents, live first. Empty when identical.
    pub unified_diff: String,
}

/// Compares `payload` with the live entity the way the classifier does and
/// renders the result as a unified diff.
///
/// `_links` are left out of the rendered documents, and the live side only
/// shows keys the snapshot has.
pub fn diff_snapshot(
    descriptor: &SnapshotDescriptor,
    def: &EntityTypeDef,
    payload: &SnapshotPayload,
    repository: &dyn EntityRepository,
    codec: &dyn Codec,
    resolver: &ReferenceResolver<'_>,
) -> Result<SnapshotDiff, ImportError> {
    let live = repository.load_by_uuid(&descriptor.entity_type, &descriptor.uuid)?;
    let local_id = live.as_ref().map(|e| e.id);
    let snapshot = comparable_document(resolver, descriptor, payload, local_id)?;

    let current = match &live {
        Some(entity) => {
            let domain = link_domain(payload).unwrap_or_default();
            codec.decode(&codec.encode(entity, def, &domain)?)?
        }
        None => Map::new(),
    };
    let differences = loose_diff(&snapshot, &current);

    let shown: Map<String, Value> = current
        .iter()
        .filter(|(key, _)| snapshot.contains_key(key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    let old = render(&shown)?;
    let new = render(&snapshot)?;
    let unified_diff = if old == new {
        String::new()
    } else {
        let name = format!("{}/{}", descriptor.entity_type, descriptor.uuid);
        let old_header = format!("live/{name}");
        let new_header = format!("snapshot/{name}");
        TextDiff::from_lines(&old, &new)
            .unified_diff()
            .header(&old_header, &new_header)
            .context_radius(3)
            .to_string()
    };

    Ok(SnapshotDiff {
        entity_type: descriptor.entity_type.clone(),
        uuid: descriptor.uuid.clone(),
        local_id,
        differences,
        unified_diff,
    })
}

fn render(document: &Map<String, Value>) -> Result<String, ImportError> {
    let mut value = Value::Object(document.clone());
    strip_links(&mut value);
    let mut text = serde_json::to_string_pretty(&value)?;
    text.push('\n');
    Ok(text)
}

fn strip_links(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.shift_remove(LINKS_KEY);
            map.values_mut().for_each(strip_links);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_links),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use serde_json::json;

    use courier_core::EntityTypeRegistry;
    use courier_store::{HalCodec, HalLinkTypes, MemoryRepository};

    fn setup(doc: Value) -> (EntityTypeDef, SnapshotPayload, SnapshotDescriptor) {
        let def = EntityTypeRegistry::default()
            .get(&EntityTypeId::from("paragraph"))
            .cloned()
            .expect("builtin");
        let Value::Object(map) = doc else {
            panic!("object expected")
        };
        let mut payload = SnapshotPayload::new(map, &def);
        payload.remove_revision();
        let descriptor = SnapshotDescriptor {
            entity_type: "paragraph".into(),
            uuid: "p-1".into(),
            source: PathBuf::from("/c/paragraph/p-1.json"),
            force_override: false,
        };
        (def, payload, descriptor)
    }

    fn paragraph(body: &str) -> Value {
        json!({
            "_links": {"type": {"href": "http://src.test/rest/type/paragraph/text"}},
            "id": [{"value": 9}],
            "uuid": [{"value": "p-1"}],
            "body": [{"value": body}]
        })
    }

    #[test]
    fn edited_field_shows_up_in_unified_diff() {
        let registry = EntityTypeRegistry::default();
        let links = HalLinkTypes::new(registry.clone());
        let codec = HalCodec::new();
        let mut repo = MemoryRepository::new();

        let (def, mut stored, _) = setup(paragraph("Before"));
        stored.remove_id();
        let record = codec.denormalize(&stored, &def, &repo).unwrap();
        repo.save(record, true).unwrap();

        let (def, payload, descriptor) = setup(paragraph("After"));
        let resolver = ReferenceResolver::new(&repo, &links, &registry);
        let diff = diff_snapshot(&descriptor, &def, &payload, &repo, &codec, &resolver).unwrap();

        assert_eq!(diff.local_id, Some(EntityId(1)));
        assert_eq!(diff.differences.len(), 1);
        assert!(diff.unified_diff.contains("--- live/paragraph/p-1"));
        assert!(diff.unified_diff.contains("-      \"value\": \"Before\""));
        assert!(diff.unified_diff.contains("+      \"value\": \"After\""));
        assert!(!diff.unified_diff.contains("_links"));
    }

    #[test]
    fn missing_entity_diffs_against_nothing() {
        let registry = EntityTypeRegistry::default();
        let links = HalLinkTypes::new(registry.clone());
        let repo = MemoryRepository::new();
        let (def, payload, descriptor) = setup(paragraph("New"));
        let resolver = ReferenceResolver::new(&repo, &links, &registry);
        let diff =
            diff_snapshot(&descriptor, &def, &payload, &repo, &HalCodec::new(), &resolver).unwrap();
        assert_eq!(diff.local_id, None);
        assert!(!diff.differences.is_empty());
        assert!(diff.unified_diff.contains("+++ snapshot/paragraph/p-1"));
    }
}
