//! HAL JSON snapshot codec.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use courier_core::payload::{first_value, EMBEDDED_KEY, LINKS_KEY, TARGET_REVISION_KEY};
use courier_core::{
    Codec, Entity, EntityRepository, EntityTypeDef, EntityTypeId, Record, SnapshotPayload,
    StoreError, StoredReference, UniqueId,
};

use crate::link_types::{parse_type_href, type_href};

#[derive(Debug, Clone, Copy, Default)]
pub struct HalCodec;

impl HalCodec {
    pub fn new() -> Self {
        Self
    }
}

fn entity_href(domain: &str, entity_type: &EntityTypeId, id: impl std::fmt::Display) -> String {
    format!("{domain}/{entity_type}/{id}?_format=hal_json")
}

/// Second-to-last path segment of a link that is not a type link, e.g.
/// `node` for `http://a.test/node/12`.
fn path_type_segment(url: &str) -> &str {
    let path = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let segments: Vec<&str> = path.split('/').skip(1).filter(|s| !s.is_empty()).collect();
    segments
        .len()
        .checked_sub(2)
        .map_or("", |i| segments[i])
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl Codec for HalCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Map<String, Value>, StoreError> {
        match serde_json::from_slice::<Value>(bytes)? {
            Value::Object(document) => Ok(document),
            other => Err(StoreError::Malformed(format!(
                "expected a JSON object, found {}",
                kind(&other)
            ))),
        }
    }

    fn encode(
        &self,
        entity: &Entity,
        def: &EntityTypeDef,
        link_domain: &str,
    ) -> Result<Vec<u8>, StoreError> {
        let mut links = Map::new();
        links.insert(
            "self".to_string(),
            json!({ "href": entity_href(link_domain, &entity.entity_type, entity.id) }),
        );
        links.insert(
            "type".to_string(),
            json!({ "href": type_href(link_domain, &entity.entity_type, entity.bundle.as_deref()) }),
        );
        for (link_key, refs) in &entity.references {
            let hrefs: Vec<Value> = refs
                .iter()
                .filter_map(|r| {
                    r.target_id
                        .map(|id| json!({ "href": entity_href(link_domain, &r.target_type, id) }))
                })
                .collect();
            links.insert(link_key.clone(), Value::Array(hrefs));
        }

        let mut document = Map::new();
        document.insert(LINKS_KEY.to_string(), Value::Object(links));
        document.insert(def.id_key.clone(), json!([{ "value": entity.id.0 }]));
        if let (Some(key), Some(revision)) = (&def.revision_key, entity.revision_id) {
            document.insert(key.clone(), json!([{ "value": revision.0 }]));
        }
        for (field, value) in &entity.fields {
            document.insert(field.clone(), value.clone());
        }

        if !entity.references.is_empty() {
            let mut embedded = Map::new();
            for (link_key, refs) in &entity.references {
                let stubs: Vec<Value> = refs
                    .iter()
                    .map(|r| {
                        let mut stub = Map::new();
                        stub.insert(
                            LINKS_KEY.to_string(),
                            json!({ "type": { "href": r.type_href } }),
                        );
                        stub.insert("uuid".to_string(), json!([{ "value": r.target_uuid }]));
                        if let Some(revision) = r.target_revision_id {
                            stub.insert(TARGET_REVISION_KEY.to_string(), json!(revision.0));
                        }
                        Value::Object(stub)
                    })
                    .collect();
                embedded.insert(link_key.clone(), Value::Array(stubs));
            }
            document.insert(EMBEDDED_KEY.to_string(), Value::Object(embedded));
        }

        Ok(serde_json::to_vec_pretty(&Value::Object(document))?)
    }

    fn denormalize(
        &self,
        payload: &SnapshotPayload,
        def: &EntityTypeDef,
        repository: &dyn EntityRepository,
    ) -> Result<Record, StoreError> {
        let document = payload.document();
        let uuid = document
            .get(&def.uuid_key)
            .and_then(first_value)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                StoreError::Malformed(format!("{} snapshot has no {}", def.id, def.uuid_key))
            })?;
        let bundle = payload
            .type_link()
            .and_then(parse_type_href)
            .map(|(_, bundle)| bundle);

        let skipped = |key: &str| {
            key == LINKS_KEY
                || key == EMBEDDED_KEY
                || key == def.id_key
                || def.revision_key.as_deref() == Some(key)
                || def.credential_field.as_deref() == Some(key)
        };
        let fields: Map<String, Value> = document
            .iter()
            .filter(|(key, _)| !skipped(key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let mut references: BTreeMap<String, Vec<StoredReference>> = BTreeMap::new();
        for stub in payload.embedded_references() {
            let (target_type, target_id) = match parse_type_href(&stub.target_url) {
                Some((target_type, _)) => {
                    let target = repository.load_by_uuid(&target_type, &stub.target_uuid)?;
                    (target_type, target.map(|e| e.id))
                }
                None => {
                    tracing::debug!(
                        url = %stub.target_url,
                        uuid = %stub.target_uuid,
                        "embedded reference left unresolved"
                    );
                    (EntityTypeId::from(path_type_segment(&stub.target_url)), None)
                }
            };
            references
                .entry(stub.link_key)
                .or_default()
                .push(StoredReference {
                    target_type,
                    target_uuid: stub.target_uuid,
                    target_id,
                    target_revision_id: stub.target_revision_id,
                    type_href: stub.target_url,
                });
        }

        Ok(Record {
            entity_type: def.id.clone(),
            bundle,
            id: payload.id(),
            uuid: UniqueId::from(uuid),
            revisionable: def.is_revisionable(),
            fields,
            references,
            credential_field: def.credential_field.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::EntityTypeRegistry;
    use rstest::rstest;

    use crate::memory::MemoryRepository;

    fn def(id: &str) -> EntityTypeDef {
        EntityTypeRegistry::default()
            .get(&EntityTypeId::from(id))
            .cloned()
            .expect("builtin")
    }

    fn payload(entity_type: &str, doc: Value) -> SnapshotPayload {
        let Value::Object(map) = doc else {
            panic!("object expected")
        };
        SnapshotPayload::new(map, &def(entity_type))
    }

    #[test]
    fn decode_rejects_non_objects() {
        let codec = HalCodec::new();
        assert!(matches!(
            codec.decode(b"[1, 2]"),
            Err(StoreError::Malformed(_))
        ));
        assert!(matches!(codec.decode(b"{oops"), Err(StoreError::Json(_))));
        assert!(codec.decode(br#"{"a": 1}"#).is_ok());
    }

    #[test]
    fn denormalize_resolves_existing_targets_only() {
        let mut repo = MemoryRepository::new();
        let media = repo
            .save(
                Record {
                    entity_type: "media".into(),
                    bundle: Some("image".to_string()),
                    id: None,
                    uuid: "m-1".into(),
                    revisionable: true,
                    fields: Map::new(),
                    references: BTreeMap::new(),
                    credential_field: None,
                },
                true,
            )
            .unwrap();

        let rel = "http://a.test/rest/relation/node/article/field_media";
        let p = payload(
            "node",
            json!({
                "_links": {"type": {"href": "http://a.test/rest/type/node/article"}},
                "nid": [{"value": 8}],
                "vid": [{"value": 80}],
                "uuid": [{"value": "n-1"}],
                "title": [{"value": "Hello"}],
                "_embedded": {
                    rel: [
                        {"_links": {"type": {"href": "http://a.test/rest/type/media/image"}}, "uuid": [{"value": "m-1"}]},
                        {"_links": {"type": {"href": "http://a.test/rest/type/media/image"}}, "uuid": [{"value": "m-2"}]}
                    ]
                }
            }),
        );

        let record = HalCodec::new()
            .denormalize(&p, &def("node"), &repo)
            .unwrap();
        assert_eq!(record.bundle.as_deref(), Some("article"));
        assert_eq!(record.id, Some(courier_core::EntityId(8)));
        assert!(!record.fields.contains_key("vid"));
        assert!(!record.fields.contains_key("_links"));
        assert_eq!(record.references[rel][0].target_id, Some(media.id));
        assert_eq!(record.references[rel][1].target_id, None);
    }

    #[test]
    fn denormalize_defers_stubs_without_a_type_link() {
        let mut repo = MemoryRepository::new();
        repo.save(
            Record {
                entity_type: "media".into(),
                bundle: None,
                id: None,
                uuid: "m-1".into(),
                revisionable: true,
                fields: Map::new(),
                references: BTreeMap::new(),
                credential_field: None,
            },
            true,
        )
        .unwrap();

        let rel = "http://a.test/rest/relation/node/article/field_media";
        let p = payload(
            "node",
            json!({
                "_links": {"type": {"href": "http://a.test/rest/type/node/article"}},
                "uuid": [{"value": "n-1"}],
                "_embedded": {
                    rel: [{"_links": {"type": {"href": "http://a.test/media/12"}}, "uuid": [{"value": "m-1"}]}]
                }
            }),
        );

        let record = HalCodec::new().denormalize(&p, &def("node"), &repo).unwrap();
        let reference = &record.references[rel][0];
        assert_eq!(reference.target_type, EntityTypeId::from("media"));
        assert_eq!(reference.target_id, None);
        assert_eq!(reference.type_href, "http://a.test/media/12");
    }

    #[rstest]
    #[case("http://a.test/media/12", "media")]
    #[case("https://a.test:8080/taxonomy/term/3?x=1", "term")]
    #[case("http://a.test/12", "")]
    fn path_type_segment_takes_second_to_last(#[case] url: &str, #[case] expected: &str) {
        assert_eq!(path_type_segment(url), expected);
    }

    #[test]
    fn denormalize_carries_credential_field_name() {
        let repo = MemoryRepository::new();
        let p = payload("user", json!({"uuid": [{"value": "u-1"}]}));
        let record = HalCodec::new().denormalize(&p, &def("user"), &repo).unwrap();
        assert_eq!(record.credential_field.as_deref(), Some("pass"));
    }

    #[test]
    fn denormalize_drops_credential_field() {
        let repo = MemoryRepository::new();
        let p = payload(
            "user",
            json!({
                "uuid": [{"value": "u-1"}],
                "name": [{"value": "editor"}],
                "pass": [{"value": "$2y$10$hash"}]
            }),
        );
        let record = HalCodec::new().denormalize(&p, &def("user"), &repo).unwrap();
        assert!(!record.fields.contains_key("pass"));
        assert!(record.fields.contains_key("name"));
    }

    #[test]
    fn encode_emits_links_ids_and_embedded() {
        let mut references = BTreeMap::new();
        references.insert(
            "rel".to_string(),
            vec![StoredReference {
                target_type: "media".into(),
                target_uuid: "m-1".into(),
                target_id: Some(courier_core::EntityId(2)),
                target_revision_id: Some(courier_core::RevisionId(5)),
                type_href: "http://a.test/rest/type/media/image".to_string(),
            }],
        );
        let entity = Entity {
            entity_type: "node".into(),
            bundle: Some("article".to_string()),
            id: courier_core::EntityId(3),
            uuid: "n-1".into(),
            revision_id: Some(courier_core::RevisionId(9)),
            fields: Map::new(),
            references,
        };
        let bytes = HalCodec::new()
            .encode(&entity, &def("node"), "http://b.test")
            .unwrap();
        let doc: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            doc["_links"]["self"]["href"],
            "http://b.test/node/3?_format=hal_json"
        );
        assert_eq!(
            doc["_links"]["type"]["href"],
            "http://b.test/rest/type/node/article"
        );
        assert_eq!(doc["nid"][0]["value"], 3);
        assert_eq!(doc["vid"][0]["value"], 9);
        assert_eq!(doc["_embedded"]["rel"][0]["target_revision_id"], 5);
        assert_eq!(doc["_embedded"]["rel"][0]["uuid"][0]["value"], "m-1");
    }
}
