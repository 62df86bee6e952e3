#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;

use serde_json::{json, Map, Value};
use tempfile::TempDir;

use courier_core::{Entity, EntityRepository, EntityTypeRegistry, PreSaveHook};
use courier_import::{
    watermark_key, Collaborators, ImportOptions, Outcome, Pass, ReconciliationEngine, RunSummary,
};
use courier_store::{HalCodec, HalLinkTypes, MemoryRepository};

pub const DOMAIN: &str = "http://staging.test";

pub struct Harness {
    pub content: TempDir,
    pub registry: EntityTypeRegistry,
    pub links: HalLinkTypes,
    pub codec: HalCodec,
    pub repo: MemoryRepository,
    pub marks: HashMap<String, i64>,
}

impl Harness {
    pub fn new() -> Self {
        let registry = EntityTypeRegistry::default();
        Self {
            content: TempDir::new().expect("content dir"),
            links: HalLinkTypes::new(registry.clone()),
            registry,
            codec: HalCodec::new(),
            repo: MemoryRepository::new(),
            marks: HashMap::new(),
        }
    }

    pub fn write(&self, entity_type: &str, uuid: &str, doc: &Value) {
        let dir = self.content.path().join(entity_type);
        fs::create_dir_all(&dir).expect("mkdir");
        let body = serde_json::to_string_pretty(doc).expect("serialize");
        fs::write(dir.join(format!("{uuid}.json")), body).expect("write snapshot");
    }

    pub fn write_raw(&self, entity_type: &str, uuid: &str, body: &str) {
        let dir = self.content.path().join(entity_type);
        fs::create_dir_all(&dir).expect("mkdir");
        fs::write(dir.join(format!("{uuid}.json")), body).expect("write snapshot");
    }

    pub fn engine(&mut self, options: ImportOptions) -> ReconciliationEngine<'_> {
        self.engine_with_hooks(options, Vec::new())
    }

    pub fn engine_with_hooks<'a>(
        &'a mut self,
        options: ImportOptions,
        hooks: Vec<&'a dyn PreSaveHook>,
    ) -> ReconciliationEngine<'a> {
        ReconciliationEngine::new(
            self.content.path(),
            options,
            Collaborators {
                registry: &self.registry,
                repository: &mut self.repo,
                codec: &self.codec,
                link_types: &self.links,
                watermarks: &mut self.marks,
                hooks,
            },
        )
    }

    pub fn run(&mut self, options: ImportOptions) -> RunSummary {
        self.engine(options).import().expect("import run")
    }

    pub fn entity(&self, entity_type: &str, uuid: &str) -> Entity {
        self.repo
            .load_by_uuid(&entity_type.into(), &uuid.into())
            .expect("load")
            .unwrap_or_else(|| panic!("{entity_type} {uuid} not stored"))
    }

    pub fn watermark(&self) -> i64 {
        self.marks
            .get(&watermark_key(self.content.path()))
            .copied()
            .unwrap_or(0)
    }
}

/// `(uuid, outcome)` of every report of `pass`, in plan order.
pub fn outcomes(summary: &RunSummary, pass: Pass) -> Vec<(String, Outcome)> {
    summary
        .reports
        .iter()
        .filter(|r| r.pass == pass)
        .map(|r| (r.uuid.0.clone(), r.outcome.clone()))
        .collect()
}

pub fn node(uuid: &str, title: &str, changed: &str, exported: i64) -> Value {
    json!({
        "_links": {
            "self": {"href": format!("{DOMAIN}/node/40?_format=hal_json")},
            "type": {"href": format!("{DOMAIN}/rest/type/node/article")}
        },
        "nid": [{"value": 40}],
        "vid": [{"value": 400}],
        "uuid": [{"value": uuid}],
        "title": [{"value": title}],
        "changed": [{"value": changed, "langcode": "en"}],
        "path": [{"alias": "/computed", "pid": 3}],
        "_meta": {"export_timestamp": exported}
    })
}

/// Adds an embedded reference from `doc` to the node `target_uuid`.
pub fn with_related_node(mut doc: Value, target_uuid: &str) -> Value {
    let rel = format!("{DOMAIN}/rest/relation/node/article/field_related");
    doc["_links"][rel.as_str()] = json!([{"href": format!("{DOMAIN}/node/99")}]);
    let mut embedded = Map::new();
    embedded.insert(
        rel,
        json!([{
            "_links": {"type": {"href": format!("{DOMAIN}/rest/type/node/article")}},
            "uuid": [{"value": target_uuid}],
            "target_revision_id": 1
        }]),
    );
    doc["_embedded"] = Value::Object(embedded);
    doc
}

pub fn path_alias(uuid: &str, path: &str, alias: &str) -> Value {
    json!({
        "_links": {
            "self": {"href": format!("{DOMAIN}/path_alias/8")},
            "type": {"href": format!("{DOMAIN}/rest/type/path_alias/path_alias")}
        },
        "id": [{"value": 8}],
        "revision_id": [{"value": 80}],
        "uuid": [{"value": uuid}],
        "path": [{"value": path}],
        "alias": [{"value": alias}],
        "langcode": [{"value": "en"}]
    })
}

pub fn paragraph(uuid: &str, body: &str) -> Value {
    json!({
        "_links": {
            "self": {"href": format!("{DOMAIN}/paragraph/5")},
            "type": {"href": format!("{DOMAIN}/rest/type/paragraph/text")}
        },
        "id": [{"value": 5}],
        "revision_id": [{"value": 50}],
        "uuid": [{"value": uuid}],
        "body": [{"value": body, "format": "basic_html"}]
    })
}

pub fn file(uuid: &str, uri: &str) -> Value {
    json!({
        "_links": {"type": {"href": format!("{DOMAIN}/rest/type/file/file")}},
        "fid": [{"value": 3}],
        "uuid": [{"value": uuid}],
        "uri": [{"value": uri}],
        "changed": [{"value": 1_700_000_000}]
    })
}
