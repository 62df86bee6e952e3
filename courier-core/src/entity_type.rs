//! Entity-type capability table.
//!
//! Each entity type the importer handles is described once by an
//! [`EntityTypeDef`]: its key names and what the live entity supports. The
//! importer resolves a def per file instead of asking storage at runtime.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::EntityTypeId;

/// Entity type whose snapshots are applied after every other entity.
pub const PATH_ALIAS: &str = "path_alias";
/// Entity type with no outbound references to correct.
pub const FILE: &str = "file";

/// Capabilities and key names of one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTypeDef {
    pub id: EntityTypeId,
    /// Field holding the local id (`nid`, `tid`, …).
    #[serde(default = "default_id_key")]
    pub id_key: String,
    /// Field holding the revision id, for revisionable types.
    #[serde(default)]
    pub revision_key: Option<String>,
    #[serde(default = "default_uuid_key")]
    pub uuid_key: String,
    /// Live entities record a per-translation `changed` time.
    #[serde(default)]
    pub tracks_changed: bool,
    /// Snapshots may carry a computed `path` field that must not be imported.
    #[serde(default)]
    pub computed_path: bool,
    /// Field holding a pre-hashed credential written around the save path.
    #[serde(default)]
    pub credential_field: Option<String>,
}

fn default_id_key() -> String {
    "id".to_string()
}

fn default_uuid_key() -> String {
    "uuid".to_string()
}

impl EntityTypeDef {
    fn builtin(
        id: &str,
        id_key: &str,
        revision_key: Option<&str>,
        tracks_changed: bool,
        computed_path: bool,
    ) -> Self {
        Self {
            id: EntityTypeId::from(id),
            id_key: id_key.to_string(),
            revision_key: revision_key.map(str::to_string),
            uuid_key: default_uuid_key(),
            tracks_changed,
            computed_path,
            credential_field: None,
        }
    }

    pub fn is_revisionable(&self) -> bool {
        self.revision_key.is_some()
    }
}

/// Lookup table from entity type id to its [`EntityTypeDef`].
#[derive(Debug, Clone)]
pub struct EntityTypeRegistry {
    defs: HashMap<EntityTypeId, EntityTypeDef>,
}

impl Default for EntityTypeRegistry {
    fn default() -> Self {
        let mut user = EntityTypeDef::builtin("user", "uid", None, true, false);
        user.credential_field = Some("pass".to_string());

        let defs = [
            EntityTypeDef::builtin("node", "nid", Some("vid"), true, true),
            EntityTypeDef::builtin("taxonomy_term", "tid", Some("revision_id"), true, true),
            EntityTypeDef::builtin("media", "mid", Some("vid"), true, true),
            EntityTypeDef::builtin("commerce_product", "product_id", None, true, true),
            EntityTypeDef::builtin("block_content", "id", Some("revision_id"), true, false),
            EntityTypeDef::builtin("menu_link_content", "id", Some("revision_id"), true, false),
            EntityTypeDef::builtin("comment", "cid", None, true, false),
            user,
            EntityTypeDef::builtin(FILE, "fid", None, true, false),
            EntityTypeDef::builtin("paragraph", "id", Some("revision_id"), false, false),
            EntityTypeDef::builtin(PATH_ALIAS, "id", Some("revision_id"), false, false),
        ];
        Self::empty().with_overrides(defs)
    }
}

impl EntityTypeRegistry {
    /// A registry with no entity types at all.
    pub fn empty() -> Self {
        Self {
            defs: HashMap::new(),
        }
    }

    /// Adds `defs`, replacing any existing def with the same id.
    pub fn with_overrides(mut self, defs: impl IntoIterator<Item = EntityTypeDef>) -> Self {
        for def in defs {
            self.defs.insert(def.id.clone(), def);
        }
        self
    }

    pub fn get(&self, id: &EntityTypeId) -> Option<&EntityTypeDef> {
        self.defs.get(id)
    }

    pub fn contains(&self, id: &EntityTypeId) -> bool {
        self.defs.contains_key(id)
    }

    /// Registered entity type ids, sorted.
    pub fn ids(&self) -> Vec<&EntityTypeId> {
        let mut ids: Vec<_> = self.defs.keys().collect();
        ids.sort();
        ids
    }
}
