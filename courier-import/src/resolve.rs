//! Rewriting of snapshot references to local ids.

use serde_json::Value;

use courier_core::entity_type::PATH_ALIAS;
use courier_core::{
    EntityId, EntityRepository, EntityTypeId, EntityTypeRegistry, LinkTypes, SnapshotPayload,
    UniqueId,
};

use crate::error::ImportError;

/// Field of a path alias holding the system path it points at.
pub const ALIAS_PATH_FIELD: &str = "path";

/// Points embedded references and alias paths of a payload at local entities.
///
/// Targets that do not exist yet are left alone: the correction pass or a
/// later run picks them up once they do.
pub struct ReferenceResolver<'a> {
    repository: &'a dyn EntityRepository,
    link_types: &'a dyn LinkTypes,
    registry: &'a EntityTypeRegistry,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(
        repository: &'a dyn EntityRepository,
        link_types: &'a dyn LinkTypes,
        registry: &'a EntityTypeRegistry,
    ) -> Self {
        Self {
            repository,
            link_types,
            registry,
        }
    }

    /// Applies every rewrite the payload's entity type needs.
    pub fn resolve(
        &self,
        entity_type: &EntityTypeId,
        payload: &mut SnapshotPayload,
    ) -> Result<(), ImportError> {
        self.update_revision_pointers(payload)?;
        if entity_type.as_str() == PATH_ALIAS {
            self.resolve_alias_path(payload)?;
        }
        Ok(())
    }

    /// Entity type of a reference's type link.
    ///
    /// Falls back to the second-to-last path segment when the lookup has no
    /// answer, invalidating the lookup's cache since it is likely stale.
    pub fn target_type(&self, url: &str) -> Option<EntityTypeId> {
        if let Some(entity_type) = self.link_types.resolve_type_from_url(url) {
            return Some(entity_type);
        }
        let path = url_path(url);
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let fallback = segments.len().checked_sub(2).map(|i| segments[i])?;
        self.link_types.invalidate();
        tracing::debug!(url, entity_type = fallback, "type link resolved from url path");
        Some(EntityTypeId::from(fallback))
    }

    /// Overwrites each present revision pointer with the current revision of
    /// the local target. Returns how many pointers were rewritten.
    pub fn update_revision_pointers(
        &self,
        payload: &mut SnapshotPayload,
    ) -> Result<usize, ImportError> {
        let mut updated = 0;
        for reference in payload.embedded_references() {
            if reference.target_revision_id.is_none() {
                continue;
            }
            let Some(target_type) = self.target_type(&reference.target_url) else {
                continue;
            };
            let Some(target) = self
                .repository
                .load_by_uuid(&target_type, &reference.target_uuid)?
            else {
                continue;
            };
            let Some(revision) = target.revision_id else {
                continue;
            };
            if reference.target_revision_id != Some(revision)
                && payload.set_target_revision(&reference.link_key, reference.position, revision)
            {
                updated += 1;
            }
        }
        Ok(updated)
    }

    /// Rewrites an alias path of the form `/<entity_type>/<uuid>[/…]` to the
    /// target's local id. Returns whether the path was rewritten.
    pub fn resolve_alias_path(&self, payload: &mut SnapshotPayload) -> Result<bool, ImportError> {
        let Some(path) = payload.field_value(ALIAS_PATH_FIELD).and_then(Value::as_str) else {
            return Ok(false);
        };
        let mut parts = path.trim_start_matches('/').splitn(3, '/');
        let (Some(entity_type), Some(key)) = (parts.next(), parts.next()) else {
            return Ok(false);
        };
        let rest = parts.next();
        let entity_type = EntityTypeId::from(entity_type);
        if !self.registry.contains(&entity_type) || key.parse::<u64>().is_ok() {
            return Ok(false);
        }
        let Some(target) = self
            .repository
            .load_by_uuid(&entity_type, &UniqueId::from(key))?
        else {
            return Ok(false);
        };
        let resolved = match rest {
            Some(rest) => format!("/{entity_type}/{}/{rest}", target.id),
            None => format!("/{entity_type}/{}", target.id),
        };
        payload.set_field_value(ALIAS_PATH_FIELD, Value::String(resolved));
        Ok(true)
    }

    /// The payload as it would look once applied over the live entity
    /// `local_id`, for comparison with that entity.
    pub fn probe(
        &self,
        entity_type: &EntityTypeId,
        payload: &SnapshotPayload,
        local_id: EntityId,
    ) -> Result<SnapshotPayload, ImportError> {
        let mut probe = payload.clone();
        probe.set_id(local_id);
        self.resolve(entity_type, &mut probe)?;
        Ok(probe)
    }
}

/// `scheme://host[:port]` of the payload's self link, or of its type link
/// when there is no self link.
pub fn link_domain(payload: &SnapshotPayload) -> Option<String> {
    let url = payload.self_link().or_else(|| payload.type_link())?;
    let (scheme, rest) = url.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next()?;
    let host_port = authority.rsplit('@').next()?;
    if host_port.is_empty() {
        return None;
    }
    Some(format!("{scheme}://{host_port}"))
}

fn url_path(url: &str) -> &str {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = without_scheme
        .find('/')
        .map_or("", |start| &without_scheme[start..]);
    path.split(['?', '#']).next().unwrap_or(path)
}
