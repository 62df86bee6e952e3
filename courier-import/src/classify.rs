//! Per-snapshot create/update/skip decisions.

use serde_json::{Map, Value};

use courier_core::{Codec, EntityId, EntityRepository, EntityTypeDef, SnapshotDescriptor, SnapshotPayload};

use crate::compare::loose_diff;
use crate::context::RunContext;
use crate::error::ImportError;
use crate::plan::Pass;
use crate::resolve::{link_domain, ReferenceResolver};

/// What to do with one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The entity does not exist locally.
    Create {
        /// Keep the snapshot's literal id instead of letting storage assign one.
        preserve_id: bool,
    },
    /// The live entity `local_id` is replaced by the snapshot.
    Update { local_id: EntityId },
    /// The live entity is at least as recent as the snapshot. `changed` is
    /// set when this was decided on modification times.
    SkipUnchanged {
        local_id: EntityId,
        changed: Option<ChangedTimes>,
    },
    /// Exported before the source's watermark and already present locally.
    SkipIncrementalAlreadyApplied,
    /// The snapshot's literal id belongs to another local entity.
    SkipIdCollision { id: EntityId },
}

impl Decision {
    pub fn is_skip(&self) -> bool {
        !matches!(self, Decision::Create { .. } | Decision::Update { .. })
    }

    /// Short label for tables and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Decision::Create { .. } => "create",
            Decision::Update { .. } => "update",
            Decision::SkipUnchanged { .. } => "unchanged",
            Decision::SkipIncrementalAlreadyApplied => "already imported",
            Decision::SkipIdCollision { .. } => "id collision",
        }
    }
}

/// Latest `changed` times across translations of a snapshot and of the
/// live entity it was compared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangedTimes {
    pub file: i64,
    pub db: i64,
}

impl ChangedTimes {
    /// The live entity was modified after the snapshot was taken.
    pub fn is_newer_in_db(&self) -> bool {
        self.db > self.file
    }
}

/// Decides what to do with a snapshot by comparing it with live state.
pub struct ChangeClassifier<'a> {
    repository: &'a dyn EntityRepository,
    codec: &'a dyn Codec,
    resolver: &'a ReferenceResolver<'a>,
}

impl<'a> ChangeClassifier<'a> {
    pub fn new(
        repository: &'a dyn EntityRepository,
        codec: &'a dyn Codec,
        resolver: &'a ReferenceResolver<'a>,
    ) -> Self {
        Self {
            repository,
            codec,
            resolver,
        }
    }

    /// Classifies `payload`, already stripped of its revision and computed
    /// fields. `watermark` is the source's stored watermark, read only in
    /// incremental runs.
    pub fn classify(
        &self,
        descriptor: &SnapshotDescriptor,
        def: &EntityTypeDef,
        payload: &SnapshotPayload,
        context: &RunContext,
        pass: Pass,
        watermark: i64,
    ) -> Result<Decision, ImportError> {
        let entity_type = &descriptor.entity_type;
        let exists = self.repository.exists_by_uuid(entity_type, &descriptor.uuid)?;

        if exists && context.incremental {
            if let Some(exported) = payload.export_timestamp() {
                if exported > 0 && exported <= watermark {
                    return Ok(Decision::SkipIncrementalAlreadyApplied);
                }
            }
        }

        let live = if exists {
            self.repository.load_by_uuid(entity_type, &descriptor.uuid)?
        } else {
            None
        };

        let Some(live) = live else {
            if context.preserve_ids {
                if let Some(id) = payload.id() {
                    if self.repository.load_by_id(entity_type, id)?.is_some() {
                        return Ok(Decision::SkipIdCollision { id });
                    }
                    return Ok(Decision::Create { preserve_id: true });
                }
            }
            return Ok(Decision::Create { preserve_id: false });
        };

        if descriptor.force_override {
            return Ok(Decision::Update { local_id: live.id });
        }

        match payload.max_changed().filter(|_| def.tracks_changed) {
            Some(file_changed) => {
                let db_changed = live.changed_across_translations().unwrap_or(0);
                if file_changed <= db_changed && !pass.is_correction() {
                    return Ok(Decision::SkipUnchanged {
                        local_id: live.id,
                        changed: Some(ChangedTimes {
                            file: file_changed,
                            db: db_changed,
                        }),
                    });
                }
            }
            None => {
                let domain = link_domain(payload).unwrap_or_default();
                let encoded = self.codec.encode(&live, def, &domain)?;
                let current = self.codec.decode(&encoded)?;
                let probe = self.resolver.probe(entity_type, payload, live.id)?;
                if loose_diff(probe.document(), &current).is_empty() {
                    return Ok(Decision::SkipUnchanged {
                        local_id: live.id,
                        changed: None,
                    });
                }
            }
        }

        Ok(Decision::Update { local_id: live.id })
    }
}

/// The snapshot document as [`ChangeClassifier`] compares it, for previews.
pub(crate) fn comparable_document(
    resolver: &ReferenceResolver<'_>,
    descriptor: &SnapshotDescriptor,
    payload: &SnapshotPayload,
    local_id: Option<EntityId>,
) -> Result<Map<String, Value>, ImportError> {
    match local_id {
        Some(id) => Ok(resolver
            .probe(&descriptor.entity_type, payload, id)?
            .into_document()),
        None => Ok(payload.document().clone()),
    }
}
