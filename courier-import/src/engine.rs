//! Import orchestration.
//!
//! [`ReconciliationEngine`] owns the run from scan to watermark:
//!
//! 1. **Prepare**: drop cached link metadata, scan the source folder and
//!    partition the descriptors into an [`ImportSet`].
//! 2. **Plan**: direct pass, correction pass, then path aliases.
//! 3. **Execute**: one [`FileOperation::process`] call per plan entry,
//!    driven by a [`BatchRunner`]. A failing file is reported and skipped.
//! 4. **Finish**: raise the source's watermark if the run completed.

use std::path::PathBuf;

use chrono::DateTime;
use serde_json::Value;

use courier_core::{
    Codec, EntityRepository, EntityTypeDef, EntityTypeRegistry, LinkTypes, PreSaveHook,
    SnapshotDescriptor, SnapshotPayload, UniqueId, WatermarkStore,
};

use crate::batch::{BatchOutcome, BatchRunner, FileOperation, FileReport, Outcome};
use crate::classify::{ChangeClassifier, Decision};
use crate::context::{watermark_key, FileEffect, ImportOptions, RunContext};
use crate::diff::{diff_snapshot, SnapshotDiff};
use crate::error::{io_err, ImportError};
use crate::plan::{ImportSet, Pass, PlanEntry};
use crate::resolve::ReferenceResolver;
use crate::scan::scan;

/// Field that entity types with a computed path carry in their exports.
const COMPUTED_PATH_FIELD: &str = "path";

/// Everything the engine talks to, supplied by the caller.
pub struct Collaborators<'a> {
    pub registry: &'a EntityTypeRegistry,
    pub repository: &'a mut dyn EntityRepository,
    pub codec: &'a dyn Codec,
    pub link_types: &'a dyn LinkTypes,
    pub watermarks: &'a mut dyn WatermarkStore,
    pub hooks: Vec<&'a dyn PreSaveHook>,
}

/// Counts and final state of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub correction_skipped: usize,
    pub previewed: usize,
    pub failed: usize,
    /// Plan entries of the run, including any processed before a resume.
    pub total: usize,
    /// Every plan entry was processed.
    pub success: bool,
    /// Watermark written at the end of the run, if it was raised.
    pub watermark: Option<i64>,
    pub reports: Vec<FileReport>,
}

impl RunSummary {
    fn tally(&mut self, report: &FileReport) {
        match report.outcome {
            Outcome::Created(_) => self.created += 1,
            Outcome::Updated(_) => self.updated += 1,
            Outcome::Skipped(_) => self.skipped += 1,
            Outcome::CorrectionSkipped => self.correction_skipped += 1,
            Outcome::Previewed(_) => self.previewed += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
    }

    /// One-line run summary.
    pub fn message(&self) -> String {
        if self.total == 0 && self.success {
            return "Nothing to import.".to_string();
        }
        if !self.success {
            return "Finished with an error.".to_string();
        }
        let mut line = format!(
            "Content imported: {} created, {} updated, {} skipped",
            self.created, self.updated, self.skipped
        );
        if self.previewed > 0 {
            line.push_str(&format!(", {} previewed", self.previewed));
        }
        if self.failed > 0 {
            line.push_str(&format!(", {} failed", self.failed));
        }
        line.push('.');
        line
    }
}

pub struct ReconciliationEngine<'a> {
    folder: PathBuf,
    options: ImportOptions,
    registry: &'a EntityTypeRegistry,
    repository: &'a mut dyn EntityRepository,
    codec: &'a dyn Codec,
    link_types: &'a dyn LinkTypes,
    watermarks: &'a mut dyn WatermarkStore,
    hooks: Vec<&'a dyn PreSaveHook>,
    import_set: ImportSet,
}

impl<'a> ReconciliationEngine<'a> {
    pub fn new(folder: impl Into<PathBuf>, options: ImportOptions, with: Collaborators<'a>) -> Self {
        Self {
            folder: folder.into(),
            options,
            registry: with.registry,
            repository: with.repository,
            codec: with.codec,
            link_types: with.link_types,
            watermarks: with.watermarks,
            hooks: with.hooks,
            import_set: ImportSet::new(),
        }
    }

    /// Scans the source folder and partitions what it finds.
    pub fn prepare(&mut self) -> Result<&ImportSet, ImportError> {
        if self.folder.as_os_str().is_empty() {
            return Err(ImportError::Configuration(
                "no content folder given".to_string(),
            ));
        }
        self.link_types.invalidate();
        let set = ImportSet::from_descriptors(scan(&self.folder, self.options.force_override)?);
        tracing::info!(
            folder = %self.folder.display(),
            entities = set.direct().len(),
            path_aliases = set.path_aliases().len(),
            "prepared import"
        );
        self.import_set = set;
        Ok(&self.import_set)
    }

    /// Descriptors of the prepared import, entities first.
    pub fn result(&self) -> Vec<&SnapshotDescriptor> {
        self.import_set.result()
    }

    pub fn plan(&self) -> Vec<PlanEntry> {
        self.import_set.plan()
    }

    /// A fresh context for a run over this engine's source folder.
    pub fn begin(&self) -> RunContext {
        RunContext::new(&self.options, watermark_key(&self.folder))
    }

    /// Prepares, runs every plan entry and finishes.
    pub fn import(&mut self) -> Result<RunSummary, ImportError> {
        self.prepare()?;
        let plan = self.plan();
        if plan.is_empty() {
            tracing::info!(folder = %self.folder.display(), "nothing to import");
            return Ok(RunSummary {
                success: true,
                ..RunSummary::default()
            });
        }
        let mut batch = BatchRunner::new(plan, self.begin());
        batch.run(self);
        batch.finish(|outcome| self.finish(outcome))
    }

    /// Raises the watermark after a completed run and builds the summary.
    ///
    /// The stored value is re-read right before writing so it never moves
    /// backwards.
    pub fn finish(&mut self, outcome: BatchOutcome) -> Result<RunSummary, ImportError> {
        let mut summary = RunSummary {
            success: outcome.success,
            total: outcome.total,
            ..RunSummary::default()
        };
        for report in &outcome.reports {
            summary.tally(report);
        }
        summary.reports = outcome.reports;

        let context = outcome.context;
        if summary.success && !context.dry_run {
            let stored = self.watermarks.get(&context.watermark_key)?;
            if context.max_export_timestamp > stored {
                self.watermarks
                    .set(&context.watermark_key, context.max_export_timestamp)?;
                summary.watermark = Some(context.max_export_timestamp);
            }
        }

        if summary.success {
            tracing::info!(
                created = summary.created,
                updated = summary.updated,
                skipped = summary.skipped,
                failed = summary.failed,
                "import finished"
            );
        } else {
            tracing::warn!(
                processed = outcome.processed,
                total = outcome.total,
                "import finished with an error"
            );
        }
        Ok(summary)
    }

    /// Unified diff between a prepared snapshot and its live entity.
    pub fn diff(&self, uuid: &UniqueId) -> Result<Option<SnapshotDiff>, ImportError> {
        let Some(descriptor) = self.result().into_iter().find(|d| &d.uuid == uuid) else {
            return Ok(None);
        };
        let def = self.def(descriptor)?;
        let payload = self.load_payload(descriptor, def)?;
        let resolver = ReferenceResolver::new(&*self.repository, self.link_types, self.registry);
        diff_snapshot(descriptor, def, &payload, &*self.repository, self.codec, &resolver).map(Some)
    }

    fn def(&self, descriptor: &SnapshotDescriptor) -> Result<&'a EntityTypeDef, ImportError> {
        self.registry
            .get(&descriptor.entity_type)
            .ok_or_else(|| ImportError::UnknownEntityType(descriptor.entity_type.clone()))
    }

    /// Reads and decodes a snapshot, stripping what is never imported.
    fn load_payload(
        &self,
        descriptor: &SnapshotDescriptor,
        def: &EntityTypeDef,
    ) -> Result<SnapshotPayload, ImportError> {
        let path = &descriptor.source;
        let bytes = std::fs::read(path).map_err(|e| io_err(path, e))?;
        let document = self.codec.decode(&bytes).map_err(|source| ImportError::Decode {
            path: path.clone(),
            source,
        })?;
        let mut payload = SnapshotPayload::new(document, def);
        payload.remove_revision();
        if def.computed_path {
            payload.remove_field(COMPUTED_PATH_FIELD);
        }
        Ok(payload)
    }

    fn process_file(
        &mut self,
        entry: &PlanEntry,
        context: &RunContext,
    ) -> Result<(Outcome, FileEffect), ImportError> {
        let descriptor = &entry.descriptor;
        let def = self.def(descriptor)?;
        let mut payload = self.load_payload(descriptor, def)?;
        let mut effect = FileEffect {
            skip_correction: false,
            export_timestamp: payload.export_timestamp(),
        };

        let watermark = if context.incremental {
            self.watermarks.get(&context.watermark_key)?
        } else {
            0
        };

        let decision = {
            let resolver =
                ReferenceResolver::new(&*self.repository, self.link_types, self.registry);
            let classifier = ChangeClassifier::new(&*self.repository, self.codec, &resolver);
            classifier.classify(descriptor, def, &payload, context, entry.pass, watermark)?
        };

        if context.dry_run && !decision.is_skip() {
            return Ok((Outcome::Previewed(decision), effect));
        }

        let is_new = match decision {
            Decision::Create { preserve_id } => {
                if !preserve_id {
                    payload.remove_id();
                }
                true
            }
            Decision::Update { local_id } => {
                payload.set_id(local_id);
                false
            }
            skip => {
                effect.skip_correction = entry.pass == Pass::Direct && entry.corrected_later;
                return Ok((Outcome::Skipped(skip), effect));
            }
        };

        if entry.pass == Pass::Direct
            && entry.corrected_later
            && !payload.metadata().correction_required
        {
            effect.skip_correction = true;
        }

        let mut record = {
            let resolver =
                ReferenceResolver::new(&*self.repository, self.link_types, self.registry);
            resolver.resolve(&descriptor.entity_type, &mut payload)?;
            self.codec.denormalize(&payload, def, &*self.repository)?
        };
        for hook in &self.hooks {
            hook.pre_save(&mut record, &payload);
        }
        let entity = self.repository.save(record, is_new)?;

        if let Some(field) = &def.credential_field {
            if let Some(hash) = payload
                .field_value(field)
                .and_then(Value::as_str)
                .filter(|hash| !hash.is_empty())
            {
                self.repository
                    .write_credential_hash(&entity.entity_type, entity.id, field, hash)?;
            }
        }

        let outcome = if is_new {
            Outcome::Created(entity.id)
        } else {
            Outcome::Updated(entity.id)
        };
        Ok((outcome, effect))
    }
}

impl FileOperation for ReconciliationEngine<'_> {
    fn process(
        &mut self,
        entry: &PlanEntry,
        current: usize,
        total: usize,
        correction: bool,
        context: &mut RunContext,
    ) -> FileReport {
        let descriptor = &entry.descriptor;
        let prefix = format!("{current} of {total} ({})", context.elapsed());
        let report = |outcome: Outcome, message: Option<String>| FileReport {
            entity_type: descriptor.entity_type.clone(),
            uuid: descriptor.uuid.clone(),
            pass: entry.pass,
            outcome,
            message,
        };

        if correction && context.take_skip_correction(&descriptor.uuid) {
            tracing::debug!(entity_type = %descriptor.entity_type, uuid = %descriptor.uuid, "correction skipped");
            let message = context
                .verbose
                .then(|| format!("{prefix}, skipped correction of {}", descriptor.entity_type));
            return report(Outcome::CorrectionSkipped, message);
        }

        match self.process_file(entry, context) {
            Ok((outcome, effect)) => {
                context.apply(&descriptor.uuid, effect);
                let message = describe(&prefix, descriptor, &outcome);
                log_outcome(descriptor, entry.pass, &outcome);
                let message = match outcome {
                    Outcome::Skipped(Decision::SkipIdCollision { .. }) => Some(message),
                    _ => context.verbose.then_some(message),
                };
                report(outcome, message)
            }
            Err(err) => {
                tracing::warn!(
                    entity_type = %descriptor.entity_type,
                    uuid = %descriptor.uuid,
                    error = %err,
                    "import of file failed"
                );
                let message = format!(
                    "{prefix}, error on importing {} {}: {err}",
                    descriptor.entity_type, descriptor.uuid
                );
                report(Outcome::Failed(err.to_string()), Some(message))
            }
        }
    }
}

fn format_time(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

fn describe(prefix: &str, descriptor: &SnapshotDescriptor, outcome: &Outcome) -> String {
    let entity_type = &descriptor.entity_type;
    let uuid = &descriptor.uuid;
    match outcome {
        Outcome::Created(id) => format!("{prefix}, created {entity_type} {id}"),
        Outcome::Updated(id) => format!("{prefix}, updated {entity_type} {id}"),
        Outcome::Skipped(decision) => match decision {
            Decision::SkipIncrementalAlreadyApplied => {
                format!("{prefix}, skipped {entity_type} {uuid}, file is already imported")
            }
            Decision::SkipIdCollision { id } => {
                format!("{prefix}, skipped {entity_type} {id}, ID already exists in database")
            }
            Decision::SkipUnchanged {
                local_id,
                changed: Some(times),
            } => format!(
                "{prefix}, skipped {entity_type} {local_id}, file ({}) is {} database ({})",
                format_time(times.file),
                if times.is_newer_in_db() { "older than" } else { "as new as" },
                format_time(times.db)
            ),
            Decision::SkipUnchanged { local_id, .. } => {
                format!("{prefix}, skipped {entity_type} {local_id}, no changes compared to database")
            }
            other => format!("{prefix}, skipped {entity_type} {uuid} ({})", other.label()),
        },
        Outcome::CorrectionSkipped => format!("{prefix}, skipped correction of {entity_type}"),
        Outcome::Previewed(decision) => {
            format!("{prefix}, would {} {entity_type} {uuid}", decision.label())
        }
        Outcome::Failed(reason) => {
            format!("{prefix}, error on importing {entity_type} {uuid}: {reason}")
        }
    }
}

fn log_outcome(descriptor: &SnapshotDescriptor, pass: Pass, outcome: &Outcome) {
    let entity_type = &descriptor.entity_type;
    let uuid = &descriptor.uuid;
    match outcome {
        Outcome::Created(id) => {
            tracing::info!(%entity_type, %uuid, %id, %pass, "created")
        }
        Outcome::Updated(id) => {
            tracing::info!(%entity_type, %uuid, %id, %pass, "updated")
        }
        Outcome::Skipped(decision) | Outcome::Previewed(decision) => {
            tracing::debug!(%entity_type, %uuid, %pass, decision = decision.label(), "classified")
        }
        Outcome::CorrectionSkipped | Outcome::Failed(_) => {}
    }
}
