//! File-by-file batch execution.
//!
//! A [`BatchRunner`] walks an ordered plan one entry at a time, handing each
//! entry to a [`FileOperation`] together with the run's single
//! [`RunContext`]. The runner can stop between any two entries and be
//! serialized with [`BatchRunner::suspend`]; [`BatchRunner::resume`] picks
//! the run up again at the next entry.

use serde::{Deserialize, Serialize};

use courier_core::{EntityId, EntityTypeId, UniqueId};

use crate::classify::Decision;
use crate::context::RunContext;
use crate::error::ImportError;
use crate::plan::{Pass, PlanEntry};

/// What happened to one plan entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created(EntityId),
    Updated(EntityId),
    Skipped(Decision),
    /// Correction pass bypassed because pass 1 marked the entity.
    CorrectionSkipped,
    /// Dry run: the decision that would have been applied.
    Previewed(Decision),
    Failed(String),
}

/// Result of one entry, with its progress message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub entity_type: EntityTypeId,
    pub uuid: UniqueId,
    pub pass: Pass,
    pub outcome: Outcome,
    /// `"<current> of <total> (<elapsed>), …"`; `None` for quiet outcomes.
    pub message: Option<String>,
}

/// One unit of work per plan entry.
pub trait FileOperation {
    /// Processes `entry`, the `current`-th of `total` (1-based). Must not fail:
    /// per-file errors are reported as [`Outcome::Failed`].
    fn process(
        &mut self,
        entry: &PlanEntry,
        current: usize,
        total: usize,
        correction: bool,
        context: &mut RunContext,
    ) -> FileReport;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BatchState {
    entries: Vec<PlanEntry>,
    cursor: usize,
    context: RunContext,
}

/// Drives a plan through a [`FileOperation`].
#[derive(Debug)]
pub struct BatchRunner {
    state: BatchState,
    message: Option<String>,
    reports: Vec<FileReport>,
}

/// Final state handed to the finish callback.
#[derive(Debug)]
pub struct BatchOutcome {
    /// Every entry was processed.
    pub success: bool,
    pub processed: usize,
    pub total: usize,
    pub context: RunContext,
    /// Reports of the entries processed since the last resume.
    pub reports: Vec<FileReport>,
}

impl BatchRunner {
    pub fn new(entries: Vec<PlanEntry>, context: RunContext) -> Self {
        Self {
            state: BatchState {
                entries,
                cursor: 0,
                context,
            },
            message: None,
            reports: Vec::new(),
        }
    }

    pub fn total(&self) -> usize {
        self.state.entries.len()
    }

    /// Entries processed so far.
    pub fn processed(&self) -> usize {
        self.state.cursor
    }

    pub fn is_done(&self) -> bool {
        self.state.cursor >= self.state.entries.len()
    }

    pub fn context(&self) -> &RunContext {
        &self.state.context
    }

    /// Progress message of the last processed entry, consumed on read.
    pub fn take_message(&mut self) -> Option<String> {
        self.message.take()
    }

    pub fn reports(&self) -> &[FileReport] {
        &self.reports
    }

    /// Processes the next entry. Returns `None` once the plan is exhausted.
    pub fn step(&mut self, operation: &mut dyn FileOperation) -> Option<&FileReport> {
        let total = self.total();
        let entry = self.state.entries.get(self.state.cursor)?;
        let report = operation.process(
            entry,
            self.state.cursor + 1,
            total,
            entry.pass.is_correction(),
            &mut self.state.context,
        );
        self.state.cursor += 1;
        self.message = report.message.clone();
        self.reports.push(report);
        self.reports.last()
    }

    /// Processes every remaining entry.
    pub fn run(&mut self, operation: &mut dyn FileOperation) {
        while self.step(operation).is_some() {}
    }

    /// Serializes the plan, cursor and context.
    pub fn suspend(&self) -> Result<String, ImportError> {
        Ok(serde_json::to_string(&self.state)?)
    }

    /// Rehydrates a runner from a [`BatchRunner::suspend`] blob.
    pub fn resume(blob: &str) -> Result<Self, ImportError> {
        let state: BatchState = serde_json::from_str(blob)
            .map_err(|e| ImportError::Resume(e.to_string()))?;
        if state.cursor > state.entries.len() {
            return Err(ImportError::Resume(format!(
                "cursor {} is past the end of a {}-entry plan",
                state.cursor,
                state.entries.len()
            )));
        }
        Ok(Self {
            state,
            message: None,
            reports: Vec::new(),
        })
    }

    /// Ends the batch, handing its final state to `callback`. Entries left
    /// unprocessed count as abandoned and make the batch unsuccessful.
    pub fn finish<R>(self, callback: impl FnOnce(BatchOutcome) -> R) -> R {
        callback(BatchOutcome {
            success: self.is_done(),
            processed: self.state.cursor,
            total: self.state.entries.len(),
            context: self.state.context,
            reports: self.reports,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use courier_core::SnapshotDescriptor;

    use crate::context::{FileEffect, ImportOptions};

    struct Recorder {
        seen: Vec<(usize, usize, bool)>,
    }

    impl FileOperation for Recorder {
        fn process(
            &mut self,
            entry: &PlanEntry,
            current: usize,
            total: usize,
            correction: bool,
            context: &mut RunContext,
        ) -> FileReport {
            self.seen.push((current, total, correction));
            context.apply(
                &entry.descriptor.uuid,
                FileEffect {
                    skip_correction: false,
                    export_timestamp: Some(current as i64 * 10),
                },
            );
            FileReport {
                entity_type: entry.descriptor.entity_type.clone(),
                uuid: entry.descriptor.uuid.clone(),
                pass: entry.pass,
                outcome: Outcome::Created(EntityId(current as u64)),
                message: Some(format!("{current} of {total}")),
            }
        }
    }

    fn entry(uuid: &str, pass: Pass) -> PlanEntry {
        PlanEntry {
            descriptor: SnapshotDescriptor {
                entity_type: "node".into(),
                uuid: uuid.into(),
                source: PathBuf::from(format!("/c/node/{uuid}.json")),
                force_override: false,
            },
            pass,
            corrected_later: pass == Pass::Direct,
        }
    }

    fn runner() -> BatchRunner {
        BatchRunner::new(
            vec![
                entry("a", Pass::Direct),
                entry("b", Pass::Direct),
                entry("a", Pass::Correction),
            ],
            RunContext::new(&ImportOptions::default(), "k".to_string()),
        )
    }

    #[test]
    fn steps_pass_position_and_correction_flag() {
        let mut batch = runner();
        let mut op = Recorder { seen: Vec::new() };
        batch.run(&mut op);
        assert_eq!(op.seen, vec![(1, 3, false), (2, 3, false), (3, 3, true)]);
        assert!(batch.is_done());
        assert_eq!(batch.take_message().as_deref(), Some("3 of 3"));
        assert_eq!(batch.take_message(), None);
        assert!(batch.step(&mut op).is_none());
    }

    #[test]
    fn suspend_and_resume_continue_at_the_cursor() {
        let mut batch = runner();
        let mut op = Recorder { seen: Vec::new() };
        batch.step(&mut op);
        let blob = batch.suspend().unwrap();

        let mut resumed = BatchRunner::resume(&blob).unwrap();
        assert_eq!(resumed.processed(), 1);
        assert_eq!(resumed.context().max_export_timestamp, 10);
        resumed.run(&mut op);
        assert_eq!(op.seen.len(), 3);
        assert_eq!(op.seen[1], (2, 3, false));

        let outcome = resumed.finish(|o| o);
        assert!(outcome.success);
        assert_eq!(outcome.reports.len(), 2);
        assert_eq!(outcome.context.max_export_timestamp, 30);
    }

    #[test]
    fn abandoned_batch_is_not_successful() {
        let mut batch = runner();
        let mut op = Recorder { seen: Vec::new() };
        batch.step(&mut op);
        let success = batch.finish(|o| o.success);
        assert!(!success);
    }

    #[test]
    fn resume_rejects_garbage() {
        assert!(matches!(
            BatchRunner::resume("{\"nope\": 1}"),
            Err(ImportError::Resume(_))
        ));
    }
}
