//! # courier-import
//!
//! Reconciles a folder of exported content snapshots with live storage.
//!
//! Build a [`ReconciliationEngine`] over the source folder and its
//! [`Collaborators`], then call [`ReconciliationEngine::import`] for a full
//! run, or drive the plan yourself through a [`BatchRunner`] when the run
//! must be suspendable.

pub mod batch;
pub mod classify;
pub mod compare;
pub mod context;
pub mod diff;
pub mod engine;
pub mod error;
pub mod plan;
pub mod resolve;
pub mod scan;

pub use batch::{BatchOutcome, BatchRunner, FileOperation, FileReport, Outcome};
pub use classify::{ChangeClassifier, ChangedTimes, Decision};
pub use context::{watermark_key, ImportOptions, RunContext};
pub use diff::SnapshotDiff;
pub use engine::{Collaborators, ReconciliationEngine, RunSummary};
pub use error::ImportError;
pub use plan::{ImportSet, Pass, PlanEntry};
pub use resolve::ReferenceResolver;
pub use scan::scan;
