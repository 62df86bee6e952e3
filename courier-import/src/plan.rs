//! Import sets and the ordered execution plan.
//!
//! Scanned descriptors are partitioned once, before anything is imported:
//!
//! | entity type   | direct | correctable | path aliases |
//! |---------------|--------|-------------|--------------|
//! | `path_alias`  |        |             | ✓            |
//! | `file`        | ✓      |             |              |
//! | anything else | ✓      | ✓           |              |
//!
//! The plan runs direct entries, then correctable entries again as the
//! correction pass, then path aliases. Aliases come last because their
//! targets may only get local ids during the first two passes.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use courier_core::entity_type::{FILE, PATH_ALIAS};
use courier_core::{SnapshotDescriptor, UniqueId};

/// Which part of the plan an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pass {
    /// First pass over id-bearing entities.
    Direct,
    /// Second pass re-resolving references against first-pass ids.
    Correction,
    /// Path aliases, after every id-bearing entity.
    Alias,
}

impl Pass {
    pub fn is_correction(self) -> bool {
        self == Pass::Correction
    }
}

impl std::fmt::Display for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Pass::Direct => write!(f, "direct"),
            Pass::Correction => write!(f, "correction"),
            Pass::Alias => write!(f, "alias"),
        }
    }
}

/// One step of the execution plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub descriptor: SnapshotDescriptor,
    pub pass: Pass,
    /// A correction-pass entry for the same uuid follows later in the plan.
    pub corrected_later: bool,
}

/// The three disjoint import partitions.
#[derive(Debug, Clone, Default)]
pub struct ImportSet {
    direct: Vec<SnapshotDescriptor>,
    correctable: Vec<UniqueId>,
    path_aliases: Vec<SnapshotDescriptor>,
    claimed: HashSet<UniqueId>,
}

impl ImportSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Partition `descriptors`; the first descriptor for a uuid wins.
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = SnapshotDescriptor>) -> Self {
        let mut set = Self::new();
        for descriptor in descriptors {
            set.add(descriptor);
        }
        set
    }

    /// Adds a descriptor unless its uuid is already claimed.
    ///
    /// Returns whether the descriptor was added.
    pub fn add(&mut self, descriptor: SnapshotDescriptor) -> bool {
        if !self.claimed.insert(descriptor.uuid.clone()) {
            tracing::debug!(
                uuid = %descriptor.uuid,
                source = %descriptor.source.display(),
                "duplicate uuid ignored"
            );
            return false;
        }
        match descriptor.entity_type.as_str() {
            PATH_ALIAS => self.path_aliases.push(descriptor),
            FILE => self.direct.push(descriptor),
            _ => {
                self.correctable.push(descriptor.uuid.clone());
                self.direct.push(descriptor);
            }
        }
        true
    }

    pub fn direct(&self) -> &[SnapshotDescriptor] {
        &self.direct
    }

    /// Direct descriptors that also get a correction pass.
    pub fn correctable(&self) -> impl Iterator<Item = &SnapshotDescriptor> {
        let correctable: HashSet<&UniqueId> = self.correctable.iter().collect();
        self.direct
            .iter()
            .filter(move |d| correctable.contains(&d.uuid))
    }

    pub fn path_aliases(&self) -> &[SnapshotDescriptor] {
        &self.path_aliases
    }

    /// Number of plan entries: direct + correctable + path aliases.
    pub fn len(&self) -> usize {
        self.direct.len() + self.correctable.len() + self.path_aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Descriptors that end up imported: direct entries plus path aliases.
    pub fn result(&self) -> Vec<&SnapshotDescriptor> {
        self.direct.iter().chain(self.path_aliases.iter()).collect()
    }

    /// The ordered execution plan.
    pub fn plan(&self) -> Vec<PlanEntry> {
        let correctable: HashSet<&UniqueId> = self.correctable.iter().collect();
        let mut plan = Vec::with_capacity(self.len());
        for descriptor in &self.direct {
            plan.push(PlanEntry {
                descriptor: descriptor.clone(),
                pass: Pass::Direct,
                corrected_later: correctable.contains(&descriptor.uuid),
            });
        }
        for descriptor in self.correctable() {
            plan.push(PlanEntry {
                descriptor: descriptor.clone(),
                pass: Pass::Correction,
                corrected_later: false,
            });
        }
        for descriptor in &self.path_aliases {
            plan.push(PlanEntry {
                descriptor: descriptor.clone(),
                pass: Pass::Alias,
                corrected_later: false,
            });
        }
        plan
    }
}
