use crate::asset::AssetId;
use crate::graph::WeightedGraph;
use serde::Serialize;
use std::collections::BTreeSet;

/// What one walk (or a merge of many) found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WalkResult {
    pub graph: WeightedGraph,
    /// Dependencies with no referencer inside the module scope.
    pub unreachable: BTreeSet<AssetId>,
    /// Dependencies skipped because their own lookup failed.
    pub lookup_failures: BTreeSet<AssetId>,
}

impl WalkResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, other: &WalkResult) {
        self.graph.merge(&other.graph);
        self.unreachable.extend(other.unreachable.iter().cloned());
        self.lookup_failures
            .extend(other.lookup_failures.iter().cloned());
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty() && self.unreachable.is_empty() && self.lookup_failures.is_empty()
    }
}

/// Aggregate of walking every asset under a path.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanResult {
    pub graph: WeightedGraph,
    pub unreachable: BTreeSet<AssetId>,
    pub lookup_failures: BTreeSet<AssetId>,
    /// Top-level assets fully walked.
    pub scanned: usize,
    /// Top-level assets queued.
    pub total: usize,
    pub cancelled: bool,
}

impl ScanResult {
    pub fn absorb(&mut self, walk: &WalkResult) {
        self.graph.merge(&walk.graph);
        self.unreachable.extend(walk.unreachable.iter().cloned());
        self.lookup_failures
            .extend(walk.lookup_failures.iter().cloned());
        self.scanned += 1;
    }

    /// Top-level assets that were never walked because of cancellation.
    pub fn skipped(&self) -> usize {
        self.total.saturating_sub(self.scanned)
    }
}
