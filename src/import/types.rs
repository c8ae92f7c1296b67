//! Counters reported by an import run.

use serde::Serialize;

/// Per-node-kind counters.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct NodeStats {
    /// Nodes this run created.
    pub created: usize,
    /// Nodes already present and left alone.
    pub existing: usize,
}

impl NodeStats {
    #[must_use]
    pub fn total(&self) -> usize {
        self.created + self.existing
    }
}

/// Outcome of one import run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    /// Bucket folders.
    pub folders: NodeStats,
    /// Grant documents.
    pub documents: NodeStats,
    /// Documents that received `INIT_GRANTEE` during this run.
    pub initialized: usize,
    /// Raw records excluded by normalization or bucket assignment.
    pub rejected: usize,
    /// Records whose pipeline branch failed at the store.
    pub failed: usize,
    /// Mutation records acknowledged by the store.
    pub records_submitted: usize,
}

impl ImportStats {
    /// True if every record made it through.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.rejected == 0 && self.failed == 0
    }
}
