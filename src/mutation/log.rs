//! Append-only operation log.
//!
//! A log may start part-way through a target's history: when the importer
//! works from a cached snapshot at revision N, the first record it appends
//! gets index N. Indices are absolute, so `since(mark)` means the same thing
//! to the importer and to the store.

use serde::{Deserialize, Serialize};

use super::action::Action;

/// One immutable entry in a target's log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationRecord {
    /// Absolute position in the target's log
    pub index: u64,
    pub action: Action,
    /// RFC 3339 creation time
    pub timestamp: String,
    /// SHA-256 of the target state after this record
    pub hash: String,
}

/// Ordered records for one target.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationLog {
    base: u64,
    entries: Vec<MutationRecord>,
}

impl OperationLog {
    /// An empty log for a new target.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty local log continuing a target already at `revision`.
    #[must_use]
    pub fn starting_at(revision: u64) -> Self {
        Self {
            base: revision,
            entries: Vec::new(),
        }
    }

    /// Absolute length: records before `base` plus local entries.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.base + self.entries.len() as u64
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index the next appended record must carry.
    #[must_use]
    pub fn next_index(&self) -> u64 {
        self.len()
    }

    /// Records with an absolute index of at least `mark`.
    ///
    /// Marks below the local base return every local entry; marks past the
    /// end return an empty slice.
    #[must_use]
    pub fn since(&self, mark: u64) -> &[MutationRecord] {
        let start = usize::try_from(mark.saturating_sub(self.base))
            .unwrap_or(usize::MAX)
            .min(self.entries.len());
        &self.entries[start..]
    }

    /// Local entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> &[MutationRecord] {
        &self.entries
    }

    /// Append a record. The record's index must equal `next_index()`.
    pub(crate) fn push(&mut self, record: MutationRecord) {
        debug_assert_eq!(record.index, self.next_index());
        self.entries.push(record);
    }
}
