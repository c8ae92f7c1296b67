//! Mutation records: building them from intents and folding them into state.
//!
//! State is never edited directly. [`apply`] derives a new document from an
//! old one by reducing each action an intent expands into, appending one
//! hashed record per action. Callers send only the suffix the intent added:
//!
//! ```ignore
//! let mark = doc.log.len();
//! let next = apply(&doc, &intent)?;
//! store.submit_mutations(drive_id, &next.id, next.log.since(mark)).await?;
//! ```

pub mod action;
pub mod hash;
pub mod log;
pub mod reducer;

pub use action::{
    Action, AddEditorInput, AddFileInput, AddFolderInput, InitGranteeInput, Intent,
};
pub use hash::content_hash;
pub use log::{MutationRecord, OperationLog};
pub use reducer::{DocumentState, ReduceError};

use chrono::{SecondsFormat, Utc};

use crate::error::{Error, Result};

/// A document as the importer sees it: cached state plus the local log.
#[derive(Debug, Clone, PartialEq)]
pub struct Document<S> {
    pub id: String,
    pub document_type: String,
    pub state: S,
    pub log: OperationLog,
}

impl<S: DocumentState> Document<S> {
    /// A fresh document with empty state and log.
    #[must_use]
    pub fn new(id: impl Into<String>, document_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            document_type: document_type.into(),
            state: S::default(),
            log: OperationLog::new(),
        }
    }

    /// A document continuing from a store snapshot at `revision`.
    #[must_use]
    pub fn from_snapshot(
        id: impl Into<String>,
        document_type: impl Into<String>,
        state: S,
        revision: u64,
    ) -> Self {
        Self {
            id: id.into(),
            document_type: document_type.into(),
            state,
            log: OperationLog::starting_at(revision),
        }
    }

    /// Number of operations the document has seen, local ones included.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.log.len()
    }
}

/// Derive a new document by applying `intent` to `doc`.
///
/// `doc` is left untouched. The returned document's log holds every record
/// of `doc` plus one new record per action of the intent.
///
/// # Errors
///
/// Returns `OrderingViolation` if an action references a missing parent
/// folder, `InvalidAction` for any other reducer failure, or a JSON error if
/// the state cannot be hashed.
pub fn apply<S: DocumentState>(doc: &Document<S>, intent: &Intent) -> Result<Document<S>> {
    let mut next = doc.clone();
    for action in intent.actions() {
        next.state
            .reduce(&action)
            .map_err(|e| e.into_error(&doc.id))?;
        let record = MutationRecord {
            index: next.log.next_index(),
            hash: content_hash(&next.state)?,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            action,
        };
        next.log.push(record);
    }
    Ok(next)
}

/// Fold submitted records into `state`, verifying each record's hash.
///
/// Used by stores to apply a batch. Returns the new state; `state` is not
/// modified, so a failed batch leaves nothing half-applied.
///
/// # Errors
///
/// Returns the reducer error for an invalid action, or `InvalidAction` if a
/// record's hash does not match the state it produces.
pub fn fold<S: DocumentState>(target: &str, state: &S, records: &[MutationRecord]) -> Result<S> {
    let mut next = state.clone();
    for record in records {
        next.reduce(&record.action)
            .map_err(|e| e.into_error(target))?;
        let hash = content_hash(&next)?;
        if hash != record.hash {
            return Err(Error::InvalidAction {
                target: target.to_string(),
                reason: format!("hash mismatch at index {}", record.index),
            });
        }
    }
    Ok(next)
}
