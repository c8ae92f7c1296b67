//! Bulk import of normalized grants into a drive.
//!
//! - [`nodes`] - idempotent folder and document creation
//! - [`submit`] - retrying submission client
//! - [`pipeline`] - the sequential per-grant loop
//! - [`types`] - run counters

pub mod nodes;
pub mod pipeline;
pub mod submit;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use nodes::{document_id, NodeCreator, NodeOutcome};
pub use pipeline::Importer;
pub use submit::{RetryPolicy, SubmissionClient};
pub use types::{ImportStats, NodeStats};
