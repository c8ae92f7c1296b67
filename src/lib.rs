//! grantdrive - sync-gated, idempotent bulk import of grant records into a
//! remote document drive.
//!
//! # Architecture
//!
//! - [`normalize`] - raw dataset records to validated grants
//! - [`bucket`] - alphabetic folder assignment
//! - [`mutation`] - actions, mutation records, reducers, and the operation log
//! - [`remote`] - the `DriveStore` interface and its HTTP binding
//! - [`storage`] - SQLite-backed local drive store
//! - [`import`] - node creation, submission, and the per-grant pipeline
//! - [`gate`] - the sync-gated run controller
//! - [`config`] - layered configuration
//! - [`cli`] - command-line interface using clap
//! - [`error`] - error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bucket;
pub mod cli;
pub mod config;
pub mod error;
pub mod gate;
pub mod import;
pub mod model;
pub mod mutation;
pub mod normalize;
pub mod remote;
pub mod storage;

pub use error::{Error, Result};
