//! SQLite storage layer for the local drive store.
//!
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - `SqliteDriveStore`, a [`crate::remote::DriveStore`] over SQLite

pub mod schema;
pub mod sqlite;

pub use sqlite::SqliteDriveStore;
