//! Database schema for the local drive store.

use rusqlite::{Connection, Result};

/// Current schema version for migration tracking.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// The complete SQL schema.
///
/// Timestamps are INTEGER Unix milliseconds. Document and drive state is
/// stored as JSON text; `operations` is the append-only log for every target.
pub const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- Drives: one row per attached drive, state is the node tree
CREATE TABLE IF NOT EXISTS drives (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    slug TEXT,
    attach_config TEXT NOT NULL,
    state TEXT NOT NULL,
    revision INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

-- Nodes: flattened projection of each drive's node tree
CREATE TABLE IF NOT EXISTS nodes (
    id TEXT PRIMARY KEY,
    drive_id TEXT NOT NULL REFERENCES drives(id) ON DELETE CASCADE,
    kind TEXT NOT NULL CHECK (kind IN ('folder', 'document')),
    name TEXT NOT NULL,
    document_type TEXT,
    parent_folder TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_nodes_drive ON nodes(drive_id, kind);
CREATE INDEX IF NOT EXISTS idx_nodes_parent ON nodes(parent_folder);

-- Documents: one row per document node, created with the node
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    drive_id TEXT NOT NULL REFERENCES drives(id) ON DELETE CASCADE,
    document_type TEXT NOT NULL,
    state TEXT NOT NULL,
    revision INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

-- Operations: append-only log, keyed by target and absolute index
CREATE TABLE IF NOT EXISTS operations (
    target_id TEXT NOT NULL,
    idx INTEGER NOT NULL,
    action_type TEXT NOT NULL,
    action TEXT NOT NULL,
    hash TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    applied_at INTEGER NOT NULL,
    PRIMARY KEY (target_id, idx)
);
";

/// Apply pragmas and the schema to a connection.
///
/// Idempotent; safe to call on every open.
///
/// # Errors
///
/// Returns an error if any statement fails.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            format!("v{CURRENT_SCHEMA_VERSION}"),
            chrono::Utc::now().timestamp_millis()
        ],
    )?;

    Ok(())
}
