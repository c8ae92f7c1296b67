//! SQLite-backed drive store.
//!
//! Implements [`DriveStore`] locally so the import pipeline can run without a
//! remote drive. Every submission runs in one IMMEDIATE transaction: the
//! batch is checked for index continuity, folded through the same reducers
//! the importer uses (hashes included), and appended to `operations`. A batch
//! that fails any check leaves no trace.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::model::{
    Acknowledgment, Drive, DriveAttachConfig, DriveState, GrantState, Node, RemoteDocument,
    SyncEvent, SyncStatus, GRANT_DOCUMENT_TYPE,
};
use crate::mutation::{fold, DocumentState, MutationRecord};
use crate::remote::{DriveStore, SyncWatch};
use crate::storage::schema::apply_schema;

/// Local drive store over a single SQLite connection.
#[derive(Debug)]
pub struct SqliteDriveStore {
    conn: Mutex<Connection>,
    drive_id: String,
    drive_name: String,
}

impl SqliteDriveStore {
    /// Open (or create) a store at `path` hosting the drive `drive_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path, drive_id: &str) -> Result<Self> {
        Self::open_with_timeout(path, drive_id, None)
    }

    /// Open a store with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, drive_id: &str, timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_millis(timeout_ms.unwrap_or(5_000)))?;
        apply_schema(&conn)?;
        Ok(Self::from_connection(conn, drive_id))
    }

    /// Open an in-memory store (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory(drive_id: &str) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self::from_connection(conn, drive_id))
    }

    fn from_connection(conn: Connection, drive_id: &str) -> Self {
        Self {
            conn: Mutex::new(conn),
            drive_id: drive_id.to_string(),
            drive_name: drive_id.to_string(),
        }
    }

    /// Set the display name used when the drive row is first created.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.drive_name = name.into();
        self
    }

    /// Id of the hosted drive.
    #[must_use]
    pub fn drive_id(&self) -> &str {
        &self.drive_id
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Other("storage connection lock poisoned".to_string()))
    }

    /// Run `f` inside an IMMEDIATE transaction; commit on success, roll
    /// back on error.
    ///
    /// # Errors
    ///
    /// Returns the closure's error or any database error.
    pub fn mutate<F, R>(&self, op: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction) -> Result<R>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let result = f(&tx)?;
        tx.commit()?;
        trace!(op, "Committed");
        Ok(result)
    }

    fn check_drive(&self, drive_id: &str) -> Result<()> {
        if drive_id == self.drive_id {
            Ok(())
        } else {
            Err(Error::DriveNotFound {
                id: drive_id.to_string(),
            })
        }
    }

    fn attach(&self, config: &DriveAttachConfig) -> Result<Drive> {
        let now = chrono::Utc::now().timestamp_millis();
        let config_json = serde_json::to_string(config)?;
        let empty_state = serde_json::to_string(&DriveState::default())?;

        self.mutate("attach_drive", |tx| {
            tx.execute(
                "INSERT INTO drives (id, name, slug, attach_config, state, revision, created_at, updated_at)
                 VALUES (?1, ?2, ?1, ?3, ?4, 0, ?5, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    attach_config = excluded.attach_config,
                    updated_at = excluded.updated_at",
                rusqlite::params![self.drive_id, self.drive_name, config_json, empty_state, now],
            )?;
            load_drive(tx, &self.drive_id)
        })
    }

    fn fetch(&self, drive_id: &str, document_id: &str) -> Result<RemoteDocument> {
        self.check_drive(drive_id)?;
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT document_type, state, revision FROM documents WHERE id = ?1 AND drive_id = ?2",
                rusqlite::params![document_id, drive_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?;

        let (document_type, state, revision) = row.ok_or_else(|| Error::DocumentNotFound {
            id: document_id.to_string(),
        })?;

        Ok(RemoteDocument {
            id: document_id.to_string(),
            document_type,
            revision: from_sql_index(revision),
            state: serde_json::from_str(&state)?,
        })
    }

    fn submit(
        &self,
        drive_id: &str,
        target_id: &str,
        records: &[MutationRecord],
    ) -> Result<Acknowledgment> {
        self.check_drive(drive_id)?;
        let ack = self.mutate("submit_mutations", |tx| {
            if target_id == drive_id {
                submit_to_drive(tx, drive_id, records)
            } else {
                submit_to_document(tx, drive_id, target_id, records)
            }
        })?;
        debug!(
            target_id,
            records = records.len(),
            revision = ack.revision,
            "Applied submission"
        );
        Ok(ack)
    }

    // ==================
    // Inspection
    // ==================

    /// Number of folder nodes in the hosted drive.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn folder_count(&self) -> Result<usize> {
        self.count_nodes("folder")
    }

    /// Number of document nodes in the hosted drive.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn document_count(&self) -> Result<usize> {
        self.count_nodes("document")
    }

    fn count_nodes(&self, kind: &str) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM nodes WHERE drive_id = ?1 AND kind = ?2",
            rusqlite::params![self.drive_id, kind],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Number of operations recorded for `target_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn operation_count(&self, target_id: &str) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM operations WHERE target_id = ?1",
            [target_id],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Action type names recorded for `target_id`, in log order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn operation_types(&self, target_id: &str) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT action_type FROM operations WHERE target_id = ?1 ORDER BY idx")?;
        let types = stmt
            .query_map([target_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(types)
    }
}

// ==================
// Transaction bodies
// ==================

fn to_sql_index(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_sql_index(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn load_drive(conn: &Connection, drive_id: &str) -> Result<Drive> {
    let row = conn
        .query_row(
            "SELECT name, slug, state, revision FROM drives WHERE id = ?1",
            [drive_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            },
        )
        .optional()?;

    let (name, slug, state, revision) = row.ok_or_else(|| Error::DriveNotFound {
        id: drive_id.to_string(),
    })?;

    Ok(Drive {
        id: drive_id.to_string(),
        name,
        slug,
        revision: from_sql_index(revision),
        state: serde_json::from_str(&state)?,
    })
}

/// Records must continue the target's log exactly.
fn check_continuity(target_id: &str, revision: u64, records: &[MutationRecord]) -> Result<()> {
    for (expected, record) in (revision..).zip(records) {
        if record.index != expected {
            return Err(Error::Rejected {
                target: target_id.to_string(),
                status: SyncStatus::Conflict.to_string(),
                message: format!("expected index {expected}, got {}", record.index),
            });
        }
    }
    Ok(())
}

/// Fold with store semantics: invalid actions are rejections.
fn fold_checked<S: DocumentState>(
    target_id: &str,
    state: &S,
    records: &[MutationRecord],
) -> Result<S> {
    fold(target_id, state, records).map_err(|e| match e {
        Error::InvalidAction { target, reason } => Error::Rejected {
            target,
            status: SyncStatus::Error.to_string(),
            message: reason,
        },
        other => other,
    })
}

fn append_operations(tx: &Transaction, target_id: &str, records: &[MutationRecord]) -> Result<()> {
    let now = chrono::Utc::now().timestamp_millis();
    let mut stmt = tx.prepare(
        "INSERT INTO operations (target_id, idx, action_type, action, hash, timestamp, applied_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for record in records {
        stmt.execute(rusqlite::params![
            target_id,
            to_sql_index(record.index),
            record.action.type_name(),
            serde_json::to_string(&record.action)?,
            record.hash,
            record.timestamp,
            now,
        ])?;
    }
    Ok(())
}

fn initial_state(document_type: &str) -> Result<String> {
    if document_type == GRANT_DOCUMENT_TYPE {
        Ok(serde_json::to_string(&GrantState::default())?)
    } else {
        Ok("{}".to_string())
    }
}

fn insert_node(tx: &Transaction, drive_id: &str, node: &Node) -> Result<()> {
    let now = chrono::Utc::now().timestamp_millis();
    match node {
        Node::Folder(folder) => {
            tx.execute(
                "INSERT INTO nodes (id, drive_id, kind, name, parent_folder, created_at)
                 VALUES (?1, ?2, 'folder', ?3, ?4, ?5)",
                rusqlite::params![folder.id, drive_id, folder.name, folder.parent_folder, now],
            )?;
        }
        Node::Document(document) => {
            tx.execute(
                "INSERT INTO nodes (id, drive_id, kind, name, document_type, parent_folder, created_at)
                 VALUES (?1, ?2, 'document', ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    document.id,
                    drive_id,
                    document.name,
                    document.document_type,
                    document.parent_folder,
                    now
                ],
            )?;
            tx.execute(
                "INSERT INTO documents (id, drive_id, document_type, state, revision, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)",
                rusqlite::params![
                    document.id,
                    drive_id,
                    document.document_type,
                    initial_state(&document.document_type)?,
                    now
                ],
            )?;
        }
    }
    Ok(())
}

fn submit_to_drive(
    tx: &Transaction,
    drive_id: &str,
    records: &[MutationRecord],
) -> Result<Acknowledgment> {
    let drive = load_drive(tx, drive_id)?;
    check_continuity(drive_id, drive.revision, records)?;
    let state = fold_checked(drive_id, &drive.state, records)?;

    // Reducers only append, so new nodes are the tail.
    for node in &state.nodes()[drive.state.nodes().len()..] {
        insert_node(tx, drive_id, node)?;
    }

    append_operations(tx, drive_id, records)?;
    let revision = drive.revision + records.len() as u64;
    tx.execute(
        "UPDATE drives SET state = ?1, revision = ?2, updated_at = ?3 WHERE id = ?4",
        rusqlite::params![
            serde_json::to_string(&state)?,
            to_sql_index(revision),
            chrono::Utc::now().timestamp_millis(),
            drive_id
        ],
    )?;

    Ok(Acknowledgment {
        target_id: drive_id.to_string(),
        revision,
        state: serde_json::to_value(&state)?,
    })
}

fn submit_to_document(
    tx: &Transaction,
    drive_id: &str,
    document_id: &str,
    records: &[MutationRecord],
) -> Result<Acknowledgment> {
    let row = tx
        .query_row(
            "SELECT document_type, state, revision FROM documents WHERE id = ?1 AND drive_id = ?2",
            rusqlite::params![document_id, drive_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        )
        .optional()?;
    let (document_type, state_json, revision) = row.ok_or_else(|| Error::DocumentNotFound {
        id: document_id.to_string(),
    })?;
    let revision = from_sql_index(revision);

    check_continuity(document_id, revision, records)?;

    let state = if document_type == GRANT_DOCUMENT_TYPE {
        let current: GrantState = serde_json::from_str(&state_json)?;
        serde_json::to_value(fold_checked(document_id, &current, records)?)?
    } else {
        return Err(Error::Rejected {
            target: document_id.to_string(),
            status: SyncStatus::Error.to_string(),
            message: format!("unsupported document type {document_type}"),
        });
    };

    append_operations(tx, document_id, records)?;
    let revision = revision + records.len() as u64;
    tx.execute(
        "UPDATE documents SET state = ?1, revision = ?2, updated_at = ?3 WHERE id = ?4",
        rusqlite::params![
            state.to_string(),
            to_sql_index(revision),
            chrono::Utc::now().timestamp_millis(),
            document_id
        ],
    )?;

    Ok(Acknowledgment {
        target_id: document_id.to_string(),
        revision,
        state,
    })
}

impl DriveStore for SqliteDriveStore {
    async fn attach_drive(&self, config: &DriveAttachConfig) -> Result<Drive> {
        self.attach(config)
    }

    async fn fetch_drive(&self, drive_id: &str) -> Result<Drive> {
        self.check_drive(drive_id)?;
        let conn = self.lock()?;
        load_drive(&conn, drive_id)
    }

    /// Emits a single `SUCCESS` for an attached drive; there is no remote to
    /// wait for.
    async fn watch_sync(&self, drive_id: &str, tx: mpsc::Sender<SyncEvent>) -> Result<SyncWatch> {
        self.check_drive(drive_id)?;
        {
            let conn = self.lock()?;
            load_drive(&conn, drive_id)?;
        }
        tx.send(SyncEvent::new(drive_id, SyncStatus::Success))
            .await
            .map_err(|_| Error::SyncChannelClosed)?;
        Ok(SyncWatch::detached())
    }

    async fn fetch_document(&self, drive_id: &str, document_id: &str) -> Result<RemoteDocument> {
        self.fetch(drive_id, document_id)
    }

    async fn submit_mutations(
        &self,
        drive_id: &str,
        target_id: &str,
        records: &[MutationRecord],
    ) -> Result<Acknowledgment> {
        self.submit(drive_id, target_id, records)
    }
}
