//! Remote document store interface.
//!
//! The importer only talks to a store through [`DriveStore`]. Two
//! implementations exist: [`HttpDriveStore`] for a real remote drive and
//! [`crate::storage::SqliteDriveStore`] for local rehearsals and tests.

pub mod backoff;
pub mod http;

pub use backoff::Backoff;
pub use http::HttpDriveStore;

use std::future::Future;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::model::{Acknowledgment, Drive, DriveAttachConfig, RemoteDocument, SyncEvent};
use crate::mutation::MutationRecord;

/// Operations the importer needs from a document store.
pub trait DriveStore: Send + Sync {
    /// Attach (or re-attach) the drive and return its current snapshot.
    fn attach_drive(
        &self,
        config: &DriveAttachConfig,
    ) -> impl Future<Output = Result<Drive>> + Send;

    /// Current snapshot of an attached drive.
    ///
    /// Attach may answer before the replica has caught up; the importer
    /// reads the drive again through this call once sync has succeeded.
    fn fetch_drive(&self, drive_id: &str) -> impl Future<Output = Result<Drive>> + Send;

    /// Start forwarding sync-status notifications for `drive_id` into `tx`.
    ///
    /// Forwarding stops when the returned guard is dropped or `tx`'s receiver
    /// goes away.
    fn watch_sync(
        &self,
        drive_id: &str,
        tx: mpsc::Sender<SyncEvent>,
    ) -> impl Future<Output = Result<SyncWatch>> + Send;

    /// Fetch a document by id.
    ///
    /// Returns `Error::DocumentNotFound` when, and only when, the store
    /// positively reports that the document does not exist.
    fn fetch_document(
        &self,
        drive_id: &str,
        document_id: &str,
    ) -> impl Future<Output = Result<RemoteDocument>> + Send;

    /// Submit records for `target_id`, which is either the drive id or a
    /// document id inside the drive.
    fn submit_mutations(
        &self,
        drive_id: &str,
        target_id: &str,
        records: &[MutationRecord],
    ) -> impl Future<Output = Result<Acknowledgment>> + Send;
}

/// Guard for a background sync watcher. Aborts the watcher on drop.
#[derive(Debug, Default)]
pub struct SyncWatch {
    task: Option<JoinHandle<()>>,
}

impl SyncWatch {
    pub(crate) fn spawned(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    /// A guard with nothing behind it, for stores that notify synchronously.
    #[must_use]
    pub fn detached() -> Self {
        Self::default()
    }

    /// Stop the watcher now.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for SyncWatch {
    fn drop(&mut self) {
        self.stop();
    }
}
