//! Store wrapper that injects failures, for pipeline and gate tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::model::{
    Acknowledgment, Drive, DriveAttachConfig, DriveState, RemoteDocument, SyncEvent,
};
use crate::mutation::MutationRecord;
use crate::remote::{DriveStore, SyncWatch};
use crate::storage::SqliteDriveStore;

#[derive(Debug, Default)]
pub(crate) struct Faults {
    /// Every submission to this target is rejected.
    pub reject_target: Option<String>,
    /// Fetching this document fails with a remote error.
    pub failing_fetch: Option<String>,
    /// The n-th drive submission (1-based) is applied, then its response lost.
    pub lose_drive_ack: Option<usize>,
    /// Leading submissions answered with a retryable 503.
    pub unavailable_submits: usize,
    /// Attach answers with an empty drive at revision 0, as a replica that
    /// has not caught up would.
    pub stale_attach: bool,
}

pub(crate) struct FaultyStore {
    pub inner: SqliteDriveStore,
    faults: Faults,
    submit_calls: AtomicUsize,
    drive_submits: AtomicUsize,
}

impl FaultyStore {
    pub fn new(inner: SqliteDriveStore, faults: Faults) -> Self {
        Self {
            inner,
            faults,
            submit_calls: AtomicUsize::new(0),
            drive_submits: AtomicUsize::new(0),
        }
    }

    /// Calls to `submit_mutations`, failed ones included.
    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }
}

impl DriveStore for FaultyStore {
    async fn attach_drive(&self, config: &DriveAttachConfig) -> Result<Drive> {
        let drive = self.inner.attach_drive(config).await?;
        if self.faults.stale_attach {
            return Ok(Drive {
                revision: 0,
                state: DriveState::default(),
                ..drive
            });
        }
        Ok(drive)
    }

    async fn fetch_drive(&self, drive_id: &str) -> Result<Drive> {
        self.inner.fetch_drive(drive_id).await
    }

    async fn watch_sync(&self, drive_id: &str, tx: mpsc::Sender<SyncEvent>) -> Result<SyncWatch> {
        self.inner.watch_sync(drive_id, tx).await
    }

    async fn fetch_document(&self, drive_id: &str, document_id: &str) -> Result<RemoteDocument> {
        if self.faults.failing_fetch.as_deref() == Some(document_id) {
            return Err(Error::Remote(format!("fetch of {document_id} failed")));
        }
        self.inner.fetch_document(drive_id, document_id).await
    }

    async fn submit_mutations(
        &self,
        drive_id: &str,
        target_id: &str,
        records: &[MutationRecord],
    ) -> Result<Acknowledgment> {
        let call = self.submit_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.faults.unavailable_submits {
            return Err(Error::Unavailable {
                status: 503,
                url: format!("test://{target_id}/operations"),
            });
        }
        if self.faults.reject_target.as_deref() == Some(target_id) {
            return Err(Error::Rejected {
                target: target_id.to_string(),
                status: "ERROR".into(),
                message: "refused".into(),
            });
        }

        let ack = self.inner.submit_mutations(drive_id, target_id, records).await?;
        if target_id == drive_id {
            let n = self.drive_submits.fetch_add(1, Ordering::SeqCst) + 1;
            if self.faults.lose_drive_ack == Some(n) {
                return Err(Error::Remote("response lost".into()));
            }
        }
        Ok(ack)
    }
}
