//! Submission client: sends record batches to the store and retries
//! transport failures.

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::{Acknowledgment, Drive, RemoteDocument};
use crate::mutation::MutationRecord;
use crate::remote::{Backoff, DriveStore};

/// How transport failures are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total tries per call, first one included. At least 1.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 250,
            max_delay_ms: 5_000,
        }
    }
}

impl RetryPolicy {
    fn backoff(&self) -> Backoff {
        Backoff::new(self.base_delay_ms, self.max_delay_ms)
    }

    /// Whether `err` on try number `tries` (1-based) earns another try.
    fn should_retry(&self, err: &Error, tries: u32) -> bool {
        err.error_code().is_retryable() && tries < self.max_attempts.max(1)
    }
}

/// Sequential, retrying access to one drive.
pub struct SubmissionClient<'a, S> {
    store: &'a S,
    drive_id: String,
    retry: RetryPolicy,
}

impl<'a, S: DriveStore> SubmissionClient<'a, S> {
    pub fn new(store: &'a S, drive_id: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            store,
            drive_id: drive_id.into(),
            retry,
        }
    }

    #[must_use]
    pub fn drive_id(&self) -> &str {
        &self.drive_id
    }

    /// Submit `records` for `target_id` and wait for the acknowledgment.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an empty batch. Store rejections and
    /// ordering violations are returned on the first occurrence; transport
    /// errors only after `max_attempts` tries.
    pub async fn submit(&self, target_id: &str, records: &[MutationRecord]) -> Result<Acknowledgment> {
        if records.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "empty submission for {target_id}"
            )));
        }

        let mut backoff = self.retry.backoff();
        let mut tries = 0;
        loop {
            tries += 1;
            match self
                .store
                .submit_mutations(&self.drive_id, target_id, records)
                .await
            {
                Ok(ack) => {
                    debug!(
                        target_id,
                        records = records.len(),
                        revision = ack.revision,
                        "Submission acknowledged"
                    );
                    return Ok(ack);
                }
                Err(e) if self.retry.should_retry(&e, tries) => {
                    let delay = backoff.next_delay();
                    warn!(target_id, tries, error = %e, "Submission failed, retrying in {:?}", delay);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Fetch a document, retrying transport failures.
    ///
    /// # Errors
    ///
    /// `DocumentNotFound` passes through untouched; it is an answer, not a
    /// failure. Other errors are returned after the retry policy gives up.
    pub async fn fetch(&self, document_id: &str) -> Result<RemoteDocument> {
        let mut backoff = self.retry.backoff();
        let mut tries = 0;
        loop {
            tries += 1;
            match self.store.fetch_document(&self.drive_id, document_id).await {
                Err(e) if self.retry.should_retry(&e, tries) => {
                    let delay = backoff.next_delay();
                    warn!(document_id, tries, error = %e, "Fetch failed, retrying in {:?}", delay);
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }

    /// Read the drive's current snapshot, retrying transport failures.
    ///
    /// # Errors
    ///
    /// Returns the store's error once the retry policy gives up.
    pub async fn fetch_drive(&self) -> Result<Drive> {
        let mut backoff = self.retry.backoff();
        let mut tries = 0;
        loop {
            tries += 1;
            match self.store.fetch_drive(&self.drive_id).await {
                Err(e) if self.retry.should_retry(&e, tries) => {
                    let delay = backoff.next_delay();
                    warn!(drive_id = %self.drive_id, tries, error = %e, "Drive read failed, retrying in {:?}", delay);
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::testing::{FaultyStore, Faults};
    use crate::model::{DriveAttachConfig, DriveState, DRIVE_DOCUMENT_TYPE};
    use crate::mutation::{apply, AddFolderInput, Document, Intent};
    use crate::storage::SqliteDriveStore;

    const DRIVE: &str = "grants";

    /// Attach `store` and build the single-record batch that adds one folder.
    async fn folder_batch(store: &FaultyStore) -> Vec<MutationRecord> {
        let drive = store
            .attach_drive(&DriveAttachConfig::default())
            .await
            .unwrap();
        let doc: Document<DriveState> =
            Document::from_snapshot(&drive.id, DRIVE_DOCUMENT_TYPE, drive.state, drive.revision);
        let next = apply(
            &doc,
            &Intent::AddFolder(AddFolderInput {
                id: "bucket-a-f".into(),
                name: "A-F".into(),
                parent_folder: None,
            }),
        )
        .unwrap();
        next.log.since(doc.log.len()).to_vec()
    }

    fn faulty(faults: Faults) -> FaultyStore {
        FaultyStore::new(SqliteDriveStore::open_memory(DRIVE).unwrap(), faults)
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_unavailable_then_success_submits_twice() {
        let store = faulty(Faults {
            unavailable_submits: 1,
            ..Faults::default()
        });
        let records = folder_batch(&store).await;
        let client = SubmissionClient::new(&store, DRIVE, RetryPolicy::default());

        let ack = client.submit(DRIVE, &records).await.unwrap();
        assert_eq!(ack.revision, 1);
        assert_eq!(store.submit_calls(), 2);
        assert_eq!(store.inner.folder_count().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_stop_at_max_attempts() {
        let store = faulty(Faults {
            unavailable_submits: 5,
            ..Faults::default()
        });
        let records = folder_batch(&store).await;
        let client = SubmissionClient::new(&store, DRIVE, RetryPolicy::default());

        let err = client.submit(DRIVE, &records).await.unwrap_err();
        assert!(matches!(err, Error::Unavailable { status: 503, .. }));
        assert_eq!(store.submit_calls(), 3);
        assert_eq!(store.inner.folder_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rejection_is_not_retried() {
        let store = faulty(Faults {
            reject_target: Some(DRIVE.into()),
            ..Faults::default()
        });
        let records = folder_batch(&store).await;
        let client = SubmissionClient::new(&store, DRIVE, RetryPolicy::default());

        let err = client.submit(DRIVE, &records).await.unwrap_err();
        assert!(matches!(err, Error::Rejected { .. }));
        assert_eq!(store.submit_calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_batch_never_reaches_the_store() {
        let store = faulty(Faults::default());
        let client = SubmissionClient::new(&store, DRIVE, RetryPolicy::default());
        let err = client.submit(DRIVE, &[]).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(store.submit_calls(), 0);
    }

    #[test]
    fn test_only_transport_errors_retry() {
        let policy = RetryPolicy {
            max_attempts: 3,
            ..RetryPolicy::default()
        };
        let rejected = Error::Rejected {
            target: "d".into(),
            status: "CONFLICT".into(),
            message: String::new(),
        };
        let ordering = Error::OrderingViolation {
            child: "doc".into(),
            parent: "bucket-a-f".into(),
        };
        assert!(!policy.should_retry(&rejected, 1));
        assert!(!policy.should_retry(&ordering, 1));
        assert!(!policy.should_retry(&Error::DocumentNotFound { id: "x".into() }, 1));
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        let policy = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.max_attempts.max(1), 1);
        assert!(!policy.should_retry(&Error::Remote("x".into()), 1));
    }
}
