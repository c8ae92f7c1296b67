//! Idempotent creation of bucket folders and grant document nodes.

use std::collections::HashSet;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::submit::SubmissionClient;
use super::types::NodeStats;
use crate::bucket::Bucket;
use crate::error::{Error, Result};
use crate::model::{
    Acknowledgment, Drive, DriveState, GrantRecordNormalized, Node, RemoteDocument,
    DRIVE_DOCUMENT_TYPE, GRANT_DOCUMENT_TYPE,
};
use crate::mutation::{apply, AddFileInput, AddFolderInput, Document, Intent};
use crate::remote::DriveStore;

/// Namespace for grant document ids.
const GRANT_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6b1f_0c3e_52d4_4b7a_9a41_d2c8_e3f5_a017);

/// Deterministic document id for a grant.
///
/// Same funding address (any case) and name always give the same id, so a
/// re-run fetches the document the previous run created.
#[must_use]
pub fn document_id(record: &GrantRecordNormalized) -> String {
    let key = format!(
        "{}:{}",
        record.funding_address.to_ascii_lowercase(),
        record.grantee_name
    );
    Uuid::new_v5(&GRANT_ID_NAMESPACE, key.as_bytes()).to_string()
}

/// Result of making sure a grant's document node exists.
#[derive(Debug)]
pub enum NodeOutcome {
    /// This run created the node; its log is empty.
    Created,
    /// The node was already there.
    Existing(RemoteDocument),
}

/// Creates drive nodes in parent-before-child order.
///
/// Holds the drive as last acknowledged by the store and the set of folder
/// ids the store has acknowledged. Documents are only submitted under
/// acknowledged folders.
pub struct NodeCreator<'c, 'a, S> {
    client: &'c SubmissionClient<'a, S>,
    drive: Document<DriveState>,
    acknowledged: HashSet<String>,
}

impl<'c, 'a, S: DriveStore> NodeCreator<'c, 'a, S> {
    /// Start from the snapshot returned by attach. Folders already in the
    /// snapshot count as acknowledged.
    pub fn new(client: &'c SubmissionClient<'a, S>, drive: &Drive) -> Self {
        let acknowledged = folder_ids(drive).collect();

        Self {
            client,
            drive: Document::from_snapshot(
                &drive.id,
                DRIVE_DOCUMENT_TYPE,
                drive.state.clone(),
                drive.revision,
            ),
            acknowledged,
        }
    }

    /// Cached drive state as of the last acknowledgment.
    #[must_use]
    pub fn drive_state(&self) -> &DriveState {
        &self.drive.state
    }

    #[must_use]
    pub fn is_acknowledged(&self, folder_id: &str) -> bool {
        self.acknowledged.contains(folder_id)
    }

    /// Create every bucket folder the drive lacks.
    ///
    /// # Errors
    ///
    /// Any failure is returned; documents cannot be filed without folders.
    pub async fn ensure_buckets(&mut self, stats: &mut NodeStats) -> Result<usize> {
        let mut submitted = 0;
        for bucket in Bucket::ALL {
            let folder_id = bucket.folder_id();
            if self.drive.state.has_folder(folder_id) {
                debug!(folder_id, "Bucket folder exists");
                self.acknowledged.insert(folder_id.to_string());
                stats.existing += 1;
                continue;
            }

            let intent = Intent::AddFolder(AddFolderInput {
                id: folder_id.to_string(),
                name: bucket.label().to_string(),
                parent_folder: None,
            });
            submitted += self.submit_drive_intent(&intent).await?;
            self.acknowledged.insert(folder_id.to_string());
            stats.created += 1;
            info!(folder_id, label = bucket.label(), "Created bucket folder");
        }
        Ok(submitted)
    }

    /// Make sure the document node `id` exists under `bucket`'s folder.
    ///
    /// # Errors
    ///
    /// Returns `OrderingViolation` if the bucket folder has not been
    /// acknowledged. A fetch failure other than "not found" is returned as
    /// is and never treated as absence.
    pub async fn ensure_document(
        &mut self,
        id: &str,
        name: &str,
        bucket: Bucket,
    ) -> Result<NodeOutcome> {
        let parent = bucket.folder_id();
        if !self.is_acknowledged(parent) {
            return Err(Error::OrderingViolation {
                child: id.to_string(),
                parent: parent.to_string(),
            });
        }

        match self.client.fetch(id).await {
            Ok(existing) => {
                debug!(document_id = id, revision = existing.revision, "Document exists");
                return Ok(NodeOutcome::Existing(existing));
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        let intent = Intent::AddDocument(AddFileInput {
            id: id.to_string(),
            name: name.to_string(),
            document_type: GRANT_DOCUMENT_TYPE.to_string(),
            parent_folder: Some(parent.to_string()),
        });
        self.submit_drive_intent(&intent).await?;
        info!(document_id = id, name, bucket = %bucket, "Created grant document");
        Ok(NodeOutcome::Created)
    }

    /// Replace the cached drive with the store's current snapshot.
    ///
    /// # Errors
    ///
    /// Returns the store's error; the cache is left as it was.
    pub async fn refresh(&mut self) -> Result<()> {
        let drive = self.client.fetch_drive().await?;
        self.acknowledged.extend(folder_ids(&drive));
        debug!(drive_id = %drive.id, revision = drive.revision, "Refreshed drive snapshot");
        self.drive = Document::from_snapshot(
            &drive.id,
            DRIVE_DOCUMENT_TYPE,
            drive.state,
            drive.revision,
        );
        Ok(())
    }

    /// Apply `intent` to the cached drive, submit the new suffix, and adopt
    /// the store's acknowledged view. Returns the number of records sent.
    ///
    /// A failed submission may still have been applied (lost response), so
    /// the cache is re-read before the next intent is built on it.
    async fn submit_drive_intent(&mut self, intent: &Intent) -> Result<usize> {
        let mark = self.drive.log.len();
        let next = apply(&self.drive, intent)?;
        let suffix = next.log.since(mark);
        let submitted = self.client.submit(&self.drive.id, suffix).await;
        let ack = match submitted {
            Ok(ack) => ack,
            Err(e) => {
                if !matches!(e, Error::OrderingViolation { .. }) {
                    if let Err(refresh_err) = self.refresh().await {
                        warn!(error = %refresh_err, "Could not refresh drive after failed submission");
                    }
                }
                return Err(e);
            }
        };
        self.adopt(&ack)?;
        Ok(suffix.len())
    }

    fn adopt(&mut self, ack: &Acknowledgment) -> Result<()> {
        let state: DriveState = ack.state_as()?;
        self.drive = Document::from_snapshot(&self.drive.id, DRIVE_DOCUMENT_TYPE, state, ack.revision);
        Ok(())
    }
}

fn folder_ids(drive: &Drive) -> impl Iterator<Item = String> + '_ {
    drive
        .state
        .nodes()
        .iter()
        .filter(|n| matches!(n, Node::Folder(_)))
        .map(|n| n.id().to_string())
}
