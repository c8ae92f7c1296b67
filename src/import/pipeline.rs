//! The import pipeline: bucket folders first, then one grant at a time.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::nodes::{document_id, NodeCreator, NodeOutcome};
use super::submit::{RetryPolicy, SubmissionClient};
use super::types::ImportStats;
use crate::bucket::Bucket;
use crate::error::Result;
use crate::model::{GrantRecordNormalized, GrantState, GRANT_DOCUMENT_TYPE};
use crate::mutation::{apply, Document, Intent};
use crate::normalize::NormalizeReport;
use crate::remote::DriveStore;

/// Runs one import against one drive.
pub struct Importer<'a, S> {
    client: SubmissionClient<'a, S>,
    record_delay: Duration,
}

impl<'a, S: DriveStore> Importer<'a, S> {
    pub fn new(
        store: &'a S,
        drive_id: impl Into<String>,
        retry: RetryPolicy,
        record_delay: Duration,
    ) -> Self {
        Self {
            client: SubmissionClient::new(store, drive_id, retry),
            record_delay,
        }
    }

    /// Import every normalized record into the drive.
    ///
    /// The drive is read from the store first, so the run starts from the
    /// synced state and not from whatever attach returned. Records are
    /// processed strictly in order. A failure confined to one record is
    /// logged and counted and the loop moves on; fatal errors (ordering
    /// violations) stop the run.
    ///
    /// # Errors
    ///
    /// Returns an error if the drive cannot be read, the bucket folders
    /// cannot be created, or a fatal error occurs for any record.
    pub async fn run(&self, report: &NormalizeReport) -> Result<ImportStats> {
        let mut stats = ImportStats {
            rejected: report.rejected.len(),
            ..ImportStats::default()
        };

        let drive = self.client.fetch_drive().await?;
        debug!(drive_id = %drive.id, revision = drive.revision, "Starting from synced drive");
        let mut nodes = NodeCreator::new(&self.client, &drive);
        stats.records_submitted += nodes.ensure_buckets(&mut stats.folders).await?;
        info!(
            created = stats.folders.created,
            existing = stats.folders.existing,
            "Bucket folders ready"
        );

        let total = report.records.len();
        for (position, record) in report.records.iter().enumerate() {
            let bucket = match Bucket::for_name(&record.grantee_name) {
                Ok(bucket) => bucket,
                Err(e) => {
                    warn!(grantee = %record.grantee_name, error = %e, "Skipping record");
                    stats.rejected += 1;
                    continue;
                }
            };

            match self.import_record(&mut nodes, record, bucket, &mut stats).await {
                Ok(()) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(grantee = %record.grantee_name, error = %e, "Grant import failed, continuing");
                    stats.failed += 1;
                }
            }

            if position + 1 < total && !self.record_delay.is_zero() {
                tokio::time::sleep(self.record_delay).await;
            }
        }

        Ok(stats)
    }

    async fn import_record(
        &self,
        nodes: &mut NodeCreator<'_, 'a, S>,
        record: &GrantRecordNormalized,
        bucket: Bucket,
        stats: &mut ImportStats,
    ) -> Result<()> {
        let id = document_id(record);

        let doc: Document<GrantState> = match nodes
            .ensure_document(&id, &record.grantee_name, bucket)
            .await?
        {
            NodeOutcome::Created => {
                stats.documents.created += 1;
                stats.records_submitted += 1;
                Document::new(&id, GRANT_DOCUMENT_TYPE)
            }
            NodeOutcome::Existing(remote) => {
                stats.documents.existing += 1;
                if remote.revision > 0 {
                    debug!(document_id = %id, revision = remote.revision, "Already initialized");
                    return Ok(());
                }
                info!(document_id = %id, "Initializing document left empty by an earlier run");
                Document::new(&id, GRANT_DOCUMENT_TYPE)
            }
        };

        let mark = doc.log.len();
        let next = apply(&doc, &Intent::initialize_grant(record))?;
        let suffix = next.log.since(mark);
        let ack = self.client.submit(&id, suffix).await?;

        stats.records_submitted += suffix.len();
        stats.initialized += 1;
        info!(
            document_id = %id,
            grantee = %record.grantee_name,
            editors = record.authorized_signer_addresses.len(),
            revision = ack.revision,
            "Initialized grant"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::testing::{FaultyStore, Faults};
    use crate::model::DriveAttachConfig;
    use crate::normalize::normalize_records;
    use crate::storage::SqliteDriveStore;
    use serde_json::{json, Value};

    const DRIVE: &str = "grants";

    fn address(fill: char) -> String {
        format!("0x{}", fill.to_string().repeat(40))
    }

    fn grant(name: &str, fund: char, signers: &[String]) -> Value {
        json!({
            "granteeName": name,
            "startDate": "2024-06-03",
            "grantSize": 0,
            "fundingAddress": address(fund),
            "disbursementContractAddress": address('d'),
            "authorizedSignerAddress": signers,
        })
    }

    fn report(values: Vec<Value>) -> NormalizeReport {
        let raw: Vec<_> = values.into_iter().map(Into::into).collect();
        normalize_records(&raw)
    }

    async fn run_with_delay<S: DriveStore>(
        store: &S,
        report: &NormalizeReport,
        delay: Duration,
    ) -> Result<ImportStats> {
        let drive = store.attach_drive(&DriveAttachConfig::default()).await?;
        Importer::new(store, &drive.id, RetryPolicy::default(), delay)
            .run(report)
            .await
    }

    async fn run_once<S: DriveStore>(store: &S, report: &NormalizeReport) -> Result<ImportStats> {
        run_with_delay(store, report, Duration::ZERO).await
    }

    fn five_grants() -> NormalizeReport {
        report(vec![
            grant("Acme", 'a', &[]),
            grant("Bolt", 'b', &[]),
            grant("Cobalt", 'c', &[]),
            grant("Dune", 'e', &[]),
            grant("Echo", 'f', &[]),
        ])
    }

    #[tokio::test]
    async fn test_frank_end_to_end() {
        let store = SqliteDriveStore::open_memory(DRIVE).unwrap();
        let report = report(vec![grant("Frank", 'a', &[address('b')])]);
        let stats = run_once(&store, &report).await.unwrap();

        assert_eq!(stats.folders.created, 4);
        assert_eq!(stats.documents.created, 1);
        assert_eq!(stats.initialized, 1);
        assert!(stats.is_clean());

        let drive = store.attach_drive(&DriveAttachConfig::default()).await.unwrap();
        let doc_node = drive
            .state
            .nodes()
            .iter()
            .find(|n| n.parent_folder() == Some("bucket-a-f"))
            .unwrap();
        let folder = drive.state.node("bucket-a-f").unwrap();
        assert!(matches!(folder, crate::model::Node::Folder(f) if f.name == "A-F"));

        let id = doc_node.id();
        assert_eq!(
            store.operation_types(id).unwrap(),
            vec!["INIT_GRANTEE", "ADD_EDITOR"]
        );
        let doc = store.fetch_document(DRIVE, id).await.unwrap();
        let state: GrantState = serde_json::from_value(doc.state).unwrap();
        assert_eq!(state.grantee_name.as_deref(), Some("Frank"));
        assert_eq!(state.grant_size, Some(1.0));
        assert_eq!(state.editor_addresses, vec![address('b')]);
    }

    #[tokio::test]
    async fn test_second_run_creates_nothing() {
        let store = SqliteDriveStore::open_memory(DRIVE).unwrap();
        let report = report(vec![
            grant("Acme", 'a', &[address('b')]),
            grant("gamma", 'c', &[]),
            grant("Zorn", 'e', &[address('f'), address('9')]),
        ]);

        let first = run_once(&store, &report).await.unwrap();
        assert_eq!(first.documents.created, 3);
        let ops_after_first = store.operation_count(DRIVE).unwrap();

        let second = run_once(&store, &report).await.unwrap();
        assert_eq!(second.folders.created, 0);
        assert_eq!(second.folders.existing, 4);
        assert_eq!(second.documents.created, 0);
        assert_eq!(second.documents.existing, 3);
        assert_eq!(second.initialized, 0);
        assert_eq!(second.records_submitted, 0);

        assert_eq!(store.folder_count().unwrap(), 4);
        assert_eq!(store.document_count().unwrap(), 3);
        assert_eq!(store.operation_count(DRIVE).unwrap(), ops_after_first);
    }

    #[tokio::test]
    async fn test_one_plus_k_records_per_document() {
        for k in [0_usize, 1, 3] {
            let store = SqliteDriveStore::open_memory(DRIVE).unwrap();
            let signers: Vec<String> = ['1', '2', '3'].iter().take(k).map(|c| address(*c)).collect();
            let report = report(vec![grant("Frank", 'a', &signers)]);

            let stats = run_once(&store, &report).await.unwrap();
            // 4 folders + 1 document node + 1 init + k editors
            assert_eq!(stats.records_submitted, 4 + 1 + 1 + k, "k = {k}");

            let drive = store.attach_drive(&DriveAttachConfig::default()).await.unwrap();
            let doc_id = drive
                .state
                .nodes()
                .iter()
                .find(|n| n.parent_folder().is_some())
                .map(|n| n.id().to_string())
                .unwrap();
            assert_eq!(store.operation_count(&doc_id).unwrap(), 1 + k, "k = {k}");
        }
    }

    #[tokio::test]
    async fn test_rejected_records_are_counted_not_fatal() {
        let store = SqliteDriveStore::open_memory(DRIVE).unwrap();
        let mut bad = grant("Frank", 'a', &[]);
        bad["fundingAddress"] = json!("TBD");
        let report = report(vec![bad, grant("1inch", 'b', &[]), grant("Mara", 'c', &[])]);

        let stats = run_once(&store, &report).await.unwrap();
        assert_eq!(stats.rejected, 2);
        assert_eq!(stats.documents.created, 1);
        assert_eq!(store.document_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_document_from_crashed_run_is_initialized() {
        let store = SqliteDriveStore::open_memory(DRIVE).unwrap();
        let report = report(vec![grant("Frank", 'a', &[address('b')])]);
        let id = document_id(&report.records[0]);

        // Simulate a crash between node creation and initialization.
        let drive = store.attach_drive(&DriveAttachConfig::default()).await.unwrap();
        let client = SubmissionClient::new(&store, DRIVE, RetryPolicy::default());
        let mut nodes = NodeCreator::new(&client, &drive);
        nodes.ensure_buckets(&mut Default::default()).await.unwrap();
        nodes.ensure_document(&id, "Frank", Bucket::AtoF).await.unwrap();
        assert_eq!(store.operation_count(&id).unwrap(), 0);

        let stats = run_once(&store, &report).await.unwrap();
        assert_eq!(stats.documents.existing, 1);
        assert_eq!(stats.initialized, 1);
        assert_eq!(store.operation_count(&id).unwrap(), 2);
        assert_eq!(store.document_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_one_failed_grant_does_not_stop_the_run() {
        let report = report(vec![
            grant("Acme", 'a', &[]),
            grant("Hollow", 'b', &[]),
            grant("Zorn", 'c', &[]),
        ]);
        let target = document_id(&report.records[1]);
        let store = FaultyStore::new(
            SqliteDriveStore::open_memory(DRIVE).unwrap(),
            Faults {
                reject_target: Some(target.clone()),
                ..Faults::default()
            },
        );

        let stats = run_once(&store, &report).await.unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.initialized, 2);
        assert_eq!(stats.documents.created, 3);
        assert_eq!(store.inner.operation_count(&target).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_existence_check_never_creates_the_document() {
        let report = report(vec![
            grant("Acme", 'a', &[]),
            grant("Hollow", 'b', &[]),
            grant("Zorn", 'c', &[]),
        ]);
        let unreachable = document_id(&report.records[1]);
        let store = FaultyStore::new(
            SqliteDriveStore::open_memory(DRIVE).unwrap(),
            Faults {
                failing_fetch: Some(unreachable.clone()),
                ..Faults::default()
            },
        );

        let stats = run_once(&store, &report).await.unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.documents.created, 2);
        assert_eq!(stats.initialized, 2);

        let drive = store.fetch_drive(DRIVE).await.unwrap();
        assert!(drive.state.node(&unreachable).is_none());
        let add_files = store
            .inner
            .operation_types(DRIVE)
            .unwrap()
            .into_iter()
            .filter(|t| t == "ADD_FILE")
            .count();
        assert_eq!(add_files, 2);
        assert_eq!(store.inner.document_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_lost_drive_ack_fails_only_that_grant() {
        // Submissions 1-4 are the bucket folders; the 6th creates Bolt.
        let report = five_grants();
        let store = FaultyStore::new(
            SqliteDriveStore::open_memory(DRIVE).unwrap(),
            Faults {
                lose_drive_ack: Some(6),
                ..Faults::default()
            },
        );

        let stats = run_once(&store, &report).await.unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.initialized, 4);
        assert_eq!(stats.documents.created, 4);
        assert_eq!(store.inner.document_count().unwrap(), 5);

        // The applied-but-unacknowledged document is picked up next time.
        let again = run_once(&store, &report).await.unwrap();
        assert_eq!(again.documents.created, 0);
        assert_eq!(again.initialized, 1);
        assert!(again.is_clean());
    }

    #[tokio::test(start_paused = true)]
    async fn test_records_are_spaced_by_the_delay() {
        let store = SqliteDriveStore::open_memory(DRIVE).unwrap();
        let report = report(vec![
            grant("Acme", 'a', &[]),
            grant("Hollow", 'b', &[]),
            grant("Zorn", 'c', &[]),
        ]);
        let delay = Duration::from_millis(200);

        let started = tokio::time::Instant::now();
        let stats = run_with_delay(&store, &report, delay).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(stats.initialized, 3);
        assert!(elapsed >= delay * 2, "elapsed {elapsed:?}");
        // No pause after the last record.
        assert!(elapsed < delay * 3, "elapsed {elapsed:?}");
    }
}
