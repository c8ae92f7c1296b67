//! Sync gate: run the import once, after the drive reports it is in sync.
//!
//! ```text
//! AWAITING_SYNC --(SUCCESS for our drive)--> RUNNING --(pipeline returns)--> DONE
//! ```
//!
//! One task owns the receiving end of the notification channel, so events
//! are handled one at a time. The [`ImportRun`] latch makes the pipeline
//! body run at most once no matter how many `SUCCESS` events arrive.

use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::config::ImportConfig;
use crate::error::{Error, Result};
use crate::import::{ImportStats, Importer};
use crate::model::{Drive, SyncEvent};
use crate::normalize::NormalizeReport;
use crate::remote::DriveStore;

/// Capacity of the sync notification channel.
const SYNC_CHANNEL_CAPACITY: usize = 16;

/// Lifecycle of a gated import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunState {
    AwaitingSync = 0,
    Running = 1,
    Done = 2,
}

impl RunState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::AwaitingSync,
            1 => Self::Running,
            _ => Self::Done,
        }
    }
}

/// Process-scoped latch for the one-time import.
#[derive(Debug)]
pub struct ImportRun {
    state: AtomicU8,
}

impl Default for ImportRun {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportRun {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(RunState::AwaitingSync as u8),
        }
    }

    #[must_use]
    pub fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move `AWAITING_SYNC -> RUNNING`. Returns false if the run already
    /// started or finished.
    pub fn try_start(&self) -> bool {
        self.state
            .compare_exchange(
                RunState::AwaitingSync as u8,
                RunState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn finish(&self) {
        self.state.store(RunState::Done as u8, Ordering::Release);
    }
}

/// Drives one import from sync notifications.
pub struct RunController<'a, S> {
    drive: Drive,
    report: NormalizeReport,
    importer: Importer<'a, S>,
    run: ImportRun,
}

impl<'a, S: DriveStore> RunController<'a, S> {
    /// A controller in `AWAITING_SYNC` for the attached `drive`.
    pub fn new(store: &'a S, drive: Drive, report: NormalizeReport, config: &ImportConfig) -> Self {
        let importer = Importer::new(store, &drive.id, config.retry, config.record_delay);
        Self {
            drive,
            report,
            importer,
            run: ImportRun::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> RunState {
        self.run.state()
    }

    /// Handle one notification.
    ///
    /// Returns `Some(stats)` only for the event that triggered the run.
    /// Events for other drives, non-`SUCCESS` statuses, and any `SUCCESS`
    /// after the first are ignored.
    ///
    /// # Errors
    ///
    /// Returns the pipeline's error if the triggered run fails fatally. The
    /// controller is `DONE` either way.
    pub async fn handle(&self, event: &SyncEvent) -> Result<Option<ImportStats>> {
        if !event.is_success_for(&self.drive.id) {
            trace!(drive_id = %event.drive_id, status = %event.status, "Ignoring sync event");
            return Ok(None);
        }
        if !self.run.try_start() {
            debug!(drive_id = %event.drive_id, state = ?self.state(), "Import already triggered");
            return Ok(None);
        }

        info!(
            drive_id = %self.drive.id,
            records = self.report.records.len(),
            "Drive in sync, starting import"
        );
        let result = self.importer.run(&self.report).await;
        self.run.finish();
        result.map(Some)
    }

    /// Consume notifications until the import has run.
    ///
    /// # Errors
    ///
    /// Returns `SyncChannelClosed` if the channel closes before a matching
    /// `SUCCESS`, or the pipeline's error.
    pub async fn run(&self, mut rx: mpsc::Receiver<SyncEvent>) -> Result<ImportStats> {
        while let Some(event) = rx.recv().await {
            if let Some(stats) = self.handle(&event).await? {
                return Ok(stats);
            }
        }
        Err(Error::SyncChannelClosed)
    }
}

/// Attach the drive, wait for sync, import, and stop watching.
///
/// # Errors
///
/// Returns any attach, watch, or fatal pipeline error.
pub async fn run_gated<S: DriveStore>(
    store: &S,
    config: &ImportConfig,
    report: NormalizeReport,
) -> Result<ImportStats> {
    let drive = store.attach_drive(&config.attach).await?;
    info!(drive_id = %drive.id, revision = drive.revision, "Attached drive, awaiting sync");

    let (tx, rx) = mpsc::channel(SYNC_CHANNEL_CAPACITY);
    let mut watch = store.watch_sync(&drive.id, tx).await?;

    let controller = RunController::new(store, drive, report, config);
    let result = controller.run(rx).await;
    watch.stop();
    result
}
