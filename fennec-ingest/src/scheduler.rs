//! The ingest scheduler: one loop alternating "scan if the poll interval
//! elapsed" and "drain the queue while the indexer is running", with an
//! opportunistic clustering pass after productive drains.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use fennec_core::settings::{IndexerState, keys};
use fennec_core::types::progress::ScanProgressTracker;
use fennec_core::{DrainOutcome, Pipeline, Result, Scanner, Store, cluster};

/// Pause between loop ticks when there is nothing to do.
const IDLE_TICK: Duration = Duration::from_secs(2);
/// Backoff after a model host failed to load; distinguishes
/// environmental failures from per-file ones.
const MODEL_BACKOFF: Duration = Duration::from_secs(30);
/// How often the in-flight scan snapshot is published for the query
/// process.
const PROGRESS_PUBLISH_INTERVAL: Duration = Duration::from_secs(1);

pub struct Scheduler {
    store: Store,
    scanner: Scanner,
    pipeline: Pipeline,
    progress: Arc<ScanProgressTracker>,
    env_watch_roots: Vec<String>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler").finish_non_exhaustive()
    }
}

impl Scheduler {
    pub fn new(
        store: Store,
        scanner: Scanner,
        pipeline: Pipeline,
        progress: Arc<ScanProgressTracker>,
        env_watch_roots: Vec<String>,
    ) -> Self {
        Self {
            store,
            scanner,
            pipeline,
            progress,
            env_watch_roots,
        }
    }

    async fn watch_roots(&self) -> Result<Vec<String>> {
        if !self.env_watch_roots.is_empty() {
            return Ok(self.env_watch_roots.clone());
        }
        self.store.config().watch_folders().await
    }

    /// Run until the process is stopped or a restart is requested.
    /// Errors inside one cycle are logged and do not terminate the loop.
    pub async fn run(&self) -> Result<()> {
        let mut last_scan: Option<Instant> = None;

        loop {
            // Admin-requested restart: exit so the supervisor brings the
            // process back up against remounted filesystems.
            if self.store.config().restart_requested().await? {
                self.store.config().set_restart_requested(false).await?;
                info!("restart requested, stopping ingest loop");
                return Ok(());
            }

            if self.store.config().indexer_state().await? == IndexerState::Paused {
                tokio::time::sleep(IDLE_TICK).await;
                continue;
            }

            let poll_interval =
                Duration::from_secs(self.store.config().poll_interval_seconds().await?);
            let scan_due = last_scan.is_none_or(|t| t.elapsed() >= poll_interval);
            if scan_due {
                match self.run_scan().await {
                    Ok(()) => {}
                    Err(e) => error!("scan failed: {e}"),
                }
                last_scan = Some(Instant::now());
            }

            let completed = self.drain_queue().await;
            if completed > 0 {
                if let Err(e) = cluster::run_clustering(&self.store).await {
                    warn!("clustering pass failed: {e}");
                }
            } else {
                tokio::time::sleep(IDLE_TICK).await;
            }
        }
    }

    /// One reconciliation pass, publishing progress snapshots while the
    /// walk runs so the query process can serve a live report.
    async fn run_scan(&self) -> Result<()> {
        let roots = self.watch_roots().await?;
        if roots.is_empty() {
            warn!("no watch roots configured, skipping scan");
            return Ok(());
        }

        let scan = self.scanner.scan(&roots);
        tokio::pin!(scan);
        let mut ticker = tokio::time::interval(PROGRESS_PUBLISH_INTERVAL);

        let summary = loop {
            tokio::select! {
                result = &mut scan => break result?,
                _ = ticker.tick() => {
                    self.publish_progress().await;
                }
            }
        };
        self.publish_progress().await;

        info!(
            new = summary.files_new,
            updated = summary.files_updated,
            missing = summary.files_missing,
            "scan summary recorded"
        );
        Ok(())
    }

    async fn publish_progress(&self) {
        let snapshot = self.progress.snapshot();
        let value = match serde_json::to_value(&snapshot) {
            Ok(value) => value,
            Err(e) => {
                warn!("progress serialization failed: {e}");
                return;
            }
        };
        if let Err(e) = self.store.config().set_raw(keys::SCAN_STATUS, &value).await {
            warn!("progress publish failed: {e}");
        }
    }

    /// Drain pending jobs one at a time, re-checking the pause flag
    /// between jobs. Returns the number of completions.
    async fn drain_queue(&self) -> u64 {
        let mut completed = 0u64;
        loop {
            match self.store.config().indexer_state().await {
                Ok(IndexerState::Running) => {}
                Ok(IndexerState::Paused) => break,
                Err(e) => {
                    error!("indexer state read failed: {e}");
                    break;
                }
            }

            match self.pipeline.process_next().await {
                Ok(DrainOutcome::Idle) => break,
                Ok(DrainOutcome::Completed) => completed += 1,
                Ok(DrainOutcome::Failed) => {}
                Ok(DrainOutcome::Backoff) => {
                    info!("model host unavailable, backing off {MODEL_BACKOFF:?}");
                    tokio::time::sleep(MODEL_BACKOFF).await;
                    break;
                }
                Err(e) => {
                    error!("drain step failed: {e}");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    break;
                }
            }
        }
        completed
    }
}
