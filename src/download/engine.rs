//! Bounded worker pool for document downloads.
//!
//! The walker keeps discovering links while downloads run. Each link is
//! submitted to the [`DownloadEngine`], which hands it to a worker as soon as
//! one of its semaphore permits is free. With a single worker the download
//! runs inline instead, so a one-worker harvest behaves exactly like a plain
//! sequential loop: pages and documents are fetched strictly in discovery
//! order.
//!
//! Cancellation stops new requests from being sent. Spawned downloads still
//! waiting for pacing or a quota slot end as [`DownloadOutcome::Cancelled`];
//! requests already sent finish (or fail) normally. Everything is reported
//! by [`DownloadEngine::drain`].

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, warn};

use super::downloader::{DownloadOutcome, Downloader};
use super::naming::DocumentLink;
use crate::quota::QuotaTracker;

/// Minimum allowed worker count.
pub const MIN_WORKERS: usize = 1;

/// Maximum allowed worker count.
pub const MAX_WORKERS: usize = 16;

/// Default worker count: sequential downloads.
pub const DEFAULT_WORKERS: usize = 1;

/// Error type for engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Worker count outside the supported range.
    #[error("invalid worker count {value}: must be between {MIN_WORKERS} and {MAX_WORKERS}")]
    InvalidWorkers {
        /// The rejected value.
        value: usize,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// What happened to one submitted link.
#[derive(Debug)]
pub struct TaskReport {
    /// The submitted link.
    pub link: DocumentLink,
    /// Its destination.
    pub path: PathBuf,
    /// Result of the download.
    pub outcome: DownloadOutcome,
}

/// Runs the downloads of one harvest with at most `workers` in flight.
#[derive(Debug)]
pub struct DownloadEngine {
    workers: usize,
    semaphore: Arc<Semaphore>,
    downloader: Arc<Downloader>,
    cancel: CancellationToken,
    claimed: HashSet<PathBuf>,
    tasks: JoinSet<TaskReport>,
    finished: Vec<TaskReport>,
}

impl DownloadEngine {
    /// Creates an engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidWorkers`] when `workers` is outside
    /// `1..=16`.
    pub fn new(
        workers: usize,
        downloader: Arc<Downloader>,
        cancel: CancellationToken,
    ) -> Result<Self, EngineError> {
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&workers) {
            return Err(EngineError::InvalidWorkers { value: workers });
        }
        debug!(workers, "creating download engine");
        Ok(Self {
            workers,
            semaphore: Arc::new(Semaphore::new(workers)),
            downloader,
            cancel,
            claimed: HashSet::new(),
            tasks: JoinSet::new(),
            finished: Vec::new(),
        })
    }

    /// Returns the configured worker count.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Submits a link for download into `dest`.
    ///
    /// Waits for a free worker when all are busy. A destination already
    /// claimed earlier in this engine's lifetime is reported as
    /// [`DownloadOutcome::Duplicate`] and not downloaded twice.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SemaphoreClosed`] if the worker semaphore is
    /// closed.
    #[instrument(skip(self, link, dest, quota), fields(url = %link.url, path = %dest.display()))]
    pub async fn submit(
        &mut self,
        link: DocumentLink,
        dest: PathBuf,
        quota: &Arc<QuotaTracker>,
    ) -> Result<(), EngineError> {
        self.reap_finished();

        if !self.claimed.insert(dest.clone()) {
            warn!("two links map to the same destination; keeping the first");
            self.record(link, dest, DownloadOutcome::Duplicate);
            return Ok(());
        }

        if self.cancel.is_cancelled() {
            self.record(link, dest, DownloadOutcome::Cancelled);
            return Ok(());
        }

        if self.workers == 1 {
            let outcome = self
                .downloader
                .download(&link.url, &dest, quota, &self.cancel)
                .await;
            self.record(link, dest, outcome);
            return Ok(());
        }

        let permit = tokio::select! {
            () = self.cancel.cancelled() => {
                self.record(link, dest, DownloadOutcome::Cancelled);
                return Ok(());
            }
            permit = Arc::clone(&self.semaphore).acquire_owned() => {
                permit.map_err(|_| EngineError::SemaphoreClosed)?
            }
        };

        let downloader = Arc::clone(&self.downloader);
        let quota = Arc::clone(quota);
        let cancel = self.cancel.clone();
        self.tasks.spawn(async move {
            let _permit = permit;
            let outcome = downloader.download(&link.url, &dest, &quota, &cancel).await;
            TaskReport {
                link,
                path: dest,
                outcome,
            }
        });
        Ok(())
    }

    /// Waits for every running download and returns all reports collected
    /// since the last drain, in completion order.
    pub async fn drain(&mut self) -> Vec<TaskReport> {
        while let Some(joined) = self.tasks.join_next().await {
            self.collect(joined);
        }
        std::mem::take(&mut self.finished)
    }

    /// Returns the reports of downloads that already finished, without
    /// waiting for running ones.
    pub fn take_finished(&mut self) -> Vec<TaskReport> {
        self.reap_finished();
        std::mem::take(&mut self.finished)
    }

    fn reap_finished(&mut self) {
        while let Some(joined) = self.tasks.try_join_next() {
            self.collect(joined);
        }
    }

    fn collect(&mut self, joined: Result<TaskReport, JoinError>) {
        match joined {
            Ok(report) => self.finished.push(report),
            Err(e) => error!(error = %e, "download task panicked"),
        }
    }

    fn record(&mut self, link: DocumentLink, path: PathBuf, outcome: DownloadOutcome) {
        self.finished.push(TaskReport {
            link,
            path,
            outcome,
        });
    }
}
