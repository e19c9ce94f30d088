//! Run-level orchestration across the selected years.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use super::report::{RunResult, YearReport, YearStatus};
use super::walker::HierarchyWalker;
use crate::download::{
    DEFAULT_WORKERS, DownloadEngine, Downloader, EngineError, FsResumeIndex, ResumeIndex,
};
use crate::fetch::{HttpFetcher, RetryPolicy};
use crate::pacing::RateLimiter;
use crate::quota::{QuotaScope, QuotaTracker};
use crate::site::SiteLayout;
use crate::years::YearSelection;

/// Default output directory.
pub const DEFAULT_OUTPUT_DIR: &str = "./dziennik_ustaw";

/// Errors that abort a whole run.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// The download engine could not be set up or broke.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The output root could not be created.
    #[error("cannot create output directory {path}: {source}")]
    OutputDir {
        /// The directory.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Everything a run needs besides the year selection.
#[derive(Debug, Clone)]
pub struct HarvestOptions {
    /// Root of the local archive.
    pub output_dir: PathBuf,
    /// Archive URL layout.
    pub site: SiteLayout,
    /// Document limit, 0 for unlimited.
    pub limit: u64,
    /// Whether the limit spans the run or each year.
    pub quota_scope: QuotaScope,
    /// Concurrent download workers.
    pub workers: usize,
    /// Retry policy for pages and documents.
    pub retry_policy: RetryPolicy,
    /// Pacing shared by every request.
    pub rate_limiter: Arc<RateLimiter>,
    /// HTTP client.
    pub fetcher: HttpFetcher,
}

impl HarvestOptions {
    /// Options with built-in defaults, writing under `output_dir`.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            site: SiteLayout::default(),
            limit: 0,
            quota_scope: QuotaScope::default(),
            workers: DEFAULT_WORKERS,
            retry_policy: RetryPolicy::default(),
            rate_limiter: Arc::new(RateLimiter::default()),
            fetcher: HttpFetcher::new(),
        }
    }
}

/// Drives the walker over every selected year and aggregates the result.
#[derive(Debug)]
pub struct RunCoordinator {
    options: HarvestOptions,
    cancel: CancellationToken,
    index: Arc<dyn ResumeIndex>,
}

impl RunCoordinator {
    /// Creates a coordinator. `cancel` stops the run gracefully.
    #[must_use]
    pub fn new(options: HarvestOptions, cancel: CancellationToken) -> Self {
        Self {
            options,
            cancel,
            index: Arc::new(FsResumeIndex),
        }
    }

    /// Replaces the filesystem resume index.
    #[must_use]
    pub fn with_resume_index(mut self, index: Arc<dyn ResumeIndex>) -> Self {
        self.index = index;
        self
    }

    /// Returns the options.
    #[must_use]
    pub fn options(&self) -> &HarvestOptions {
        &self.options
    }

    /// Harvests every year in `selection`, in order.
    ///
    /// A failing year is recorded and the run moves on. With a run-wide
    /// quota the run ends as soon as the budget is spent.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError`] when the output root cannot be created or
    /// the worker pool cannot be set up.
    #[instrument(
        skip_all,
        fields(
            years = selection.years.len(),
            limit = self.options.limit,
            scope = self.options.quota_scope.as_str(),
            workers = self.options.workers
        )
    )]
    pub async fn run(&self, selection: &YearSelection) -> Result<RunResult, HarvestError> {
        let options = &self.options;
        for rejected in &selection.rejected {
            warn!(input = %rejected.input, reason = %rejected.reason, "year rejected");
        }

        tokio::fs::create_dir_all(&options.output_dir)
            .await
            .map_err(|source| HarvestError::OutputDir {
                path: options.output_dir.clone(),
                source,
            })?;

        let downloader = Arc::new(Downloader::new(
            options.fetcher.clone(),
            options.retry_policy.clone(),
            Arc::clone(&options.rate_limiter),
            Arc::clone(&self.index),
        ));
        let mut engine = DownloadEngine::new(options.workers, downloader, self.cancel.clone())?;
        let walker = HierarchyWalker::new(
            options.fetcher.clone(),
            options.retry_policy.clone(),
            Arc::clone(&options.rate_limiter),
            options.site.clone(),
            options.output_dir.clone(),
            self.cancel.clone(),
        );

        let run_quota = QuotaTracker::new(options.limit);
        let mut result = RunResult {
            rejected: selection.rejected.clone(),
            ..RunResult::default()
        };

        info!("starting harvest");
        for (index, &year) in selection.years.iter().enumerate() {
            if self.cancel.is_cancelled() {
                break;
            }

            let quota = match options.quota_scope {
                QuotaScope::Run => {
                    if !run_quota.has_remaining() {
                        let remaining = &selection.years[index..];
                        info!(
                            limit = options.limit,
                            remaining_years = remaining.len(),
                            "document limit reached; remaining years not harvested"
                        );
                        result.years.extend(remaining.iter().map(|&skipped| {
                            let mut report = YearReport::new(skipped);
                            report.mark(YearStatus::StoppedByQuota);
                            report
                        }));
                        break;
                    }
                    Arc::clone(&run_quota)
                }
                QuotaScope::Year => QuotaTracker::new(options.limit),
            };

            let report = walker.walk(year, &quota, &mut engine).await?;
            let stopped = report.status == YearStatus::Cancelled;
            result.years.push(report);
            if stopped {
                break;
            }
        }
        // Cancellation may land after the last submission, while running
        // downloads are drained.
        result.cancelled = self.cancel.is_cancelled();

        let totals = result.totals();
        info!(
            years = totals.years,
            downloaded = totals.downloaded,
            skipped = totals.skipped_existing,
            failed = totals.failed,
            cancelled = result.cancelled,
            "harvest finished"
        );
        Ok(result)
    }
}
