//! Per-year and per-run harvest reports.

use serde::Serialize;

use crate::download::{DownloadOutcome, TaskReport};
use crate::years::{RejectedYear, Year};

/// Traversal level at which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureLevel {
    /// The year index page.
    Year,
    /// An issue page.
    Issue,
    /// A position page.
    Position,
    /// A document download.
    Document,
}

/// One recorded failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    /// Where it happened.
    pub level: FailureLevel,
    /// The URL that failed.
    pub url: String,
    /// Human-readable cause.
    pub cause: String,
}

/// How a year's traversal ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum YearStatus {
    /// Every reachable document was visited.
    #[default]
    Completed,
    /// The quota ran out during this year.
    StoppedByQuota,
    /// The year index page could not be fetched.
    YearPageFailed,
    /// Cancellation was requested during this year.
    Cancelled,
}

impl YearStatus {
    fn severity(self) -> u8 {
        match self {
            Self::Completed => 0,
            Self::StoppedByQuota => 1,
            Self::Cancelled => 2,
            Self::YearPageFailed => 3,
        }
    }
}

/// Outcome of harvesting one year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearReport {
    /// The year.
    pub year: Year,
    /// How traversal ended.
    pub status: YearStatus,
    /// Documents discovered (before quota and dedupe).
    pub discovered: u64,
    /// Network downloads started (succeeded or failed).
    pub attempted: u64,
    /// Documents written to storage.
    pub downloaded: u64,
    /// Documents already present and skipped.
    pub skipped_existing: u64,
    /// Failed downloads.
    pub failed: u64,
    /// Bytes written.
    pub bytes: u64,
    /// Failures at every level, in the order they were seen.
    pub failures: Vec<FailureRecord>,
}

impl YearReport {
    /// Empty report for `year`.
    #[must_use]
    pub fn new(year: Year) -> Self {
        Self {
            year,
            status: YearStatus::Completed,
            discovered: 0,
            attempted: 0,
            downloaded: 0,
            skipped_existing: 0,
            failed: 0,
            bytes: 0,
            failures: Vec::new(),
        }
    }

    /// Records a page-level failure.
    pub fn record_failure(&mut self, level: FailureLevel, url: impl Into<String>, cause: String) {
        self.failures.push(FailureRecord {
            level,
            url: url.into(),
            cause,
        });
    }

    /// Moves the status to `status` unless a more severe one is already set.
    pub fn mark(&mut self, status: YearStatus) {
        if status.severity() > self.status.severity() {
            self.status = status;
        }
    }

    /// Folds a finished download into the counters.
    pub fn record_task(&mut self, task: TaskReport) {
        match task.outcome {
            DownloadOutcome::Downloaded { bytes } => {
                self.attempted += 1;
                self.downloaded += 1;
                self.bytes += bytes;
            }
            DownloadOutcome::Failed(error) => {
                self.attempted += 1;
                self.failed += 1;
                self.record_failure(FailureLevel::Document, task.link.url, error.to_string());
            }
            DownloadOutcome::SkippedExisting => self.skipped_existing += 1,
            DownloadOutcome::QuotaExhausted => self.mark(YearStatus::StoppedByQuota),
            DownloadOutcome::Cancelled => self.mark(YearStatus::Cancelled),
            DownloadOutcome::Duplicate => {}
        }
    }

    /// True when the year produced nothing although it was expected to:
    /// its index page failed, every attempted download failed, or failures
    /// were recorded and no document was downloaded or already present.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        let no_progress = self.downloaded == 0 && self.skipped_existing == 0;
        self.status == YearStatus::YearPageFailed
            || (self.attempted > 0 && self.downloaded == 0)
            || (no_progress && !self.failures.is_empty())
    }

    /// True when some, but not all, work succeeded.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.is_failure() && !self.failures.is_empty()
    }
}

/// Aggregated counters across all years of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunTotals {
    /// Years processed.
    pub years: u64,
    /// Documents discovered.
    pub discovered: u64,
    /// Network downloads started.
    pub attempted: u64,
    /// Documents written.
    pub downloaded: u64,
    /// Documents skipped as already present.
    pub skipped_existing: u64,
    /// Failed downloads.
    pub failed: u64,
    /// Failures at any level.
    pub failures: u64,
    /// Bytes written.
    pub bytes: u64,
}

/// Outcome of a whole harvest run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunResult {
    /// One report per processed year, in processing order.
    pub years: Vec<YearReport>,
    /// Year inputs rejected before traversal.
    pub rejected: Vec<RejectedYear>,
    /// True when the run stopped because cancellation was requested.
    pub cancelled: bool,
}

impl RunResult {
    /// Sums the per-year counters.
    #[must_use]
    pub fn totals(&self) -> RunTotals {
        self.years.iter().fold(RunTotals::default(), |mut acc, y| {
            acc.years += 1;
            acc.discovered += y.discovered;
            acc.attempted += y.attempted;
            acc.downloaded += y.downloaded;
            acc.skipped_existing += y.skipped_existing;
            acc.failed += y.failed;
            acc.failures += y.failures.len() as u64;
            acc.bytes += y.bytes;
            acc
        })
    }

    /// Years that produced nothing although they were expected to.
    pub fn failed_years(&self) -> impl Iterator<Item = &YearReport> {
        self.years.iter().filter(|y| y.is_failure())
    }
}
