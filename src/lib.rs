//! Legal gazette harvester library.
//!
//! Mirrors the year → issue → position → document hierarchy of the
//! "Dziennik Ustaw" archive into a deterministic local directory tree.
//!
//! # Architecture
//!
//! - [`years`] - valid year range and operator selection parsing
//! - [`site`] - archive URL layout
//! - [`fetch`] - HTTP client, error taxonomy and retry
//! - [`pacing`] - per-host request pacing
//! - [`parser`] - link extraction from archive pages
//! - [`quota`] - shared download budget
//! - [`download`] - naming, resumability, atomic writes and the worker pool
//! - [`harvest`] - per-year traversal and run coordination

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub mod fetch;
pub mod harvest;
pub mod pacing;
pub mod parser;
pub mod quota;
pub mod site;
mod user_agent;
pub mod years;

// Re-export commonly used types
pub use download::{
    DEFAULT_WORKERS, DocumentKey, DocumentLink, DownloadEngine, DownloadError, DownloadOutcome,
    Downloader, FsResumeIndex, MAX_WORKERS, ResumeIndex,
};
pub use fetch::{DEFAULT_MAX_RETRIES, FetchError, HttpFetcher, RetryPolicy};
pub use harvest::{
    DEFAULT_OUTPUT_DIR, FailureLevel, HarvestError, HarvestOptions, RunCoordinator, RunResult,
    YearReport, YearStatus,
};
pub use pacing::RateLimiter;
pub use quota::{QuotaScope, QuotaTracker};
pub use site::{DEFAULT_BASE_URL, SiteLayout};
pub use years::{FIRST_YEAR, LAST_YEAR, RESTRICTED_YEARS, Year, YearSelection};
