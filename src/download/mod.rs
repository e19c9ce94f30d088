//! Document downloads: naming, resumability, atomic writes and the worker
//! pool that runs them.
//!
//! Every discovered PDF becomes a [`DocumentLink`] with a deterministic
//! destination. The [`Downloader`] skips destinations that already exist,
//! streams new bodies through a `.part` file and charges the shared quota
//! only for completed documents. The [`DownloadEngine`] runs downloads with
//! bounded concurrency.

mod downloader;
mod engine;
mod error;
mod manifest;
mod naming;

pub use downloader::{DownloadOutcome, Downloader};
pub use engine::{
    DEFAULT_WORKERS, DownloadEngine, EngineError, MAX_WORKERS, MIN_WORKERS, TaskReport,
};
pub use error::DownloadError;
pub use manifest::{FsResumeIndex, PARTIAL_SUFFIX, ResumeIndex, partial_path};
pub use naming::{DocumentKey, DocumentLink, year_dir};
