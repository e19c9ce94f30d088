//! Resumability index: which destinations already hold a finished document.
//!
//! Downloads are written to a `.part` sibling and renamed into place only
//! once complete, so a plain existence check on the final path is enough to
//! tell a finished document from an interrupted one. The check sits behind
//! [`ResumeIndex`] so another storage backend can answer it differently.

use std::fmt::Debug;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

/// Suffix appended to a destination while its body is being written.
pub const PARTIAL_SUFFIX: &str = ".part";

/// Answers whether a destination is already complete.
#[async_trait]
pub trait ResumeIndex: Send + Sync + Debug {
    /// Returns true when `dest` holds a finished document.
    async fn is_complete(&self, dest: &Path) -> bool;

    /// Records that `dest` was just completed.
    async fn record_complete(&self, dest: &Path);
}

/// Filesystem-backed index: a destination is complete when the file exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsResumeIndex;

#[async_trait]
impl ResumeIndex for FsResumeIndex {
    async fn is_complete(&self, dest: &Path) -> bool {
        tokio::fs::metadata(dest)
            .await
            .is_ok_and(|meta| meta.is_file())
    }

    async fn record_complete(&self, _dest: &Path) {
        // The rename into place is the record.
    }
}

/// Temporary path used while a destination is being written.
#[must_use]
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_fs_index_reports_existing_file() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("D1950031401.pdf");
        let index = FsResumeIndex;
        assert!(!index.is_complete(&dest).await);
        std::fs::write(&dest, b"%PDF").unwrap();
        assert!(index.is_complete(&dest).await);
    }

    #[tokio::test]
    async fn test_partial_file_is_not_complete() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("D1950031401.pdf");
        std::fs::write(partial_path(&dest), b"%PD").unwrap();
        assert!(!FsResumeIndex.is_complete(&dest).await);
    }

    #[tokio::test]
    async fn test_directory_is_not_complete() {
        let dir = TempDir::new().unwrap();
        assert!(!FsResumeIndex.is_complete(dir.path()).await);
    }

    #[test]
    fn test_partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/a/1950/D1950031401.pdf")),
            PathBuf::from("/a/1950/D1950031401.pdf.part")
        );
    }
}
