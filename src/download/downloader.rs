//! Resumable, atomic download of a single document.

use std::path::Path;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::error::DownloadError;
use super::manifest::{ResumeIndex, partial_path};
use crate::fetch::{FetchError, HttpFetcher, RetryPolicy, run_with_retry};
use crate::pacing::RateLimiter;
use crate::quota::QuotaTracker;

/// Result of one document download.
#[derive(Debug)]
pub enum DownloadOutcome {
    /// The body was written and moved into place.
    Downloaded {
        /// Bytes written.
        bytes: u64,
    },
    /// The destination already held a finished document; no request was sent.
    SkippedExisting,
    /// The budget ran out before this document could start.
    QuotaExhausted,
    /// Every attempt failed.
    Failed(DownloadError),
    /// Another link already claimed the same destination in this run.
    Duplicate,
    /// Cancellation was requested before the request was sent.
    Cancelled,
}

impl DownloadOutcome {
    /// True when a network download was attempted (downloaded or failed).
    #[must_use]
    pub fn was_attempted(&self) -> bool {
        matches!(self, Self::Downloaded { .. } | Self::Failed(_))
    }
}

/// Downloads documents into their deterministic destinations.
///
/// - an existing destination is skipped without any request;
/// - the body streams into `{dest}.part` and is renamed to `dest` only once
///   complete, so an interrupted run never leaves a file that looks finished;
/// - only a completed download commits quota.
#[derive(Debug, Clone)]
pub struct Downloader {
    fetcher: HttpFetcher,
    retry_policy: RetryPolicy,
    pacer: Arc<RateLimiter>,
    index: Arc<dyn ResumeIndex>,
}

impl Downloader {
    /// Creates a downloader.
    #[must_use]
    pub fn new(
        fetcher: HttpFetcher,
        retry_policy: RetryPolicy,
        pacer: Arc<RateLimiter>,
        index: Arc<dyn ResumeIndex>,
    ) -> Self {
        Self {
            fetcher,
            retry_policy,
            pacer,
            index,
        }
    }

    /// Downloads `url` into `dest`, charging `quota` on success.
    ///
    /// Once `cancel` fires no request is sent; a request already in flight
    /// runs to completion.
    #[instrument(skip(self, quota, cancel), fields(path = %dest.display()))]
    pub async fn download(
        &self,
        url: &str,
        dest: &Path,
        quota: &Arc<QuotaTracker>,
        cancel: &CancellationToken,
    ) -> DownloadOutcome {
        if self.index.is_complete(dest).await {
            debug!("already downloaded");
            return DownloadOutcome::SkippedExisting;
        }

        let reserved = tokio::select! {
            biased;
            () = cancel.cancelled() => return DownloadOutcome::Cancelled,
            reserved = quota.reserve() => reserved,
        };
        let Some(permit) = reserved else {
            return DownloadOutcome::QuotaExhausted;
        };

        match run_with_retry(&self.retry_policy, &self.pacer, cancel, url, || {
            self.attempt(url, dest)
        })
        .await
        {
            Ok(bytes) => {
                self.index.record_complete(dest).await;
                permit.commit();
                info!(bytes, "document downloaded");
                DownloadOutcome::Downloaded { bytes }
            }
            Err(error) if error.is_cancelled() => {
                drop(permit);
                debug!("cancelled before request");
                DownloadOutcome::Cancelled
            }
            Err(error) => {
                // Dropping the permit returns the slot to the budget.
                drop(permit);
                warn!(error = %error, "document download failed");
                DownloadOutcome::Failed(error)
            }
        }
    }

    async fn attempt(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        let response = self.fetcher.fetch_stream(url).await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::write(parent, e))?;
        }

        let part = partial_path(dest);
        let bytes = match write_body(response, url, &part).await {
            Ok(bytes) => bytes,
            Err(error) => {
                debug!(path = %part.display(), "removing partial file after error");
                let _ = tokio::fs::remove_file(&part).await;
                return Err(error);
            }
        };

        if let Err(e) = tokio::fs::rename(&part, dest).await {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(DownloadError::write(dest, e));
        }
        Ok(bytes)
    }
}

async fn write_body(
    response: reqwest::Response,
    url: &str,
    part: &Path,
) -> Result<u64, DownloadError> {
    let file = File::create(part)
        .await
        .map_err(|e| DownloadError::write(part, e))?;
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| FetchError::network(url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::write(part, e))?;
        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::write(part, e))?;
    writer
        .get_mut()
        .sync_all()
        .await
        .map_err(|e| DownloadError::write(part, e))?;

    Ok(bytes_written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::download::FsResumeIndex;

    fn downloader() -> Downloader {
        Downloader::new(
            HttpFetcher::new(),
            RetryPolicy::no_retry(),
            Arc::new(RateLimiter::disabled()),
            Arc::new(FsResumeIndex),
        )
    }

    #[tokio::test]
    async fn test_download_writes_file_and_commits_quota() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/DU/1950/3/14/a.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4 body".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("1950").join("D1950031401.pdf");
        let quota = QuotaTracker::new(3);
        let outcome = downloader()
            .download(
                &format!("{}/DU/1950/3/14/a.pdf", server.uri()),
                &dest,
                &quota,
                &CancellationToken::new(),
            )
            .await;

        assert!(matches!(outcome, DownloadOutcome::Downloaded { bytes: 13 }));
        assert_eq!(std::fs::read(&dest).unwrap(), b"%PDF-1.4 body");
        assert!(!partial_path(&dest).exists());
        assert_eq!(quota.downloaded(), 1);
    }

    #[tokio::test]
    async fn test_existing_destination_is_skipped_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("D1950031401.pdf");
        std::fs::write(&dest, b"done").unwrap();
        let quota = QuotaTracker::new(1);

        let outcome = downloader()
            .download(
                &format!("{}/a.pdf", server.uri()),
                &dest,
                &quota,
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(outcome, DownloadOutcome::SkippedExisting));
        assert!(!outcome.was_attempted());
        assert_eq!(quota.remaining(), Some(1));
    }

    #[tokio::test]
    async fn test_http_failure_does_not_consume_quota_or_leave_files() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("D1950031401.pdf");
        let quota = QuotaTracker::new(1);

        let outcome = downloader()
            .download(
                &format!("{}/missing.pdf", server.uri()),
                &dest,
                &quota,
                &CancellationToken::new(),
            )
            .await;
        match outcome {
            DownloadOutcome::Failed(DownloadError::Fetch(FetchError::HttpStatus {
                status, ..
            })) => assert_eq!(status, 404),
            other => panic!("expected HTTP failure, got {other:?}"),
        }
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
        assert_eq!(quota.remaining(), Some(1));
    }

    #[tokio::test]
    async fn test_exhausted_quota_sends_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let quota = QuotaTracker::new(1);
        quota.reserve().await.unwrap().commit();

        let dir = TempDir::new().unwrap();
        let outcome = downloader()
            .download(
                &format!("{}/a.pdf", server.uri()),
                &dir.path().join("D.pdf"),
                &quota,
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(outcome, DownloadOutcome::QuotaExhausted));
    }

    #[tokio::test]
    async fn test_unwritable_destination_is_write_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        // A regular file where the year directory should be.
        let blocker = dir.path().join("1950");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let quota = QuotaTracker::new(1);

        let outcome = downloader()
            .download(
                &format!("{}/a.pdf", server.uri()),
                &blocker.join("D1950031401.pdf"),
                &quota,
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(
            outcome,
            DownloadOutcome::Failed(DownloadError::Write { .. })
        ));
        assert_eq!(quota.downloaded(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_download_sends_no_request_and_keeps_quota() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF".to_vec()))
            .expect(0)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("D1950031401.pdf");
        let quota = QuotaTracker::new(1);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = downloader()
            .download(&format!("{}/a.pdf", server.uri()), &dest, &quota, &cancel)
            .await;
        assert!(matches!(outcome, DownloadOutcome::Cancelled));
        assert!(!outcome.was_attempted());
        assert!(!dest.exists());
        assert_eq!(quota.remaining(), Some(1));
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_for_quota_slot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let quota = QuotaTracker::new(1);
        let held = quota.reserve().await.unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let dir = TempDir::new().unwrap();
        let outcome = downloader()
            .download(
                &format!("{}/a.pdf", server.uri()),
                &dir.path().join("D.pdf"),
                &quota,
                &cancel,
            )
            .await;
        assert!(matches!(outcome, DownloadOutcome::Cancelled));
        drop(held);
        assert_eq!(quota.remaining(), Some(1));
    }
}
