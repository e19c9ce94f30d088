//! Depth-first traversal of one archive year.
//!
//! ```text
//! ScanYear ──flat──────────────────────────────► documents
//!    └──nested──► ScanIssues ──► ScanPositions ──► documents
//! ```
//!
//! Pages are fetched one at a time, in the order their links appear in the
//! HTML, so quota consumption is deterministic for identical page content.
//! Before every fetch and every submission the walker checks cancellation and
//! the remaining quota; once either says stop, nothing new is requested at
//! any depth.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::report::{FailureLevel, YearReport, YearStatus};
use crate::download::{DocumentKey, DocumentLink, DownloadEngine, EngineError};
use crate::fetch::{FetchError, HttpFetcher, RetryPolicy, fetch_with_retry};
use crate::pacing::RateLimiter;
use crate::parser::{self, IssueLink, PdfLink, PositionLink, YearLayout};
use crate::quota::QuotaTracker;
use crate::site::SiteLayout;
use crate::years::Year;

/// Whether traversal may continue after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop(YearStatus),
}

/// Walks the year → issue → position → document hierarchy.
#[derive(Debug, Clone)]
pub struct HierarchyWalker {
    fetcher: HttpFetcher,
    retry_policy: RetryPolicy,
    pacer: Arc<RateLimiter>,
    site: SiteLayout,
    output_dir: PathBuf,
    cancel: CancellationToken,
}

impl HierarchyWalker {
    /// Creates a walker writing under `output_dir`.
    #[must_use]
    pub fn new(
        fetcher: HttpFetcher,
        retry_policy: RetryPolicy,
        pacer: Arc<RateLimiter>,
        site: SiteLayout,
        output_dir: PathBuf,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            fetcher,
            retry_policy,
            pacer,
            site,
            output_dir,
            cancel,
        }
    }

    /// Harvests one year and returns its report once every download it
    /// started has finished.
    ///
    /// Page failures are recorded in the report, never returned.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] only if the download engine itself breaks.
    #[instrument(skip(self, quota, engine), fields(year = %year))]
    pub async fn walk(
        &self,
        year: Year,
        quota: &Arc<QuotaTracker>,
        engine: &mut DownloadEngine,
    ) -> Result<YearReport, EngineError> {
        let mut report = YearReport::new(year);
        let flow = self.scan_year(year, quota, engine, &mut report).await?;

        for task in engine.drain().await {
            report.record_task(task);
        }
        if let Flow::Stop(status) = flow {
            report.mark(status);
        }

        info!(
            status = ?report.status,
            discovered = report.discovered,
            downloaded = report.downloaded,
            skipped = report.skipped_existing,
            failed = report.failed,
            "year finished"
        );
        Ok(report)
    }

    async fn scan_year(
        &self,
        year: Year,
        quota: &Arc<QuotaTracker>,
        engine: &mut DownloadEngine,
        report: &mut YearReport,
    ) -> Result<Flow, EngineError> {
        if let Some(status) = self.stop_reason(quota) {
            return Ok(Flow::Stop(status));
        }

        let url = self.site.year_url(year);
        let body = match self.fetch_page(&url).await {
            Ok(body) => body,
            Err(e) if e.is_cancelled() => return Ok(Flow::Stop(YearStatus::Cancelled)),
            Err(e) => {
                warn!(url = %url, error = %e, "year page failed");
                report.record_failure(FailureLevel::Year, url, e.to_string());
                return Ok(Flow::Stop(YearStatus::YearPageFailed));
            }
        };

        match parser::classify_year_page(&body, year) {
            YearLayout::Flat(links) => {
                info!(documents = links.len(), "flat year page");
                self.harvest_flat(year, &links, quota, engine, report).await
            }
            YearLayout::Nested(issues) => {
                info!(issues = issues.len(), "nested year page");
                if issues.is_empty() {
                    debug!(url = %url, "year page lists neither documents nor issues");
                }
                for issue in &issues {
                    if let Some(status) = self.stop_reason(quota) {
                        return Ok(Flow::Stop(status));
                    }
                    if let Flow::Stop(status) =
                        self.scan_issue(year, issue, quota, engine, report).await?
                    {
                        return Ok(Flow::Stop(status));
                    }
                }
                Ok(Flow::Continue)
            }
        }
    }

    async fn harvest_flat(
        &self,
        year: Year,
        links: &[PdfLink],
        quota: &Arc<QuotaTracker>,
        engine: &mut DownloadEngine,
        report: &mut YearReport,
    ) -> Result<Flow, EngineError> {
        for (ordinal, link) in (1u32..).zip(links) {
            if let Some(status) = self.stop_reason(quota) {
                return Ok(Flow::Stop(status));
            }
            let Some(url) = self.resolve(&link.href, FailureLevel::Document, report) else {
                continue;
            };
            let key = DocumentKey::flat(year, ordinal, &url);
            self.submit(DocumentLink::new(url, key), quota, engine, report)
                .await?;
        }
        Ok(Flow::Continue)
    }

    #[instrument(skip(self, issue, quota, engine, report), fields(journal = %issue.journal))]
    async fn scan_issue(
        &self,
        year: Year,
        issue: &IssueLink,
        quota: &Arc<QuotaTracker>,
        engine: &mut DownloadEngine,
        report: &mut YearReport,
    ) -> Result<Flow, EngineError> {
        let url = self.site.issue_url(year, &issue.journal);
        let body = match self.fetch_page(&url).await {
            Ok(body) => body,
            Err(e) if e.is_cancelled() => return Ok(Flow::Stop(YearStatus::Cancelled)),
            Err(e) => {
                warn!(url = %url, error = %e, "issue page failed; continuing with next issue");
                report.record_failure(FailureLevel::Issue, url, e.to_string());
                return Ok(Flow::Continue);
            }
        };

        let positions = parser::extract_position_links(&body, year);
        debug!(positions = positions.len(), "issue scanned");

        for position in &positions {
            if let Some(status) = self.stop_reason(quota) {
                return Ok(Flow::Stop(status));
            }
            if let Flow::Stop(status) = self
                .scan_position(year, &issue.journal, position, quota, engine, report)
                .await?
            {
                return Ok(Flow::Stop(status));
            }
        }
        Ok(Flow::Continue)
    }

    #[instrument(skip(self, journal, position, quota, engine, report), fields(position = %position.position))]
    async fn scan_position(
        &self,
        year: Year,
        journal: &str,
        position: &PositionLink,
        quota: &Arc<QuotaTracker>,
        engine: &mut DownloadEngine,
        report: &mut YearReport,
    ) -> Result<Flow, EngineError> {
        let Some(url) = self.resolve(&position.href, FailureLevel::Position, report) else {
            return Ok(Flow::Continue);
        };
        let body = match self.fetch_page(&url).await {
            Ok(body) => body,
            Err(e) if e.is_cancelled() => return Ok(Flow::Stop(YearStatus::Cancelled)),
            Err(e) => {
                warn!(url = %url, error = %e, "position page failed; continuing");
                report.record_failure(FailureLevel::Position, url, e.to_string());
                return Ok(Flow::Continue);
            }
        };

        let links = parser::extract_direct_pdf_links(&body, year);
        if links.is_empty() {
            debug!(url = %url, "position lists no documents");
        }

        for (ordinal, link) in (1u32..).zip(&links) {
            if let Some(status) = self.stop_reason(quota) {
                return Ok(Flow::Stop(status));
            }
            let Some(doc_url) = self.resolve(&link.href, FailureLevel::Document, report) else {
                continue;
            };
            let key = DocumentKey::nested(year, journal, &position.position, ordinal);
            self.submit(DocumentLink::new(doc_url, key), quota, engine, report)
                .await?;
        }
        Ok(Flow::Continue)
    }

    async fn submit(
        &self,
        link: DocumentLink,
        quota: &Arc<QuotaTracker>,
        engine: &mut DownloadEngine,
        report: &mut YearReport,
    ) -> Result<(), EngineError> {
        report.discovered += 1;
        let dest = link.destination(&self.output_dir);
        engine.submit(link, dest, quota).await?;
        for task in engine.take_finished() {
            report.record_task(task);
        }
        Ok(())
    }

    async fn fetch_page(&self, url: &str) -> Result<Bytes, FetchError> {
        fetch_with_retry(
            &self.fetcher,
            &self.retry_policy,
            &self.pacer,
            &self.cancel,
            url,
        )
        .await
    }

    fn resolve(&self, href: &str, level: FailureLevel, report: &mut YearReport) -> Option<String> {
        match self.site.resolve(href) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(href, error = %e, "skipping unresolvable link");
                report.record_failure(level, href, e.to_string());
                None
            }
        }
    }

    fn stop_reason(&self, quota: &QuotaTracker) -> Option<YearStatus> {
        if self.cancel.is_cancelled() {
            Some(YearStatus::Cancelled)
        } else if quota.has_remaining() {
            None
        } else {
            Some(YearStatus::StoppedByQuota)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::download::{Downloader, FsResumeIndex};

    struct Fixture {
        walker: HierarchyWalker,
        engine: DownloadEngine,
        dir: TempDir,
    }

    fn fixture(server: &MockServer, cancel: CancellationToken) -> Fixture {
        paced_fixture(server, cancel, RateLimiter::disabled())
    }

    fn paced_fixture(
        server: &MockServer,
        cancel: CancellationToken,
        pacer: RateLimiter,
    ) -> Fixture {
        let dir = TempDir::new().unwrap();
        let pacer = Arc::new(pacer);
        let fetcher = HttpFetcher::new();
        let downloader = Arc::new(Downloader::new(
            fetcher.clone(),
            RetryPolicy::no_retry(),
            Arc::clone(&pacer),
            Arc::new(FsResumeIndex),
        ));
        let engine = DownloadEngine::new(1, downloader, cancel.clone()).unwrap();
        let walker = HierarchyWalker::new(
            fetcher,
            RetryPolicy::no_retry(),
            pacer,
            SiteLayout::new(&server.uri()).unwrap(),
            dir.path().to_path_buf(),
            cancel,
        );
        Fixture {
            walker,
            engine,
            dir,
        }
    }

    async fn serve(server: &MockServer, route: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    async fn serve_pdf(server: &MockServer, route: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4".to_vec()))
            .mount(server)
            .await;
    }

    fn year(value: u16) -> Year {
        Year::new(value).unwrap()
    }

    #[tokio::test]
    async fn test_flat_year_downloads_every_filtered_link() {
        let server = MockServer::start().await;
        serve(
            &server,
            "/DU/rok/2020",
            r#"<a href="/DU/2020/1/D2020000000101.pdf">a</a>
               <a href="/DU/2019/1/D2019000000101.pdf">other year</a>
               <a href="/DU/2020/2/D2020000000201.pdf">b</a>"#,
        )
        .await;
        serve_pdf(&server, "/DU/2020/1/D2020000000101.pdf").await;
        serve_pdf(&server, "/DU/2020/2/D2020000000201.pdf").await;

        let mut f = fixture(&server, CancellationToken::new());
        let report = f
            .walker
            .walk(year(2020), &QuotaTracker::unlimited(), &mut f.engine)
            .await
            .unwrap();

        assert_eq!(report.status, YearStatus::Completed);
        assert_eq!(report.discovered, 2);
        assert_eq!(report.downloaded, 2);
        assert!(f.dir.path().join("2020/D2020000000101.pdf").is_file());
        assert!(f.dir.path().join("2020/D2020000000201.pdf").is_file());
    }

    #[tokio::test]
    async fn test_year_page_failure_ends_year() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let mut f = fixture(&server, CancellationToken::new());
        let report = f
            .walker
            .walk(year(1939), &QuotaTracker::unlimited(), &mut f.engine)
            .await
            .unwrap();

        assert_eq!(report.status, YearStatus::YearPageFailed);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].level, FailureLevel::Year);
        assert!(report.is_failure());
    }

    #[tokio::test]
    async fn test_exhausted_quota_fetches_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let quota = QuotaTracker::new(1);
        quota.reserve().await.unwrap().commit();

        let mut f = fixture(&server, CancellationToken::new());
        let report = f
            .walker
            .walk(year(1950), &quota, &mut f.engine)
            .await
            .unwrap();
        assert_eq!(report.status, YearStatus::StoppedByQuota);
    }

    #[tokio::test]
    async fn test_cancelled_walk_fetches_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut f = fixture(&server, cancel);
        let report = f
            .walker
            .walk(year(1950), &QuotaTracker::unlimited(), &mut f.engine)
            .await
            .unwrap();
        assert_eq!(report.status, YearStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_quota_stops_mid_position() {
        let server = MockServer::start().await;
        serve(
            &server,
            "/DU/rok/1950",
            r#"<table id="c_table"><tbody>
                 <tr><td class="numberAlign"><a href="/DU/rok/1950/wydanie/1">1</a></td></tr>
               </tbody></table>"#,
        )
        .await;
        serve(
            &server,
            "/DU/rok/1950/wydanie/1",
            r#"<table id="c_table"><tbody>
                 <tr><td class="numberAlign"><a href="/DU/1950/1/7">7</a></td></tr>
               </tbody></table>"#,
        )
        .await;
        serve(
            &server,
            "/DU/1950/1/7",
            r#"<a href="/DU/1950/1/7/a.pdf">a</a>
               <a href="/DU/1950/1/7/b.pdf">b</a>
               <a href="/DU/1950/1/7/c.pdf">c</a>"#,
        )
        .await;
        serve_pdf(&server, "/DU/1950/1/7/a.pdf").await;
        serve_pdf(&server, "/DU/1950/1/7/b.pdf").await;
        Mock::given(method("GET"))
            .and(path("/DU/1950/1/7/c.pdf"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut f = fixture(&server, CancellationToken::new());
        let report = f
            .walker
            .walk(year(1950), &QuotaTracker::new(2), &mut f.engine)
            .await
            .unwrap();

        assert_eq!(report.status, YearStatus::StoppedByQuota);
        assert_eq!(report.downloaded, 2);
        assert!(f.dir.path().join("1950/D1950010701.pdf").is_file());
        assert!(f.dir.path().join("1950/D1950010702.pdf").is_file());
        assert!(!f.dir.path().join("1950/D1950010703.pdf").exists());
    }

    #[tokio::test]
    async fn test_cancel_during_page_pacing_stops_without_failure() {
        let server = MockServer::start().await;
        serve(
            &server,
            "/DU/rok/1950",
            r#"<table id="c_table"><tbody>
                 <tr><td class="numberAlign"><a href="/DU/rok/1950/wydanie/1">1</a></td></tr>
               </tbody></table>"#,
        )
        .await;

        let cancel = CancellationToken::new();
        let mut f = paced_fixture(
            &server,
            cancel.clone(),
            RateLimiter::new(std::time::Duration::from_secs(60)),
        );
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let report = f
            .walker
            .walk(year(1950), &QuotaTracker::unlimited(), &mut f.engine)
            .await
            .unwrap();

        assert_eq!(report.status, YearStatus::Cancelled);
        assert!(report.failures.is_empty());
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }
}
