//! Mock archive shared by the integration tests.
//!
//! Serves year, issue and position pages shaped like the real archive, plus
//! small PDF bodies, from a local wiremock server.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use harvester_core::{HarvestOptions, RateLimiter, RetryPolicy, SiteLayout};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Body served for every document.
pub const PDF_BODY: &[u8] = b"%PDF-1.4\n%test document\n";

/// A wiremock server dressed up as the gazette archive.
pub struct MockArchive {
    pub server: MockServer,
}

impl MockArchive {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Options pointing at this archive: no pacing, no retries.
    pub fn options(&self, output_dir: &Path) -> HarvestOptions {
        HarvestOptions {
            site: SiteLayout::new(&self.uri()).unwrap(),
            retry_policy: RetryPolicy::no_retry(),
            rate_limiter: Arc::new(RateLimiter::disabled()),
            ..HarvestOptions::new(output_dir)
        }
    }

    /// A flat year page listing `documents` PDFs, interleaved with
    /// navigation and links to another year.
    pub async fn flat_year(&self, year: u16, documents: u32) {
        let mut body = String::from("<html><body><nav>");
        body.push_str(&format!(r#"<a href="/DU/rok/{}">prev</a>"#, year - 1));
        body.push_str(&format!(
            r#"<a href="/DU/{0}/1/D{0}0000000101.pdf">other year</a></nav><table id="c_table"><tbody>"#,
            year - 1
        ));
        for n in 1..=documents {
            let href = flat_document_path(year, n);
            body.push_str(&format!(
                r#"<tr><td class="numberAlign"><a href="/DU/{year}/{n}">{n}</a></td><td><a href="{href}">PDF</a></td></tr>"#
            ));
            self.pdf(&href).await;
        }
        body.push_str("</tbody></table></body></html>");
        self.page(&format!("/DU/rok/{year}"), body).await;
    }

    /// A nested year: every issue in `issues` has `positions` positions with
    /// `documents` PDFs each.
    pub async fn nested_year(&self, year: u16, issues: &[u32], positions: u32, documents: u32) {
        let mut year_page = String::from(r#"<html><body><table id="c_table"><tbody>"#);
        for &journal in issues {
            year_page.push_str(&format!(
                r#"<tr><td class="numberAlign"><a href="/DU/rok/{year}/wydanie/{journal}">{journal}</a></td></tr>"#
            ));

            let mut issue_page = String::from(r#"<html><body><table id="c_table"><tbody>"#);
            for position in 1..=positions {
                issue_page.push_str(&format!(
                    r#"<tr><td class="numberAlign"><a href="/DU/{year}/{journal}/{position}">{position}</a></td></tr>"#
                ));

                let mut position_page = String::from("<html><body>");
                position_page.push_str(r#"<a href="/regulamin.pdf">terms</a>"#);
                for ordinal in 1..=documents {
                    let href = nested_document_path(year, journal, position, ordinal);
                    position_page.push_str(&format!(r#"<a href="{href}">PDF</a>"#));
                    self.pdf(&href).await;
                }
                position_page.push_str("</body></html>");
                self.page(&format!("/DU/{year}/{journal}/{position}"), position_page)
                    .await;
            }
            issue_page.push_str("</tbody></table></body></html>");
            self.page(&format!("/DU/rok/{year}/wydanie/{journal}"), issue_page)
                .await;
        }
        year_page.push_str("</tbody></table></body></html>");
        self.page(&format!("/DU/rok/{year}"), year_page).await;
    }

    /// Makes `route` answer with `status`, overriding any other mock.
    pub async fn fail(&self, route: &str, status: u16) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status))
            .with_priority(1)
            .mount(&self.server)
            .await;
    }

    /// Makes `route` fail `failures` times with 503 before serving a PDF.
    pub async fn flaky_pdf(&self, route: &str, failures: usize) -> Arc<AtomicUsize> {
        let counter = Arc::new(AtomicUsize::new(0));
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(FlakyResponder {
                request_count: Arc::clone(&counter),
                fail_count: failures,
            })
            .with_priority(1)
            .mount(&self.server)
            .await;
        counter
    }

    /// Slows every PDF response down so several downloads overlap.
    pub async fn slow_pdfs(&self, delay: Duration) {
        Mock::given(method("GET"))
            .and(wiremock::matchers::path_regex(r"\.pdf$"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(PDF_BODY.to_vec())
                    .set_delay(delay),
            )
            .with_priority(2)
            .mount(&self.server)
            .await;
    }

    /// Number of document requests received so far.
    pub async fn pdf_requests(&self) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path().ends_with(".pdf"))
            .count()
    }

    async fn page(&self, route: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "text/html; charset=utf-8")
                    .set_body_string(body),
            )
            .mount(&self.server)
            .await;
    }

    async fn pdf(&self, route: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "application/pdf")
                    .set_body_bytes(PDF_BODY.to_vec()),
            )
            .mount(&self.server)
            .await;
    }
}

pub fn flat_document_path(year: u16, n: u32) -> String {
    format!("/DU/{year}/{n}/D{year}{n:08}01.pdf")
}

pub fn nested_document_path(year: u16, journal: u32, position: u32, ordinal: u32) -> String {
    format!("/DU/{year}/{journal}/{position}/tekst-{ordinal}.pdf")
}

struct FlakyResponder {
    request_count: Arc<AtomicUsize>,
    fail_count: usize,
}

impl Respond for FlakyResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.request_count.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_count {
            ResponseTemplate::new(503)
        } else {
            ResponseTemplate::new(200).set_body_bytes(PDF_BODY.to_vec())
        }
    }
}
