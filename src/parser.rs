//! Link extraction from archive pages.
//!
//! All functions here are pure: HTML bytes in, typed link lists out, in
//! document order. Malformed or unrecognised markup never fails; it simply
//! yields no links, and the walker treats an empty list as "nothing here".
//!
//! The archive uses two page shapes for a year:
//!
//! - **flat**: the year page lists document PDFs directly;
//! - **nested**: the year page lists issues (`wydanie`) in the results
//!   table, each issue lists positions, each position lists PDFs.
//!
//! [`classify_year_page`] decides which shape a year page has, once.

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::years::Year;

/// Anchor cells of the archive results table.
const TABLE_LINK_SELECTOR: &str = "#c_table tbody tr td.numberAlign a";

/// Every anchor with an href.
const ANY_LINK_SELECTOR: &str = "a[href]";

/// A document PDF link as found on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfLink {
    /// Raw href, relative or absolute.
    pub href: String,
}

/// An issue listed on a nested year page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueLink {
    /// Journal number, digits only.
    pub journal: String,
}

/// A position listed on an issue page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionLink {
    /// Position number, digits only.
    pub position: String,
    /// Raw href of the position page.
    pub href: String,
}

/// Shape of a year page, decided once per year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum YearLayout {
    /// The year page exposes PDFs directly.
    Flat(Vec<PdfLink>),
    /// The year page lists issues that must be descended into.
    Nested(Vec<IssueLink>),
}

/// A parsed archive page.
pub struct ArchivePage {
    document: Html,
}

impl ArchivePage {
    /// Parses raw page bytes. Invalid UTF-8 is replaced, never rejected.
    #[must_use]
    pub fn parse(html: &[u8]) -> Self {
        Self {
            document: Html::parse_document(&String::from_utf8_lossy(html)),
        }
    }

    /// PDF links under `/DU/{year}/`, in document order.
    ///
    /// Pages embed navigation and links to other years; only hrefs ending in
    /// `.pdf` (any case) that contain the year's path segment are kept.
    #[must_use]
    pub fn pdf_links(&self, year: Year) -> Vec<PdfLink> {
        let scope = year_scope(year);
        self.anchors(ANY_LINK_SELECTOR)
            .filter_map(|a| href_of(&a))
            .filter(|href| is_pdf_href(href) && href.contains(&scope))
            .map(|href| PdfLink { href })
            .collect()
    }

    /// Issue numbers from the results table, in document order.
    #[must_use]
    pub fn issue_links(&self) -> Vec<IssueLink> {
        self.anchors(TABLE_LINK_SELECTOR)
            .filter_map(|a| {
                let text = a.text().collect::<String>();
                let journal = text.trim();
                if is_identifier(journal) {
                    Some(IssueLink {
                        journal: journal.to_string(),
                    })
                } else {
                    warn!(text = journal, "ignoring issue link with non-numeric journal");
                    None
                }
            })
            .collect()
    }

    /// Positions from the results table, in document order.
    ///
    /// The position number is the last path segment of the link target.
    /// Targets are not filtered by year; the documents behind them are.
    #[must_use]
    pub fn position_links(&self, year: Year) -> Vec<PositionLink> {
        let positions: Vec<PositionLink> = self
            .anchors(TABLE_LINK_SELECTOR)
            .filter_map(|a| href_of(&a))
            .filter_map(|href| {
                let position = last_path_segment(&href);
                if is_identifier(position) {
                    Some(PositionLink {
                        position: position.to_string(),
                        href,
                    })
                } else {
                    warn!(href = %href, "ignoring position link with non-numeric target");
                    None
                }
            })
            .collect();
        debug!(year = %year, positions = positions.len(), "position links extracted");
        positions
    }

    /// Classifies a year page as flat (direct PDFs) or nested (issues).
    #[must_use]
    pub fn layout(&self, year: Year) -> YearLayout {
        let pdfs = self.pdf_links(year);
        if pdfs.is_empty() {
            YearLayout::Nested(self.issue_links())
        } else {
            YearLayout::Flat(pdfs)
        }
    }

    fn anchors<'a>(&'a self, css: &str) -> impl Iterator<Item = ElementRef<'a>> + 'a {
        let selector = Selector::parse(css).ok();
        if selector.is_none() {
            warn!(css, "invalid selector; treating page as empty");
        }
        let elements: Vec<ElementRef<'a>> = selector
            .map(|s| self.document.select(&s).collect())
            .unwrap_or_default();
        elements.into_iter()
    }
}

/// PDF links for `year` on any archive page (year page or position page).
#[must_use]
pub fn extract_direct_pdf_links(html: &[u8], year: Year) -> Vec<PdfLink> {
    ArchivePage::parse(html).pdf_links(year)
}

/// Issue numbers listed on a nested year page.
#[must_use]
pub fn extract_issue_links(html: &[u8]) -> Vec<IssueLink> {
    ArchivePage::parse(html).issue_links()
}

/// Positions listed on an issue page.
#[must_use]
pub fn extract_position_links(html: &[u8], year: Year) -> Vec<PositionLink> {
    ArchivePage::parse(html).position_links(year)
}

/// Decides the year page layout.
#[must_use]
pub fn classify_year_page(html: &[u8], year: Year) -> YearLayout {
    ArchivePage::parse(html).layout(year)
}

fn year_scope(year: Year) -> String {
    format!("/DU/{year}/")
}

fn href_of(anchor: &ElementRef<'_>) -> Option<String> {
    anchor
        .value()
        .attr("href")
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(str::to_string)
}

fn is_pdf_href(href: &str) -> bool {
    href.len() >= 4
        && href.is_char_boundary(href.len() - 4)
        && href[href.len() - 4..].eq_ignore_ascii_case(".pdf")
}

fn last_path_segment(href: &str) -> &str {
    let path = href
        .split(['?', '#'])
        .next()
        .unwrap_or(href)
        .trim_end_matches('/');
    path.rsplit('/').next().unwrap_or(path)
}

fn is_identifier(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}
