//! The assets page as seen by the page surface.
//!
//! The page contract: a table whose file rows are `<tbody id="...">`
//! containers; the second cell holds the title anchor, the third the last
//! download date and the fourth the last update date. Processing state is
//! only visible as text rendered inside the row.
use std::collections::HashSet;

use hamster_logging::{hamster_debug, hamster_trace};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use crate::decode::{decode_html, DecodeError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub text: String,
    pub href: String,
}

/// Snapshot of one row container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRow {
    pub id: String,
    /// Whether the row has a second cell at all. Rows without one are not
    /// files and filtering leaves them alone.
    pub has_title_cell: bool,
    /// Full text of the second cell, used for filtering.
    pub title_cell_text: String,
    /// Anchor of the second cell; `None` for rows that are not files.
    pub anchor: Option<Anchor>,
    pub last_downloaded_text: String,
    pub date_updated_text: String,
    /// Whitespace-collapsed text of the whole row, used for state inference.
    pub text: String,
    pub hidden: bool,
}

impl PageRow {
    pub fn new(id: impl Into<String>, title: impl Into<String>, href: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            id: id.into(),
            has_title_cell: true,
            title_cell_text: title.clone(),
            text: title.clone(),
            anchor: Some(Anchor {
                text: title,
                href: href.into(),
            }),
            last_downloaded_text: String::new(),
            date_updated_text: String::new(),
            hidden: false,
        }
    }
}

/// Access to the live assets page. Rows are addressed by container id and
/// every method resolves the id again, so callers never hold element handles.
pub trait AssetsPage: Send {
    /// Addressable rows in document order.
    fn rows(&self) -> &[PageRow];

    fn row(&self, id: &str) -> Option<&PageRow> {
        self.rows().iter().find(|row| row.id == id)
    }

    fn set_hidden(&mut self, id: &str, hidden: bool);

    /// Clicks the title anchor of the row. Returns `false` when the row or
    /// its anchor cannot be found.
    fn click(&mut self, id: &str) -> bool;
}

#[derive(Debug, Error)]
pub enum PageError {
    #[error("invalid row selector {0}")]
    Selector(&'static str),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

struct RowSelectors {
    row: Selector,
    title_cell: Selector,
    anchor: Selector,
    last_downloaded_cell: Selector,
    date_updated_cell: Selector,
}

impl RowSelectors {
    fn new() -> Result<Self, PageError> {
        let parse = |css: &'static str| Selector::parse(css).map_err(|_| PageError::Selector(css));
        Ok(Self {
            row: parse("table > tbody")?,
            title_cell: parse("tr > td:nth-child(2)")?,
            anchor: parse("a")?,
            last_downloaded_cell: parse("td:nth-child(3)")?,
            date_updated_cell: parse("td:nth-child(4)")?,
        })
    }
}

/// An assets page parsed from HTML.
///
/// Clicks are recorded rather than followed; [`HtmlAssetsPage::refresh`]
/// swaps in newer HTML so the vendor's reaction can be observed.
#[derive(Debug, Clone, Default)]
pub struct HtmlAssetsPage {
    rows: Vec<PageRow>,
    clicks: Vec<String>,
}

impl HtmlAssetsPage {
    pub fn parse(html: &str) -> Result<Self, PageError> {
        Ok(Self {
            rows: parse_rows(html)?,
            clicks: Vec::new(),
        })
    }

    pub fn from_bytes(bytes: &[u8], declared_charset: Option<&str>) -> Result<Self, PageError> {
        let decoded = decode_html(bytes, declared_charset)?;
        hamster_debug!("Decoded page as {}", decoded.encoding_label);
        Self::parse(&decoded.html)
    }

    /// Re-reads the page, keeping rows hidden that were hidden before.
    pub fn refresh(&mut self, html: &str) -> Result<(), PageError> {
        let hidden: HashSet<String> = self
            .rows
            .iter()
            .filter(|row| row.hidden)
            .map(|row| row.id.clone())
            .collect();
        let mut rows = parse_rows(html)?;
        for row in &mut rows {
            row.hidden = hidden.contains(&row.id);
        }
        self.rows = rows;
        Ok(())
    }

    /// Ids of clicked rows, in click order.
    pub fn clicks(&self) -> &[String] {
        &self.clicks
    }
}

impl AssetsPage for HtmlAssetsPage {
    fn rows(&self) -> &[PageRow] {
        &self.rows
    }

    fn set_hidden(&mut self, id: &str, hidden: bool) {
        if let Some(row) = self.rows.iter_mut().find(|row| row.id == id) {
            row.hidden = hidden;
        }
    }

    fn click(&mut self, id: &str) -> bool {
        let clickable = self.row(id).is_some_and(|row| row.anchor.is_some());
        if clickable {
            self.clicks.push(id.to_string());
        }
        clickable
    }
}

fn parse_rows(html: &str) -> Result<Vec<PageRow>, PageError> {
    let selectors = RowSelectors::new()?;
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut rows = Vec::new();

    for container in document.select(&selectors.row) {
        let id = container.value().attr("id").map(str::trim).unwrap_or_default();
        if id.is_empty() {
            hamster_trace!("Skipping row container without id");
            continue;
        }
        if !seen.insert(id.to_string()) {
            hamster_debug!("Duplicate row id {id}; keeping the first occurrence");
            continue;
        }

        let title_cell = container.select(&selectors.title_cell).next();
        let anchor = title_cell
            .and_then(|cell| cell.select(&selectors.anchor).next())
            .map(|anchor| Anchor {
                text: collapsed_text(anchor),
                href: anchor.value().attr("href").unwrap_or_default().trim().to_string(),
            });

        rows.push(PageRow {
            id: id.to_string(),
            has_title_cell: title_cell.is_some(),
            title_cell_text: title_cell.map(collapsed_text).unwrap_or_default(),
            anchor,
            last_downloaded_text: cell_text(container, &selectors.last_downloaded_cell),
            date_updated_text: cell_text(container, &selectors.date_updated_cell),
            text: collapsed_text(container),
            hidden: false,
        });
    }

    Ok(rows)
}

fn cell_text(container: ElementRef<'_>, selector: &Selector) -> String {
    container
        .select(selector)
        .next()
        .map(collapsed_text)
        .unwrap_or_default()
}

fn collapsed_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
