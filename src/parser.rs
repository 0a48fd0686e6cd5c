//! Result-table parsing
//!
//! Turns a search result page into [`Record`]s and the row count the range splitter
//! needs. A page without the result container is reported as [`ProbeCount::Unknown`]
//! rather than as zero rows, so a broken or unexpected page is never mistaken for a
//! complete window.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{DownloadType, ProbeCount, Record};

/// Data cells a row needs before it can be projected (button cell + 11 fields)
const MIN_CELLS: usize = 12;

/// A parsed result page
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedPage {
    /// Data rows on the page, or `Unknown` if there was no result table
    pub count: ProbeCount,
    /// Rows projected into records, in page order
    pub records: Vec<Record>,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::Parse(format!("invalid selector '{css}': {e}")))
}

fn cell_text(cell: &ElementRef<'_>) -> String {
    cell.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a result page.
///
/// Header rows (first cell is a `<th>`) are not counted. Rows with too few cells are
/// counted but not projected. `cancellation_date` is only read in received mode and
/// `document_url` is resolved against `portal_url`.
pub fn parse_results(
    html: &str,
    download_type: DownloadType,
    portal_url: &str,
) -> Result<ParsedPage> {
    let document = Html::parse_document(html);
    let container = selector("#DivContenedor")?;
    let rows = selector("#DivContenedor div table tr")?;
    let button = selector(".BtnDescarga")?;
    let link = Regex::new(r"AccionCfdi\('([^']+)'")
        .map_err(|e| Error::Parse(format!("invalid link pattern: {e}")))?;
    let base = url::Url::parse(portal_url).ok();

    if document.select(&container).next().is_none() {
        debug!("result page has no result container");
        return Ok(ParsedPage {
            count: ProbeCount::Unknown,
            records: Vec::new(),
        });
    }

    let mut data_rows = 0;
    let mut records = Vec::new();

    for row in document.select(&rows) {
        let row_cells: Vec<ElementRef<'_>> = row
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|cell| matches!(cell.value().name(), "th" | "td"))
            .collect();
        let Some(first) = row_cells.first() else {
            continue;
        };
        if first.value().name() == "th" {
            continue;
        }
        data_rows += 1;

        if row_cells.len() < MIN_CELLS {
            debug!(cells = row_cells.len(), "skipping short result row");
            continue;
        }
        let text = |i: usize| row_cells.get(i).map(cell_text).unwrap_or_default();

        let document_id = text(1);
        if document_id.is_empty() {
            debug!("skipping result row without a document id");
            continue;
        }

        let document_url = first
            .select(&button)
            .next()
            .and_then(|b| b.value().attr("onclick"))
            .and_then(|onclick| link.captures(onclick))
            .and_then(|caps| caps.get(1))
            .and_then(|path| resolve(base.as_ref(), portal_url, path.as_str()));

        let cancellation_date = match download_type {
            DownloadType::Received => Some(text(12)).filter(|d| !d.is_empty()),
            DownloadType::Issued => None,
        };

        records.push(Record {
            document_id,
            issuer_tax_id: text(2),
            issuer_name: text(3),
            receiver_tax_id: text(4),
            receiver_name: text(5),
            issue_date: text(6),
            certification_date: text(7),
            certifying_provider: text(8),
            total: text(9),
            document_effect: text(10),
            voucher_state: text(11),
            cancellation_date,
            document_url,
        });
    }

    Ok(ParsedPage {
        count: ProbeCount::Rows(data_rows),
        records,
    })
}

fn resolve(base: Option<&url::Url>, portal_url: &str, path: &str) -> Option<String> {
    match base {
        Some(base) => base.join(path).ok().map(String::from),
        None => Some(format!("{portal_url}{path}")),
    }
}
