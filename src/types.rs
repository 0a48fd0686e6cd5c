//! Core types for cfdi-dl

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::window::QueryWindow;

/// Portal login credentials (RFC + CIEC).
///
/// The secret is never serialized and is redacted from `Debug` output.
#[derive(Clone)]
pub struct Credentials {
    tax_id: String,
    secret: String,
}

impl Credentials {
    /// Create credentials from a tax id (RFC) and its portal password (CIEC)
    pub fn new(tax_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            tax_id: tax_id.into(),
            secret: secret.into(),
        }
    }

    /// The tax id (RFC)
    pub fn tax_id(&self) -> &str {
        &self.tax_id
    }

    pub(crate) fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("tax_id", &self.tax_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Which side of the invoice the search is performed from
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadType {
    /// Invoices issued by the authenticated taxpayer ("emitidos")
    Issued,
    /// Invoices received by the authenticated taxpayer ("recibidos", default)
    #[default]
    Received,
}

impl DownloadType {
    /// Value of the search-mode radio button on the portal's landing form
    pub fn search_radio(&self) -> &'static str {
        match self {
            DownloadType::Issued => "RdoTipoBusquedaEmisor",
            DownloadType::Received => "RdoTipoBusquedaReceptor",
        }
    }
}

impl fmt::Display for DownloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadType::Issued => write!(f, "issued"),
            DownloadType::Received => write!(f, "received"),
        }
    }
}

/// Voucher state filter
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoucherState {
    /// Only active (valid) vouchers (default)
    #[default]
    Active,
    /// Only cancelled vouchers
    Cancelled,
}

impl VoucherState {
    /// Value of the state drop-down on the search form
    pub fn form_value(&self) -> &'static str {
        match self {
            VoucherState::Active => "1",
            VoucherState::Cancelled => "0",
        }
    }

    /// Map the `cancelled` configuration flag to a voucher state
    pub fn from_cancelled(cancelled: bool) -> Self {
        if cancelled {
            VoucherState::Cancelled
        } else {
            VoucherState::Active
        }
    }
}

/// One invoice row from the portal's result table
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Fiscal folio (UUID), the record's identity
    pub document_id: String,
    /// Issuer RFC
    pub issuer_tax_id: String,
    /// Issuer name
    pub issuer_name: String,
    /// Receiver RFC
    pub receiver_tax_id: String,
    /// Receiver name
    pub receiver_name: String,
    /// Issue date as shown by the portal
    pub issue_date: String,
    /// Certification date as shown by the portal
    pub certification_date: String,
    /// RFC of the certifying provider (PAC)
    pub certifying_provider: String,
    /// Invoice total as shown by the portal
    pub total: String,
    /// Voucher effect (ingreso, egreso, ...)
    pub document_effect: String,
    /// Voucher state (vigente, cancelado)
    pub voucher_state: String,
    /// Cancellation date, only reported in received mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_date: Option<String>,
    /// Absolute URL of the XML download, if the row carried one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_url: Option<String>,
}

/// Records keyed by document id, iterated in order of first insertion.
///
/// Re-inserting an existing id overwrites the stored fields in place.
#[derive(Clone, Debug, Default)]
pub struct RecordSet {
    index: HashMap<String, usize>,
    records: Vec<Record>,
}

impl RecordSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a record. Returns `true` if the id was new.
    pub fn insert(&mut self, record: Record) -> bool {
        match self.index.get(&record.document_id) {
            Some(&pos) => {
                self.records[pos] = record;
                false
            }
            None => {
                self.index
                    .insert(record.document_id.clone(), self.records.len());
                self.records.push(record);
                true
            }
        }
    }

    /// Merge another set into this one (last write wins)
    pub fn extend(&mut self, records: impl IntoIterator<Item = Record>) {
        for record in records {
            self.insert(record);
        }
    }

    /// Look up a record by document id
    pub fn get(&self, document_id: &str) -> Option<&Record> {
        self.index.get(document_id).map(|&pos| &self.records[pos])
    }

    /// Number of distinct document ids
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Remove every record
    pub fn clear(&mut self) {
        self.index.clear();
        self.records.clear();
    }

    /// Iterate records in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// Document URLs, one per record that has one, in record order
    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.records.iter().filter_map(|r| r.document_url.as_deref())
    }

    /// Consume the set into its records
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

/// Row count reported by a single probe
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "rows", rename_all = "snake_case")]
pub enum ProbeCount {
    /// The page contained this many data rows
    Rows(usize),
    /// The page did not contain a recognizable result table
    Unknown,
}

impl ProbeCount {
    /// Whether the count proves the window is complete
    pub fn is_below(&self, cap: usize) -> bool {
        matches!(self, ProbeCount::Rows(n) if *n < cap)
    }

    /// Row count, treating `Unknown` as zero
    pub fn rows(&self) -> usize {
        match self {
            ProbeCount::Rows(n) => *n,
            ProbeCount::Unknown => 0,
        }
    }
}

impl fmt::Display for ProbeCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeCount::Rows(n) => write!(f, "{n}"),
            ProbeCount::Unknown => write!(f, "unknown"),
        }
    }
}

/// A single-second window was accepted even though it may be truncated
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OverflowEvent {
    /// Count reported for the window
    pub count: ProbeCount,
    /// The collapsed window
    pub window: QueryWindow,
}

/// An accepted window, reported once per window
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WindowReport {
    /// The accepted window
    pub window: QueryWindow,
    /// Count reported for the window
    pub count: ProbeCount,
    /// Whether the window was accepted through the single-second escape hatch
    pub overflow: bool,
}

/// Totals for a retrieval run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RetrievalSummary {
    /// Days retrieved
    pub days: usize,
    /// Searches issued against the portal
    pub queries: usize,
    /// Windows accepted
    pub windows: usize,
    /// Windows accepted through the overflow escape hatch
    pub overflows: usize,
    /// Distinct records held after the run
    pub records: usize,
}

/// A successfully downloaded document
#[derive(Clone, Debug)]
pub struct FetchedDocument {
    /// Response body
    pub body: bytes::Bytes,
    /// Filename from content-disposition, or a synthesized `<uuid>.xml`
    pub filename: String,
}

/// Outcome of one URL in a bulk fetch
#[derive(Debug)]
pub struct FetchOutcome {
    /// The requested URL
    pub url: String,
    /// The document or the per-item failure
    pub result: std::result::Result<FetchedDocument, crate::error::Error>,
}

/// Completion report for a bulk fetch
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// URLs downloaded successfully, with the filename handed to the sink
    pub succeeded: Vec<(String, String)>,
    /// URLs that failed, with the failure message
    pub failed: Vec<(String, String)>,
}

impl FetchReport {
    /// Number of URLs processed
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}
