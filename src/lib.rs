//! # cfdi-dl
//!
//! Retrieval library for the SAT CFDI invoice portal, which has no public API and
//! silently caps every query at 500 rows.
//!
//! ## Design Philosophy
//!
//! cfdi-dl is designed to be:
//! - **Complete** - Days are split into windows until every window is provably under the
//!   portal's cap, so no invoice is lost to silent truncation
//! - **Sensible defaults** - Production endpoints, 500-row cap, 10 concurrent downloads
//! - **Library-first** - No CLI, purely a Rust crate for embedding
//! - **Observable** - Truncation risk is reported through an observer, never swallowed
//!
//! ## Quick Start
//!
//! ```no_run
//! use cfdi_dl::{BulkFetcher, Config, Credentials, DirectorySink, RetrievalEngine, SessionClient};
//! use chrono::NaiveDate;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!
//!     let mut session = SessionClient::new(&config)?;
//!     session
//!         .authenticate(&Credentials::new("XAXX010101000", "ciec"))
//!         .await?;
//!     let client = session.http_client().clone();
//!
//!     let mut engine = RetrievalEngine::new(session, &config);
//!     let warn_overflow = |event: &cfdi_dl::OverflowEvent| {
//!         eprintln!("possibly truncated: {} ({} rows)", event.window, event.count);
//!     };
//!     let summary = engine
//!         .download_period(
//!             NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
//!             NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
//!             Some(&warn_overflow),
//!         )
//!         .await?;
//!     println!("{} records in {} queries", summary.records, summary.queries);
//!
//!     let mut sink = DirectorySink::from_config(&config.fetch).await?;
//!     let report = BulkFetcher::from_config(client, &config.fetch)
//!         .fetch_into(engine.urls(), &mut sink)
//!         .await;
//!     println!("{} downloaded, {} failed", report.succeeded.len(), report.failed.len());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Retrieval engine driving the range splitter per day
pub mod engine;
/// Error types
pub mod error;
/// Bounded-concurrency document download
pub mod fetcher;
/// Query filters and their form encodings
pub mod filters;
/// Hidden form field extraction and carry-over
pub mod form;
/// Result-table parsing
pub mod parser;
/// Retry logic with exponential backoff
pub mod retry;
/// Portal session and authentication state machine
pub mod session;
/// Adaptive range splitting
pub mod splitter;
/// Core types
pub mod types;
/// Filename and path helpers
pub mod utils;
/// Query windows and the seconds/clock codec
pub mod window;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use config::{Config, FetchConfig, FileCollisionAction, PortalConfig, RetryConfig, SearchConfig};
pub use engine::{RetrievalEngine, RetrievalObserver};
pub use error::{Error, ErrorCode, Result};
pub use fetcher::{BulkFetcher, DirectorySink};
pub use filters::{FilterEncoder, IssuedFilters, QueryFilter, ReceivedFilters};
pub use session::{AuthState, PortalSearch, SessionClient};
pub use splitter::RangeSplitter;
pub use types::{
    Credentials, DownloadType, FetchOutcome, FetchReport, FetchedDocument, OverflowEvent,
    ProbeCount, Record, RecordSet, RetrievalSummary, VoucherState, WindowReport,
};
pub use window::{Clock, QueryWindow};
