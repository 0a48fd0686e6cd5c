//! Error types for cfdi-dl
//!
//! This module provides the error handling for the library:
//! - One crate-level [`Error`] enum carrying the context needed to resume manually
//!   (authentication step, day, window, URL)
//! - Machine-readable error codes via [`ErrorCode`]
//! - A fatal/non-fatal classification used by the retrieval engine

use chrono::NaiveDate;
use thiserror::Error;

use crate::window::QueryWindow;

/// Result type alias for cfdi-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for cfdi-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "fetch.concurrency")
        key: Option<String>,
    },

    /// The portal rejected the tax id / secret pair
    #[error("the tax id or password is incorrect")]
    InvalidCredentials,

    /// A search was attempted before the authentication state machine finished
    #[error("session is not authenticated")]
    NotAuthenticated,

    /// HTTP-layer failure during an authentication step or a search
    #[error("transport error during {step}: {message}")]
    SessionTransport {
        /// The exchange that failed (e.g., "login", "federation", "search")
        step: &'static str,
        /// Description of the underlying failure
        message: String,
    },

    /// Requested period ends before it starts
    #[error("invalid date range: end date {end} is before start date {start}")]
    InvalidDateRange {
        /// First day of the requested period
        start: NaiveDate,
        /// Last day of the requested period
        end: NaiveDate,
    },

    /// Window bounds violate `1 <= start <= end <= 86400`
    #[error("invalid query window: seconds {start}..={end}")]
    InvalidWindow {
        /// First second of the window
        start: u32,
        /// Last second of the window
        end: u32,
    },

    /// Clock components outside `00:00:00..=23:59:59`
    #[error("invalid time of day: {hour:02}:{minute:02}:{second:02}")]
    InvalidClock {
        /// Hour component
        hour: u32,
        /// Minute component
        minute: u32,
        /// Second component
        second: u32,
    },

    /// A fatal error aborted retrieval of a single day
    #[error("retrieval failed at window {window}: {source}")]
    DayFailed {
        /// The day being retrieved
        day: NaiveDate,
        /// The window that was being probed when the error occurred
        window: QueryWindow,
        /// The underlying error
        #[source]
        source: Box<Error>,
    },

    /// A single document could not be downloaded
    #[error("failed to fetch {url}: {reason}")]
    FetchItem {
        /// The document URL
        url: String,
        /// Why the download failed
        reason: String,
    },

    /// Response body could not be interpreted
    #[error("parse error: {0}")]
    Parse(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a [`Error::SessionTransport`] from any displayable failure
    pub fn transport(step: &'static str, err: impl std::fmt::Display) -> Self {
        Error::SessionTransport {
            step,
            message: err.to_string(),
        }
    }

    /// Build a configuration error for a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Whether the error aborts the operation in progress.
    ///
    /// Per-item fetch failures are the only non-fatal kind; they are collected in the
    /// batch report instead of being propagated.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::FetchItem { .. })
    }
}

/// Machine-readable error codes
pub trait ErrorCode {
    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ErrorCode for Error {
    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::InvalidCredentials => "invalid_credentials",
            Error::NotAuthenticated => "not_authenticated",
            Error::SessionTransport { .. } => "session_transport_error",
            Error::InvalidDateRange { .. } => "invalid_date_range",
            Error::InvalidWindow { .. } => "invalid_window",
            Error::InvalidClock { .. } => "invalid_clock",
            Error::DayFailed { .. } => "day_failed",
            Error::FetchItem { .. } => "fetch_item_error",
            Error::Parse(_) => "parse_error",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::Other(_) => "internal_error",
        }
    }
}
