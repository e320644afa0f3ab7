//! Error types for kfdl
//!
//! This module provides the error handling for the library:
//! - A top-level [`Error`] used by every fallible operation
//! - Domain-specific error types for the ledger and for transfers
//! - A machine-readable [`Error::kind`] used as a structured logging field so
//!   failures can be grouped (resolution, transfer, tagging, ledger I/O, ...)

use chrono::NaiveDate;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for kfdl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for kfdl
///
/// Each variant includes contextual information to help diagnose issues and to
/// safely re-run: the ledger records item identity, the error records the cause.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "max_parallel_downloads")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The feed could not be fetched or parsed
    #[error("feed error: {0}")]
    Feed(String),

    /// The metadata source failed for an item
    #[error("metadata error: {0}")]
    Metadata(String),

    /// Ledger read/parse/write failure
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Transfer-related error
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// Writing tags into a finished file failed
    #[error("tagging error: {0}")]
    Tagging(String),

    /// No candidate URL was reachable and no usable fallback exists
    #[error("no reachable download URL for item {date}")]
    Resolution {
        /// Date key of the item that could not be resolved
        date: NaiveDate,
    },

    /// Shutdown in progress - not accepting new downloads
    #[error("shutdown in progress: not accepting new downloads")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Ledger-related errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The first line is not a supported `kfdl-save` header
    #[error("invalid ledger header: {0:?}")]
    InvalidHeader(String),

    /// A record does not have exactly three tab-separated fields
    #[error("line {line}: expected 3 tab-separated fields, found {found}")]
    FieldCount {
        /// 1-based line number in the ledger file
        line: usize,
        /// Number of fields found on the line
        found: usize,
    },

    /// A record carries a state token that is not one of the known states
    #[error("line {line}: unknown download state {token:?}")]
    UnknownState {
        /// 1-based line number in the ledger file
        line: usize,
        /// The unrecognized token
        token: String,
    },

    /// A record carries a date that is not ISO-8601 (`yyyy-mm-dd`)
    #[error("line {line}: invalid date {value:?}")]
    InvalidDate {
        /// 1-based line number in the ledger file
        line: usize,
        /// The unparseable value
        value: String,
    },

    /// The ledger file could not be read or written
    #[error("ledger file {path}: {source}")]
    Io {
        /// Path of the ledger file
        path: std::path::PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Transfer-related errors
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The server answered with a non-success status
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// URL that was requested
        url: String,
        /// HTTP status code returned by the server
        status: u16,
    },

    /// The transfer did not finish within the configured timeout
    #[error("timed out after {after:?} fetching {url}")]
    Timeout {
        /// URL that was requested
        url: String,
        /// The timeout that elapsed
        after: Duration,
    },

    /// The task performing the transfer panicked
    #[error("download task for {date} panicked")]
    TaskPanicked {
        /// Date key of the item whose task panicked
        date: NaiveDate,
    },
}

impl Error {
    /// Machine-readable failure kind, used as a structured logging field
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config",
            Error::Io(_) => "io",
            Error::Network(_) => "transfer_failure",
            Error::Feed(_) => "feed_failure",
            Error::Metadata(_) => "metadata_failure",
            Error::Ledger(LedgerError::Io { .. }) => "ledger_io_failure",
            Error::Ledger(_) => "ledger_parse_warning",
            Error::Download(_) => "transfer_failure",
            Error::Tagging(_) => "tagging_failure",
            Error::Resolution { .. } => "resolution_failure",
            Error::ShuttingDown => "shutting_down",
            Error::Other(_) => "other",
        }
    }

    /// Build a configuration error for a specific key
    pub(crate) fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}
