//! Errors from the log store.

use thiserror::Error;

/// Errors from opening or scanning the log file.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StoreError {
    /// The log file could not be read.
    #[error("log file unreadable: {0}")]
    Io(#[from] std::io::Error),

    /// The log file has no header line.
    #[error("log file is empty: no header line")]
    EmptyFile,

    /// The search pattern is not a valid regular expression.
    /// Raised before any scanning starts.
    #[error("invalid search pattern: {0}")]
    InvalidPattern(String),

    /// A requested column does not exist in the header.
    #[error("unknown column '{name}'; available: {available}")]
    UnknownColumn {
        /// The column that was requested.
        name: String,
        /// Comma-separated available column names.
        available: String,
    },

    /// The scan was cancelled cooperatively.
    #[error("scan cancelled")]
    Cancelled,

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}
