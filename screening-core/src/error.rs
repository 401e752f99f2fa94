//! Error types for the screening core

use thiserror::Error;

/// Result type for screening operations
pub type Result<T> = std::result::Result<T, Error>;

/// Structural failures while building the reference index.
///
/// Any of these aborts the whole build; no partial index is produced.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Sanctions list is missing mandatory column: {0}")]
    MissingColumn(String),

    #[error("No valid names found in the sanctions list")]
    EmptyIndex,

    #[error("Sanctions list delimiter must be a single ASCII character, got {0:?}")]
    InvalidDelimiter(char),

    #[error("Sanctions list CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Roster import failures that reject the whole file.
///
/// Row-level problems are never reported here; they are counted in
/// [`crate::roster::RosterImport::skipped`].
#[derive(Error, Debug)]
pub enum RosterError {
    #[error("Unsupported file format: {0}. Use CSV or Excel.")]
    UnsupportedFormat(String),

    #[error("Missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Roster delimiter must be a single ASCII character, got {0:?}")]
    InvalidDelimiter(char),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Roster CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Sanctions list download failures. The caller decides whether to try again.
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Sanctions list download returned HTTP {status}")]
    Status { status: u16 },

    #[error("Sanctions list download returned an empty body")]
    EmptyBody,

    #[error("Sanctions list file not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Crate-level error
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Roster(#[from] RosterError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Background task panicked or was aborted
    #[error("Background task failed: {0}")]
    Task(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Task(err.to_string())
    }
}
