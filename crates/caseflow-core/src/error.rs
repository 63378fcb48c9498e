//! Error types for caseflow-core

use thiserror::Error;

/// Result type alias using caseflow-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in caseflow-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Input that could not be parsed into the expected schema (e.g. a QR payload)
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid client configuration
    #[error("Configuration error: {0}")]
    Config(String),
}
