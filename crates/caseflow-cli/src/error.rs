use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] caseflow_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Note text cannot be empty")]
    EmptyNote,
    #[error("Case not found: {0}")]
    CaseNotFound(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "Sync is not configured. Run `caseflow config init --api-url <URL>` or set CASEFLOW_API_URL."
    )]
    SyncNotConfigured,
}
