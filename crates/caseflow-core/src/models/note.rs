//! Case note model

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::now_millis;

use super::key::RecordKey;

/// A free-text note attached to a case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRecord {
    /// Server id once synced, local id before that
    pub key: RecordKey,
    /// Parent case
    pub case_key: RecordKey,
    pub text: String,
    pub created_by: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    pub needs_sync: bool,
    pub sync_error: Option<String>,
}

impl NoteRecord {
    /// Build a dirty, locally-keyed note for the given case.
    pub fn new_local(
        case_key: RecordKey,
        text: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Result<Self> {
        let text = text.into().trim().to_string();
        if text.is_empty() {
            return Err(Error::InvalidInput("Note text cannot be empty".to_string()));
        }

        Ok(Self {
            key: RecordKey::new_local(),
            case_key,
            text,
            created_by: created_by.into().trim().to_string(),
            created_at: now_millis(),
            needs_sync: true,
            sync_error: None,
        })
    }
}
