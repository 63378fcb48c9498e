//! Attachment model

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::now_millis;

use super::key::RecordKey;

/// A file attached to a case, with its bytes kept locally.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    /// Server id once synced, local id before that
    pub key: RecordKey,
    /// Parent case
    pub case_key: RecordKey,
    /// Original file name
    pub name: String,
    /// Content MIME type
    pub mime_type: String,
    /// Attachment size in bytes
    pub size_bytes: i64,
    /// Local copy of the file contents; kept after sync
    pub data: Vec<u8>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    pub needs_sync: bool,
    pub sync_error: Option<String>,
}

impl std::fmt::Debug for AttachmentRecord {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("AttachmentRecord")
            .field("key", &self.key)
            .field("case_key", &self.case_key)
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size_bytes", &self.size_bytes)
            .field("data", &format_args!("<{} bytes>", self.data.len()))
            .field("created_at", &self.created_at)
            .field("needs_sync", &self.needs_sync)
            .field("sync_error", &self.sync_error)
            .finish()
    }
}

impl AttachmentRecord {
    /// Build a dirty, locally-keyed attachment from raw bytes.
    pub fn new_local(
        case_key: RecordKey,
        name: impl Into<String>,
        mime_type: impl Into<String>,
        data: Vec<u8>,
    ) -> Result<Self> {
        let name = name.into().trim().to_string();
        let mime_type = mime_type.into().trim().to_string();

        if name.is_empty() {
            return Err(Error::InvalidInput(
                "Attachment name cannot be empty".to_string(),
            ));
        }
        if mime_type.is_empty() {
            return Err(Error::InvalidInput(
                "Attachment mime_type cannot be empty".to_string(),
            ));
        }
        let size_bytes = i64::try_from(data.len())
            .map_err(|_| Error::InvalidInput("Attachment is too large".to_string()))?;

        Ok(Self {
            key: RecordKey::new_local(),
            case_key,
            name,
            mime_type,
            size_bytes,
            data,
            created_at: now_millis(),
            needs_sync: true,
            sync_error: None,
        })
    }

    /// Build an attachment from a `data:<mime>;base64,<payload>` URL.
    pub fn from_data_url(
        case_key: RecordKey,
        name: impl Into<String>,
        data_url: &str,
    ) -> Result<Self> {
        let (mime_type, data) = decode_data_url(data_url)?;
        Self::new_local(case_key, name, mime_type, data)
    }
}

/// Split a base64 `data:` URL into its MIME type and decoded bytes.
pub fn decode_data_url(data_url: &str) -> Result<(String, Vec<u8>)> {
    let rest = data_url
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| Error::MalformedInput("Invalid data URL format".to_string()))?;
    let (mime_type, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| Error::MalformedInput("Data URL is not base64 encoded".to_string()))?;

    let data = STANDARD
        .decode(payload)
        .map_err(|error| Error::MalformedInput(format!("Invalid base64 payload: {error}")))?;
    let mime_type = if mime_type.is_empty() {
        "application/octet-stream".to_string()
    } else {
        mime_type.to_string()
    };
    Ok((mime_type, data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_new_local() {
        let attachment =
            AttachmentRecord::new_local(RecordKey::Server(1), "photo.png", "image/png", vec![1, 2, 3])
                .unwrap();
        assert_eq!(attachment.size_bytes, 3);
        assert!(attachment.needs_sync);
        assert!(attachment.key.is_local());
    }

    #[test]
    fn test_attachment_validation() {
        let case_key = RecordKey::Server(1);
        assert!(AttachmentRecord::new_local(case_key, "", "image/png", vec![]).is_err());
        assert!(AttachmentRecord::new_local(case_key, "file", " ", vec![]).is_err());
    }

    #[test]
    fn test_from_data_url() {
        let attachment =
            AttachmentRecord::from_data_url(RecordKey::Server(1), "a.txt", "data:text/plain;base64,aGVsbG8=")
                .unwrap();
        assert_eq!(attachment.mime_type, "text/plain");
        assert_eq!(attachment.data, b"hello");
    }

    #[test]
    fn test_decode_data_url_rejects_malformed_input() {
        assert!(matches!(
            decode_data_url("hello"),
            Err(Error::MalformedInput(_))
        ));
        assert!(matches!(
            decode_data_url("data:text/plain,hello"),
            Err(Error::MalformedInput(_))
        ));
        assert!(matches!(
            decode_data_url("data:text/plain;base64,@@@"),
            Err(Error::MalformedInput(_))
        ));
    }

    #[test]
    fn test_debug_hides_payload() {
        let attachment =
            AttachmentRecord::new_local(RecordKey::Server(1), "a.bin", "application/octet-stream", vec![9; 64])
                .unwrap();
        let debug = format!("{attachment:?}");
        assert!(debug.contains("<64 bytes>"));
    }
}
