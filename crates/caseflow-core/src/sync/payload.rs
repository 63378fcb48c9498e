//! Wire bodies for the case service and reconciliation of its responses.
//!
//! Requests and responses are camelCase JSON with RFC 3339 timestamps.
//! Responses are read leniently: every field but `id` is optional, and a
//! field the server omits keeps its local value.

use serde::{Deserialize, Serialize};

use crate::models::{AttachmentRecord, CaseRecord, NoteRecord, RecordKey};
use crate::util::{millis_to_rfc3339, rfc3339_to_millis};

use super::qr::QrCaseId;

/// Body of `POST /api/cases` and `PUT /api/cases/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CasePayload {
    pub title: String,
    pub client_name: String,
    pub client_phone: String,
    pub device_type: String,
    pub device_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    pub issue_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technician_name: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&CaseRecord> for CasePayload {
    fn from(case: &CaseRecord) -> Self {
        Self {
            title: case.title.clone(),
            client_name: case.client_name.clone(),
            client_phone: case.client_phone.clone(),
            device_type: case.device_type.clone(),
            device_model: case.device_model.clone(),
            serial_number: case.serial_number.clone(),
            status: case.status.clone(),
            priority: case.priority.clone(),
            issue_description: case.issue_description.clone(),
            diagnosis: case.diagnosis.clone(),
            solution: case.solution.clone(),
            case_number: case.case_number.clone(),
            technician_name: case.technician_name.clone(),
            created_at: millis_to_rfc3339(case.created_at),
            updated_at: millis_to_rfc3339(case.updated_at),
        }
    }
}

/// Timestamp as sent by the server: RFC 3339 text or Unix milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum WireTimestamp {
    Millis(i64),
    Text(String),
}

impl WireTimestamp {
    pub fn to_millis(&self) -> Option<i64> {
        match self {
            Self::Millis(millis) => Some(*millis),
            Self::Text(text) => rfc3339_to_millis(text),
        }
    }
}

fn timestamp_or(value: Option<&WireTimestamp>, local: i64) -> i64 {
    value.and_then(WireTimestamp::to_millis).unwrap_or(local)
}

/// Canonical case returned by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCase {
    pub id: i64,
    pub title: Option<String>,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub device_type: Option<String>,
    pub device_model: Option<String>,
    pub serial_number: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub issue_description: Option<String>,
    pub diagnosis: Option<String>,
    pub solution: Option<String>,
    pub case_number: Option<String>,
    pub technician_name: Option<String>,
    pub created_at: Option<WireTimestamp>,
    pub updated_at: Option<WireTimestamp>,
}

/// Server representation of `local`, keyed by the server id and clean.
pub fn reconcile_case(local: &CaseRecord, server: ServerCase) -> CaseRecord {
    CaseRecord {
        key: RecordKey::Server(server.id),
        title: server.title.unwrap_or_else(|| local.title.clone()),
        client_name: server.client_name.unwrap_or_else(|| local.client_name.clone()),
        client_phone: server.client_phone.unwrap_or_else(|| local.client_phone.clone()),
        device_type: server.device_type.unwrap_or_else(|| local.device_type.clone()),
        device_model: server.device_model.unwrap_or_else(|| local.device_model.clone()),
        serial_number: server.serial_number.or_else(|| local.serial_number.clone()),
        status: server.status.unwrap_or_else(|| local.status.clone()),
        priority: server.priority.or_else(|| local.priority.clone()),
        issue_description: server
            .issue_description
            .unwrap_or_else(|| local.issue_description.clone()),
        diagnosis: server.diagnosis.or_else(|| local.diagnosis.clone()),
        solution: server.solution.or_else(|| local.solution.clone()),
        case_number: server.case_number.or_else(|| local.case_number.clone()),
        technician_name: server
            .technician_name
            .or_else(|| local.technician_name.clone()),
        created_at: timestamp_or(server.created_at.as_ref(), local.created_at),
        updated_at: timestamp_or(server.updated_at.as_ref(), local.updated_at),
        needs_sync: false,
        sync_error: None,
        revision: local.revision,
    }
}

/// Body of `POST /api/notes` and `PUT /api/notes/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotePayload {
    pub case_id: i64,
    pub text: String,
    pub created_by: String,
    pub created_at: String,
}

impl NotePayload {
    pub fn new(note: &NoteRecord, case_id: i64) -> Self {
        Self {
            case_id,
            text: note.text.clone(),
            created_by: note.created_by.clone(),
            created_at: millis_to_rfc3339(note.created_at),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerNote {
    pub id: i64,
    pub case_id: Option<i64>,
    pub text: Option<String>,
    pub created_by: Option<String>,
    pub created_at: Option<WireTimestamp>,
}

pub fn reconcile_note(local: &NoteRecord, server: ServerNote) -> NoteRecord {
    NoteRecord {
        key: RecordKey::Server(server.id),
        case_key: server.case_id.map_or(local.case_key, RecordKey::Server),
        text: server.text.unwrap_or_else(|| local.text.clone()),
        created_by: server.created_by.unwrap_or_else(|| local.created_by.clone()),
        created_at: timestamp_or(server.created_at.as_ref(), local.created_at),
        needs_sync: false,
        sync_error: None,
    }
}

/// The `metadata` part of an attachment upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentMetadata {
    pub case_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub size: i64,
}

/// Multipart upload of an attachment: metadata plus the file bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct AttachmentUpload {
    pub metadata: AttachmentMetadata,
    pub data: Vec<u8>,
}

impl std::fmt::Debug for AttachmentUpload {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("AttachmentUpload")
            .field("metadata", &self.metadata)
            .field("data", &format_args!("<{} bytes>", self.data.len()))
            .finish()
    }
}

impl AttachmentUpload {
    pub fn new(attachment: &AttachmentRecord, case_id: i64) -> Self {
        Self {
            metadata: AttachmentMetadata {
                case_id,
                name: attachment.name.clone(),
                mime_type: attachment.mime_type.clone(),
                size: attachment.size_bytes,
            },
            data: attachment.data.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerAttachment {
    pub id: i64,
    pub case_id: Option<i64>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub mime_type: Option<String>,
    pub size: Option<i64>,
    pub created_at: Option<WireTimestamp>,
}

/// Server representation of `local`; the local file bytes are kept.
pub fn reconcile_attachment(local: &AttachmentRecord, server: ServerAttachment) -> AttachmentRecord {
    AttachmentRecord {
        key: RecordKey::Server(server.id),
        case_key: server.case_id.map_or(local.case_key, RecordKey::Server),
        name: server.name.unwrap_or_else(|| local.name.clone()),
        mime_type: server.mime_type.unwrap_or_else(|| local.mime_type.clone()),
        size_bytes: server.size.unwrap_or(local.size_bytes),
        data: local.data.clone(),
        created_at: timestamp_or(server.created_at.as_ref(), local.created_at),
        needs_sync: false,
        sync_error: None,
    }
}

/// Body of `POST /api/qr-scans`; also stored as the queue item payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrScanLog {
    pub case_id: QrCaseId,
    pub case_name: String,
    pub scan_time: String,
}
