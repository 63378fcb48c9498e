//! Sync queue model: pending work not backed by a mutable record

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;
use crate::util::now_millis;

/// Kind of entity a queue item refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueItemType {
    Case,
    Note,
    Attachment,
    QrScan,
}

impl QueueItemType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Case => "case",
            Self::Note => "note",
            Self::Attachment => "attachment",
            Self::QrScan => "qr_scan",
        }
    }
}

impl fmt::Display for QueueItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueItemType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "case" => Ok(Self::Case),
            "note" => Ok(Self::Note),
            "attachment" => Ok(Self::Attachment),
            "qr_scan" => Ok(Self::QrScan),
            other => Err(Error::InvalidInput(format!("Unknown queue item type: {other}"))),
        }
    }
}

/// Operation the queue item represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueAction {
    Create,
    Update,
    Delete,
}

impl QueueAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl FromStr for QueueAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(Error::InvalidInput(format!("Unknown queue action: {other}"))),
        }
    }
}

/// Processing state of a queue item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Pending,
    Processing,
    Error,
}

impl QueueStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "error" => Ok(Self::Error),
            other => Err(Error::InvalidInput(format!("Unknown queue status: {other}"))),
        }
    }
}

/// A unit of pending work, e.g. a QR scan recorded while offline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncQueueItem {
    pub id: String,
    pub item_type: QueueItemType,
    /// Target item id (server id or opaque text)
    pub item_id: String,
    pub parent_id: Option<String>,
    pub action: QueueAction,
    /// Arbitrary JSON payload sent with the work item
    pub payload: serde_json::Value,
    /// Enqueue timestamp (Unix ms)
    pub timestamp: i64,
    pub status: QueueStatus,
    pub error_message: Option<String>,
    pub retry_count: u32,
}

impl SyncQueueItem {
    /// Create a pending queue item.
    #[must_use]
    pub fn new(
        item_type: QueueItemType,
        item_id: impl Into<String>,
        action: QueueAction,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: format!("{}-{}", item_type.as_str().replace('_', "-"), Uuid::now_v7()),
            item_type,
            item_id: item_id.into(),
            parent_id: None,
            action,
            payload,
            timestamp: now_millis(),
            status: QueueStatus::Pending,
            error_message: None,
            retry_count: 0,
        }
    }
}

/// Filter for listing queue items; `None` matches everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFilter {
    pub item_type: Option<QueueItemType>,
    pub status: Option<QueueStatus>,
}
