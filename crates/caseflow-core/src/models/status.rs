//! Sync status and history models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Engine-wide sync state persisted in the status record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    #[default]
    Idle,
    Syncing,
    Error,
}

impl SyncState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Syncing => "syncing",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "idle" => Ok(Self::Idle),
            "syncing" => Ok(Self::Syncing),
            "error" => Ok(Self::Error),
            other => Err(Error::InvalidInput(format!("Unknown sync state: {other}"))),
        }
    }
}

/// Dirty record counts per entity type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCounts {
    pub cases: usize,
    pub notes: usize,
    pub attachments: usize,
    /// QR scans still waiting in the sync queue
    pub qr_scans: usize,
}

impl PendingCounts {
    pub const fn total(&self) -> usize {
        self.cases + self.notes + self.attachments + self.qr_scans
    }
}

/// The single process-wide sync status record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    /// Last time a pass finished without a top-level error (Unix ms)
    pub last_sync: Option<i64>,
    pub state: SyncState,
    pub error: Option<String>,
    /// Always `counts.total()` when read from the store
    pub pending_changes: usize,
    pub counts: PendingCounts,
}

/// Append-only record of one finished sync pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncHistoryEntry {
    pub id: i64,
    /// Completion timestamp (Unix ms)
    pub timestamp: i64,
    pub success: bool,
    pub items_synced: usize,
    pub items_failed: usize,
    pub message: String,
}

/// Total records per local collection, regardless of sync state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageStats {
    pub cases: usize,
    pub notes: usize,
    pub attachments: usize,
    pub queued_qr_scans: usize,
}
