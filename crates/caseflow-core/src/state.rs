//! Single sync state shown to the user.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{SyncState, SyncStatus};

/// Sync indicator used by front-ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncIndicator {
    Offline,
    Syncing,
    Synced,
    /// Local changes waiting for the next pass
    Pending,
    Error,
}

impl SyncIndicator {
    /// Collapse connectivity, the status record and the count of failed
    /// items into one state. Offline wins over everything else.
    pub const fn resolve(online: bool, status: &SyncStatus, unresolved_failures: usize) -> Self {
        if !online {
            return Self::Offline;
        }
        match status.state {
            SyncState::Syncing => Self::Syncing,
            SyncState::Error => Self::Error,
            SyncState::Idle if unresolved_failures > 0 => Self::Error,
            SyncState::Idle if status.pending_changes > 0 => Self::Pending,
            SyncState::Idle => Self::Synced,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Pending => "pending",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SyncIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
