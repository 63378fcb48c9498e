//! Sync status record and sync history

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for counts and LIMIT

use crate::error::Result;
use crate::models::{
    PendingCounts, QueueItemType, QueueStatus, StorageStats, SyncHistoryEntry, SyncState,
    SyncStatus,
};
use crate::util::now_millis;
use rusqlite::types::Type;
use rusqlite::{params, Connection};

use super::{AttachmentRepository, CaseRepository, NoteRepository, QueueRepository};

const STATUS_KEY: &str = "sync-status";

/// Message stored when a pass was cut short by a crash or kill
pub const INTERRUPTED_MESSAGE: &str = "previous sync was interrupted";

/// `SQLite` access to `sync_status` and `sync_history`
pub struct StatusRepository<'a> {
    conn: &'a Connection,
}

impl<'a> StatusRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Read the status record
    pub fn load(&self) -> Result<SyncStatus> {
        let status = self.conn.query_row(
            "SELECT last_sync, status, error, pending_changes, cases_count, notes_count,
                    attachments_count, qr_scans_count
             FROM sync_status WHERE key = ?",
            [STATUS_KEY],
            |row| {
                let state: String = row.get(1)?;
                Ok(SyncStatus {
                    last_sync: row.get(0)?,
                    state: state.parse().map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e))
                    })?,
                    error: row.get(2)?,
                    pending_changes: row.get(3)?,
                    counts: PendingCounts {
                        cases: row.get(4)?,
                        notes: row.get(5)?,
                        attachments: row.get(6)?,
                        qr_scans: row.get(7)?,
                    },
                })
            },
        )?;
        Ok(status)
    }

    /// Persist a new engine state.
    ///
    /// Moving to `Idle` stamps `last_sync` and clears the stored error unless
    /// `error` is given.
    pub fn set_state(&self, state: SyncState, error: Option<&str>) -> Result<()> {
        match state {
            SyncState::Idle => self.conn.execute(
                "UPDATE sync_status SET status = ?, error = ?, last_sync = ? WHERE key = ?",
                params![state.as_str(), error, now_millis(), STATUS_KEY],
            )?,
            SyncState::Syncing | SyncState::Error => self.conn.execute(
                "UPDATE sync_status SET status = ?, error = ? WHERE key = ?",
                params![state.as_str(), error, STATUS_KEY],
            )?,
        };
        Ok(())
    }

    /// Count pending work across every collection
    pub fn count_pending(&self) -> Result<PendingCounts> {
        Ok(PendingCounts {
            cases: CaseRepository::new(self.conn).count_dirty()?,
            notes: NoteRepository::new(self.conn).count_dirty()?,
            attachments: AttachmentRepository::new(self.conn).count_dirty()?,
            qr_scans: QueueRepository::new(self.conn).count_by_type(QueueItemType::QrScan)?,
        })
    }

    /// Recount pending work and store it in the status record
    pub fn refresh_pending_counts(&self) -> Result<PendingCounts> {
        let counts = self.count_pending()?;
        self.conn.execute(
            "UPDATE sync_status
             SET pending_changes = ?, cases_count = ?, notes_count = ?,
                 attachments_count = ?, qr_scans_count = ?
             WHERE key = ?",
            params![
                counts.total() as i64,
                counts.cases as i64,
                counts.notes as i64,
                counts.attachments as i64,
                counts.qr_scans as i64,
                STATUS_KEY,
            ],
        )?;
        Ok(counts)
    }

    /// Dirty records carrying a `sync_error` plus queue items in `error`
    pub fn unresolved_failures(&self) -> Result<usize> {
        Ok(CaseRepository::new(self.conn).count_failed()?
            + NoteRepository::new(self.conn).count_failed()?
            + AttachmentRepository::new(self.conn).count_failed()?
            + QueueRepository::new(self.conn).count_by_status(QueueStatus::Error)?)
    }

    pub fn storage_stats(&self) -> Result<StorageStats> {
        Ok(StorageStats {
            cases: CaseRepository::new(self.conn).count()?,
            notes: NoteRepository::new(self.conn).count()?,
            attachments: AttachmentRepository::new(self.conn).count()?,
            queued_qr_scans: QueueRepository::new(self.conn)
                .count_by_type(QueueItemType::QrScan)?,
        })
    }

    /// Append a finished pass to the history log
    pub fn append_history(
        &self,
        success: bool,
        items_synced: usize,
        items_failed: usize,
        message: &str,
    ) -> Result<SyncHistoryEntry> {
        let timestamp = now_millis();
        self.conn.execute(
            "INSERT INTO sync_history (timestamp, success, items_synced, items_failed, message)
             VALUES (?, ?, ?, ?, ?)",
            params![
                timestamp,
                success,
                items_synced as i64,
                items_failed as i64,
                message
            ],
        )?;

        Ok(SyncHistoryEntry {
            id: self.conn.last_insert_rowid(),
            timestamp,
            success,
            items_synced,
            items_failed,
            message: message.to_string(),
        })
    }

    /// Most recent history entries, newest first
    pub fn history(&self, limit: usize) -> Result<Vec<SyncHistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, timestamp, success, items_synced, items_failed, message
             FROM sync_history
             ORDER BY id DESC
             LIMIT ?",
        )?;
        let entries = stmt
            .query_map([limit as i64], |row| {
                Ok(SyncHistoryEntry {
                    id: row.get(0)?,
                    timestamp: row.get(1)?,
                    success: row.get(2)?,
                    items_synced: row.get(3)?,
                    items_failed: row.get(4)?,
                    message: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Turn a persisted `syncing` state into an `error`; returns whether it did
    pub fn reset_interrupted(&self) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE sync_status SET status = 'error', error = ? WHERE key = ? AND status = 'syncing'",
            params![INTERRUPTED_MESSAGE, STATUS_KEY],
        )?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{NewCase, CaseRecord, QueueAction, SyncQueueItem};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_set_state_transitions() {
        let db = Database::open_in_memory().unwrap();
        let repo = StatusRepository::new(db.connection());

        repo.set_state(SyncState::Syncing, None).unwrap();
        let status = repo.load().unwrap();
        assert_eq!(status.state, SyncState::Syncing);
        assert!(status.last_sync.is_none());

        repo.set_state(SyncState::Error, Some("unreachable")).unwrap();
        assert_eq!(repo.load().unwrap().error.as_deref(), Some("unreachable"));

        repo.set_state(SyncState::Idle, None).unwrap();
        let status = repo.load().unwrap();
        assert_eq!(status.state, SyncState::Idle);
        assert!(status.error.is_none());
        assert!(status.last_sync.is_some());
    }

    #[test]
    fn test_refresh_pending_counts() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();

        let case = CaseRecord::new_local(NewCase {
            title: "Printer jam".to_string(),
            ..NewCase::default()
        })
        .unwrap();
        CaseRepository::new(conn).insert(&case).unwrap();
        QueueRepository::new(conn)
            .insert(&SyncQueueItem::new(
                QueueItemType::QrScan,
                "5",
                QueueAction::Create,
                serde_json::json!({}),
            ))
            .unwrap();

        let repo = StatusRepository::new(conn);
        let counts = repo.refresh_pending_counts().unwrap();
        assert_eq!(
            counts,
            PendingCounts {
                cases: 1,
                notes: 0,
                attachments: 0,
                qr_scans: 1,
            }
        );

        let status = repo.load().unwrap();
        assert_eq!(status.pending_changes, 2);
        assert_eq!(status.counts, counts);
    }

    #[test]
    fn test_history_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let repo = StatusRepository::new(db.connection());

        repo.append_history(true, 3, 0, "first").unwrap();
        let second = repo.append_history(false, 1, 2, "second").unwrap();

        let history = repo.history(10).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], second);
        assert_eq!(history[1].message, "first");
        assert_eq!(repo.history(1).unwrap().len(), 1);
    }

    #[test]
    fn test_reset_interrupted_only_when_syncing() {
        let db = Database::open_in_memory().unwrap();
        let repo = StatusRepository::new(db.connection());

        assert!(!repo.reset_interrupted().unwrap());
        repo.set_state(SyncState::Syncing, None).unwrap();
        assert!(repo.reset_interrupted().unwrap());

        let status = repo.load().unwrap();
        assert_eq!(status.state, SyncState::Error);
        assert_eq!(status.error.as_deref(), Some(INTERRUPTED_MESSAGE));
    }
}
