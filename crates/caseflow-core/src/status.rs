//! Read-side views of sync state for front-ends.

use serde::Serialize;

use crate::db::{
    AttachmentRepository, CaseRepository, NoteRepository, QueueRepository, StatusRepository,
};
use crate::error::Result;
use crate::models::{
    AttachmentRecord, CaseRecord, NoteRecord, QueueFilter, QueueItemType, QueueStatus,
    StorageStats, SyncHistoryEntry, SyncQueueItem, SyncState, SyncStatus,
};
use crate::state::SyncIndicator;
use crate::store::LocalStore;

/// Every record still waiting to be synchronized, with its last error.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PendingChanges {
    pub cases: Vec<CaseRecord>,
    pub notes: Vec<NoteRecord>,
    pub attachments: Vec<AttachmentRecord>,
    pub qr_scans: Vec<SyncQueueItem>,
}

impl PendingChanges {
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
            && self.notes.is_empty()
            && self.attachments.is_empty()
            && self.qr_scans.is_empty()
    }
}

/// Snapshots of the status record, history and queue.
#[derive(Clone)]
pub struct StatusReporter {
    store: LocalStore,
}

impl StatusReporter {
    pub const fn new(store: LocalStore) -> Self {
        Self { store }
    }

    pub async fn status(&self) -> Result<SyncStatus> {
        self.store
            .read(|conn| StatusRepository::new(conn).load())
            .await
    }

    /// The `limit` most recent passes, newest first.
    pub async fn history(&self, limit: usize) -> Result<Vec<SyncHistoryEntry>> {
        self.store
            .read(move |conn| StatusRepository::new(conn).history(limit))
            .await
    }

    pub async fn queue_items(&self, filter: QueueFilter) -> Result<Vec<SyncQueueItem>> {
        self.store
            .read(move |conn| QueueRepository::new(conn).list(filter))
            .await
    }

    pub async fn pending_changes(&self) -> Result<PendingChanges> {
        self.store
            .read(|conn| {
                Ok(PendingChanges {
                    cases: CaseRepository::new(conn).list_dirty()?,
                    notes: NoteRepository::new(conn).list_dirty()?,
                    attachments: AttachmentRepository::new(conn).list_dirty()?,
                    qr_scans: QueueRepository::new(conn).list(QueueFilter {
                        item_type: Some(QueueItemType::QrScan),
                        status: None,
                    })?,
                })
            })
            .await
    }

    pub async fn storage_stats(&self) -> Result<StorageStats> {
        self.store
            .read(|conn| StatusRepository::new(conn).storage_stats())
            .await
    }

    pub async fn indicator(&self, online: bool) -> Result<SyncIndicator> {
        let (status, failures) = self
            .store
            .read(|conn| {
                let repo = StatusRepository::new(conn);
                Ok((repo.load()?, repo.unresolved_failures()?))
            })
            .await?;
        Ok(SyncIndicator::resolve(online, &status, failures))
    }

    /// Drop failed queue items and reset the status to idle.
    ///
    /// Dirty records keep their `sync_error`; they are retried by the next
    /// pass. Returns how many queue items were removed.
    pub async fn clear_errors(&self) -> Result<usize> {
        let removed = self
            .store
            .write(|conn| {
                let removed = QueueRepository::new(conn).delete_by_status(QueueStatus::Error)?;
                let status = StatusRepository::new(conn);
                status.set_state(SyncState::Idle, None)?;
                status.refresh_pending_counts()?;
                Ok(removed)
            })
            .await?;

        tracing::info!("Cleared sync errors ({removed} queue items removed)");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewCase, RecordKey};
    use crate::sync::{QrCaseId, QrScanLog};
    use crate::tracker::ChangeTracker;
    use pretty_assertions::assert_eq;

    fn setup() -> (ChangeTracker, StatusReporter) {
        let store = LocalStore::open_in_memory().unwrap();
        (ChangeTracker::new(store.clone()), StatusReporter::new(store))
    }

    fn scan(case_name: &str) -> QrScanLog {
        QrScanLog {
            case_id: QrCaseId::Number(1),
            case_name: case_name.to_string(),
            scan_time: "2024-01-01T00:00:00.000Z".to_string(),
        }
    }

    async fn add_case(tracker: &ChangeTracker, title: &str) -> CaseRecord {
        tracker
            .add_case(NewCase {
                title: title.to_string(),
                ..NewCase::default()
            })
            .await
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pending_changes_include_sync_errors() {
        let (tracker, reporter) = setup();
        let case = add_case(&tracker, "Noisy fan").await;
        tracker.add_note(case.key, "Needs part", "sam").await.unwrap();
        tracker.add_qr_scan_to_queue(&scan("Fan")).await.unwrap();

        let key = case.key;
        tracker
            .store()
            .write(move |conn| CaseRepository::new(conn).set_sync_error(&key, "HTTP 500: boom"))
            .await
            .unwrap();

        let pending = reporter.pending_changes().await.unwrap();
        assert_eq!(pending.cases.len(), 1);
        assert_eq!(pending.cases[0].sync_error.as_deref(), Some("HTTP 500: boom"));
        assert_eq!(pending.notes.len(), 1);
        assert!(pending.attachments.is_empty());
        assert_eq!(pending.qr_scans.len(), 1);
        assert!(!pending.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn clear_errors_removes_only_failed_queue_items() {
        let (tracker, reporter) = setup();
        let failed = tracker.add_qr_scan_to_queue(&scan("Broken")).await.unwrap();
        let waiting = tracker.add_qr_scan_to_queue(&scan("Waiting")).await.unwrap();
        let case = add_case(&tracker, "Dirty with error").await;

        let (failed_id, key) = (failed.id.clone(), case.key);
        tracker
            .store()
            .write(move |conn| {
                QueueRepository::new(conn).mark_failed(&failed_id, "HTTP 503")?;
                CaseRepository::new(conn).set_sync_error(&key, "HTTP 500")?;
                StatusRepository::new(conn).set_state(SyncState::Error, Some("unreachable"))
            })
            .await
            .unwrap();

        assert_eq!(reporter.clear_errors().await.unwrap(), 1);

        let remaining = reporter.queue_items(QueueFilter::default()).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, waiting.id);

        let status = reporter.status().await.unwrap();
        assert_eq!(status.state, SyncState::Idle);
        assert!(status.error.is_none());
        assert_eq!(status.pending_changes, 2);

        // The dirty case keeps its error for the pending-changes view
        let case = tracker.store().get_case(case.key).await.unwrap().unwrap();
        assert_eq!(case.sync_error.as_deref(), Some("HTTP 500"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn indicator_reflects_failures_and_pending_work() {
        let (tracker, reporter) = setup();
        assert_eq!(reporter.indicator(true).await.unwrap(), SyncIndicator::Synced);
        assert_eq!(reporter.indicator(false).await.unwrap(), SyncIndicator::Offline);

        let case = add_case(&tracker, "Pending").await;
        assert_eq!(reporter.indicator(true).await.unwrap(), SyncIndicator::Pending);

        let key = case.key;
        tracker
            .store()
            .write(move |conn| CaseRepository::new(conn).set_sync_error(&key, "HTTP 400"))
            .await
            .unwrap();
        assert_eq!(reporter.indicator(true).await.unwrap(), SyncIndicator::Error);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn storage_stats_count_every_record() {
        let (tracker, reporter) = setup();
        let case = add_case(&tracker, "Stats").await;
        tracker.add_note(case.key, "one", "sam").await.unwrap();
        tracker
            .add_attachment(case.key, "a.bin", "application/octet-stream", vec![0; 8])
            .await
            .unwrap();
        tracker.add_qr_scan_to_queue(&scan("Q")).await.unwrap();

        let mut clean = CaseRecord::new_local(NewCase {
            title: "Clean".to_string(),
            ..NewCase::default()
        })
        .unwrap();
        clean.key = RecordKey::Server(3);
        clean.needs_sync = false;
        tracker
            .store()
            .write(move |conn| CaseRepository::new(conn).insert(&clean))
            .await
            .unwrap();

        assert_eq!(
            reporter.storage_stats().await.unwrap(),
            StorageStats {
                cases: 2,
                notes: 1,
                attachments: 1,
                queued_qr_scans: 1,
            }
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn history_is_newest_first_and_limited() {
        let (tracker, reporter) = setup();
        tracker
            .store()
            .write(|conn| {
                let repo = StatusRepository::new(conn);
                repo.append_history(true, 1, 0, "older")?;
                repo.append_history(false, 0, 1, "newer")?;
                Ok(())
            })
            .await
            .unwrap();

        let history = reporter.history(1).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].message, "newer");
    }
}
