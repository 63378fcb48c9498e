//! Synchronization of dirty local records with the remote case service.
//!
//! A pass snapshots the dirty keys, then pushes cases, notes, attachments and
//! queued QR scans one at a time. Each item is read, sent and reconciled
//! independently: the store lock is released during every remote call, and a
//! failed item is marked with its error without stopping the pass.

mod payload;
mod qr;
mod remote;
#[cfg(test)]
mod testing;

use std::sync::atomic::{AtomicBool, Ordering};

use crate::db::{
    AttachmentRepository, CaseRepository, NoteRepository, QueueRepository, StatusRepository,
};
use crate::error::Result;
use crate::models::{
    CaseRecord, QueueItemType, QueueStatus, RecordKey, SyncQueueItem, SyncState,
};
use crate::store::LocalStore;

pub use payload::{
    reconcile_attachment, reconcile_case, reconcile_note, AttachmentMetadata, AttachmentUpload,
    CasePayload, NotePayload, QrScanLog, ServerAttachment, ServerCase, ServerNote, WireTimestamp,
};
pub use qr::{process_scanned_code, QrCaseId, QrPayload, ScanOutcome, UNKNOWN_CASE_NAME};
pub use remote::{HttpRemoteApi, RemoteApi, RemoteError};

/// History message for a pass that found nothing to send.
pub const NO_CHANGES_MESSAGE: &str = "No changes to synchronize";

/// Summary of one finished pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub synced: usize,
    pub failed: usize,
    /// True only when nothing failed
    pub success: bool,
    pub message: String,
}

/// Result of asking the engine to sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed(SyncReport),
    /// Another pass was running; nothing was done
    AlreadyRunning,
}

impl SyncOutcome {
    pub const fn report(&self) -> Option<&SyncReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::AlreadyRunning => None,
        }
    }
}

/// Releases the in-progress flag on every exit path.
struct PassGuard<'a>(&'a AtomicBool);

impl<'a> PassGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug, Default)]
struct Tally {
    synced: usize,
    failed: usize,
    attempted: usize,
    network_failures: usize,
}

impl Tally {
    fn succeeded(&mut self) {
        self.attempted += 1;
        self.synced += 1;
    }

    fn remote_failed(&mut self, error: &RemoteError) {
        self.attempted += 1;
        self.failed += 1;
        if error.is_network() {
            self.network_failures += 1;
        }
    }

    /// Failed without a remote call (e.g. parent case still local)
    fn skipped(&mut self) {
        self.failed += 1;
    }

    /// Something was tried, nothing got through, and only the transport failed
    const fn unreachable(&self) -> bool {
        self.attempted > 0 && self.synced == 0 && self.network_failures == self.attempted
    }
}

struct DirtySet {
    cases: Vec<RecordKey>,
    notes: Vec<RecordKey>,
    attachments: Vec<RecordKey>,
    scans: Vec<SyncQueueItem>,
}

impl DirtySet {
    fn is_empty(&self) -> bool {
        self.cases.is_empty()
            && self.notes.is_empty()
            && self.attachments.is_empty()
            && self.scans.is_empty()
    }
}

fn parent_not_synced(case_key: &RecordKey) -> String {
    format!("parent case {case_key} has not been synchronized yet")
}

/// Pushes local changes to the server; at most one pass runs at a time.
pub struct SyncEngine<R> {
    store: LocalStore,
    remote: R,
    max_queue_retries: u32,
    in_progress: AtomicBool,
}

impl<R: RemoteApi> SyncEngine<R> {
    pub const fn new(store: LocalStore, remote: R) -> Self {
        Self {
            store,
            remote,
            max_queue_retries: crate::config::DEFAULT_MAX_QUEUE_RETRIES,
            in_progress: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub const fn with_max_queue_retries(mut self, retries: u32) -> Self {
        self.max_queue_retries = retries;
        self
    }

    pub const fn remote(&self) -> &R {
        &self.remote
    }

    pub const fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn is_running(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Run one pass, or return `AlreadyRunning` if one is in progress.
    ///
    /// Per-item failures are recorded on the items and reported in the
    /// `SyncReport`; only storage failures surface as `Err`, after the status
    /// has been set to `error`.
    pub async fn sync(&self) -> Result<SyncOutcome> {
        let Some(_guard) = PassGuard::acquire(&self.in_progress) else {
            tracing::debug!("Sync already in progress; skipping");
            return Ok(SyncOutcome::AlreadyRunning);
        };

        let mut tally = Tally::default();
        let result = match self
            .store
            .write(|conn| StatusRepository::new(conn).set_state(SyncState::Syncing, None))
            .await
        {
            Ok(()) => self.run_pass(&mut tally).await,
            Err(error) => Err(error),
        };

        match result {
            Ok(report) => Ok(SyncOutcome::Completed(report)),
            Err(error) => {
                let message = format!("Sync failed: {error}");
                tracing::error!("{message}");
                // Items reconciled before the failure stay committed
                let (synced, failed) = (tally.synced, tally.failed);
                let recorded = self
                    .store
                    .write(|conn| {
                        let status = StatusRepository::new(conn);
                        status.set_state(SyncState::Error, Some(&message))?;
                        status.append_history(false, synced, failed, &message)?;
                        Ok(())
                    })
                    .await;
                if let Err(record_error) = recorded {
                    tracing::error!("Could not record sync failure: {record_error}");
                }
                Err(error)
            }
        }
    }

    async fn run_pass(&self, tally: &mut Tally) -> Result<SyncReport> {
        let max_retries = self.max_queue_retries;
        let dirty = self
            .store
            .read(|conn| {
                Ok(DirtySet {
                    cases: CaseRepository::new(conn).dirty_keys()?,
                    notes: NoteRepository::new(conn).dirty_keys()?,
                    attachments: AttachmentRepository::new(conn).dirty_keys()?,
                    scans: QueueRepository::new(conn).list_ready(QueueItemType::QrScan, max_retries)?,
                })
            })
            .await?;

        if dirty.is_empty() {
            self.store
                .write(|conn| {
                    let status = StatusRepository::new(conn);
                    status.refresh_pending_counts()?;
                    status.set_state(SyncState::Idle, None)?;
                    status.append_history(true, 0, 0, NO_CHANGES_MESSAGE)?;
                    Ok(())
                })
                .await?;
            tracing::info!("{NO_CHANGES_MESSAGE}");
            return Ok(SyncReport {
                synced: 0,
                failed: 0,
                success: true,
                message: NO_CHANGES_MESSAGE.to_string(),
            });
        }

        tracing::info!(
            "Sync started: {} cases, {} notes, {} attachments, {} QR scans",
            dirty.cases.len(),
            dirty.notes.len(),
            dirty.attachments.len(),
            dirty.scans.len()
        );

        for key in dirty.cases {
            self.sync_case(key, tally).await?;
        }
        for key in dirty.notes {
            self.sync_note(key, tally).await?;
        }
        for key in dirty.attachments {
            self.sync_attachment(key, tally).await?;
        }
        for item in dirty.scans {
            self.sync_qr_scan(item, tally).await?;
        }

        self.finish(tally).await
    }

    async fn finish(&self, tally: &Tally) -> Result<SyncReport> {
        let success = tally.failed == 0;
        let unreachable = tally.unreachable();
        let message = if unreachable {
            format!(
                "Remote service unreachable: {} items could not be sent",
                tally.failed
            )
        } else if success {
            format!("Synchronized {} items", tally.synced)
        } else {
            format!(
                "Synchronized {} items, {} failed",
                tally.synced, tally.failed
            )
        };

        let (synced, failed) = (tally.synced, tally.failed);
        let history_message = message.clone();
        self.store
            .write(move |conn| {
                let status = StatusRepository::new(conn);
                status.refresh_pending_counts()?;
                if unreachable {
                    status.set_state(SyncState::Error, Some(&history_message))?;
                } else {
                    status.set_state(SyncState::Idle, None)?;
                }
                status.append_history(success, synced, failed, &history_message)?;
                Ok(())
            })
            .await?;

        if success {
            tracing::info!("{message}");
        } else {
            tracing::warn!("{message}");
        }

        Ok(SyncReport {
            synced,
            failed,
            success,
            message,
        })
    }

    async fn sync_case(&self, key: RecordKey, tally: &mut Tally) -> Result<()> {
        let Some(case) = self.store.get_case(key).await? else {
            return Ok(());
        };
        if !case.needs_sync {
            return Ok(());
        }

        let body = CasePayload::from(&case);
        let response = match case.key {
            RecordKey::Local(_) => self.remote.create_case(&body).await,
            RecordKey::Server(id) => self.remote.update_case(id, &body).await,
        };

        match response {
            Ok(server) => {
                let merged = reconcile_case(&case, server);
                let new_key = merged.key;
                let sent_revision = case.revision;
                self.store
                    .write(move |conn| {
                        let repo = CaseRepository::new(conn);
                        // Edited while the request was in flight: keep the edit dirty
                        let record = match repo.get(&key)? {
                            Some(current) if current.revision != sent_revision => CaseRecord {
                                key: new_key,
                                needs_sync: true,
                                sync_error: None,
                                ..current
                            },
                            _ => merged,
                        };
                        repo.replace(&key, &record)?;
                        if key != new_key {
                            NoteRepository::new(conn).reassign_case(&key, &new_key)?;
                            AttachmentRepository::new(conn).reassign_case(&key, &new_key)?;
                        }
                        Ok(())
                    })
                    .await?;
                tracing::debug!("Synced case {key} as {new_key}");
                tally.succeeded();
            }
            Err(error) => {
                tracing::warn!("Case {key} failed to sync: {error}");
                let message = error.to_string();
                self.store
                    .write(|conn| CaseRepository::new(conn).set_sync_error(&key, &message))
                    .await?;
                tally.remote_failed(&error);
            }
        }
        Ok(())
    }

    async fn sync_note(&self, key: RecordKey, tally: &mut Tally) -> Result<()> {
        let Some(note) = self.store.get_note(key).await? else {
            return Ok(());
        };
        if !note.needs_sync {
            return Ok(());
        }

        let Some(case_id) = note.case_key.server_id() else {
            let message = parent_not_synced(&note.case_key);
            tracing::debug!("Note {key}: {message}");
            self.store
                .write(|conn| NoteRepository::new(conn).set_sync_error(&key, &message))
                .await?;
            tally.skipped();
            return Ok(());
        };

        let body = NotePayload::new(&note, case_id);
        let response = match note.key {
            RecordKey::Local(_) => self.remote.create_note(&body).await,
            RecordKey::Server(id) => self.remote.update_note(id, &body).await,
        };

        match response {
            Ok(server) => {
                let merged = reconcile_note(&note, server);
                self.store
                    .write(move |conn| NoteRepository::new(conn).replace(&key, &merged))
                    .await?;
                tally.succeeded();
            }
            Err(error) => {
                tracing::warn!("Note {key} failed to sync: {error}");
                let message = error.to_string();
                self.store
                    .write(|conn| NoteRepository::new(conn).set_sync_error(&key, &message))
                    .await?;
                tally.remote_failed(&error);
            }
        }
        Ok(())
    }

    async fn sync_attachment(&self, key: RecordKey, tally: &mut Tally) -> Result<()> {
        let Some(attachment) = self.store.get_attachment(key).await? else {
            return Ok(());
        };
        if !attachment.needs_sync {
            return Ok(());
        }

        let Some(case_id) = attachment.case_key.server_id() else {
            let message = parent_not_synced(&attachment.case_key);
            tracing::debug!("Attachment {key}: {message}");
            self.store
                .write(|conn| AttachmentRepository::new(conn).set_sync_error(&key, &message))
                .await?;
            tally.skipped();
            return Ok(());
        };

        let upload = AttachmentUpload::new(&attachment, case_id);
        let response = match attachment.key {
            RecordKey::Local(_) => self.remote.create_attachment(&upload).await,
            RecordKey::Server(id) => self.remote.update_attachment(id, &upload).await,
        };

        match response {
            Ok(server) => {
                let merged = reconcile_attachment(&attachment, server);
                self.store
                    .write(move |conn| AttachmentRepository::new(conn).replace(&key, &merged))
                    .await?;
                tally.succeeded();
            }
            Err(error) => {
                tracing::warn!("Attachment {key} failed to sync: {error}");
                let message = error.to_string();
                self.store
                    .write(|conn| AttachmentRepository::new(conn).set_sync_error(&key, &message))
                    .await?;
                tally.remote_failed(&error);
            }
        }
        Ok(())
    }

    async fn sync_qr_scan(&self, item: SyncQueueItem, tally: &mut Tally) -> Result<()> {
        let id = item.id;
        let scan = match serde_json::from_value::<QrScanLog>(item.payload) {
            Ok(scan) => scan,
            Err(error) => {
                let message = format!("Invalid QR scan payload: {error}");
                tracing::warn!("Queue item {id}: {message}");
                self.store
                    .write(|conn| QueueRepository::new(conn).mark_failed(&id, &message))
                    .await?;
                tally.skipped();
                return Ok(());
            }
        };

        self.store
            .write(|conn| QueueRepository::new(conn).set_status(&id, QueueStatus::Processing))
            .await?;

        match self.remote.log_qr_scan(&scan).await {
            Ok(()) => {
                self.store
                    .write(|conn| QueueRepository::new(conn).delete(&id))
                    .await?;
                tracing::debug!("Logged queued QR scan {id}");
                tally.succeeded();
            }
            Err(error) => {
                tracing::warn!("Queued QR scan {id} failed: {error}");
                let message = error.to_string();
                self.store
                    .write(|conn| QueueRepository::new(conn).mark_failed(&id, &message))
                    .await?;
                tally.remote_failed(&error);
            }
        }
        Ok(())
    }
}
