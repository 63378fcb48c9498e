//! Local mutations that keep the dirty flags and pending counts honest.
//!
//! Every method runs the mutation and the pending-count refresh in a single
//! store transaction, so `SyncStatus.pending_changes` never lags behind.

use rusqlite::Connection;

use crate::db::{AttachmentRepository, CaseRepository, NoteRepository, QueueRepository, StatusRepository};
use crate::error::{Error, Result};
use crate::models::{
    AttachmentRecord, CaseRecord, CaseUpdate, NewCase, NoteRecord, PendingCounts, QueueAction,
    QueueItemType, RecordKey, SyncQueueItem,
};
use crate::store::LocalStore;
use crate::sync::QrScanLog;

/// Entry point for every local create/update.
#[derive(Clone)]
pub struct ChangeTracker {
    store: LocalStore,
}

fn require_case(conn: &Connection, key: &RecordKey) -> Result<()> {
    if CaseRepository::new(conn).get(key)?.is_none() {
        return Err(Error::NotFound(format!("case {key}")));
    }
    Ok(())
}

impl ChangeTracker {
    pub const fn new(store: LocalStore) -> Self {
        Self { store }
    }

    pub const fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Create a case offline; it is keyed by a fresh local id.
    pub async fn add_case(&self, input: NewCase) -> Result<CaseRecord> {
        let case = CaseRecord::new_local(input)?;
        let case = self
            .store
            .write(move |conn| {
                CaseRepository::new(conn).insert(&case)?;
                StatusRepository::new(conn).refresh_pending_counts()?;
                Ok(case)
            })
            .await?;

        tracing::debug!("Created case {}", case.key);
        Ok(case)
    }

    /// Apply a partial update to an existing case and mark it dirty.
    pub async fn update_case(&self, key: RecordKey, update: CaseUpdate) -> Result<CaseRecord> {
        let case = self
            .store
            .write(move |conn| {
                let repo = CaseRepository::new(conn);
                let mut case = repo
                    .get(&key)?
                    .ok_or_else(|| Error::NotFound(format!("case {key}")))?;
                case.apply(update)?;
                repo.update(&case)?;
                StatusRepository::new(conn).refresh_pending_counts()?;
                Ok(case)
            })
            .await?;

        tracing::debug!("Updated case {}", case.key);
        Ok(case)
    }

    /// Add a note to an existing case.
    pub async fn add_note(
        &self,
        case_key: RecordKey,
        text: &str,
        created_by: &str,
    ) -> Result<NoteRecord> {
        let note = NoteRecord::new_local(case_key, text, created_by)?;
        let note = self
            .store
            .write(move |conn| {
                require_case(conn, &note.case_key)?;
                NoteRepository::new(conn).insert(&note)?;
                StatusRepository::new(conn).refresh_pending_counts()?;
                Ok(note)
            })
            .await?;

        tracing::debug!("Added note {} to case {}", note.key, note.case_key);
        Ok(note)
    }

    /// Store a file for an existing case.
    pub async fn add_attachment(
        &self,
        case_key: RecordKey,
        name: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> Result<AttachmentRecord> {
        let attachment = AttachmentRecord::new_local(case_key, name, mime_type, data)?;
        self.insert_attachment(attachment).await
    }

    /// Store a file given as a base64 `data:` URL.
    pub async fn add_attachment_from_data_url(
        &self,
        case_key: RecordKey,
        name: &str,
        data_url: &str,
    ) -> Result<AttachmentRecord> {
        let attachment = AttachmentRecord::from_data_url(case_key, name, data_url)?;
        self.insert_attachment(attachment).await
    }

    async fn insert_attachment(&self, attachment: AttachmentRecord) -> Result<AttachmentRecord> {
        let attachment = self
            .store
            .write(move |conn| {
                require_case(conn, &attachment.case_key)?;
                AttachmentRepository::new(conn).insert(&attachment)?;
                StatusRepository::new(conn).refresh_pending_counts()?;
                Ok(attachment)
            })
            .await?;

        tracing::debug!(
            "Added attachment {} ({} bytes) to case {}",
            attachment.name,
            attachment.size_bytes,
            attachment.case_key
        );
        Ok(attachment)
    }

    /// Queue a QR scan for the next sync pass.
    pub async fn add_qr_scan_to_queue(&self, scan: &QrScanLog) -> Result<SyncQueueItem> {
        let item = SyncQueueItem::new(
            QueueItemType::QrScan,
            scan.case_id.to_string(),
            QueueAction::Create,
            serde_json::to_value(scan)?,
        );
        let item = self
            .store
            .write(move |conn| {
                QueueRepository::new(conn).insert(&item)?;
                StatusRepository::new(conn).refresh_pending_counts()?;
                Ok(item)
            })
            .await?;

        tracing::debug!("Queued QR scan {} for case {}", item.id, item.item_id);
        Ok(item)
    }

    /// Recount pending work and persist it.
    pub async fn refresh_pending_counts(&self) -> Result<PendingCounts> {
        self.store
            .write(|conn| StatusRepository::new(conn).refresh_pending_counts())
            .await
    }
}
