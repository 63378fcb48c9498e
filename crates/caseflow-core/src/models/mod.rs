//! Data models for Caseflow

mod attachment;
mod case;
mod key;
mod note;
mod queue;
mod status;

pub use attachment::{decode_data_url, AttachmentRecord};
pub use case::{CaseRecord, CaseUpdate, NewCase, DEFAULT_CASE_STATUS};
pub use key::{LocalId, RecordKey};
pub use note::NoteRecord;
pub use queue::{QueueAction, QueueFilter, QueueItemType, QueueStatus, SyncQueueItem};
pub use status::{PendingCounts, StorageStats, SyncHistoryEntry, SyncState, SyncStatus};
