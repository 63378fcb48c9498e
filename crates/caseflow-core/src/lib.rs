//! caseflow-core - Core library for Caseflow
//!
//! Offline-first storage and synchronization for maintenance cases. Every
//! edit lands in the local `SQLite` store first and is pushed to the remote
//! service by [`SyncEngine`] whenever it is reachable.

pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod models;
pub mod state;
pub mod status;
pub mod store;
pub mod sync;
pub mod tracker;
pub mod util;

pub use config::SyncSettings;
pub use connectivity::{ConnectivityEvent, ConnectivityMonitor, HttpProbe};
pub use error::{Error, Result};
pub use models::{
    AttachmentRecord, CaseRecord, CaseUpdate, NewCase, NoteRecord, RecordKey, SyncQueueItem,
    SyncState, SyncStatus,
};
pub use state::SyncIndicator;
pub use status::{PendingChanges, StatusReporter};
pub use store::LocalStore;
pub use sync::{HttpRemoteApi, RemoteApi, SyncEngine, SyncOutcome, SyncReport};
pub use tracker::ChangeTracker;
