//! Scripted in-process `RemoteApi` for engine tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;

use rusqlite::Connection;

use crate::store::LocalStore;

use super::payload::{
    AttachmentUpload, CasePayload, NotePayload, QrScanLog, ServerAttachment, ServerCase,
    ServerNote,
};
use super::remote::{RemoteApi, RemoteError};

#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Network,
    Status(u16),
}

impl Failure {
    fn to_error(self) -> RemoteError {
        match self {
            Self::Network => RemoteError::Network("connection refused".to_string()),
            Self::Status(status) => RemoteError::Rejected {
                status,
                message: "scripted failure".to_string(),
            },
        }
    }
}

type StoreEdit = Box<dyn FnOnce(&Connection) -> crate::Result<()> + Send>;

/// Accepts everything, assigning ids from 100 upward, unless told otherwise.
///
/// Failures and in-flight edits are keyed by case title, note text,
/// attachment name or QR case name. Every call yields once so concurrent
/// passes interleave.
pub struct ScriptedRemote {
    next_id: AtomicI64,
    network_down: AtomicBool,
    failures: Mutex<HashMap<String, Failure>>,
    edits: Mutex<HashMap<String, (LocalStore, StoreEdit)>>,
    calls: Mutex<Vec<String>>,
}

impl Default for ScriptedRemote {
    fn default() -> Self {
        Self {
            next_id: AtomicI64::new(100),
            network_down: AtomicBool::new(false),
            failures: Mutex::new(HashMap::new()),
            edits: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedRemote {
    pub fn fail(&self, label: &str, failure: Failure) {
        self.failures
            .lock()
            .unwrap()
            .insert(label.to_string(), failure);
    }

    pub fn recover(&self, label: &str) {
        self.failures.lock().unwrap().remove(label);
    }

    /// Write to `store` once, while the next call for `label` is in flight.
    pub fn edit_during_call<F>(&self, label: &str, store: LocalStore, edit: F)
    where
        F: FnOnce(&Connection) -> crate::Result<()> + Send + 'static,
    {
        self.edits
            .lock()
            .unwrap()
            .insert(label.to_string(), (store, Box::new(edit)));
    }

    pub fn set_network_down(&self, down: bool) {
        self.network_down.store(down, Ordering::SeqCst);
    }

    /// Calls made so far, e.g. `POST /api/cases Overheating`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    async fn enter(&self, call: String, label: &str) -> Result<(), RemoteError> {
        tokio::task::yield_now().await;
        self.calls.lock().unwrap().push(call);
        let edit = self.edits.lock().unwrap().remove(label);
        if let Some((store, edit)) = edit {
            store.write(edit).await.unwrap();
        }
        if self.network_down.load(Ordering::SeqCst) {
            return Err(Failure::Network.to_error());
        }
        match self.failures.lock().unwrap().get(label) {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }

    fn assign_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

impl RemoteApi for ScriptedRemote {
    async fn create_case(&self, body: &CasePayload) -> Result<ServerCase, RemoteError> {
        self.enter(format!("POST /api/cases {}", body.title), &body.title)
            .await?;
        Ok(ServerCase {
            id: self.assign_id(),
            title: Some(body.title.clone()),
            status: Some(body.status.clone()),
            ..ServerCase::default()
        })
    }

    async fn update_case(&self, id: i64, body: &CasePayload) -> Result<ServerCase, RemoteError> {
        self.enter(format!("PUT /api/cases/{id} {}", body.title), &body.title)
            .await?;
        Ok(ServerCase {
            id,
            title: Some(body.title.clone()),
            ..ServerCase::default()
        })
    }

    async fn create_note(&self, body: &NotePayload) -> Result<ServerNote, RemoteError> {
        self.enter(
            format!("POST /api/notes case={} {}", body.case_id, body.text),
            &body.text,
        )
        .await?;
        Ok(ServerNote {
            id: self.assign_id(),
            case_id: Some(body.case_id),
            ..ServerNote::default()
        })
    }

    async fn update_note(&self, id: i64, body: &NotePayload) -> Result<ServerNote, RemoteError> {
        self.enter(format!("PUT /api/notes/{id} {}", body.text), &body.text)
            .await?;
        Ok(ServerNote {
            id,
            ..ServerNote::default()
        })
    }

    async fn create_attachment(
        &self,
        upload: &AttachmentUpload,
    ) -> Result<ServerAttachment, RemoteError> {
        let name = &upload.metadata.name;
        self.enter(
            format!("POST /api/attachments case={} {name}", upload.metadata.case_id),
            name,
        )
        .await?;
        Ok(ServerAttachment {
            id: self.assign_id(),
            case_id: Some(upload.metadata.case_id),
            ..ServerAttachment::default()
        })
    }

    async fn update_attachment(
        &self,
        id: i64,
        upload: &AttachmentUpload,
    ) -> Result<ServerAttachment, RemoteError> {
        let name = &upload.metadata.name;
        self.enter(format!("PUT /api/attachments/{id} {name}"), name)
            .await?;
        Ok(ServerAttachment {
            id,
            ..ServerAttachment::default()
        })
    }

    async fn log_qr_scan(&self, scan: &QrScanLog) -> Result<(), RemoteError> {
        self.enter(
            format!("POST /api/qr-scans {}", scan.case_id),
            &scan.case_name,
        )
        .await
    }
}
