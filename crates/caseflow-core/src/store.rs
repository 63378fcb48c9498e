//! Shared local store handle used by every component.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::Connection;
use tokio::sync::Mutex;

use crate::db::{AttachmentRepository, CaseRepository, Database, NoteRepository};
use crate::models::{AttachmentRecord, CaseRecord, NoteRecord, RecordKey};
use crate::Result;

/// Thread-safe handle to the local database.
///
/// Cloning is cheap; every clone talks to the same connection. Each `read` or
/// `write` holds the lock only for the duration of its closure.
#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl LocalStore {
    /// Open the store at the given filesystem path.
    ///
    /// A file that is not a valid database is moved aside and a fresh store
    /// is created in its place.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let db = match Database::open(&db_path) {
            Ok(db) => db,
            Err(error) if Self::is_corrupted_db_error(&error) => {
                tracing::warn!(
                    "Local store at {} is unreadable ({error}); starting a fresh one",
                    db_path.display()
                );
                Self::quarantine_corrupted_db_files(&db_path)?;
                Database::open(&db_path)?
            }
            Err(error) => return Err(error),
        };

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Filesystem location, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Run a read-only closure against the connection.
    pub async fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let db = self.db.lock().await;
        f(db.connection())
    }

    /// Run a closure inside one transaction, committed only if it succeeds.
    pub async fn write<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut db = self.db.lock().await;
        let tx = db.connection_mut().transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Fetch a case by key.
    pub async fn get_case(&self, key: RecordKey) -> Result<Option<CaseRecord>> {
        self.read(move |conn| CaseRepository::new(conn).get(&key)).await
    }

    /// List cases, most recently updated first.
    pub async fn list_cases(&self, limit: usize, offset: usize) -> Result<Vec<CaseRecord>> {
        self.read(move |conn| CaseRepository::new(conn).list(limit, offset))
            .await
    }

    pub async fn list_cases_by_status(&self, status: &str) -> Result<Vec<CaseRecord>> {
        self.read(|conn| CaseRepository::new(conn).list_by_status(status))
            .await
    }

    pub async fn get_note(&self, key: RecordKey) -> Result<Option<NoteRecord>> {
        self.read(move |conn| NoteRepository::new(conn).get(&key)).await
    }

    /// Notes attached to a case, oldest first.
    pub async fn notes_for_case(&self, case_key: RecordKey) -> Result<Vec<NoteRecord>> {
        self.read(move |conn| NoteRepository::new(conn).list_by_case(&case_key))
            .await
    }

    pub async fn get_attachment(&self, key: RecordKey) -> Result<Option<AttachmentRecord>> {
        self.read(move |conn| AttachmentRepository::new(conn).get(&key))
            .await
    }

    /// Attachments of a case, oldest first.
    pub async fn attachments_for_case(&self, case_key: RecordKey) -> Result<Vec<AttachmentRecord>> {
        self.read(move |conn| AttachmentRepository::new(conn).list_by_case(&case_key))
            .await
    }

    fn is_corrupted_db_error(error: &crate::Error) -> bool {
        let message = error.to_string().to_ascii_lowercase();
        message.contains("file is not a database") || message.contains("malformed")
    }

    fn quarantine_corrupted_db_files(db_path: &Path) -> Result<()> {
        if db_path.exists() {
            let timestamp = chrono::Utc::now().timestamp_millis();
            let base_name = db_path
                .file_name()
                .map_or_else(|| "caseflow.db".into(), |name| name.to_string_lossy());
            let backup_path = db_path.with_file_name(format!("{base_name}.corrupt-{timestamp}"));

            std::fs::rename(db_path, &backup_path)?;
            tracing::warn!(
                "Moved unreadable local store from {} to {}",
                db_path.display(),
                backup_path.display()
            );
        }

        for suffix in ["-wal", "-shm"] {
            let mut sidecar = db_path.as_os_str().to_owned();
            sidecar.push(suffix);
            let sidecar = PathBuf::from(sidecar);
            if sidecar.is_file() {
                std::fs::remove_file(&sidecar)?;
                tracing::warn!("Removed stale store file {}", sidecar.display());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewCase;
    use tempfile::tempdir;

    fn new_case(title: &str) -> CaseRecord {
        CaseRecord::new_local(NewCase {
            title: title.to_string(),
            ..NewCase::default()
        })
        .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn write_commits_and_read_sees_it() {
        let store = LocalStore::open_in_memory().unwrap();
        let case = new_case("Cracked hinge");
        let key = case.key;

        store
            .write(move |conn| CaseRepository::new(conn).insert(&case))
            .await
            .unwrap();

        let fetched = store.get_case(key).await.unwrap().unwrap();
        assert_eq!(fetched.title, "Cracked hinge");
        assert!(fetched.needs_sync);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_write_rolls_back() {
        let store = LocalStore::open_in_memory().unwrap();
        let case = new_case("Rolled back");
        let key = case.key;

        let result: Result<()> = store
            .write(move |conn| {
                CaseRepository::new(conn).insert(&case)?;
                Err(crate::Error::InvalidInput("abort".to_string()))
            })
            .await;

        assert!(result.is_err());
        assert!(store.get_case(key).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn clones_share_one_database() {
        let store = LocalStore::open_in_memory().unwrap();
        let other = store.clone();
        let case = new_case("Shared");
        let key = case.key;

        other
            .write(move |conn| CaseRepository::new(conn).insert(&case))
            .await
            .unwrap();
        assert!(store.get_case(key).await.unwrap().is_some());
    }

    #[test]
    fn detects_corrupted_store_errors() {
        let not_a_database = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_NOTADB),
            Some("file is not a database".to_string()),
        );
        assert!(LocalStore::is_corrupted_db_error(&crate::Error::Sqlite(
            not_a_database
        )));
        assert!(!LocalStore::is_corrupted_db_error(&crate::Error::InvalidInput(
            "title cannot be empty".to_string()
        )));
    }

    #[test]
    fn quarantine_moves_file_and_removes_sidecars() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("caseflow.db");
        std::fs::write(&db_path, b"garbage").unwrap();
        std::fs::write(tmp.path().join("caseflow.db-wal"), b"wal").unwrap();
        std::fs::write(tmp.path().join("caseflow.db-shm"), b"shm").unwrap();

        LocalStore::quarantine_corrupted_db_files(&db_path).unwrap();

        assert!(!db_path.exists());
        assert!(!tmp.path().join("caseflow.db-wal").exists());
        assert!(!tmp.path().join("caseflow.db-shm").exists());
    }

    #[test]
    fn unreadable_file_is_replaced() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("caseflow.db");
        std::fs::write(&db_path, vec![b'x'; 4096]).unwrap();
        std::fs::write(tmp.path().join("caseflow.db-wal"), b"wal").unwrap();

        let store = LocalStore::open(&db_path).unwrap();
        assert_eq!(store.path(), Some(db_path.as_path()));
        // The reopened store keeps its own WAL; the stale one must be gone
        let wal = std::fs::read(tmp.path().join("caseflow.db-wal")).unwrap_or_default();
        assert_ne!(wal, b"wal");

        let backups = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with("caseflow.db.corrupt-")
            })
            .count();
        assert_eq!(backups, 1);
    }
}
