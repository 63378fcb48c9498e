//! Case repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT/OFFSET

use crate::error::{Error, Result};
use crate::models::{CaseRecord, RecordKey};
use rusqlite::{params, Connection, OptionalExtension};

use super::keys;

const CASE_COLUMNS: &str = "server_id, local_id, title, client_name, client_phone, device_type,
    device_model, serial_number, status, priority, issue_description, diagnosis, solution,
    case_number, technician_name, created_at, updated_at, needs_sync, sync_error, revision";

/// `SQLite` access to the `cases` collection
pub struct CaseRepository<'a> {
    conn: &'a Connection,
}

impl<'a> CaseRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a case from a database row selected with `CASE_COLUMNS`
    fn parse_case(row: &rusqlite::Row<'_>) -> rusqlite::Result<CaseRecord> {
        Ok(CaseRecord {
            key: keys::from_columns(1, row.get(0)?, row.get(1)?)?,
            title: row.get(2)?,
            client_name: row.get(3)?,
            client_phone: row.get(4)?,
            device_type: row.get(5)?,
            device_model: row.get(6)?,
            serial_number: row.get(7)?,
            status: row.get(8)?,
            priority: row.get(9)?,
            issue_description: row.get(10)?,
            diagnosis: row.get(11)?,
            solution: row.get(12)?,
            case_number: row.get(13)?,
            technician_name: row.get(14)?,
            created_at: row.get(15)?,
            updated_at: row.get(16)?,
            needs_sync: row.get(17)?,
            sync_error: row.get(18)?,
            revision: row.get(19)?,
        })
    }

    fn query(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<CaseRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let cases = stmt
            .query_map(params, Self::parse_case)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(cases)
    }

    /// Insert a new case row
    pub fn insert(&self, case: &CaseRecord) -> Result<()> {
        let (server_id, local_id) = keys::to_columns(&case.key);
        self.conn.execute(
            &format!(
                "INSERT INTO cases ({CASE_COLUMNS})
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
            ),
            params![
                server_id,
                local_id,
                case.title,
                case.client_name,
                case.client_phone,
                case.device_type,
                case.device_model,
                case.serial_number,
                case.status,
                case.priority,
                case.issue_description,
                case.diagnosis,
                case.solution,
                case.case_number,
                case.technician_name,
                case.created_at,
                case.updated_at,
                case.needs_sync,
                case.sync_error,
                case.revision,
            ],
        )?;
        Ok(())
    }

    /// Overwrite the row with the same key; returns affected rows
    fn overwrite(&self, case: &CaseRecord) -> Result<usize> {
        let (clause, key_value) = keys::match_clause("", &case.key);
        let rows = self.conn.execute(
            &format!(
                "UPDATE cases SET title = ?, client_name = ?, client_phone = ?, device_type = ?,
                    device_model = ?, serial_number = ?, status = ?, priority = ?,
                    issue_description = ?, diagnosis = ?, solution = ?, case_number = ?,
                    technician_name = ?, created_at = ?, updated_at = ?, needs_sync = ?,
                    sync_error = ?, revision = ?
                 WHERE {clause}"
            ),
            params![
                case.title,
                case.client_name,
                case.client_phone,
                case.device_type,
                case.device_model,
                case.serial_number,
                case.status,
                case.priority,
                case.issue_description,
                case.diagnosis,
                case.solution,
                case.case_number,
                case.technician_name,
                case.created_at,
                case.updated_at,
                case.needs_sync,
                case.sync_error,
                case.revision,
                key_value,
            ],
        )?;
        Ok(rows)
    }

    /// Insert or replace the case stored under `case.key`
    pub fn put(&self, case: &CaseRecord) -> Result<()> {
        if self.overwrite(case)? == 0 {
            self.insert(case)?;
        }
        Ok(())
    }

    /// Replace an existing case; fails if no case has this key
    pub fn update(&self, case: &CaseRecord) -> Result<()> {
        if self.overwrite(case)? == 0 {
            return Err(Error::NotFound(format!("case {}", case.key)));
        }
        Ok(())
    }

    /// Swap the record stored under `old_key` for `case` (which may carry a new key)
    pub fn replace(&self, old_key: &RecordKey, case: &CaseRecord) -> Result<()> {
        if *old_key != case.key {
            self.delete(old_key)?;
        }
        self.put(case)
    }

    /// Get a case by key
    pub fn get(&self, key: &RecordKey) -> Result<Option<CaseRecord>> {
        let (clause, key_value) = keys::match_clause("", key);
        let case = self
            .conn
            .query_row(
                &format!("SELECT {CASE_COLUMNS} FROM cases WHERE {clause}"),
                [key_value],
                Self::parse_case,
            )
            .optional()?;
        Ok(case)
    }

    /// Delete a case; returns whether a row was removed
    pub fn delete(&self, key: &RecordKey) -> Result<bool> {
        let (clause, key_value) = keys::match_clause("", key);
        let rows = self
            .conn
            .execute(&format!("DELETE FROM cases WHERE {clause}"), [key_value])?;
        Ok(rows > 0)
    }

    /// List cases, most recently updated first
    pub fn list(&self, limit: usize, offset: usize) -> Result<Vec<CaseRecord>> {
        self.query(
            &format!(
                "SELECT {CASE_COLUMNS} FROM cases
                 ORDER BY updated_at DESC, row_id DESC
                 LIMIT ? OFFSET ?"
            ),
            params![limit as i64, offset as i64],
        )
    }

    /// List cases with the given workflow status
    pub fn list_by_status(&self, status: &str) -> Result<Vec<CaseRecord>> {
        self.query(
            &format!(
                "SELECT {CASE_COLUMNS} FROM cases
                 WHERE status = ?
                 ORDER BY updated_at DESC, row_id DESC"
            ),
            params![status],
        )
    }

    /// List cases with unsynchronized changes, oldest first
    pub fn list_dirty(&self) -> Result<Vec<CaseRecord>> {
        self.query(
            &format!("SELECT {CASE_COLUMNS} FROM cases WHERE needs_sync = 1 ORDER BY row_id ASC"),
            [],
        )
    }

    /// Keys of the cases with unsynchronized changes, oldest first
    pub fn dirty_keys(&self) -> Result<Vec<RecordKey>> {
        let mut stmt = self
            .conn
            .prepare("SELECT server_id, local_id FROM cases WHERE needs_sync = 1 ORDER BY row_id ASC")?;
        let keys = stmt
            .query_map([], |row| keys::from_columns(1, row.get(0)?, row.get(1)?))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(keys)
    }

    /// Record a sync failure on a case, leaving it dirty
    pub fn set_sync_error(&self, key: &RecordKey, message: &str) -> Result<()> {
        let (clause, key_value) = keys::match_clause("", key);
        let rows = self.conn.execute(
            &format!("UPDATE cases SET sync_error = ?, needs_sync = 1 WHERE {clause}"),
            params![message, key_value],
        )?;
        if rows == 0 {
            return Err(Error::NotFound(format!("case {key}")));
        }
        Ok(())
    }

    pub fn count(&self) -> Result<usize> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM cases", [], |row| row.get(0))?)
    }

    pub fn count_dirty(&self) -> Result<usize> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM cases WHERE needs_sync = 1",
            [],
            |row| row.get(0),
        )?)
    }

    /// Dirty cases whose last sync attempt failed
    pub fn count_failed(&self) -> Result<usize> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM cases WHERE needs_sync = 1 AND sync_error IS NOT NULL",
            [],
            |row| row.get(0),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::NewCase;
    use pretty_assertions::assert_eq;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn new_case(title: &str) -> CaseRecord {
        CaseRecord::new_local(NewCase {
            title: title.to_string(),
            client_name: "Client".to_string(),
            device_type: "Phone".to_string(),
            ..NewCase::default()
        })
        .unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup();
        let repo = CaseRepository::new(db.connection());

        let case = new_case("Battery swelling");
        repo.insert(&case).unwrap();

        let fetched = repo.get(&case.key).unwrap().unwrap();
        assert_eq!(fetched, case);
        assert!(repo.get(&RecordKey::Server(99)).unwrap().is_none());
    }

    #[test]
    fn test_update_persists_revision() {
        let db = setup();
        let repo = CaseRepository::new(db.connection());

        let mut case = new_case("Loose port");
        repo.insert(&case).unwrap();
        case.apply(crate::models::CaseUpdate {
            diagnosis: Some("Cracked solder".to_string()),
            ..Default::default()
        })
        .unwrap();
        repo.update(&case).unwrap();

        assert_eq!(repo.get(&case.key).unwrap().unwrap().revision, 1);
    }

    #[test]
    fn test_update_missing_case_fails() {
        let db = setup();
        let repo = CaseRepository::new(db.connection());

        let case = new_case("Never stored");
        assert!(matches!(repo.update(&case), Err(Error::NotFound(_))));
        assert_eq!(repo.count().unwrap(), 0);
    }

    #[test]
    fn test_put_inserts_then_overwrites() {
        let db = setup();
        let repo = CaseRepository::new(db.connection());

        let mut case = new_case("Fan noise");
        repo.put(&case).unwrap();
        case.status = "closed".to_string();
        repo.put(&case).unwrap();

        assert_eq!(repo.count().unwrap(), 1);
        assert_eq!(repo.get(&case.key).unwrap().unwrap().status, "closed");
    }

    #[test]
    fn test_replace_swaps_local_for_server_key() {
        let db = setup();
        let repo = CaseRepository::new(db.connection());

        let local = new_case("Keyboard");
        repo.insert(&local).unwrap();

        let mut synced = local.clone();
        synced.key = RecordKey::Server(501);
        synced.needs_sync = false;
        repo.replace(&local.key, &synced).unwrap();

        assert!(repo.get(&local.key).unwrap().is_none());
        assert_eq!(repo.get(&RecordKey::Server(501)).unwrap().unwrap(), synced);
        assert_eq!(repo.count().unwrap(), 1);
    }

    #[test]
    fn test_dirty_lookup_and_status_index() {
        let db = setup();
        let repo = CaseRepository::new(db.connection());

        let first = new_case("One");
        let mut second = new_case("Two");
        second.key = RecordKey::Server(2);
        second.needs_sync = false;
        second.status = "closed".to_string();
        repo.insert(&first).unwrap();
        repo.insert(&second).unwrap();

        assert_eq!(repo.dirty_keys().unwrap(), vec![first.key]);
        assert_eq!(repo.list_dirty().unwrap().len(), 1);
        assert_eq!(repo.count_dirty().unwrap(), 1);
        assert_eq!(repo.list_by_status("closed").unwrap()[0].key, second.key);
        assert_eq!(repo.list(10, 0).unwrap().len(), 2);
    }

    #[test]
    fn test_set_sync_error() {
        let db = setup();
        let repo = CaseRepository::new(db.connection());

        let case = new_case("Screen");
        repo.insert(&case).unwrap();
        repo.set_sync_error(&case.key, "HTTP 500").unwrap();

        let fetched = repo.get(&case.key).unwrap().unwrap();
        assert!(fetched.needs_sync);
        assert_eq!(fetched.sync_error.as_deref(), Some("HTTP 500"));
        assert_eq!(repo.count_failed().unwrap(), 1);
        assert!(repo
            .set_sync_error(&RecordKey::Server(404), "x")
            .is_err());
    }
}
