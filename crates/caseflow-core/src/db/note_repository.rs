//! Note repository implementation

use crate::error::{Error, Result};
use crate::models::{NoteRecord, RecordKey};
use rusqlite::{params, Connection, OptionalExtension};

use super::keys;

const NOTE_COLUMNS: &str = "server_id, local_id, case_server_id, case_local_id, text, created_by,
    created_at, needs_sync, sync_error";

/// `SQLite` access to the `notes` collection
pub struct NoteRepository<'a> {
    conn: &'a Connection,
}

impl<'a> NoteRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_note(row: &rusqlite::Row<'_>) -> rusqlite::Result<NoteRecord> {
        Ok(NoteRecord {
            key: keys::from_columns(1, row.get(0)?, row.get(1)?)?,
            case_key: keys::from_columns(3, row.get(2)?, row.get(3)?)?,
            text: row.get(4)?,
            created_by: row.get(5)?,
            created_at: row.get(6)?,
            needs_sync: row.get(7)?,
            sync_error: row.get(8)?,
        })
    }

    fn query(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<NoteRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let notes = stmt
            .query_map(params, Self::parse_note)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(notes)
    }

    pub fn insert(&self, note: &NoteRecord) -> Result<()> {
        let (server_id, local_id) = keys::to_columns(&note.key);
        let (case_server_id, case_local_id) = keys::to_columns(&note.case_key);
        self.conn.execute(
            &format!("INSERT INTO notes ({NOTE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"),
            params![
                server_id,
                local_id,
                case_server_id,
                case_local_id,
                note.text,
                note.created_by,
                note.created_at,
                note.needs_sync,
                note.sync_error,
            ],
        )?;
        Ok(())
    }

    fn overwrite(&self, note: &NoteRecord) -> Result<usize> {
        let (case_server_id, case_local_id) = keys::to_columns(&note.case_key);
        let (clause, key_value) = keys::match_clause("", &note.key);
        let rows = self.conn.execute(
            &format!(
                "UPDATE notes SET case_server_id = ?, case_local_id = ?, text = ?, created_by = ?,
                    created_at = ?, needs_sync = ?, sync_error = ?
                 WHERE {clause}"
            ),
            params![
                case_server_id,
                case_local_id,
                note.text,
                note.created_by,
                note.created_at,
                note.needs_sync,
                note.sync_error,
                key_value,
            ],
        )?;
        Ok(rows)
    }

    /// Insert or replace the note stored under `note.key`
    pub fn put(&self, note: &NoteRecord) -> Result<()> {
        if self.overwrite(note)? == 0 {
            self.insert(note)?;
        }
        Ok(())
    }

    /// Swap the record stored under `old_key` for `note`
    pub fn replace(&self, old_key: &RecordKey, note: &NoteRecord) -> Result<()> {
        if *old_key != note.key {
            self.delete(old_key)?;
        }
        self.put(note)
    }

    pub fn get(&self, key: &RecordKey) -> Result<Option<NoteRecord>> {
        let (clause, key_value) = keys::match_clause("", key);
        let note = self
            .conn
            .query_row(
                &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE {clause}"),
                [key_value],
                Self::parse_note,
            )
            .optional()?;
        Ok(note)
    }

    pub fn delete(&self, key: &RecordKey) -> Result<bool> {
        let (clause, key_value) = keys::match_clause("", key);
        let rows = self
            .conn
            .execute(&format!("DELETE FROM notes WHERE {clause}"), [key_value])?;
        Ok(rows > 0)
    }

    /// Notes of a case, oldest first
    pub fn list_by_case(&self, case_key: &RecordKey) -> Result<Vec<NoteRecord>> {
        let (clause, key_value) = keys::match_clause("case_", case_key);
        self.query(
            &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE {clause} ORDER BY created_at, row_id"),
            [key_value],
        )
    }

    pub fn list_dirty(&self) -> Result<Vec<NoteRecord>> {
        self.query(
            &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE needs_sync = 1 ORDER BY row_id ASC"),
            [],
        )
    }

    pub fn dirty_keys(&self) -> Result<Vec<RecordKey>> {
        let mut stmt = self
            .conn
            .prepare("SELECT server_id, local_id FROM notes WHERE needs_sync = 1 ORDER BY row_id ASC")?;
        let keys = stmt
            .query_map([], |row| keys::from_columns(1, row.get(0)?, row.get(1)?))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(keys)
    }

    /// Point every note of case `from` at case `to`; returns affected rows
    pub fn reassign_case(&self, from: &RecordKey, to: &RecordKey) -> Result<usize> {
        let (case_server_id, case_local_id) = keys::to_columns(to);
        let (clause, key_value) = keys::match_clause("case_", from);
        let rows = self.conn.execute(
            &format!("UPDATE notes SET case_server_id = ?, case_local_id = ? WHERE {clause}"),
            params![case_server_id, case_local_id, key_value],
        )?;
        Ok(rows)
    }

    pub fn set_sync_error(&self, key: &RecordKey, message: &str) -> Result<()> {
        let (clause, key_value) = keys::match_clause("", key);
        let rows = self.conn.execute(
            &format!("UPDATE notes SET sync_error = ?, needs_sync = 1 WHERE {clause}"),
            params![message, key_value],
        )?;
        if rows == 0 {
            return Err(Error::NotFound(format!("note {key}")));
        }
        Ok(())
    }

    pub fn count(&self) -> Result<usize> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0))?)
    }

    pub fn count_dirty(&self) -> Result<usize> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM notes WHERE needs_sync = 1",
            [],
            |row| row.get(0),
        )?)
    }

    pub fn count_failed(&self) -> Result<usize> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM notes WHERE needs_sync = 1 AND sync_error IS NOT NULL",
            [],
            |row| row.get(0),
        )?)
    }
}
