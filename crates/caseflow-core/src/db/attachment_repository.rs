//! Attachment repository implementation

use crate::error::{Error, Result};
use crate::models::{AttachmentRecord, RecordKey};
use rusqlite::{params, Connection, OptionalExtension};

use super::keys;

const ATTACHMENT_COLUMNS: &str = "server_id, local_id, case_server_id, case_local_id, name,
    mime_type, size_bytes, data, created_at, needs_sync, sync_error";

/// `SQLite` access to the `attachments` collection
pub struct AttachmentRepository<'a> {
    conn: &'a Connection,
}

impl<'a> AttachmentRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_attachment(row: &rusqlite::Row<'_>) -> rusqlite::Result<AttachmentRecord> {
        Ok(AttachmentRecord {
            key: keys::from_columns(1, row.get(0)?, row.get(1)?)?,
            case_key: keys::from_columns(3, row.get(2)?, row.get(3)?)?,
            name: row.get(4)?,
            mime_type: row.get(5)?,
            size_bytes: row.get(6)?,
            data: row.get(7)?,
            created_at: row.get(8)?,
            needs_sync: row.get(9)?,
            sync_error: row.get(10)?,
        })
    }

    fn query(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<AttachmentRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let attachments = stmt
            .query_map(params, Self::parse_attachment)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(attachments)
    }

    pub fn insert(&self, attachment: &AttachmentRecord) -> Result<()> {
        let (server_id, local_id) = keys::to_columns(&attachment.key);
        let (case_server_id, case_local_id) = keys::to_columns(&attachment.case_key);
        self.conn.execute(
            &format!(
                "INSERT INTO attachments ({ATTACHMENT_COLUMNS})
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
            ),
            params![
                server_id,
                local_id,
                case_server_id,
                case_local_id,
                attachment.name,
                attachment.mime_type,
                attachment.size_bytes,
                attachment.data,
                attachment.created_at,
                attachment.needs_sync,
                attachment.sync_error,
            ],
        )?;
        Ok(())
    }

    fn overwrite(&self, attachment: &AttachmentRecord) -> Result<usize> {
        let (case_server_id, case_local_id) = keys::to_columns(&attachment.case_key);
        let (clause, key_value) = keys::match_clause("", &attachment.key);
        let rows = self.conn.execute(
            &format!(
                "UPDATE attachments SET case_server_id = ?, case_local_id = ?, name = ?,
                    mime_type = ?, size_bytes = ?, data = ?, created_at = ?, needs_sync = ?,
                    sync_error = ?
                 WHERE {clause}"
            ),
            params![
                case_server_id,
                case_local_id,
                attachment.name,
                attachment.mime_type,
                attachment.size_bytes,
                attachment.data,
                attachment.created_at,
                attachment.needs_sync,
                attachment.sync_error,
                key_value,
            ],
        )?;
        Ok(rows)
    }

    /// Insert or replace the attachment stored under `attachment.key`
    pub fn put(&self, attachment: &AttachmentRecord) -> Result<()> {
        if self.overwrite(attachment)? == 0 {
            self.insert(attachment)?;
        }
        Ok(())
    }

    /// Swap the record stored under `old_key` for `attachment`
    pub fn replace(&self, old_key: &RecordKey, attachment: &AttachmentRecord) -> Result<()> {
        if *old_key != attachment.key {
            self.delete(old_key)?;
        }
        self.put(attachment)
    }

    pub fn get(&self, key: &RecordKey) -> Result<Option<AttachmentRecord>> {
        let (clause, key_value) = keys::match_clause("", key);
        let attachment = self
            .conn
            .query_row(
                &format!("SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE {clause}"),
                [key_value],
                Self::parse_attachment,
            )
            .optional()?;
        Ok(attachment)
    }

    pub fn delete(&self, key: &RecordKey) -> Result<bool> {
        let (clause, key_value) = keys::match_clause("", key);
        let rows = self
            .conn
            .execute(&format!("DELETE FROM attachments WHERE {clause}"), [key_value])?;
        Ok(rows > 0)
    }

    /// Attachments of a case, oldest first
    pub fn list_by_case(&self, case_key: &RecordKey) -> Result<Vec<AttachmentRecord>> {
        let (clause, key_value) = keys::match_clause("case_", case_key);
        self.query(
            &format!(
                "SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE {clause}
                 ORDER BY created_at, row_id"
            ),
            [key_value],
        )
    }

    pub fn list_dirty(&self) -> Result<Vec<AttachmentRecord>> {
        self.query(
            &format!(
                "SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE needs_sync = 1 ORDER BY row_id ASC"
            ),
            [],
        )
    }

    pub fn dirty_keys(&self) -> Result<Vec<RecordKey>> {
        let mut stmt = self.conn.prepare(
            "SELECT server_id, local_id FROM attachments WHERE needs_sync = 1 ORDER BY row_id ASC",
        )?;
        let keys = stmt
            .query_map([], |row| keys::from_columns(1, row.get(0)?, row.get(1)?))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(keys)
    }

    /// Point every attachment of case `from` at case `to`; returns affected rows
    pub fn reassign_case(&self, from: &RecordKey, to: &RecordKey) -> Result<usize> {
        let (case_server_id, case_local_id) = keys::to_columns(to);
        let (clause, key_value) = keys::match_clause("case_", from);
        let rows = self.conn.execute(
            &format!("UPDATE attachments SET case_server_id = ?, case_local_id = ? WHERE {clause}"),
            params![case_server_id, case_local_id, key_value],
        )?;
        Ok(rows)
    }

    pub fn set_sync_error(&self, key: &RecordKey, message: &str) -> Result<()> {
        let (clause, key_value) = keys::match_clause("", key);
        let rows = self.conn.execute(
            &format!("UPDATE attachments SET sync_error = ?, needs_sync = 1 WHERE {clause}"),
            params![message, key_value],
        )?;
        if rows == 0 {
            return Err(Error::NotFound(format!("attachment {key}")));
        }
        Ok(())
    }

    pub fn count(&self) -> Result<usize> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM attachments", [], |row| row.get(0))?)
    }

    pub fn count_dirty(&self) -> Result<usize> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM attachments WHERE needs_sync = 1",
            [],
            |row| row.get(0),
        )?)
    }

    pub fn count_failed(&self) -> Result<usize> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM attachments WHERE needs_sync = 1 AND sync_error IS NOT NULL",
            [],
            |row| row.get(0),
        )?)
    }
}
