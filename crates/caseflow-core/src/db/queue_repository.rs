//! Sync queue repository implementation

use crate::error::Result;
use crate::models::{QueueFilter, QueueItemType, QueueStatus, SyncQueueItem};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

const QUEUE_COLUMNS: &str = "id, item_type, item_id, parent_id, action, payload, timestamp,
    status, error_message, retry_count";

/// `SQLite` access to the `sync_queue` collection
pub struct QueueRepository<'a> {
    conn: &'a Connection,
}

fn text_column<T>(index: usize, text: &str) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = crate::error::Error>,
{
    text.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}

impl<'a> QueueRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncQueueItem> {
        let item_type: String = row.get(1)?;
        let action: String = row.get(4)?;
        let payload: String = row.get(5)?;
        let status: String = row.get(7)?;

        Ok(SyncQueueItem {
            id: row.get(0)?,
            item_type: text_column(1, &item_type)?,
            item_id: row.get(2)?,
            parent_id: row.get(3)?,
            action: text_column(4, &action)?,
            payload: serde_json::from_str(&payload).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e))
            })?,
            timestamp: row.get(6)?,
            status: text_column(7, &status)?,
            error_message: row.get(8)?,
            retry_count: row.get(9)?,
        })
    }

    /// Append an item to the queue
    pub fn insert(&self, item: &SyncQueueItem) -> Result<()> {
        self.conn.execute(
            &format!("INSERT INTO sync_queue ({QUEUE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"),
            params![
                item.id,
                item.item_type.as_str(),
                item.item_id,
                item.parent_id,
                item.action.as_str(),
                serde_json::to_string(&item.payload)?,
                item.timestamp,
                item.status.as_str(),
                item.error_message,
                item.retry_count,
            ],
        )?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<SyncQueueItem>> {
        let item = self
            .conn
            .query_row(
                &format!("SELECT {QUEUE_COLUMNS} FROM sync_queue WHERE id = ?"),
                [id],
                Self::parse_item,
            )
            .optional()?;
        Ok(item)
    }

    /// List queue items matching `filter`, in enqueue order
    pub fn list(&self, filter: QueueFilter) -> Result<Vec<SyncQueueItem>> {
        let mut conditions = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(item_type) = filter.item_type {
            conditions.push("item_type = ?");
            values.push(Value::Text(item_type.as_str().to_string()));
        }
        if let Some(status) = filter.status {
            conditions.push("status = ?");
            values.push(Value::Text(status.as_str().to_string()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {QUEUE_COLUMNS} FROM sync_queue {where_clause} ORDER BY timestamp, id"
        ))?;
        let items = stmt
            .query_map(params_from_iter(values), Self::parse_item)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    /// Items of `item_type` eligible for a sync attempt: pending, or failed
    /// fewer than `max_retries` times
    pub fn list_ready(&self, item_type: QueueItemType, max_retries: u32) -> Result<Vec<SyncQueueItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {QUEUE_COLUMNS} FROM sync_queue
             WHERE item_type = ?1
               AND (status = 'pending' OR (status = 'error' AND retry_count < ?2))
             ORDER BY timestamp, id"
        ))?;
        let items = stmt
            .query_map(params![item_type.as_str(), max_retries], Self::parse_item)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    pub fn set_status(&self, id: &str, status: QueueStatus) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE sync_queue SET status = ? WHERE id = ?",
            params![status.as_str(), id],
        )?;
        Ok(rows > 0)
    }

    /// Record a failed attempt: status `error`, message stored, retry count bumped
    pub fn mark_failed(&self, id: &str, message: &str) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE sync_queue
             SET status = 'error', error_message = ?, retry_count = retry_count + 1
             WHERE id = ?",
            params![message, id],
        )?;
        Ok(rows > 0)
    }

    pub fn delete(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM sync_queue WHERE id = ?", [id])?;
        Ok(rows > 0)
    }

    /// Remove every item in `status`; returns how many were removed
    pub fn delete_by_status(&self, status: QueueStatus) -> Result<usize> {
        let rows = self
            .conn
            .execute("DELETE FROM sync_queue WHERE status = ?", [status.as_str()])?;
        Ok(rows)
    }

    pub fn count_by_type(&self, item_type: QueueItemType) -> Result<usize> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM sync_queue WHERE item_type = ?",
            [item_type.as_str()],
            |row| row.get(0),
        )?)
    }

    pub fn count_by_status(&self, status: QueueStatus) -> Result<usize> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM sync_queue WHERE status = ?",
            [status.as_str()],
            |row| row.get(0),
        )?)
    }

    /// Return items stuck in `processing` to `pending`
    pub fn reset_processing(&self) -> Result<usize> {
        let rows = self.conn.execute(
            "UPDATE sync_queue SET status = 'pending' WHERE status = 'processing'",
            [],
        )?;
        Ok(rows)
    }
}
