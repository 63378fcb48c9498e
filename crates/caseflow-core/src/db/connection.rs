//! Database connection management

use crate::error::Result;
use rusqlite::Connection;
use std::path::Path;

use super::migrations;
use super::{QueueRepository, StatusRepository};

/// Database wrapper for the local `SQLite` store
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically and recovers from a sync pass that was
    /// interrupted by a crash.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::initialize(conn)
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::initialize(conn)
    }

    fn initialize(conn: Connection) -> Result<Self> {
        let mut database = Self { conn };
        database.configure()?;
        database.migrate()?;
        database.recover_interrupted_sync()?;
        Ok(database)
    }

    /// Configure `SQLite` for optimal performance
    fn configure(&self) -> Result<()> {
        // In-memory databases report "memory" and refuse WAL
        self.conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .ok();
        self.conn.pragma_update(None, "synchronous", "NORMAL").ok();
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        self.conn.pragma_update(None, "cache_size", 10000).ok();
        Ok(())
    }

    /// Run database migrations
    fn migrate(&mut self) -> Result<()> {
        migrations::run(&mut self.conn)
    }

    /// Reset state left behind by a pass that never finished.
    fn recover_interrupted_sync(&self) -> Result<()> {
        let reset_items = QueueRepository::new(&self.conn).reset_processing()?;
        let was_syncing = StatusRepository::new(&self.conn).reset_interrupted()?;

        if was_syncing || reset_items > 0 {
            tracing::warn!(
                "Recovered from an interrupted sync pass ({reset_items} queue items returned to pending)"
            );
        }
        Ok(())
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Get a mutable reference to the underlying connection (for transactions)
    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}
