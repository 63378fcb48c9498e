//! Database migrations

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension};

/// Current schema version
const CURRENT_VERSION: i32 = 3;

/// Run all pending migrations
pub fn run(conn: &mut Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }
    if version < 3 {
        migrate_v3(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| {
            row.get(0)
        })
        .optional()?
        .unwrap_or(0);

    Ok(version)
}

fn apply(conn: &mut Connection, version: i32, statements: &[&str]) -> Result<()> {
    // Dropping the transaction on error rolls it back
    let tx = conn.transaction()?;
    for stmt in statements {
        tx.execute_batch(stmt)?;
    }
    tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    tx.commit()?;

    tracing::info!("Migrated database to version {version}");
    Ok(())
}

/// Migration to version 1: domain records
fn migrate_v1(conn: &mut Connection) -> Result<()> {
    let statements = [
        // Schema version tracking
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        // Cases: keyed by exactly one of server_id / local_id
        "CREATE TABLE IF NOT EXISTS cases (
            row_id INTEGER PRIMARY KEY AUTOINCREMENT,
            server_id INTEGER UNIQUE,
            local_id TEXT UNIQUE,
            title TEXT NOT NULL,
            client_name TEXT NOT NULL DEFAULT '',
            client_phone TEXT NOT NULL DEFAULT '',
            device_type TEXT NOT NULL DEFAULT '',
            device_model TEXT NOT NULL DEFAULT '',
            serial_number TEXT,
            status TEXT NOT NULL,
            priority TEXT,
            issue_description TEXT NOT NULL DEFAULT '',
            diagnosis TEXT,
            solution TEXT,
            case_number TEXT,
            technician_name TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            needs_sync INTEGER NOT NULL DEFAULT 1,
            sync_error TEXT,
            CHECK ((server_id IS NULL) <> (local_id IS NULL))
        )",
        "CREATE INDEX IF NOT EXISTS idx_cases_status ON cases(status)",
        "CREATE INDEX IF NOT EXISTS idx_cases_created ON cases(created_at DESC)",
        "CREATE INDEX IF NOT EXISTS idx_cases_needs_sync ON cases(needs_sync)",
        // Notes reference their case by server id or local id
        "CREATE TABLE IF NOT EXISTS notes (
            row_id INTEGER PRIMARY KEY AUTOINCREMENT,
            server_id INTEGER UNIQUE,
            local_id TEXT UNIQUE,
            case_server_id INTEGER,
            case_local_id TEXT,
            text TEXT NOT NULL,
            created_by TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL,
            needs_sync INTEGER NOT NULL DEFAULT 1,
            sync_error TEXT,
            CHECK ((server_id IS NULL) <> (local_id IS NULL)),
            CHECK ((case_server_id IS NULL) <> (case_local_id IS NULL))
        )",
        "CREATE INDEX IF NOT EXISTS idx_notes_case_server ON notes(case_server_id)",
        "CREATE INDEX IF NOT EXISTS idx_notes_case_local ON notes(case_local_id)",
        "CREATE INDEX IF NOT EXISTS idx_notes_needs_sync ON notes(needs_sync)",
        // Attachments keep their bytes locally
        "CREATE TABLE IF NOT EXISTS attachments (
            row_id INTEGER PRIMARY KEY AUTOINCREMENT,
            server_id INTEGER UNIQUE,
            local_id TEXT UNIQUE,
            case_server_id INTEGER,
            case_local_id TEXT,
            name TEXT NOT NULL,
            mime_type TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            data BLOB NOT NULL,
            created_at INTEGER NOT NULL,
            needs_sync INTEGER NOT NULL DEFAULT 1,
            sync_error TEXT,
            CHECK ((server_id IS NULL) <> (local_id IS NULL)),
            CHECK ((case_server_id IS NULL) <> (case_local_id IS NULL))
        )",
        "CREATE INDEX IF NOT EXISTS idx_attachments_case_server ON attachments(case_server_id)",
        "CREATE INDEX IF NOT EXISTS idx_attachments_case_local ON attachments(case_local_id)",
        "CREATE INDEX IF NOT EXISTS idx_attachments_needs_sync ON attachments(needs_sync)",
    ];

    apply(conn, 1, &statements)
}

/// Migration to version 2: sync queue, status and history
fn migrate_v2(conn: &mut Connection) -> Result<()> {
    let statements = [
        "CREATE TABLE IF NOT EXISTS sync_queue (
            id TEXT PRIMARY KEY,
            item_type TEXT NOT NULL,
            item_id TEXT NOT NULL,
            parent_id TEXT,
            action TEXT NOT NULL,
            payload TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            status TEXT NOT NULL,
            error_message TEXT,
            retry_count INTEGER NOT NULL DEFAULT 0
        )",
        "CREATE INDEX IF NOT EXISTS idx_sync_queue_status ON sync_queue(status)",
        "CREATE INDEX IF NOT EXISTS idx_sync_queue_type ON sync_queue(item_type)",
        // Single-row status record
        "CREATE TABLE IF NOT EXISTS sync_status (
            key TEXT PRIMARY KEY,
            last_sync INTEGER,
            status TEXT NOT NULL,
            error TEXT,
            pending_changes INTEGER NOT NULL DEFAULT 0,
            cases_count INTEGER NOT NULL DEFAULT 0,
            notes_count INTEGER NOT NULL DEFAULT 0,
            attachments_count INTEGER NOT NULL DEFAULT 0,
            qr_scans_count INTEGER NOT NULL DEFAULT 0
        )",
        "INSERT OR IGNORE INTO sync_status (key, status) VALUES ('sync-status', 'idle')",
        "CREATE TABLE IF NOT EXISTS sync_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp INTEGER NOT NULL,
            success INTEGER NOT NULL,
            items_synced INTEGER NOT NULL,
            items_failed INTEGER NOT NULL DEFAULT 0,
            message TEXT NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_sync_history_timestamp ON sync_history(timestamp DESC)",
    ];

    apply(conn, 2, &statements)
}

/// Migration to version 3: per-case edit counter
fn migrate_v3(conn: &mut Connection) -> Result<()> {
    let statements = ["ALTER TABLE cases ADD COLUMN revision INTEGER NOT NULL DEFAULT 0"];

    apply(conn, CURRENT_VERSION, &statements)
}
