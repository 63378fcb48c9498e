use std::path::Path;

use caseflow_core::models::{SyncHistoryEntry, SyncQueueItem};
use caseflow_core::{CaseRecord, LocalStore, RecordKey};
use chrono::Utc;
use serde::Serialize;

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct CaseListItem {
    pub id: String,
    pub title: String,
    pub status: String,
    pub client_name: String,
    pub updated_at: i64,
    pub relative_time: String,
    pub needs_sync: bool,
    pub sync_error: Option<String>,
}

pub fn open_store(db_path: &Path) -> Result<LocalStore, CliError> {
    Ok(LocalStore::open(db_path)?)
}

pub fn parse_record_key(id: &str) -> Result<RecordKey, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(CliError::CaseNotFound(String::new()));
    }
    Ok(trimmed.parse::<RecordKey>()?)
}

pub async fn resolve_case(store: &LocalStore, id: &str) -> Result<CaseRecord, CliError> {
    let key = parse_record_key(id)?;
    store
        .get_case(key)
        .await?
        .ok_or_else(|| CliError::CaseNotFound(id.trim().to_string()))
}

pub fn normalize_note_text(parts: &[String]) -> Result<String, CliError> {
    let text = parts.join(" ");
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyNote)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn case_to_list_item(case: &CaseRecord) -> CaseListItem {
    CaseListItem {
        id: case.key.to_string(),
        title: case.title.clone(),
        status: case.status.clone(),
        client_name: case.client_name.clone(),
        updated_at: case.updated_at,
        relative_time: format_relative_time(case.updated_at, Utc::now().timestamp_millis()),
        needs_sync: case.needs_sync,
        sync_error: case.sync_error.clone(),
    }
}

/// Short id column: server ids in full, local ids cut to 13 characters.
pub fn short_key(key: &RecordKey) -> String {
    key.to_string().chars().take(13).collect()
}

pub fn sync_marker(needs_sync: bool, sync_error: Option<&str>) -> &'static str {
    match (needs_sync, sync_error) {
        (true, Some(_)) => "!",
        (true, None) => "*",
        (false, _) => " ",
    }
}

pub fn format_case_lines(cases: &[CaseRecord]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    cases
        .iter()
        .map(|case| {
            format!(
                "{} {:<13}  {:<12}  {:<40}  {}",
                sync_marker(case.needs_sync, case.sync_error.as_deref()),
                short_key(&case.key),
                case.status,
                truncate(&case.title, 40),
                format_relative_time(case.updated_at, now_ms)
            )
        })
        .collect()
}

pub fn format_history_lines(entries: &[SyncHistoryEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            format!(
                "{}  {:<4}  synced={:<3} failed={:<3} {}",
                format_sync_timestamp(entry.timestamp),
                if entry.success { "ok" } else { "FAIL" },
                entry.items_synced,
                entry.items_failed,
                entry.message
            )
        })
        .collect()
}

pub fn format_queue_lines(items: &[SyncQueueItem]) -> Vec<String> {
    items
        .iter()
        .map(|item| {
            let mut line = format!(
                "{}  {:<10}  {:<8}  item={}  retries={}",
                format_sync_timestamp(item.timestamp),
                item.status.as_str(),
                item.item_type.as_str(),
                item.item_id,
                item.retry_count
            );
            if let Some(error) = &item.error_message {
                line.push_str("  error=");
                line.push_str(error);
            }
            line
        })
        .collect()
}

pub fn truncate(value: &str, max_chars: usize) -> String {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let mut truncated = collapsed
            .chars()
            .take(max_chars.saturating_sub(3))
            .collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else {
        format!("{}d ago", diff / day)
    }
}
