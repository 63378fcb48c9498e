use std::path::Path;

use caseflow_core::config::DEFAULT_HISTORY_LIMIT;
use caseflow_core::connectivity::ConnectivityProbe;
use caseflow_core::models::{QueueFilter, QueueItemType, QueueStatus, StorageStats};
use caseflow_core::{HttpProbe, PendingChanges, StatusReporter, SyncIndicator, SyncStatus};
use serde::Serialize;

use crate::cli::QueueStatusArg;
use crate::commands::common::{
    format_history_lines, format_queue_lines, format_sync_timestamp, open_store, short_key,
};
use crate::config::{CliConfig, ConfigOverrides};
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct StatusView {
    indicator: SyncIndicator,
    online: bool,
    #[serde(flatten)]
    status: SyncStatus,
    storage: StorageStats,
}

impl From<QueueStatusArg> for QueueStatus {
    fn from(value: QueueStatusArg) -> Self {
        match value {
            QueueStatusArg::Pending => Self::Pending,
            QueueStatusArg::Processing => Self::Processing,
            QueueStatusArg::Error => Self::Error,
        }
    }
}

fn reporter(db_path: &Path) -> Result<StatusReporter, CliError> {
    Ok(StatusReporter::new(open_store(db_path)?))
}

/// Probe the configured service; unconfigured counts as offline.
async fn probe_online(overrides: &ConfigOverrides) -> Result<bool, CliError> {
    match CliConfig::load()?.resolve_settings(overrides)? {
        Some(settings) => Ok(HttpProbe::new(&settings)?.check().await),
        None => Ok(false),
    }
}

pub async fn run_status(
    as_json: bool,
    overrides: &ConfigOverrides,
    db_path: &Path,
) -> Result<(), CliError> {
    let reporter = reporter(db_path)?;
    let online = probe_online(overrides).await?;
    let view = StatusView {
        indicator: reporter.indicator(online).await?,
        online,
        status: reporter.status().await?,
        storage: reporter.storage_stats().await?,
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!("Sync:        {}", view.indicator);
    println!("Engine:      {}", view.status.state);
    println!(
        "Last sync:   {}",
        view.status
            .last_sync
            .map_or_else(|| "never".to_string(), format_sync_timestamp)
    );
    if let Some(error) = &view.status.error {
        println!("Last error:  {error}");
    }
    let counts = view.status.counts;
    println!(
        "Pending:     {} (cases {}, notes {}, attachments {}, QR scans {})",
        view.status.pending_changes, counts.cases, counts.notes, counts.attachments, counts.qr_scans
    );
    println!(
        "Stored:      cases {}, notes {}, attachments {}, queued QR scans {}",
        view.storage.cases, view.storage.notes, view.storage.attachments, view.storage.queued_qr_scans
    );
    Ok(())
}

pub async fn run_history(
    limit: Option<usize>,
    as_json: bool,
    overrides: &ConfigOverrides,
    db_path: &Path,
) -> Result<(), CliError> {
    let limit = match limit {
        Some(limit) => limit,
        None => CliConfig::load()?
            .resolve_settings(overrides)?
            .map_or(DEFAULT_HISTORY_LIMIT, |settings| settings.history_limit),
    };
    let history = reporter(db_path)?.history(limit).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&history)?);
    } else if history.is_empty() {
        println!("No sync passes recorded.");
    } else {
        for line in format_history_lines(&history) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_queue(
    status: Option<QueueStatusArg>,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let items = reporter(db_path)?
        .queue_items(QueueFilter {
            item_type: None,
            status: status.map(QueueStatus::from),
        })
        .await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if items.is_empty() {
        println!("Sync queue is empty.");
    } else {
        for line in format_queue_lines(&items) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn format_pending_lines(pending: &PendingChanges) -> Vec<String> {
    let error_suffix = |error: Option<&str>| error.map_or_else(String::new, |e| format!("  error={e}"));

    let mut lines = Vec::new();
    for case in &pending.cases {
        lines.push(format!(
            "case        {:<13}  {}{}",
            short_key(&case.key),
            case.title,
            error_suffix(case.sync_error.as_deref())
        ));
    }
    for note in &pending.notes {
        lines.push(format!(
            "note        {:<13}  case={}{}",
            short_key(&note.key),
            short_key(&note.case_key),
            error_suffix(note.sync_error.as_deref())
        ));
    }
    for attachment in &pending.attachments {
        lines.push(format!(
            "attachment  {:<13}  case={} {}{}",
            short_key(&attachment.key),
            short_key(&attachment.case_key),
            attachment.name,
            error_suffix(attachment.sync_error.as_deref())
        ));
    }
    for scan in &pending.qr_scans {
        lines.push(format!(
            "{:<10}  {:<13}  {}{}",
            QueueItemType::QrScan.as_str(),
            scan.item_id,
            scan.status,
            error_suffix(scan.error_message.as_deref())
        ));
    }
    lines
}

pub async fn run_pending(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let pending = reporter(db_path)?.pending_changes().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&pending)?);
    } else if pending.is_empty() {
        println!("Nothing waiting to sync.");
    } else {
        for line in format_pending_lines(&pending) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_clear_errors(db_path: &Path) -> Result<(), CliError> {
    let removed = reporter(db_path)?.clear_errors().await?;
    println!("Cleared sync errors ({removed} failed queue items removed)");
    Ok(())
}
