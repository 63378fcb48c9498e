use std::path::Path;

use caseflow_core::connectivity::ConnectivityProbe;
use caseflow_core::sync::{process_scanned_code, QrPayload, ScanOutcome};
use caseflow_core::{ChangeTracker, ConnectivityMonitor, HttpProbe, HttpRemoteApi};

use crate::commands::common::open_store;
use crate::config::{CliConfig, ConfigOverrides};
use crate::error::CliError;

pub async fn run_scan(
    payload: &str,
    offline: bool,
    overrides: &ConfigOverrides,
    db_path: &Path,
) -> Result<(), CliError> {
    let tracker = ChangeTracker::new(open_store(db_path)?);

    let settings = if offline {
        None
    } else {
        CliConfig::load()?.resolve_settings(overrides)?
    };

    let outcome = match settings {
        Some(settings) => {
            let monitor = ConnectivityMonitor::new(false);
            monitor.set_online(HttpProbe::new(&settings)?.check().await);
            let remote = HttpRemoteApi::new(settings)?;
            process_scanned_code(payload, &tracker, &remote, &monitor).await?
        }
        None => {
            // Nothing to talk to; validate and queue.
            let parsed = QrPayload::parse(payload)?;
            let item = tracker.add_qr_scan_to_queue(&parsed.scan_log()).await?;
            ScanOutcome::Queued {
                case_id: parsed.case_id,
                queue_id: item.id,
            }
        }
    };

    match outcome {
        ScanOutcome::Logged { case_id } => println!("Logged scan for case {case_id}"),
        ScanOutcome::Queued { case_id, queue_id } => {
            println!("Queued scan for case {case_id} ({queue_id}); it will be sent on the next sync");
        }
    }
    Ok(())
}
