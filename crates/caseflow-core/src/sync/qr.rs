//! QR code payloads and scan handling.
//!
//! A scanned code carries a JSON object such as
//! `{"caseId": 42, "title": "Laptop"}`. Decoding the image itself happens
//! elsewhere; this module only sees the decoded text.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::connectivity::ConnectivityMonitor;
use crate::error::{Error, Result};
use crate::tracker::ChangeTracker;
use crate::util::{millis_to_rfc3339, normalize_text_option, now_millis};

use super::payload::QrScanLog;
use super::remote::RemoteApi;

/// Name logged when a code carries neither `title` nor `caseName`.
pub const UNKNOWN_CASE_NAME: &str = "Unknown case";

/// Case identifier as printed on a code: a server id or free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QrCaseId {
    Number(i64),
    Text(String),
}

impl fmt::Display for QrCaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQrPayload {
    case_id: Option<QrCaseId>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    case_name: Option<String>,
}

/// A validated QR payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrPayload {
    pub case_id: QrCaseId,
    pub title: Option<String>,
    pub case_name: Option<String>,
}

impl QrPayload {
    /// Parse decoded QR text; anything but an object with a usable `caseId`
    /// is `MalformedInput`.
    pub fn parse(raw: &str) -> Result<Self> {
        let payload: RawQrPayload = serde_json::from_str(raw.trim())
            .map_err(|error| Error::MalformedInput(format!("QR payload is not valid JSON: {error}")))?;

        let case_id = match payload.case_id {
            Some(QrCaseId::Text(text)) => {
                let text = text.trim().to_string();
                if text.is_empty() {
                    return Err(Error::MalformedInput("QR payload caseId is empty".to_string()));
                }
                QrCaseId::Text(text)
            }
            Some(QrCaseId::Number(id)) => QrCaseId::Number(id),
            None => return Err(Error::MalformedInput("QR payload is missing caseId".to_string())),
        };

        Ok(Self {
            case_id,
            title: normalize_text_option(payload.title),
            case_name: normalize_text_option(payload.case_name),
        })
    }

    /// Display name for the scanned case: `title`, then `caseName`.
    pub fn display_name(&self) -> &str {
        self.title
            .as_deref()
            .or(self.case_name.as_deref())
            .unwrap_or(UNKNOWN_CASE_NAME)
    }

    /// Scan log entry stamped with the current time.
    pub fn scan_log(&self) -> QrScanLog {
        QrScanLog {
            case_id: self.case_id.clone(),
            case_name: self.display_name().to_string(),
            scan_time: millis_to_rfc3339(now_millis()),
        }
    }
}

/// What happened to a processed scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Logged with the server right away
    Logged { case_id: QrCaseId },
    /// Stored in the sync queue for the next pass
    Queued { case_id: QrCaseId, queue_id: String },
}

impl ScanOutcome {
    pub const fn case_id(&self) -> &QrCaseId {
        match self {
            Self::Logged { case_id } | Self::Queued { case_id, .. } => case_id,
        }
    }
}

/// Parse a scanned code and record it.
///
/// When the monitor reports online the scan is logged directly; if that
/// fails, or when offline, it is queued for the next sync pass.
pub async fn process_scanned_code<R: RemoteApi>(
    raw: &str,
    tracker: &ChangeTracker,
    remote: &R,
    connectivity: &ConnectivityMonitor,
) -> Result<ScanOutcome> {
    let payload = QrPayload::parse(raw)?;
    let log = payload.scan_log();

    if connectivity.is_online() {
        match remote.log_qr_scan(&log).await {
            Ok(()) => {
                tracing::info!("Logged QR scan for case {}", payload.case_id);
                return Ok(ScanOutcome::Logged {
                    case_id: payload.case_id,
                });
            }
            Err(error) => {
                tracing::warn!(
                    "Logging QR scan for case {} failed, queueing it: {error}",
                    payload.case_id
                );
            }
        }
    }

    let item = tracker.add_qr_scan_to_queue(&log).await?;
    Ok(ScanOutcome::Queued {
        case_id: payload.case_id,
        queue_id: item.id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_accepts_numeric_and_text_ids() {
        let numeric = QrPayload::parse(r#"{"caseId": 42, "title": "Laptop"}"#).unwrap();
        assert_eq!(numeric.case_id, QrCaseId::Number(42));
        assert_eq!(numeric.display_name(), "Laptop");

        let text = QrPayload::parse(r#"{"caseId": " MC-2024-7 ", "caseName": "Printer"}"#).unwrap();
        assert_eq!(text.case_id, QrCaseId::Text("MC-2024-7".to_string()));
        assert_eq!(text.display_name(), "Printer");
    }

    #[test]
    fn title_wins_over_case_name() {
        let payload =
            QrPayload::parse(r#"{"caseId": 1, "title": "Title", "caseName": "Name"}"#).unwrap();
        assert_eq!(payload.display_name(), "Title");

        let bare = QrPayload::parse(r#"{"caseId": 1}"#).unwrap();
        assert_eq!(bare.display_name(), UNKNOWN_CASE_NAME);
    }

    #[test]
    fn parse_rejects_malformed_payloads() {
        for raw in [
            "not json",
            "[]",
            r#"{"title": "no id"}"#,
            r#"{"caseId": ""}"#,
            r#"{"caseId": true}"#,
        ] {
            let result = QrPayload::parse(raw);
            assert!(
                matches!(result, Err(Error::MalformedInput(_))),
                "{raw} should be malformed, got {result:?}"
            );
        }
    }

    mod processing {
        use super::*;
        use crate::models::{QueueFilter, QueueItemType};
        use crate::store::LocalStore;
        use crate::sync::testing::{Failure, ScriptedRemote};
        use pretty_assertions::assert_eq;

        fn tracker() -> ChangeTracker {
            ChangeTracker::new(LocalStore::open_in_memory().unwrap())
        }

        async fn queued(tracker: &ChangeTracker) -> usize {
            tracker
                .store()
                .read(|conn| {
                    crate::db::QueueRepository::new(conn).list(QueueFilter {
                        item_type: Some(QueueItemType::QrScan),
                        status: None,
                    })
                })
                .await
                .unwrap()
                .len()
        }

        #[tokio::test(flavor = "multi_thread")]
        async fn online_scan_is_logged_directly() {
            let tracker = tracker();
            let remote = ScriptedRemote::default();
            let online = ConnectivityMonitor::new(true);

            let outcome = process_scanned_code(r#"{"caseId": 4, "title": "Modem"}"#, &tracker, &remote, &online)
                .await
                .unwrap();

            assert_eq!(outcome, ScanOutcome::Logged { case_id: QrCaseId::Number(4) });
            assert_eq!(remote.calls(), vec!["POST /api/qr-scans 4".to_string()]);
            assert_eq!(queued(&tracker).await, 0);
        }

        #[tokio::test(flavor = "multi_thread")]
        async fn offline_scan_is_queued_without_calls() {
            let tracker = tracker();
            let remote = ScriptedRemote::default();
            let offline = ConnectivityMonitor::new(false);

            let outcome = process_scanned_code(r#"{"caseId": "MC-3"}"#, &tracker, &remote, &offline)
                .await
                .unwrap();

            assert!(matches!(outcome, ScanOutcome::Queued { .. }));
            assert_eq!(outcome.case_id(), &QrCaseId::Text("MC-3".to_string()));
            assert!(remote.calls().is_empty());
            assert_eq!(queued(&tracker).await, 1);
        }

        #[tokio::test(flavor = "multi_thread")]
        async fn failed_direct_log_falls_back_to_queue() {
            let tracker = tracker();
            let remote = ScriptedRemote::default();
            remote.fail("Modem", Failure::Status(502));
            let online = ConnectivityMonitor::new(true);

            let outcome = process_scanned_code(r#"{"caseId": 4, "title": "Modem"}"#, &tracker, &remote, &online)
                .await
                .unwrap();

            assert!(matches!(outcome, ScanOutcome::Queued { .. }));
            assert_eq!(queued(&tracker).await, 1);
        }

        #[tokio::test(flavor = "multi_thread")]
        async fn malformed_scan_records_nothing() {
            let tracker = tracker();
            let remote = ScriptedRemote::default();
            let online = ConnectivityMonitor::new(true);

            let result = process_scanned_code("{}", &tracker, &remote, &online).await;

            assert!(matches!(result, Err(Error::MalformedInput(_))));
            assert!(remote.calls().is_empty());
            assert_eq!(queued(&tracker).await, 0);
        }
    }

    #[test]
    fn scan_log_serializes_in_wire_format() {
        let payload = QrPayload::parse(r#"{"caseId": 9, "caseName": "Router"}"#).unwrap();
        let value = serde_json::to_value(payload.scan_log()).unwrap();
        assert_eq!(value["caseId"], 9);
        assert_eq!(value["caseName"], "Router");
        assert!(value["scanTime"].as_str().unwrap().ends_with('Z'));
    }
}
