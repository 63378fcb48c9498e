//! Remote case service client.

use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::config::SyncSettings;
use crate::util::compact_text;

use super::payload::{
    AttachmentUpload, CasePayload, NotePayload, QrScanLog, ServerAttachment, ServerCase,
    ServerNote,
};

/// Failure of a single remote call.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Transport failure: connect, timeout, TLS, interrupted body
    #[error("Network error: {0}")]
    Network(String),
    /// The server answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Rejected { status: u16, message: String },
    /// The server answered 2xx with a body we could not read
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Whether the failure says nothing about the request itself.
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    fn from_reqwest(error: &reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}

/// Operations the sync engine needs from the server.
#[allow(async_fn_in_trait)]
pub trait RemoteApi {
    async fn create_case(&self, body: &CasePayload) -> Result<ServerCase, RemoteError>;

    async fn update_case(&self, id: i64, body: &CasePayload) -> Result<ServerCase, RemoteError>;

    async fn create_note(&self, body: &NotePayload) -> Result<ServerNote, RemoteError>;

    async fn update_note(&self, id: i64, body: &NotePayload) -> Result<ServerNote, RemoteError>;

    async fn create_attachment(
        &self,
        upload: &AttachmentUpload,
    ) -> Result<ServerAttachment, RemoteError>;

    async fn update_attachment(
        &self,
        id: i64,
        upload: &AttachmentUpload,
    ) -> Result<ServerAttachment, RemoteError>;

    async fn log_qr_scan(&self, scan: &QrScanLog) -> Result<(), RemoteError>;
}

/// `reqwest` implementation of [`RemoteApi`].
#[derive(Clone)]
pub struct HttpRemoteApi {
    settings: SyncSettings,
    client: reqwest::Client,
}

impl HttpRemoteApi {
    pub fn new(settings: SyncSettings) -> crate::Result<Self> {
        settings.validate()?;
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|error| crate::Error::Config(format!("failed to build HTTP client: {error}")))?;
        Ok(Self { settings, client })
    }

    pub const fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header(reqwest::header::ACCEPT, "application/json");
        match self.settings.auth_token.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, RemoteError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|error| RemoteError::from_reqwest(&error))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::Rejected {
            status: status.as_u16(),
            message: parse_api_error(status, &body),
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RemoteError> {
        let response = self.send(request).await?;
        let body = response
            .bytes()
            .await
            .map_err(|error| RemoteError::Network(error.to_string()))?;
        serde_json::from_slice(&body).map_err(|error| RemoteError::Decode(error.to_string()))
    }

    fn attachment_form(upload: &AttachmentUpload) -> Result<Form, RemoteError> {
        let metadata = serde_json::to_string(&upload.metadata)
            .map_err(|error| RemoteError::Decode(error.to_string()))?;
        let file = Part::bytes(upload.data.clone())
            .file_name(upload.metadata.name.clone())
            .mime_str(&upload.metadata.mime_type)
            .or_else(|_| {
                Part::bytes(upload.data.clone())
                    .file_name(upload.metadata.name.clone())
                    .mime_str("application/octet-stream")
            })
            .map_err(|error| RemoteError::Decode(error.to_string()))?;
        Ok(Form::new().text("metadata", metadata).part("file", file))
    }
}

impl RemoteApi for HttpRemoteApi {
    async fn create_case(&self, body: &CasePayload) -> Result<ServerCase, RemoteError> {
        let url = self.settings.endpoint("/api/cases");
        self.send_json(self.client.post(url).json(body)).await
    }

    async fn update_case(&self, id: i64, body: &CasePayload) -> Result<ServerCase, RemoteError> {
        let url = self.settings.endpoint(&format!("/api/cases/{id}"));
        self.send_json(self.client.put(url).json(body)).await
    }

    async fn create_note(&self, body: &NotePayload) -> Result<ServerNote, RemoteError> {
        let url = self.settings.endpoint("/api/notes");
        self.send_json(self.client.post(url).json(body)).await
    }

    async fn update_note(&self, id: i64, body: &NotePayload) -> Result<ServerNote, RemoteError> {
        let url = self.settings.endpoint(&format!("/api/notes/{id}"));
        self.send_json(self.client.put(url).json(body)).await
    }

    async fn create_attachment(
        &self,
        upload: &AttachmentUpload,
    ) -> Result<ServerAttachment, RemoteError> {
        let url = self.settings.endpoint("/api/attachments");
        let form = Self::attachment_form(upload)?;
        self.send_json(self.client.post(url).multipart(form)).await
    }

    async fn update_attachment(
        &self,
        id: i64,
        upload: &AttachmentUpload,
    ) -> Result<ServerAttachment, RemoteError> {
        let url = self.settings.endpoint(&format!("/api/attachments/{id}"));
        let form = Self::attachment_form(upload)?;
        self.send_json(self.client.put(url).multipart(form)).await
    }

    async fn log_qr_scan(&self, scan: &QrScanLog) -> Result<(), RemoteError> {
        let url = self.settings.endpoint("/api/qr-scans");
        self.send(self.client.post(url).json(scan)).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return compact_text(&message);
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        compact_text(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewCase, CaseRecord};
    use crate::sync::qr::QrCaseId;
    use mockito::{Matcher, Server};
    use std::time::Duration;

    fn client_for(url: &str) -> HttpRemoteApi {
        let settings = SyncSettings::new(url)
            .unwrap()
            .with_auth_token(Some("secret-token".to_string()))
            .with_request_timeout(Duration::from_secs(5));
        HttpRemoteApi::new(settings).unwrap()
    }

    fn case_body() -> CasePayload {
        let case = CaseRecord::new_local(NewCase {
            title: "Dead pixel".to_string(),
            ..NewCase::default()
        })
        .unwrap();
        CasePayload::from(&case)
    }

    #[test]
    fn parse_api_error_prefers_message_field() {
        assert_eq!(
            parse_api_error(StatusCode::BAD_REQUEST, r#"{"message":"title required"}"#),
            "title required"
        );
        assert_eq!(
            parse_api_error(StatusCode::INTERNAL_SERVER_ERROR, "  "),
            "Internal Server Error"
        );
        assert_eq!(parse_api_error(StatusCode::BAD_GATEWAY, "upstream down"), "upstream down");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_case_posts_json_with_bearer_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/cases")
            .match_header("authorization", "Bearer secret-token")
            .match_body(Matcher::PartialJson(serde_json::json!({"title": "Dead pixel"})))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": 31, "title": "Dead pixel", "status": "open"}"#)
            .create_async()
            .await;

        let created = client_for(&server.url())
            .create_case(&case_body())
            .await
            .unwrap();
        assert_eq!(created.id, 31);
        assert_eq!(created.status.as_deref(), Some("open"));
        mock.assert_async().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_case_targets_server_id() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", "/api/cases/31")
            .with_status(200)
            .with_body(r#"{"id": 31}"#)
            .create_async()
            .await;

        let updated = client_for(&server.url())
            .update_case(31, &case_body())
            .await
            .unwrap();
        assert_eq!(updated.id, 31);
        mock.assert_async().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rejected_status_is_reported() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/api/cases")
            .with_status(500)
            .with_body(r#"{"error":"database unavailable"}"#)
            .create_async()
            .await;

        let error = client_for(&server.url())
            .create_case(&case_body())
            .await
            .unwrap_err();
        assert!(!error.is_network());
        match error {
            RemoteError::Rejected { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "database unavailable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_body_is_a_decode_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/api/notes")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let body = NotePayload {
            case_id: 1,
            text: "Replaced fan".to_string(),
            created_by: "sam".to_string(),
            created_at: "2024-01-01T00:00:00.000Z".to_string(),
        };
        let error = client_for(&server.url())
            .create_note(&body)
            .await
            .unwrap_err();
        assert!(matches!(error, RemoteError::Decode(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn attachment_upload_is_multipart() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/attachments")
            .match_header(
                "content-type",
                Matcher::Regex("^multipart/form-data; boundary=".to_string()),
            )
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#"name="metadata""#.to_string()),
                Matcher::Regex(r#"name="file"; filename="scan.png""#.to_string()),
            ]))
            .with_status(201)
            .with_body(r#"{"id": 5, "caseId": 31, "name": "scan.png"}"#)
            .create_async()
            .await;

        let attachment = crate::models::AttachmentRecord::new_local(
            crate::models::RecordKey::Server(31),
            "scan.png",
            "image/png",
            b"fake-png-bytes".to_vec(),
        )
        .unwrap();
        let created = client_for(&server.url())
            .create_attachment(&AttachmentUpload::new(&attachment, 31))
            .await
            .unwrap();
        assert_eq!(created.id, 5);
        assert_eq!(created.case_id, Some(31));
        mock.assert_async().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn qr_scan_log_accepts_empty_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/qr-scans")
            .match_body(Matcher::PartialJson(
                serde_json::json!({"caseId": "MC-7", "caseName": "Router"}),
            ))
            .with_status(204)
            .create_async()
            .await;

        let scan = QrScanLog {
            case_id: QrCaseId::Text("MC-7".to_string()),
            case_name: "Router".to_string(),
            scan_time: "2024-01-01T00:00:00.000Z".to_string(),
        };
        client_for(&server.url()).log_qr_scan(&scan).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreachable_server_is_a_network_error() {
        // Port 9 (discard) on localhost is closed in test environments
        let error = client_for("http://127.0.0.1:9")
            .create_case(&case_body())
            .await
            .unwrap_err();
        assert!(error.is_network(), "expected network error, got {error:?}");
    }
}
