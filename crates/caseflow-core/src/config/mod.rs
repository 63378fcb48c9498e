//! Remote sync configuration.
//!
//! `SyncSettings` is built by the caller (the CLI resolves it from flags,
//! environment and its config file) and handed to the remote client, the
//! connectivity probe and the sync engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_QUEUE_RETRIES: u32 = 5;
pub const DEFAULT_HISTORY_LIMIT: usize = 20;
pub const DEFAULT_PROBE_INTERVAL_SECS: u64 = 15;

/// Settings for talking to the remote case service.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Base URL without trailing slash, e.g. `https://cases.example.com`
    pub api_base_url: String,
    /// Bearer token sent with every request
    pub auth_token: Option<String>,
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
    /// Attempts after which an errored queue item is no longer retried
    pub max_queue_retries: u32,
    /// Default number of history entries shown
    pub history_limit: usize,
    #[serde(with = "duration_secs")]
    pub probe_interval: Duration,
}

impl std::fmt::Debug for SyncSettings {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SyncSettings")
            .field("api_base_url", &self.api_base_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout", &self.request_timeout)
            .field("max_queue_retries", &self.max_queue_retries)
            .field("history_limit", &self.history_limit)
            .field("probe_interval", &self.probe_interval)
            .finish()
    }
}

impl SyncSettings {
    /// Settings with defaults for everything but the base URL.
    pub fn new(api_base_url: &str) -> Result<Self> {
        Ok(Self {
            api_base_url: normalize_base_url(api_base_url)?,
            auth_token: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_queue_retries: DEFAULT_MAX_QUEUE_RETRIES,
            history_limit: DEFAULT_HISTORY_LIMIT,
            probe_interval: Duration::from_secs(DEFAULT_PROBE_INTERVAL_SECS),
        })
    }

    #[must_use]
    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = normalize_text_option(token);
        self
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_max_queue_retries(mut self, retries: u32) -> Self {
        self.max_queue_retries = retries;
        self
    }

    /// Check invariants of settings built by hand or loaded from disk.
    pub fn validate(&self) -> Result<()> {
        normalize_base_url(&self.api_base_url)?;
        if self.request_timeout.is_zero() {
            return Err(Error::Config("request timeout must be positive".to_string()));
        }
        if self.probe_interval.is_zero() {
            return Err(Error::Config("probe interval must be positive".to_string()));
        }
        Ok(())
    }

    /// Absolute URL for an API path such as `/api/cases`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base_url, path.trim_start_matches('/'))
    }
}

/// Trim a base URL, require an http(s) scheme and drop trailing slashes.
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let value = normalize_text_option(Some(raw.to_string()))
        .ok_or_else(|| Error::Config("API base URL is required".to_string()))?;
    if !is_http_url(&value) {
        return Err(Error::Config(format!(
            "API base URL must include http:// or https:// (got '{value}')"
        )));
    }
    Ok(value.trim_end_matches('/').to_string())
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
