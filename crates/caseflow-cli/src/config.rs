//! Persistent CLI configuration.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use caseflow_core::config::normalize_base_url;
use caseflow_core::util::normalize_text_option;
use caseflow_core::SyncSettings;
use serde::{Deserialize, Serialize};

use crate::error::CliError;

const CONFIG_FILE_NAME: &str = "cli-config.json";

pub const API_URL_ENV: &str = "CASEFLOW_API_URL";
pub const AUTH_TOKEN_ENV: &str = "CASEFLOW_AUTH_TOKEN";
pub const DB_PATH_ENV: &str = "CASEFLOW_DB_PATH";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_queue_retries: Option<u32>,
}

/// Values given on the command line; they win over env and file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_url: Option<String>,
    pub token: Option<String>,
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> Result<PathBuf, CliError> {
    dirs::config_dir()
        .map(|dir| dir.join("caseflow").join(CONFIG_FILE_NAME))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI config directory".to_string()))
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os(DB_PATH_ENV).map(PathBuf::from)) {
        return Ok(path);
    }
    dirs::data_dir()
        .map(|dir| dir.join("caseflow").join("caseflow.db"))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

impl CliConfig {
    pub fn load() -> Result<Self, CliError> {
        Self::load_from_path(&default_config_path()?)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, CliError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|error| {
            CliError::Config(format!("Failed to read config at {}: {error}", path.display()))
        })?;
        let mut config = serde_json::from_str::<Self>(&raw).map_err(|error| {
            CliError::Config(format!("Failed to parse config at {}: {error}", path.display()))
        })?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, CliError> {
        let path = default_config_path()?;
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), CliError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        std::fs::write(path, serde_json::to_string_pretty(&normalized)?)?;
        Ok(())
    }

    fn normalize(&mut self) {
        self.version = default_config_version();
        self.api_base_url = normalize_text_option(self.api_base_url.take());
        self.auth_token = normalize_text_option(self.auth_token.take());
    }

    /// Sync settings from flags, then environment, then this file.
    ///
    /// `None` when no base URL is configured anywhere.
    pub fn resolve_settings(
        &self,
        overrides: &ConfigOverrides,
    ) -> Result<Option<SyncSettings>, CliError> {
        let api_url = normalize_text_option(overrides.api_url.clone())
            .or_else(|| normalize_text_option(env::var(API_URL_ENV).ok()))
            .or_else(|| self.api_base_url.clone());
        let Some(api_url) = api_url else {
            return Ok(None);
        };

        let token = normalize_text_option(overrides.token.clone())
            .or_else(|| normalize_text_option(env::var(AUTH_TOKEN_ENV).ok()))
            .or_else(|| self.auth_token.clone());

        let mut settings = SyncSettings::new(&api_url)?.with_auth_token(token);
        if let Some(secs) = self.request_timeout_secs {
            settings = settings.with_request_timeout(Duration::from_secs(secs));
        }
        if let Some(retries) = self.max_queue_retries {
            settings = settings.with_max_queue_retries(retries);
        }
        settings.validate()?;
        Ok(Some(settings))
    }

    pub fn require_settings(&self, overrides: &ConfigOverrides) -> Result<SyncSettings, CliError> {
        self.resolve_settings(overrides)?
            .ok_or(CliError::SyncNotConfigured)
    }

    /// Merge `config init` arguments into this config.
    pub fn apply_init(
        &mut self,
        api_url: Option<String>,
        token: Option<String>,
        timeout_secs: Option<u64>,
        max_retries: Option<u32>,
    ) -> Result<(), CliError> {
        if let Some(url) = normalize_text_option(api_url) {
            self.api_base_url = Some(normalize_base_url(&url)?);
        }
        if let Some(token) = normalize_text_option(token) {
            self.auth_token = Some(token);
        }
        if let Some(secs) = timeout_secs {
            if secs == 0 {
                return Err(CliError::Config(
                    "Request timeout must be at least one second".to_string(),
                ));
            }
            self.request_timeout_secs = Some(secs);
        }
        if max_retries.is_some() {
            self.max_queue_retries = max_retries;
        }
        Ok(())
    }
}
