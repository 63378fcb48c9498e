use caseflow_core::SyncSettings;

use crate::cli::ConfigCommands;
use crate::config::{default_config_path, CliConfig, ConfigOverrides};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, overrides: &ConfigOverrides) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            api_url,
            token,
            timeout,
            max_retries,
        } => run_config_init(
            api_url.or_else(|| overrides.api_url.clone()),
            token.or_else(|| overrides.token.clone()),
            timeout,
            max_retries,
        ),
        ConfigCommands::Show => run_config_show(overrides),
    }
}

pub fn run_config_init(
    api_url: Option<String>,
    token: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
) -> Result<(), CliError> {
    let mut config = CliConfig::load()?;
    config.apply_init(api_url, token, timeout_secs, max_retries)?;
    if config.api_base_url.is_none() {
        return Err(CliError::Config(
            "An API base URL is required (--api-url <URL>)".to_string(),
        ));
    }

    let path = config.save()?;
    println!("Saved config to {}", path.display());
    Ok(())
}

/// Settings as the other commands would see them, token masked.
pub fn describe_settings(settings: &SyncSettings) -> Vec<String> {
    vec![
        format!("api_base_url:      {}", settings.api_base_url),
        format!(
            "auth_token:        {}",
            if settings.auth_token.is_some() { "set" } else { "not set" }
        ),
        format!("request_timeout:   {}s", settings.request_timeout.as_secs()),
        format!("max_queue_retries: {}", settings.max_queue_retries),
        format!("history_limit:     {}", settings.history_limit),
        format!("probe_interval:    {}s", settings.probe_interval.as_secs()),
    ]
}

pub fn run_config_show(overrides: &ConfigOverrides) -> Result<(), CliError> {
    println!("Config file: {}", default_config_path()?.display());
    match CliConfig::load()?.resolve_settings(overrides)? {
        Some(settings) => {
            for line in describe_settings(&settings) {
                println!("{line}");
            }
        }
        None => println!("Sync is not configured."),
    }
    Ok(())
}
