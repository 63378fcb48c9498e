//! Caseflow CLI - record maintenance cases offline and sync them later

mod cli;
mod commands;
mod config;
mod error;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::case::run_case;
use crate::commands::config::run_config;
use crate::commands::note::{run_attach, run_note};
use crate::commands::scan::run_scan;
use crate::commands::status::{run_clear_errors, run_history, run_pending, run_queue, run_status};
use crate::commands::sync::{run_sync, run_watch};
use crate::config::{resolve_db_path, ConfigOverrides};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("caseflow=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path)?;
    let overrides = ConfigOverrides {
        api_url: cli.api_url,
        token: cli.token,
    };

    match cli.command {
        Commands::Case { command } => run_case(command, &db_path).await?,
        Commands::Note { command } => run_note(command, &db_path).await?,
        Commands::Attach { case, file, mime } => {
            run_attach(&case, &file, mime.as_deref(), &db_path).await?;
        }
        Commands::Scan { payload, offline } => {
            run_scan(&payload, offline, &overrides, &db_path).await?;
        }
        Commands::Sync => run_sync(&overrides, &db_path).await?,
        Commands::Status { json } => run_status(json, &overrides, &db_path).await?,
        Commands::History { limit, json } => {
            run_history(limit, json, &overrides, &db_path).await?;
        }
        Commands::Queue { status, json } => run_queue(status, json, &db_path).await?,
        Commands::Pending { json } => run_pending(json, &db_path).await?,
        Commands::ClearErrors => run_clear_errors(&db_path).await?,
        Commands::Watch { interval } => run_watch(interval, &overrides, &db_path).await?,
        Commands::Config { command } => run_config(command, &overrides)?,
    }

    Ok(())
}
