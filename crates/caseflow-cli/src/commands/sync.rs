use std::future::Future;
use std::path::Path;
use std::time::Duration;

use caseflow_core::connectivity::{run_probe_loop, Subscription};
use caseflow_core::{
    ConnectivityEvent, ConnectivityMonitor, HttpProbe, HttpRemoteApi, LocalStore, RemoteApi,
    SyncEngine, SyncOutcome,
};
use tokio::sync::watch;

use crate::commands::common::open_store;
use crate::config::{CliConfig, ConfigOverrides};
use crate::error::CliError;

fn build_engine(
    store: LocalStore,
    overrides: &ConfigOverrides,
) -> Result<SyncEngine<HttpRemoteApi>, CliError> {
    let settings = CliConfig::load()?.require_settings(overrides)?;
    let max_retries = settings.max_queue_retries;
    let remote = HttpRemoteApi::new(settings)?;
    Ok(SyncEngine::new(store, remote).with_max_queue_retries(max_retries))
}

pub fn describe_outcome(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::AlreadyRunning => "A sync pass is already running".to_string(),
        SyncOutcome::Completed(report) => report.message.clone(),
    }
}

pub async fn run_sync(overrides: &ConfigOverrides, db_path: &Path) -> Result<(), CliError> {
    let engine = build_engine(open_store(db_path)?, overrides)?;
    let outcome = engine.sync().await?;
    println!("{}", describe_outcome(&outcome));
    Ok(())
}

/// Run a pass on every `Connected` until `shutdown` completes.
///
/// `shutdown` is only checked between events, so a pass that has started
/// always runs to the end.
pub async fn sync_on_reconnect<R, S>(engine: &SyncEngine<R>, mut events: Subscription, shutdown: S)
where
    R: RemoteApi,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        let event = tokio::select! {
            () = &mut shutdown => break,
            event = events.next() => event,
        };
        match event {
            Some(ConnectivityEvent::Connected) => {
                println!("Service reachable, syncing");
                match engine.sync().await {
                    Ok(outcome) => println!("{}", describe_outcome(&outcome)),
                    Err(error) => tracing::error!("Sync pass failed: {error}"),
                }
            }
            Some(ConnectivityEvent::Disconnected) => println!("Service unreachable, waiting"),
            None => break,
        }
    }
}

async fn stopped(mut stop: watch::Receiver<bool>) {
    // A dropped sender also means stop
    let _ = stop.wait_for(|stop| *stop).await;
}

/// Probe until interrupted and run a pass on every reconnect.
pub async fn run_watch(
    interval_secs: Option<u64>,
    overrides: &ConfigOverrides,
    db_path: &Path,
) -> Result<(), CliError> {
    let engine = build_engine(open_store(db_path)?, overrides)?;
    let settings = engine.remote().settings();
    let interval = interval_secs
        .filter(|secs| *secs > 0)
        .map_or(settings.probe_interval, Duration::from_secs);
    let probe = HttpProbe::new(settings)?;

    let monitor = ConnectivityMonitor::new(false);
    let events = monitor.subscribe();

    println!(
        "Watching {} every {}s (Ctrl-C to stop)",
        settings.api_base_url,
        interval.as_secs()
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    let interrupt = async move {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {error}");
        }
        let _ = stop_tx.send(true);
    };

    tokio::join!(
        interrupt,
        run_probe_loop(&probe, &monitor, interval, stopped(stop_rx.clone())),
        sync_on_reconnect(&engine, events, stopped(stop_rx)),
    );

    println!("Stopped watching");
    Ok(())
}
