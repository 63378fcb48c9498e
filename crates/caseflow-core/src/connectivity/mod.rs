//! Online/offline tracking.
//!
//! The monitor only reports transitions; callers decide what to do with them
//! (the CLI's `watch` command runs a sync pass on every `Connected`).

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::SyncSettings;

const EVENT_CAPACITY: usize = 64;
const MAX_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// A connectivity transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    Connected,
    Disconnected,
}

struct Inner {
    online: AtomicBool,
    event_tx: broadcast::Sender<ConnectivityEvent>,
}

/// Current connectivity plus a fan-out of transitions to subscribers.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    inner: Arc<Inner>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                online: AtomicBool::new(initially_online),
                event_tx,
            }),
        }
    }

    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }

    /// Record the observed state; emits one event only if it changed.
    ///
    /// Returns whether this call was a transition.
    pub fn set_online(&self, online: bool) -> bool {
        let previous = self.inner.online.swap(online, Ordering::SeqCst);
        if previous == online {
            return false;
        }

        let event = if online {
            ConnectivityEvent::Connected
        } else {
            ConnectivityEvent::Disconnected
        };
        tracing::info!("Connectivity changed: {event:?}");
        // No receivers is fine
        let _ = self.inner.event_tx.send(event);
        true
    }

    /// Receive every transition from now on.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.inner.event_tx.subscribe(),
        }
    }
}

/// Handle yielding connectivity events; dropping it unsubscribes.
pub struct Subscription {
    rx: broadcast::Receiver<ConnectivityEvent>,
}

impl Subscription {
    /// Next transition, or `None` once the monitor is gone.
    pub async fn next(&mut self) -> Option<ConnectivityEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Connectivity subscriber skipped {skipped} events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {}
}

/// A way of finding out whether the remote service is reachable.
#[allow(async_fn_in_trait)]
pub trait ConnectivityProbe {
    async fn check(&self) -> bool;
}

/// Treats any HTTP answer from the API base URL as online.
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpProbe {
    pub fn new(settings: &SyncSettings) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout.min(MAX_PROBE_TIMEOUT))
            .build()
            .map_err(|error| crate::Error::Config(format!("failed to build HTTP client: {error}")))?;
        Ok(Self {
            client,
            url: settings.api_base_url.clone(),
        })
    }
}

impl ConnectivityProbe for HttpProbe {
    async fn check(&self) -> bool {
        match self.client.head(&self.url).send().await {
            Ok(_) => true,
            Err(error) => {
                tracing::debug!("Connectivity probe failed: {error}");
                false
            }
        }
    }
}

/// Probe every `interval` and feed the results into `monitor` until
/// `shutdown` completes.
pub async fn run_probe_loop<P, S>(
    probe: &P,
    monitor: &ConnectivityMonitor,
    interval: Duration,
    shutdown: S,
) where
    P: ConnectivityProbe,
    S: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => break,
            _ = ticker.tick() => {
                let online = probe.check().await;
                monitor.set_online(online);
            }
        }
    }
}
