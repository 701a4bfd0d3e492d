//! # Network Monitor
//!
//! Tracks whether the float plan API is reachable and broadcasts changes.
//!
//! The monitor is a thin wrapper over a `tokio::sync::watch` channel. The
//! platform (or the optional HTTP probe) calls [`ConnectivityMonitor::set_reachable`];
//! the sync engine subscribes and drains when reachability comes back.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Network connectivity status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    Online,
    Offline,
}

impl From<bool> for NetworkStatus {
    fn from(reachable: bool) -> Self {
        if reachable {
            NetworkStatus::Online
        } else {
            NetworkStatus::Offline
        }
    }
}

/// Reachability signal shared between the platform and the sync engine
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    sender: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    pub fn new(initially_reachable: bool) -> Self {
        let (sender, _) = watch::channel(initially_reachable);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Current reachability
    pub fn is_reachable(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn status(&self) -> NetworkStatus {
        self.is_reachable().into()
    }

    /// Report a reachability observation
    ///
    /// Subscribers are only woken when the value actually changes.
    pub fn set_reachable(&self, reachable: bool) {
        let changed = self.sender.send_if_modified(|current| {
            if *current == reachable {
                false
            } else {
                *current = reachable;
                true
            }
        });
        if changed {
            if reachable {
                tracing::info!("[NETWORK] Remote API reachable");
            } else {
                tracing::warn!("[NETWORK] Remote API unreachable");
            }
        }
    }

    /// Subscribe to reachability changes
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }

    /// Poll `url` every `interval` and feed the result into the monitor
    ///
    /// Any HTTP response counts as reachable; connect errors and timeouts
    /// count as unreachable.
    pub fn spawn_probe(&self, url: String, interval: Duration) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            let client = match Client::builder().timeout(interval.min(Duration::from_secs(10))).build() {
                Ok(client) => client,
                Err(e) => {
                    tracing::error!("[NETWORK] Failed to build probe client: {}", e);
                    return;
                }
            };
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let reachable = match client.get(&url).send().await {
                    Ok(_) => true,
                    Err(e) => {
                        tracing::debug!("[NETWORK] Probe {} failed: {}", url, e);
                        false
                    }
                };
                monitor.set_reachable(reachable);
            }
        })
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}
