//! # Sync Engine
//!
//! Moves locally committed mutations to the remote API.
//!
//! ## Flow
//!
//! - [`SyncEngine::submit`] gets every operation the lifecycle controller
//!   emits. It is written to the [`OperationLog`] and, when the remote is
//!   reachable, a drain is requested in the background. The caller never
//!   waits on the network.
//! - [`SyncEngine::try_now`] makes one direct attempt; a retryable failure
//!   queues the operation, a fatal one drops it with an event.
//! - [`SyncEngine::on_reachability_regained`] runs drain passes. Passes never
//!   overlap: requests that arrive while a pass is running collapse into a
//!   single follow-up pass.
//! - [`SyncEngine::pull_and_reconcile`] replaces the local plan and contact
//!   slices with the server's lists and, once a scheduler is attached,
//!   re-arms it to match.
//!
//! ## Background loop
//!
//! [`SyncEngine::start`] spawns a task that drains whenever the
//! [`ConnectivityMonitor`] flips to reachable and on every interval tick
//! while work is pending.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use floatplan::local_db::LocalDatabase;
//! use floatplan::offline::OperationLog;
//! use floatplan::remote::HttpRemote;
//! use floatplan::store::PlanStore;
//! use floatplan::sync::{ConnectivityMonitor, SyncConfig, SyncEngine};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Arc::new(LocalDatabase::in_memory().await?);
//! let log = Arc::new(OperationLog::open(Arc::clone(&db)).await?);
//! let store = Arc::new(PlanStore::open(Arc::clone(&db)).await?);
//! let remote = Arc::new(HttpRemote::with_base_url("http://127.0.0.1:3000", None)?);
//! let monitor = ConnectivityMonitor::new(true);
//!
//! let engine = SyncEngine::open(SyncConfig::default(), db, log, store, remote, monitor).await?;
//! engine.start().await;
//!
//! let mut events = engine.subscribe_events();
//! while let Ok(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! # Ok(())
//! # }
//! ```

pub mod network_monitor;
pub mod sync_state;

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::Config;
use crate::local_db::LocalDatabase;
use crate::offline::{DrainReport, DropReason, DroppedOperation, Operation, OperationLog, RetryPolicy};
use crate::remote::{RemoteApi, RemoteError, ResourceKind};
use crate::schedule::DeadlineScheduler;
use crate::shared::{EmergencyContact, FloatPlan};
use crate::store::PlanStore;

pub use network_monitor::{ConnectivityMonitor, NetworkStatus};
pub use sync_state::{SyncEvent, SyncStatus};

/// Default seconds between background drain attempts
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 30;

/// Configuration for the sync engine
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Retry ceiling and backoff
    pub retry_policy: RetryPolicy,
    /// How often the background loop checks for pending work
    pub sync_interval: Duration,
    /// Capacity of the event broadcast channel
    pub event_capacity: usize,
    /// Pull authoritative lists after a drain empties the log
    pub reconcile_after_drain: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            retry_policy: RetryPolicy::default(),
            sync_interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
            event_capacity: 256,
            reconcile_after_drain: true,
        }
    }
}

impl SyncConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            sync_interval: config.sync_interval(),
            ..Self::default()
        }
    }
}

/// Sync engine errors
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),
    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// Outcome of a direct attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// The remote confirmed it inline
    Synced,
    /// It is waiting in the operation log
    Queued,
    /// The remote rejected it; it was not queued
    Dropped,
}

/// Cheaply cloneable handle to the sync engine
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: SyncConfig,
    db: Arc<LocalDatabase>,
    log: Arc<OperationLog>,
    store: Arc<PlanStore>,
    remote: Arc<dyn RemoteApi>,
    monitor: ConnectivityMonitor,
    events: broadcast::Sender<SyncEvent>,
    /// A drain pass is running
    draining: AtomicBool,
    /// A drain was requested since the current pass started
    drain_requested: AtomicBool,
    last_sync_at: RwLock<Option<DateTime<Utc>>>,
    background_task: Mutex<Option<JoinHandle<()>>>,
    /// Re-armed after every reconcile
    scheduler: OnceLock<Arc<DeadlineScheduler>>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("config", &self.inner.config)
            .field("reachable", &self.inner.monitor.is_reachable())
            .field("draining", &self.inner.draining.load(Ordering::Relaxed))
            .finish()
    }
}

impl SyncEngine {
    /// Build the engine; the last sync time is restored from the database
    pub async fn open(
        config: SyncConfig,
        db: Arc<LocalDatabase>,
        log: Arc<OperationLog>,
        store: Arc<PlanStore>,
        remote: Arc<dyn RemoteApi>,
        monitor: ConnectivityMonitor,
    ) -> Result<Self> {
        let last_sync_at = db.get_last_sync_time().await?;
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                db,
                log,
                store,
                remote,
                monitor,
                events,
                draining: AtomicBool::new(false),
                drain_requested: AtomicBool::new(false),
                last_sync_at: RwLock::new(last_sync_at),
                background_task: Mutex::new(None),
                scheduler: OnceLock::new(),
            }),
        })
    }

    pub fn is_reachable(&self) -> bool {
        self.inner.monitor.is_reachable()
    }

    /// Keep `scheduler` in step with every reconcile
    ///
    /// Only the first scheduler sticks; returns whether `scheduler` is the
    /// attached one.
    pub fn attach_scheduler(&self, scheduler: Arc<DeadlineScheduler>) -> bool {
        let attached = self.inner.scheduler.get_or_init(|| Arc::clone(&scheduler));
        let same = Arc::ptr_eq(attached, &scheduler);
        if !same {
            tracing::warn!("[SYNC] A different scheduler is already attached");
        }
        same
    }

    pub fn monitor(&self) -> &ConnectivityMonitor {
        &self.inner.monitor
    }

    pub fn operation_log(&self) -> &Arc<OperationLog> {
        &self.inner.log
    }

    pub async fn pending_operation_count(&self) -> usize {
        self.inner.log.pending_count().await
    }

    pub async fn last_sync_at(&self) -> Option<DateTime<Utc>> {
        *self.inner.last_sync_at.read().await
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    pub async fn status(&self) -> SyncStatus {
        SyncStatus {
            is_syncing: self.inner.draining.load(Ordering::Acquire),
            pending_operations: self.pending_operation_count().await,
            last_sync_at: self.last_sync_at().await,
            network_status: self.inner.monitor.status(),
        }
    }

    /// Hand an operation to the engine
    ///
    /// Returns once the operation is in the log; remote confirmation is not
    /// awaited. When the remote is reachable a drain is requested.
    pub async fn submit(&self, operation: Operation) -> Result<()> {
        self.inner.log.enqueue(operation).await?;
        if self.is_reachable() {
            self.request_drain();
        }
        Ok(())
    }

    /// Make one attempt against the remote
    ///
    /// Any retryable failure hands the operation to the log. A fatal
    /// response drops it and emits [`SyncEvent::OperationDropped`].
    pub async fn try_now(&self, operation: Operation) -> Result<Submission> {
        if !self.is_reachable() {
            self.inner.log.enqueue(operation).await?;
            return Ok(Submission::Queued);
        }

        match self.inner.remote.apply(&operation).await {
            Ok(()) => {
                tracing::info!(
                    "[SYNC] {} {} confirmed",
                    operation.kind.as_str(),
                    operation.resource_path
                );
                // Already confirmed remotely; a metadata failure is only logged.
                if let Err(e) = self.mark_synced().await {
                    tracing::warn!("[SYNC] Failed to record sync time: {}", e);
                }
                self.emit(SyncEvent::OperationSynced {
                    id: operation.id,
                    kind: operation.kind,
                });
                Ok(Submission::Synced)
            }
            Err(RemoteError::Retryable { message }) => {
                tracing::warn!(
                    "[SYNC] {} {} failed, queuing: {}",
                    operation.kind.as_str(),
                    operation.resource_path,
                    message
                );
                self.inner.log.enqueue(operation).await?;
                Ok(Submission::Queued)
            }
            Err(RemoteError::Fatal { message, .. }) => {
                self.report_dropped(DroppedOperation {
                    operation,
                    reason: DropReason::Fatal(message),
                });
                Ok(Submission::Dropped)
            }
        }
    }

    /// Drain the log, coalescing concurrent requests
    ///
    /// Returns immediately if a pass is already running; that pass runs one
    /// more time before it finishes.
    pub async fn on_reachability_regained(&self) -> Result<()> {
        let inner = &self.inner;
        inner.drain_requested.store(true, Ordering::Release);

        loop {
            if inner
                .draining
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                tracing::debug!("[SYNC] Drain already running, request coalesced");
                return Ok(());
            }

            let result = async {
                while inner.drain_requested.swap(false, Ordering::AcqRel) {
                    self.drain_pass().await?;
                }
                Ok::<(), SyncError>(())
            }
            .await;

            inner.draining.store(false, Ordering::Release);
            result?;

            // A request may have landed between the last check and the release.
            if !inner.drain_requested.load(Ordering::Acquire) {
                return Ok(());
            }
        }
    }

    fn request_drain(&self) {
        let engine = self.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.on_reachability_regained().await {
                tracing::error!("[SYNC] Drain failed: {}", e);
            }
        });
    }

    /// One drain pass over the log
    async fn drain_pass(&self) -> Result<DrainReport> {
        let inner = &self.inner;
        let pending = inner.log.pending_count().await;
        if pending == 0 {
            return Ok(DrainReport::default());
        }
        tracing::info!("[SYNC] Draining {} pending operations", pending);

        let monitor = inner.monitor.clone();
        let remote = Arc::clone(&inner.remote);
        let report = inner
            .log
            .drain(&inner.config.retry_policy, |operation| {
                let monitor = monitor.clone();
                let remote = Arc::clone(&remote);
                async move {
                    if !monitor.is_reachable() {
                        return ControlFlow::Break(());
                    }
                    ControlFlow::Continue(remote.apply(&operation).await)
                }
            })
            .await?;

        for (id, kind) in &report.confirmed {
            self.emit(SyncEvent::OperationSynced { id: *id, kind: *kind });
        }
        for dropped in &report.dropped {
            self.report_dropped(dropped.clone());
        }
        if report.synced > 0 {
            self.mark_synced().await?;
        }

        let remaining = inner.log.pending_count().await;
        if report.halted {
            tracing::warn!("[SYNC] Drain halted, connectivity lost ({} remaining)", remaining);
        }
        tracing::info!(
            "[SYNC] Drain pass finished: {} synced, {} retried, {} dropped, {} remaining",
            report.synced,
            report.retried,
            report.dropped.len(),
            remaining
        );
        self.emit(SyncEvent::DrainCompleted {
            synced: report.synced,
            remaining,
        });

        if inner.config.reconcile_after_drain && report.synced > 0 && remaining == 0 {
            if !report.dropped.is_empty() {
                tracing::warn!(
                    "[SYNC] Skipping reconcile, {} local change(s) were rejected",
                    report.dropped.len()
                );
            } else if self.is_reachable() {
                if let Err(e) = self.pull_and_reconcile().await {
                    tracing::warn!("[SYNC] Reconcile after drain failed: {}", e);
                }
            }
        }

        Ok(report)
    }

    /// Replace the local plan and contact slices with the server's lists
    pub async fn pull_and_reconcile(&self) -> Result<(usize, usize)> {
        let inner = &self.inner;

        let plans: Vec<FloatPlan> = decode_all(inner.remote.list(ResourceKind::FloatPlans).await?)?;
        let contacts: Vec<EmergencyContact> =
            decode_all(inner.remote.list(ResourceKind::EmergencyContacts).await?)?;
        let counts = (plans.len(), contacts.len());

        inner.store.replace_plans(plans).await?;
        inner.store.replace_contacts(contacts).await?;
        if let Some(scheduler) = inner.scheduler.get() {
            scheduler.resync(&inner.store.list().await, Utc::now()).await;
        }
        self.mark_synced().await?;

        tracing::info!(
            "[SYNC] Reconciled {} plans and {} contacts from remote",
            counts.0,
            counts.1
        );
        self.emit(SyncEvent::Reconciled {
            plans: counts.0,
            contacts: counts.1,
        });
        Ok(counts)
    }

    /// Spawn the background loop; calling it twice is a no-op
    pub async fn start(&self) {
        let mut task = self.inner.background_task.lock().await;
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            tracing::warn!("[SYNC] Background loop already running");
            return;
        }

        let weak = Arc::downgrade(&self.inner);
        let reachability = self.inner.monitor.subscribe();
        let interval = self.inner.config.sync_interval;
        *task = Some(tokio::spawn(background_sync_loop(weak, reachability, interval)));
        tracing::info!("[SYNC] Background loop started ({:?} interval)", interval);
    }

    /// Stop the background loop
    pub async fn stop(&self) {
        if let Some(handle) = self.inner.background_task.lock().await.take() {
            handle.abort();
            tracing::info!("[SYNC] Background loop stopped");
        }
    }

    async fn mark_synced(&self) -> Result<()> {
        let now = Utc::now();
        self.inner.db.set_last_sync_time(now).await?;
        *self.inner.last_sync_at.write().await = Some(now);
        Ok(())
    }

    fn report_dropped(&self, dropped: DroppedOperation) {
        let op = &dropped.operation;
        match &dropped.reason {
            DropReason::Fatal(message) => tracing::warn!(
                "[SYNC] Remote rejected {} {} ({}), discarding: {}",
                op.kind.as_str(),
                op.resource_path,
                op.id,
                message
            ),
            DropReason::Exhausted { attempts, last_error } => tracing::error!(
                "[SYNC] Giving up on {} {} ({}) after {} attempts, local change not synced: {}",
                op.kind.as_str(),
                op.resource_path,
                op.id,
                attempts,
                last_error
            ),
        }
        self.emit(SyncEvent::OperationDropped(dropped));
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        if let Some(handle) = self.background_task.get_mut().take() {
            handle.abort();
        }
    }
}

fn decode_all<T: serde::de::DeserializeOwned>(values: Vec<serde_json::Value>) -> Result<Vec<T>> {
    values
        .into_iter()
        .map(serde_json::from_value)
        .collect::<std::result::Result<Vec<T>, _>>()
        .map_err(|e| SyncError::Serialization(e.to_string()))
}

/// Background sync loop
///
/// Holds only a weak reference so dropping the last engine handle ends it.
async fn background_sync_loop(
    engine: Weak<EngineInner>,
    mut reachability: tokio::sync::watch::Receiver<bool>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let regained = tokio::select! {
            changed = reachability.changed() => {
                if changed.is_err() {
                    break;
                }
                let reachable = *reachability.borrow_and_update();
                if !reachable {
                    continue;
                }
                true
            }
            _ = ticker.tick() => false,
        };

        let Some(inner) = engine.upgrade() else {
            break;
        };
        let engine = SyncEngine { inner };

        if !engine.is_reachable() {
            continue;
        }
        if !regained && engine.pending_operation_count().await == 0 {
            continue;
        }
        if regained {
            tracing::info!("[SYNC] Connectivity regained, draining");
        }
        if let Err(e) = engine.on_reachability_regained().await {
            tracing::error!("[SYNC] Sync cycle failed: {}", e);
        }
    }

    tracing::debug!("[SYNC] Background loop exited");
}
