/**
 * floatwatch - headless float plan sync agent
 *
 * Opens the local database, re-arms reminders for active plans, and keeps
 * the operation log draining to the float plan API until Ctrl-C.
 */

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use floatplan::config::Config;
use floatplan::lifecycle::LifecycleController;
use floatplan::local_db::LocalDatabase;
use floatplan::offline::OperationLog;
use floatplan::remote::HttpRemote;
use floatplan::schedule::{DeadlineScheduler, TokioNotifier};
use floatplan::store::PlanStore;
use floatplan::sync::{ConnectivityMonitor, SyncConfig, SyncEngine, SyncEvent};

/// Probe interval when FLOATPLAN_PROBE_URL is set
const PROBE_INTERVAL: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .init();

    tracing::info!("[STARTUP] floatwatch starting");

    let config = Config::load()?;
    let db_path = config.database_path();
    tracing::info!("[STARTUP] Database at {}", db_path.display());
    let db = Arc::new(LocalDatabase::open(&db_path).await?);

    let log = Arc::new(OperationLog::open(Arc::clone(&db)).await?);
    let store = Arc::new(PlanStore::open(Arc::clone(&db)).await?);
    let remote = Arc::new(HttpRemote::new(&config)?);

    // Without a probe we assume the API is reachable; failed calls are retried anyway.
    let monitor = ConnectivityMonitor::new(config.probe_url().is_none());
    let probe = config
        .probe_url()
        .map(|url| monitor.spawn_probe(url.to_string(), PROBE_INTERVAL));

    let engine = SyncEngine::open(
        SyncConfig::from_config(&config),
        db,
        log,
        Arc::clone(&store),
        remote,
        monitor,
    )
    .await?;

    let notifier = Arc::new(TokioNotifier::new());
    let mut notifications = notifier.subscribe();
    let scheduler = Arc::new(DeadlineScheduler::new(notifier));
    let controller = LifecycleController::new(store, scheduler, engine.clone());

    let mut events = engine.subscribe_events();
    controller.restore().await;
    engine.start().await;

    if engine.is_reachable() {
        if let Err(e) = controller.refresh().await {
            tracing::warn!("[STARTUP] Initial refresh failed: {}", e);
        }
    }

    let status = engine.status().await;
    tracing::info!(
        "[STARTUP] {} plan(s), {} pending operation(s), last sync {:?}",
        controller.plans().await.len(),
        status.pending_operations,
        status.last_sync_at
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            notification = notifications.recv() => match notification {
                Ok(n) => {
                    tracing::warn!("[NOTIFY] {}", n.message());
                    for (plan, stage) in controller.escalations(Utc::now()).await {
                        tracing::warn!(
                            "[NOTIFY] {} ({}) escalation stage: {:?}",
                            plan.vessel_name,
                            plan.id,
                            stage
                        );
                    }
                }
                Err(e) => tracing::debug!("Notification stream: {}", e),
            },
            event = events.recv() => match event {
                Ok(SyncEvent::OperationDropped(dropped)) => tracing::warn!(
                    "[EVENT] Discarded {} for plan {}: {:?}",
                    dropped.operation.kind.as_str(),
                    dropped.operation.plan_id,
                    dropped.reason
                ),
                Ok(event) => tracing::debug!("[EVENT] {:?}", event),
                Err(e) => tracing::debug!("Event stream: {}", e),
            },
        }
    }

    tracing::info!("[SHUTDOWN] Stopping");
    engine.stop().await;
    if let Some(probe) = probe {
        probe.abort();
    }
    let pending = controller.pending_operation_count().await;
    if pending > 0 {
        tracing::warn!("[SHUTDOWN] {} operation(s) still queued for next start", pending);
    }
    Ok(())
}
