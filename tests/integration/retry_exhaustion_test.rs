//! Retry ceiling, fatal drops and the events they emit

use assert_matches::assert_matches;
use floatplan::offline::{DropReason, Operation};
use floatplan::remote::RemoteError;
use floatplan::shared::PlanStatus;
use floatplan::sync::{SyncConfig, SyncEvent};

use crate::common::{plan_due_in, test_sync_config, Harness};

#[tokio::test]
async fn test_five_retryable_failures_exhaust_operation() {
    let harness = Harness::new(false).await;
    harness.remote.always(Err(RemoteError::retryable("503 Service Unavailable")));
    let op = Operation::check_in(&plan_due_in(60));
    harness.engine.submit(op.clone()).await.unwrap();
    let mut events = harness.engine.subscribe_events();

    harness.monitor.set_reachable(true);
    for _ in 0..6 {
        harness.engine.on_reachability_regained().await.unwrap();
    }

    assert_eq!(harness.remote.attempt_count(), 5);
    assert_eq!(harness.engine.pending_operation_count().await, 0);

    let mut dropped = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SyncEvent::OperationDropped(d) = event {
            dropped.push(d);
        }
    }
    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0].operation.id, op.id);
    assert_matches!(
        &dropped[0].reason,
        DropReason::Exhausted { attempts: 5, last_error } if last_error.contains("503")
    );
}

#[tokio::test]
async fn test_retry_count_persists_between_passes() {
    let harness = Harness::new(false).await;
    harness.remote.always(Err(RemoteError::retryable("timeout")));
    harness
        .engine
        .submit(Operation::check_in(&plan_due_in(60)))
        .await
        .unwrap();

    harness.go_online_and_drain().await;
    harness.engine.on_reachability_regained().await.unwrap();

    let queued = harness.engine.operation_log().snapshot().await;
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].retry_count, 2);
    assert!(queued[0].last_attempt.is_some());

    let reloaded = harness.db.load_operations().await.unwrap();
    assert_eq!(reloaded[0].retry_count, 2);
}

#[tokio::test]
async fn test_recovery_before_ceiling_syncs() {
    let harness = Harness::new(false).await;
    harness.remote.script([
        Err(RemoteError::retryable("timeout")),
        Err(RemoteError::retryable("timeout")),
    ]);
    let plan = plan_due_in(60);
    harness.remote.seed_plan(&plan);
    harness
        .engine
        .submit(Operation::check_in(&plan))
        .await
        .unwrap();

    for _ in 0..3 {
        harness.go_online_and_drain().await;
    }

    assert_eq!(harness.remote.attempt_count(), 3);
    assert_eq!(harness.engine.pending_operation_count().await, 0);
}

#[tokio::test]
async fn test_fatal_drop_keeps_local_state() {
    let harness = Harness::new(false).await;
    let plan = harness.active_plan(60).await;
    harness.controller.check_in(plan.id, None).await.unwrap();
    // Rejected once before its plan lands, then again on the retry.
    harness.remote.script([
        Err(RemoteError::fatal(Some(409), "plan already closed")),
        Ok(()),
        Ok(()),
        Err(RemoteError::fatal(Some(409), "plan already closed")),
    ]);
    let mut events = harness.engine.subscribe_events();

    harness.go_online_and_drain().await;

    let mut dropped = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SyncEvent::OperationDropped(d) = event {
            dropped.push(d);
        }
    }
    assert_eq!(harness.remote.attempt_count(), 4);
    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0].operation.plan_id, plan.id);
    assert_matches!(&dropped[0].reason, DropReason::Fatal(message) if message == "plan already closed");
    // Rejected by the server, but the local check-in stands.
    let stored = harness.controller.plan(&plan.id).await.unwrap();
    assert_eq!(stored.status, PlanStatus::CheckedIn);
    assert_eq!(harness.engine.pending_operation_count().await, 0);
}

#[tokio::test]
async fn test_rejected_write_skips_reconcile() {
    let config = SyncConfig {
        reconcile_after_drain: true,
        ..test_sync_config()
    };
    let harness = Harness::with_config(false, config).await;
    let plan = harness.active_plan(60).await;
    // The create lands, the activation is refused.
    harness.remote.script([
        Ok(()),
        Err(RemoteError::fatal(Some(422), "deadline out of range")),
    ]);
    let mut events = harness.engine.subscribe_events();

    harness.go_online_and_drain().await;

    let mut dropped = 0;
    let mut reconciled = false;
    while let Ok(event) = events.try_recv() {
        match event {
            SyncEvent::OperationDropped(_) => dropped += 1,
            SyncEvent::Reconciled { .. } => reconciled = true,
            _ => {}
        }
    }
    assert_eq!(dropped, 1);
    assert!(!reconciled);

    // The server still holds the draft, yet the local plan and its alarms stand.
    assert_eq!(harness.remote.server_plan(&plan.id).unwrap()["status"], "draft");
    let stored = harness.controller.plan(&plan.id).await.unwrap();
    assert_eq!(stored.status, PlanStatus::Active);
    assert!(harness.controller.scheduler().is_armed(&plan.id).await);
    assert_eq!(harness.engine.pending_operation_count().await, 0);
}
