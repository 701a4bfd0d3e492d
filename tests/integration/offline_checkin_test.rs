//! Check-in while the remote is unreachable

use chrono::{Duration, Utc};
use floatplan::offline::OperationKind;
use floatplan::shared::{is_overdue, CheckInReport, PlanStatus};
use pretty_assertions::assert_eq;

use floatplan::sync::{SyncConfig, SyncEvent};

use crate::common::{test_sync_config, Harness};

#[tokio::test]
async fn test_check_in_succeeds_offline() {
    let harness = Harness::new(false).await;
    let plan = harness.active_plan(120).await;

    let checked = crate::assert_ok!(harness.controller.check_in(plan.id, None).await);

    assert_eq!(checked.status, PlanStatus::CheckedIn);
    assert!(checked.last_check_in.is_some());
    assert_eq!(harness.remote.attempt_count(), 0);

    let queued = harness.engine.operation_log().snapshot().await;
    let check_ins: Vec<_> = queued
        .iter()
        .filter(|op| op.kind == OperationKind::CheckIn)
        .collect();
    assert_eq!(check_ins.len(), 1);
    assert_eq!(check_ins[0].plan_id, plan.id);

    // The store reflects the check-in before anything reached the server.
    let stored = harness.controller.plan(&plan.id).await.unwrap();
    assert_eq!(stored.status, PlanStatus::CheckedIn);
}

#[tokio::test]
async fn test_overdue_plan_clears_on_check_in() {
    let harness = Harness::new(false).await;
    let plan = harness.active_plan(-1).await;

    let now = Utc::now();
    assert!(is_overdue(&plan, now));
    assert_eq!(harness.controller.overdue_plans(now).await.len(), 1);

    let checked = harness.controller.check_in(plan.id, None).await.unwrap();

    assert!(!is_overdue(&checked, Utc::now() + Duration::hours(1)));
    assert!(harness.controller.overdue_plans(Utc::now()).await.is_empty());
}

#[tokio::test]
async fn test_check_in_report_travels_in_payload() {
    let harness = Harness::new(false).await;
    let plan = harness.active_plan(60).await;
    let report = CheckInReport {
        notes: Some("Back at the dock, all well".into()),
        position: Some((33.44, -118.49)),
    };

    let checked = harness
        .controller
        .check_in(plan.id, Some(report.clone()))
        .await
        .unwrap();
    assert_eq!(checked.check_in_report, Some(report));

    let queued = harness.engine.operation_log().snapshot().await;
    let op = queued
        .iter()
        .find(|op| op.kind == OperationKind::CheckIn)
        .unwrap();
    assert_eq!(op.payload["notes"], "Back at the dock, all well");
    assert_eq!(op.resource_path, format!("/float_plans/{}/check_in", plan.id));
}

#[tokio::test]
async fn test_offline_check_in_syncs_when_back_online() {
    let harness = Harness::new(false).await;
    let plan = harness.active_plan(60).await;
    harness.controller.check_in(plan.id, None).await.unwrap();

    harness.go_online_and_drain().await;

    assert_eq!(harness.controller.pending_operation_count().await, 0);
    assert!(harness.controller.last_sync_at().await.is_some());
    let kinds: Vec<OperationKind> = harness.remote.attempts().iter().map(|op| op.kind).collect();
    // The check-in is rejected until its plan exists, then retried.
    assert_eq!(
        kinds,
        vec![
            OperationKind::CheckIn,
            OperationKind::Create,
            OperationKind::Update,
            OperationKind::CheckIn,
        ]
    );
    let server = harness.remote.server_plan(&plan.id).unwrap();
    assert_eq!(server["status"], "checked_in");
}

#[tokio::test]
async fn test_offline_trip_survives_reconcile_after_drain() {
    let config = SyncConfig {
        reconcile_after_drain: true,
        ..test_sync_config()
    };
    let harness = Harness::with_config(false, config).await;
    let plan = harness.active_plan(60).await;
    harness.controller.check_in(plan.id, None).await.unwrap();

    let mut events = harness.engine.subscribe_events();
    harness.go_online_and_drain().await;

    let mut reconciled = false;
    while let Ok(event) = events.try_recv() {
        reconciled |= matches!(event, SyncEvent::Reconciled { .. });
    }
    assert!(reconciled);
    assert_eq!(harness.controller.pending_operation_count().await, 0);

    let local = harness.controller.plan(&plan.id).await.unwrap();
    assert_eq!(local.status, PlanStatus::CheckedIn);
    assert!(local.last_check_in.is_some());
    assert!(!is_overdue(&local, Utc::now() + Duration::hours(2)));
    assert!(!harness.controller.scheduler().is_armed(&plan.id).await);

    let server = harness.remote.server_plan(&plan.id).unwrap();
    assert_eq!(server["status"], "checked_in");
}

#[tokio::test]
async fn test_online_check_in_syncs_in_background() {
    let harness = Harness::new(true).await;
    let plan = harness.active_plan(60).await;

    let checked = harness.controller.check_in(plan.id, None).await.unwrap();
    assert_eq!(checked.status, PlanStatus::CheckedIn);

    harness.settle().await;
    let server = harness.remote.server_plan(&plan.id).unwrap();
    assert_eq!(server["status"], "checked_in");
}
