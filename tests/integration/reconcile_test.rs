//! Pull-and-reconcile replaces local slices with the server's lists

use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use floatplan::shared::{EmergencyContact, PlanEdit, PlanStatus};
use floatplan::sync::{SyncError, SyncEvent};
use pretty_assertions::assert_eq;
use uuid::Uuid;

use crate::common::{plan_due_in, test_sync_config, wait_until, Harness};

fn harbor_master() -> EmergencyContact {
    EmergencyContact {
        id: Uuid::new_v4(),
        name: "Harbor Master".into(),
        phone: "+1 555 0100".into(),
        email: Some("harbor@example.com".into()),
    }
}

#[tokio::test]
async fn test_reconcile_replaces_slices_wholesale() {
    let harness = Harness::new(true).await;
    let local = harness.active_plan(60).await;
    harness.settle().await;

    let mut remote_only = plan_due_in(240);
    remote_only.vessel_name = "Kelp Runner".into();
    harness.remote.remove_plan(&local.id);
    harness.remote.seed_plan(&remote_only);
    let contact = harbor_master();
    harness.remote.seed_contact(&contact);
    let mut events = harness.engine.subscribe_events();

    let counts = harness.engine.pull_and_reconcile().await.unwrap();

    assert_eq!(counts, (1, 1));
    let plans = harness.controller.plans().await;
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].id, remote_only.id);
    assert_eq!(harness.controller.store().contacts().await, vec![contact.clone()]);
    assert_eq!(harness.controller.store().contact(&contact.id).await, Some(contact));
    assert!(matches!(
        events.recv().await.unwrap(),
        SyncEvent::Reconciled { plans: 1, contacts: 1 }
    ));
}

#[tokio::test]
async fn test_malformed_record_leaves_store_untouched() {
    let harness = Harness::new(true).await;
    let local = harness.active_plan(60).await;
    harness.settle().await;
    harness
        .remote
        .seed_raw_plan(Uuid::new_v4(), serde_json::json!({ "id": "not-a-plan" }));

    let result = harness.engine.pull_and_reconcile().await;

    crate::assert_err!(result, SyncError::Serialization(_));
    assert_eq!(harness.controller.plans().await.len(), 1);
    assert!(harness.controller.plan(&local.id).await.is_some());
}

#[tokio::test]
async fn test_refresh_resyncs_scheduler() {
    let harness = Harness::new(true).await;
    let closed_remotely = harness.active_plan(60).await;
    harness.settle().await;

    let mut checked_in = closed_remotely.clone();
    checked_in.status = PlanStatus::CheckedIn;
    harness.remote.seed_plan(&checked_in);

    let mut moved = plan_due_in(120);
    moved.status = PlanStatus::Active;
    moved.check_in_deadline = Utc::now() + Duration::hours(6);
    harness.remote.seed_plan(&moved);

    assert!(harness.controller.refresh().await.unwrap());

    let scheduler = harness.controller.scheduler();
    assert!(!scheduler.is_armed(&closed_remotely.id).await);
    assert_eq!(
        scheduler.armed_deadline(&moved.id).await,
        Some(moved.check_in_deadline)
    );
}

#[tokio::test]
async fn test_drain_that_empties_log_reconciles() {
    let mut config = test_sync_config();
    config.reconcile_after_drain = true;
    let harness = Harness::with_config(false, config).await;
    let plan = harness.controller.create(plan_due_in(60)).await.unwrap();
    let other = plan_due_in(90);
    harness.remote.seed_plan(&other);

    harness.go_online_and_drain().await;

    let ids: Vec<Uuid> = harness.controller.plans().await.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![plan.id, other.id]);
}

#[tokio::test]
async fn test_background_reconcile_keeps_alarms_in_step() {
    let mut config = test_sync_config();
    config.reconcile_after_drain = true;
    let harness = Harness::with_config(true, config).await;
    let removed = harness.active_plan(60).await;
    let kept = harness.active_plan(120).await;
    harness.settle().await;

    harness.remote.remove_plan(&removed.id);
    harness.monitor.set_reachable(false);
    harness
        .controller
        .edit(
            kept.id,
            PlanEdit {
                destination: Some("Catalina".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    harness.engine.start().await;
    harness.monitor.set_reachable(true);

    let controller = &harness.controller;
    let removed_id = removed.id;
    let reconciled = wait_until(StdDuration::from_secs(5), || async move {
        controller.plan(&removed_id).await.is_none()
    })
    .await;
    assert!(reconciled);
    harness.settle().await;

    let scheduler = harness.controller.scheduler();
    assert!(!scheduler.is_armed(&removed.id).await);
    assert_eq!(scheduler.armed_plans().await, vec![kept.id]);
    assert_eq!(
        scheduler.trigger_count().await,
        scheduler.triggers_for(&kept.id).await.len()
    );
    let stored = harness.controller.plan(&kept.id).await.unwrap();
    assert_eq!(stored.destination, "Catalina");
    assert_eq!(stored.status, PlanStatus::Active);

    harness.engine.stop().await;
}
