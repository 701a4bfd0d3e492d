//! End-to-end lifecycle scenarios against the deadline scheduler

use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use floatplan::lifecycle::{LifecycleController, LifecycleError};
use floatplan::schedule::{DeadlineScheduler, TokioNotifier, TriggerKind};
use floatplan::shared::{EscalationStage, PlanEdit, PlanStatus};
use pretty_assertions::assert_eq;

use crate::common::{plan_due_in, Harness};

#[tokio::test]
async fn test_activate_arms_two_triggers_and_check_in_clears_them() {
    let harness = Harness::new(false).await;
    let plan = harness.controller.create(plan_due_in(120)).await.unwrap();
    let scheduler = harness.controller.scheduler();
    assert_eq!(scheduler.trigger_count().await, 0);

    let plan = harness.controller.activate(plan.id).await.unwrap();

    let triggers = scheduler.triggers_for(&plan.id).await;
    let kinds: Vec<TriggerKind> = triggers.iter().map(|t| t.kind).collect();
    assert_eq!(kinds, vec![TriggerKind::PreReminder, TriggerKind::DeadlineReached]);
    assert_eq!(triggers[0].fire_at, plan.check_in_deadline - Duration::minutes(15));
    assert_eq!(triggers[1].fire_at, plan.check_in_deadline);
    assert_eq!(harness.notifier.pending_count().await, 2);

    harness.controller.check_in(plan.id, None).await.unwrap();

    assert_eq!(scheduler.trigger_count().await, 0);
    assert_eq!(harness.notifier.pending_count().await, 0);
}

#[tokio::test]
async fn test_past_deadline_notifies_immediately() {
    let harness = Harness::new(false).await;
    let mut notifications = harness.notifier.subscribe();

    let plan = harness.active_plan(-5).await;

    let fired = tokio::time::timeout(StdDuration::from_secs(2), notifications.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fired.plan_id, plan.id);
    assert_eq!(fired.kind, TriggerKind::DeadlineReached);

    let triggers = harness.controller.scheduler().triggers_for(&plan.id).await;
    assert_eq!(triggers.len(), 1);
    assert_eq!(
        plan.escalation_stage(Utc::now()),
        Some(EscalationStage::Overdue)
    );
}

#[tokio::test]
async fn test_near_deadline_skips_pre_reminder() {
    let harness = Harness::new(false).await;
    let plan = harness.active_plan(10).await;

    let triggers = harness.controller.scheduler().triggers_for(&plan.id).await;
    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0].kind, TriggerKind::DeadlineReached);
}

#[tokio::test]
async fn test_disarm_is_idempotent() {
    let harness = Harness::new(false).await;
    let plan = harness.active_plan(120).await;
    let scheduler = harness.controller.scheduler();

    assert_eq!(scheduler.disarm(&plan.id).await, 2);
    assert_eq!(scheduler.disarm(&plan.id).await, 0);
    assert_eq!(scheduler.disarm(&uuid::Uuid::new_v4()).await, 0);
    assert_eq!(scheduler.trigger_count().await, 0);
}

#[tokio::test]
async fn test_editing_draft_deadline_does_not_arm() {
    let harness = Harness::new(false).await;
    let plan = harness.controller.create(plan_due_in(120)).await.unwrap();

    harness
        .controller
        .edit(
            plan.id,
            PlanEdit {
                check_in_deadline: Some(Utc::now() + Duration::hours(5)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(!harness.controller.scheduler().is_armed(&plan.id).await);
}

#[tokio::test]
async fn test_edit_validation_leaves_plan_untouched() {
    let harness = Harness::new(false).await;
    let plan = harness.active_plan(120).await;
    let pending = harness.controller.pending_operation_count().await;

    let result = harness
        .controller
        .edit(
            plan.id,
            PlanEdit {
                grace_period_minutes: Some(-10),
                ..Default::default()
            },
        )
        .await;

    crate::assert_err!(result, LifecycleError::Validation(_));
    let stored = harness.controller.plan(&plan.id).await.unwrap();
    assert_eq!(stored.grace_period_minutes, plan.grace_period_minutes);
    assert_eq!(harness.controller.pending_operation_count().await, pending);
}

#[tokio::test]
async fn test_restore_rearms_active_plans() {
    let harness = Harness::new(false).await;
    let active = harness.active_plan(120).await;
    let draft = harness.controller.create(plan_due_in(60)).await.unwrap();
    let done = harness.active_plan(90).await;
    harness.controller.check_in(done.id, None).await.unwrap();

    // A second controller over the same store, as after a restart.
    let scheduler = std::sync::Arc::new(DeadlineScheduler::new(std::sync::Arc::new(
        TokioNotifier::new(),
    )));
    let restarted = LifecycleController::new(
        std::sync::Arc::clone(harness.controller.store()),
        scheduler,
        harness.engine.clone(),
    );

    assert_eq!(restarted.restore().await, 1);
    assert!(restarted.scheduler().is_armed(&active.id).await);
    assert!(!restarted.scheduler().is_armed(&draft.id).await);
    assert!(!restarted.scheduler().is_armed(&done.id).await);
    assert_eq!(
        restarted.plan(&done.id).await.map(|p| p.status),
        Some(PlanStatus::CheckedIn)
    );
}

#[tokio::test]
async fn test_delete_from_any_state() {
    let harness = Harness::new(false).await;
    let draft = harness.controller.create(plan_due_in(60)).await.unwrap();
    let active = harness.active_plan(60).await;

    harness.controller.delete(draft.id).await.unwrap();
    harness.controller.delete(active.id).await.unwrap();

    assert!(harness.controller.plans().await.is_empty());
    assert_eq!(harness.controller.scheduler().trigger_count().await, 0);
    crate::assert_err!(
        harness.controller.delete(active.id).await,
        LifecycleError::PlanNotFound(_)
    );
}
