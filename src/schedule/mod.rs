//! # Deadline Scheduler
//!
//! Arms local reminders for Active plans:
//!
//! - a pre-reminder 15 minutes before the check-in deadline, only if that
//!   moment is still in the future
//! - a deadline trigger at the deadline itself, delivered immediately if
//!   the deadline has already passed
//!
//! Overdue status is never driven by these triggers; it is derived from the
//! plan at read time. The scheduler only causes notifications.
//!
//! Every per-plan change happens under one lock, so `arm` and `disarm`
//! are atomic from the caller's view.

pub mod notifier;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::shared::{FloatPlan, PlanStatus};

pub use notifier::{Notification, NotificationHandle, Notifier, TokioNotifier};

/// Minutes between the pre-reminder and the deadline
pub const PRE_REMINDER_LEAD_MINUTES: i64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    PreReminder,
    DeadlineReached,
}

/// A trigger armed for a plan
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledTrigger {
    pub plan_id: Uuid,
    pub kind: TriggerKind,
    pub fire_at: DateTime<Utc>,
    pub handle: NotificationHandle,
}

#[derive(Debug)]
struct ArmedPlan {
    deadline: DateTime<Utc>,
    triggers: Vec<ScheduledTrigger>,
}

/// Triggers that arming `plan` at `now` would produce
pub fn plan_triggers(plan: &FloatPlan, now: DateTime<Utc>) -> Vec<(TriggerKind, DateTime<Utc>)> {
    let deadline = plan.check_in_deadline;
    let pre_reminder = deadline - Duration::minutes(PRE_REMINDER_LEAD_MINUTES);

    let mut triggers = Vec::with_capacity(2);
    if pre_reminder > now {
        triggers.push((TriggerKind::PreReminder, pre_reminder));
    }
    triggers.push((TriggerKind::DeadlineReached, deadline));
    triggers
}

pub struct DeadlineScheduler {
    notifier: Arc<dyn Notifier>,
    armed: Mutex<HashMap<Uuid, ArmedPlan>>,
}

impl std::fmt::Debug for DeadlineScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeadlineScheduler").finish_non_exhaustive()
    }
}

impl DeadlineScheduler {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            armed: Mutex::new(HashMap::new()),
        }
    }

    /// Arm the plan's triggers, replacing any already armed
    pub async fn arm(&self, plan: &FloatPlan, now: DateTime<Utc>) -> Vec<ScheduledTrigger> {
        let mut armed = self.armed.lock().await;

        if let Some(previous) = armed.remove(&plan.id) {
            self.cancel_all(previous).await;
        }

        let mut triggers = Vec::with_capacity(2);
        for (kind, fire_at) in plan_triggers(plan, now) {
            let notification = Notification {
                plan_id: plan.id,
                kind,
                vessel_name: plan.vessel_name.clone(),
                deadline: plan.check_in_deadline,
            };
            let handle = if fire_at <= now {
                tracing::warn!(
                    "[SCHEDULER] Deadline for {} already passed, notifying now",
                    plan.id
                );
                self.notifier.fire_immediately(notification).await
            } else {
                self.notifier.schedule(notification, fire_at).await
            };
            triggers.push(ScheduledTrigger {
                plan_id: plan.id,
                kind,
                fire_at,
                handle,
            });
        }

        tracing::info!(
            "[SCHEDULER] Armed {} trigger(s) for {} (deadline {})",
            triggers.len(),
            plan.id,
            plan.check_in_deadline
        );
        armed.insert(
            plan.id,
            ArmedPlan {
                deadline: plan.check_in_deadline,
                triggers: triggers.clone(),
            },
        );
        triggers
    }

    /// Cancel every trigger for the plan; returns how many were armed
    ///
    /// Disarming an unknown or already-disarmed plan is a no-op.
    pub async fn disarm(&self, plan_id: &Uuid) -> usize {
        let mut armed = self.armed.lock().await;
        let Some(previous) = armed.remove(plan_id) else {
            return 0;
        };
        let count = previous.triggers.len();
        self.cancel_all(previous).await;
        tracing::info!("[SCHEDULER] Disarmed {} trigger(s) for {}", count, plan_id);
        count
    }

    async fn cancel_all(&self, plan: ArmedPlan) {
        for trigger in plan.triggers {
            self.notifier.cancel(trigger.handle).await;
        }
    }

    /// Make the armed set match `plans`
    ///
    /// Plans that are gone or no longer Active are disarmed. Active plans are
    /// armed when unarmed or when their deadline moved. Returns how many
    /// plans were disarmed and armed.
    pub async fn resync(&self, plans: &[FloatPlan], now: DateTime<Utc>) -> (usize, usize) {
        let mut disarmed = 0;
        for plan_id in self.armed_plans().await {
            let still_active = plans
                .iter()
                .any(|p| p.id == plan_id && p.status == PlanStatus::Active);
            if !still_active {
                self.disarm(&plan_id).await;
                disarmed += 1;
            }
        }

        let mut armed = 0;
        for plan in plans.iter().filter(|p| p.status == PlanStatus::Active) {
            if self.armed_deadline(&plan.id).await != Some(plan.check_in_deadline) {
                self.arm(plan, now).await;
                armed += 1;
            }
        }

        if disarmed + armed > 0 {
            tracing::info!(
                "[SCHEDULER] Resynced: {} disarmed, {} armed",
                disarmed,
                armed
            );
        }
        (disarmed, armed)
    }

    pub async fn is_armed(&self, plan_id: &Uuid) -> bool {
        self.armed.lock().await.contains_key(plan_id)
    }

    /// Deadline the plan was armed with
    pub async fn armed_deadline(&self, plan_id: &Uuid) -> Option<DateTime<Utc>> {
        self.armed.lock().await.get(plan_id).map(|p| p.deadline)
    }

    pub async fn triggers_for(&self, plan_id: &Uuid) -> Vec<ScheduledTrigger> {
        self.armed
            .lock()
            .await
            .get(plan_id)
            .map(|p| p.triggers.clone())
            .unwrap_or_default()
    }

    /// Triggers armed across all plans
    pub async fn trigger_count(&self) -> usize {
        self.armed.lock().await.values().map(|p| p.triggers.len()).sum()
    }

    pub async fn armed_plans(&self) -> Vec<Uuid> {
        self.armed.lock().await.keys().copied().collect()
    }
}
