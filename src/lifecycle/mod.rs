//! # Lifecycle Controller
//!
//! The only entry point for changing a float plan. Each transition commits
//! locally first, then adjusts the deadline scheduler, then hands an
//! operation to the sync engine:
//!
//! ```text
//! create ──► Draft ──activate──► Active ──check_in──► CheckedIn
//!              │                   │
//!              └──── edit ─────────┘        delete: any state
//! ```
//!
//! Transitions never fail for network reasons and never wait on the remote:
//! each returns once the plan store and the operation log are updated. A
//! check-in is recorded even when the remote is unreachable.
//!
//! Transitions on the same plan are serialized by a per-plan async mutex;
//! different plans proceed independently.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::offline::Operation;
use crate::schedule::DeadlineScheduler;
use crate::shared::{CheckInReport, EscalationStage, FloatPlan, PlanEdit, PlanStatus, SharedError};
use crate::store::PlanStore;
use crate::sync::{SyncEngine, SyncError};

/// Lifecycle errors
///
/// Only local problems surface here: a missing plan, a transition that is
/// not allowed from the current status, bad field values or storage faults.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("plan {0} not found")]
    PlanNotFound(Uuid),

    #[error("cannot {action} a plan that is {from}")]
    InvalidTransition {
        from: PlanStatus,
        action: &'static str,
    },

    #[error(transparent)]
    Validation(#[from] SharedError),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("sync error: {0}")]
    Sync(SyncError),
}

impl From<SyncError> for LifecycleError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Storage(e) => Self::Storage(e),
            other => Self::Sync(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, LifecycleError>;

#[derive(Debug)]
pub struct LifecycleController {
    store: Arc<PlanStore>,
    scheduler: Arc<DeadlineScheduler>,
    engine: SyncEngine,
    /// One mutex per plan id
    plan_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl LifecycleController {
    /// Wire the controller; the scheduler is attached to the engine so every
    /// reconcile re-arms it
    pub fn new(store: Arc<PlanStore>, scheduler: Arc<DeadlineScheduler>, engine: SyncEngine) -> Self {
        engine.attach_scheduler(Arc::clone(&scheduler));
        Self {
            store,
            scheduler,
            engine,
            plan_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn plan_lock(&self, plan_id: Uuid) -> Arc<Mutex<()>> {
        Arc::clone(self.plan_locks.lock().await.entry(plan_id).or_default())
    }

    async fn load(&self, plan_id: &Uuid) -> Result<FloatPlan> {
        self.store
            .get(plan_id)
            .await
            .ok_or(LifecycleError::PlanNotFound(*plan_id))
    }

    /// Record a new plan as a Draft
    pub async fn create(&self, mut plan: FloatPlan) -> Result<FloatPlan> {
        plan.validate()?;
        let lock = self.plan_lock(plan.id).await;
        let _guard = lock.lock().await;

        let now = Utc::now();
        plan.status = PlanStatus::Draft;
        plan.created_at = now;
        plan.updated_at = now;

        self.store.upsert(plan.clone()).await?;
        tracing::info!("[LIFECYCLE] Created draft {} ({})", plan.id, plan.vessel_name);
        self.engine.submit(Operation::create(&plan)).await?;
        Ok(plan)
    }

    /// Draft → Active; arms the deadline scheduler
    pub async fn activate(&self, plan_id: Uuid) -> Result<FloatPlan> {
        let lock = self.plan_lock(plan_id).await;
        let _guard = lock.lock().await;

        let mut plan = self.load(&plan_id).await?;
        if plan.status != PlanStatus::Draft {
            return Err(LifecycleError::InvalidTransition {
                from: plan.status,
                action: "activate",
            });
        }

        let now = Utc::now();
        plan.status = PlanStatus::Active;
        plan.updated_at = now;

        self.store.upsert(plan.clone()).await?;
        self.scheduler.arm(&plan, now).await;
        tracing::info!(
            "[LIFECYCLE] Activated {} (check in by {})",
            plan.id,
            plan.check_in_deadline
        );
        self.engine.submit(Operation::update(&plan)).await?;
        Ok(plan)
    }

    /// Active (including overdue) → CheckedIn
    ///
    /// Succeeds regardless of connectivity. Checking in an already
    /// checked-in plan returns it unchanged and emits nothing.
    pub async fn check_in(&self, plan_id: Uuid, report: Option<CheckInReport>) -> Result<FloatPlan> {
        let lock = self.plan_lock(plan_id).await;
        let _guard = lock.lock().await;

        let mut plan = self.load(&plan_id).await?;
        match plan.status {
            PlanStatus::Active => {}
            PlanStatus::CheckedIn => {
                tracing::debug!("[LIFECYCLE] {} already checked in", plan.id);
                return Ok(plan);
            }
            PlanStatus::Draft => {
                return Err(LifecycleError::InvalidTransition {
                    from: plan.status,
                    action: "check in",
                })
            }
        }

        let now = Utc::now();
        let was_overdue = plan.is_overdue(now);
        plan.status = PlanStatus::CheckedIn;
        plan.last_check_in = Some(now);
        plan.check_in_report = report;
        plan.updated_at = now;

        self.store.upsert(plan.clone()).await?;
        self.scheduler.disarm(&plan.id).await;
        self.engine.operation_log().refresh_snapshots(&plan).await?;
        if was_overdue {
            tracing::warn!("[LIFECYCLE] Late check-in for {} ({})", plan.id, plan.vessel_name);
        } else {
            tracing::info!("[LIFECYCLE] Checked in {} ({})", plan.id, plan.vessel_name);
        }
        self.engine.submit(Operation::check_in(&plan)).await?;
        Ok(plan)
    }

    /// Edit a Draft or Active plan; status is unchanged
    ///
    /// Moving the deadline of an Active plan re-arms its triggers.
    pub async fn edit(&self, plan_id: Uuid, edit: PlanEdit) -> Result<FloatPlan> {
        let lock = self.plan_lock(plan_id).await;
        let _guard = lock.lock().await;

        let mut plan = self.load(&plan_id).await?;
        if plan.status == PlanStatus::CheckedIn {
            return Err(LifecycleError::InvalidTransition {
                from: plan.status,
                action: "edit",
            });
        }

        let deadline_moved = edit.apply_to(&mut plan);
        plan.validate()?;
        let now = Utc::now();
        plan.updated_at = now;

        self.store.upsert(plan.clone()).await?;
        if deadline_moved && plan.status == PlanStatus::Active {
            self.scheduler.arm(&plan, now).await;
        }
        tracing::info!("[LIFECYCLE] Edited {}", plan.id);
        self.engine.submit(Operation::update(&plan)).await?;
        Ok(plan)
    }

    /// Delete a plan in any state
    pub async fn delete(&self, plan_id: Uuid) -> Result<()> {
        let lock = self.plan_lock(plan_id).await;
        let guard = lock.lock().await;

        self.load(&plan_id).await?;
        self.scheduler.disarm(&plan_id).await;
        self.engine.submit(Operation::delete(plan_id)).await?;
        self.store.remove(&plan_id).await?;
        tracing::info!("[LIFECYCLE] Deleted {}", plan_id);

        drop(guard);
        self.plan_locks.lock().await.remove(&plan_id);
        Ok(())
    }

    /// Re-arm every Active plan after a restart
    ///
    /// Plans whose deadline already passed notify immediately.
    pub async fn restore(&self) -> usize {
        let now = Utc::now();
        let mut armed = 0;
        for plan in self.store.list().await {
            if plan.status == PlanStatus::Active {
                self.scheduler.arm(&plan, now).await;
                armed += 1;
            }
        }
        tracing::info!("[LIFECYCLE] Restored {} active plan(s)", armed);
        armed
    }

    /// Drain, then pull the server's lists; the engine re-syncs the
    /// scheduler as part of the pull
    ///
    /// Returns `false` without reconciling if operations are still queued
    /// after the drain, so unsynced local changes are not overwritten.
    pub async fn refresh(&self) -> Result<bool> {
        self.engine.on_reachability_regained().await?;

        let pending = self.engine.pending_operation_count().await;
        if pending > 0 {
            tracing::warn!(
                "[LIFECYCLE] Skipping refresh, {} operation(s) still queued",
                pending
            );
            return Ok(false);
        }

        self.engine.pull_and_reconcile().await?;
        Ok(true)
    }

    /// All plans ordered by deadline
    pub async fn plans(&self) -> Vec<FloatPlan> {
        self.store.list().await
    }

    pub async fn plan(&self, plan_id: &Uuid) -> Option<FloatPlan> {
        self.store.get(plan_id).await
    }

    pub async fn overdue_plans(&self, now: DateTime<Utc>) -> Vec<FloatPlan> {
        self.store.overdue_plans(now).await
    }

    /// Overdue plans and how far each has escalated at `now`
    pub async fn escalations(&self, now: DateTime<Utc>) -> Vec<(FloatPlan, EscalationStage)> {
        self.store.escalations(now).await
    }

    pub async fn pending_operation_count(&self) -> usize {
        self.engine.pending_operation_count().await
    }

    pub async fn last_sync_at(&self) -> Option<DateTime<Utc>> {
        self.engine.last_sync_at().await
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    pub fn scheduler(&self) -> &Arc<DeadlineScheduler> {
        &self.scheduler
    }

    pub fn store(&self) -> &Arc<PlanStore> {
        &self.store
    }
}
