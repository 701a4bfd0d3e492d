//! # Operation Log
//!
//! Durable, ordered record of mutations that the remote API has not yet
//! confirmed. Every operation is written to the local database before
//! `enqueue` returns, so a restart never loses a pending check-in.
//!
//! ## Ordering
//!
//! Drains visit every `CheckIn` first, in creation order, then everything
//! else in creation order. A check-in is the only mutation that clears an
//! active safety escalation, so it is never stuck behind older edits.
//!
//! Within one plan, causality still holds:
//!
//! - a check-in the remote rejects while its plan still has older queued
//!   writes (a plan created offline) is held back and sent again once those
//!   writes land later in the same pass
//! - a write that stays queued after a retryable failure blocks the plan's
//!   later writes until the next pass
//!
//! ## Supersession
//!
//! Create and Update payloads are full plan snapshots. Enqueuing an Update
//! removes any queued Update for the same resource path; only the newest one
//! is sent. [`OperationLog::refresh_snapshots`] rewrites queued snapshots
//! when a check-in is recorded, so a late write cannot reopen the plan.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::ops::ControlFlow;
//! use std::sync::Arc;
//! use floatplan::local_db::LocalDatabase;
//! use floatplan::offline::{Operation, OperationLog, RetryPolicy};
//! use floatplan::shared::FloatPlan;
//!
//! # async fn example(plan: FloatPlan) -> sqlx::Result<()> {
//! let db = Arc::new(LocalDatabase::in_memory().await?);
//! let log = OperationLog::open(db).await?;
//!
//! log.enqueue(Operation::check_in(&plan)).await?;
//!
//! let report = log
//!     .drain(&RetryPolicy::default(), |_op| async { ControlFlow::Continue(Ok(())) })
//!     .await?;
//! assert_eq!(report.synced, 1);
//! # Ok(())
//! # }
//! ```

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::local_db::{self, LocalDatabase};
use crate::offline::retry::{RetryDecision, RetryPolicy};
use crate::remote::RemoteError;
use crate::shared::{CheckInReport, FloatPlan};

/// Kind of pending mutation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
    CheckIn,
}

impl OperationKind {
    /// Name used in the `operation_type` column
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::CheckIn => "check_in",
        }
    }

    /// Parse an `operation_type` column value
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "create" => Some(OperationKind::Create),
            "update" => Some(OperationKind::Update),
            "delete" => Some(OperationKind::Delete),
            "check_in" => Some(OperationKind::CheckIn),
            _ => None,
        }
    }
}

/// HTTP-style verb of the remote call
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpVerb {
    Post,
    Patch,
    Delete,
}

impl HttpVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVerb::Post => "POST",
            HttpVerb::Patch => "PATCH",
            HttpVerb::Delete => "DELETE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "POST" => Some(HttpVerb::Post),
            "PATCH" => Some(HttpVerb::Patch),
            "DELETE" => Some(HttpVerb::Delete),
            _ => None,
        }
    }
}

/// A durable record of one pending mutation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Operation {
    /// Unique, stable operation ID
    pub id: Uuid,
    /// Mutation kind
    pub kind: OperationKind,
    /// Plan the mutation targets
    pub plan_id: Uuid,
    /// Target resource path, e.g. `/float_plans/{id}`
    pub resource_path: String,
    /// HTTP-style verb
    pub verb: HttpVerb,
    /// Request body, opaque to the log
    pub payload: serde_json::Value,
    /// When the mutation happened locally
    pub created_at: DateTime<Utc>,
    /// Failed retryable attempts so far
    pub retry_count: u32,
    /// When the last attempt happened
    pub last_attempt: Option<DateTime<Utc>>,
    /// Error from the last failed attempt
    pub last_error: Option<String>,
}

/// Collection path for float plans
pub const FLOAT_PLANS_PATH: &str = "/float_plans";

impl Operation {
    fn new(
        kind: OperationKind,
        plan_id: Uuid,
        resource_path: String,
        verb: HttpVerb,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            plan_id,
            resource_path,
            verb,
            payload,
            created_at: Utc::now(),
            retry_count: 0,
            last_attempt: None,
            last_error: None,
        }
    }

    /// `POST /float_plans` with the full plan
    pub fn create(plan: &FloatPlan) -> Self {
        Self::new(
            OperationKind::Create,
            plan.id,
            FLOAT_PLANS_PATH.to_string(),
            HttpVerb::Post,
            plan_payload(plan),
        )
    }

    /// `PATCH /float_plans/{id}` with the full plan
    pub fn update(plan: &FloatPlan) -> Self {
        Self::new(
            OperationKind::Update,
            plan.id,
            format!("{}/{}", FLOAT_PLANS_PATH, plan.id),
            HttpVerb::Patch,
            plan_payload(plan),
        )
    }

    /// `DELETE /float_plans/{id}`
    pub fn delete(plan_id: Uuid) -> Self {
        Self::new(
            OperationKind::Delete,
            plan_id,
            format!("{}/{}", FLOAT_PLANS_PATH, plan_id),
            HttpVerb::Delete,
            serde_json::Value::Null,
        )
    }

    /// `POST /float_plans/{id}/check_in`
    pub fn check_in(plan: &FloatPlan) -> Self {
        let report = plan.check_in_report.clone().unwrap_or_default();
        Self::new(
            OperationKind::CheckIn,
            plan.id,
            format!("{}/{}/check_in", FLOAT_PLANS_PATH, plan.id),
            HttpVerb::Post,
            check_in_payload(plan.last_check_in.unwrap_or_else(Utc::now), &report),
        )
    }

    /// Whether this operation goes ahead of non-check-in writes
    pub fn is_priority(&self) -> bool {
        self.kind == OperationKind::CheckIn
    }
}

fn plan_payload(plan: &FloatPlan) -> serde_json::Value {
    // FloatPlan has only string keys and plain values.
    serde_json::to_value(plan).unwrap_or(serde_json::Value::Null)
}

fn check_in_payload(checked_in_at: DateTime<Utc>, report: &CheckInReport) -> serde_json::Value {
    serde_json::json!({
        "checked_in_at": checked_in_at,
        "notes": report.notes,
        "position": report.position,
    })
}

/// Why an operation left the log without succeeding
#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    /// The remote rejected the mutation
    Fatal(String),
    /// The retry ceiling was reached
    Exhausted { attempts: u32, last_error: String },
}

/// An operation removed from the log without remote confirmation
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedOperation {
    pub operation: Operation,
    pub reason: DropReason,
}

/// What one drain pass did
#[derive(Debug, Clone, Default)]
pub struct DrainReport {
    /// Operation IDs in the order they were attempted
    pub attempted: Vec<Uuid>,
    /// Operations confirmed and removed
    pub synced: usize,
    /// IDs and kinds of the confirmed operations, in attempt order
    pub confirmed: Vec<(Uuid, OperationKind)>,
    /// Operations that failed retryably and stay queued
    pub retried: usize,
    /// Operations removed without confirmation
    pub dropped: Vec<DroppedOperation>,
    /// Check-ins rejected ahead of their plan's older writes and still queued
    pub held_back: usize,
    /// The pass stopped before visiting every operation
    pub halted: bool,
}

/// Durable priority log of pending operations
#[derive(Debug)]
pub struct OperationLog {
    /// Queued operations in creation order
    operations: RwLock<VecDeque<Operation>>,
    /// Backing store
    db: Arc<LocalDatabase>,
}

impl OperationLog {
    /// Open the log, restoring any operations persisted before a restart
    pub async fn open(db: Arc<LocalDatabase>) -> local_db::Result<Self> {
        let restored = db.load_operations().await?;
        if !restored.is_empty() {
            tracing::info!("[QUEUE] Restored {} pending operations", restored.len());
        }
        Ok(Self {
            operations: RwLock::new(restored.into()),
            db,
        })
    }

    /// Append an operation and persist it
    ///
    /// Never touches the network. An Update supersedes queued Updates for
    /// the same resource path.
    pub async fn enqueue(&self, operation: Operation) -> local_db::Result<()> {
        let mut operations = self.operations.write().await;

        let superseded: Vec<Uuid> = if operation.kind == OperationKind::Update {
            operations
                .iter()
                .filter(|op| {
                    op.kind == OperationKind::Update && op.resource_path == operation.resource_path
                })
                .map(|op| op.id)
                .collect()
        } else {
            Vec::new()
        };

        self.db.add_to_offline_queue(&operation, &superseded).await?;

        if !superseded.is_empty() {
            operations.retain(|op| !superseded.contains(&op.id));
            tracing::debug!(
                "[QUEUE] Update {} superseded {} queued update(s) for {}",
                operation.id,
                superseded.len(),
                operation.resource_path
            );
        }

        tracing::info!(
            "[QUEUE] Enqueued {} {} ({})",
            operation.kind.as_str(),
            operation.resource_path,
            operation.id
        );
        operations.push_back(operation);
        Ok(())
    }

    /// Pending operations in drain order: check-ins first, then the rest
    pub async fn drain_order(&self) -> Vec<Operation> {
        let operations = self.operations.read().await;
        let (mut ordered, rest): (Vec<_>, Vec<_>) =
            operations.iter().cloned().partition(Operation::is_priority);
        ordered.extend(rest);
        ordered
    }

    /// Pending operations in creation order
    pub async fn snapshot(&self) -> Vec<Operation> {
        self.operations.read().await.iter().cloned().collect()
    }

    /// Number of operations waiting for confirmation
    pub async fn pending_count(&self) -> usize {
        self.operations.read().await.len()
    }

    async fn get(&self, operation_id: &Uuid) -> Option<Operation> {
        self.operations
            .read()
            .await
            .iter()
            .find(|op| op.id == *operation_id)
            .cloned()
    }

    /// Whether a write other than a check-in is queued for the operation's plan
    async fn has_pending_write_for(&self, operation: &Operation) -> bool {
        self.operations.read().await.iter().any(|op| {
            op.plan_id == operation.plan_id && op.id != operation.id && !op.is_priority()
        })
    }

    /// Replace the payload of queued Create and Update operations for
    /// `plan` with its current snapshot; returns how many were rewritten
    pub async fn refresh_snapshots(&self, plan: &FloatPlan) -> local_db::Result<usize> {
        let mut operations = self.operations.write().await;
        let payload = plan_payload(plan);
        let mut rewritten = 0;

        for op in operations.iter_mut().filter(|op| {
            op.plan_id == plan.id
                && matches!(op.kind, OperationKind::Create | OperationKind::Update)
        }) {
            let mut updated = op.clone();
            updated.payload = payload.clone();
            self.db.update_operation_payload(&updated).await?;
            *op = updated;
            rewritten += 1;
        }

        if rewritten > 0 {
            tracing::debug!(
                "[QUEUE] Refreshed {} queued snapshot(s) for {}",
                rewritten,
                plan.id
            );
        }
        Ok(rewritten)
    }

    /// Remove a confirmed or dropped operation
    ///
    /// Returns `false` if it was already gone (e.g. superseded mid-flight).
    pub async fn remove(&self, operation_id: &Uuid) -> local_db::Result<bool> {
        let mut operations = self.operations.write().await;
        let Some(pos) = operations.iter().position(|op| op.id == *operation_id) else {
            return Ok(false);
        };
        self.db.complete_operation(operation_id).await?;
        operations.remove(pos);
        Ok(true)
    }

    /// Record a failed retryable attempt, returning the updated operation
    async fn record_retry(
        &self,
        operation_id: &Uuid,
        error: &str,
    ) -> local_db::Result<Option<Operation>> {
        let mut operations = self.operations.write().await;
        let Some(op) = operations.iter_mut().find(|op| op.id == *operation_id) else {
            return Ok(None);
        };
        let mut updated = op.clone();
        updated.retry_count += 1;
        updated.last_attempt = Some(Utc::now());
        updated.last_error = Some(error.to_string());
        self.db.update_operation_retry(&updated).await?;
        *op = updated.clone();
        Ok(Some(updated))
    }

    /// Run one drain pass
    ///
    /// `apply` is called once per operation in [`drain_order`](Self::drain_order).
    /// It returns `ControlFlow::Break(())` to stop the pass and leave the
    /// current and remaining operations untouched, or
    /// `ControlFlow::Continue(result)` with the remote outcome.
    pub async fn drain<F, Fut>(
        &self,
        policy: &RetryPolicy,
        mut apply: F,
    ) -> local_db::Result<DrainReport>
    where
        F: FnMut(Operation) -> Fut,
        Fut: Future<Output = ControlFlow<(), Result<(), RemoteError>>>,
    {
        let mut report = DrainReport::default();
        // Plans with a write still waiting from earlier in this pass
        let mut blocked: HashSet<Uuid> = HashSet::new();
        let mut held_back: Vec<Operation> = Vec::new();

        for queued in self.drain_order().await {
            // Superseded or removed since the snapshot was taken; otherwise
            // send the current payload.
            let Some(operation) = self.get(&queued.id).await else {
                continue;
            };
            if !operation.is_priority() && blocked.contains(&operation.plan_id) {
                continue;
            }

            let ControlFlow::Continue(result) = apply(operation.clone()).await else {
                report.halted = true;
                return Ok(report);
            };
            report.attempted.push(operation.id);

            if operation.is_priority()
                && matches!(result, Err(RemoteError::Fatal { .. }))
                && self.has_pending_write_for(&operation).await
            {
                tracing::debug!(
                    "[QUEUE] Check-in {} rejected before its plan landed, holding it back",
                    operation.id
                );
                report.held_back += 1;
                held_back.push(operation);
                continue;
            }

            let plan_id = operation.plan_id;
            let priority = operation.is_priority();
            if self.settle(policy, operation, result, &mut report).await? && !priority {
                blocked.insert(plan_id);
            }
        }

        for held in held_back {
            let Some(operation) = self.get(&held.id).await else {
                continue;
            };
            if self.has_pending_write_for(&operation).await {
                continue;
            }
            let ControlFlow::Continue(result) = apply(operation.clone()).await else {
                report.halted = true;
                break;
            };
            report.attempted.push(operation.id);
            report.held_back -= 1;
            self.settle(policy, operation, result, &mut report).await?;
        }

        Ok(report)
    }

    /// Apply one remote outcome to the log; returns whether the operation
    /// is still queued
    async fn settle(
        &self,
        policy: &RetryPolicy,
        operation: Operation,
        result: Result<(), RemoteError>,
        report: &mut DrainReport,
    ) -> local_db::Result<bool> {
        let id = operation.id;
        match result {
            Ok(()) => {
                if self.remove(&id).await? {
                    report.synced += 1;
                    report.confirmed.push((id, operation.kind));
                }
                Ok(false)
            }
            Err(RemoteError::Fatal { message, .. }) => {
                if self.remove(&id).await? {
                    report.dropped.push(DroppedOperation {
                        operation,
                        reason: DropReason::Fatal(message),
                    });
                }
                Ok(false)
            }
            Err(RemoteError::Retryable { message }) => {
                let Some(updated) = self.record_retry(&id, &message).await? else {
                    return Ok(false);
                };
                match policy.decide(updated.retry_count) {
                    RetryDecision::RetryAfter(delay) => {
                        report.retried += 1;
                        tracing::debug!(
                            "[QUEUE] {} failed (attempt {}), backing off {:?}: {}",
                            id,
                            updated.retry_count,
                            delay,
                            message
                        );
                        tokio::time::sleep(delay).await;
                        Ok(true)
                    }
                    RetryDecision::GiveUp => {
                        if self.remove(&id).await? {
                            report.dropped.push(DroppedOperation {
                                reason: DropReason::Exhausted {
                                    attempts: updated.retry_count,
                                    last_error: message,
                                },
                                operation: updated,
                            });
                        }
                        Ok(false)
                    }
                }
            }
        }
    }
}
