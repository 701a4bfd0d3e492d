//! # Sync State
//!
//! Snapshot of the engine for status displays, plus the event stream that
//! reports every confirmed, dropped and reconciled change.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::offline::{DroppedOperation, OperationKind};
use crate::sync::network_monitor::NetworkStatus;

/// Point-in-time view of the sync engine
#[derive(Debug, Clone)]
pub struct SyncStatus {
    /// Whether a drain pass is running
    pub is_syncing: bool,
    /// Operations waiting for confirmation
    pub pending_operations: usize,
    /// Last confirmed sync
    pub last_sync_at: Option<DateTime<Utc>>,
    pub network_status: NetworkStatus,
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self {
            is_syncing: false,
            pending_operations: 0,
            last_sync_at: None,
            network_status: NetworkStatus::Offline,
        }
    }
}

/// Events published on the engine's broadcast channel
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// The remote confirmed an operation
    OperationSynced { id: Uuid, kind: OperationKind },
    /// An operation left the log without confirmation; emitted once per drop
    OperationDropped(DroppedOperation),
    /// A drain pass finished
    DrainCompleted { synced: usize, remaining: usize },
    /// The plan and contact slices were replaced from the remote
    Reconciled { plans: usize, contacts: usize },
}
