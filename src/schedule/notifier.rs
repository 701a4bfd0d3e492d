//! Local notification primitive.
//!
//! The scheduler only talks to the [`Notifier`] trait. [`TokioNotifier`]
//! implements it with one sleeping task per scheduled notification and
//! publishes fired notifications on a broadcast channel.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::schedule::TriggerKind;

/// A reminder delivered to the skipper
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub plan_id: Uuid,
    pub kind: TriggerKind,
    pub vessel_name: String,
    pub deadline: DateTime<Utc>,
}

impl Notification {
    /// Human-readable message
    pub fn message(&self) -> String {
        match self.kind {
            TriggerKind::PreReminder => format!(
                "{}: check-in due at {}",
                self.vessel_name,
                self.deadline.format("%H:%M UTC")
            ),
            TriggerKind::DeadlineReached => format!(
                "{}: check-in deadline reached, check in now to stop escalation",
                self.vessel_name
            ),
        }
    }
}

/// Opaque handle to a scheduled notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotificationHandle(Uuid);

impl NotificationHandle {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `notification` at `fire_at`
    async fn schedule(&self, notification: Notification, fire_at: DateTime<Utc>) -> NotificationHandle;

    /// Cancel a scheduled notification; unknown or fired handles are ignored
    async fn cancel(&self, handle: NotificationHandle);

    /// Deliver `notification` now
    async fn fire_immediately(&self, notification: Notification) -> NotificationHandle;
}

/// Tokio-task backed notifier
#[derive(Debug, Clone)]
pub struct TokioNotifier {
    sender: broadcast::Sender<Notification>,
    pending: Arc<Mutex<HashMap<NotificationHandle, JoinHandle<()>>>>,
}

impl TokioNotifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);
        Self {
            sender,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Receive fired notifications
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Notifications scheduled but not yet fired or cancelled
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    fn deliver(sender: &broadcast::Sender<Notification>, notification: Notification) {
        tracing::info!(
            "[SCHEDULER] Notify {:?} for {} ({})",
            notification.kind,
            notification.vessel_name,
            notification.plan_id
        );
        let _ = sender.send(notification);
    }
}

impl Default for TokioNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for TokioNotifier {
    async fn schedule(&self, notification: Notification, fire_at: DateTime<Utc>) -> NotificationHandle {
        let handle = NotificationHandle::new();
        let delay = (fire_at - Utc::now()).to_std().unwrap_or_default();

        // Hold the lock across spawn so the task cannot finish before it is tracked.
        let mut pending = self.pending.lock().await;
        let sender = self.sender.clone();
        let tracked = Arc::clone(&self.pending);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tracked.lock().await.remove(&handle).is_none() {
                return;
            }
            Self::deliver(&sender, notification);
        });
        pending.insert(handle, task);
        handle
    }

    async fn cancel(&self, handle: NotificationHandle) {
        if let Some(task) = self.pending.lock().await.remove(&handle) {
            task.abort();
        }
    }

    async fn fire_immediately(&self, notification: Notification) -> NotificationHandle {
        Self::deliver(&self.sender, notification);
        NotificationHandle::new()
    }
}
