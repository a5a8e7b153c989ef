//! Progress events and where they go.
//!
//! The dispatcher publishes [`Notification`]s to a [`ProgressSink`]. The
//! usual sink is a [`Broadcaster`], which fans them out to any number of
//! observers (WebSocket clients, CLI progress bars, tests).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::dispatch::BatchReport;

mod broadcaster;
pub use broadcaster::{
    Broadcaster, ObserverId, Subscription, DEFAULT_INBOX_CAPACITY, DEFAULT_OBSERVER_CAPACITY,
};

/// Snapshot of a running batch.
///
/// `current` counts resolved units (`sent + failed`), so
/// `sent + failed <= total` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub current: usize,
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
    pub percentage: f64,
}

impl ProgressEvent {
    pub fn new(sent: usize, failed: usize, total: usize) -> Self {
        let current = sent + failed;
        let percentage = if total == 0 {
            100.0
        } else {
            current as f64 / total as f64 * 100.0
        };
        Self {
            current,
            total,
            sent,
            failed,
            percentage,
        }
    }

    /// Whether every unit has resolved.
    pub fn is_complete(&self) -> bool {
        self.current >= self.total
    }
}

/// Everything an observer can be told.
///
/// Serialized as `{"type": "...", "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Notification {
    /// One more unit resolved.
    Progress(ProgressEvent),
    /// The batch drained.
    BatchCompleted(BatchReport),
    /// The batch was aborted before any unit ran.
    BatchFailed { batch_id: Uuid, reason: String },
}

/// Destination for dispatcher notifications.
///
/// Publishing never fails from the dispatcher's point of view; a sink that
/// cannot deliver drops the notification.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn publish(&self, notification: Notification);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

#[async_trait]
impl ProgressSink for NullSink {
    async fn publish(&self, _notification: Notification) {}
}

#[async_trait]
impl ProgressSink for mpsc::Sender<Notification> {
    async fn publish(&self, notification: Notification) {
        if self.send(notification).await.is_err() {
            tracing::trace!("Progress receiver closed, notification dropped");
        }
    }
}

#[async_trait]
impl ProgressSink for Broadcaster {
    async fn publish(&self, notification: Notification) {
        Broadcaster::publish(self, notification).await;
    }
}
