//! Fan-out of notifications to observers.
//!
//! One actor task owns the observer registry. [`Broadcaster`] handles are
//! cheap to clone and only ever talk to the actor through its bounded inbox,
//! so registration, removal and delivery never race each other.
//!
//! Delivery to an observer never waits: if its channel is full or closed the
//! observer is removed and everyone else still gets the notification.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;

use super::Notification;

/// Default capacity of the actor's inbox.
pub const DEFAULT_INBOX_CAPACITY: usize = 100;

/// Default capacity of each observer's channel.
pub const DEFAULT_OBSERVER_CAPACITY: usize = 64;

pub type ObserverId = u64;

enum Command {
    Register {
        id: ObserverId,
        sender: mpsc::Sender<Notification>,
    },
    Unregister(ObserverId),
    Publish(Notification),
    Count(oneshot::Sender<usize>),
    Shutdown,
}

/// Handle to the broadcaster actor.
#[derive(Clone)]
pub struct Broadcaster {
    inbox: mpsc::Sender<Command>,
    next_id: Arc<AtomicU64>,
    observer_capacity: usize,
}

/// An observer's end of the broadcaster.
///
/// Dropping it unregisters the observer on the next publish.
pub struct Subscription {
    id: ObserverId,
    rx: mpsc::Receiver<Notification>,
}

impl Subscription {
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Next notification, or `None` once this observer has been removed or
    /// the broadcaster has stopped.
    pub async fn recv(&mut self) -> Option<Notification> {
        self.rx.recv().await
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<Notification> {
        self.rx.try_recv().ok()
    }
}

impl Broadcaster {
    /// Start a broadcaster with the default capacities.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_INBOX_CAPACITY, DEFAULT_OBSERVER_CAPACITY)
    }

    /// Start a broadcaster with explicit inbox and per-observer capacities.
    pub fn with_capacity(inbox_capacity: usize, observer_capacity: usize) -> Self {
        let (inbox, rx) = mpsc::channel(inbox_capacity.max(1));
        tokio::spawn(run(rx));
        Self {
            inbox,
            next_id: Arc::new(AtomicU64::new(1)),
            observer_capacity: observer_capacity.max(1),
        }
    }

    /// Register a new observer.
    pub async fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, rx) = mpsc::channel(self.observer_capacity);
        // If the actor is gone the sender is dropped with the command and the
        // subscription reads as closed.
        let _ = self.inbox.send(Command::Register { id, sender }).await;
        Subscription { id, rx }
    }

    /// Remove an observer. Unknown ids are ignored.
    pub async fn unsubscribe(&self, id: ObserverId) {
        let _ = self.inbox.send(Command::Unregister(id)).await;
    }

    /// Queue a notification for every observer. Waits only for inbox room.
    pub async fn publish(&self, notification: Notification) {
        if self.inbox.send(Command::Publish(notification)).await.is_err() {
            tracing::debug!("Broadcaster stopped, notification dropped");
        }
    }

    /// Number of registered observers, after every command queued before
    /// this call has been applied.
    pub async fn observer_count(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        if self.inbox.send(Command::Count(reply)).await.is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// Stop the actor. Every subscription then reads as closed.
    pub async fn shutdown(&self) {
        let _ = self.inbox.send(Command::Shutdown).await;
    }

    /// Whether the actor is still accepting commands.
    pub fn is_running(&self) -> bool {
        !self.inbox.is_closed()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

async fn run(mut inbox: mpsc::Receiver<Command>) {
    let mut observers: HashMap<ObserverId, mpsc::Sender<Notification>> = HashMap::new();

    while let Some(command) = inbox.recv().await {
        match command {
            Command::Register { id, sender } => {
                observers.insert(id, sender);
                tracing::debug!(observer = id, total = observers.len(), "Observer registered");
            }
            Command::Unregister(id) => {
                if observers.remove(&id).is_some() {
                    tracing::debug!(observer = id, total = observers.len(), "Observer removed");
                }
            }
            Command::Publish(notification) => {
                observers.retain(|id, sender| match sender.try_send(notification.clone()) {
                    Ok(()) => true,
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(observer = *id, "Observer fell behind, dropping it");
                        false
                    }
                    Err(TrySendError::Closed(_)) => {
                        tracing::debug!(observer = *id, "Observer went away");
                        false
                    }
                });
            }
            Command::Count(reply) => {
                let _ = reply.send(observers.len());
            }
            Command::Shutdown => break,
        }
    }

    tracing::debug!(observers = observers.len(), "Broadcaster stopped");
}
