use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::job::{JobId, RoutingKey};

/// Lifecycle event emitted by a queue.
#[derive(Clone, Debug)]
pub struct QueueEvent {
    /// Name of the queue that emitted the event.
    pub queue: String,
    pub timestamp: DateTime<Utc>,
    pub payload: QueueEventPayload,
}

/// Payload for queue lifecycle transitions.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum QueueEventPayload {
    /// Job accepted into the store.
    Enqueued {
        id: JobId,
        key: RoutingKey,
        retries: u16,
    },
    /// Job selected, its key locked, delivery about to start.
    Dispatched { id: JobId, key: RoutingKey },
    /// Every consumer completed without failure; the job is gone.
    Completed { id: JobId, key: RoutingKey },
    /// A consumer failed and the job was requeued.
    Retried {
        id: JobId,
        key: RoutingKey,
        /// Retry count carried by the requeued copy.
        attempt: u16,
        error: String,
    },
    /// Retry ceiling exceeded; the job was dropped for good.
    ///
    /// The queue itself keeps no dead-letter storage: subscribe to these
    /// events and persist them if loss past the ceiling is unacceptable.
    Abandoned {
        id: JobId,
        key: RoutingKey,
        retries: u16,
        error: String,
    },
    /// Pending jobs removed by `cancel_all`.
    Cancelled { key: RoutingKey, removed: usize },
    /// Oldest pending job evicted under `OverflowPolicy::DropOldest`.
    Dropped { id: JobId, key: RoutingKey },
}

/// Broadcast bus for queue lifecycle events.
///
/// Fan-out over a tokio broadcast channel: publishing never blocks, events
/// are dropped when nobody listens, and a subscriber that lags past the
/// channel capacity receives `RecvError::Lagged` instead of stalling the
/// scheduler loop.
pub struct QueueEventBus {
    sender: broadcast::Sender<QueueEvent>,
    capacity: usize,
}

impl QueueEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: QueueEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl std::fmt::Debug for QueueEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueEventBus")
            .field("capacity", &self.capacity)
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}
