use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Behavior when a new job arrives and the queue is at capacity.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum OverflowPolicy {
    /// Reject the incoming job; `enqueue` returns an error.
    #[default]
    Reject,
    /// Evict the oldest pending job to make room for the new one.
    DropOldest,
}

/// Placement of a failed job when it is requeued for retry.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum RequeuePolicy {
    /// Reinsert at the global head: the retried job overtakes pending jobs
    /// of *other* keys. This is the historical behavior and the default.
    #[default]
    GlobalFront,
    /// Reinsert ahead of the first pending job sharing the same key, at the
    /// global tail when none is pending. Keeps retries from jumping over
    /// unrelated keys.
    KeyOrder,
}

/// Tuning knobs for a delivery queue.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueOptions {
    /// Maximum number of requeues after the initial dispatch. A job is
    /// abandoned once it has failed `retries + 1` times.
    pub retries: u16,
    /// Interval between fallback drain ticks.
    pub drain_interval: Duration,
    /// Pending-job ceiling. `None` means unbounded.
    pub capacity: Option<usize>,
    /// What to do with new jobs once `capacity` is reached.
    pub overflow: OverflowPolicy,
    /// Placement policy for retry requeue.
    pub requeue: RequeuePolicy,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            retries: 2,
            drain_interval: Duration::from_secs(2),
            capacity: None,
            overflow: OverflowPolicy::default(),
            requeue: RequeuePolicy::default(),
        }
    }
}

impl QueueOptions {
    /// Set the retry ceiling.
    pub fn with_retries(mut self, retries: u16) -> Self {
        self.retries = retries;
        self
    }

    /// Set the drain timer interval.
    pub fn with_drain_interval(mut self, interval: Duration) -> Self {
        self.drain_interval = interval;
        self
    }

    /// Bound the number of pending jobs.
    pub fn with_capacity(mut self, capacity: usize, overflow: OverflowPolicy) -> Self {
        self.capacity = Some(capacity);
        self.overflow = overflow;
        self
    }

    /// Set the retry requeue placement policy.
    pub fn with_requeue(mut self, requeue: RequeuePolicy) -> Self {
        self.requeue = requeue;
        self
    }
}
