//! Tracing instrumentation for queue lifecycle events.
//!
//! Span constructors and recording helpers used by the scheduler loop and
//! the queue façade. The `record_*` functions log through `tracing` and,
//! when the `metrics` feature is enabled, update the Prometheus collectors
//! in [`crate::metrics`].

use std::time::Duration;

use tracing::{info_span, Span};

/// Span covering the synchronous part of an enqueue.
#[must_use]
pub fn enqueue_span(queue: &str, routing_key: &str) -> Span {
    info_span!(
        "convoy.enqueue",
        queue = %queue,
        routing_key = %routing_key,
    )
}

/// Span covering one delivery attempt: every consumer, in order.
#[must_use]
pub fn dispatch_span(queue: &str, job_id: &str, routing_key: &str) -> Span {
    info_span!(
        "convoy.dispatch",
        queue = %queue,
        job_id = %job_id,
        routing_key = %routing_key,
    )
}

/// Record a job accepted into the store.
pub fn record_enqueued(queue: &str, routing_key: &str) {
    tracing::debug!(queue = %queue, routing_key = %routing_key, "job enqueued");

    #[cfg(feature = "metrics")]
    crate::metrics::record_job_enqueued(queue);
}

/// Record the outcome of one delivery attempt.
///
/// `status` is one of `success`, `retried`, `abandoned`.
pub fn record_delivered(queue: &str, status: &str, duration: Duration) {
    tracing::debug!(
        queue = %queue,
        status = %status,
        duration_ms = duration.as_millis() as u64,
        "job delivery attempt finished"
    );

    #[cfg(feature = "metrics")]
    crate::metrics::record_job_delivered(queue, status, duration.as_secs_f64());
}

/// Update the pending-job depth gauge.
pub fn set_queue_depth(queue: &str, depth: usize) {
    tracing::trace!(queue = %queue, depth, "queue depth updated");

    #[cfg(feature = "metrics")]
    crate::metrics::set_queue_depth(queue, depth as f64);
}
