//! Prometheus metrics for queue monitoring.
//!
//! Compiled only with the `metrics` feature.
//!
//! # Metrics
//!
//! ## Counters
//! - `convoy_jobs_enqueued_total` - jobs accepted into the store
//! - `convoy_jobs_delivered_total` - delivery attempts by outcome
//!
//! ## Gauges
//! - `convoy_queue_depth` - current pending-job count
//!
//! ## Histograms
//! - `convoy_dispatch_duration_seconds` - delivery attempt duration
#![cfg(feature = "metrics")]

use std::sync::LazyLock;

use prometheus::{exponential_buckets, CounterVec, GaugeVec, HistogramVec, Opts, Registry};

/// Global Prometheus registry for convoy metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Counter for jobs accepted into the store.
///
/// Labels:
/// - `queue`: queue name
pub static JOBS_ENQUEUED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new("convoy_jobs_enqueued_total", "Total number of jobs enqueued");
    CounterVec::new(opts, &["queue"]).expect("convoy_jobs_enqueued_total metric creation failed")
});

/// Counter for delivery attempts by outcome.
///
/// Labels:
/// - `queue`: queue name
/// - `status`: `success`, `retried`, or `abandoned`
pub static JOBS_DELIVERED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        "convoy_jobs_delivered_total",
        "Total number of job delivery attempts",
    );
    CounterVec::new(opts, &["queue", "status"])
        .expect("convoy_jobs_delivered_total metric creation failed")
});

/// Gauge for the current pending-job count.
///
/// Labels:
/// - `queue`: queue name
pub static QUEUE_DEPTH: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new("convoy_queue_depth", "Current number of pending jobs");
    GaugeVec::new(opts, &["queue"]).expect("convoy_queue_depth metric creation failed")
});

/// Histogram for delivery attempt duration in seconds.
///
/// Labels:
/// - `queue`: queue name
/// - `status`: `success`, `retried`, or `abandoned`
pub static DISPATCH_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let buckets = exponential_buckets(0.001, 2.0, 15).expect("bucket creation failed");
    let opts = prometheus::HistogramOpts::new(
        "convoy_dispatch_duration_seconds",
        "Delivery attempt duration in seconds",
    )
    .buckets(buckets);
    HistogramVec::new(opts, &["queue", "status"])
        .expect("convoy_dispatch_duration_seconds metric creation failed")
});

/// Register all collectors with the global registry.
///
/// Idempotent: re-registering an already-registered collector is not an
/// error.
pub fn init_metrics() -> anyhow::Result<()> {
    let registry = &*REGISTRY;

    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(JOBS_ENQUEUED_TOTAL.clone()),
        Box::new(JOBS_DELIVERED_TOTAL.clone()),
        Box::new(QUEUE_DEPTH.clone()),
        Box::new(DISPATCH_DURATION_SECONDS.clone()),
    ];

    for collector in collectors {
        match registry.register(collector) {
            Ok(()) => {}
            Err(prometheus::Error::AlreadyReg) => {}
            Err(err) => return Err(err.into()),
        }
    }

    Ok(())
}

pub(crate) fn record_job_enqueued(queue: &str) {
    JOBS_ENQUEUED_TOTAL.with_label_values(&[queue]).inc();
}

pub(crate) fn record_job_delivered(queue: &str, status: &str, duration_secs: f64) {
    JOBS_DELIVERED_TOTAL
        .with_label_values(&[queue, status])
        .inc();
    DISPATCH_DURATION_SECONDS
        .with_label_values(&[queue, status])
        .observe(duration_secs);
}

pub(crate) fn set_queue_depth(queue: &str, depth: f64) {
    QUEUE_DEPTH.with_label_values(&[queue]).set(depth);
}
