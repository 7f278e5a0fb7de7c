use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::Instrument;

use crate::config::{OverflowPolicy, QueueOptions, RequeuePolicy};
use crate::events::{QueueEvent, QueueEventBus, QueueEventPayload};
use crate::job::{JobEnvelope, JobHandle, Routable};
use crate::lock::LockTable;
use crate::shutdown::ShutdownToken;
use crate::store::JobStore;
use crate::subscriber::{QueueConsumer, SubscriberRegistry, SubscriptionId};
use crate::telemetry;

/// Contract for in-process delivery queues.
///
/// Handler failures never propagate back through `enqueue`; they surface as
/// warn/error logs and lifecycle events. `enqueue` only errors when a
/// capacity ceiling rejects the job.
#[async_trait]
pub trait Queue<E: Routable>: Send + Sync {
    fn name(&self) -> &str;

    /// Current pending count. Does not include the job in flight, if any.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool;

    /// Accept a job. Scheduling happens out of band; this returns as soon as
    /// the envelope is in the store.
    async fn enqueue(&self, job: E, retries: u16, is_priority: bool) -> anyhow::Result<JobHandle>;

    /// Remove and return the head envelope unconditionally, bypassing lock
    /// checks. Meant for inspection and tests; normal delivery goes through
    /// the scheduler loop's locked selection.
    async fn dequeue(&self) -> Option<JobEnvelope<E>>;

    /// Remove every pending envelope sharing this job's routing key. A job
    /// currently mid-dispatch for that key is not interrupted. Returns the
    /// number removed.
    async fn cancel_all(&self, job: &E) -> usize;

    /// Non-destructive lookup of the first pending envelope for this job's
    /// routing key.
    async fn peek(&self, job: &E) -> Option<JobEnvelope<E>>;

    /// True iff no pending envelope shares this job's routing key.
    fn is_empty_for_job(&self, job: &E) -> bool;

    /// Register a consumer. Consumers run sequentially in registration
    /// order for every dispatched job.
    fn subscribe(&self, consumer: Arc<dyn QueueConsumer<E>>) -> SubscriptionId;

    /// Remove a registration. Returns `false` when the id is unknown.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// Stop the drain timer. Pending jobs are neither drained nor persisted;
    /// enqueue-triggered dispatch keeps working until the queue is dropped.
    fn dispose(&self);
}

struct Inner<E> {
    store: JobStore<E>,
    locks: LockTable,
    subscribers: SubscriberRegistry<E>,
}

struct Shared<E> {
    name: String,
    options: QueueOptions,
    inner: Mutex<Inner<E>>,
    /// Single-in-flight guard for the scheduler loop. A trigger that loses
    /// `try_lock` is dropped; the drain timer restores progress if the
    /// corresponding wake signal is thereby lost.
    tick_gate: Arc<tokio::sync::Mutex<()>>,
    events: QueueEventBus,
    shutdown: ShutdownToken,
}

impl<E: Routable> Shared<E> {
    fn publish(&self, payload: QueueEventPayload) {
        self.events.publish(QueueEvent {
            queue: self.name.clone(),
            timestamp: Utc::now(),
            payload,
        });
    }
}

/// In-memory delivery queue serializing dispatch per routing key.
///
/// Jobs sharing a routing key are delivered strictly one at a time in FIFO
/// order; distinct keys proceed independently. A failed delivery is
/// requeued with its retry counter incremented until the configured ceiling,
/// then abandoned with an error log and an [`QueueEventPayload::Abandoned`]
/// event.
///
/// `MemoryQueue` is a cheap handle; clones share the same state. It must be
/// constructed inside a tokio runtime because it spawns its drain timer at
/// construction.
///
/// No timeout is imposed on consumers, and in-flight dispatch cannot be
/// cancelled: a consumer that never resolves stalls the scheduler loop.
/// Wrap slow handlers in `tokio::time::timeout` if that is a concern.
pub struct MemoryQueue<E: Routable> {
    shared: Arc<Shared<E>>,
}

impl<E: Routable> Clone for MemoryQueue<E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<E: Routable> std::fmt::Debug for MemoryQueue<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (pending, in_flight) = {
            let inner = self.shared.inner.lock();
            (inner.store.len(), inner.locks.in_flight())
        };
        f.debug_struct("MemoryQueue")
            .field("name", &self.shared.name)
            .field("pending", &pending)
            .field("in_flight", &in_flight)
            .finish()
    }
}

impl<E: Routable> MemoryQueue<E> {
    pub fn new(name: impl Into<String>, options: QueueOptions) -> Self {
        let shared = Arc::new(Shared {
            name: name.into(),
            options,
            inner: Mutex::new(Inner {
                store: JobStore::new(),
                locks: LockTable::new(),
                subscribers: SubscriberRegistry::new(),
            }),
            tick_gate: Arc::new(tokio::sync::Mutex::new(())),
            events: QueueEventBus::new(256),
            shutdown: ShutdownToken::new(),
        });
        Self::spawn_drain(&shared);
        Self { shared }
    }

    /// Subscribe to lifecycle events emitted by this queue.
    pub fn events(&self) -> broadcast::Receiver<QueueEvent> {
        self.shared.events.subscribe()
    }

    pub fn options(&self) -> &QueueOptions {
        &self.shared.options
    }

    /// Periodic fallback trigger. Holds only a weak reference so an
    /// undisposed queue can still be dropped; the task exits on upgrade
    /// failure or when `dispose` cancels the token.
    fn spawn_drain(shared: &Arc<Shared<E>>) {
        let weak = Arc::downgrade(shared);
        let shutdown = shared.shutdown.clone();
        let interval = shared.options.drain_interval;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        let Some(shared) = weak.upgrade() else { break };
                        if !shared.inner.lock().store.is_empty() {
                            tracing::debug!(queue = %shared.name, "drain timer triggering tick");
                            Self::spawn_tick(&shared);
                        }
                    }
                }
            }
        });
    }

    /// Submit a tick attempt to the executor. Runs after the current
    /// synchronous work completes; never blocks the caller.
    fn spawn_tick(shared: &Arc<Shared<E>>) {
        let shared = Arc::clone(shared);
        tokio::spawn(async move {
            Self::tick(shared).await;
        });
    }

    /// One run of the scheduler loop: select, lock, dispatch, settle,
    /// unlock, and keep going while eligible work remains.
    ///
    /// At most one tick body runs at a time. State lock and dispatch never
    /// overlap: the mutex is released before consumers are awaited.
    async fn tick(shared: Arc<Shared<E>>) {
        let Ok(_gate) = Arc::clone(&shared.tick_gate).try_lock_owned() else {
            return;
        };

        loop {
            let picked = {
                let mut guard = shared.inner.lock();
                let inner = &mut *guard;
                match inner.store.pop_first_unlocked(&inner.locks) {
                    Some(envelope) => {
                        inner.locks.try_acquire(&envelope.routing_key());
                        Some(envelope)
                    }
                    None => None,
                }
            };
            let Some(envelope) = picked else { return };

            let key = envelope.routing_key();
            let consumers = shared.inner.lock().subscribers.snapshot();
            shared.publish(QueueEventPayload::Dispatched {
                id: envelope.id,
                key: key.clone(),
            });

            let started = Instant::now();
            let span =
                telemetry::dispatch_span(&shared.name, &envelope.id.to_string(), key.as_str());
            let failure = async {
                for consumer in &consumers {
                    if let Err(err) = consumer.handle(&envelope.job).await {
                        return Some(err);
                    }
                }
                None
            }
            .instrument(span)
            .await;

            match failure {
                None => {
                    telemetry::record_delivered(&shared.name, "success", started.elapsed());
                    shared.publish(QueueEventPayload::Completed {
                        id: envelope.id,
                        key: key.clone(),
                    });
                }
                Some(err) => {
                    let attempt = envelope.retries + 1;
                    if attempt <= shared.options.retries {
                        tracing::warn!(
                            queue = %shared.name,
                            job_id = %envelope.id,
                            routing_key = %key,
                            attempt,
                            error = %err,
                            "queue failed to process job, requeuing"
                        );
                        let id = envelope.id;
                        let retry = JobEnvelope {
                            retries: attempt,
                            ..envelope
                        };
                        {
                            let mut guard = shared.inner.lock();
                            match shared.options.requeue {
                                RequeuePolicy::GlobalFront => guard.store.push_front(retry),
                                RequeuePolicy::KeyOrder => {
                                    guard.store.insert_before_first_of_key(retry)
                                }
                            }
                        }
                        telemetry::record_delivered(&shared.name, "retried", started.elapsed());
                        shared.publish(QueueEventPayload::Retried {
                            id,
                            key: key.clone(),
                            attempt,
                            error: err.to_string(),
                        });
                    } else {
                        tracing::error!(
                            queue = %shared.name,
                            job_id = %envelope.id,
                            routing_key = %key,
                            retries = shared.options.retries,
                            error = %err,
                            "retrying job failed too many times, abandoning the job"
                        );
                        telemetry::record_delivered(&shared.name, "abandoned", started.elapsed());
                        shared.publish(QueueEventPayload::Abandoned {
                            id: envelope.id,
                            key: key.clone(),
                            retries: envelope.retries,
                            error: err.to_string(),
                        });
                    }
                }
            }

            let more = {
                let mut guard = shared.inner.lock();
                guard.locks.release(&key);
                telemetry::set_queue_depth(&shared.name, guard.store.len());
                !guard.store.is_empty()
            };
            if !more {
                return;
            }
            // Yield between jobs so other tasks sharing this executor run.
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl<E: Routable> Queue<E> for MemoryQueue<E> {
    fn name(&self) -> &str {
        &self.shared.name
    }

    fn len(&self) -> usize {
        self.shared.inner.lock().store.len()
    }

    fn is_empty(&self) -> bool {
        self.shared.inner.lock().store.is_empty()
    }

    async fn enqueue(&self, job: E, retries: u16, is_priority: bool) -> anyhow::Result<JobHandle> {
        let key = job.routing_key();
        let envelope = JobEnvelope::new(job, retries);
        let id = envelope.id;

        let (evicted, depth) = {
            let mut guard = self.shared.inner.lock();
            let mut evicted = None;
            if let Some(capacity) = self.shared.options.capacity {
                if guard.store.len() >= capacity {
                    match self.shared.options.overflow {
                        OverflowPolicy::Reject => {
                            anyhow::bail!(
                                "queue {} is at capacity ({capacity} pending jobs)",
                                self.shared.name
                            );
                        }
                        OverflowPolicy::DropOldest => {
                            evicted = guard.store.pop_front();
                        }
                    }
                }
            }
            if is_priority {
                guard.store.push_front(envelope);
            } else {
                guard.store.push_back(envelope);
            }
            (evicted, guard.store.len())
        };

        if let Some(old) = evicted {
            tracing::warn!(
                queue = %self.shared.name,
                job_id = %old.id,
                "queue at capacity, dropping oldest pending job"
            );
            self.shared.publish(QueueEventPayload::Dropped {
                id: old.id,
                key: old.routing_key(),
            });
        }

        telemetry::record_enqueued(&self.shared.name, key.as_str());
        telemetry::set_queue_depth(&self.shared.name, depth);
        self.shared.publish(QueueEventPayload::Enqueued {
            id,
            key: key.clone(),
            retries,
        });
        Self::spawn_tick(&self.shared);

        Ok(JobHandle {
            id,
            routing_key: key,
        })
    }

    async fn dequeue(&self) -> Option<JobEnvelope<E>> {
        self.shared.inner.lock().store.pop_front()
    }

    async fn cancel_all(&self, job: &E) -> usize {
        let key = job.routing_key();
        let removed = self.shared.inner.lock().store.remove_key(&key);
        if removed > 0 {
            tracing::debug!(
                queue = %self.shared.name,
                routing_key = %key,
                removed,
                "cancelled pending jobs"
            );
            self.shared
                .publish(QueueEventPayload::Cancelled { key, removed });
        }
        removed
    }

    async fn peek(&self, job: &E) -> Option<JobEnvelope<E>> {
        let key = job.routing_key();
        self.shared.inner.lock().store.first_for_key(&key).cloned()
    }

    fn is_empty_for_job(&self, job: &E) -> bool {
        let key = job.routing_key();
        !self.shared.inner.lock().store.contains_key(&key)
    }

    fn subscribe(&self, consumer: Arc<dyn QueueConsumer<E>>) -> SubscriptionId {
        self.shared.inner.lock().subscribers.subscribe(consumer)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.inner.lock().subscribers.unsubscribe(id)
    }

    fn dispose(&self) {
        self.shared.shutdown.cancel();
    }
}

// Keep the drain timer honest in tests: insert without the enqueue-side wake
// signal so only the timer can pick the job up.
#[cfg(test)]
impl<E: Routable> MemoryQueue<E> {
    fn insert_unwoken(&self, job: E) {
        self.shared
            .inner
            .lock()
            .store
            .push_back(JobEnvelope::new(job, 0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriber::ConsumerFn;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Clone, Debug)]
    struct Note {
        key: &'static str,
    }

    impl Routable for Note {
        fn routing_key(&self) -> crate::job::RoutingKey {
            crate::job::RoutingKey::from(self.key)
        }
    }

    fn counting_consumer(counter: Arc<AtomicUsize>) -> Arc<dyn QueueConsumer<Note>> {
        Arc::new(ConsumerFn::new(move |_note: Note| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                anyhow::Ok(())
            }
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn drain_timer_recovers_a_lost_wake_signal() {
        let queue = MemoryQueue::new(
            "inbound",
            QueueOptions::default().with_drain_interval(Duration::from_millis(50)),
        );
        let delivered = Arc::new(AtomicUsize::new(0));
        queue.subscribe(counting_consumer(Arc::clone(&delivered)));

        // No wake signal: only the drain timer can find this job.
        queue.insert_unwoken(Note { key: "a" });
        assert_eq!(queue.len(), 1);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dispose_stops_the_drain_timer() {
        let queue = MemoryQueue::new(
            "inbound",
            QueueOptions::default().with_drain_interval(Duration::from_millis(50)),
        );
        let delivered = Arc::new(AtomicUsize::new(0));
        queue.subscribe(counting_consumer(Arc::clone(&delivered)));

        queue.dispose();
        queue.insert_unwoken(Note { key: "a" });

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(delivered.load(Ordering::SeqCst), 0);
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn enqueue_still_dispatches_after_dispose() {
        let queue = MemoryQueue::new("inbound", QueueOptions::default());
        let delivered = Arc::new(AtomicUsize::new(0));
        queue.subscribe(counting_consumer(Arc::clone(&delivered)));

        queue.dispose();
        queue
            .enqueue(Note { key: "a" }, 0, false)
            .await
            .expect("enqueue should succeed");

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dispose_is_idempotent() {
        let queue = MemoryQueue::<Note>::new("inbound", QueueOptions::default());
        queue.dispose();
        queue.dispose();
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch_with_no_subscribers_discards_the_job() {
        let queue = MemoryQueue::new("inbound", QueueOptions::default());
        queue
            .enqueue(Note { key: "a" }, 0, false)
            .await
            .expect("enqueue should succeed");

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(queue.is_empty());
    }
}
