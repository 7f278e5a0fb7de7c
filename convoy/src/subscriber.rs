use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Consumer invoked for each dispatched job.
///
/// Consumers run sequentially in registration order; dispatch stops at the
/// first failure and the remaining consumers are skipped for that attempt.
/// A retried job is redelivered to *every* consumer, including those that
/// already succeeded before a later one failed, so consumers must be
/// idempotent or side-effect-free up to retry.
#[async_trait]
pub trait QueueConsumer<E>: Send + Sync {
    async fn handle(&self, job: &E) -> anyhow::Result<()>;
}

/// Adapter turning an async closure into a [`QueueConsumer`].
///
/// The payload is cloned into the closure, which keeps the closure free of
/// borrow gymnastics at the cost of one clone per delivery.
pub struct ConsumerFn<F> {
    f: F,
}

impl<F> ConsumerFn<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<E, F, Fut> QueueConsumer<E> for ConsumerFn<F>
where
    E: Clone + Send + Sync + 'static,
    F: Fn(E) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, job: &E) -> anyhow::Result<()> {
        (self.f)(job.clone()).await
    }
}

/// Identifier returned from `subscribe`, used to remove the registration.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub Uuid);

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ordered registry of consumers.
///
/// Registering the same consumer twice runs it twice per job; duplicates are
/// not collapsed.
pub struct SubscriberRegistry<E> {
    entries: Vec<(SubscriptionId, Arc<dyn QueueConsumer<E>>)>,
}

impl<E> SubscriberRegistry<E> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a consumer; it will run after all previously registered ones.
    pub fn subscribe(&mut self, consumer: Arc<dyn QueueConsumer<E>>) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.entries.push((id, consumer));
        id
    }

    /// Remove a registration. Returns `false` when the id is unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        before != self.entries.len()
    }

    /// Registration-ordered snapshot for one dispatch attempt.
    pub fn snapshot(&self) -> Vec<Arc<dyn QueueConsumer<E>>> {
        self.entries
            .iter()
            .map(|(_, consumer)| Arc::clone(consumer))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<E> Default for SubscriberRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for SubscriberRegistry<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("consumers", &self.entries.len())
            .finish()
    }
}
