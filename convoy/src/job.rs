use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an enqueued job.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl JobId {
    /// Create a new job ID using UUID v7.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key grouping jobs that must not be processed concurrently.
///
/// Two payloads belong to the same group iff their derived keys are equal.
/// Keys are computed on demand via [`Routable::routing_key`]; they are never
/// stored independently of the payload they were derived from.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct RoutingKey(String);

impl RoutingKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RoutingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RoutingKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RoutingKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Trait for payloads that can be routed through a delivery queue.
///
/// The queue never inspects the payload beyond deriving its routing key.
pub trait Routable: Clone + Send + Sync + 'static {
    /// Derive the routing key for this payload.
    fn routing_key(&self) -> RoutingKey;
}

/// Internal wrapper around a caller payload.
///
/// Carries identity, the enqueue timestamp (informational only), and the
/// retry counter. The store exclusively owns envelopes; the payload is
/// shared read-only with consumers during dispatch.
#[derive(Clone, Debug)]
pub struct JobEnvelope<E> {
    pub id: JobId,
    pub job: E,
    pub enqueued_at: DateTime<Utc>,
    /// Number of requeues after failure. Starts at 0.
    pub retries: u16,
}

impl<E: Routable> JobEnvelope<E> {
    pub fn new(job: E, retries: u16) -> Self {
        Self {
            id: JobId::new(),
            job,
            enqueued_at: Utc::now(),
            retries,
        }
    }

    pub fn routing_key(&self) -> RoutingKey {
        self.job.routing_key()
    }
}

/// Handle returned from enqueue operations.
#[derive(Clone, Debug)]
pub struct JobHandle {
    pub id: JobId,
    pub routing_key: RoutingKey,
}
