//! Convoy - in-process delivery queue with per-key serialization.
//!
//! An asynchronous queue that serializes processing of jobs sharing a
//! routing key while letting distinct keys proceed independently, with
//! bounded automatic retry on consumer failure.
//!
//! # Core Concepts
//!
//! - **Routable**: Payloads implement the [`Routable`] trait to derive the
//!   string key that groups jobs which must never run concurrently.
//!
//! - **Queue**: The [`Queue`] trait is the public contract — enqueue,
//!   dequeue, cancel, peek, subscribe, dispose. [`MemoryQueue`] is the
//!   in-memory implementation.
//!
//! - **Consumers**: [`QueueConsumer`] callbacks are invoked sequentially,
//!   in registration order, for every dispatched job. A consumer failure
//!   requeues the job at the head of the store until the retry ceiling is
//!   reached, after which the job is abandoned with an error log.
//!
//! - **Drain timer**: A periodic fallback owned by each queue triggers the
//!   scheduler loop whenever jobs are pending, guaranteeing progress even
//!   if an enqueue-side wake signal is lost.
//!
//! - **Events**: Lifecycle transitions are broadcast on a non-blocking
//!   [`QueueEventBus`]; the `Abandoned` event doubles as a dead-letter hook.
//!
//! # Feature Flags
//!
//! - `metrics` - Prometheus metrics support
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use convoy::{ConsumerFn, MemoryQueue, Queue, QueueOptions, Routable, RoutingKey};
//!
//! #[derive(Clone)]
//! struct Inbound { bot_id: String, channel: String, target: String }
//!
//! impl Routable for Inbound {
//!     fn routing_key(&self) -> RoutingKey {
//!         RoutingKey::new(format!("{}::{}::{}", self.bot_id, self.channel, self.target))
//!     }
//! }
//!
//! let queue = MemoryQueue::new("incoming", QueueOptions::default());
//! queue.subscribe(Arc::new(ConsumerFn::new(|event: Inbound| async move {
//!     // process the event
//!     Ok(())
//! })));
//! ```

/// Queue tuning knobs: retry ceiling, drain interval, capacity, and the
/// overflow and requeue policies.
pub mod config;

/// Lifecycle event types and the in-process broadcast bus.
pub mod events;

/// Job identity, routing keys, the [`Routable`] trait, and the envelope
/// wrapped around every enqueued payload.
pub mod job;

/// The lock table tracking routing keys with an in-flight dispatch.
pub mod lock;

/// The [`Queue`] contract, the in-memory implementation, its scheduler
/// loop, and the drain timer.
pub mod queue;

/// Cancellation token shared between a queue and its drain timer.
pub mod shutdown;

/// The ordered store of pending envelopes.
pub mod store;

/// Consumer trait, closure adapter, and the ordered subscriber registry.
pub mod subscriber;

/// Tracing spans and recording helpers for queue lifecycle events.
pub mod telemetry;

#[cfg(feature = "metrics")]
/// Prometheus metrics, enabled by the `metrics` feature.
pub mod metrics;

pub use config::*;
pub use events::*;
pub use job::*;
pub use lock::*;
pub use queue::*;
pub use shutdown::*;
pub use store::*;
pub use subscriber::*;
