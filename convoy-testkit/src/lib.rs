//! Test fixtures for convoy: a chat-event payload plus instrumented
//! consumers used by integration tests and benches.

pub mod consumer;
pub mod event;

pub use consumer::{ConcurrencyProbe, FlakyConsumer, RecordingConsumer};
pub use event::ChatEvent;
