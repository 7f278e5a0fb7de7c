use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use async_trait::async_trait;
use convoy::{QueueConsumer, Routable};
use parking_lot::Mutex;

use crate::ChatEvent;

/// Records every payload it handles, in delivery order.
///
/// Clones share the same log, so two labeled clones registered as separate
/// subscribers interleave their entries in one sequence.
#[derive(Clone, Default)]
pub struct RecordingConsumer {
    seen: Arc<Mutex<Vec<String>>>,
    delay: Option<Duration>,
    label: Option<String>,
}

impl RecordingConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` before recording, to widen race windows.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Prefix recorded entries with `label:`.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Recorded entries, in delivery order.
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.seen.lock().len()
    }
}

#[async_trait]
impl QueueConsumer<ChatEvent> for RecordingConsumer {
    async fn handle(&self, job: &ChatEvent) -> anyhow::Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let entry = match &self.label {
            Some(label) => format!("{label}:{}", job.preview),
            None => job.preview.clone(),
        };
        self.seen.lock().push(entry);
        Ok(())
    }
}

/// Fails the first `failures` deliveries of each payload, then succeeds.
///
/// Attempts are counted per preview, so one flaky payload does not poison
/// the others.
#[derive(Clone)]
pub struct FlakyConsumer {
    failures: u16,
    attempts: Arc<Mutex<HashMap<String, u16>>>,
}

impl FlakyConsumer {
    pub fn failing(failures: u16) -> Self {
        Self {
            failures,
            attempts: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// How many times a payload has been attempted so far.
    pub fn attempts_for(&self, preview: &str) -> u16 {
        self.attempts.lock().get(preview).copied().unwrap_or(0)
    }
}

#[async_trait]
impl QueueConsumer<ChatEvent> for FlakyConsumer {
    async fn handle(&self, job: &ChatEvent) -> anyhow::Result<()> {
        let attempt = {
            let mut attempts = self.attempts.lock();
            let entry = attempts.entry(job.preview.clone()).or_insert(0);
            *entry += 1;
            *entry
        };
        if attempt <= self.failures {
            bail!("simulated failure {attempt} for {}", job.preview);
        }
        Ok(())
    }
}

/// Counts concurrent entries per routing key to verify mutual exclusion.
///
/// Holds each delivery open for `hold` so overlapping dispatches of the
/// same key would be observed if the queue ever allowed them.
#[derive(Clone)]
pub struct ConcurrencyProbe {
    current: Arc<Mutex<HashMap<String, usize>>>,
    max_seen: Arc<Mutex<HashMap<String, usize>>>,
    hold: Duration,
}

impl ConcurrencyProbe {
    pub fn holding(hold: Duration) -> Self {
        Self {
            current: Arc::new(Mutex::new(HashMap::new())),
            max_seen: Arc::new(Mutex::new(HashMap::new())),
            hold,
        }
    }

    /// Highest number of simultaneous deliveries observed for a key.
    pub fn max_concurrent(&self, key: &str) -> usize {
        self.max_seen.lock().get(key).copied().unwrap_or(0)
    }

    /// Total number of keys that saw at least one delivery.
    pub fn keys_seen(&self) -> usize {
        self.max_seen.lock().len()
    }
}

#[async_trait]
impl QueueConsumer<ChatEvent> for ConcurrencyProbe {
    async fn handle(&self, job: &ChatEvent) -> anyhow::Result<()> {
        let key = job.routing_key().to_string();
        {
            let mut current = self.current.lock();
            let entered = current.entry(key.clone()).or_insert(0);
            *entered += 1;
            let mut max_seen = self.max_seen.lock();
            let peak = max_seen.entry(key.clone()).or_insert(0);
            *peak = (*peak).max(*entered);
        }

        tokio::time::sleep(self.hold).await;

        let mut current = self.current.lock();
        if let Some(entered) = current.get_mut(&key) {
            *entered = entered.saturating_sub(1);
        }
        Ok(())
    }
}
