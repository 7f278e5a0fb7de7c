use std::collections::VecDeque;

use crate::job::{JobEnvelope, Routable, RoutingKey};
use crate::lock::LockTable;

/// Ordered sequence of pending envelopes.
///
/// Insertion order defines FIFO delivery within a routing key for normal
/// inserts; head inserts are used for caller-requested priority and for
/// retry requeue under [`RequeuePolicy::GlobalFront`].
///
/// [`RequeuePolicy::GlobalFront`]: crate::config::RequeuePolicy::GlobalFront
#[derive(Debug)]
pub struct JobStore<E> {
    entries: VecDeque<JobEnvelope<E>>,
}

impl<E: Routable> JobStore<E> {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    /// Append to the tail.
    pub fn push_back(&mut self, envelope: JobEnvelope<E>) {
        self.entries.push_back(envelope);
    }

    /// Insert at the head.
    pub fn push_front(&mut self, envelope: JobEnvelope<E>) {
        self.entries.push_front(envelope);
    }

    /// Insert ahead of the first pending envelope sharing the same key, or
    /// at the tail when none is pending. Used by the `KeyOrder` requeue
    /// policy: a retried job stays ahead of later jobs of its own key
    /// without overtaking other keys.
    pub fn insert_before_first_of_key(&mut self, envelope: JobEnvelope<E>) {
        let key = envelope.routing_key();
        match self.entries.iter().position(|e| e.routing_key() == key) {
            Some(idx) => self.entries.insert(idx, envelope),
            None => self.entries.push_back(envelope),
        }
    }

    /// Remove and return the first envelope whose key is not locked.
    ///
    /// Linear scan from the head; `None` when the store is empty or every
    /// pending key is in flight. O(n) in queue depth per call, acceptable
    /// for an in-memory store bounded by live traffic.
    pub fn pop_first_unlocked(&mut self, locks: &LockTable) -> Option<JobEnvelope<E>> {
        let idx = self
            .entries
            .iter()
            .position(|e| !locks.is_locked(&e.routing_key()))?;
        self.entries.remove(idx)
    }

    /// Remove and return the head envelope, ignoring locks.
    pub fn pop_front(&mut self) -> Option<JobEnvelope<E>> {
        self.entries.pop_front()
    }

    /// Remove every envelope whose key equals `key`. Returns the count
    /// removed. Other keys keep their relative order.
    pub fn remove_key(&mut self, key: &RoutingKey) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.routing_key() != *key);
        before - self.entries.len()
    }

    /// Non-destructive lookup of the first pending envelope for `key`.
    pub fn first_for_key(&self, key: &RoutingKey) -> Option<&JobEnvelope<E>> {
        self.entries.iter().find(|e| e.routing_key() == *key)
    }

    pub fn contains_key(&self, key: &RoutingKey) -> bool {
        self.first_for_key(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<E: Routable> Default for JobStore<E> {
    fn default() -> Self {
        Self::new()
    }
}
