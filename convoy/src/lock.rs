use std::collections::HashSet;

use crate::job::RoutingKey;

/// Tracks routing keys that currently have an in-flight dispatch.
///
/// Invariant: a key is present iff a job with that key is being delivered to
/// consumers right now. Entries are removed on release rather than flagged,
/// so the table is bounded by concurrently in-flight keys, not by the
/// historical key count.
#[derive(Debug, Default)]
pub struct LockTable {
    held: HashSet<RoutingKey>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the key as in flight. Returns `false` if it was already held.
    ///
    /// Callers must only acquire immediately before dispatch and must always
    /// release afterwards, whatever the dispatch outcome.
    pub fn try_acquire(&mut self, key: &RoutingKey) -> bool {
        self.held.insert(key.clone())
    }

    /// Remove the lock entry unconditionally.
    pub fn release(&mut self, key: &RoutingKey) {
        self.held.remove(key);
    }

    pub fn is_locked(&self, key: &RoutingKey) -> bool {
        self.held.contains(key)
    }

    /// Number of keys currently in flight.
    pub fn in_flight(&self) -> usize {
        self.held.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_release_cycle() {
        let mut locks = LockTable::new();
        let key = RoutingKey::from("bot1::web::u1");

        assert!(!locks.is_locked(&key));
        assert!(locks.try_acquire(&key));
        assert!(locks.is_locked(&key));
        assert!(!locks.try_acquire(&key));
        assert_eq!(locks.in_flight(), 1);

        locks.release(&key);
        assert!(!locks.is_locked(&key));
        assert_eq!(locks.in_flight(), 0);
    }

    #[test]
    fn release_is_unconditional() {
        let mut locks = LockTable::new();
        // Releasing a key that was never acquired is a no-op.
        locks.release(&RoutingKey::from("absent"));
        assert_eq!(locks.in_flight(), 0);
    }

    #[test]
    fn distinct_keys_are_independent() {
        let mut locks = LockTable::new();
        let a = RoutingKey::from("bot1::web::u1");
        let b = RoutingKey::from("bot1::web::u2");

        assert!(locks.try_acquire(&a));
        assert!(locks.try_acquire(&b));
        locks.release(&a);
        assert!(!locks.is_locked(&a));
        assert!(locks.is_locked(&b));
    }
}
