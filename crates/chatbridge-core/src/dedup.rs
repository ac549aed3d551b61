// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded at-most-once filter for inbound webhook event keys.
//!
//! Purely in-memory; a restart forgets seen keys, which is tolerated
//! because the downstream message posts are idempotent-safe-enough
//! (a duplicate is a visible nuisance, not corruption).

use indexmap::IndexSet;

/// Fixed-capacity, recency-ordered set of seen string keys.
///
/// When at capacity the least-recently-touched key is evicted. Touching an
/// existing key refreshes its recency but `add` still reports it as seen.
#[derive(Debug)]
pub struct LruSet {
    capacity: usize,
    seen: IndexSet<String>,
}

impl LruSet {
    /// Creates a set holding at most `capacity` keys. Capacity must cover
    /// the plausible webhook replay window, a few thousand entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            seen: IndexSet::with_capacity(capacity.max(1)),
        }
    }

    /// Inserts `key`, returning `true` only on first insertion.
    ///
    /// A duplicate refreshes the key's recency and returns `false`.
    pub fn add(&mut self, key: impl Into<String>) -> bool {
        let key = key.into();
        if self.seen.shift_remove(&key) {
            // Re-insert at the back to refresh recency.
            self.seen.insert(key);
            return false;
        }
        if self.seen.len() >= self.capacity {
            self.seen.shift_remove_index(0);
        }
        self.seen.insert(key);
        true
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_add_true_second_false() {
        let mut set = LruSet::new(8);
        assert!(set.add("k"));
        assert!(!set.add("k"));
    }

    #[test]
    fn evicts_least_recently_touched_at_capacity() {
        let mut set = LruSet::new(3);
        assert!(set.add("a"));
        assert!(set.add("b"));
        assert!(set.add("c"));
        // Touch "a" so "b" becomes the oldest.
        assert!(!set.add("a"));
        assert!(set.add("d"));
        assert_eq!(set.len(), 3);
        // "b" was evicted; "a" survived its refresh.
        assert!(set.add("b"));
        assert!(!set.add("a"));
    }

    #[test]
    fn capacity_is_never_exceeded() {
        let mut set = LruSet::new(4);
        for i in 0..100 {
            set.add(format!("key-{i}"));
        }
        assert_eq!(set.len(), 4);
    }
}
