//! Per-route hit counters.
//!
//! # Responsibilities
//! - Count requests per sanitized URL
//! - Expose a consistent point-in-time snapshot for the diagnostic route
//!
//! # Design Decisions
//! - Owned by each dispatcher; two dispatchers in one process never share counts
//! - Sharded map: existing keys are bumped under a shard read lock with an
//!   atomic add; a new key is created through the entry API under the shard
//!   write lock, so concurrent first hits create one counter and lose nothing
//! - Counters are never removed

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

/// Thread-safe route → hit count table.
#[derive(Debug, Clone, Default)]
pub struct CounterTable {
    inner: Arc<DashMap<String, AtomicU64>>,
}

impl CounterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one hit for `key`, creating its counter on first use. Returns the new count.
    pub fn increment(&self, key: &str) -> u64 {
        if let Some(counter) = self.inner.get(key) {
            return counter.fetch_add(1, Ordering::Relaxed) + 1;
        }
        self.inner
            .entry(key.to_owned())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed)
            + 1
    }

    /// Current count for `key`.
    pub fn get(&self, key: &str) -> Option<u64> {
        self.inner.get(key).map(|c| c.load(Ordering::Relaxed))
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.inner
            .iter()
            .map(|r| (r.key().clone(), r.value().load(Ordering::Relaxed)))
            .collect()
    }

    /// Number of distinct routes seen.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
