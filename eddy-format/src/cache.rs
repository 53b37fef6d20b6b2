//! Small bounded LRU map for converter resolution results.

use std::collections::HashMap;
use std::hash::Hash;

/// Bounded least-recently-used cache. Recency is a monotonic stamp, so
/// lookup and insert stay O(1) amortized; eviction scans, which is fine at
/// the small capacities used here.
#[derive(Debug)]
pub(crate) struct LruCache<K, V> {
    capacity: usize,
    stamp: u64,
    entries: HashMap<K, (u64, V)>,
}

impl<K: Eq + Hash + Clone, V: Clone> LruCache<K, V> {
    pub(crate) fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0);
        LruCache {
            capacity,
            stamp: 0,
            entries: HashMap::with_capacity(capacity),
        }
    }

    pub(crate) fn get(&mut self, key: &K) -> Option<V> {
        self.stamp += 1;
        let stamp = self.stamp;
        self.entries.get_mut(key).map(|(s, v)| {
            *s = stamp;
            v.clone()
        })
    }

    pub(crate) fn insert(&mut self, key: K, value: V) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            if let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, (s, _))| *s)
                .map(|(k, _)| k.clone())
            {
                self.entries.remove(&oldest);
            }
        }
        self.stamp += 1;
        self.entries.insert(key, (self.stamp, value));
    }
}
