//! Computed table for memoizing manager operations.
//!
//! Backed by [`HashMap`], so there are no collisions: a cached result is never evicted
//! until [`Cache::clear`] is called.

use std::collections::HashMap;
use std::hash::Hash;

pub struct Cache<K, V> {
    map: HashMap<K, V>,
    hits: usize,
    misses: usize,
}

impl<K, V> Cache<K, V> {
    /// Creates a new cache with room for `2^bits` entries before the first resize.
    pub fn new(bits: usize) -> Self {
        assert!(bits <= 31, "Cache bits should be in the range 0..=31");
        Self {
            map: HashMap::with_capacity(1 << bits),
            hits: 0,
            misses: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Get the number of cache hits.
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Get the number of cache misses.
    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

impl<K, V> Cache<K, V>
where
    K: Hash + Eq,
    V: Copy,
{
    /// Get the cached result.
    pub fn get(&mut self, key: &K) -> Option<V> {
        match self.map.get(key) {
            Some(&v) => {
                self.hits += 1;
                Some(v)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Insert a result into the cache.
    pub fn insert(&mut self, key: K, value: V) {
        self.map.insert(key, value);
    }
}
