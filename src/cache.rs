//! Size-accounted LRU memory cache.
//!
//! Bounds the memory held by derived query results. Every entry carries a
//! size estimate; inserting evicts least-recently-used entries until the new
//! entry fits. Recency lives in the `lru` crate's ordered map, so touch and
//! evict are O(1).

use lru::LruCache;
use serde::Serialize;
use std::borrow::Borrow;
use std::hash::Hash;

/// Default capacity: 50 MiB.
pub const DEFAULT_MAX_BYTES: usize = 50 * 1024 * 1024;

/// Estimate the in-memory size of a value as two bytes per character of its
/// JSON serialization.
///
/// This is an approximation, not a measurement. Values that fail to
/// serialize count as zero bytes.
pub fn estimate_size<V: Serialize + ?Sized>(value: &V) -> usize {
    serde_json::to_string(value).map_or(0, |json| json.chars().count() * 2)
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    size: usize,
}

/// Snapshot of cache occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub cache_size: usize,
    pub max_cache_size: usize,
    pub entry_count: usize,
    pub utilization_percent: f64,
}

/// LRU cache bounded by the sum of entry sizes.
///
/// Invariant: after `set` returns, `current_size() <= max_size()`, unless a
/// single entry larger than the whole capacity was stored into an emptied
/// cache.
#[derive(Debug)]
pub struct MemoryCache<K: Hash + Eq, V> {
    entries: LruCache<K, Entry<V>>,
    max_size: usize,
    current_size: usize,
}

impl<K: Hash + Eq, V> Default for MemoryCache<K, V> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BYTES)
    }
}

impl<K: Hash + Eq, V> MemoryCache<K, V> {
    /// Create a cache holding at most `max_size` estimated bytes.
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: LruCache::unbounded(),
            max_size,
            current_size: 0,
        }
    }

    /// Insert `value` under `key` with an explicit size estimate.
    pub fn set_sized(&mut self, key: K, value: V, size: usize) {
        if let Some(old) = self.entries.pop(&key) {
            self.current_size -= old.size;
        }

        while self.current_size.saturating_add(size) > self.max_size {
            let Some((_, evicted)) = self.entries.pop_lru() else {
                break;
            };
            self.current_size -= evicted.size;
            tracing::trace!(size = evicted.size, "Evicted least recently used entry");
        }

        self.entries.put(key, Entry { value, size });
        self.current_size = self.current_size.saturating_add(size);
    }

    /// Look up a value, marking it most recently used.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key).map(|entry| &entry.value)
    }

    /// Check for a key without touching its recency.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains(key)
    }

    /// Remove a key. Returns the value if it was present.
    pub fn delete<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let entry = self.entries.pop(key)?;
        self.current_size -= entry.size;
        Some(entry.value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.current_size = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn current_size(&self) -> usize {
        self.current_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn stats(&self) -> CacheStats {
        let utilization_percent = if self.max_size == 0 {
            0.0
        } else {
            self.current_size as f64 / self.max_size as f64 * 100.0
        };
        CacheStats {
            cache_size: self.current_size,
            max_cache_size: self.max_size,
            entry_count: self.entries.len(),
            utilization_percent,
        }
    }
}

impl<K: Hash + Eq, V: Serialize> MemoryCache<K, V> {
    /// Insert `value`, estimating its size when `size` is `None`.
    pub fn set(&mut self, key: K, value: V, size: Option<usize>) {
        let size = size.unwrap_or_else(|| estimate_size(&value));
        self.set_sized(key, value, size);
    }
}
