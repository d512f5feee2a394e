//! Bounded LRU store of fetched chunks.
//!
//! The working set is always "current chunk plus a few neighbors", so the
//! capacity is small and fixed. Ordering lives in an [`IndexMap`]: the front
//! is the least recently touched entry, the back the most recent.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::trace;

use super::stats::CacheStats;
use crate::dataset::Chunk;

/// Maximum number of chunks held by a cache.
pub const CACHE_LIMIT: usize = 8;

/// LRU cache of chunks keyed by chunk index.
///
/// A cache is scoped to one chunk size: index 3 at size 100 and index 3 at
/// size 50 are different row ranges, so callers clear the cache whenever the
/// chunk size changes.
#[derive(Debug)]
pub struct ChunkCache {
    entries: IndexMap<u64, Arc<Chunk>>,
    capacity: usize,
    stats: CacheStats,
}

impl Default for ChunkCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkCache {
    /// Create a cache holding up to [`CACHE_LIMIT`] chunks.
    pub fn new() -> Self {
        Self::with_capacity(CACHE_LIMIT)
    }

    /// Create a cache with a custom capacity (at least one entry).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: IndexMap::with_capacity(capacity + 1),
            capacity,
            stats: CacheStats::new(),
        }
    }

    /// Look up a chunk, marking it most recently used on a hit.
    pub fn get(&mut self, index: u64) -> Option<Arc<Chunk>> {
        match self.entries.shift_remove(&index) {
            Some(chunk) => {
                self.entries.insert(index, Arc::clone(&chunk));
                self.stats.hits += 1;
                Some(chunk)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Look up a chunk without changing its recency.
    pub fn peek(&self, index: u64) -> Option<&Arc<Chunk>> {
        self.entries.get(&index)
    }

    pub fn contains(&self, index: u64) -> bool {
        self.entries.contains_key(&index)
    }

    /// Insert or overwrite a chunk, then evict down to capacity.
    ///
    /// Overwriting an existing index also makes it most recently used.
    pub fn put(&mut self, index: u64, chunk: Arc<Chunk>) {
        self.entries.shift_remove(&index);
        self.entries.insert(index, chunk);
        self.stats.insertions += 1;

        while self.entries.len() > self.capacity {
            if let Some((evicted, _)) = self.entries.shift_remove_index(0) {
                self.stats.evictions += 1;
                trace!(index = evicted, "Evicted chunk from cache");
            }
        }
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Cached indices from least to most recently used.
    pub fn indices(&self) -> Vec<u64> {
        self.entries.keys().copied().collect()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.entries.len(),
            ..self.stats
        }
    }
}
