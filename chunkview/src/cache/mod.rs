//! In-memory chunk cache.
//!
//! - [`ChunkCache`] - fixed-capacity LRU keyed by chunk index
//! - [`CacheStats`] - hit/miss/eviction counters

mod lru;
mod stats;

pub use lru::{ChunkCache, CACHE_LIMIT};
pub use stats::CacheStats;
