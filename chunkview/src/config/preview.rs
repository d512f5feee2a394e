//! Library-side preview settings.

use crate::cache::CACHE_LIMIT;
use crate::readiness::DEFAULT_MAX_RESUBSCRIBES;

/// Rows per chunk when nothing else is configured.
pub const DEFAULT_CHUNK_SIZE: u32 = 100;

/// Settings for a navigation controller.
///
/// # Example
///
/// ```
/// use chunkview::config::PreviewConfig;
///
/// let config = PreviewConfig::new()
///     .with_chunk_size(250)
///     .with_prefetch(false);
/// assert_eq!(config.chunk_size, 250);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewConfig {
    /// Initial rows per chunk.
    pub chunk_size: u32,
    /// Warm neighboring chunks after each load.
    pub prefetch: bool,
    /// Unexpected status channel closures tolerated while processing.
    pub max_resubscribes: u32,
    /// Chunks held by the cache.
    pub cache_capacity: usize,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            prefetch: true,
            max_resubscribes: DEFAULT_MAX_RESUBSCRIBES,
            cache_capacity: CACHE_LIMIT,
        }
    }
}

impl PreviewConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the initial chunk size. Zero is ignored.
    pub fn with_chunk_size(mut self, chunk_size: u32) -> Self {
        if chunk_size > 0 {
            self.chunk_size = chunk_size;
        }
        self
    }

    pub fn with_prefetch(mut self, prefetch: bool) -> Self {
        self.prefetch = prefetch;
        self
    }

    pub fn with_max_resubscribes(mut self, max: u32) -> Self {
        self.max_resubscribes = max;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PreviewConfig::default();
        assert_eq!(config.chunk_size, 100);
        assert!(config.prefetch);
        assert_eq!(config.max_resubscribes, 3);
        assert_eq!(config.cache_capacity, 8);
    }

    #[test]
    fn test_zero_chunk_size_keeps_previous() {
        let config = PreviewConfig::new().with_chunk_size(0);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
    }
}
