//! Read-ahead of neighboring chunks.
//!
//! After every completed primary load the navigator warms the chunks on either
//! side of the visible one so that a single next/previous step is served from
//! the cache. Prefetches are fire-and-forget: they never touch the view, never
//! take a sequence token, and their failures are only logged.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::cache::ChunkCache;
use crate::dataset::{page_count, Chunk};
use crate::error::PreviewResult;

/// A background fetch the caller should issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefetchRequest {
    pub index: u64,
    pub size: u32,
}

/// Tracks in-flight warms and applies their results to the cache.
#[derive(Debug)]
pub struct PrefetchScheduler {
    enabled: bool,
    in_flight: HashSet<u64>,
}

impl PrefetchScheduler {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            in_flight: HashSet::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Request a warm for `index` at `size`.
    ///
    /// Returns `None` when prefetch is disabled, the chunk is already cached,
    /// or a warm for the same index is still running.
    pub fn warm(&mut self, cache: &ChunkCache, index: u64, size: u32) -> Option<PrefetchRequest> {
        if !self.enabled || cache.contains(index) || self.in_flight.contains(&index) {
            return None;
        }
        self.in_flight.insert(index);
        trace!(index, size, "Warming chunk");
        Some(PrefetchRequest { index, size })
    }

    /// Record the outcome of a warm.
    ///
    /// Successful results are stored only when they were fetched at
    /// `current_size`; results from before a resize are dropped. A chunk that
    /// reached the cache some other way is left untouched so a prefetch never
    /// changes recency.
    pub fn complete(
        &mut self,
        cache: &mut ChunkCache,
        request: PrefetchRequest,
        current_size: u32,
        result: PreviewResult<Chunk>,
    ) -> bool {
        if request.size != current_size {
            debug!(
                index = request.index,
                size = request.size,
                current_size,
                "Dropping prefetch fetched at a previous chunk size"
            );
            return false;
        }
        self.in_flight.remove(&request.index);

        match result {
            Ok(chunk) => {
                if cache.contains(request.index) {
                    return false;
                }
                cache.put(request.index, Arc::new(chunk));
                trace!(index = request.index, "Prefetched chunk cached");
                true
            }
            Err(e) if e.is_transient() => {
                debug!(index = request.index, error = %e, "Prefetch failed");
                false
            }
            Err(e) => {
                trace!(index = request.index, error = %e, "Prefetch abandoned");
                false
            }
        }
    }

    /// Forget all in-flight bookkeeping.
    pub fn reset(&mut self) {
        self.in_flight.clear();
    }

    /// Neighbors of `index` that exist in a dataset of `total_rows`.
    ///
    /// With an unknown row count only the lower bound is enforced.
    pub fn neighbors(index: u64, size: u32, total_rows: Option<u64>) -> Vec<u64> {
        let pages = total_rows.map_or(u64::MAX, |total| page_count(total, size));
        let mut out = Vec::with_capacity(2);
        if index > 0 && index - 1 < pages {
            out.push(index - 1);
        }
        if index < pages.saturating_sub(1) {
            out.push(index + 1);
        }
        out
    }
}
