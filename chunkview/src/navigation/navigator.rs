//! Synchronous navigation core.
//!
//! The [`Navigator`] owns every piece of per-session state (readiness, cache,
//! sequencer, prefetch bookkeeping, visible chunk) and turns user intents and
//! I/O completions into [`Effect`]s. It performs no I/O itself, so every
//! ordering scenario can be replayed deterministically in tests.
//!
//! # Primary load
//!
//! ```text
//! load(i) ──► ready? ──no──► ignored
//!               │
//!               ▼
//!          cache hit? ──yes──► apply + publish, invalidate older tokens,
//!               │              warm neighbors
//!               │ no
//!               ▼
//!          next token ──► FetchChunk(Primary), warm neighbors
//!
//! completion ──► size matches? ──► cache
//!                token current? ──► apply + publish, advisory on a
//!                                   transient failure, Error on a terminal one
//!                warm neighbors (every outcome except cancellation)
//! ```
//!
//! Neighbors are clamped to the best-known row count, taken from the metadata
//! or the last applied chunk. Before either is known only index 0 bounds them.

use std::mem;
use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use super::effect::{ChunkCompletion, ChunkRequest, Completion, Effect, FetchKind};
use super::state::{NavigationState, PreviewView};
use crate::cache::{CacheStats, ChunkCache};
use crate::config::PreviewConfig;
use crate::dataset::{Chunk, DatasetHandle};
use crate::error::{PreviewError, PreviewResult};
use crate::prefetch::{PrefetchRequest, PrefetchScheduler};
use crate::readiness::{ReadinessAction, ReadinessState, ReadinessTracker};
use crate::sequencer::{RequestSequencer, SequenceToken};
use crate::status::StatusSubscription;

// =============================================================================
// Statistics
// =============================================================================

/// Counters accumulated over the lifetime of a navigator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavigatorStats {
    /// Primary fetches issued.
    pub primary_requests: u64,
    /// Primary loads served from the cache.
    pub cache_hits: u64,
    /// Primary responses that arrived after a newer request.
    pub stale_responses: u64,
    /// Current primary loads that failed.
    pub failed_loads: u64,
    /// Prefetches issued.
    pub prefetch_requests: u64,
    /// Prefetch results written to the cache.
    pub prefetch_stored: u64,
    /// Completions dropped because their session was disposed.
    pub ignored_completions: u64,
    /// Counters of the chunk cache at the time of the snapshot.
    pub cache: CacheStats,
}

// =============================================================================
// Navigator
// =============================================================================

/// Deterministic state machine behind a navigation controller.
#[derive(Debug)]
pub struct Navigator {
    epoch: u64,
    chunk_size: u32,
    readiness: ReadinessTracker,
    cache: ChunkCache,
    sequencer: RequestSequencer,
    prefetch: PrefetchScheduler,
    current: Option<Arc<Chunk>>,
    /// Best-known row count, from metadata or the last applied chunk.
    total_rows: Option<u64>,
    advisory: Option<String>,
    pending: Option<SequenceToken>,
    effects: Vec<Effect>,
    stats: NavigatorStats,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new(&PreviewConfig::default())
    }
}

impl Navigator {
    pub fn new(config: &PreviewConfig) -> Self {
        Self {
            epoch: 0,
            chunk_size: config.chunk_size.max(1),
            readiness: ReadinessTracker::new(config.max_resubscribes),
            cache: ChunkCache::with_capacity(config.cache_capacity),
            sequencer: RequestSequencer::new(),
            prefetch: PrefetchScheduler::new(config.prefetch),
            current: None,
            total_rows: None,
            advisory: None,
            pending: None,
            effects: Vec::new(),
            stats: NavigatorStats::default(),
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    pub fn readiness(&self) -> &ReadinessState {
        self.readiness.state()
    }

    pub fn handle(&self) -> Option<&DatasetHandle> {
        self.readiness.handle()
    }

    pub fn cache(&self) -> &ChunkCache {
        &self.cache
    }

    pub fn current_chunk(&self) -> Option<Arc<Chunk>> {
        self.current.clone()
    }

    pub fn navigation(&self) -> Option<NavigationState> {
        self.current.as_deref().map(NavigationState::from_chunk)
    }

    /// The live status subscription, if one is attached.
    pub fn subscription_mut(&mut self) -> Option<&mut StatusSubscription> {
        self.readiness.subscription_mut()
    }

    pub fn stats(&self) -> NavigatorStats {
        NavigatorStats {
            cache: self.cache.stats(),
            ..self.stats
        }
    }

    /// Snapshot of the current state.
    pub fn view(&self) -> PreviewView {
        PreviewView {
            handle: self.readiness.handle().cloned(),
            readiness: self.readiness.state().clone(),
            navigation: self.navigation(),
            chunk: self.current.clone(),
            advisory: self.advisory.clone(),
            loading: self.pending.is_some(),
        }
    }

    /// Drain the effects produced since the last call.
    pub fn take_effects(&mut self) -> Vec<Effect> {
        mem::take(&mut self.effects)
    }

    // -------------------------------------------------------------------------
    // Session lifecycle
    // -------------------------------------------------------------------------

    /// Start a session for `raw_handle`, disposing any current one.
    pub fn open(&mut self, raw_handle: &str) {
        self.reset_session();
        match self.readiness.activate(raw_handle) {
            ReadinessAction::None => {}
            action => self.run_readiness_action(action),
        }
        self.publish();
    }

    /// Tear down the current session.
    pub fn dispose(&mut self) {
        self.reset_session();
        self.readiness.dispose();
        self.publish();
    }

    fn reset_session(&mut self) {
        self.epoch += 1;
        self.effects.push(Effect::CancelSession);
        self.sequencer.invalidate();
        self.pending = None;
        self.cache.clear();
        self.prefetch.reset();
        self.current = None;
        self.total_rows = None;
        self.advisory = None;
    }

    // -------------------------------------------------------------------------
    // Navigation intents
    // -------------------------------------------------------------------------

    /// Show chunk `index`. Negative indices are ignored.
    pub fn load_chunk(&mut self, index: i64) {
        match u64::try_from(index) {
            Ok(index) => self.load(index),
            Err(_) => debug!(index, "Ignoring negative chunk index"),
        }
    }

    pub fn go_to_index(&mut self, index: i64) {
        self.load_chunk(index);
    }

    pub fn go_to_next(&mut self) {
        let Some(nav) = self.navigation() else {
            debug!("Nothing loaded yet, ignoring next");
            return;
        };
        if !nav.has_more {
            debug!(index = nav.current_index, "Already at last chunk");
            return;
        }
        self.load(nav.current_index + 1);
    }

    pub fn go_to_previous(&mut self) {
        let Some(nav) = self.navigation() else {
            debug!("Nothing loaded yet, ignoring previous");
            return;
        };
        if !nav.has_previous() {
            debug!("Already at first chunk");
            return;
        }
        self.load(nav.current_index - 1);
    }

    /// Switch to a new chunk size and reload from the first chunk.
    pub fn change_chunk_size(&mut self, new_size: u32) {
        if new_size == 0 {
            warn!("Rejected chunk size of zero");
            return;
        }

        info!(old = self.chunk_size, new = new_size, "Changing chunk size");
        self.chunk_size = new_size;
        self.cache.clear();
        self.prefetch.reset();
        self.sequencer.invalidate();
        if self.pending.take().is_some() {
            self.effects.push(Effect::CancelPrimary);
        }

        if self.readiness.is_ready() {
            self.load(0);
        } else {
            self.publish();
        }
    }

    fn load(&mut self, index: u64) {
        if !self.readiness.is_ready() {
            debug!(index, state = %self.readiness.state(), "Dataset not ready, ignoring load");
            return;
        }
        let Some(handle) = self.readiness.handle().cloned() else {
            return;
        };

        if let Some(chunk) = self.cache.get(index) {
            trace!(index, "Cache hit");
            self.stats.cache_hits += 1;
            self.sequencer.invalidate();
            if self.pending.take().is_some() {
                self.effects.push(Effect::CancelPrimary);
            }
            self.apply(chunk);
            self.publish();
            self.warm_neighbors(index);
            return;
        }

        let token = self.sequencer.next();
        if self.pending.replace(token).is_some() {
            self.effects.push(Effect::CancelPrimary);
        }
        self.stats.primary_requests += 1;
        debug!(handle = %handle, index, size = self.chunk_size, token = %token, "Loading chunk");
        self.effects.push(Effect::FetchChunk(ChunkRequest {
            epoch: self.epoch,
            handle,
            index,
            size: self.chunk_size,
            kind: FetchKind::Primary(token),
        }));
        self.warm_neighbors(index);
        self.publish();
    }

    // -------------------------------------------------------------------------
    // Completions
    // -------------------------------------------------------------------------

    /// Apply the result of an effect.
    pub fn handle_completion(&mut self, completion: Completion) {
        let epoch = match &completion {
            Completion::Metadata { epoch, .. }
            | Completion::Subscribed { epoch, .. }
            | Completion::Push { epoch, .. } => *epoch,
            Completion::Chunk(chunk) => chunk.request.epoch,
        };
        if epoch != self.epoch {
            trace!(epoch, current = self.epoch, "Ignoring completion from a previous session");
            self.stats.ignored_completions += 1;
            return;
        }

        match completion {
            Completion::Metadata { result, .. } => {
                if let Some(total) = result.as_ref().ok().and_then(|m| m.total_rows) {
                    self.total_rows = Some(total);
                }
                self.step_readiness(|tracker| tracker.on_metadata(result))
            }
            Completion::Subscribed { result, .. } => {
                self.step_readiness(|tracker| tracker.on_subscribed(result))
            }
            Completion::Push { event, .. } => self.step_readiness(|tracker| tracker.on_push(event)),
            Completion::Chunk(completion) => self.complete_chunk(completion),
        }
    }

    fn step_readiness<F>(&mut self, step: F)
    where
        F: FnOnce(&mut ReadinessTracker) -> ReadinessAction,
    {
        let before = self.readiness.state().clone();
        let action = step(&mut self.readiness);
        if *self.readiness.state() != before {
            self.publish();
        }
        self.run_readiness_action(action);
    }

    fn run_readiness_action(&mut self, action: ReadinessAction) {
        let Some(handle) = self.readiness.handle().cloned() else {
            return;
        };
        let epoch = self.epoch;

        match action {
            ReadinessAction::None => {}
            ReadinessAction::FetchMetadata => {
                self.effects.push(Effect::FetchMetadata { epoch, handle });
            }
            ReadinessAction::Subscribe => {
                self.effects.push(Effect::Subscribe { epoch, handle });
            }
            ReadinessAction::Listen => {
                self.effects.push(Effect::ListenStatus { epoch });
                self.effects.push(Effect::FetchMetadata { epoch, handle });
            }
            ReadinessAction::WarmStart => self.load(0),
        }
    }

    fn complete_chunk(&mut self, completion: ChunkCompletion) {
        let ChunkCompletion { request, result } = completion;
        match request.kind {
            FetchKind::Prefetch => {
                let prefetch = PrefetchRequest {
                    index: request.index,
                    size: request.size,
                };
                if self
                    .prefetch
                    .complete(&mut self.cache, prefetch, self.chunk_size, result)
                {
                    self.stats.prefetch_stored += 1;
                }
            }
            FetchKind::Primary(token) => self.complete_primary(request, token, result),
        }
    }

    fn complete_primary(
        &mut self,
        request: ChunkRequest,
        token: SequenceToken,
        result: PreviewResult<Chunk>,
    ) {
        let current = self.sequencer.is_current(token);
        if current {
            self.pending = None;
        }

        match result {
            Ok(chunk) => {
                let chunk = Arc::new(chunk);
                if chunk.size() == self.chunk_size {
                    self.cache.put(request.index, Arc::clone(&chunk));
                } else {
                    debug!(
                        index = request.index,
                        size = chunk.size(),
                        current_size = self.chunk_size,
                        "Dropping chunk fetched at a previous chunk size"
                    );
                }

                if current {
                    self.apply(chunk);
                    self.publish();
                } else {
                    self.stats.stale_responses += 1;
                    debug!(index = request.index, token = %token, "Discarding stale response");
                }
            }
            Err(PreviewError::Cancelled) => {
                trace!(index = request.index, token = %token, "Primary fetch cancelled");
                if current {
                    self.publish();
                }
                return;
            }
            Err(e) if current && e.is_terminal() => {
                self.stats.failed_loads += 1;
                self.effects.push(Effect::CancelSession);
                self.prefetch.reset();
                self.current = None;
                self.advisory = None;
                self.readiness.fail(e);
                self.publish();
                return;
            }
            Err(e) => {
                if current {
                    self.stats.failed_loads += 1;
                    warn!(index = request.index, error = %e, "Failed to load chunk");
                    self.advisory = Some(e.to_string());
                    self.publish();
                } else {
                    self.stats.stale_responses += 1;
                    debug!(index = request.index, error = %e, "Discarding stale failure");
                }
            }
        }

        if request.size == self.chunk_size {
            self.warm_neighbors(request.index);
        }
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    fn apply(&mut self, chunk: Arc<Chunk>) {
        self.total_rows = Some(chunk.total_rows());
        self.current = Some(chunk);
        self.advisory = None;
    }

    fn warm_neighbors(&mut self, index: u64) {
        if !self.readiness.is_ready() {
            return;
        }
        let Some(handle) = self.readiness.handle().cloned() else {
            return;
        };

        for neighbor in PrefetchScheduler::neighbors(index, self.chunk_size, self.total_rows) {
            if let Some(request) = self.prefetch.warm(&self.cache, neighbor, self.chunk_size) {
                self.stats.prefetch_requests += 1;
                self.effects.push(Effect::FetchChunk(ChunkRequest {
                    epoch: self.epoch,
                    handle: handle.clone(),
                    index: request.index,
                    size: request.size,
                    kind: FetchKind::Prefetch,
                }));
            }
        }
    }

    fn publish(&mut self) {
        let view = self.view();
        self.effects.push(Effect::Publish(view));
    }
}
