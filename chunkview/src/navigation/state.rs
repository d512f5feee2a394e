//! Navigation state and the published view snapshot.

use std::sync::Arc;

use crate::dataset::{page_count, Chunk, DatasetHandle};
use crate::readiness::ReadinessState;

/// Position within the dataset, derived from the last applied chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationState {
    pub current_index: u64,
    pub chunk_size: u32,
    pub total_rows: u64,
    pub has_more: bool,
}

impl NavigationState {
    pub fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            current_index: chunk.index(),
            chunk_size: chunk.size(),
            total_rows: chunk.total_rows(),
            has_more: chunk.has_more(),
        }
    }

    pub fn page_count(&self) -> u64 {
        page_count(self.total_rows, self.chunk_size)
    }

    pub fn has_previous(&self) -> bool {
        self.current_index > 0
    }
}

/// Read-only snapshot of a controller, published on every change.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewView {
    pub handle: Option<DatasetHandle>,
    pub readiness: ReadinessState,
    pub navigation: Option<NavigationState>,
    pub chunk: Option<Arc<Chunk>>,
    /// Non-terminal message from the last failed load.
    pub advisory: Option<String>,
    /// A primary load is in flight.
    pub loading: bool,
}

impl Default for PreviewView {
    fn default() -> Self {
        Self {
            handle: None,
            readiness: ReadinessState::Idle,
            navigation: None,
            chunk: None,
            advisory: None,
            loading: false,
        }
    }
}

impl PreviewView {
    pub fn current_index(&self) -> Option<u64> {
        self.navigation.map(|nav| nav.current_index)
    }

    pub fn is_ready(&self) -> bool {
        self.readiness.is_ready()
    }
}
