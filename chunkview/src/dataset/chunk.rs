//! Chunks: fixed-size pages of a dataset.

use serde::Serialize;
use thiserror::Error;

use super::value::Record;

/// Reasons a chunk cannot be constructed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChunkShapeError {
    #[error("chunk size must be positive")]
    ZeroSize,

    #[error("chunk holds {rows} rows but its size is {size}")]
    TooManyRows { rows: usize, size: u32 },
}

/// One page of dataset rows plus pagination metadata.
///
/// Chunks are immutable once built and are shared as `Arc<Chunk>` between the
/// cache and the published view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    index: u64,
    size: u32,
    total_rows: u64,
    rows: Vec<Record>,
    has_more: bool,
}

impl Chunk {
    /// Build a chunk, enforcing `size > 0` and `rows.len() <= size`.
    pub fn new(
        index: u64,
        size: u32,
        total_rows: u64,
        rows: Vec<Record>,
        has_more: bool,
    ) -> Result<Self, ChunkShapeError> {
        if size == 0 {
            return Err(ChunkShapeError::ZeroSize);
        }
        if rows.len() > size as usize {
            return Err(ChunkShapeError::TooManyRows {
                rows: rows.len(),
                size,
            });
        }
        Ok(Self {
            index,
            size,
            total_rows,
            rows,
            has_more,
        })
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn total_rows(&self) -> u64 {
        self.total_rows
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Zero-based position of the first row of this chunk in the dataset.
    pub fn first_row(&self) -> u64 {
        self.index.saturating_mul(self.size as u64)
    }
}

/// Number of chunks needed to cover `total_rows` at `size` rows per chunk.
///
/// An empty dataset still has one (empty) chunk at index 0.
pub fn page_count(total_rows: u64, size: u32) -> u64 {
    if size == 0 {
        return 0;
    }
    total_rows.div_ceil(size as u64).max(1)
}
