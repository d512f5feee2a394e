//! Dataset data model: handles, chunks and row values.

mod chunk;
mod handle;
mod value;

pub use chunk::{page_count, Chunk, ChunkShapeError};
pub use handle::{DatasetHandle, MAX_HANDLE_LEN};
pub use value::{FieldValue, Record};
