//! Backend traits for chunk and metadata access.
//!
//! The navigator never talks to the network directly. It depends on these
//! traits so tests can inject scripted backends and so the transport can be
//! swapped without touching the navigation logic.

pub use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use super::payload::DatasetMetadata;
use crate::dataset::{Chunk, DatasetHandle};
use crate::error::PreviewResult;

/// Fetches one chunk of a dataset.
///
/// Implementations issue exactly one request per call and neither cache nor
/// sequence results; both are the caller's job. When `cancel` fires the
/// returned future should resolve promptly with
/// [`PreviewError::Cancelled`](crate::PreviewError::Cancelled).
pub trait ChunkFetcher: Send + Sync {
    fn fetch(
        &self,
        handle: DatasetHandle,
        index: u64,
        size: u32,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, PreviewResult<Chunk>>;
}

/// Fetches dataset metadata (processing status).
pub trait MetadataSource: Send + Sync {
    fn metadata(
        &self,
        handle: DatasetHandle,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, PreviewResult<DatasetMetadata>>;
}
