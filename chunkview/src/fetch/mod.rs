//! Chunk and metadata fetching.
//!
//! - [`ChunkFetcher`] / [`MetadataSource`] - backend traits used by the navigator
//! - [`HttpPreviewClient`] - reqwest implementation of both
//! - [`parse_chunk`] / [`parse_metadata`] - payload validation

mod http;
mod payload;
mod traits;

pub use http::{
    default_user_agent, ClientConfig, HttpPreviewClient, DEFAULT_MAX_CONCURRENT_REQUESTS,
    DEFAULT_TIMEOUT_SECS,
};
pub use payload::{parse_chunk, parse_metadata, DatasetMetadata, ProcessingStatus};
pub use traits::{BoxFuture, ChunkFetcher, MetadataSource};
