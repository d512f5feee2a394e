//! Instructions emitted by the navigator for the controller loop.

use crate::dataset::{Chunk, DatasetHandle};
use crate::error::PreviewResult;
use crate::fetch::DatasetMetadata;
use crate::sequencer::SequenceToken;
use crate::status::{PushEvent, StatusSubscription};

use super::state::PreviewView;

/// Why a chunk is being fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// Drives the view; applied only while its token is current.
    Primary(SequenceToken),
    /// Background warm; only ever written to the cache.
    Prefetch,
}

/// One chunk fetch to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRequest {
    pub epoch: u64,
    pub handle: DatasetHandle,
    pub index: u64,
    pub size: u32,
    pub kind: FetchKind,
}

/// I/O and notifications the controller loop must carry out.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    FetchMetadata { epoch: u64, handle: DatasetHandle },
    Subscribe { epoch: u64, handle: DatasetHandle },
    /// Start delivering events from the attached subscription.
    ListenStatus { epoch: u64 },
    FetchChunk(ChunkRequest),
    /// Cancel the in-flight primary fetch, if any.
    CancelPrimary,
    /// Cancel every fetch belonging to the previous session.
    CancelSession,
    Publish(PreviewView),
}

/// Completion of an [`Effect::FetchChunk`].
#[derive(Debug)]
pub struct ChunkCompletion {
    pub request: ChunkRequest,
    pub result: PreviewResult<Chunk>,
}

/// Results delivered back into the controller loop.
#[derive(Debug)]
pub enum Completion {
    Metadata {
        epoch: u64,
        result: PreviewResult<DatasetMetadata>,
    },
    Subscribed {
        epoch: u64,
        result: PreviewResult<StatusSubscription>,
    },
    Push {
        epoch: u64,
        event: PushEvent,
    },
    Chunk(ChunkCompletion),
}
