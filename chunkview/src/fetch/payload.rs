//! Wire payloads for the metadata and preview endpoints.
//!
//! Payloads are decoded into permissive structs first (every field optional)
//! and then validated, so a missing field produces a precise
//! `MalformedResponse` instead of a generic serde message.

use std::fmt;

use serde::Deserialize;

use crate::dataset::{Chunk, Record};
use crate::error::{PreviewError, PreviewResult};

/// Server-side processing status of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Ready,
    Error,
}

impl ProcessingStatus {
    /// Parse a status string as sent by the server.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "ready" => Some(Self::Ready),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }

    /// Whether the dataset is still being processed.
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded metadata for a dataset handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetMetadata {
    pub status: ProcessingStatus,
    /// Failure description when `status` is `error`.
    pub message: Option<String>,
    /// Row count, when the server already knows it.
    pub total_rows: Option<u64>,
}

impl DatasetMetadata {
    pub fn new(status: ProcessingStatus) -> Self {
        Self {
            status,
            message: None,
            total_rows: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_total_rows(mut self, total_rows: u64) -> Self {
        self.total_rows = Some(total_rows);
        self
    }
}

#[derive(Debug, Deserialize)]
struct MetadataPayload {
    status: Option<String>,
    error: Option<String>,
    message: Option<String>,
    #[serde(alias = "totalRows")]
    total_rows: Option<u64>,
}

/// Decode a metadata response body.
pub fn parse_metadata(url: &str, body: &[u8]) -> PreviewResult<DatasetMetadata> {
    let payload: MetadataPayload = serde_json::from_slice(body)
        .map_err(|e| PreviewError::malformed(url, format!("invalid metadata JSON: {}", e)))?;

    let raw_status = payload
        .status
        .ok_or_else(|| PreviewError::malformed(url, "metadata has no 'status' field"))?;
    let status = ProcessingStatus::parse(&raw_status).ok_or_else(|| {
        PreviewError::malformed(url, format!("unknown dataset status '{}'", raw_status))
    })?;

    Ok(DatasetMetadata {
        status,
        message: payload.error.or(payload.message),
        total_rows: payload.total_rows,
    })
}

#[derive(Debug, Deserialize)]
struct ChunkPayload {
    index: Option<u64>,
    size: Option<u32>,
    #[serde(rename = "totalRows", alias = "total_rows")]
    total_rows: Option<u64>,
    rows: Option<Vec<Record>>,
    #[serde(rename = "hasMore", alias = "has_more")]
    has_more: Option<bool>,
}

/// Decode and validate a preview response body for the requested chunk.
///
/// `totalRows`, `rows` and `hasMore` are required. `index` and `size` may be
/// omitted, but when present they must match the request.
pub fn parse_chunk(url: &str, body: &[u8], index: u64, size: u32) -> PreviewResult<Chunk> {
    let payload: ChunkPayload = serde_json::from_slice(body)
        .map_err(|e| PreviewError::malformed(url, format!("invalid chunk JSON: {}", e)))?;

    if let Some(got) = payload.index.filter(|got| *got != index) {
        return Err(PreviewError::malformed(
            url,
            format!("requested chunk {} but received chunk {}", index, got),
        ));
    }
    if let Some(got) = payload.size.filter(|got| *got != size) {
        return Err(PreviewError::malformed(
            url,
            format!("requested size {} but received size {}", size, got),
        ));
    }

    let total_rows = payload
        .total_rows
        .ok_or_else(|| PreviewError::malformed(url, "chunk has no 'totalRows' field"))?;
    let rows = payload
        .rows
        .ok_or_else(|| PreviewError::malformed(url, "chunk has no 'rows' field"))?;
    let has_more = payload
        .has_more
        .ok_or_else(|| PreviewError::malformed(url, "chunk has no 'hasMore' field"))?;

    Chunk::new(index, size, total_rows, rows, has_more)
        .map_err(|e| PreviewError::malformed(url, e.to_string()))
}
