//! Error types for dataset preview operations.
//!
//! Errors fall into two classes:
//!
//! - **Terminal** errors end the session for a handle: an invalid handle, a
//!   dataset the server does not know, or a dataset that failed processing.
//!   They replace the readiness state and block all chunk access.
//! - **Transient** errors belong to one request: network failures, timeouts
//!   and malformed chunk payloads. They are shown as an advisory next to the
//!   last good chunk and clear on the next successful load.

use thiserror::Error;

/// Result type for preview operations.
pub type PreviewResult<T> = Result<T, PreviewError>;

/// Errors that can occur while previewing a dataset.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PreviewError {
    /// The dataset handle does not have a valid identifier format.
    #[error("invalid dataset handle '{handle}'")]
    InvalidHandle { handle: String },

    /// The server does not know the dataset handle.
    #[error("dataset '{handle}' not found")]
    DatasetNotFound { handle: String },

    /// The dataset cannot become ready: processing failed or the status
    /// channel gave up.
    #[error("{message}")]
    Readiness { message: String },

    /// The request could not be completed.
    #[error("request to {url} failed: {reason}")]
    Network { url: String, reason: String },

    /// The request did not complete in time.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    /// The response did not have the expected shape.
    #[error("malformed response from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },

    /// The request was cancelled before it completed.
    #[error("request cancelled")]
    Cancelled,

    /// The controller has been disposed.
    #[error("preview controller is no longer running")]
    ChannelClosed,

    /// The export collaborator failed.
    #[error("export failed: {0}")]
    Export(String),
}

impl PreviewError {
    /// Whether a later retry of the same request might succeed.
    ///
    /// Malformed chunk payloads count as transient: the server may still be
    /// settling, and the next navigation retries naturally.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Timeout { .. } | Self::MalformedResponse { .. }
        )
    }

    /// Whether the error ends the session for the dataset handle.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::InvalidHandle { .. } | Self::DatasetNotFound { .. } | Self::Readiness { .. }
        )
    }

    pub(crate) fn malformed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            url: url.into(),
            reason: reason.into(),
        }
    }
}
