//! chunkview - windowed access to large server-held tabular datasets
//!
//! A dataset lives on a server and may still be processing when a client opens
//! it. This crate pages through it one fixed-size chunk at a time:
//!
//! - chunk access is gated on server readiness ([`readiness`])
//! - recently seen chunks are served from a bounded LRU cache ([`cache`])
//! - neighbors of the visible chunk are fetched ahead of time ([`prefetch`])
//! - out-of-order responses never overwrite a newer view ([`sequencer`])
//!
//! The public entry point is [`NavigationController`], which runs the
//! navigation state machine on a Tokio task and publishes [`PreviewView`]
//! snapshots.
//!
//! ```ignore
//! use std::sync::Arc;
//! use chunkview::config::ConfigFile;
//! use chunkview::fetch::HttpPreviewClient;
//! use chunkview::navigation::{ControllerBackends, NavigationController};
//! use chunkview::status::WebSocketStatusChannel;
//!
//! let config = ConfigFile::load()?;
//! let client = Arc::new(HttpPreviewClient::new(&config.client_config())?);
//! let status = Arc::new(WebSocketStatusChannel::new(config.status_url()));
//! let controller = NavigationController::spawn(
//!     ControllerBackends::http(client, status),
//!     &config.preview_config(),
//! );
//! controller.open("valid-1")?;
//! ```

pub mod cache;
pub mod config;
pub mod dataset;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod navigation;
pub mod prefetch;
pub mod readiness;
pub mod sequencer;
pub mod status;

pub use dataset::{Chunk, DatasetHandle, FieldValue, Record};
pub use error::{PreviewError, PreviewResult};
pub use navigation::{NavigationController, NavigationState, PreviewView};
pub use readiness::{LoadPhase, ReadinessState};

/// Crate version, sent in the default `User-Agent`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
