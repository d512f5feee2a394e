//! Chunk navigation.
//!
//! - [`Navigator`] - synchronous core: readiness gating, cache, sequencing,
//!   prefetch and view derivation, expressed as [`Effect`]s
//! - [`NavigationController`] - public handle to the event loop that executes
//!   those effects
//! - [`PreviewView`] - the snapshot published to consumers
//! - [`ChunkExporter`] / [`JsonExporter`] - export of the visible chunk

mod controller;
mod effect;
mod export;
mod navigator;
mod state;

pub use controller::{ControllerBackends, NavigationController};
pub use effect::{ChunkCompletion, ChunkRequest, Completion, Effect, FetchKind};
pub use export::{ChunkExporter, ExportArtifact, JsonExporter};
pub use navigator::{Navigator, NavigatorStats};
pub use state::{NavigationState, PreviewView};
