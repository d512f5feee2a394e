//! Dataset readiness tracking.
//!
//! Chunk access is only allowed once the server has finished processing the
//! dataset. The tracker combines an initial metadata fetch with the server's
//! push channel to decide when that happens.
//!
//! # State Machine
//!
//! ```text
//! Idle --[valid handle]--> Loading(Metadata)
//! any  --[invalid handle]--> InvalidHandle                     (terminal)
//! Loading(Metadata) --[status=ready]--> Ready                   (warm start)
//! Loading(Metadata) --[status=pending|processing]--> Loading(Processing) + subscribe
//! Loading(*) --[status=error | not found | malformed]--> Error  (terminal)
//! Loading(Processing) --[push status_update{ready}]--> Ready    (warm start)
//! Loading(Processing) --[push error | parsing_error]--> Error   (terminal)
//! Loading(Processing) --[channel hung up]--> re-check metadata, resubscribe
//! ```
//!
//! The tracker is synchronous: it returns a [`ReadinessAction`] telling the
//! caller which I/O to start next, and it owns at most one live
//! [`StatusSubscription`], which it closes on `Ready`, on every terminal
//! transition and on disposal.

use std::fmt;

use tracing::{debug, info, warn};

use crate::dataset::DatasetHandle;
use crate::error::{PreviewError, PreviewResult};
use crate::fetch::{DatasetMetadata, ProcessingStatus};
use crate::status::{PushEvent, StatusSubscription};

/// Default number of unexpected channel closures tolerated before giving up.
pub const DEFAULT_MAX_RESUBSCRIBES: u32 = 3;

/// Sub-state of [`ReadinessState::Loading`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    /// Initial metadata fetch in flight.
    Metadata,
    /// Dataset is being processed; waiting on push events.
    Processing,
}

/// Whether chunk access is permitted for the current handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessState {
    Idle,
    InvalidHandle,
    Loading(LoadPhase),
    Ready,
    Error(String),
}

impl ReadinessState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Terminal states need a fresh handle to recover.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::InvalidHandle | Self::Error(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading(_))
    }
}

impl fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::InvalidHandle => write!(f, "invalid handle"),
            Self::Loading(LoadPhase::Metadata) => write!(f, "loading"),
            Self::Loading(LoadPhase::Processing) => write!(f, "processing"),
            Self::Ready => write!(f, "ready"),
            Self::Error(message) => write!(f, "error: {}", message),
        }
    }
}

/// I/O the caller should start after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessAction {
    None,
    FetchMetadata,
    Subscribe,
    /// A subscription was attached; start delivering its events.
    Listen,
    /// The dataset just became ready; load the first chunk.
    WarmStart,
}

/// Readiness state machine for one controller.
#[derive(Debug)]
pub struct ReadinessTracker {
    state: ReadinessState,
    handle: Option<DatasetHandle>,
    subscription: Option<StatusSubscription>,
    unexpected_closures: u32,
    max_resubscribes: u32,
}

impl Default for ReadinessTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RESUBSCRIBES)
    }
}

impl ReadinessTracker {
    pub fn new(max_resubscribes: u32) -> Self {
        Self {
            state: ReadinessState::Idle,
            handle: None,
            subscription: None,
            unexpected_closures: 0,
            max_resubscribes,
        }
    }

    pub fn state(&self) -> &ReadinessState {
        &self.state
    }

    pub fn handle(&self) -> Option<&DatasetHandle> {
        self.handle.as_ref()
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    pub fn has_subscription(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn subscription_mut(&mut self) -> Option<&mut StatusSubscription> {
        self.subscription.as_mut()
    }

    /// Start tracking `raw_handle`, discarding any previous session.
    pub fn activate(&mut self, raw_handle: &str) -> ReadinessAction {
        self.dispose();

        match DatasetHandle::parse(raw_handle) {
            Ok(handle) => {
                info!(handle = %handle, "Checking dataset readiness");
                self.handle = Some(handle);
                self.state = ReadinessState::Loading(LoadPhase::Metadata);
                ReadinessAction::FetchMetadata
            }
            Err(e) => {
                warn!(error = %e, "Rejected dataset handle");
                self.state = ReadinessState::InvalidHandle;
                ReadinessAction::None
            }
        }
    }

    /// Apply the result of a metadata fetch.
    pub fn on_metadata(&mut self, result: PreviewResult<DatasetMetadata>) -> ReadinessAction {
        if !self.state.is_loading() {
            debug!(state = %self.state, "Ignoring metadata outside loading state");
            return ReadinessAction::None;
        }

        let metadata = match result {
            Ok(metadata) => metadata,
            Err(e) => {
                self.fail(e);
                return ReadinessAction::None;
            }
        };

        match metadata.status {
            ProcessingStatus::Ready => self.become_ready(),
            ProcessingStatus::Error => {
                let message = metadata
                    .message
                    .unwrap_or_else(|| "dataset processing failed".to_string());
                self.fail(PreviewError::Readiness { message });
                ReadinessAction::None
            }
            ProcessingStatus::Pending | ProcessingStatus::Processing => {
                self.state = ReadinessState::Loading(LoadPhase::Processing);
                if self.subscription.is_some() {
                    ReadinessAction::None
                } else {
                    debug!(status = %metadata.status, "Dataset still processing, subscribing");
                    ReadinessAction::Subscribe
                }
            }
        }
    }

    /// Attach a newly opened subscription.
    ///
    /// Once attached, the metadata is checked again: the dataset may have
    /// finished between the first fetch and the subscription going live, in
    /// which case no push event would ever arrive.
    pub fn on_subscribed(&mut self, result: PreviewResult<StatusSubscription>) -> ReadinessAction {
        match result {
            Ok(mut subscription) => {
                if self.state != ReadinessState::Loading(LoadPhase::Processing)
                    || self.subscription.is_some()
                {
                    subscription.close();
                    return ReadinessAction::None;
                }
                self.subscription = Some(subscription);
                ReadinessAction::Listen
            }
            Err(e) => {
                if self.state.is_loading() {
                    self.fail(PreviewError::Readiness {
                        message: format!("status channel unavailable: {}", e),
                    });
                }
                ReadinessAction::None
            }
        }
    }

    /// Apply a push event.
    pub fn on_push(&mut self, event: PushEvent) -> ReadinessAction {
        if self.state != ReadinessState::Loading(LoadPhase::Processing) {
            debug!(state = %self.state, event = ?event, "Ignoring push event");
            return ReadinessAction::None;
        }

        match event {
            PushEvent::StatusUpdate(ProcessingStatus::Ready) => self.become_ready(),
            PushEvent::StatusUpdate(ProcessingStatus::Error) => {
                self.fail(PreviewError::Readiness {
                    message: "dataset processing failed".to_string(),
                });
                ReadinessAction::None
            }
            PushEvent::StatusUpdate(status) => {
                debug!(status = %status, "Dataset still processing");
                self.unexpected_closures = 0;
                ReadinessAction::None
            }
            PushEvent::ParsingError(message) | PushEvent::Error(message) => {
                self.fail(PreviewError::Readiness { message });
                ReadinessAction::None
            }
            PushEvent::Closed => {
                self.close_subscription();
                self.unexpected_closures += 1;
                if self.unexpected_closures > self.max_resubscribes {
                    self.fail(PreviewError::Readiness {
                        message: "status channel closed before the dataset was ready".to_string(),
                    });
                    ReadinessAction::None
                } else {
                    warn!(
                        attempt = self.unexpected_closures,
                        max = self.max_resubscribes,
                        "Status channel closed by server, re-checking metadata"
                    );
                    ReadinessAction::FetchMetadata
                }
            }
        }
    }

    /// Tear down the current session and return to `Idle`.
    pub fn dispose(&mut self) {
        self.close_subscription();
        self.handle = None;
        self.unexpected_closures = 0;
        self.state = ReadinessState::Idle;
    }

    fn become_ready(&mut self) -> ReadinessAction {
        self.close_subscription();
        self.state = ReadinessState::Ready;
        if let Some(handle) = &self.handle {
            info!(handle = %handle, "Dataset ready");
        }
        ReadinessAction::WarmStart
    }

    /// Enter `Error` after a terminal failure, from any state.
    pub fn fail(&mut self, error: PreviewError) {
        self.close_subscription();
        warn!(error = %error, "Dataset unavailable");
        self.state = ReadinessState::Error(error.to_string());
    }

    fn close_subscription(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.close();
        }
    }
}
