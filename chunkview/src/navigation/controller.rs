//! Navigation controller: the public handle and its event loop.
//!
//! # Architecture
//!
//! ```text
//! NavigationController ──Command──►┐
//!                                  │
//! spawned fetch tasks ──Completion─┤   ┌──────────────────────────┐
//! status forwarder ────Completion──┼──►│      ControllerLoop      │
//! metadata task ───────Completion──┘   │                          │
//!                                      │  Navigator (sync core)   │
//!                                      │        │ Effects          │
//!                                      │        ▼                  │
//!                                      │  spawn fetches, cancel,   │
//!                                      │  publish view             │
//!                                      └────────────┬─────────────┘
//!                                                   │ watch
//!                                                   ▼
//!                                             PreviewView
//! ```
//!
//! Every mutation happens inside the loop, one event at a time. Network work
//! runs in spawned tasks that report back through the same queue, so no lock
//! guards the navigation state.
//!
//! # Example
//!
//! ```ignore
//! use chunkview::navigation::{ControllerBackends, NavigationController};
//!
//! let controller = NavigationController::spawn(backends, &PreviewConfig::default());
//! controller.open("valid-1")?;
//! let view = controller.wait_for(|view| view.chunk.is_some()).await?;
//! controller.go_to_next()?;
//! let stats = controller.dispose().await?;
//! ```

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info};

use super::effect::{ChunkCompletion, ChunkRequest, Completion, Effect, FetchKind};
use super::export::{ChunkExporter, ExportArtifact};
use super::navigator::{Navigator, NavigatorStats};
use super::state::PreviewView;
use crate::config::PreviewConfig;
use crate::dataset::DatasetHandle;
use crate::error::{PreviewError, PreviewResult};
use crate::fetch::{ChunkFetcher, HttpPreviewClient, MetadataSource};
use crate::status::StatusChannel;

// =============================================================================
// Backends
// =============================================================================

/// The collaborators a controller talks to.
#[derive(Clone)]
pub struct ControllerBackends {
    pub chunks: Arc<dyn ChunkFetcher>,
    pub metadata: Arc<dyn MetadataSource>,
    pub status: Arc<dyn StatusChannel>,
    pub exporter: Option<Arc<dyn ChunkExporter>>,
}

impl ControllerBackends {
    pub fn new(
        chunks: Arc<dyn ChunkFetcher>,
        metadata: Arc<dyn MetadataSource>,
        status: Arc<dyn StatusChannel>,
    ) -> Self {
        Self {
            chunks,
            metadata,
            status,
            exporter: None,
        }
    }

    /// Use one HTTP client for both chunk and metadata requests.
    pub fn http(client: Arc<HttpPreviewClient>, status: Arc<dyn StatusChannel>) -> Self {
        Self::new(client.clone(), client, status)
    }

    pub fn with_exporter(mut self, exporter: Arc<dyn ChunkExporter>) -> Self {
        self.exporter = Some(exporter);
        self
    }
}

// =============================================================================
// Loop events
// =============================================================================

#[derive(Debug)]
enum Command {
    Open(String),
    LoadChunk(i64),
    Next,
    Previous,
    ChangeChunkSize(u32),
    Export {
        filename_hint: Option<String>,
        reply: oneshot::Sender<PreviewResult<ExportArtifact>>,
    },
    Dispose {
        reply: oneshot::Sender<NavigatorStats>,
    },
}

#[derive(Debug)]
enum LoopEvent {
    Command(Command),
    Completion(Completion),
}

// =============================================================================
// Controller handle
// =============================================================================

/// Handle to a running navigation controller.
///
/// All navigation methods are non-blocking: they queue a command and return.
/// Observe the outcome through [`subscribe`](Self::subscribe) or
/// [`view`](Self::view). Dropping the handle stops the loop.
pub struct NavigationController {
    events: mpsc::UnboundedSender<LoopEvent>,
    view: watch::Receiver<PreviewView>,
    _shutdown: DropGuard,
}

impl NavigationController {
    /// Start a controller loop on the current Tokio runtime.
    pub fn spawn(backends: ControllerBackends, config: &PreviewConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(PreviewView::default());
        let shutdown = CancellationToken::new();

        let controller_loop = ControllerLoop {
            navigator: Navigator::new(config),
            backends,
            events_tx: events_tx.clone(),
            events_rx,
            view_tx,
            session: CancellationToken::new(),
            primary: None,
        };
        tokio::spawn(controller_loop.run(shutdown.clone()));

        Self {
            events: events_tx,
            view: view_rx,
            _shutdown: shutdown.drop_guard(),
        }
    }

    /// Start previewing `handle`, discarding the current session.
    pub fn open(&self, handle: impl Into<String>) -> PreviewResult<()> {
        self.send(Command::Open(handle.into()))
    }

    pub fn load_chunk(&self, index: i64) -> PreviewResult<()> {
        self.send(Command::LoadChunk(index))
    }

    pub fn go_to_index(&self, index: i64) -> PreviewResult<()> {
        self.load_chunk(index)
    }

    pub fn go_to_next(&self) -> PreviewResult<()> {
        self.send(Command::Next)
    }

    pub fn go_to_previous(&self) -> PreviewResult<()> {
        self.send(Command::Previous)
    }

    pub fn change_chunk_size(&self, size: u32) -> PreviewResult<()> {
        self.send(Command::ChangeChunkSize(size))
    }

    /// Export the visible chunk.
    ///
    /// Without a hint the file is named after the handle and chunk index.
    pub async fn export_current(
        &self,
        filename_hint: Option<String>,
    ) -> PreviewResult<ExportArtifact> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Export {
            filename_hint,
            reply,
        })?;
        rx.await.map_err(|_| PreviewError::ChannelClosed)?
    }

    /// Receiver that observes every published view.
    pub fn subscribe(&self) -> watch::Receiver<PreviewView> {
        self.view.clone()
    }

    /// The most recently published view.
    pub fn view(&self) -> PreviewView {
        self.view.borrow().clone()
    }

    /// Wait until a published view satisfies `predicate`.
    pub async fn wait_for<F>(&self, mut predicate: F) -> PreviewResult<PreviewView>
    where
        F: FnMut(&PreviewView) -> bool,
    {
        let mut rx = self.view.clone();
        let view = rx
            .wait_for(|view| predicate(view))
            .await
            .map_err(|_| PreviewError::ChannelClosed)?;
        Ok(view.clone())
    }

    /// Tear down the session, stop the loop and return its statistics.
    pub async fn dispose(self) -> PreviewResult<NavigatorStats> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Dispose { reply })?;
        rx.await.map_err(|_| PreviewError::ChannelClosed)
    }

    fn send(&self, command: Command) -> PreviewResult<()> {
        self.events
            .send(LoopEvent::Command(command))
            .map_err(|_| PreviewError::ChannelClosed)
    }
}

// =============================================================================
// Controller loop
// =============================================================================

/// Owns the navigator and executes its effects.
struct ControllerLoop {
    navigator: Navigator,
    backends: ControllerBackends,
    events_tx: mpsc::UnboundedSender<LoopEvent>,
    events_rx: mpsc::UnboundedReceiver<LoopEvent>,
    view_tx: watch::Sender<PreviewView>,
    /// Parent of every fetch in the current session.
    session: CancellationToken,
    /// Token of the in-flight primary fetch.
    primary: Option<CancellationToken>,
}

impl ControllerLoop {
    async fn run(mut self, shutdown: CancellationToken) {
        info!("Navigation controller starting");

        loop {
            let event = tokio::select! {
                biased;

                _ = shutdown.cancelled() => None,
                event = self.events_rx.recv() => event,
            };

            let Some(event) = event else {
                break;
            };

            let keep_running = match event {
                LoopEvent::Command(command) => self.handle_command(command),
                LoopEvent::Completion(completion) => {
                    self.navigator.handle_completion(completion);
                    true
                }
            };
            self.execute_effects();

            if !keep_running {
                info!("Navigation controller disposed");
                return;
            }
        }

        self.navigator.dispose();
        self.execute_effects();
        info!("Navigation controller stopped");
    }

    /// Apply a command. Returns `false` once the loop should stop.
    fn handle_command(&mut self, command: Command) -> bool {
        debug!(command = ?command, "Controller command");
        match command {
            Command::Open(handle) => self.navigator.open(&handle),
            Command::LoadChunk(index) => self.navigator.load_chunk(index),
            Command::Next => self.navigator.go_to_next(),
            Command::Previous => self.navigator.go_to_previous(),
            Command::ChangeChunkSize(size) => self.navigator.change_chunk_size(size),
            Command::Export {
                filename_hint,
                reply,
            } => self.export(filename_hint, reply),
            Command::Dispose { reply } => {
                self.navigator.dispose();
                self.execute_effects();
                let _ = reply.send(self.navigator.stats());
                return false;
            }
        }
        true
    }

    fn export(
        &self,
        filename_hint: Option<String>,
        reply: oneshot::Sender<PreviewResult<ExportArtifact>>,
    ) {
        let Some(chunk) = self.navigator.current_chunk() else {
            let _ = reply.send(Err(PreviewError::Export("no chunk is visible".to_string())));
            return;
        };
        let Some(exporter) = self.backends.exporter.clone() else {
            let _ = reply.send(Err(PreviewError::Export(
                "no exporter configured".to_string(),
            )));
            return;
        };

        let hint = filename_hint.unwrap_or_else(|| {
            let handle = self
                .navigator
                .handle()
                .map(DatasetHandle::as_str)
                .unwrap_or("chunk");
            format!("{}-{}", handle, chunk.index())
        });

        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || exporter.export(chunk.rows(), &hint))
                .await
                .unwrap_or_else(|e| Err(PreviewError::Export(e.to_string())));
            let _ = reply.send(result);
        });
    }

    fn execute_effects(&mut self) {
        for effect in self.navigator.take_effects() {
            self.execute(effect);
        }
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::FetchMetadata { epoch, handle } => {
                let source = Arc::clone(&self.backends.metadata);
                let events = self.events_tx.clone();
                let cancel = self.session.child_token();
                tokio::spawn(async move {
                    let result = source.metadata(handle, cancel).await;
                    let _ = events.send(LoopEvent::Completion(Completion::Metadata {
                        epoch,
                        result,
                    }));
                });
            }
            Effect::Subscribe { epoch, handle } => {
                let channel = Arc::clone(&self.backends.status);
                let events = self.events_tx.clone();
                let cancel = self.session.child_token();
                tokio::spawn(async move {
                    let result = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return,
                        result = channel.subscribe(handle) => result,
                    };
                    let _ = events.send(LoopEvent::Completion(Completion::Subscribed {
                        epoch,
                        result,
                    }));
                });
            }
            Effect::ListenStatus { epoch } => {
                let events = self.events_tx.clone();
                if let Some(subscription) = self.navigator.subscription_mut() {
                    subscription.on_event(move |event| {
                        let _ = events.send(LoopEvent::Completion(Completion::Push { epoch, event }));
                    });
                }
            }
            Effect::FetchChunk(request) => self.spawn_fetch(request),
            Effect::CancelPrimary => {
                if let Some(token) = self.primary.take() {
                    token.cancel();
                }
            }
            Effect::CancelSession => {
                self.session.cancel();
                self.session = CancellationToken::new();
                self.primary = None;
            }
            Effect::Publish(view) => {
                self.view_tx.send_replace(view);
            }
        }
    }

    fn spawn_fetch(&mut self, request: ChunkRequest) {
        let cancel = self.session.child_token();
        if let FetchKind::Primary(_) = request.kind {
            self.primary = Some(cancel.clone());
        }

        let fetcher = Arc::clone(&self.backends.chunks);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = fetcher
                .fetch(request.handle.clone(), request.index, request.size, cancel)
                .await;
            let _ = events.send(LoopEvent::Completion(Completion::Chunk(ChunkCompletion {
                request,
                result,
            })));
        });
    }
}
