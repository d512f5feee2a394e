//! End-to-end navigation tests.
//!
//! These drive a real `NavigationController` event loop against scripted
//! in-memory backends, exercising readiness, caching, prefetch and ordering
//! through the public API only.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chunkview::config::PreviewConfig;
use chunkview::dataset::{Chunk, DatasetHandle, FieldValue, Record};
use chunkview::fetch::{BoxFuture, ChunkFetcher, DatasetMetadata, MetadataSource, ProcessingStatus};
use chunkview::navigation::{ControllerBackends, JsonExporter, NavigationController, PreviewView};
use chunkview::status::{PushEvent, StatusChannel, StatusSubscription};
use chunkview::{LoadPhase, PreviewError, PreviewResult, ReadinessState};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

// =============================================================================
// Scripted backends
// =============================================================================

/// Serves synthetic rows for a dataset of `total_rows` rows.
struct ScriptedFetcher {
    total_rows: u64,
    honor_cancel: bool,
    delays: Mutex<HashMap<u64, Duration>>,
    failing: Mutex<HashSet<u64>>,
    calls: Mutex<Vec<(u64, u32)>>,
    finished: Mutex<Vec<(u64, u32)>>,
}

impl ScriptedFetcher {
    fn new(total_rows: u64) -> Self {
        Self {
            total_rows,
            honor_cancel: true,
            delays: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            finished: Mutex::new(Vec::new()),
        }
    }

    fn ignoring_cancel(mut self) -> Self {
        self.honor_cancel = false;
        self
    }

    fn delay(&self, index: u64, delay: Duration) {
        self.delays.lock().unwrap().insert(index, delay);
    }

    fn fail(&self, index: u64) {
        self.failing.lock().unwrap().insert(index);
    }

    fn recover(&self, index: u64) {
        self.failing.lock().unwrap().remove(&index);
    }

    fn calls(&self) -> Vec<(u64, u32)> {
        self.calls.lock().unwrap().clone()
    }

    fn call_count(&self, index: u64, size: u32) -> usize {
        self.calls()
            .into_iter()
            .filter(|call| *call == (index, size))
            .count()
    }

    fn has_finished(&self, index: u64, size: u32) -> bool {
        self.finished.lock().unwrap().contains(&(index, size))
    }

    fn build(&self, index: u64, size: u32) -> Chunk {
        let first = index * u64::from(size);
        let last = (first + u64::from(size)).min(self.total_rows);
        let rows = (first..last)
            .map(|n| {
                let mut record = Record::new();
                record.insert("row".to_string(), FieldValue::Integer(n as i64));
                record
            })
            .collect();
        let has_more = last < self.total_rows;
        Chunk::new(index, size, self.total_rows, rows, has_more).unwrap()
    }
}

impl ChunkFetcher for ScriptedFetcher {
    fn fetch(
        &self,
        _handle: DatasetHandle,
        index: u64,
        size: u32,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, PreviewResult<Chunk>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push((index, size));
            let delay = self
                .delays
                .lock()
                .unwrap()
                .get(&index)
                .copied()
                .unwrap_or_default();

            if self.honor_cancel {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(PreviewError::Cancelled),
                    _ = sleep(delay) => {}
                }
            } else {
                sleep(delay).await;
            }

            let result = if self.failing.lock().unwrap().contains(&index) {
                Err(PreviewError::Network {
                    url: format!("http://test/preview?index={}", index),
                    reason: "connection reset".to_string(),
                })
            } else {
                Ok(self.build(index, size))
            };
            self.finished.lock().unwrap().push((index, size));
            result
        })
    }
}

/// Returns scripted statuses in order, then `last` forever.
struct ScriptedMetadata {
    script: Mutex<VecDeque<DatasetMetadata>>,
    last: DatasetMetadata,
    calls: AtomicUsize,
}

impl ScriptedMetadata {
    fn new(script: &[ProcessingStatus], last: ProcessingStatus) -> Self {
        Self {
            script: Mutex::new(script.iter().copied().map(DatasetMetadata::new).collect()),
            last: DatasetMetadata::new(last),
            calls: AtomicUsize::new(0),
        }
    }

    fn ready() -> Self {
        Self::new(&[], ProcessingStatus::Ready)
    }

    fn failing(message: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            last: DatasetMetadata::new(ProcessingStatus::Error).with_message(message),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MetadataSource for ScriptedMetadata {
    fn metadata(
        &self,
        _handle: DatasetHandle,
        _cancel: CancellationToken,
    ) -> BoxFuture<'_, PreviewResult<DatasetMetadata>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            Ok(next.unwrap_or_else(|| self.last.clone()))
        })
    }
}

/// Hands out in-memory subscriptions the test can push into.
#[derive(Default)]
struct ScriptedStatus {
    senders: Mutex<Vec<mpsc::Sender<PushEvent>>>,
    subscribes: AtomicUsize,
}

impl ScriptedStatus {
    fn subscribes(&self) -> usize {
        self.subscribes.load(Ordering::SeqCst)
    }

    async fn wait_subscribed(&self) {
        timeout(Duration::from_secs(5), async {
            while self.subscribes() == 0 {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("no subscription was opened");
    }

    async fn push(&self, event: PushEvent) {
        let sender = self.senders.lock().unwrap().last().cloned();
        if let Some(sender) = sender {
            let _ = sender.send(event).await;
        }
    }

    fn hang_up(&self) {
        self.senders.lock().unwrap().clear();
    }
}

impl StatusChannel for ScriptedStatus {
    fn subscribe(&self, handle: DatasetHandle) -> BoxFuture<'_, PreviewResult<StatusSubscription>> {
        Box::pin(async move {
            let (tx, rx) = mpsc::channel(8);
            self.senders.lock().unwrap().push(tx);
            self.subscribes.fetch_add(1, Ordering::SeqCst);
            Ok(StatusSubscription::new(handle, rx, CancellationToken::new()))
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn spawn(
    fetcher: &Arc<ScriptedFetcher>,
    metadata: &Arc<ScriptedMetadata>,
    status: &Arc<ScriptedStatus>,
    config: PreviewConfig,
) -> NavigationController {
    let backends = ControllerBackends::new(fetcher.clone(), metadata.clone(), status.clone());
    NavigationController::spawn(backends, &config)
}

async fn wait_until<F>(controller: &NavigationController, predicate: F) -> PreviewView
where
    F: FnMut(&PreviewView) -> bool,
{
    timeout(Duration::from_secs(5), controller.wait_for(predicate))
        .await
        .expect("timed out waiting for view")
        .expect("controller stopped")
}

async fn wait_for_index(controller: &NavigationController, index: u64) -> PreviewView {
    wait_until(controller, |view| {
        view.current_index() == Some(index) && !view.loading
    })
    .await
}

async fn wait_finished(fetcher: &ScriptedFetcher, index: u64, size: u32) {
    timeout(Duration::from_secs(5), async {
        while !fetcher.has_finished(index, size) {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("fetch never finished");
    // let the completion reach the controller queue
    sleep(Duration::from_millis(50)).await;
}

// =============================================================================
// Readiness
// =============================================================================

#[tokio::test]
async fn test_processing_dataset_becomes_ready_and_warms_second_chunk() {
    let fetcher = Arc::new(ScriptedFetcher::new(250));
    let metadata = Arc::new(ScriptedMetadata::new(
        &[ProcessingStatus::Processing],
        ProcessingStatus::Processing,
    ));
    let status = Arc::new(ScriptedStatus::default());
    let controller = spawn(&fetcher, &metadata, &status, PreviewConfig::default());

    controller.open("valid-1").unwrap();
    wait_until(&controller, |view| {
        view.readiness == ReadinessState::Loading(LoadPhase::Processing)
    })
    .await;
    status.wait_subscribed().await;
    assert!(fetcher.calls().is_empty());

    status
        .push(PushEvent::StatusUpdate(ProcessingStatus::Processing))
        .await;
    status
        .push(PushEvent::StatusUpdate(ProcessingStatus::Ready))
        .await;

    let view = wait_for_index(&controller, 0).await;
    assert!(view.is_ready());
    assert_eq!(view.chunk.as_ref().unwrap().rows().len(), 100);

    wait_finished(&fetcher, 1, 100).await;
    controller.go_to_next().unwrap();
    wait_for_index(&controller, 1).await;

    assert_eq!(fetcher.call_count(1, 100), 1);
    let stats = controller.dispose().await.unwrap();
    assert_eq!(stats.primary_requests, 1);
    assert_eq!(stats.cache_hits, 1);
}

#[tokio::test]
async fn test_invalid_handle_never_reaches_backends() {
    let fetcher = Arc::new(ScriptedFetcher::new(250));
    let metadata = Arc::new(ScriptedMetadata::ready());
    let status = Arc::new(ScriptedStatus::default());
    let controller = spawn(&fetcher, &metadata, &status, PreviewConfig::default());

    controller.open("bad id").unwrap();
    let view = wait_until(&controller, |view| {
        view.readiness == ReadinessState::InvalidHandle
    })
    .await;
    assert!(view.handle.is_none());

    controller.load_chunk(0).unwrap();
    controller.go_to_next().unwrap();
    sleep(Duration::from_millis(50)).await;

    assert_eq!(metadata.calls(), 0);
    assert_eq!(status.subscribes(), 0);
    assert!(fetcher.calls().is_empty());
}

#[tokio::test]
async fn test_metadata_error_is_terminal() {
    let fetcher = Arc::new(ScriptedFetcher::new(250));
    let metadata = Arc::new(ScriptedMetadata::failing("header row missing"));
    let status = Arc::new(ScriptedStatus::default());
    let controller = spawn(&fetcher, &metadata, &status, PreviewConfig::default());

    controller.open("valid-1").unwrap();
    let view = wait_until(&controller, |view| view.readiness.is_terminal()).await;
    assert_eq!(
        view.readiness,
        ReadinessState::Error("header row missing".to_string())
    );

    controller.load_chunk(0).unwrap();
    sleep(Duration::from_millis(50)).await;
    assert!(fetcher.calls().is_empty());
}

#[tokio::test]
async fn test_server_hang_up_rechecks_metadata() {
    let fetcher = Arc::new(ScriptedFetcher::new(250));
    let metadata = Arc::new(ScriptedMetadata::new(
        &[ProcessingStatus::Processing, ProcessingStatus::Processing],
        ProcessingStatus::Ready,
    ));
    let status = Arc::new(ScriptedStatus::default());
    let controller = spawn(&fetcher, &metadata, &status, PreviewConfig::default());

    controller.open("valid-1").unwrap();
    status.wait_subscribed().await;
    status.hang_up();

    let view = wait_for_index(&controller, 0).await;
    assert!(view.is_ready());
    assert!(metadata.calls() >= 3);
}

#[tokio::test]
async fn test_push_parsing_error_is_terminal() {
    let fetcher = Arc::new(ScriptedFetcher::new(250));
    let metadata = Arc::new(ScriptedMetadata::new(&[], ProcessingStatus::Pending));
    let status = Arc::new(ScriptedStatus::default());
    let controller = spawn(&fetcher, &metadata, &status, PreviewConfig::default());

    controller.open("valid-1").unwrap();
    status.wait_subscribed().await;
    status
        .push(PushEvent::ParsingError("unterminated quote on line 7".into()))
        .await;

    let view = wait_until(&controller, |view| view.readiness.is_terminal()).await;
    assert!(matches!(view.readiness, ReadinessState::Error(ref m) if m.contains("line 7")));
    assert!(fetcher.calls().is_empty());
}

// =============================================================================
// Navigation
// =============================================================================

#[tokio::test]
async fn test_has_more_tracks_last_page() {
    let fetcher = Arc::new(ScriptedFetcher::new(250));
    let metadata = Arc::new(ScriptedMetadata::ready());
    let status = Arc::new(ScriptedStatus::default());
    let config = PreviewConfig::default().with_prefetch(false);
    let controller = spawn(&fetcher, &metadata, &status, config);

    controller.open("valid-1").unwrap();
    let view = wait_for_index(&controller, 0).await;
    assert!(view.navigation.unwrap().has_more);

    controller.go_to_next().unwrap();
    let view = wait_for_index(&controller, 1).await;
    assert!(view.navigation.unwrap().has_more);

    controller.go_to_next().unwrap();
    let view = wait_for_index(&controller, 2).await;
    let nav = view.navigation.unwrap();
    assert!(!nav.has_more);
    assert_eq!(view.chunk.unwrap().rows().len(), 50);

    controller.go_to_next().unwrap();
    sleep(Duration::from_millis(50)).await;
    assert_eq!(controller.view().current_index(), Some(2));
    assert_eq!(fetcher.calls().len(), 3);
}

#[tokio::test]
async fn test_late_response_does_not_replace_newer_view() {
    let fetcher = Arc::new(ScriptedFetcher::new(1000).ignoring_cancel());
    fetcher.delay(2, Duration::from_millis(150));
    let metadata = Arc::new(ScriptedMetadata::ready());
    let status = Arc::new(ScriptedStatus::default());
    let config = PreviewConfig::default().with_prefetch(false);
    let controller = spawn(&fetcher, &metadata, &status, config);

    controller.open("valid-1").unwrap();
    wait_for_index(&controller, 0).await;

    controller.load_chunk(2).unwrap();
    controller.load_chunk(5).unwrap();
    wait_for_index(&controller, 5).await;

    wait_finished(&fetcher, 2, 100).await;
    assert_eq!(controller.view().current_index(), Some(5));

    // the late chunk was still cached
    controller.load_chunk(2).unwrap();
    wait_for_index(&controller, 2).await;
    assert_eq!(fetcher.call_count(2, 100), 1);

    let stats = controller.dispose().await.unwrap();
    assert_eq!(stats.stale_responses, 1);
}

#[tokio::test]
async fn test_failed_load_shows_advisory_until_recovery() {
    let fetcher = Arc::new(ScriptedFetcher::new(250));
    fetcher.fail(1);
    let metadata = Arc::new(ScriptedMetadata::ready());
    let status = Arc::new(ScriptedStatus::default());
    let config = PreviewConfig::default().with_prefetch(false);
    let controller = spawn(&fetcher, &metadata, &status, config);

    controller.open("valid-1").unwrap();
    wait_for_index(&controller, 0).await;

    controller.go_to_next().unwrap();
    let view = wait_until(&controller, |view| view.advisory.is_some()).await;
    assert!(view.advisory.as_ref().unwrap().contains("connection reset"));
    assert_eq!(view.current_index(), Some(0));
    assert!(view.is_ready());

    fetcher.recover(1);
    controller.go_to_next().unwrap();
    let view = wait_for_index(&controller, 1).await;
    assert_eq!(view.advisory, None);
}

#[tokio::test]
async fn test_warm_cache_reloads_issue_no_fetches() {
    let fetcher = Arc::new(ScriptedFetcher::new(250));
    let metadata = Arc::new(ScriptedMetadata::ready());
    let status = Arc::new(ScriptedStatus::default());
    let controller = spawn(&fetcher, &metadata, &status, PreviewConfig::default());

    controller.open("valid-1").unwrap();
    let first = wait_for_index(&controller, 0).await;
    wait_finished(&fetcher, 1, 100).await;
    let calls_before = fetcher.calls().len();

    controller.load_chunk(0).unwrap();
    controller.load_chunk(0).unwrap();
    sleep(Duration::from_millis(50)).await;

    assert_eq!(fetcher.calls().len(), calls_before);
    let view = controller.view();
    assert_eq!(view.current_index(), Some(0));
    assert_eq!(view.chunk, first.chunk);

    let stats = controller.dispose().await.unwrap();
    assert_eq!(stats.cache_hits, 2);
    assert_eq!(stats.primary_requests, 1);
}

#[tokio::test]
async fn test_failed_prefetch_is_invisible() {
    let fetcher = Arc::new(ScriptedFetcher::new(250));
    fetcher.fail(1);
    // chunk 0 lands first, so the warm for 1 is still in flight when it does
    fetcher.delay(1, Duration::from_millis(100));
    let metadata = Arc::new(ScriptedMetadata::ready());
    let status = Arc::new(ScriptedStatus::default());
    let controller = spawn(&fetcher, &metadata, &status, PreviewConfig::default());

    controller.open("valid-1").unwrap();
    wait_for_index(&controller, 0).await;
    wait_finished(&fetcher, 1, 100).await;

    let view = controller.view();
    assert_eq!(view.readiness, ReadinessState::Ready);
    assert_eq!(view.advisory, None);
    assert_eq!(view.current_index(), Some(0));
    assert_eq!(fetcher.call_count(1, 100), 1);

    // nothing was cached, so moving on fetches chunk 1 again
    controller.go_to_next().unwrap();
    let view = wait_until(&controller, |view| view.advisory.is_some()).await;
    assert!(view.is_ready());
    assert_eq!(fetcher.call_count(1, 100), 2);
}

#[tokio::test]
async fn test_resize_reloads_first_chunk_once() {
    let fetcher = Arc::new(ScriptedFetcher::new(250));
    let metadata = Arc::new(ScriptedMetadata::ready());
    let status = Arc::new(ScriptedStatus::default());
    let controller = spawn(&fetcher, &metadata, &status, PreviewConfig::default());

    controller.open("valid-1").unwrap();
    wait_for_index(&controller, 0).await;

    controller.change_chunk_size(0).unwrap();
    controller.change_chunk_size(50).unwrap();
    let view = wait_until(&controller, |view| {
        view.navigation.map(|nav| nav.chunk_size) == Some(50) && !view.loading
    })
    .await;

    assert_eq!(view.current_index(), Some(0));
    assert_eq!(view.chunk.unwrap().rows().len(), 50);
    assert_eq!(fetcher.call_count(0, 50), 1);
}

// =============================================================================
// Export and disposal
// =============================================================================

#[tokio::test]
async fn test_export_current_chunk() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(ScriptedFetcher::new(30));
    let metadata = Arc::new(ScriptedMetadata::ready());
    let status = Arc::new(ScriptedStatus::default());
    let backends = ControllerBackends::new(fetcher.clone(), metadata.clone(), status.clone())
        .with_exporter(Arc::new(JsonExporter::new(dir.path())));
    let controller = NavigationController::spawn(backends, &PreviewConfig::default());

    let err = controller.export_current(None).await.unwrap_err();
    assert!(matches!(err, PreviewError::Export(_)));

    controller.open("valid-1").unwrap();
    wait_for_index(&controller, 0).await;

    let artifact = controller.export_current(None).await.unwrap();
    assert_eq!(artifact.rows, 30);
    assert_eq!(artifact.path, dir.path().join("valid-1-0.json"));

    let named = controller
        .export_current(Some("first page".to_string()))
        .await
        .unwrap();
    assert!(named.path.ends_with("first_page.json"));
}

#[tokio::test]
async fn test_dispose_returns_to_idle() {
    let fetcher = Arc::new(ScriptedFetcher::new(250));
    let metadata = Arc::new(ScriptedMetadata::ready());
    let status = Arc::new(ScriptedStatus::default());
    let controller = spawn(&fetcher, &metadata, &status, PreviewConfig::default());
    let mut views = controller.subscribe();

    controller.open("valid-1").unwrap();
    wait_for_index(&controller, 0).await;

    let stats = controller.dispose().await.unwrap();
    assert_eq!(stats.primary_requests, 1);

    let last = views.borrow_and_update().clone();
    assert_eq!(last.readiness, ReadinessState::Idle);
    assert!(last.chunk.is_none());
}
