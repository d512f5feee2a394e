//! Live subscription to a dataset's status channel.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::event::PushEvent;
use crate::dataset::DatasetHandle;

/// A subscription to push events for one dataset handle.
///
/// Events are delivered either by pulling with [`recv`](Self::recv) or by
/// registering a handler with [`on_event`](Self::on_event). Closing (or
/// dropping) the subscription stops delivery and tells the transport to hang
/// up; handlers never run after `close()` returns.
///
/// When the transport ends on its own, a final [`PushEvent::Closed`] is
/// delivered so the owner can tell a server hang-up from a local close.
#[derive(Debug)]
pub struct StatusSubscription {
    handle: DatasetHandle,
    events: Option<mpsc::Receiver<PushEvent>>,
    close: CancellationToken,
    forwarder: Option<JoinHandle<()>>,
}

impl StatusSubscription {
    /// Wrap an event receiver.
    ///
    /// `close` is cancelled when the subscription closes; transports watch it
    /// to stop reading.
    pub fn new(
        handle: DatasetHandle,
        events: mpsc::Receiver<PushEvent>,
        close: CancellationToken,
    ) -> Self {
        Self {
            handle,
            events: Some(events),
            close,
            forwarder: None,
        }
    }

    pub fn handle(&self) -> &DatasetHandle {
        &self.handle
    }

    /// Deliver every future event to `handler` from a background task.
    ///
    /// Must be called from within a Tokio runtime. Calling it a second time,
    /// or after `recv` consumed the end of the stream, has no effect.
    pub fn on_event<F>(&mut self, mut handler: F)
    where
        F: FnMut(PushEvent) + Send + 'static,
    {
        let Some(mut events) = self.events.take() else {
            return;
        };
        let close = self.close.clone();
        let handle = self.handle.clone();

        self.forwarder = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = close.cancelled() => break,
                    event = events.recv() => match event {
                        Some(event) => handler(event),
                        None => {
                            if !close.is_cancelled() {
                                handler(PushEvent::Closed);
                            }
                            break;
                        }
                    },
                }
            }
            debug!(handle = %handle, "Status subscription forwarder stopped");
        }));
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the subscription is closed or the handler-based
    /// delivery owns the stream.
    pub async fn recv(&mut self) -> Option<PushEvent> {
        if self.close.is_cancelled() {
            return None;
        }
        let events = self.events.as_mut()?;
        match events.recv().await {
            Some(event) => Some(event),
            None => {
                self.events = None;
                Some(PushEvent::Closed)
            }
        }
    }

    /// Stop delivery and release the transport.
    pub fn close(&mut self) {
        if !self.close.is_cancelled() {
            debug!(handle = %self.handle, "Closing status subscription");
        }
        self.close.cancel();
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        self.events = None;
    }

    pub fn is_closed(&self) -> bool {
        self.close.is_cancelled()
    }
}

impl Drop for StatusSubscription {
    fn drop(&mut self) {
        self.close();
    }
}
