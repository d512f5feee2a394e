//! WebSocket transport for the status channel.
//!
//! Connects to `{base}/handle/{id}/events` and decodes each text frame as a
//! [`PushEvent`]. A reader task pumps frames into the subscription until the
//! server hangs up or the subscription is closed. `wss://` URLs use rustls
//! with the webpki root store.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::event::PushEvent;
use super::subscription::StatusSubscription;
use super::StatusChannel;
use crate::dataset::DatasetHandle;
use crate::error::{PreviewError, PreviewResult};
use crate::fetch::BoxFuture;

/// Events buffered between the socket reader and the subscriber.
const EVENT_BUFFER: usize = 32;

/// Status channel backed by a WebSocket per subscription.
#[derive(Debug, Clone)]
pub struct WebSocketStatusChannel {
    base_url: String,
}

impl WebSocketStatusChannel {
    /// Create a channel for a `ws://` or `wss://` base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Derive the channel from the HTTP base URL of the preview API.
    pub fn from_http_base(http_base: &str) -> Self {
        Self::new(ws_url_for(http_base))
    }

    pub fn events_url(&self, handle: &DatasetHandle) -> String {
        format!("{}/handle/{}/events", self.base_url, handle)
    }

    async fn connect(&self, handle: DatasetHandle) -> PreviewResult<StatusSubscription> {
        let url = self.events_url(&handle);
        let (stream, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| PreviewError::Network {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        info!(handle = %handle, url = %url, "Status channel connected");

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let close = CancellationToken::new();
        tokio::spawn(pump_frames(stream, tx, close.clone(), handle.clone()));

        Ok(StatusSubscription::new(handle, rx, close))
    }
}

impl StatusChannel for WebSocketStatusChannel {
    fn subscribe(&self, handle: DatasetHandle) -> BoxFuture<'_, PreviewResult<StatusSubscription>> {
        Box::pin(self.connect(handle))
    }
}

/// Map `http(s)://` to `ws(s)://`; other schemes pass through unchanged.
pub fn ws_url_for(http_base: &str) -> String {
    if let Some(rest) = http_base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = http_base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        http_base.to_string()
    }
}

async fn pump_frames(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    events: mpsc::Sender<PushEvent>,
    close: CancellationToken,
    handle: DatasetHandle,
) {
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            biased;

            _ = close.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                break;
            }

            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => match PushEvent::decode(&text) {
                    Ok(Some(event)) => {
                        debug!(handle = %handle, event = ?event, "Status event");
                        if events.send(event).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => debug!(handle = %handle, "Ignoring unknown status event"),
                    Err(e) => warn!(handle = %handle, error = %e, "Undecodable status frame"),
                },
                Some(Ok(Message::Close(_))) | None => {
                    info!(handle = %handle, "Status channel closed by server");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(handle = %handle, error = %e, "Status channel error");
                    break;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_url_for() {
        assert_eq!(ws_url_for("http://localhost:8080"), "ws://localhost:8080");
        assert_eq!(ws_url_for("https://data.example.com/api"), "wss://data.example.com/api");
        assert_eq!(ws_url_for("ws://already"), "ws://already");
    }

    #[test]
    fn test_events_url() {
        let channel = WebSocketStatusChannel::from_http_base("http://localhost:8080/api/");
        let handle = DatasetHandle::parse("valid-1").unwrap();
        assert_eq!(
            channel.events_url(&handle),
            "ws://localhost:8080/api/handle/valid-1/events"
        );
    }

    #[tokio::test]
    async fn test_connect_failure_is_network_error() {
        let channel = WebSocketStatusChannel::new("ws://127.0.0.1:1");
        let handle = DatasetHandle::parse("valid-1").unwrap();
        let err = channel.subscribe(handle).await.unwrap_err();
        assert!(matches!(err, PreviewError::Network { .. }));
    }

    #[tokio::test]
    async fn test_https_base_attempts_tls_handshake() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            // accept and hang up without speaking TLS
            while let Ok((socket, _)) = listener.accept().await {
                drop(socket);
            }
        });

        let channel = WebSocketStatusChannel::from_http_base(&format!("https://127.0.0.1:{}", port));
        let handle = DatasetHandle::parse("valid-1").unwrap();
        match channel.subscribe(handle).await {
            Err(PreviewError::Network { url, reason }) => {
                assert!(url.starts_with("wss://"));
                assert!(!reason.contains("not compiled in"), "{}", reason);
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }
}
