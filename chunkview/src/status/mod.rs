//! Server push channel for dataset processing status.
//!
//! While a dataset is still being processed the server pushes
//! `status_update`, `parsing_error` and `error` events. The readiness tracker
//! holds exactly one [`StatusSubscription`] per handle and closes it on every
//! terminal transition.
//!
//! ```ignore
//! use chunkview::status::{StatusChannel, WebSocketStatusChannel};
//!
//! let channel = WebSocketStatusChannel::from_http_base("http://localhost:8080");
//! let mut subscription = channel.subscribe(handle).await?;
//! subscription.on_event(|event| println!("{:?}", event));
//! // ...
//! subscription.close();
//! ```

mod event;
mod subscription;
mod websocket;

pub use event::{EventDecodeError, PushEvent};
pub use subscription::StatusSubscription;
pub use websocket::{ws_url_for, WebSocketStatusChannel};

use crate::dataset::DatasetHandle;
use crate::error::PreviewResult;
use crate::fetch::BoxFuture;

/// Opens status subscriptions.
pub trait StatusChannel: Send + Sync {
    /// Open a subscription for `handle`.
    fn subscribe(&self, handle: DatasetHandle) -> BoxFuture<'_, PreviewResult<StatusSubscription>>;
}
