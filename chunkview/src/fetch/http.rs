//! HTTP backend using reqwest.
//!
//! Endpoints:
//!
//! ```text
//! GET {base}/handle/{id}                             -> metadata
//! GET {base}/handle/{id}/preview?index={i}&size={n}  -> chunk
//! ```
//!
//! Concurrency is bounded by a semaphore held by the client instance. Each
//! client gets its own unless one is passed to
//! [`HttpPreviewClient::with_limiter`].

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::payload::{parse_chunk, parse_metadata, DatasetMetadata};
use super::traits::{BoxFuture, ChunkFetcher, MetadataSource};
use crate::dataset::{Chunk, DatasetHandle};
use crate::error::{PreviewError, PreviewResult};

/// Default timeout for HTTP requests in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default maximum number of requests in flight per client.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 6;

/// Configuration for [`HttpPreviewClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the preview API, e.g. `https://data.example.com/api`.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Maximum requests in flight.
    pub max_concurrent_requests: usize,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            user_agent: default_user_agent(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_concurrent_requests(mut self, max: usize) -> Self {
        self.max_concurrent_requests = max;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// `chunkview/<version>`.
pub fn default_user_agent() -> String {
    format!("chunkview/{}", crate::VERSION)
}

/// Preview API client implementing both [`ChunkFetcher`] and [`MetadataSource`].
pub struct HttpPreviewClient {
    client: Client,
    base_url: String,
    timeout: Duration,
    limiter: Arc<Semaphore>,
}

impl HttpPreviewClient {
    /// Create a client from configuration.
    pub fn new(config: &ClientConfig) -> PreviewResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| PreviewError::Network {
                url: config.base_url.clone(),
                reason: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout,
            limiter: Arc::new(Semaphore::new(config.max_concurrent_requests.max(1))),
        })
    }

    /// Share a request limiter with other clients instead of owning one.
    pub fn with_limiter(mut self, limiter: Arc<Semaphore>) -> Self {
        self.limiter = limiter;
        self
    }

    /// URL of the metadata endpoint for `handle`.
    pub fn metadata_url(&self, handle: &DatasetHandle) -> String {
        format!("{}/handle/{}", self.base_url, handle)
    }

    /// URL of the preview endpoint for one chunk.
    pub fn preview_url(&self, handle: &DatasetHandle, index: u64, size: u32) -> String {
        format!(
            "{}/handle/{}/preview?index={}&size={}",
            self.base_url, handle, index, size
        )
    }

    /// Number of request slots currently free.
    pub fn available_slots(&self) -> usize {
        self.limiter.available_permits()
    }

    /// Issue a GET, honouring the concurrency limit and `cancel`.
    async fn get(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> PreviewResult<(StatusCode, Vec<u8>)> {
        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PreviewError::Cancelled),
            permit = self.limiter.acquire() => permit.map_err(|_| PreviewError::Cancelled)?,
        };

        let request = async {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| self.map_reqwest_error(url, e))?;
            let status = response.status();
            let body = response
                .bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(|e| self.map_reqwest_error(url, e))?;
            Ok((status, body))
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(url, "Request cancelled");
                Err(PreviewError::Cancelled)
            }
            result = request => result,
        }
    }

    fn map_reqwest_error(&self, url: &str, error: reqwest::Error) -> PreviewError {
        if error.is_timeout() {
            PreviewError::Timeout {
                url: url.to_string(),
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            PreviewError::Network {
                url: url.to_string(),
                reason: error.to_string(),
            }
        }
    }

    async fn fetch_metadata(
        &self,
        handle: DatasetHandle,
        cancel: CancellationToken,
    ) -> PreviewResult<DatasetMetadata> {
        let url = self.metadata_url(&handle);
        let (status, body) = self.get(&url, &cancel).await?;

        if status == StatusCode::NOT_FOUND {
            return Err(PreviewError::DatasetNotFound {
                handle: handle.to_string(),
            });
        }
        if !status.is_success() {
            return Err(PreviewError::Network {
                url,
                reason: format!("HTTP {}", status),
            });
        }

        parse_metadata(&url, &body)
    }

    async fn fetch_chunk(
        &self,
        handle: DatasetHandle,
        index: u64,
        size: u32,
        cancel: CancellationToken,
    ) -> PreviewResult<Chunk> {
        let url = self.preview_url(&handle, index, size);
        let (status, body) = self.get(&url, &cancel).await?;

        if status == StatusCode::NOT_FOUND {
            return Err(PreviewError::DatasetNotFound {
                handle: handle.to_string(),
            });
        }
        if !status.is_success() {
            return Err(PreviewError::Network {
                url,
                reason: format!("HTTP {}", status),
            });
        }

        debug!(handle = %handle, index, size, bytes = body.len(), "Fetched chunk");
        parse_chunk(&url, &body, index, size)
    }
}

impl ChunkFetcher for HttpPreviewClient {
    fn fetch(
        &self,
        handle: DatasetHandle,
        index: u64,
        size: u32,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, PreviewResult<Chunk>> {
        Box::pin(self.fetch_chunk(handle, index, size, cancel))
    }
}

impl MetadataSource for HttpPreviewClient {
    fn metadata(
        &self,
        handle: DatasetHandle,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, PreviewResult<DatasetMetadata>> {
        Box::pin(self.fetch_metadata(handle, cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> HttpPreviewClient {
        HttpPreviewClient::new(&ClientConfig::new(base_url)).unwrap()
    }

    fn handle() -> DatasetHandle {
        DatasetHandle::parse("valid-1").unwrap()
    }

    #[test]
    fn test_client_config_defaults() {
        let config = ClientConfig::new("http://localhost:8080");
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.max_concurrent_requests, DEFAULT_MAX_CONCURRENT_REQUESTS);
        assert!(config.user_agent.starts_with("chunkview/"));
    }

    #[test]
    fn test_client_config_builder() {
        let config = ClientConfig::new("http://localhost")
            .with_timeout(Duration::from_secs(5))
            .with_max_concurrent_requests(2)
            .with_user_agent("test-agent");

        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.max_concurrent_requests, 2);
        assert_eq!(config.user_agent, "test-agent");
    }

    #[test]
    fn test_urls() {
        let client = client("http://localhost:8080/api/");
        assert_eq!(
            client.metadata_url(&handle()),
            "http://localhost:8080/api/handle/valid-1"
        );
        assert_eq!(
            client.preview_url(&handle(), 2, 100),
            "http://localhost:8080/api/handle/valid-1/preview?index=2&size=100"
        );
    }

    #[test]
    fn test_limiter_is_per_instance() {
        let config = ClientConfig::new("http://localhost").with_max_concurrent_requests(3);
        let a = HttpPreviewClient::new(&config).unwrap();
        let b = HttpPreviewClient::new(&config).unwrap();
        assert_eq!(a.available_slots(), 3);
        assert_eq!(b.available_slots(), 3);
    }

    #[test]
    fn test_shared_limiter() {
        let shared = Arc::new(Semaphore::new(1));
        let config = ClientConfig::new("http://localhost");
        let a = HttpPreviewClient::new(&config)
            .unwrap()
            .with_limiter(shared.clone());
        let _permit = shared.try_acquire().unwrap();
        assert_eq!(a.available_slots(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_fetch_issues_no_request() {
        let client = client("http://localhost:1");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = client.fetch(handle(), 0, 100, cancel).await;
        assert_eq!(result, Err(PreviewError::Cancelled));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transient() {
        let config =
            ClientConfig::new("http://127.0.0.1:1").with_timeout(Duration::from_secs(2));
        let client = HttpPreviewClient::new(&config).unwrap();

        let err = client
            .fetch(handle(), 0, 100, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_transient(), "unexpected error {:?}", err);
    }
}
