//! ResourceFetcher trait for abstracting where image bytes come from.
//!
//! The cache and scheduler only ever see this trait, so the network stack,
//! an in-memory blob store, or a test double can sit behind it.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

/// Error type for resource fetching and decoding.
///
/// Cloneable so one failed load can be handed to every waiter attached to it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResourceError {
    #[error("Timed out after {timeout_ms} ms fetching '{url}'")]
    NetworkTimeout { url: String, timeout_ms: u64 },

    #[error("Failed to fetch '{url}': {message}")]
    NetworkFailure {
        url: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Failed to decode image '{url}': {message}")]
    DecodeFailure { url: String, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid resource URL: {0}")]
    InvalidUrl(String),
}

impl ResourceError {
    /// Timeouts and network failures are transient; everything else would
    /// fail the same way on a second attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ResourceError::NetworkTimeout { .. } | ResourceError::NetworkFailure { .. }
        )
    }
}

/// Shared resource data type (reference-counted bytes).
pub type SharedResourceData = Arc<Vec<u8>>;

/// Raw bytes of a fetched resource. Decoding is the cache's job.
#[derive(Debug, Clone)]
pub struct FetchedResource {
    pub bytes: SharedResourceData,
    /// Content-Type header value, if the source reported one.
    pub content_type: Option<String>,
}

impl FetchedResource {
    pub fn new(bytes: impl Into<SharedResourceData>, content_type: Option<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type,
        }
    }
}

/// A single-attempt source of resource bytes.
///
/// Implementations perform exactly one attempt per call; timeouts and
/// retries are layered on top by the resource crate.
#[async_trait]
pub trait ResourceFetcher: Send + Sync + Debug {
    async fn fetch(&self, url: &str) -> Result<FetchedResource, ResourceError>;

    /// Returns a human-readable name for this fetcher (for logging/debugging).
    fn name(&self) -> &'static str;
}

#[async_trait]
impl<T: ResourceFetcher + ?Sized> ResourceFetcher for Arc<T> {
    async fn fetch(&self, url: &str) -> Result<FetchedResource, ResourceError> {
        (**self).fetch(url).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// An in-memory fetcher.
///
/// Backs `blob:` URLs and embedded assets, and serves as the simplest
/// fetcher in tests. Entries must be registered before they are fetched.
#[derive(Debug, Default)]
pub struct InMemoryFetcher {
    resources: RwLock<HashMap<String, SharedResourceData>>,
}

impl InMemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, url: impl Into<String>, data: Vec<u8>) {
        self.add_shared(url, Arc::new(data));
    }

    pub fn add_shared(&self, url: impl Into<String>, data: SharedResourceData) {
        self.resources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.into(), data);
    }

    pub fn remove(&self, url: &str) -> Option<SharedResourceData> {
        self.resources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(url)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.resources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(url)
    }

    pub fn clear(&self) {
        self.resources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.resources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ResourceFetcher for InMemoryFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedResource, ResourceError> {
        let resources = self.resources.read().unwrap_or_else(PoisonError::into_inner);
        resources
            .get(url)
            .cloned()
            .map(|bytes| FetchedResource::new(bytes, None))
            .ok_or_else(|| ResourceError::NotFound(url.to_string()))
    }

    fn name(&self) -> &'static str {
        "InMemoryFetcher"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_fetcher_add_and_fetch() {
        let fetcher = InMemoryFetcher::new();
        fetcher.add("blob:logo", b"PNG".to_vec());

        let fetched = fetcher.fetch("blob:logo").await.unwrap();
        assert_eq!(&*fetched.bytes, b"PNG");
        assert!(fetched.content_type.is_none());
    }

    #[tokio::test]
    async fn test_in_memory_fetcher_not_found() {
        let fetcher = InMemoryFetcher::new();
        let result = fetcher.fetch("blob:missing").await;
        assert!(matches!(result, Err(ResourceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_in_memory_fetcher_through_arc() {
        let fetcher: Arc<dyn ResourceFetcher> = Arc::new(InMemoryFetcher::new());
        assert_eq!(fetcher.name(), "InMemoryFetcher");
        assert!(fetcher.fetch("x").await.is_err());
    }

    #[test]
    fn test_in_memory_fetcher_remove_and_clear() {
        let fetcher = InMemoryFetcher::new();
        fetcher.add("a", vec![1]);
        fetcher.add("b", vec![2]);
        assert_eq!(fetcher.len(), 2);

        assert_eq!(fetcher.remove("a").as_deref(), Some(&vec![1]));
        assert!(!fetcher.contains("a"));
        assert!(fetcher.remove("a").is_none());

        fetcher.clear();
        assert!(fetcher.is_empty());
    }

    #[test]
    fn test_retryable_classification() {
        let timeout = ResourceError::NetworkTimeout {
            url: "u".into(),
            timeout_ms: 10,
        };
        let failure = ResourceError::NetworkFailure {
            url: "u".into(),
            status: Some(503),
            message: "Service Unavailable".into(),
        };
        let decode = ResourceError::DecodeFailure {
            url: "u".into(),
            message: "bad header".into(),
        };

        assert!(timeout.is_retryable());
        assert!(failure.is_retryable());
        assert!(!decode.is_retryable());
        assert!(!ResourceError::NotFound("u".into()).is_retryable());
    }

    #[test]
    fn test_resource_error_display() {
        let err = ResourceError::NetworkFailure {
            url: "https://cdn/a.png".into(),
            status: Some(404),
            message: "HTTP 404".into(),
        };
        assert!(err.to_string().contains("https://cdn/a.png"));
        assert!(err.to_string().contains("HTTP 404"));

        let err = ResourceError::NetworkTimeout {
            url: "https://cdn/b.png".into(),
            timeout_ms: 10_000,
        };
        assert!(err.to_string().contains("10000 ms"));
    }
}
