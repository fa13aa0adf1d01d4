//! Single-attempt fetchers and the scheme router in front of them.

use crate::data_url::decode_data_url;
use crate::filesystem::FilesystemFetcher;
use async_trait::async_trait;
use log::trace;
use std::sync::Arc;
use tabula_traits::{FetchedResource, ResourceError, ResourceFetcher};

/// Refuse bodies larger than this; no cell image legitimately needs more.
pub const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Plain HTTP(S) GET. One call is one attempt with no timeout of its own;
/// wrap it in a [`RetryingFetcher`](crate::RetryingFetcher).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, ResourceError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("tabula/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ResourceError::NetworkFailure {
                url: String::new(),
                status: None,
                message: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn transport_error(url: &str, e: reqwest::Error) -> ResourceError {
        ResourceError::NetworkFailure {
            url: url.to_string(),
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedResource, ResourceError> {
        let mut response = self
            .client
            .get(url)
            .header(reqwest::header::CACHE_CONTROL, "max-stale")
            .send()
            .await
            .map_err(|e| Self::transport_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResourceError::NetworkFailure {
                url: url.to_string(),
                status: Some(status.as_u16()),
                message: format!("HTTP {}", status),
            });
        }

        let declared = response.content_length();
        if let Some(len) = declared {
            check_declared_length(url, len, DEFAULT_MAX_BODY_BYTES)?;
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        // Chunked responses carry no length; the cap is enforced as bytes arrive
        let mut body = Vec::with_capacity(
            declared.and_then(|len| usize::try_from(len).ok()).unwrap_or(0),
        );
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Self::transport_error(url, e))?
        {
            append_capped(url, &mut body, &chunk, DEFAULT_MAX_BODY_BYTES)?;
        }

        trace!("GET {} -> {} bytes", url, body.len());
        Ok(FetchedResource::new(body, content_type))
    }

    fn name(&self) -> &'static str {
        "HttpFetcher"
    }
}

fn body_too_large(url: &str, size: u64, max: usize) -> ResourceError {
    ResourceError::DecodeFailure {
        url: url.to_string(),
        message: format!("body of {} bytes exceeds {}", size, max),
    }
}

fn check_declared_length(url: &str, len: u64, max: usize) -> Result<(), ResourceError> {
    if len > max as u64 {
        return Err(body_too_large(url, len, max));
    }
    Ok(())
}

/// Appends `chunk` to `body` unless that would take it past `max` bytes.
fn append_capped(
    url: &str,
    body: &mut Vec<u8>,
    chunk: &[u8],
    max: usize,
) -> Result<(), ResourceError> {
    let size = body.len().saturating_add(chunk.len());
    if size > max {
        return Err(body_too_large(url, size as u64, max));
    }
    body.extend_from_slice(chunk);
    Ok(())
}

/// Routes a normalized URL to the fetcher for its scheme.
///
/// `data:` is decoded in place, `file:` is read from the filesystem root (when
/// one is configured) and `http(s):` goes over the network. `blob:` URLs have
/// no remote source; the cache serves them from its own blob store.
#[derive(Debug)]
pub struct DefaultFetcher {
    http: Arc<dyn ResourceFetcher>,
    files: Option<FilesystemFetcher>,
}

impl DefaultFetcher {
    pub fn new(http: Arc<dyn ResourceFetcher>) -> Self {
        Self { http, files: None }
    }

    pub fn with_filesystem(mut self, files: FilesystemFetcher) -> Self {
        self.files = Some(files);
        self
    }
}

#[async_trait]
impl ResourceFetcher for DefaultFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedResource, ResourceError> {
        let scheme = url.split_once(':').map(|(s, _)| s.to_ascii_lowercase());
        match scheme.as_deref() {
            Some("data") => decode_data_url(url),
            Some("blob") => Err(ResourceError::NotFound(url.to_string())),
            Some("file") => match &self.files {
                Some(files) => files.fetch(url).await,
                None => Err(ResourceError::InvalidUrl(format!(
                    "file URLs are disabled: {}",
                    url
                ))),
            },
            Some("http") | Some("https") => self.http.fetch(url).await,
            _ => Err(ResourceError::InvalidUrl(format!(
                "unsupported scheme: {}",
                url
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "DefaultFetcher"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_traits::InMemoryFetcher;

    fn router() -> DefaultFetcher {
        let http = Arc::new(InMemoryFetcher::new());
        http.add("https://cdn.example.com/a.png", b"remote".to_vec());
        DefaultFetcher::new(http)
    }

    #[tokio::test]
    async fn test_routes_by_scheme() {
        let fetcher = router();

        let remote = fetcher.fetch("https://cdn.example.com/a.png").await.unwrap();
        assert_eq!(&*remote.bytes, b"remote");

        let inline = fetcher.fetch("data:,hi").await.unwrap();
        assert_eq!(&*inline.bytes, b"hi");
    }

    #[tokio::test]
    async fn test_rejects_unknown_and_disabled_schemes() {
        let fetcher = router();
        assert!(matches!(
            fetcher.fetch("ftp://host/a.png").await,
            Err(ResourceError::InvalidUrl(_))
        ));
        assert!(matches!(
            fetcher.fetch("file:///tmp/a.png").await,
            Err(ResourceError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_declared_length_over_cap_is_refused() {
        assert!(check_declared_length("https://cdn/a.png", 1024, 1024).is_ok());
        assert!(matches!(
            check_declared_length("https://cdn/a.png", u64::from(u32::MAX) + 1, 1024),
            Err(ResourceError::DecodeFailure { .. })
        ));
    }

    #[test]
    fn test_streamed_body_is_capped() {
        let mut body = Vec::new();
        append_capped("https://cdn/a.png", &mut body, &[1; 6], 10).unwrap();
        append_capped("https://cdn/a.png", &mut body, &[2; 4], 10).unwrap();
        assert_eq!(body.len(), 10);

        let err = append_capped("https://cdn/a.png", &mut body, &[3], 10).unwrap_err();
        assert!(matches!(err, ResourceError::DecodeFailure { ref message, .. } if message.contains("11 bytes")));
        assert_eq!(body.len(), 10);
    }

    #[tokio::test]
    async fn test_blob_has_no_remote_source() {
        let fetcher = router();
        assert!(matches!(
            fetcher.fetch("blob:missing").await,
            Err(ResourceError::NotFound(_))
        ));
    }
}
