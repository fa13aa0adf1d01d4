//! Timeout and bounded retry layered over a single-attempt fetcher.

use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tabula_traits::{FetchedResource, ResourceError, ResourceFetcher};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Per-attempt timeout plus linear backoff: the wait after attempt `n` is
/// `n × base_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_FETCH_TIMEOUT,
            retries: DEFAULT_RETRIES,
            base_delay: DEFAULT_RETRY_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Delay before the attempt following `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Wraps a fetcher with the retry policy.
///
/// Only [`ResourceError::is_retryable`] failures are retried; a missing blob
/// or a malformed URL fails on the first attempt.
#[derive(Debug, Clone)]
pub struct RetryingFetcher {
    inner: Arc<dyn ResourceFetcher>,
    policy: RetryPolicy,
}

impl RetryingFetcher {
    pub fn new(inner: Arc<dyn ResourceFetcher>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn fetch(&self, url: &str) -> Result<FetchedResource, ResourceError> {
        self.fetch_observed(url, |_, _| {}).await
    }

    /// Like [`fetch`](Self::fetch), calling `on_retry(attempt, error)` each
    /// time a failed attempt is about to be retried.
    pub async fn fetch_observed<F>(
        &self,
        url: &str,
        mut on_retry: F,
    ) -> Result<FetchedResource, ResourceError>
    where
        F: FnMut(u32, &ResourceError),
    {
        let max_attempts = self.policy.max_attempts();
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            let outcome = match tokio::time::timeout(self.policy.timeout, self.inner.fetch(url)).await
            {
                Ok(result) => result,
                Err(_) => Err(ResourceError::NetworkTimeout {
                    url: url.to_string(),
                    timeout_ms: self.policy.timeout.as_millis() as u64,
                }),
            };

            match outcome {
                Ok(resource) => {
                    if attempt > 1 {
                        debug!("Fetched '{}' on attempt {}/{}", url, attempt, max_attempts);
                    }
                    return Ok(resource);
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    if attempt < max_attempts {
                        let delay = self.policy.backoff(attempt);
                        warn!(
                            "Attempt {}/{} failed: {}. Retrying in {:?}",
                            attempt, max_attempts, e, delay
                        );
                        on_retry(attempt, &e);
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ResourceError::NetworkFailure {
            url: url.to_string(),
            status: None,
            message: "no fetch attempt was made".to_string(),
        }))
    }
}
