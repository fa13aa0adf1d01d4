//! The resource cache: decoded images keyed by normalized URL, with at most
//! one outstanding load per key.
//!
//! A load runs as its own tokio task so that it completes (and populates the
//! cache) even if every requester stops waiting. Requesters attach to it
//! through a [`PendingLoad`], a cloneable shared future over that task.

use crate::data_url::decode_data_url;
use crate::decoded::ImageResource;
use crate::normalize::normalize_url;
use crate::retry::{RetryPolicy, RetryingFetcher};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tabula_executor::RequestScheduler;
use tabula_traits::{FetchedResource, InMemoryFetcher, ResourceError, ResourceFetcher};
use tabula_types::ResourceKey;
use tokio::sync::broadcast;
use url::Url;

const EVENT_CAPACITY: usize = 256;

/// Lifecycle of a resource key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    Absent,
    Loading,
    Loaded,
    Failed,
}

/// Broadcast to every [`ResourceCache::subscribe`]r.
#[derive(Debug, Clone)]
pub enum ResourceEvent {
    StateChanged {
        key: ResourceKey,
        state: ResourceState,
    },
    /// A transient failure; the load goes back to `Loading` after the backoff.
    Retrying {
        key: ResourceKey,
        attempt: u32,
        error: ResourceError,
    },
}

impl ResourceEvent {
    pub fn key(&self) -> &ResourceKey {
        match self {
            ResourceEvent::StateChanged { key, .. } | ResourceEvent::Retrying { key, .. } => key,
        }
    }
}

pub type LoadOutcome = Result<Arc<ImageResource>, ResourceError>;

/// A handle on an in-flight load. Every clone resolves to the same outcome.
#[derive(Clone)]
pub struct PendingLoad {
    key: ResourceKey,
    id: u64,
    shared: Shared<BoxFuture<'static, LoadOutcome>>,
}

impl PendingLoad {
    pub fn key(&self) -> &ResourceKey {
        &self.key
    }
}

impl Future for PendingLoad {
    type Output = LoadOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.shared).poll(cx)
    }
}

impl fmt::Debug for PendingLoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingLoad").field("key", &self.key).finish()
    }
}

/// Result of [`ResourceCache::request`].
#[derive(Debug)]
pub enum Lookup {
    Ready(Arc<ImageResource>),
    Pending(PendingLoad),
    /// The URL could not be turned into a key; nothing was scheduled.
    Failed(ResourceError),
}

#[derive(Debug, Clone, Default)]
pub struct CacheOptions {
    /// Base for relative resource paths.
    pub base_url: Option<Url>,
    pub retry: RetryPolicy,
}

/// Session-scoped image cache. Cloning is cheap and shares the store.
///
/// Must be used from within a tokio runtime: a cache miss spawns the load.
#[derive(Debug, Clone)]
pub struct ResourceCache {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    base_url: Option<Url>,
    scheduler: RequestScheduler,
    fetcher: RetryingFetcher,
    blobs: InMemoryFetcher,
    state: Mutex<CacheState>,
    events: broadcast::Sender<ResourceEvent>,
}

#[derive(Debug, Default)]
struct CacheState {
    loaded: HashMap<ResourceKey, Arc<ImageResource>>,
    in_flight: HashMap<ResourceKey, PendingLoad>,
    /// Loads dropped by `clear()` that are still running. A new request for
    /// the key adopts the load instead of fetching again.
    stale: HashMap<ResourceKey, PendingLoad>,
    failed: HashSet<ResourceKey>,
    next_load: u64,
}

impl CacheState {
    fn is_current(&self, key: &ResourceKey, id: u64) -> bool {
        self.in_flight.get(key).is_some_and(|pending| pending.id == id)
    }
}

impl ResourceCache {
    /// `fetcher` serves remote keys; every call to it is admitted through
    /// `scheduler`. `data:` and `blob:` keys resolve locally.
    pub fn new(
        fetcher: Arc<dyn ResourceFetcher>,
        scheduler: RequestScheduler,
        options: CacheOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                base_url: options.base_url,
                scheduler,
                fetcher: RetryingFetcher::new(fetcher, options.retry),
                blobs: InMemoryFetcher::new(),
                state: Mutex::new(CacheState::default()),
                events,
            }),
        }
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.inner.base_url.as_ref()
    }

    pub fn scheduler(&self) -> &RequestScheduler {
        &self.inner.scheduler
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ResourceEvent> {
        self.inner.events.subscribe()
    }

    /// Normalizes `url` the same way `request` does.
    pub fn key_for(&self, url: &str) -> Result<ResourceKey, ResourceError> {
        normalize_url(url, self.inner.base_url.as_ref())
    }

    /// Returns the resource if it is loaded, otherwise attaches to (or
    /// starts) its load. Never suspends.
    pub fn request(&self, url: &str) -> Lookup {
        match self.key_for(url) {
            Ok(key) => self.request_key(key),
            Err(e) => {
                warn!("Cannot request resource: {}", e);
                Lookup::Failed(e)
            }
        }
    }

    pub fn request_key(&self, key: ResourceKey) -> Lookup {
        let pending = {
            let mut state = self.inner.lock();
            if let Some(resource) = state.loaded.get(&key) {
                debug!("Cache hit for {}", key);
                return Lookup::Ready(resource.clone());
            }
            if let Some(pending) = state.in_flight.get(&key) {
                debug!("Attaching to in-flight load of {}", key);
                return Lookup::Pending(pending.clone());
            }

            state.failed.remove(&key);
            self.inner.emit(ResourceEvent::StateChanged {
                key: key.clone(),
                state: ResourceState::Loading,
            });
            let pending = match state.stale.remove(&key) {
                Some(pending) => {
                    debug!("Adopting load of {} started before clear()", key);
                    pending
                }
                None => {
                    state.next_load += 1;
                    self.spawn_load(key.clone(), state.next_load)
                }
            };
            state.in_flight.insert(key, pending.clone());
            pending
        };

        Lookup::Pending(pending)
    }

    /// Requests `url` and waits for the outcome.
    pub async fn load(&self, url: &str) -> LoadOutcome {
        match self.request(url) {
            Lookup::Ready(resource) => Ok(resource),
            Lookup::Pending(pending) => pending.await,
            Lookup::Failed(e) => Err(e),
        }
    }

    /// Starts loads for every distinct key not yet loaded and returns their
    /// handles. Unparseable URLs are logged and skipped.
    pub fn prefetch<I, S>(&self, urls: I) -> Vec<PendingLoad>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        urls.into_iter()
            .filter_map(|url| match self.request(url.as_ref()) {
                Lookup::Pending(pending) if seen.insert(pending.key.clone()) => Some(pending),
                _ => None,
            })
            .collect()
    }

    pub fn get(&self, url: &str) -> Option<Arc<ImageResource>> {
        let key = self.key_for(url).ok()?;
        self.inner.lock().loaded.get(&key).cloned()
    }

    pub fn state(&self, url: &str) -> ResourceState {
        match self.key_for(url) {
            Ok(key) => self.state_of(&key),
            Err(_) => ResourceState::Absent,
        }
    }

    pub fn state_of(&self, key: &ResourceKey) -> ResourceState {
        let state = self.inner.lock();
        if state.loaded.contains_key(key) {
            ResourceState::Loaded
        } else if state.in_flight.contains_key(key) {
            ResourceState::Loading
        } else if state.failed.contains(key) {
            ResourceState::Failed
        } else {
            ResourceState::Absent
        }
    }

    /// Installs the bytes behind a `blob:` URL. A previously decoded image
    /// for the same URL is evicted.
    pub fn register_blob(&self, url: &str, bytes: Vec<u8>) -> Result<ResourceKey, ResourceError> {
        let key = self.key_for(url)?;
        if !key.as_str().starts_with("blob:") {
            return Err(ResourceError::InvalidUrl(format!(
                "not a blob URL: {}",
                url
            )));
        }
        self.inner.blobs.add(key.as_str(), bytes);
        let mut state = self.inner.lock();
        state.loaded.remove(&key);
        state.failed.remove(&key);
        Ok(key)
    }

    /// Number of decoded resources held.
    pub fn len(&self) -> usize {
        self.inner.lock().loaded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every decoded resource and forgets in-flight and failed keys.
    /// Each dropped key is announced as `Absent`.
    ///
    /// Loads already running still resolve for their waiters but only
    /// populate the cache if the key is requested again before they finish;
    /// such a request attaches to the running load. Registered blobs are kept.
    pub fn clear(&self) {
        let mut state = self.inner.lock();
        let mut dropped: Vec<ResourceKey> = state.loaded.drain().map(|(key, _)| key).collect();
        dropped.extend(state.failed.drain());
        let running: Vec<(ResourceKey, PendingLoad)> = state.in_flight.drain().collect();
        for (key, pending) in running {
            dropped.push(key.clone());
            state.stale.insert(key, pending);
        }
        debug!("Cleared {} resource(s)", dropped.len());
        for key in dropped {
            self.inner.emit(ResourceEvent::StateChanged {
                key,
                state: ResourceState::Absent,
            });
        }
    }

    fn spawn_load(&self, key: ResourceKey, id: u64) -> PendingLoad {
        let inner = self.inner.clone();
        let task_key = key.clone();
        let handle = tokio::spawn(async move { inner.run_load(task_key, id).await });

        let url = key.to_string();
        let shared = async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(ResourceError::NetworkFailure {
                    url,
                    status: None,
                    message: format!("load task ended abnormally: {}", e),
                }),
            }
        }
        .boxed()
        .shared();

        PendingLoad { key, id, shared }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: ResourceEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    async fn run_load(self: Arc<Self>, key: ResourceKey, id: u64) -> LoadOutcome {
        let fetched = if key.is_local() {
            self.fetch_local(&key).await
        } else {
            self.fetch_remote(&key, id).await
        };

        let outcome = fetched
            .and_then(|fetched| ImageResource::decode(key.clone(), &fetched))
            .map(Arc::new);
        self.finish(&key, id, &outcome);
        outcome
    }

    /// `data:` and `blob:` bypass the scheduler and the retry policy.
    async fn fetch_local(&self, key: &ResourceKey) -> Result<FetchedResource, ResourceError> {
        if key.as_str().starts_with("data:") {
            decode_data_url(key.as_str())
        } else {
            self.blobs.fetch(key.as_str()).await
        }
    }

    async fn fetch_remote(
        &self,
        key: &ResourceKey,
        id: u64,
    ) -> Result<FetchedResource, ResourceError> {
        let attempt = self.fetcher.fetch_observed(key.as_str(), |attempt, error| {
            // A load dropped by clear() has nobody to report to
            if !self.lock().is_current(key, id) {
                return;
            }
            self.emit(ResourceEvent::Retrying {
                key: key.clone(),
                attempt,
                error: error.clone(),
            });
            self.emit(ResourceEvent::StateChanged {
                key: key.clone(),
                state: ResourceState::Loading,
            });
        });

        self.scheduler
            .schedule(attempt)
            .await
            .unwrap_or_else(|e| {
                Err(ResourceError::NetworkFailure {
                    url: key.to_string(),
                    status: None,
                    message: e.to_string(),
                })
            })
    }

    fn finish(&self, key: &ResourceKey, id: u64, outcome: &LoadOutcome) {
        let new_state = {
            let mut state = self.lock();
            if !state.is_current(key, id) {
                if state.stale.get(key).is_some_and(|pending| pending.id == id) {
                    state.stale.remove(key);
                }
                debug!("Discarding load of {} started before clear()", key);
                return;
            }
            state.in_flight.remove(key);
            match outcome {
                Ok(resource) => {
                    state.loaded.insert(key.clone(), resource.clone());
                    ResourceState::Loaded
                }
                Err(_) => {
                    state.failed.insert(key.clone());
                    ResourceState::Failed
                }
            }
        };

        match outcome {
            Ok(resource) => debug!(
                "Loaded {} ({}x{})",
                key,
                resource.width(),
                resource.height()
            ),
            Err(e) => warn!("Resource {} failed: {}", key, e),
        }
        self.emit(ResourceEvent::StateChanged {
            key: key.clone(),
            state: new_state,
        });
    }
}
