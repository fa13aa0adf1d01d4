//! Image resources for the tabula renderer.
//!
//! - [`ResourceCache`]: decoded images keyed by normalized URL, one load per key
//! - [`RetryingFetcher`]: per-attempt timeout and linear backoff over any
//!   [`ResourceFetcher`]
//! - [`HttpFetcher`], [`FilesystemFetcher`], [`DefaultFetcher`]: byte sources
//! - [`decode_data_url`], [`normalize_url`]: URL handling
//!
//! Remote fetches are admitted through a shared
//! [`RequestScheduler`](tabula_executor::RequestScheduler).

mod cache;
mod data_url;
mod decoded;
mod fetcher;
mod filesystem;
mod normalize;
mod retry;

pub use cache::{
    CacheOptions, LoadOutcome, Lookup, PendingLoad, ResourceCache, ResourceEvent, ResourceState,
};
pub use data_url::decode_data_url;
pub use decoded::ImageResource;
pub use fetcher::{DEFAULT_MAX_BODY_BYTES, DefaultFetcher, HttpFetcher};
pub use filesystem::FilesystemFetcher;
pub use normalize::{normalize_url, parse_base_url};
pub use retry::{
    DEFAULT_FETCH_TIMEOUT, DEFAULT_RETRIES, DEFAULT_RETRY_BASE_DELAY, RetryPolicy,
    RetryingFetcher,
};

pub use tabula_traits::{FetchedResource, InMemoryFetcher, ResourceError, ResourceFetcher};
