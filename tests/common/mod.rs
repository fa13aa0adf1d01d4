#![allow(dead_code)]

pub mod fixtures;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tabula::{
    FetchedResource, HeightListener, HostSurface, RegionKey, RenderConfig, RenderSession,
    ResourceError, ResourceFetcher,
};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Encodes a solid PNG of the given size.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([40, 120, 200, 255]));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// An in-memory origin with latency, hangs and call accounting.
///
/// A URL with `n` scripted hangs never answers its first `n` attempts, so the
/// caller's timeout fires. Unknown URLs answer `NotFound`.
#[derive(Debug, Default)]
pub struct FakeOrigin {
    bodies: Mutex<HashMap<String, Vec<u8>>>,
    hangs: Mutex<HashMap<String, u32>>,
    latency: Duration,
    calls: Mutex<Vec<String>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeOrigin {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn serve(&self, url: &str, body: Vec<u8>) {
        self.bodies.lock().unwrap().insert(url.to_string(), body);
    }

    pub fn hang(&self, url: &str, attempts: u32) {
        self.hangs.lock().unwrap().insert(url.to_string(), attempts);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == url).count()
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceFetcher for FakeOrigin {
    async fn fetch(&self, url: &str) -> Result<FetchedResource, ResourceError> {
        self.calls.lock().unwrap().push(url.to_string());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = ActiveGuard(&self.active);

        let hang = {
            let mut hangs = self.hangs.lock().unwrap();
            match hangs.get_mut(url) {
                Some(left) if *left > 0 => {
                    *left -= 1;
                    true
                }
                _ => false,
            }
        };
        if hang {
            std::future::pending::<()>().await;
        }

        tokio::time::sleep(self.latency).await;
        let body = self.bodies.lock().unwrap().get(url).cloned();
        match body {
            Some(bytes) => Ok(FetchedResource::new(bytes, Some("image/png".to_string()))),
            None => Err(ResourceError::NotFound(url.to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "FakeOrigin"
    }
}

/// A host surface whose regions have fixed heights (20 px unless set) and
/// whose paints take one 16 ms frame.
#[derive(Debug, Default)]
pub struct FakeSurface {
    heights: Mutex<HashMap<RegionKey, f32>>,
    default_height: f32,
    paints: AtomicUsize,
}

impl FakeSurface {
    pub fn new() -> Arc<Self> {
        Self::with_default(20.0)
    }

    pub fn with_default(default_height: f32) -> Arc<Self> {
        Arc::new(Self {
            default_height,
            ..Self::default()
        })
    }

    pub fn set(&self, key: RegionKey, height: f32) {
        self.heights.lock().unwrap().insert(key, height);
    }

    pub fn paints(&self) -> usize {
        self.paints.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostSurface for FakeSurface {
    fn measure_height(&self, region: &RegionKey) -> f32 {
        self.heights
            .lock()
            .unwrap()
            .get(region)
            .copied()
            .unwrap_or(self.default_height)
    }

    async fn next_paint(&self) {
        self.paints.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(16)).await;
    }
}

/// Collects every stabilized height.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    heights: Arc<Mutex<Vec<f32>>>,
}

impl Recorder {
    pub fn listener(&self) -> Arc<dyn HeightListener> {
        let heights = self.heights.clone();
        Arc::new(move |height: f32| heights.lock().unwrap().push(height))
    }

    pub fn heights(&self) -> Vec<f32> {
        self.heights.lock().unwrap().clone()
    }
}

pub const BASE_URL: &str = "https://cdn.example.com/";

/// A session over `origin` with relative URLs resolved against [`BASE_URL`].
pub fn session(origin: Arc<FakeOrigin>, config: RenderConfig) -> RenderSession {
    init_logging();
    RenderSession::with_fetcher(config.with_base_url(BASE_URL), origin).unwrap()
}
