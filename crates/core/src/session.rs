//! The render session: one image cache, one fetch scheduler and one
//! measured-height map shared by every section attached to it.

use crate::config::RenderConfig;
use crate::convergence::{ConvergenceSettings, RegionHandle, spawn_convergence};
use crate::error::CoreError;
use crate::heights::MeasuredHeights;
use crate::section::{CacheImages, SectionInputs};
use log::{debug, info};
use std::sync::Arc;
use tabula_executor::RequestScheduler;
use tabula_layout::GridLayout;
use tabula_resource::{
    CacheOptions, DefaultFetcher, FilesystemFetcher, HttpFetcher, ResourceCache, ResourceFetcher,
};
use tabula_traits::{HeightListener, HostSurface};
use tabula_types::Section;

/// Owns the shared state of one rendering session. Cloning is cheap and
/// shares everything.
#[derive(Debug, Clone)]
pub struct RenderSession {
    config: Arc<RenderConfig>,
    cache: ResourceCache,
    heights: MeasuredHeights,
}

impl RenderSession {
    /// Creates a session that fetches over HTTP(S) and, when
    /// `resource_root` is set, from that directory.
    pub fn new(config: RenderConfig) -> Result<Self, CoreError> {
        let mut fetcher = DefaultFetcher::new(Arc::new(HttpFetcher::new()?));
        if let Some(root) = &config.resource_root {
            info!("Serving file:// resources from {}", root.display());
            fetcher = fetcher.with_filesystem(FilesystemFetcher::new(root));
        }
        Self::with_fetcher(config, Arc::new(fetcher))
    }

    /// Creates a session over a custom byte source.
    pub fn with_fetcher(
        config: RenderConfig,
        fetcher: Arc<dyn ResourceFetcher>,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let base_url = match config.parsed_base_url()? {
            Some(url) => Some(url),
            None => config
                .resource_root
                .as_ref()
                .and_then(|root| FilesystemFetcher::new(root).base_url()),
        };
        debug!(
            "Starting render session: fetcher={}, concurrency={}, base_url={:?}",
            fetcher.name(),
            config.concurrency,
            base_url.as_ref().map(|url| url.as_str())
        );

        let cache = ResourceCache::new(
            fetcher,
            RequestScheduler::new(config.concurrency),
            CacheOptions {
                base_url,
                retry: config.retry_policy(),
            },
        );
        Ok(Self {
            config: Arc::new(config),
            cache,
            heights: MeasuredHeights::new(),
        })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    pub fn heights(&self) -> &MeasuredHeights {
        &self.heights
    }

    pub fn scheduler(&self) -> &RequestScheduler {
        self.cache.scheduler()
    }

    /// Layout inputs for `section` at `width` with this session's layout settings.
    pub fn inputs(&self, index: usize, section: Section, width: f32) -> SectionInputs {
        SectionInputs::new(index, section, width, self.config.layout)
    }

    /// Starts measuring `inputs` against `surface`. Its images are requested
    /// immediately and `listener` hears every stabilized total height until
    /// the returned handle is dropped.
    pub fn attach_section(
        &self,
        inputs: SectionInputs,
        surface: Arc<dyn HostSurface>,
        listener: Arc<dyn HeightListener>,
    ) -> RegionHandle {
        debug!(
            "Attaching section {} ({} image(s))",
            inputs.index,
            inputs.image_sources().len()
        );
        spawn_convergence(
            inputs,
            surface,
            listener,
            self.heights.clone(),
            self.cache.clone(),
            ConvergenceSettings::from(self.config.as_ref()),
        )
    }

    /// Current height of `inputs` from whatever is measured and loaded now.
    pub fn estimate_section(&self, inputs: &SectionInputs) -> f32 {
        inputs.total_height(&self.heights.snapshot(), &CacheImages(&self.cache))
    }

    pub fn layout_grid(&self, inputs: &SectionInputs) -> Option<GridLayout> {
        inputs.grid_layout(&self.heights.snapshot(), &CacheImages(&self.cache))
    }

    /// Drops decoded images and measurements. Attached sections keep running
    /// and request their images again.
    pub fn clear(&self) {
        self.cache.clear();
        self.heights.clear();
    }
}
