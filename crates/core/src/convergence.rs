//! Height convergence for one section.
//!
//! Each attached section runs a task that cycles through
//! `Measuring → Unstable → Stable`:
//!
//! - A **measurement pass** reads every trackable region from the host
//!   surface. Regions still reporting zero are re-read after the next paint,
//!   up to the retry ceiling; whatever was measured is then merged into the
//!   shared height map.
//! - The section total is recomputed with estimate fallbacks. A total that
//!   differs from the last reported one by more than the tolerance becomes
//!   the **candidate** and starts the stabilization window. A different
//!   candidate restarts the window.
//! - When the window elapses the total is re-checked and, if it still
//!   matches, reported to the listener exactly once.
//!
//! Passes are triggered by dependent images finishing (through the cache's
//! status broadcast) and by [`Trigger`]s sent through the [`RegionHandle`].
//! Dropping the handle cancels the task; no callback fires afterwards.

use crate::config::RenderConfig;
use crate::error::ConvergenceNote;
use crate::heights::MeasuredHeights;
use crate::section::{CacheImages, SectionInputs};
use log::{debug, info, trace, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tabula_resource::{ResourceCache, ResourceEvent, ResourceState};
use tabula_traits::{HeightListener, HostSurface};
use tabula_types::{RegionKey, ResourceKey};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

/// Something that may change the section's height.
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    ResourceLoaded(ResourceKey),
    ResourceFailed(ResourceKey),
    /// The cache dropped the resource; it is requested again.
    ResourceEvicted(ResourceKey),
    /// Font size, width, content or image scale changed. Every measurement
    /// of the section is discarded.
    InputsChanged(Box<SectionInputs>),
    /// Discard and re-measure the given regions.
    Remeasure(Vec<RegionKey>),
    /// Heights measured elsewhere, merged without a measurement pass.
    External(Vec<(RegionKey, f32)>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceSettings {
    /// Paint cycles to wait for zero-height regions in one pass.
    pub retry_ceiling: u32,
    pub window: Duration,
    pub tolerance: f32,
}

impl Default for ConvergenceSettings {
    fn default() -> Self {
        Self::from(&RenderConfig::default())
    }
}

impl From<&RenderConfig> for ConvergenceSettings {
    fn from(config: &RenderConfig) -> Self {
        Self {
            retry_ceiling: config.measure_retry_ceiling,
            window: config.stabilization_window(),
            tolerance: config.height_tolerance_px,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Phase {
    Measuring,
    /// A new total is waiting out the stabilization window.
    Unstable { candidate: f32 },
    /// The listener has the current total.
    Stable { reported: f32 },
}

/// Owner's handle on a running convergence task. Dropping it cancels the task.
#[derive(Debug)]
pub struct RegionHandle {
    section: usize,
    triggers: async_channel::Sender<Trigger>,
    disposed: Arc<AtomicBool>,
    phase: watch::Receiver<Phase>,
    task: Option<JoinHandle<()>>,
}

impl RegionHandle {
    pub fn section(&self) -> usize {
        self.section
    }

    /// Queues a trigger. Returns `false` if the task is gone.
    pub fn trigger(&self, trigger: Trigger) -> bool {
        self.triggers.try_send(trigger).is_ok()
    }

    pub fn remeasure(&self, keys: Vec<RegionKey>) -> bool {
        self.trigger(Trigger::Remeasure(keys))
    }

    pub fn update_inputs(&self, inputs: SectionInputs) -> bool {
        self.trigger(Trigger::InputsChanged(Box::new(inputs)))
    }

    pub fn merge_external(&self, entries: Vec<(RegionKey, f32)>) -> bool {
        self.trigger(Trigger::External(entries))
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Cancels the task. Equivalent to dropping the handle.
    pub fn dispose(self) {}
}

impl Drop for RegionHandle {
    fn drop(&mut self) {
        self.disposed.store(true, Ordering::Release);
        self.triggers.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Starts converging `inputs`. Images referenced by the section are requested
/// from `cache` so their completion can drive re-measurement.
///
/// Must be called from within a tokio runtime.
pub fn spawn_convergence(
    inputs: SectionInputs,
    surface: Arc<dyn HostSurface>,
    listener: Arc<dyn HeightListener>,
    heights: MeasuredHeights,
    cache: ResourceCache,
    settings: ConvergenceSettings,
) -> RegionHandle {
    // Subscribe before requesting so no completion is missed
    let events = cache.subscribe();
    let (triggers_tx, triggers_rx) = async_channel::unbounded();
    let (phase_tx, phase_rx) = watch::channel(Phase::Measuring);
    let disposed = Arc::new(AtomicBool::new(false));
    let section = inputs.index;

    let mut convergence = Convergence {
        regions: Vec::new(),
        dependencies: HashSet::new(),
        inputs,
        surface,
        listener,
        heights,
        cache,
        settings,
        disposed: disposed.clone(),
        phase: phase_tx,
        last_reported: None,
        candidate: None,
    };
    convergence.refresh_inputs();

    let task = tokio::spawn(convergence.run(triggers_rx, events));
    RegionHandle {
        section,
        triggers: triggers_tx,
        disposed,
        phase: phase_rx,
        task: Some(task),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Ignore,
    Recompute,
    Measure,
}

struct Convergence {
    inputs: SectionInputs,
    regions: Vec<RegionKey>,
    dependencies: HashSet<ResourceKey>,
    surface: Arc<dyn HostSurface>,
    listener: Arc<dyn HeightListener>,
    heights: MeasuredHeights,
    cache: ResourceCache,
    settings: ConvergenceSettings,
    disposed: Arc<AtomicBool>,
    phase: watch::Sender<Phase>,
    last_reported: Option<f32>,
    /// Candidate total and the end of its stabilization window.
    candidate: Option<(f32, Instant)>,
}

impl Convergence {
    async fn run(
        mut self,
        triggers: async_channel::Receiver<Trigger>,
        mut events: broadcast::Receiver<ResourceEvent>,
    ) {
        let section = self.inputs.index;
        let mut measure = true;
        let mut recompute = false;
        let mut events_open = true;

        loop {
            if measure {
                measure = false;
                recompute = true;
                self.measure_pass().await;
            }
            if self.is_disposed() {
                return;
            }
            if recompute {
                recompute = false;
                self.evaluate();
            }

            let deadline = self.candidate.map(|(_, deadline)| deadline);
            let action = tokio::select! {
                trigger = triggers.recv() => match trigger {
                    Ok(trigger) => self.apply(trigger),
                    Err(_) => {
                        debug!("[CONVERGE] Section {} handle closed, stopping", section);
                        return;
                    }
                },
                event = events.recv(), if events_open => match event {
                    Ok(event) => match self.dependency_trigger(&event) {
                        Some(trigger) => self.apply(trigger),
                        None => Action::Ignore,
                    },
                    Err(RecvError::Lagged(missed)) => self.catch_up(missed),
                    Err(RecvError::Closed) => {
                        events_open = false;
                        Action::Ignore
                    }
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if self.is_disposed() {
                        return;
                    }
                    self.settle();
                    Action::Ignore
                }
            };

            match action {
                Action::Measure => measure = true,
                Action::Recompute => recompute = true,
                Action::Ignore => {}
            }
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn set_phase(&self, phase: Phase) {
        self.phase.send_replace(phase);
    }

    /// Recomputes trackable regions and image dependencies from the inputs,
    /// requesting any image the cache has not seen.
    fn refresh_inputs(&mut self) {
        self.regions = self.inputs.trackable_regions();
        self.dependencies = self
            .inputs
            .image_sources()
            .into_iter()
            .filter_map(|src| {
                let key = self.cache.key_for(src).ok();
                // Failed lookups render as the error indicator; nothing to wait for
                let _ = self.cache.request(src);
                key
            })
            .collect();
    }

    /// Resource events were dropped. Any dependency may have loaded or been
    /// evicted in between.
    fn catch_up(&mut self, missed: u64) -> Action {
        let section = self.inputs.index;
        warn!(
            "[CONVERGE] Section {} missed {} resource event(s), re-measuring",
            section, missed
        );
        for key in &self.dependencies {
            if self.cache.state_of(key) == ResourceState::Absent {
                let _ = self.cache.request_key(key.clone());
            }
        }
        self.heights.invalidate([&RegionKey::Grid { section }]);
        Action::Measure
    }

    fn dependency_trigger(&self, event: &ResourceEvent) -> Option<Trigger> {
        let ResourceEvent::StateChanged { key, state } = event else {
            return None;
        };
        if !self.dependencies.contains(key) {
            return None;
        }
        match state {
            ResourceState::Loaded => Some(Trigger::ResourceLoaded(key.clone())),
            ResourceState::Failed => Some(Trigger::ResourceFailed(key.clone())),
            ResourceState::Absent => Some(Trigger::ResourceEvicted(key.clone())),
            ResourceState::Loading => None,
        }
    }

    fn apply(&mut self, trigger: Trigger) -> Action {
        let section = self.inputs.index;
        match trigger {
            Trigger::ResourceLoaded(key) | Trigger::ResourceFailed(key) => {
                if !self.dependencies.contains(&key) {
                    return Action::Ignore;
                }
                debug!("[CONVERGE] Section {} re-measuring after {}", section, key);
                // An out-of-band grid height predates the image
                self.heights.invalidate([&RegionKey::Grid { section }]);
                Action::Measure
            }
            Trigger::ResourceEvicted(key) => {
                if !self.dependencies.contains(&key) {
                    return Action::Ignore;
                }
                debug!("[CONVERGE] Section {} re-requesting evicted {}", section, key);
                let _ = self.cache.request_key(key);
                self.heights.invalidate([&RegionKey::Grid { section }]);
                Action::Measure
            }
            Trigger::InputsChanged(inputs) => {
                self.heights.invalidate_section(section);
                if inputs.index != section {
                    self.heights.invalidate_section(inputs.index);
                }
                self.inputs = *inputs;
                self.refresh_inputs();
                Action::Measure
            }
            Trigger::Remeasure(keys) => {
                self.heights.invalidate(&keys);
                Action::Measure
            }
            Trigger::External(entries) => {
                self.heights.merge(entries);
                Action::Recompute
            }
        }
    }

    async fn measure_pass(&mut self) {
        self.set_phase(Phase::Measuring);
        let section = self.inputs.index;
        let mut paints = 0;

        let readings = loop {
            let mut readings = HashMap::with_capacity(self.regions.len());
            let mut unresolved = Vec::new();
            for key in &self.regions {
                let height = self.surface.measure_height(key);
                if height.is_finite() && height > 0.0 {
                    readings.insert(key.clone(), height);
                } else {
                    unresolved.push(key.clone());
                }
            }

            if unresolved.is_empty() {
                break readings;
            }
            if paints >= self.settings.retry_ceiling {
                let note = ConvergenceNote::MeasurementTimeout {
                    section,
                    attempts: paints,
                    unresolved,
                };
                warn!("[CONVERGE] {}", note);
                break readings;
            }

            trace!(
                "[CONVERGE] Section {}: {} region(s) not laid out, waiting for paint",
                section,
                unresolved.len()
            );
            self.surface.next_paint().await;
            paints += 1;
            if self.is_disposed() {
                return;
            }
        };

        let changed = self.heights.merge(readings);
        trace!("[CONVERGE] Section {}: {} height(s) changed", section, changed);
    }

    fn total_height(&self) -> f32 {
        let measured = self.heights.snapshot();
        self.inputs
            .total_height(&measured, &CacheImages(&self.cache))
    }

    fn evaluate(&mut self) {
        let total = self.total_height();
        let tolerance = self.settings.tolerance;

        if let Some(reported) = self.last_reported
            && (total - reported).abs() <= tolerance
        {
            self.candidate = None;
            self.set_phase(Phase::Stable { reported });
            return;
        }

        let candidate = match self.candidate {
            // Same value: let the running window finish
            Some((pending, deadline)) if (total - pending).abs() <= tolerance => (pending, deadline),
            _ => (total, Instant::now() + self.settings.window),
        };
        self.candidate = Some(candidate);
        self.set_phase(Phase::Unstable {
            candidate: candidate.0,
        });
    }

    fn settle(&mut self) {
        let Some((candidate, _)) = self.candidate.take() else {
            return;
        };
        let total = self.total_height();
        let tolerance = self.settings.tolerance;

        if (total - candidate).abs() > tolerance {
            self.candidate = Some((total, Instant::now() + self.settings.window));
            self.set_phase(Phase::Unstable { candidate: total });
            return;
        }
        if let Some(reported) = self.last_reported
            && (total - reported).abs() <= tolerance
        {
            self.set_phase(Phase::Stable { reported });
            return;
        }

        info!(
            "[CONVERGE] Section {} stabilized at {:.1}px",
            self.inputs.index, total
        );
        self.last_reported = Some(total);
        self.set_phase(Phase::Stable { reported: total });
        self.listener.on_height_stabilized(total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use tabula_executor::RequestScheduler;
    use tabula_layout::{LayoutConfig, TextEstimator};
    use tabula_resource::CacheOptions;
    use tabula_traits::InMemoryFetcher;
    use tabula_types::{Cell, Section, Table};

    const FRAME: Duration = Duration::from_millis(16);

    /// Reports a fixed height per region (default 20) and counts paints.
    struct FakeSurface {
        heights: Mutex<HashMap<RegionKey, f32>>,
        paints: AtomicUsize,
    }

    impl FakeSurface {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                heights: Mutex::new(HashMap::new()),
                paints: AtomicUsize::new(0),
            })
        }

        fn set(&self, key: RegionKey, height: f32) {
            self.heights.lock().unwrap().insert(key, height);
        }
    }

    #[async_trait]
    impl HostSurface for FakeSurface {
        fn measure_height(&self, region: &RegionKey) -> f32 {
            self.heights.lock().unwrap().get(region).copied().unwrap_or(20.0)
        }

        async fn next_paint(&self) {
            self.paints.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(FRAME).await;
        }
    }

    fn recorder() -> (Arc<dyn HeightListener>, Arc<Mutex<Vec<f32>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let listener: Arc<dyn HeightListener> =
            Arc::new(move |height: f32| sink.lock().unwrap().push(height));
        (listener, seen)
    }

    fn text_section() -> SectionInputs {
        let section = Section {
            title: Some("Weekly rewards".into()),
            paragraphs: vec!["Log in daily.".into(), "Streaks reset on Monday.".into()],
            table: None,
        };
        SectionInputs::new(0, section, 320.0, LayoutConfig::default())
    }

    fn cache() -> ResourceCache {
        ResourceCache::new(
            Arc::new(InMemoryFetcher::new()),
            RequestScheduler::default(),
            CacheOptions::default(),
        )
    }

    fn spawn(
        inputs: SectionInputs,
        surface: Arc<FakeSurface>,
    ) -> (RegionHandle, Arc<Mutex<Vec<f32>>>, MeasuredHeights) {
        let _ = env_logger::builder().is_test(true).try_init();
        let (listener, seen) = recorder();
        let heights = MeasuredHeights::new();
        let handle = spawn_convergence(
            inputs,
            surface,
            listener,
            heights.clone(),
            cache(),
            ConvergenceSettings::default(),
        );
        (handle, seen, heights)
    }

    // padding 16 + three 20 px blocks + two 12 px gaps + padding 16
    const THREE_BLOCKS: f32 = 16.0 + 60.0 + 24.0 + 16.0;

    #[tokio::test(start_paused = true)]
    async fn test_stable_heights_are_reported_once() {
        let surface = FakeSurface::new();
        let (handle, seen, heights) = spawn(text_section(), surface);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(handle.remeasure(vec![]));
        assert!(handle.remeasure(vec![RegionKey::Title { section: 0 }]));
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(*seen.lock().unwrap(), vec![THREE_BLOCKS]);
        assert_eq!(handle.phase(), Phase::Stable { reported: THREE_BLOCKS });
        assert_eq!(heights.get(&RegionKey::Title { section: 0 }), Some(20.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_value_must_survive_the_window() {
        let surface = FakeSurface::new();
        let (handle, seen, _) = spawn(text_section(), surface.clone());

        // Within the 80 ms window the title grows
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(seen.lock().unwrap().is_empty());
        surface.set(RegionKey::Title { section: 0 }, 45.0);
        handle.remeasure(vec![RegionKey::Title { section: 0 }]);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(*seen.lock().unwrap(), vec![THREE_BLOCKS + 25.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_height_region_falls_back_after_ceiling() {
        let surface = FakeSurface::new();
        surface.set(RegionKey::Paragraph { section: 0, index: 1 }, 0.0);
        let inputs = text_section();
        let (_handle, seen, heights) = spawn(inputs.clone(), surface.clone());

        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(surface.paints.load(Ordering::SeqCst), 5);
        assert_eq!(heights.get(&RegionKey::Paragraph { section: 0, index: 1 }), None);

        let estimate = TextEstimator::for_body(&inputs.layout).height(
            "Streaks reset on Monday.",
            inputs.width,
            false,
        );
        let emitted = seen.lock().unwrap().clone();
        assert_eq!(emitted.len(), 1);
        assert!((emitted[0] - (THREE_BLOCKS - 20.0 + estimate)).abs() < 1e-3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_the_handle_cancels_reporting() {
        let surface = FakeSurface::new();
        let (handle, seen, _) = spawn(text_section(), surface);

        // First pass done, candidate waiting out the window
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(handle.phase(), Phase::Unstable { candidate: THREE_BLOCKS });
        drop(handle);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_heights_are_merged_not_replaced() {
        let surface = FakeSurface::new();
        let (handle, seen, heights) = spawn(text_section(), surface);
        heights.merge([(RegionKey::Custom("banner".into()), 90.0)]);

        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.merge_external(vec![(RegionKey::Title { section: 0 }, 50.0)]);
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(*seen.lock().unwrap(), vec![THREE_BLOCKS, THREE_BLOCKS + 30.0]);
        assert_eq!(heights.get(&RegionKey::Custom("banner".into())), Some(90.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_input_change_discards_section_measurements() {
        let surface = FakeSurface::new();
        let (handle, seen, heights) = spawn(text_section(), surface);
        tokio::time::sleep(Duration::from_millis(200)).await;

        let mut inputs = text_section();
        inputs.section.paragraphs.pop();
        handle.update_inputs(inputs);
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec![THREE_BLOCKS, 16.0 + 40.0 + 12.0 + 16.0]
        );
        assert_eq!(heights.get(&RegionKey::Paragraph { section: 0, index: 1 }), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missed_events_discard_out_of_band_grid_height() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut inputs = text_section();
        inputs.section.table = Some(Table::new(vec![vec![Cell::text("Gold")]]));
        let cache = cache();
        let heights = MeasuredHeights::new();
        let (listener, seen) = recorder();
        let _handle = spawn_convergence(
            inputs,
            FakeSurface::new(),
            listener,
            heights.clone(),
            cache.clone(),
            ConvergenceSettings::default(),
        );
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(seen.lock().unwrap().len(), 1);

        let grid = RegionKey::Grid { section: 0 };
        heights.merge([(grid.clone(), 300.0)]);
        // Overflow the status broadcast before the task gets to run
        let flood = cache.prefetch((0..300).map(|i| format!("https://cdn.example.com/{}.png", i)));
        assert_eq!(flood.len(), 300);
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(heights.get(&grid), None);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
