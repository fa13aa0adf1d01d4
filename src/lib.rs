//! # tabula
//!
//! Image-aware grid layout for rendering hosts. Images are fetched with a
//! bounded, retrying scheduler and cached per session; sections are laid out
//! on an occupancy grid and their heights re-measured until they stop
//! changing.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tabula::{RenderConfig, RenderSession};
//!
//! # async fn attach(surface: Arc<dyn tabula::HostSurface>, page: tabula::Page) -> Result<(), tabula::TabulaError> {
//! let session = RenderSession::new(RenderConfig::load()?)?;
//! let inputs = session.inputs(0, page.sections[0].clone(), 640.0);
//! let handle = session.attach_section(
//!     inputs,
//!     surface,
//!     Arc::new(|height: f32| println!("section is {height}px tall")),
//! );
//! // Dropping the handle stops the callbacks
//! drop(handle);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod report;

pub use error::TabulaError;
pub use report::{ImageReport, PageReport, SectionReport, layout_page};

pub use tabula_core::{
    CacheImages, ConfigError, ConvergenceNote, ConvergenceSettings, CoreError, MeasuredHeights,
    Phase, RegionHandle, RenderConfig, RenderSession, SectionInputs, Trigger,
};
pub use tabula_executor::{RequestScheduler, SchedulerError};
pub use tabula_layout::{
    CellEstimator, CellMeasure, CellRect, GridEngine, GridLayout, GridPosition, ImageLookup,
    ImageStatus, LayoutConfig, LayoutDiagnostic, MeasuredOr, TextEstimator,
};
pub use tabula_resource::{
    CacheOptions, DefaultFetcher, FilesystemFetcher, HttpFetcher, ImageResource, LoadOutcome,
    Lookup, PendingLoad, ResourceCache, ResourceEvent, ResourceState, RetryPolicy,
    RetryingFetcher,
};
pub use tabula_traits::{
    FetchedResource, HeightListener, HostSurface, InMemoryFetcher, ResourceError, ResourceFetcher,
};
pub use tabula_types::{
    Cell, CellContent, CellFormat, ImageRef, Page, Rect, RegionKey, ResourceKey, Section, Size,
    Table,
};
