//! # tabula-core
//!
//! Ties the image cache and the grid engine to a host surface.
//!
//! - **config**: [`RenderConfig`], loaded from `tabula.toml` and `TABULA__*`
//! - **heights**: the shared [`MeasuredHeights`] map
//! - **section**: section height aggregation with estimate fallbacks
//! - **convergence**: the per-section measure/stabilize loop
//! - **session**: [`RenderSession`], the entry point
//!
//! The host supplies a [`HostSurface`] that can measure regions and signal
//! paints, and a [`HeightListener`] that receives stabilized heights.

// Re-export foundation crates
pub use tabula_traits as traits;
pub use tabula_types as types;

// Re-export algorithm and platform crates
pub use tabula_executor as executor;
pub use tabula_layout as layout;
pub use tabula_resource as resource;

pub mod config;
pub mod convergence;
pub mod error;
pub mod heights;
pub mod section;
pub mod session;

pub use config::RenderConfig;
pub use convergence::{ConvergenceSettings, Phase, RegionHandle, Trigger, spawn_convergence};
pub use error::{ConfigError, ConvergenceNote, CoreError};
pub use heights::MeasuredHeights;
pub use section::{CacheImages, SectionInputs};
pub use session::RenderSession;

pub use traits::{HeightListener, HostSurface, ResourceError, ResourceFetcher};
pub use types::{Cell, CellContent, Page, RegionKey, ResourceKey, Section, Size, Table};
