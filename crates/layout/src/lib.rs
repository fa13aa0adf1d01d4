//! Grid layout for tabula sections.
//!
//! [`GridEngine::layout`] is a pure function of its inputs: cells with spans,
//! a column count, the available width and a [`CellMeasure`] strategy.
//! Strategies range from pure estimation ([`CellEstimator`]) to host-measured
//! heights with an estimate fallback ([`MeasuredOr`]).

pub mod config;
pub mod estimate;
pub mod grid;
pub mod measure;

pub use config::LayoutConfig;
pub use estimate::TextEstimator;
pub use grid::{CellRect, GridEngine, GridLayout, LayoutDiagnostic};
pub use measure::{
    CellEstimator, CellMeasure, GridPosition, ImageLookup, ImageSizer, ImageStatus, MeasuredOr,
};
