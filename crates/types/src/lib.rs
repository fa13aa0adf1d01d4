pub mod color;
pub mod document;
pub mod geometry;
pub mod ids;

pub use color::Color;
pub use document::{Cell, CellContent, CellFormat, ImageRef, Page, Section, Table};
pub use geometry::{Rect, Size};
pub use ids::{RegionKey, ResourceKey};
