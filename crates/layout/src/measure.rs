//! Cell measurement strategies for the grid engine.

use crate::LayoutConfig;
use crate::estimate::TextEstimator;
use std::collections::HashMap;
use tabula_types::{Cell, CellContent, RegionKey, Size};

/// Where a cell landed in the grid, after occupancy resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridPosition {
    pub row: usize,
    pub col: usize,
}

/// Reports the height a cell needs when laid out at `width`.
pub trait CellMeasure {
    fn measure(&self, cell: &Cell, at: GridPosition, width: f32) -> f32;
}

impl<F> CellMeasure for F
where
    F: Fn(&Cell, GridPosition, f32) -> f32,
{
    fn measure(&self, cell: &Cell, at: GridPosition, width: f32) -> f32 {
        self(cell, at, width)
    }
}

/// What is currently known about an image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImageStatus {
    /// Decoded, with its natural size.
    Loaded(Size),
    /// Not yet requested, or still loading.
    Pending,
    Failed,
}

/// Answers [`ImageStatus`] queries by source URL.
pub trait ImageLookup {
    fn image_status(&self, src: &str) -> ImageStatus;
}

impl ImageLookup for HashMap<String, ImageStatus> {
    fn image_status(&self, src: &str) -> ImageStatus {
        self.get(src).copied().unwrap_or(ImageStatus::Pending)
    }
}

/// Sizes image cells from what the image lookup knows.
pub struct ImageSizer<'a, L: ?Sized> {
    lookup: &'a L,
    padding: f32,
    max_scale: f32,
    placeholder_height: f32,
    error_height: f32,
}

impl<L: ?Sized> Clone for ImageSizer<'_, L> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<L: ?Sized> Copy for ImageSizer<'_, L> {}

impl<'a, L: ImageLookup + ?Sized> ImageSizer<'a, L> {
    pub fn new(lookup: &'a L, config: &LayoutConfig) -> Self {
        Self {
            lookup,
            padding: config.cell_padding,
            max_scale: config.image_max_scale,
            placeholder_height: config.image_placeholder_height,
            error_height: config.image_error_height,
        }
    }

    /// A loaded image keeps its aspect ratio and is scaled to the content
    /// width (never beyond `max_scale`). A pending image reserves the
    /// placeholder height; a failed one the error indicator height.
    pub fn height(&self, src: &str, width: f32) -> f32 {
        match self.lookup.image_status(src) {
            ImageStatus::Loaded(natural) => {
                let content_width = (width - 2.0 * self.padding).max(0.0);
                natural.fit_width(content_width, self.max_scale).height + 2.0 * self.padding
            }
            ImageStatus::Pending => self.placeholder_height,
            ImageStatus::Failed => self.error_height,
        }
    }
}

/// Deterministic estimate for any cell: text by wrap estimation, images by
/// their known size.
pub struct CellEstimator<'a, L: ?Sized> {
    pub text: TextEstimator,
    pub images: ImageSizer<'a, L>,
}

impl<'a, L: ImageLookup + ?Sized> CellEstimator<'a, L> {
    pub fn new(lookup: &'a L, config: &LayoutConfig) -> Self {
        Self {
            text: TextEstimator::for_cells(config),
            images: ImageSizer::new(lookup, config),
        }
    }
}

impl<L: ImageLookup + ?Sized> CellMeasure for CellEstimator<'_, L> {
    fn measure(&self, cell: &Cell, _at: GridPosition, width: f32) -> f32 {
        match &cell.content {
            CellContent::Text(text) => self.text.height(text, width, cell.format.bold),
            CellContent::Image(image) => self.images.height(&image.src, width),
        }
    }
}

/// Prefers a height the host surface measured for the cell's region and
/// falls back to `fallback` otherwise.
///
/// A measured height of zero means "not laid out yet" and is ignored.
#[derive(Debug, Clone, Copy)]
pub struct MeasuredOr<'a, E> {
    section: usize,
    measured: &'a HashMap<RegionKey, f32>,
    fallback: E,
}

impl<'a, E> MeasuredOr<'a, E> {
    pub fn new(section: usize, measured: &'a HashMap<RegionKey, f32>, fallback: E) -> Self {
        Self {
            section,
            measured,
            fallback,
        }
    }
}

impl<E: CellMeasure> CellMeasure for MeasuredOr<'_, E> {
    fn measure(&self, cell: &Cell, at: GridPosition, width: f32) -> f32 {
        let key = RegionKey::Cell {
            section: self.section,
            row: at.row,
            col: at.col,
        };
        match self.measured.get(&key) {
            Some(&h) if h > 0.0 => h,
            _ => self.fallback.measure(cell, at, width),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LayoutConfig {
        LayoutConfig {
            cell_padding: 10.0,
            image_placeholder_height: 120.0,
            image_error_height: 48.0,
            image_max_scale: 1.0,
            ..LayoutConfig::default()
        }
    }

    #[test]
    fn test_image_sizes_follow_status() {
        let mut images = HashMap::new();
        images.insert("wide.png".to_string(), ImageStatus::Loaded(Size::new(400.0, 100.0)));
        images.insert("tiny.png".to_string(), ImageStatus::Loaded(Size::new(20.0, 40.0)));
        images.insert("gone.png".to_string(), ImageStatus::Failed);
        let sizer = ImageSizer::new(&images, &config());

        // 400x100 scaled into 200 px of content width
        assert_eq!(sizer.height("wide.png", 220.0), 50.0 + 20.0);
        // Never upscaled
        assert_eq!(sizer.height("tiny.png", 220.0), 40.0 + 20.0);
        assert_eq!(sizer.height("gone.png", 200.0), 48.0);
        assert_eq!(sizer.height("unknown.png", 200.0), 120.0);
    }

    #[test]
    fn test_cell_estimator_dispatches_on_content() {
        let images: HashMap<String, ImageStatus> = HashMap::new();
        let estimator = CellEstimator::new(&images, &config());
        let at = GridPosition { row: 0, col: 0 };

        assert_eq!(estimator.measure(&Cell::image("a.png"), at, 200.0), 120.0);
        let text = estimator.measure(&Cell::text("hi"), at, 200.0);
        assert_eq!(text, estimator.text.height("hi", 200.0, false));
    }

    #[test]
    fn test_measured_heights_take_precedence() {
        let mut measured = HashMap::new();
        measured.insert(RegionKey::Cell { section: 1, row: 0, col: 2 }, 77.0);
        measured.insert(RegionKey::Cell { section: 1, row: 0, col: 3 }, 0.0);
        let fallback = |_: &Cell, _: GridPosition, _: f32| 5.0_f32;
        let measure = MeasuredOr::new(1, &measured, fallback);
        let cell = Cell::text("x");

        assert_eq!(measure.measure(&cell, GridPosition { row: 0, col: 2 }, 50.0), 77.0);
        // Zero means not laid out yet
        assert_eq!(measure.measure(&cell, GridPosition { row: 0, col: 3 }, 50.0), 5.0);
        assert_eq!(measure.measure(&cell, GridPosition { row: 4, col: 4 }, 50.0), 5.0);

        let other_section = MeasuredOr::new(0, &measured, fallback);
        assert_eq!(other_section.measure(&cell, GridPosition { row: 0, col: 2 }, 50.0), 5.0);
    }
}
