//! Section height aggregation.
//!
//! A section stacks up to three kinds of blocks: a title, paragraphs and a
//! grid. Its height is
//!
//! ```text
//! padding_top + Σ block heights + gap × (blocks − 1) + padding_bottom
//! ```
//!
//! where every block uses its measured height when the map has one and a
//! deterministic estimate otherwise.

use std::collections::HashMap;
use tabula_layout::{
    CellEstimator, GridEngine, GridLayout, GridPosition, ImageLookup, ImageStatus, LayoutConfig,
    MeasuredOr, TextEstimator,
};
use tabula_resource::{ResourceCache, ResourceState};
use tabula_types::{Cell, CellContent, RegionKey, Section};

/// Everything that determines a section's layout. A change to any of it is
/// an input change for the convergence loop.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionInputs {
    /// Position of the section on its page; scopes its region keys.
    pub index: usize,
    pub section: Section,
    /// Content width available to the section.
    pub width: f32,
    pub layout: LayoutConfig,
}

impl SectionInputs {
    pub fn new(index: usize, section: Section, width: f32, layout: LayoutConfig) -> Self {
        Self {
            index,
            section,
            width,
            layout,
        }
    }

    /// Regions the host surface is asked to measure: the title, every
    /// paragraph and every text cell. Image cells are sized from the
    /// decoded image instead.
    pub fn trackable_regions(&self) -> Vec<RegionKey> {
        let section = self.index;
        let mut regions = Vec::new();

        if self.section.title.is_some() {
            regions.push(RegionKey::Title { section });
        }
        regions.extend(
            (0..self.section.paragraphs.len()).map(|index| RegionKey::Paragraph { section, index }),
        );

        if let Some(table) = &self.section.table {
            // Positions come from occupancy, which does not depend on heights
            let layout = GridEngine::new(0.0).layout(&table.rows, None, self.width, &zero_height);
            for placed in &layout.cells {
                let cell = &table.rows[placed.row][placed.index];
                if matches!(cell.content, CellContent::Text(_)) {
                    regions.push(RegionKey::Cell {
                        section,
                        row: placed.row,
                        col: placed.col,
                    });
                }
            }
        }
        regions
    }

    /// Image sources referenced by the section's grid, in document order.
    pub fn image_sources(&self) -> Vec<&str> {
        self.section
            .table
            .iter()
            .flat_map(|table| table.image_refs())
            .map(|image| image.src.as_str())
            .collect()
    }

    /// Lays out the grid, preferring measured cell heights.
    pub fn grid_layout<L>(&self, measured: &HashMap<RegionKey, f32>, images: &L) -> Option<GridLayout>
    where
        L: ImageLookup + ?Sized,
    {
        let table = self.section.table.as_ref()?;
        let estimator = CellEstimator::new(images, &self.layout);
        let measure = MeasuredOr::new(self.index, measured, estimator);
        let engine = GridEngine::new(self.layout.min_row_height);
        Some(engine.layout(&table.rows, None, self.width, &measure))
    }

    /// Total section height from measured heights with estimate fallbacks.
    pub fn total_height<L>(&self, measured: &HashMap<RegionKey, f32>, images: &L) -> f32
    where
        L: ImageLookup + ?Sized,
    {
        let section = self.index;
        let body = TextEstimator::for_body(&self.layout);
        let measured_or = |key: RegionKey, estimate: &dyn Fn() -> f32| match measured.get(&key) {
            Some(&h) if h > 0.0 => h,
            _ => estimate(),
        };

        let mut blocks = Vec::new();
        if let Some(title) = &self.section.title {
            let estimator = body.scaled(self.layout.title_scale);
            blocks.push(measured_or(RegionKey::Title { section }, &|| {
                estimator.height(title, self.width, true)
            }));
        }
        for (index, paragraph) in self.section.paragraphs.iter().enumerate() {
            blocks.push(measured_or(RegionKey::Paragraph { section, index }, &|| {
                body.height(paragraph, self.width, false)
            }));
        }
        if self.section.table.is_some() {
            blocks.push(measured_or(RegionKey::Grid { section }, &|| {
                self.grid_layout(measured, images)
                    .map(|grid| grid.total_height)
                    .unwrap_or(0.0)
            }));
        }

        let gaps = blocks.len().saturating_sub(1) as f32;
        self.layout.section_padding_top
            + blocks.iter().sum::<f32>()
            + self.layout.section_gap * gaps
            + self.layout.section_padding_bottom
    }
}

fn zero_height(_: &Cell, _: GridPosition, _: f32) -> f32 {
    0.0
}

/// Reads image status straight from a [`ResourceCache`].
#[derive(Debug, Clone, Copy)]
pub struct CacheImages<'a>(pub &'a ResourceCache);

impl ImageLookup for CacheImages<'_> {
    fn image_status(&self, src: &str) -> ImageStatus {
        let Ok(key) = self.0.key_for(src) else {
            return ImageStatus::Failed;
        };
        match self.0.state_of(&key) {
            ResourceState::Loaded => self
                .0
                .get(key.as_str())
                .map(|image| ImageStatus::Loaded(image.size()))
                .unwrap_or(ImageStatus::Pending),
            ResourceState::Failed => ImageStatus::Failed,
            ResourceState::Absent | ResourceState::Loading => ImageStatus::Pending,
        }
    }
}
