//! The document model consumed by layout: pages of sections, each with an
//! optional title, free paragraphs and an optional grid of cells.
//!
//! Cells arrive in the loose shape produced by the spreadsheet importer
//! (`value`, `is_image`, span counts, formatting flags) and are resolved
//! into a tagged [`CellContent`] exactly once, at deserialization.

use crate::color::Color;
use serde::{Deserialize, Serialize};

const IMAGE_EXTENSIONS: [&str; 5] = [".png", ".jpg", ".jpeg", ".gif", ".webp"];
const IMAGE_PREFIX: &str = "image:";

/// A reference to an image asset by URL or relative path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef {
    pub src: String,
}

impl ImageRef {
    pub fn new(src: impl Into<String>) -> Self {
        Self { src: src.into() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellContent {
    Text(String),
    Image(ImageRef),
}

impl CellContent {
    /// Classifies a raw cell value: an explicit `image:` prefix or a known
    /// image file extension marks an image reference, anything else is text.
    pub fn classify(value: &str, is_image: bool) -> CellContent {
        let trimmed = value.trim();
        let has_prefix = trimmed
            .get(..IMAGE_PREFIX.len())
            .is_some_and(|p| p.eq_ignore_ascii_case(IMAGE_PREFIX));
        if has_prefix {
            return CellContent::Image(ImageRef::new(trimmed[IMAGE_PREFIX.len()..].trim()));
        }
        let lower = trimmed.to_lowercase();
        if !trimmed.is_empty()
            && (is_image || IMAGE_EXTENSIONS.iter().any(|ext| lower.contains(ext)))
        {
            return CellContent::Image(ImageRef::new(trimmed));
        }
        CellContent::Text(value.to_string())
    }

    pub fn as_image(&self) -> Option<&ImageRef> {
        match self {
            CellContent::Image(image) => Some(image),
            CellContent::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellFormat {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default, rename = "center")]
    pub centered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

/// One table cell. Spans are always at least 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawCell", into = "RawCell")]
pub struct Cell {
    pub content: CellContent,
    pub rowspan: usize,
    pub colspan: usize,
    pub format: CellFormat,
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            content: CellContent::Text(value.into()),
            rowspan: 1,
            colspan: 1,
            format: CellFormat::default(),
        }
    }

    pub fn image(src: impl Into<String>) -> Self {
        Self {
            content: CellContent::Image(ImageRef::new(src)),
            rowspan: 1,
            colspan: 1,
            format: CellFormat::default(),
        }
    }

    pub fn with_span(mut self, rowspan: usize, colspan: usize) -> Self {
        self.rowspan = rowspan.max(1);
        self.colspan = colspan.max(1);
        self
    }

    pub fn bold(mut self) -> Self {
        self.format.bold = true;
        self
    }
}

/// Wire shape of a cell as emitted by the importer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawCell {
    #[serde(default)]
    value: String,
    #[serde(default)]
    is_image: bool,
    #[serde(default = "one")]
    rowspan: usize,
    #[serde(default = "one")]
    colspan: usize,
    #[serde(flatten)]
    format: CellFormat,
}

fn one() -> usize {
    1
}

impl From<RawCell> for Cell {
    fn from(raw: RawCell) -> Self {
        Cell {
            content: CellContent::classify(&raw.value, raw.is_image),
            rowspan: raw.rowspan.max(1),
            colspan: raw.colspan.max(1),
            format: raw.format,
        }
    }
}

impl From<Cell> for RawCell {
    fn from(cell: Cell) -> Self {
        let (value, is_image) = match cell.content {
            CellContent::Text(text) => (text, false),
            CellContent::Image(image) => (image.src, true),
        };
        RawCell {
            value,
            is_image,
            rowspan: cell.rowspan,
            colspan: cell.colspan,
            format: cell.format,
        }
    }
}

/// A grid of cells. Rows may be empty when every position in them is
/// covered by a span from an earlier row; they are kept so row indices
/// match the source sheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    #[serde(default)]
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(rows: Vec<Vec<Cell>>) -> Self {
        Self { rows }
    }

    /// The widest row, measured in summed column spans.
    pub fn column_count(&self) -> usize {
        self.rows
            .iter()
            .map(|row| row.iter().map(|c| c.colspan).sum::<usize>())
            .max()
            .unwrap_or(0)
    }

    pub fn image_refs(&self) -> impl Iterator<Item = &ImageRef> {
        self.rows
            .iter()
            .flat_map(|row| row.iter())
            .filter_map(|cell| cell.content.as_image())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub paragraphs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<Table>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub sections: Vec<Section>,
}
