//! Text height estimation from display width.
//!
//! The host surface is the authority on wrapped text height; this estimate
//! fills in until it has measured, and permanently for regions it never
//! manages to lay out.

use crate::LayoutConfig;
use unicode_width::UnicodeWidthStr;

/// Bold glyphs are assumed this much wider than regular ones.
const BOLD_WIDTH_FACTOR: f32 = 1.05;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextEstimator {
    pub font_size: f32,
    pub line_height: f32,
    pub glyph_width_ratio: f32,
    /// Added above and below the text block, and subtracted from each side
    /// of the available width.
    pub padding: f32,
}

impl TextEstimator {
    /// Estimator for grid cell text.
    pub fn for_cells(config: &LayoutConfig) -> Self {
        Self {
            font_size: config.font_size,
            line_height: config.line_height,
            glyph_width_ratio: config.glyph_width_ratio,
            padding: config.cell_padding,
        }
    }

    /// Estimator for free-flowing section text (no cell padding).
    pub fn for_body(config: &LayoutConfig) -> Self {
        Self {
            padding: 0.0,
            ..Self::for_cells(config)
        }
    }

    pub fn scaled(self, factor: f32) -> Self {
        Self {
            font_size: self.font_size * factor,
            ..self
        }
    }

    pub fn line_px(&self) -> f32 {
        self.font_size * self.line_height
    }

    /// Number of lines `text` wraps to within `width`.
    ///
    /// Explicit newlines always break; an empty string is one (empty) line.
    pub fn line_count(&self, text: &str, width: f32, bold: bool) -> usize {
        let glyph = self.font_size
            * self.glyph_width_ratio
            * if bold { BOLD_WIDTH_FACTOR } else { 1.0 };
        let content_width = (width - 2.0 * self.padding).max(glyph);
        let columns = ((content_width / glyph).floor() as usize).max(1);

        text.split('\n')
            .map(|paragraph| wrap_count(paragraph, columns))
            .sum()
    }

    /// Estimated height of `text` laid out within `width`, padding included.
    pub fn height(&self, text: &str, width: f32, bold: bool) -> f32 {
        self.line_count(text, width, bold) as f32 * self.line_px() + 2.0 * self.padding
    }
}

/// Greedy word wrap over display columns. Words wider than a line are broken.
fn wrap_count(paragraph: &str, columns: usize) -> usize {
    let mut lines = 1;
    let mut used = 0;

    for word in paragraph.split_whitespace() {
        let width = word.width();
        let needed = if used == 0 { width } else { used + 1 + width };

        if needed <= columns {
            used = needed;
        } else if width <= columns {
            lines += 1;
            used = width;
        } else {
            if used > 0 {
                lines += 1;
            }
            // A long word fills whole lines and leaves the remainder
            lines += (width - 1) / columns;
            used = width - (width - 1) / columns * columns;
        }
    }
    lines
}
