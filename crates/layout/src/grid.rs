//! Grid layout with row and column spans.
//!
//! Layout runs in two passes over an occupancy matrix:
//!
//! 1. **Height pass.** Rows are walked top to bottom. Each cell advances to
//!    the first free column of its row, claims `rowspan × colspan` positions
//!    and reports its content height to its *starting* row only.
//! 2. **Position pass.** With row heights final, every placed cell gets an
//!    absolute rectangle whose height is the sum of the rows it spans.
//!
//! A tall spanning cell over short rows can therefore end up with less room
//! than its content needs; merged-cell documents rely on this attribution.

use crate::measure::{CellMeasure, GridPosition};
use log::debug;
use serde::Serialize;
use tabula_types::{Cell, Rect};
use thiserror::Error;

/// Recoverable problems found in the input. Never returned as an error;
/// the offending cell is left out of the layout.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LayoutDiagnostic {
    #[error("Cell {index} of row {row} has no free column in a {column_count}-column grid")]
    Overflow {
        row: usize,
        /// Position of the cell within its source row.
        index: usize,
        column_count: usize,
    },
}

/// A placed cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellRect {
    pub row: usize,
    pub col: usize,
    /// Position of the cell within its source row.
    pub index: usize,
    /// Spans after clamping to the grid bounds.
    pub rowspan: usize,
    pub colspan: usize,
    pub rect: Rect,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridLayout {
    pub cells: Vec<CellRect>,
    pub row_heights: Vec<f32>,
    pub column_width: f32,
    pub column_count: usize,
    pub total_height: f32,
    pub skipped: Vec<LayoutDiagnostic>,
}

impl GridLayout {
    /// The cell placed with its top-left corner at `(row, col)`.
    pub fn cell_at(&self, row: usize, col: usize) -> Option<&CellRect> {
        self.cells.iter().find(|c| c.row == row && c.col == col)
    }
}

/// Which grid positions have been claimed so far. Lives for one layout pass.
struct Occupancy {
    columns: usize,
    cells: Vec<bool>,
}

impl Occupancy {
    fn new(rows: usize, columns: usize) -> Self {
        Self {
            columns,
            cells: vec![false; rows * columns],
        }
    }

    fn is_occupied(&self, row: usize, col: usize) -> bool {
        self.cells[row * self.columns + col]
    }

    /// First free column at or after `from` in `row`.
    fn next_free(&self, row: usize, from: usize) -> Option<usize> {
        (from..self.columns).find(|&col| !self.is_occupied(row, col))
    }

    fn claim(&mut self, row: usize, col: usize, rowspan: usize, colspan: usize) {
        for r in row..row + rowspan {
            let start = r * self.columns + col;
            self.cells[start..start + colspan].fill(true);
        }
    }
}

struct Placement {
    row: usize,
    col: usize,
    index: usize,
    rowspan: usize,
    colspan: usize,
}

/// Lays out grids. Stateless apart from its metrics; the same inputs always
/// produce the same [`GridLayout`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridEngine {
    pub min_row_height: f32,
}

impl Default for GridEngine {
    fn default() -> Self {
        Self {
            min_row_height: crate::LayoutConfig::default().min_row_height,
        }
    }
}

impl GridEngine {
    pub fn new(min_row_height: f32) -> Self {
        Self { min_row_height }
    }

    /// Lays out `rows` across `available_width`.
    ///
    /// `column_count` defaults to the widest row in summed column spans.
    /// Every row, including one left empty by spans from above, is at least
    /// `min_row_height` tall.
    pub fn layout<M>(
        &self,
        rows: &[Vec<Cell>],
        column_count: Option<usize>,
        available_width: f32,
        measure: &M,
    ) -> GridLayout
    where
        M: CellMeasure + ?Sized,
    {
        let column_count = column_count.unwrap_or_else(|| widest_row(rows));
        let column_width = if column_count > 0 {
            available_width.max(0.0) / column_count as f32
        } else {
            0.0
        };

        let mut occupancy = Occupancy::new(rows.len(), column_count);
        let mut row_heights = vec![self.min_row_height; rows.len()];
        let mut placements = Vec::new();
        let mut skipped = Vec::new();

        // Height pass
        for (row, cells) in rows.iter().enumerate() {
            let mut cursor = 0;
            for (index, cell) in cells.iter().enumerate() {
                let Some(col) = occupancy.next_free(row, cursor) else {
                    let diagnostic = LayoutDiagnostic::Overflow {
                        row,
                        index,
                        column_count,
                    };
                    debug!("Skipping cell: {}", diagnostic);
                    skipped.push(diagnostic);
                    continue;
                };

                let colspan = cell.colspan.max(1).min(column_count - col);
                let rowspan = cell.rowspan.max(1).min(rows.len() - row);
                occupancy.claim(row, col, rowspan, colspan);

                let width = column_width * colspan as f32;
                let required = measure.measure(cell, GridPosition { row, col }, width);
                if required.is_finite() {
                    row_heights[row] = row_heights[row].max(required);
                }

                placements.push(Placement {
                    row,
                    col,
                    index,
                    rowspan,
                    colspan,
                });
                cursor = col + colspan;
            }
        }

        // Position pass
        let mut row_offsets = Vec::with_capacity(rows.len());
        let mut y = 0.0;
        for height in &row_heights {
            row_offsets.push(y);
            y += height;
        }
        let total_height = y;

        let cells = placements
            .into_iter()
            .map(|p| {
                let height: f32 = row_heights[p.row..p.row + p.rowspan].iter().sum();
                CellRect {
                    row: p.row,
                    col: p.col,
                    index: p.index,
                    rowspan: p.rowspan,
                    colspan: p.colspan,
                    rect: Rect::new(
                        column_width * p.col as f32,
                        row_offsets[p.row],
                        column_width * p.colspan as f32,
                        height,
                    ),
                }
            })
            .collect();

        GridLayout {
            cells,
            row_heights,
            column_width,
            column_count,
            total_height,
            skipped,
        }
    }
}

fn widest_row(rows: &[Vec<Cell>]) -> usize {
    rows.iter()
        .map(|row| row.iter().map(|c| c.colspan.max(1)).sum::<usize>())
        .max()
        .unwrap_or(0)
}
