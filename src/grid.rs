//! Grid geometry
//!
//! The screen rectangle is tiled into `rows × cols` cells. Rows and columns are
//! both addressed by a letter, so a two-letter code such as `"AZ"` names one
//! cell. Sizes above 26 cannot be addressed and are clamped.

use std::fmt;

/// Number of addressable letters (A-Z)
pub const LETTER_COUNT: usize = 26;

/// One of the 26 letters used to address grid rows and columns
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Letter(u8);

impl Letter {
    /// Case-folded letter for an ASCII alphabetic character
    pub fn from_char(c: char) -> Option<Self> {
        let upper = c.to_ascii_uppercase();
        if upper.is_ascii_uppercase() {
            Some(Self(upper as u8 - b'A'))
        } else {
            None
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        (index < LETTER_COUNT).then_some(Self(index as u8))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn as_char(self) -> char {
        (b'A' + self.0) as char
    }
}

impl fmt::Debug for Letter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl fmt::Display for Letter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// A grid cell addressed by (row letter, column letter)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridCell {
    pub row: Letter,
    pub col: Letter,
}

impl GridCell {
    /// Two-letter label drawn in the overlay, row first
    pub fn label(&self) -> String {
        format!("{}{}", self.row, self.col)
    }
}

/// Row/column count of the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSize {
    pub rows: usize,
    pub cols: usize,
}

impl GridSize {
    /// Create a grid size, clamping both dimensions to `1..=26`
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows: rows.clamp(1, LETTER_COUNT),
            cols: cols.clamp(1, LETTER_COUNT),
        }
    }

    /// Resolve two letters to a cell, or `None` if either index is out of range
    pub fn cell(&self, row: Letter, col: Letter) -> Option<GridCell> {
        if row.index() < self.rows && col.index() < self.cols {
            Some(GridCell { row, col })
        } else {
            None
        }
    }

    /// All cells of one row (used when the first letter narrows the grid)
    pub fn row_cells(&self, row: Letter) -> Vec<GridCell> {
        (0..self.cols)
            .filter_map(Letter::from_index)
            .filter_map(|col| self.cell(row, col))
            .collect()
    }

    /// Every cell, row-major
    pub fn cells(&self) -> Vec<GridCell> {
        (0..self.rows)
            .filter_map(Letter::from_index)
            .flat_map(|row| self.row_cells(row))
            .collect()
    }
}

impl Default for GridSize {
    fn default() -> Self {
        Self::new(LETTER_COUNT, LETTER_COUNT)
    }
}

/// Screen rectangle in global pointer coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ScreenRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Grid size plus the screen rectangle it tiles
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    size: GridSize,
    rect: ScreenRect,
}

impl GridGeometry {
    pub fn new(size: GridSize, rect: ScreenRect) -> Self {
        Self { size, rect }
    }

    pub fn size(&self) -> GridSize {
        self.size
    }

    pub fn rect(&self) -> ScreenRect {
        self.rect
    }

    pub fn cell_width(&self) -> f64 {
        self.rect.width / self.size.cols as f64
    }

    pub fn cell_height(&self) -> f64 {
        self.rect.height / self.size.rows as f64
    }

    /// Center of a cell in global coordinates.
    ///
    /// Bounds are checked again here because a `GridCell` may have been
    /// resolved against a different grid size.
    pub fn center(&self, cell: GridCell) -> Option<Point> {
        let cell = self.size.cell(cell.row, cell.col)?;
        Some(Point {
            x: self.rect.x + (cell.col.index() as f64 + 0.5) * self.cell_width(),
            y: self.rect.y + (cell.row.index() as f64 + 0.5) * self.cell_height(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letter(c: char) -> Letter {
        Letter::from_char(c).unwrap()
    }

    fn center_of(geometry: &GridGeometry, row: char, col: char) -> Option<Point> {
        geometry.center(GridCell {
            row: letter(row),
            col: letter(col),
        })
    }

    #[test]
    fn letter_case_folds() {
        assert_eq!(Letter::from_char('a'), Letter::from_char('A'));
        assert_eq!(letter('z').index(), 25);
        assert_eq!(letter('q').as_char(), 'Q');
    }

    #[test]
    fn letter_rejects_non_alphabetic() {
        assert_eq!(Letter::from_char('1'), None);
        assert_eq!(Letter::from_char(' '), None);
        assert_eq!(Letter::from_char('é'), None);
        assert_eq!(Letter::from_index(26), None);
    }

    #[test]
    fn grid_size_clamps() {
        assert_eq!(GridSize::new(0, 40), GridSize { rows: 1, cols: 26 });
        assert_eq!(GridSize::default(), GridSize { rows: 26, cols: 26 });
    }

    #[test]
    fn cell_out_of_range_for_small_grid() {
        let size = GridSize::new(10, 5);
        assert!(size.cell(letter('J'), letter('E')).is_some());
        assert!(size.cell(letter('K'), letter('A')).is_none());
        assert!(size.cell(letter('A'), letter('F')).is_none());
    }

    #[test]
    fn cell_label_is_row_then_column() {
        let cell = GridCell {
            row: letter('B'),
            col: letter('X'),
        };
        assert_eq!(cell.label(), "BX");
    }

    #[test]
    fn row_cells_and_cells_counts() {
        let size = GridSize::new(3, 4);
        assert_eq!(size.row_cells(letter('A')).len(), 4);
        assert!(size.row_cells(letter('D')).is_empty());
        assert_eq!(size.cells().len(), 12);
    }

    #[test]
    fn centers_on_reference_rectangle() {
        let geometry = GridGeometry::new(
            GridSize::default(),
            ScreenRect::new(0.0, 0.0, 2600.0, 1300.0),
        );
        assert_eq!(
            center_of(&geometry, 'A', 'A'),
            Some(Point { x: 50.0, y: 25.0 })
        );
        assert_eq!(
            center_of(&geometry, 'Z', 'Z'),
            Some(Point {
                x: 2550.0,
                y: 1275.0
            })
        );
    }

    #[test]
    fn center_includes_origin_offset() {
        let geometry = GridGeometry::new(
            GridSize::new(2, 2),
            ScreenRect::new(100.0, 50.0, 200.0, 100.0),
        );
        // Row B, column A: x = 100 + 0.5 * 100, y = 50 + 1.5 * 50
        assert_eq!(
            center_of(&geometry, 'B', 'A'),
            Some(Point { x: 150.0, y: 125.0 })
        );
    }

    #[test]
    fn center_rechecks_bounds() {
        let geometry = GridGeometry::new(
            GridSize::new(4, 4),
            ScreenRect::new(0.0, 0.0, 400.0, 400.0),
        );
        let foreign = GridCell {
            row: letter('Z'),
            col: letter('A'),
        };
        assert_eq!(geometry.center(foreign), None);
    }
}
