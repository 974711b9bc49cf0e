//! Layout calculation and constants for the grid overlay
//!
//! Pure geometry: everything here works in overlay-local pixels and takes text
//! measurements as parameters, so it can be tested without fonts.

use crate::grid::{GridCell, GridSize, Letter};
use crate::state::Mode;

/// RGBA color as (r, g, b, a), converted with `rgba()` at draw time
pub(crate) type Rgba = (u8, u8, u8, u8);

pub(crate) fn rgba(c: Rgba) -> tiny_skia::Color {
    tiny_skia::Color::from_rgba8(c.0, c.1, c.2, c.3)
}

pub(crate) const BG_COLOR: Rgba = (0, 0, 0, 25);
pub(crate) const LINE_COLOR: Rgba = (0, 255, 255, 76);
pub(crate) const LABEL_TEXT_COLOR: Rgba = (255, 255, 0, 255);
pub(crate) const LABEL_BG_COLOR: Rgba = (0, 0, 0, 180);
pub(crate) const FOCUS_COLOR: Rgba = (0, 255, 0, 76);
pub(crate) const HINT_BG_COLOR: Rgba = (0, 0, 0, 150);
pub(crate) const HINT_TEXT_COLOR: Rgba = (255, 255, 255, 255);

pub(crate) const LINE_WIDTH: f32 = 1.0;
pub(crate) const LABEL_FONT_SIZE: f32 = 14.0;
pub(crate) const HINT_FONT_SIZE: f32 = 13.0;
/// Horizontal / vertical padding inside a cell label box
pub(crate) const LABEL_PAD_X: f32 = 4.0;
pub(crate) const LABEL_PAD_Y: f32 = 2.0;
pub(crate) const HINT_PADDING: f32 = 10.0;
pub(crate) const HINT_MARGIN: f32 = 20.0;

/// Axis-aligned box in overlay pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Area {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Area {
    pub fn to_rect(self) -> Option<tiny_skia::Rect> {
        tiny_skia::Rect::from_xywh(self.x, self.y, self.width, self.height)
    }
}

/// Status hint for a mode; none while hidden
pub(crate) fn hint_text(mode: Mode) -> Option<&'static str> {
    match mode {
        Mode::Hidden => None,
        Mode::GridSelect => Some("Grid | A-Z: Select | Backspace: Clear | Esc: Exit"),
        Mode::FineTune => Some(
            "Fine Tune | HJKL: Move | Space: Click | M: Right Click | T/V: Drag | O: Scroll | Enter: Copy | Esc: Exit",
        ),
        Mode::Scroll => Some("Scroll | J/K: Scroll | Esc: Exit"),
    }
}

/// Hint box anchored to the top-right corner
pub(crate) fn hint_box(overlay_width: f32, text_width: f32, text_height: f32) -> Area {
    let width = text_width + HINT_PADDING * 2.0;
    let height = text_height + HINT_PADDING * 2.0;
    Area {
        x: (overlay_width - width - HINT_MARGIN).max(0.0),
        y: HINT_MARGIN,
        width,
        height,
    }
}

/// Cell rectangle in overlay pixels
pub(crate) fn cell_area(size: GridSize, width: f32, height: f32, cell: GridCell) -> Area {
    let cell_w = width / size.cols as f32;
    let cell_h = height / size.rows as f32;
    Area {
        x: cell.col.index() as f32 * cell_w,
        y: cell.row.index() as f32 * cell_h,
        width: cell_w,
        height: cell_h,
    }
}

/// Interior grid lines; the outer border is not drawn
pub(crate) fn grid_lines(size: GridSize, width: f32, height: f32) -> Vec<Area> {
    let cell_w = width / size.cols as f32;
    let cell_h = height / size.rows as f32;
    let vertical = (1..size.cols).map(|i| Area {
        x: (i as f32 * cell_w).floor(),
        y: 0.0,
        width: LINE_WIDTH,
        height,
    });
    let horizontal = (1..size.rows).map(|i| Area {
        x: 0.0,
        y: (i as f32 * cell_h).floor(),
        width,
        height: LINE_WIDTH,
    });
    vertical.chain(horizontal).collect()
}

/// Cells whose labels are drawn: all of them, or only the chosen row
pub(crate) fn visible_cells(size: GridSize, first_letter: Option<Letter>) -> Vec<GridCell> {
    match first_letter {
        Some(row) => size.row_cells(row),
        None => size.cells(),
    }
}

/// Label box centered in its cell
pub(crate) fn label_box(cell: Area, text_width: f32, text_height: f32) -> Area {
    let width = text_width + LABEL_PAD_X * 2.0;
    let height = text_height + LABEL_PAD_Y * 2.0;
    Area {
        x: cell.x + (cell.width - width) / 2.0,
        y: cell.y + (cell.height - height) / 2.0,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letter(c: char) -> Letter {
        Letter::from_char(c).unwrap()
    }

    #[test]
    fn hint_only_when_visible() {
        assert_eq!(hint_text(Mode::Hidden), None);
        assert!(hint_text(Mode::GridSelect).unwrap().starts_with("Grid"));
        assert!(hint_text(Mode::FineTune).unwrap().contains("T/V: Drag"));
        assert!(hint_text(Mode::Scroll).unwrap().contains("J/K"));
    }

    #[test]
    fn hint_box_top_right() {
        let area = hint_box(1000.0, 200.0, 16.0);
        assert_eq!(
            area,
            Area {
                x: 760.0,
                y: 20.0,
                width: 220.0,
                height: 36.0
            }
        );
    }

    #[test]
    fn hint_box_never_negative() {
        assert_eq!(hint_box(100.0, 500.0, 10.0).x, 0.0);
    }

    #[test]
    fn cell_area_matches_grid() {
        let size = GridSize::default();
        let area = cell_area(
            size,
            2600.0,
            1300.0,
            GridCell {
                row: letter('B'),
                col: letter('C'),
            },
        );
        assert_eq!(
            area,
            Area {
                x: 200.0,
                y: 50.0,
                width: 100.0,
                height: 50.0
            }
        );
    }

    #[test]
    fn grid_line_count() {
        let lines = grid_lines(GridSize::new(4, 3), 300.0, 400.0);
        // cols - 1 vertical, rows - 1 horizontal
        assert_eq!(lines.len(), 2 + 3);
        assert_eq!(lines[0].x, 100.0);
        assert_eq!(lines[0].height, 400.0);
        assert_eq!(lines[2].y, 100.0);
        assert_eq!(lines[2].width, 300.0);
    }

    #[test]
    fn single_cell_grid_has_no_lines() {
        assert!(grid_lines(GridSize::new(1, 1), 100.0, 100.0).is_empty());
    }

    #[test]
    fn first_letter_narrows_to_row() {
        let size = GridSize::new(5, 7);
        assert_eq!(visible_cells(size, None).len(), 35);
        let row = visible_cells(size, Some(letter('C')));
        assert_eq!(row.len(), 7);
        assert!(row.iter().all(|cell| cell.row == letter('C')));
        assert!(visible_cells(size, Some(letter('Z'))).is_empty());
    }

    #[test]
    fn label_box_centered() {
        let cell = Area {
            x: 100.0,
            y: 50.0,
            width: 100.0,
            height: 50.0,
        };
        let area = label_box(cell, 20.0, 14.0);
        assert_eq!(area.width, 28.0);
        assert_eq!(area.height, 18.0);
        assert_eq!(area.x + area.width / 2.0, 150.0);
        assert_eq!(area.y + area.height / 2.0, 75.0);
    }
}
