//! Crop math for ornament icons tiled on a grid sprite sheet.

use serde::{Deserialize, Serialize};

/// Grid layout of a sprite sheet: `columns` cells per row, each `cell_width` x `cell_height`,
/// starting at (`origin_x`, `origin_y`) in the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpriteSheet {
    pub columns: i32,
    pub cell_width: i32,
    pub cell_height: i32,
    pub origin_x: i32,
    pub origin_y: i32,
}

/// Pixel rectangle to crop out of the sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl SpriteSheet {
    /// Crop rectangle for the icon at flat `index`, shifted by a per-item override.
    pub fn crop(&self, index: u32, offset: (i32, i32)) -> CropRect {
        let columns = self.columns.max(1) as u32;
        let column = (index % columns) as i32;
        let row = (index / columns) as i32;
        CropRect {
            x: self.origin_x + column * self.cell_width + offset.0,
            y: self.origin_y + row * self.cell_height + offset.1,
            width: self.cell_width,
            height: self.cell_height,
        }
    }

    /// Slots are numbered from 1; slot 1 is the first cell.
    pub fn crop_for_slot(&self, slot_number: i32, offset: (i32, i32)) -> CropRect {
        let index = (slot_number - 1).max(0) as u32;
        self.crop(index, offset)
    }
}

impl CropRect {
    /// Value for the CSS `background-position` property.
    pub fn background_position(&self) -> String {
        format!("{}px {}px", -self.x, -self.y)
    }

    /// Inline style for an element showing this crop of `sheet_url`.
    pub fn css(&self, sheet_url: &str) -> String {
        format!(
            "background-image: url('{}'); background-position: {}; width: {}px; height: {}px;",
            sheet_url,
            self.background_position(),
            self.width,
            self.height
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet() -> SpriteSheet {
        SpriteSheet {
            columns: 4,
            cell_width: 50,
            cell_height: 60,
            origin_x: 10,
            origin_y: 5,
        }
    }

    #[test]
    fn test_crop_first_row() {
        assert_eq!(
            sheet().crop(0, (0, 0)),
            CropRect {
                x: 10,
                y: 5,
                width: 50,
                height: 60
            }
        );
        assert_eq!(sheet().crop(3, (0, 0)).x, 160);
        assert_eq!(sheet().crop(3, (0, 0)).y, 5);
    }

    #[test]
    fn test_crop_wraps_to_next_row() {
        let rect = sheet().crop(5, (0, 0));
        // Index 5 on a 4-column sheet sits at column 1, row 1.
        assert_eq!(rect.x, 60);
        assert_eq!(rect.y, 65);
    }

    #[test]
    fn test_crop_applies_override() {
        let rect = sheet().crop(5, (-3, 7));
        assert_eq!((rect.x, rect.y), (57, 72));
    }

    #[test]
    fn test_zero_columns_is_single_column() {
        let mut s = sheet();
        s.columns = 0;
        let rect = s.crop(2, (0, 0));
        assert_eq!((rect.x, rect.y), (10, 125));
    }

    #[test]
    fn test_slot_numbers_start_at_one() {
        assert_eq!(sheet().crop_for_slot(1, (0, 0)), sheet().crop(0, (0, 0)));
        assert_eq!(sheet().crop_for_slot(6, (1, 1)), sheet().crop(5, (1, 1)));
        assert_eq!(sheet().crop_for_slot(0, (0, 0)), sheet().crop(0, (0, 0)));
    }

    #[test]
    fn test_background_position() {
        let rect = sheet().crop(5, (0, 0));
        assert_eq!(rect.background_position(), "-60px -65px");
        assert!(rect.css("/sheet.png").contains("url('/sheet.png')"));
        assert!(rect.css("/sheet.png").contains("width: 50px"));
    }
}
