//! Image placement and unit conversions
//!
//! Every renderer works from the same pixel geometry (96 DPI) and converts to
//! its native unit at the last moment, so a placement computed once lands in the
//! same spot in xlsx, docx and pdf output.

use serde::{Deserialize, Serialize};

/// EMU per pixel at 96 DPI
pub const EMU_PER_PX: f64 = 9525.0;

/// Column width in Excel character units to pixels
pub fn column_width_px(chars: f64) -> f64 {
    (chars * 7.0).round()
}

/// Row height in points to pixels
pub fn row_height_px(points: f64) -> f64 {
    points * 4.0 / 3.0
}

/// Millimetres to pixels at 96 DPI
pub fn mm_to_px(mm: f64) -> f64 {
    mm / 25.4 * 96.0
}

/// Pixels to EMU (docx drawing offsets and extents)
pub fn px_to_emu(px: f64) -> i64 {
    (px * EMU_PER_PX).round() as i64
}

/// Pixels to PDF points
pub fn px_to_pt(px: f64) -> f64 {
    px * 0.75
}

/// Pixels to twentieths of a point (docx table geometry)
pub fn px_to_twips(px: f64) -> i64 {
    (px * 15.0).round() as i64
}

/// Width and height in pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn from_mm(width_mm: f64, height_mm: f64) -> Self {
        Self::new(mm_to_px(width_mm), mm_to_px(height_mm))
    }
}

/// Resolved vertical alignment of an image inside its region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Center,
    /// Horizontally centered, a fixed margin below the region's top edge
    TopCenter,
}

/// Image offset from the region's top-left corner, in pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlacementOffset {
    pub x: f64,
    pub y: f64,
}

/// Computes where an asset sits inside a cell or merge region
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Compositor {
    top_margin_px: f64,
}

impl Compositor {
    /// # Arguments
    /// * `top_margin_px` - Distance from the region top for [`Alignment::TopCenter`]
    pub fn new(top_margin_px: f64) -> Self {
        Self { top_margin_px }
    }

    pub fn top_margin_px(&self) -> f64 {
        self.top_margin_px
    }

    /// Offset that centers `asset` in `region`
    ///
    /// Assets larger than the region are pinned to its top-left edge instead of
    /// receiving a negative offset.
    pub fn place(&self, asset: Size, region: Size, alignment: Alignment) -> PlacementOffset {
        let x = ((region.width - asset.width) / 2.0).max(0.0);
        let y = match alignment {
            Alignment::TopCenter => self.top_margin_px.max(0.0),
            Alignment::Center => ((region.height - asset.height) / 2.0).max(0.0),
        };
        PlacementOffset { x, y }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unit_conversions() {
        assert_eq!(column_width_px(9.140625), 64.0);
        assert_eq!(column_width_px(100.0 / 7.0), 100.0);
        assert_eq!(row_height_px(15.0), 20.0);
        assert!((mm_to_px(25.4) - 96.0).abs() < 1e-9);
        assert_eq!(px_to_emu(22.0), 209_550);
        assert_eq!(px_to_pt(16.0), 12.0);
        assert_eq!(px_to_twips(64.0), 960);
    }

    #[test]
    fn test_place_center() {
        let compositor = Compositor::new(4.0);
        let offset = compositor.place(
            Size::new(96.0, 48.0),
            Size::new(140.0, 80.0),
            Alignment::Center,
        );
        assert_eq!(offset, PlacementOffset { x: 22.0, y: 16.0 });
    }

    #[test]
    fn test_place_top_center_uses_margin() {
        let compositor = Compositor::new(4.0);
        let offset = compositor.place(
            Size::new(96.0, 48.0),
            Size::new(140.0, 80.0),
            Alignment::TopCenter,
        );
        assert_eq!(offset, PlacementOffset { x: 22.0, y: 4.0 });
    }

    #[test]
    fn test_place_oversized_asset_is_clamped() {
        let compositor = Compositor::new(4.0);
        let offset = compositor.place(
            Size::new(200.0, 100.0),
            Size::new(140.0, 80.0),
            Alignment::Center,
        );
        assert_eq!(offset, PlacementOffset { x: 0.0, y: 0.0 });
    }
}
