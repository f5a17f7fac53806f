//! Viewport ↔ document coordinate mapping
//!
//! Viewport space is the on-screen raster of a page: origin at the top-left,
//! y growing downward, units are pixels at the current render scale.
//! Document space is the page's native space: origin at the bottom-left,
//! y growing upward, units are points.
//!
//! Every y-flip and every division by the scale in the crate happens here.

use pdf_engine::PageSize;
use std::ops::{Add, Sub};

/// Pixel position on a rendered page (top-left origin, y down)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewportPoint {
    pub x: f32,
    pub y: f32,
}

impl ViewportPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Scale both components by `factor`
    pub fn scaled(self, factor: f32) -> Self {
        Self { x: self.x * factor, y: self.y * factor }
    }
}

impl Add for ViewportPoint {
    type Output = ViewportPoint;

    fn add(self, rhs: Self) -> Self::Output {
        Self { x: self.x + rhs.x, y: self.y + rhs.y }
    }
}

impl Sub for ViewportPoint {
    type Output = ViewportPoint;

    fn sub(self, rhs: Self) -> Self::Output {
        Self { x: self.x - rhs.x, y: self.y - rhs.y }
    }
}

impl From<(f32, f32)> for ViewportPoint {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

/// Point in PDF page space (bottom-left origin, y up)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DocumentPoint {
    pub x: f32,
    pub y: f32,
}

impl DocumentPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Which part of a placed object the viewport position refers to.
///
/// Viewport positions are always the object's top-left corner. PDF text is
/// positioned by its baseline and images by their bottom-left corner, so the
/// mapping subtracts a vertical adjustment (in viewport pixels) for those.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Anchor {
    /// The point itself, no adjustment
    TopLeft,
    /// Text whose top is at the point; baseline sits one font size lower
    TextBaseline { font_size_px: f32 },
    /// Image whose top edge is at the point; output is its bottom-left corner
    ImageTop { height_px: f32 },
}

impl Anchor {
    pub fn adjustment_px(self) -> f32 {
        match self {
            Anchor::TopLeft => 0.0,
            Anchor::TextBaseline { font_size_px } => font_size_px,
            Anchor::ImageTop { height_px } => height_px,
        }
    }
}

/// Map a viewport position to document space.
///
/// `x_doc = x / scale`, `y_doc = page_height − y / scale − adjustment / scale`.
pub fn to_document_space(
    point: ViewportPoint,
    page_height_pt: f32,
    scale: f32,
    anchor: Anchor,
) -> DocumentPoint {
    let adjustment = anchor.adjustment_px();
    DocumentPoint {
        x: point.x / scale,
        y: page_height_pt - point.y / scale - adjustment / scale,
    }
}

/// Exact inverse of [`to_document_space`]
pub fn to_viewport_space(
    point: DocumentPoint,
    page_height_pt: f32,
    scale: f32,
    anchor: Anchor,
) -> ViewportPoint {
    let adjustment = anchor.adjustment_px();
    ViewportPoint { x: point.x * scale, y: (page_height_pt - point.y) * scale - adjustment }
}

/// Convert a viewport length (font size, image width) to points
pub fn to_document_length(length_px: f32, scale: f32) -> f32 {
    length_px / scale
}

/// Viewport size of a page rendered at `scale`
pub fn viewport_size(size: PageSize, scale: f32) -> (f32, f32) {
    (size.width_pt * scale, size.height_pt * scale)
}

/// Ratio applied to viewport quantities when the render scale changes
pub fn rescale_factor(old_scale: f32, new_scale: f32) -> f32 {
    new_scale / old_scale
}

/// Move a viewport point captured at `old_scale` onto the grid of `new_scale`
pub fn rescale_point(point: ViewportPoint, old_scale: f32, new_scale: f32) -> ViewportPoint {
    point.scaled(rescale_factor(old_scale, new_scale))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-3;

    fn assert_close(actual: f32, expected: f32) {
        assert!((actual - expected).abs() < EPSILON, "expected {expected}, got {actual}");
    }

    #[test]
    fn text_placement_matches_reference_scenario() {
        let doc = to_document_space(
            ViewportPoint::new(100.0, 200.0),
            800.0,
            1.5,
            Anchor::TextBaseline { font_size_px: 16.0 },
        );

        assert_close(doc.x, 66.667);
        assert_close(doc.y, 656.0);
    }

    #[test]
    fn image_anchor_yields_bottom_left_corner() {
        // 150px wide, 75px tall image at the very top of a 600x800pt page at scale 1.5
        let doc = to_document_space(
            ViewportPoint::new(0.0, 0.0),
            800.0,
            1.5,
            Anchor::ImageTop { height_px: 75.0 },
        );

        assert_close(doc.x, 0.0);
        assert_close(doc.y, 750.0);
    }

    #[test]
    fn y_axis_is_flipped() {
        let top = to_document_space(ViewportPoint::new(0.0, 0.0), 800.0, 2.0, Anchor::TopLeft);
        let bottom =
            to_document_space(ViewportPoint::new(0.0, 1600.0), 800.0, 2.0, Anchor::TopLeft);

        assert_close(top.y, 800.0);
        assert_close(bottom.y, 0.0);
    }

    #[test]
    fn round_trip_recovers_viewport_position() {
        let anchors = [
            Anchor::TopLeft,
            Anchor::TextBaseline { font_size_px: 16.0 },
            Anchor::ImageTop { height_px: 42.5 },
        ];
        let points = [(0.0, 0.0), (100.0, 200.0), (899.5, 1199.25), (13.3, 977.7)];

        for scale in [0.5, 1.0, 1.5, 3.25] {
            for anchor in anchors {
                for (x, y) in points {
                    let original = ViewportPoint::new(x, y);
                    let doc = to_document_space(original, 800.0, scale, anchor);
                    let back = to_viewport_space(doc, 800.0, scale, anchor);
                    assert_close(back.x, original.x);
                    assert_close(back.y, original.y);
                }
            }
        }
    }

    #[test]
    fn rescale_keeps_document_location() {
        let at_1_5 = ViewportPoint::new(150.0, 300.0);
        let at_3 = rescale_point(at_1_5, 1.5, 3.0);

        let before = to_document_space(at_1_5, 800.0, 1.5, Anchor::TopLeft);
        let after = to_document_space(at_3, 800.0, 3.0, Anchor::TopLeft);

        assert_close(before.x, after.x);
        assert_close(before.y, after.y);
    }

    #[test]
    fn viewport_size_is_intrinsic_times_scale() {
        assert_eq!(viewport_size(PageSize::new(600.0, 800.0), 1.5), (900.0, 1200.0));
    }
}
