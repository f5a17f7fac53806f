//! Freehand ink raster, one per page
//!
//! The layer's pixel grid is fixed at the scale the page was first rendered
//! at. Strokes drawn at a different scale are mapped onto that grid, so ink
//! stays anchored to the page content across zoom changes.

use crate::coords::ViewportPoint;
use doc_model::Rgb;
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

/// Brush used for new strokes; size is a viewport pixel diameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Brush {
    pub color: Rgb,
    pub size: f32,
}

impl Default for Brush {
    fn default() -> Self {
        Self { color: Rgb::BLACK, size: 2.0 }
    }
}

/// A straight piece of a stroke between two consecutive pointer samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeSegment {
    pub from: ViewportPoint,
    pub to: ViewportPoint,
}

impl StrokeSegment {
    pub fn new(from: ViewportPoint, to: ViewportPoint) -> Self {
        Self { from, to }
    }

    /// Zero-length segment, drawn as a single dot
    pub fn dot(at: ViewportPoint) -> Self {
        Self { from: at, to: at }
    }
}

fn lerp(from: ViewportPoint, to: ViewportPoint, t: f32) -> ViewportPoint {
    ViewportPoint::new(from.x + (to.x - from.x) * t, from.y + (to.y - from.y) * t)
}

/// Liang-Barsky clip of `from..to` against the rectangle `min..max`
fn clip_to_rect(
    from: ViewportPoint,
    to: ViewportPoint,
    min: ViewportPoint,
    max: ViewportPoint,
) -> Option<(ViewportPoint, ViewportPoint)> {
    let delta = to - from;
    let (mut enter, mut exit) = (0.0f32, 1.0f32);
    let edges = [
        (-delta.x, from.x - min.x),
        (delta.x, max.x - from.x),
        (-delta.y, from.y - min.y),
        (delta.y, max.y - from.y),
    ];
    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            enter = enter.max(r);
        } else {
            exit = exit.min(r);
        }
        if enter > exit {
            return None;
        }
    }
    Some((lerp(from, to, enter), lerp(from, to, exit)))
}

/// Segments joining consecutive samples. A single sample yields a dot.
pub fn stroke_segments(samples: &[ViewportPoint]) -> Vec<StrokeSegment> {
    match samples {
        [] => Vec::new(),
        [only] => vec![StrokeSegment::dot(*only)],
        _ => samples.windows(2).map(|pair| StrokeSegment::new(pair[0], pair[1])).collect(),
    }
}

#[derive(Debug, Clone)]
pub struct FreehandLayer {
    pixels: RgbaImage,
    captured_scale: f32,
    inked: bool,
}

impl FreehandLayer {
    /// Fully transparent layer covering a page rendered at `captured_scale`
    pub fn new(width_px: u32, height_px: u32, captured_scale: f32) -> Self {
        Self { pixels: RgbaImage::new(width_px, height_px), captured_scale, inked: false }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn captured_scale(&self) -> f32 {
        self.captured_scale
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// True when no pixel has ever been inked
    pub fn is_empty(&self) -> bool {
        !self.inked
    }

    /// Rasterize one segment given in viewport pixels at `current_scale`.
    /// The brush is a round disc swept along the segment. Only the part of
    /// the segment within brush reach of the layer is stepped.
    pub fn append_segment(&mut self, segment: StrokeSegment, brush: &Brush, current_scale: f32) {
        let factor = self.captured_scale / current_scale;
        let from = segment.from.scaled(factor);
        let to = segment.to.scaled(factor);
        if ![from.x, from.y, to.x, to.y].iter().all(|value| value.is_finite()) {
            return;
        }
        let radius = (brush.size * factor / 2.0).max(0.75);
        let color = Rgba([brush.color.r, brush.color.g, brush.color.b, u8::MAX]);

        let (width, height) = self.pixels.dimensions();
        let reach_min = ViewportPoint::new(-radius, -radius);
        let reach_max = ViewportPoint::new(width as f32 + radius, height as f32 + radius);
        let Some((from, to)) = clip_to_rect(from, to, reach_min, reach_max) else {
            return;
        };

        // Step at most half a pixel so consecutive discs overlap.
        let delta = to - from;
        let length = (delta.x * delta.x + delta.y * delta.y).sqrt();
        let steps = (length * 2.0).ceil().max(1.0) as u32;
        for step in 0..=steps {
            self.stamp_disc(lerp(from, to, step as f32 / steps as f32), radius, color);
        }
    }

    fn stamp_disc(&mut self, center: ViewportPoint, radius: f32, color: Rgba<u8>) {
        let (width, height) = self.pixels.dimensions();
        if width == 0 || height == 0 {
            return;
        }
        let min_x = (center.x - radius).floor().max(0.0) as u32;
        let min_y = (center.y - radius).floor().max(0.0) as u32;
        let max_x = (center.x + radius).ceil().min(width as f32 - 1.0);
        let max_y = (center.y + radius).ceil().min(height as f32 - 1.0);
        if max_x < 0.0 || max_y < 0.0 {
            return;
        }
        let (max_x, max_y) = (max_x as u32, max_y as u32);

        let radius_sq = radius * radius;
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let dx = x as f32 + 0.5 - center.x;
                let dy = y as f32 + 0.5 - center.y;
                if dx * dx + dy * dy <= radius_sq {
                    self.pixels.put_pixel(x, y, color);
                    self.inked = true;
                }
            }
        }
    }

    /// PNG encoding of the whole layer
    pub fn encode_png(&self) -> Result<Vec<u8>, image::ImageError> {
        let mut encoded = Cursor::new(Vec::new());
        self.pixels.write_to(&mut encoded, ImageFormat::Png)?;
        Ok(encoded.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inked_count(layer: &FreehandLayer) -> usize {
        layer.pixels().pixels().filter(|pixel| pixel.0[3] != 0).count()
    }

    #[test]
    fn segments_join_consecutive_samples() {
        let samples = [
            ViewportPoint::new(0.0, 0.0),
            ViewportPoint::new(10.0, 0.0),
            ViewportPoint::new(10.0, 10.0),
        ];
        let segments = stroke_segments(&samples);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1], StrokeSegment::new(samples[1], samples[2]));
        assert_eq!(stroke_segments(&samples[..1]), vec![StrokeSegment::dot(samples[0])]);
        assert!(stroke_segments(&[]).is_empty());
    }

    #[test]
    fn new_layer_is_empty() {
        let layer = FreehandLayer::new(32, 32, 1.0);
        assert!(layer.is_empty());
        assert_eq!(inked_count(&layer), 0);
    }

    #[test]
    fn segment_inks_pixels_along_its_path() {
        let mut layer = FreehandLayer::new(64, 64, 1.0);
        let brush = Brush { color: Rgb::new(255, 0, 0), size: 2.0 };
        layer.append_segment(
            StrokeSegment::new(ViewportPoint::new(5.0, 10.0), ViewportPoint::new(50.0, 10.0)),
            &brush,
            1.0,
        );

        assert!(!layer.is_empty());
        assert_eq!(layer.pixels().get_pixel(30, 9).0, [255, 0, 0, 255]);
        assert_eq!(layer.pixels().get_pixel(30, 30).0[3], 0);
    }

    #[test]
    fn strokes_map_onto_captured_grid() {
        let mut layer = FreehandLayer::new(100, 100, 1.0);
        // drawn at 2x, so x=80 maps to x=40 on the layer
        layer.append_segment(StrokeSegment::dot(ViewportPoint::new(80.0, 80.0)), &Brush::default(), 2.0);

        assert_ne!(layer.pixels().get_pixel(40, 40).0[3], 0);
        assert_eq!(layer.pixels().get_pixel(79, 79).0[3], 0);
    }

    #[test]
    fn off_layer_segments_leave_it_empty() {
        let mut layer = FreehandLayer::new(16, 16, 1.0);
        layer.append_segment(
            StrokeSegment::new(ViewportPoint::new(-50.0, -50.0), ViewportPoint::new(-40.0, -45.0)),
            &Brush::default(),
            1.0,
        );
        assert!(layer.is_empty());
    }

    #[test]
    fn far_endpoints_are_clipped_to_the_layer() {
        let mut layer = FreehandLayer::new(64, 64, 1.0);
        let brush = Brush { color: Rgb::new(0, 0, 255), size: 2.0 };
        layer.append_segment(
            StrokeSegment::new(ViewportPoint::new(10.0, 10.0), ViewportPoint::new(1.0e9, 10.0)),
            &brush,
            1.0,
        );

        assert_eq!(layer.pixels().get_pixel(10, 9).0, [0, 0, 255, 255]);
        assert_eq!(layer.pixels().get_pixel(63, 9).0, [0, 0, 255, 255]);
        assert_eq!(layer.pixels().get_pixel(5, 9).0[3], 0);
    }

    #[test]
    fn segment_crossing_the_layer_inks_only_the_inside() {
        let mut layer = FreehandLayer::new(32, 32, 1.0);
        layer.append_segment(
            StrokeSegment::new(ViewportPoint::new(-1.0e6, 16.0), ViewportPoint::new(1.0e6, 16.0)),
            &Brush::default(),
            1.0,
        );

        assert_eq!(inked_count(&layer), 32 * 2);
    }

    #[test]
    fn non_finite_samples_are_skipped() {
        let mut layer = FreehandLayer::new(16, 16, 1.0);
        layer.append_segment(
            StrokeSegment::new(ViewportPoint::new(4.0, 4.0), ViewportPoint::new(f32::INFINITY, 4.0)),
            &Brush::default(),
            1.0,
        );
        assert!(layer.is_empty());
    }

    #[test]
    fn encodes_as_png() {
        let layer = FreehandLayer::new(8, 8, 1.0);
        let png = layer.encode_png().expect("layer should encode");
        assert_eq!(image::guess_format(&png).expect("format should be detectable"), ImageFormat::Png);
    }
}
