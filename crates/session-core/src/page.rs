//! Per-page layer stack: base raster, freehand ink, overlay input state

use crate::coords::{viewport_size, ViewportPoint};
use crate::freehand::FreehandLayer;
use pdf_engine::{PageSize, RenderedPage, RgbaImage};
use std::sync::Arc;

/// How the annotation overlay of a page reacts to pointer input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayMode {
    /// Pointer events pass through to the layers below
    Disabled,
    /// Clicks on empty space create annotations; existing ones can be dragged
    Create,
    /// Existing annotations can be dragged; nothing is created
    DragOnly,
}

/// Which layers of a page accept pointer input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEligibility {
    pub freehand: bool,
    pub overlay: OverlayMode,
}

impl InputEligibility {
    pub const NONE: InputEligibility =
        InputEligibility { freehand: false, overlay: OverlayMode::Disabled };
}

#[derive(Debug, Clone)]
pub struct PageLayerSet {
    index: u32,
    size: PageSize,
    render_scale: f32,
    raster: Arc<RgbaImage>,
    freehand: FreehandLayer,
    input: InputEligibility,
}

impl PageLayerSet {
    pub(crate) fn new(
        index: u32,
        rendered: RenderedPage,
        render_scale: f32,
        input: InputEligibility,
    ) -> Self {
        let (width, height) = rendered.raster.dimensions();
        Self {
            index,
            size: rendered.size,
            render_scale,
            raster: rendered.raster,
            freehand: FreehandLayer::new(width, height, render_scale),
            input,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// Intrinsic page size in points
    pub fn size(&self) -> PageSize {
        self.size
    }

    /// Scale the base raster was rendered at
    pub fn render_scale(&self) -> f32 {
        self.render_scale
    }

    /// Viewport extent in pixels at the render scale
    pub fn viewport_size(&self) -> (f32, f32) {
        viewport_size(self.size, self.render_scale)
    }

    pub fn contains(&self, point: ViewportPoint) -> bool {
        let (width, height) = self.viewport_size();
        point.x >= 0.0 && point.y >= 0.0 && point.x <= width && point.y <= height
    }

    pub fn raster(&self) -> &Arc<RgbaImage> {
        &self.raster
    }

    pub fn freehand(&self) -> &FreehandLayer {
        &self.freehand
    }

    pub fn input(&self) -> InputEligibility {
        self.input
    }

    pub(crate) fn freehand_mut(&mut self) -> &mut FreehandLayer {
        &mut self.freehand
    }

    pub(crate) fn set_input(&mut self, input: InputEligibility) {
        self.input = input;
    }

    /// Swap in a raster rendered at a new scale; ink is kept as-is
    pub(crate) fn replace_raster(&mut self, rendered: RenderedPage, render_scale: f32) {
        self.size = rendered.size;
        self.raster = rendered.raster;
        self.render_scale = render_scale;
    }
}
