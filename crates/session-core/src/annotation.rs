//! Positioned overlay objects: text boxes and image stamps
//!
//! Positions are viewport pixels at the session's current render scale and
//! always refer to the annotation's top-left corner. Freehand strokes are not
//! annotations; they live in the page's [`FreehandLayer`](crate::FreehandLayer).

use crate::coords::ViewportPoint;
use crate::error::{SessionError, SessionResult};
use doc_model::{FontFamily, Rgb};
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;

/// Unique identifier for an annotation
pub type AnnotationId = uuid::Uuid;

/// Line advance for multi-line text, as a multiple of the font size
pub const LINE_HEIGHT: f32 = 1.2;

/// Average glyph advance used to estimate text extents for hit-testing
const GLYPH_WIDTH_ESTIMATE: f32 = 0.5;

/// Encoded raster used for stamps
///
/// Keeps the encoded bytes for export and the decoded pixel dimensions for
/// aspect ratio. Cloning shares the bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct StampImage {
    bytes: Arc<[u8]>,
    format: Option<ImageFormat>,
    width_px: u32,
    height_px: u32,
}

impl StampImage {
    /// Probe encoded image bytes. Any format the `image` crate can read is
    /// accepted here; export only embeds PNG.
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> SessionResult<Self> {
        let bytes = bytes.into();
        let reader = image::ImageReader::new(Cursor::new(&bytes[..]))
            .with_guessed_format()
            .map_err(|err| SessionError::InvalidStampImage(err.to_string()))?;
        let format = reader.format();
        let (width_px, height_px) = reader
            .into_dimensions()
            .map_err(|err| SessionError::InvalidStampImage(err.to_string()))?;
        if width_px == 0 || height_px == 0 {
            return Err(SessionError::InvalidStampImage("image has no pixels".to_string()));
        }

        Ok(Self { bytes, format, width_px, height_px })
    }

    /// Encode a captured raster (for example a signature pad) as a PNG stamp
    pub fn from_rgba(raster: &RgbaImage) -> SessionResult<Self> {
        let mut encoded = Cursor::new(Vec::new());
        raster
            .write_to(&mut encoded, ImageFormat::Png)
            .map_err(|err| SessionError::InvalidStampImage(err.to_string()))?;
        Self::from_bytes(encoded.into_inner())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn format(&self) -> Option<ImageFormat> {
        self.format
    }

    pub fn is_png(&self) -> bool {
        self.format == Some(ImageFormat::Png)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width_px, self.height_px)
    }

    /// Height over width
    pub fn aspect_ratio(&self) -> f32 {
        self.height_px as f32 / self.width_px as f32
    }
}

/// Text box content and style
#[derive(Debug, Clone, PartialEq)]
pub struct TextAnnotation {
    pub content: String,
    /// Viewport pixels at the session scale
    pub font_size: f32,
    pub color: Rgb,
    pub font: FontFamily,
}

impl TextAnnotation {
    /// Lines in drawing order; a trailing carriage return is dropped
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.content.split('\n').map(|line| line.strip_suffix('\r').unwrap_or(line))
    }

    fn estimated_extent(&self) -> (f32, f32) {
        let mut longest = 0usize;
        let mut count = 0usize;
        for line in self.lines() {
            longest = longest.max(line.chars().count());
            count += 1;
        }
        let width = longest.max(1) as f32 * self.font_size * GLYPH_WIDTH_ESTIMATE;
        let height = count.max(1) as f32 * self.font_size * LINE_HEIGHT;
        (width, height)
    }
}

/// Placed image; height follows from the image's aspect ratio
#[derive(Debug, Clone, PartialEq)]
pub struct ImageStamp {
    pub image: StampImage,
    /// Viewport pixels at the session scale
    pub width: f32,
}

impl ImageStamp {
    pub fn height(&self) -> f32 {
        self.width * self.image.aspect_ratio()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationKind {
    Text(TextAnnotation),
    Stamp(ImageStamp),
}

impl AnnotationKind {
    pub fn name(&self) -> &'static str {
        match self {
            AnnotationKind::Text(_) => "text",
            AnnotationKind::Stamp(_) => "stamp",
        }
    }
}

/// An overlay object owned by exactly one page
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub(crate) id: AnnotationId,
    pub(crate) page_index: u32,
    pub(crate) position: ViewportPoint,
    pub(crate) kind: AnnotationKind,
}

impl Annotation {
    pub(crate) fn new(page_index: u32, position: ViewportPoint, kind: AnnotationKind) -> Self {
        Self { id: AnnotationId::new_v4(), page_index, position, kind }
    }

    pub fn id(&self) -> AnnotationId {
        self.id
    }

    pub fn page_index(&self) -> u32 {
        self.page_index
    }

    /// Top-left corner in viewport pixels
    pub fn position(&self) -> ViewportPoint {
        self.position
    }

    pub fn kind(&self) -> &AnnotationKind {
        &self.kind
    }

    pub fn as_text(&self) -> Option<&TextAnnotation> {
        match &self.kind {
            AnnotationKind::Text(text) => Some(text),
            AnnotationKind::Stamp(_) => None,
        }
    }

    /// Width and height in viewport pixels. Text extents are estimated from
    /// the character count since no font metrics are available here.
    pub fn extent(&self) -> (f32, f32) {
        match &self.kind {
            AnnotationKind::Text(text) => text.estimated_extent(),
            AnnotationKind::Stamp(stamp) => (stamp.width, stamp.height()),
        }
    }

    pub fn contains(&self, point: ViewportPoint) -> bool {
        let (width, height) = self.extent();
        let local = point - self.position;
        local.x >= 0.0 && local.y >= 0.0 && local.x <= width && local.y <= height
    }

    /// Apply a render scale change to every viewport quantity
    pub(crate) fn rescale(&mut self, factor: f32) {
        self.position = self.position.scaled(factor);
        match &mut self.kind {
            AnnotationKind::Text(text) => text.font_size *= factor,
            AnnotationKind::Stamp(stamp) => stamp.width *= factor,
        }
    }
}
