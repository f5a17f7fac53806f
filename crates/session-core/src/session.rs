//! One loaded document and everything drawn on it
//!
//! A [`Session`] is replaced wholesale when a new document loads; nothing
//! from a previous document leaks into it except the editor style.

use crate::annotation::{
    Annotation, AnnotationId, AnnotationKind, ImageStamp, StampImage, TextAnnotation,
};
use crate::controller::Generation;
use crate::coords::{rescale_factor, ViewportPoint};
use crate::drag::DragController;
use crate::error::{SessionError, SessionResult};
use crate::freehand::{stroke_segments, Brush, StrokeSegment};
use crate::page::{OverlayMode, PageLayerSet};
use crate::store::AnnotationStore;
use crate::tool::{Tool, ToolStateMachine};
use doc_model::{EditorPreferences, FontFamily, Rgb};
use pdf_engine::{DocumentHandle, RenderedPage};
use std::sync::Arc;

/// Style applied to newly created annotations and strokes
#[derive(Debug, Clone, PartialEq)]
pub struct EditorStyle {
    /// Viewport pixels
    pub font_size: f32,
    pub font_color: Rgb,
    pub font_family: FontFamily,
    pub brush: Brush,
    /// Default stamp width in viewport pixels
    pub stamp_width: f32,
    pub default_text: String,
}

impl Default for EditorStyle {
    fn default() -> Self {
        Self::from(&EditorPreferences::default())
    }
}

impl From<&EditorPreferences> for EditorStyle {
    fn from(prefs: &EditorPreferences) -> Self {
        Self {
            font_size: prefs.font_size,
            font_color: prefs.font_color,
            font_family: prefs.font_family,
            brush: Brush { color: prefs.brush_color, size: prefs.brush_size },
            stamp_width: prefs.stamp_width,
            default_text: prefs.default_text.clone(),
        }
    }
}

/// What a pointer event did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerOutcome {
    /// No layer accepted the event
    Ignored,
    Created(AnnotationId),
    DragStarted(AnnotationId),
    Dragged(AnnotationId),
    /// Ink was added to a freehand layer
    Inked,
    /// A drag or stroke ended
    Released,
}

/// Text annotation currently being edited
#[derive(Debug, Clone, PartialEq)]
pub struct TextFocus {
    id: AnnotationId,
    buffer: String,
}

impl TextFocus {
    pub fn id(&self) -> AnnotationId {
        self.id
    }

    /// Uncommitted content
    pub fn buffer(&self) -> &str {
        &self.buffer
    }
}

#[derive(Debug, Clone, Copy)]
struct ActiveStroke {
    page_index: u32,
    last: ViewportPoint,
}

#[derive(Debug)]
pub struct Session {
    generation: Generation,
    document: DocumentHandle,
    source: Arc<[u8]>,
    scale: f32,
    pages: Vec<PageLayerSet>,
    store: AnnotationStore,
    tools: ToolStateMachine,
    drag: DragController,
    stroke: Option<ActiveStroke>,
    focus: Option<TextFocus>,
    style: EditorStyle,
}

impl Session {
    pub(crate) fn new(
        generation: Generation,
        document: DocumentHandle,
        source: Arc<[u8]>,
        scale: f32,
        rendered: Vec<RenderedPage>,
        style: EditorStyle,
    ) -> Self {
        let tools = ToolStateMachine::new();
        let input = tools.active().input_eligibility();
        let pages: Vec<_> = rendered
            .into_iter()
            .enumerate()
            .map(|(index, page)| PageLayerSet::new(index as u32, page, scale, input))
            .collect();
        let store = AnnotationStore::with_pages(pages.len() as u32);

        Self {
            generation,
            document,
            source,
            scale,
            pages,
            store,
            tools,
            drag: DragController::new(),
            stroke: None,
            focus: None,
            style,
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Decoder handle the pages were rendered from
    pub fn document(&self) -> DocumentHandle {
        self.document
    }

    /// The original document bytes, kept for export
    pub fn source_bytes(&self) -> &[u8] {
        &self.source
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    pub fn pages(&self) -> &[PageLayerSet] {
        &self.pages
    }

    pub fn page(&self, page_index: u32) -> SessionResult<&PageLayerSet> {
        self.pages.get(page_index as usize).ok_or(SessionError::PageOutOfRange {
            page: page_index,
            page_count: self.page_count(),
        })
    }

    pub fn annotations(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn tool(&self) -> Tool {
        self.tools.active()
    }

    pub fn pending_stamp(&self) -> Option<&StampImage> {
        self.tools.pending_stamp()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_dragging()
    }

    pub fn drag_target(&self) -> Option<AnnotationId> {
        self.drag.target()
    }

    pub fn text_focus(&self) -> Option<&TextFocus> {
        self.focus.as_ref()
    }

    pub fn style(&self) -> &EditorStyle {
        &self.style
    }

    pub fn set_font_size(&mut self, font_size: f32) -> SessionResult<()> {
        self.style.font_size = positive("font size", font_size)?;
        Ok(())
    }

    pub fn set_font_color(&mut self, color: Rgb) {
        self.style.font_color = color;
    }

    pub fn set_font_family(&mut self, font: FontFamily) {
        self.style.font_family = font;
    }

    pub fn set_brush(&mut self, brush: Brush) -> SessionResult<()> {
        positive("brush size", brush.size)?;
        self.style.brush = brush;
        Ok(())
    }

    pub fn set_stamp_width(&mut self, width: f32) -> SessionResult<()> {
        self.style.stamp_width = positive("stamp width", width)?;
        Ok(())
    }

    /// Switch tools. Any text edit in progress is committed first.
    pub fn select_tool(&mut self, tool: Tool) -> SessionResult<()> {
        self.commit_text_edit();
        self.stroke = None;
        self.tools.select(tool, &mut self.pages)
    }

    /// Arm `image` for a single placement; activates the stamp tool
    pub fn arm_stamp(&mut self, image: StampImage) {
        self.commit_text_edit();
        self.stroke = None;
        self.tools.arm_stamp(image, &mut self.pages);
    }

    /// Pointer pressed on `page_index` at a viewport position on that page
    pub fn pointer_down(
        &mut self,
        page_index: u32,
        point: ViewportPoint,
    ) -> SessionResult<PointerOutcome> {
        let page = self.page(page_index)?;
        let (input, on_page) = (page.input(), page.contains(point));
        if self.drag.is_dragging() {
            return Err(SessionError::DragInProgress);
        }
        if !on_page {
            tracing::debug!(page = page_index, x = point.x, y = point.y, "pointer outside page");
            return Ok(PointerOutcome::Ignored);
        }
        self.commit_text_edit();

        if input.freehand {
            self.stroke = Some(ActiveStroke { page_index, last: point });
            self.ink(page_index, StrokeSegment::dot(point));
            return Ok(PointerOutcome::Inked);
        }

        match (input.overlay, self.tools.active()) {
            (OverlayMode::Disabled, _) => {
                tracing::warn!(
                    page = page_index,
                    tool = %self.tools.active(),
                    "pointer input rejected; overlay disabled"
                );
                Ok(PointerOutcome::Ignored)
            }
            (OverlayMode::Create, Tool::Stamp) => self.place_pending_stamp(page_index, point),
            (mode, tool) => {
                if let Some(id) = self.store.hit_test(page_index, point) {
                    self.drag.begin_drag(&self.store, id, point)?;
                    let is_text = self.store.get(id).is_some_and(|hit| hit.as_text().is_some());
                    if tool == Tool::Text && is_text {
                        self.focus_text(id)?;
                    }
                    return Ok(PointerOutcome::DragStarted(id));
                }
                if mode == OverlayMode::Create && tool == Tool::Text {
                    let content = self.style.default_text.clone();
                    let id = self.add_text(page_index, point, content.clone())?;
                    self.focus = Some(TextFocus { id, buffer: content });
                    return Ok(PointerOutcome::Created(id));
                }
                Ok(PointerOutcome::Ignored)
            }
        }
    }

    pub fn pointer_move(&mut self, point: ViewportPoint) -> SessionResult<PointerOutcome> {
        if let Some(id) = self.drag.on_pointer_move(&mut self.store, point)? {
            return Ok(PointerOutcome::Dragged(id));
        }
        if let Some(stroke) = self.stroke.as_mut() {
            let segment = StrokeSegment::new(stroke.last, point);
            stroke.last = point;
            let page_index = stroke.page_index;
            self.ink(page_index, segment);
            return Ok(PointerOutcome::Inked);
        }
        Ok(PointerOutcome::Ignored)
    }

    /// Ink a whole recorded stroke on `page_index` in one call. The stroke
    /// must start on the page; later samples may leave it.
    pub fn apply_stroke(
        &mut self,
        page_index: u32,
        samples: &[ViewportPoint],
    ) -> SessionResult<PointerOutcome> {
        let page = self.page(page_index)?;
        let (input, starts_on_page) =
            (page.input(), samples.first().is_some_and(|first| page.contains(*first)));
        if self.drag.is_dragging() {
            return Err(SessionError::DragInProgress);
        }
        if !input.freehand {
            tracing::warn!(page = page_index, tool = %self.tools.active(), "stroke rejected; freehand disabled");
            return Ok(PointerOutcome::Ignored);
        }
        if !starts_on_page {
            return Ok(PointerOutcome::Ignored);
        }

        self.commit_text_edit();
        self.stroke = None;
        for segment in stroke_segments(samples) {
            self.ink(page_index, segment);
        }
        Ok(PointerOutcome::Inked)
    }

    pub fn pointer_up(&mut self) -> PointerOutcome {
        let dragged = self.drag.end_drag();
        let stroked = self.stroke.take();
        match (dragged, stroked) {
            (None, None) => PointerOutcome::Ignored,
            _ => PointerOutcome::Released,
        }
    }

    /// Give edit focus to a text annotation, committing any previous edit
    pub fn focus_text(&mut self, id: AnnotationId) -> SessionResult<()> {
        let annotation = self.store.get(id).ok_or(SessionError::AnnotationNotFound(id))?;
        let content = annotation.as_text().ok_or(SessionError::NotText(id))?.content.clone();
        self.commit_text_edit();
        self.focus = Some(TextFocus { id, buffer: content });
        Ok(())
    }

    /// Replace the focused annotation's uncommitted content
    pub fn edit_text(&mut self, content: impl Into<String>) -> SessionResult<()> {
        let focus = self.focus.as_mut().ok_or(SessionError::NoTextFocus)?;
        focus.buffer = content.into();
        Ok(())
    }

    /// Write the focused buffer back to its annotation and drop focus
    pub fn commit_text_edit(&mut self) -> Option<AnnotationId> {
        let focus = self.focus.take()?;
        match self.store.set_content(focus.id, focus.buffer) {
            Ok(()) => Some(focus.id),
            Err(err) => {
                tracing::debug!(id = %focus.id, error = %err, "dropped text edit");
                None
            }
        }
    }

    /// Add a text annotation in the current style
    pub fn add_text(
        &mut self,
        page_index: u32,
        position: ViewportPoint,
        content: impl Into<String>,
    ) -> SessionResult<AnnotationId> {
        let kind = AnnotationKind::Text(TextAnnotation {
            content: content.into(),
            font_size: self.style.font_size,
            color: self.style.font_color,
            font: self.style.font_family,
        });
        let id = self.store.add(page_index, position, kind)?;
        tracing::debug!(%id, page = page_index, "text annotation added");
        Ok(id)
    }

    /// Add a stamp; `width` defaults to the style's stamp width
    pub fn add_stamp(
        &mut self,
        page_index: u32,
        position: ViewportPoint,
        image: StampImage,
        width: Option<f32>,
    ) -> SessionResult<AnnotationId> {
        let width = positive("stamp width", width.unwrap_or(self.style.stamp_width))?;
        let kind = AnnotationKind::Stamp(ImageStamp { image, width });
        let id = self.store.add(page_index, position, kind)?;
        tracing::debug!(%id, page = page_index, width, "stamp placed");
        Ok(id)
    }

    pub fn move_annotation(&mut self, id: AnnotationId, position: ViewportPoint) -> SessionResult<()> {
        self.store.move_to(id, position)
    }

    /// Remove an annotation, dropping any focus or drag that points at it
    pub fn delete_annotation(&mut self, id: AnnotationId) -> SessionResult<Annotation> {
        let removed = self.store.remove(id).ok_or(SessionError::AnnotationNotFound(id))?;
        if self.focus.as_ref().is_some_and(|focus| focus.id == id) {
            self.focus = None;
        }
        if self.drag.target() == Some(id) {
            self.drag.cancel();
        }
        tracing::debug!(%id, "annotation deleted");
        Ok(removed)
    }

    /// Install rasters rendered at `scale` and carry every viewport quantity
    /// over. Freehand ink keeps its captured grid.
    pub(crate) fn apply_rescale(&mut self, scale: f32, rendered: Vec<RenderedPage>) {
        let factor = rescale_factor(self.scale, scale);
        self.drag.cancel();
        self.stroke = None;
        self.store.rescale(factor);
        for (page, rendered) in self.pages.iter_mut().zip(rendered) {
            page.replace_raster(rendered, scale);
        }
        self.scale = scale;
    }

    fn place_pending_stamp(
        &mut self,
        page_index: u32,
        point: ViewportPoint,
    ) -> SessionResult<PointerOutcome> {
        let image = self.tools.stamp_placed(&mut self.pages).ok_or(SessionError::NoStampArmed)?;
        let id = self.add_stamp(page_index, point, image, None)?;
        Ok(PointerOutcome::Created(id))
    }

    fn ink(&mut self, page_index: u32, segment: StrokeSegment) {
        let brush = self.style.brush;
        let scale = self.scale;
        if let Some(page) = self.pages.get_mut(page_index as usize) {
            page.freehand_mut().append_segment(segment, &brush, scale);
        }
    }
}

fn positive(what: &'static str, value: f32) -> SessionResult<f32> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(SessionError::InvalidStyle(format!("{what} must be positive, got {value}")))
    }
}
