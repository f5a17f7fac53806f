//! Flattening a session into a standalone PDF
//!
//! Export happens in two steps. [`plan_export`] derives, per page, the ordered
//! placements in document space without touching any encoder. [`replay`] then
//! issues those placements against an [`EditableDocument`]. Within a page,
//! annotations follow store order and the freehand layer always comes last.

use crate::annotation::{AnnotationKind, LINE_HEIGHT};
use crate::coords::{to_document_length, to_document_space, Anchor, DocumentPoint, ViewportPoint};
use crate::error::{SessionError, SessionResult};
use crate::session::Session;
use doc_model::{FontFamily, Rgb};
use pdf_engine::{EditableDocument, ImagePlacement, PdfEncoder, TextRun};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum FlattenItem {
    /// One line of text; `origin` is the baseline start
    Text { text: String, origin: DocumentPoint, size: f32, font: FontFamily, color: Rgb },
    /// PNG stamp; `origin` is the bottom-left corner
    Stamp { png: Arc<[u8]>, origin: DocumentPoint, width: f32, height: f32 },
    /// Full-page ink overlay
    Freehand { png: Vec<u8>, width: f32, height: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PagePlan {
    pub page_index: u32,
    pub items: Vec<FlattenItem>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExportPlan {
    pub pages: Vec<PagePlan>,
}

impl ExportPlan {
    pub fn item_count(&self) -> usize {
        self.pages.iter().map(|page| page.items.len()).sum()
    }
}

/// Document-space placements for every page of `session`
pub fn plan_export(session: &Session) -> SessionResult<ExportPlan> {
    let scale = session.scale();
    let mut pages = Vec::with_capacity(session.pages().len());

    for page in session.pages() {
        let height_pt = page.size().height_pt;
        let mut items = Vec::new();

        for annotation in session.annotations().list(page.index()) {
            let position = annotation.position();
            match annotation.kind() {
                AnnotationKind::Text(text) => {
                    let line_advance = text.font_size * LINE_HEIGHT;
                    for (line_index, line) in text.lines().enumerate() {
                        if line.is_empty() {
                            continue;
                        }
                        let top = position + ViewportPoint::new(0.0, line_index as f32 * line_advance);
                        let anchor = Anchor::TextBaseline { font_size_px: text.font_size };
                        items.push(FlattenItem::Text {
                            text: line.to_string(),
                            origin: to_document_space(top, height_pt, scale, anchor),
                            size: to_document_length(text.font_size, scale),
                            font: text.font,
                            color: text.color,
                        });
                    }
                }
                AnnotationKind::Stamp(stamp) => {
                    if !stamp.image.is_png() {
                        let found = stamp
                            .image
                            .format()
                            .map_or_else(|| "unknown".to_string(), |format| format!("{format:?}"));
                        return Err(SessionError::UnsupportedStamp {
                            id: annotation.id(),
                            reason: format!("{found} images cannot be embedded; only PNG is supported"),
                        });
                    }
                    let height_px = stamp.height();
                    items.push(FlattenItem::Stamp {
                        png: stamp.image.shared_bytes(),
                        origin: to_document_space(
                            position,
                            height_pt,
                            scale,
                            Anchor::ImageTop { height_px },
                        ),
                        width: to_document_length(stamp.width, scale),
                        height: to_document_length(height_px, scale),
                    });
                }
            }
        }

        if !page.freehand().is_empty() {
            let png = page
                .freehand()
                .encode_png()
                .map_err(|source| SessionError::FreehandEncoding { page: page.index(), source })?;
            items.push(FlattenItem::Freehand {
                png,
                width: page.size().width_pt,
                height: page.size().height_pt,
            });
        }

        pages.push(PagePlan { page_index: page.index(), items });
    }

    Ok(ExportPlan { pages })
}

/// Issue every placement of `plan` against `document`, in plan order
pub fn replay<D>(plan: &ExportPlan, document: &mut D) -> SessionResult<()>
where
    D: EditableDocument + ?Sized,
{
    for page in &plan.pages {
        for item in &page.items {
            let placed = match item {
                FlattenItem::Text { text, origin, size, font, color } => {
                    let run = TextRun {
                        text,
                        x: origin.x,
                        y: origin.y,
                        size: *size,
                        font: *font,
                        color: *color,
                    };
                    document.place_text(page.page_index, &run)
                }
                FlattenItem::Stamp { png, origin, width, height } => {
                    let placement = ImagePlacement {
                        bytes: png,
                        x: origin.x,
                        y: origin.y,
                        width: *width,
                        height: *height,
                    };
                    document.place_image(page.page_index, &placement)
                }
                FlattenItem::Freehand { png, width, height } => {
                    let placement =
                        ImagePlacement { bytes: png, x: 0.0, y: 0.0, width: *width, height: *height };
                    document.place_image(page.page_index, &placement)
                }
            };
            placed.map_err(SessionError::Encoding)?;
        }
    }
    Ok(())
}

/// Plan, open the source bytes for editing, replay and serialize
#[tracing::instrument(skip_all, fields(pages = session.page_count()))]
pub fn flatten<E>(session: &Session, encoder: &E) -> SessionResult<Vec<u8>>
where
    E: PdfEncoder + ?Sized,
{
    let plan = plan_export(session)?;
    let mut document =
        encoder.open_for_edit(session.source_bytes()).map_err(SessionError::OpenForEdit)?;
    let encoder_pages = document.page_count();
    if encoder_pages != session.page_count() {
        return Err(SessionError::PageCountMismatch {
            encoder: encoder_pages,
            session: session.page_count(),
        });
    }

    replay(&plan, &mut document)?;
    let bytes = document.save().map_err(SessionError::Encoding)?;
    tracing::info!(placements = plan.item_count(), bytes = bytes.len(), "export complete");
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::tests::png_stamp;
    use crate::annotation::StampImage;
    use crate::session::tests::session;
    use crate::tool::Tool;
    use pdf_engine::PdfEngineError;

    #[derive(Debug, Default)]
    struct RecordingDocument {
        pages: u32,
        calls: Vec<String>,
    }

    impl EditableDocument for RecordingDocument {
        fn page_count(&self) -> u32 {
            self.pages
        }

        fn place_text(&mut self, page_index: u32, run: &TextRun<'_>) -> Result<(), PdfEngineError> {
            self.calls.push(format!("text p{page_index} {}", run.text));
            Ok(())
        }

        fn place_image(
            &mut self,
            page_index: u32,
            image: &ImagePlacement<'_>,
        ) -> Result<(), PdfEngineError> {
            self.calls.push(format!("image p{page_index} {}x{}", image.width, image.height));
            Ok(())
        }

        fn save(self) -> Result<Vec<u8>, PdfEngineError> {
            Ok(self.calls.join("\n").into_bytes())
        }
    }

    struct RecordingEncoder {
        pages: u32,
    }

    impl PdfEncoder for RecordingEncoder {
        type Document = RecordingDocument;

        fn open_for_edit(&self, _bytes: &[u8]) -> Result<Self::Document, PdfEngineError> {
            Ok(RecordingDocument { pages: self.pages, calls: Vec::new() })
        }
    }

    fn assert_close(actual: f32, expected: f32) {
        assert!((actual - expected).abs() < 1e-2, "expected {expected}, got {actual}");
    }

    fn jpeg_stamp() -> StampImage {
        let raster = image::RgbImage::from_pixel(8, 8, image::Rgb([10, 20, 30]));
        let mut encoded = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(raster)
            .write_to(&mut encoded, image::ImageFormat::Jpeg)
            .expect("jpeg should encode");
        StampImage::from_bytes(encoded.into_inner()).expect("jpeg should probe")
    }

    #[test]
    fn text_lands_on_baseline_in_document_space() {
        let mut session = session(1);
        session.add_text(0, ViewportPoint::new(100.0, 200.0), "Hello").expect("add");

        let plan = plan_export(&session).expect("plan");
        let [FlattenItem::Text { text, origin, size, .. }] = plan.pages[0].items.as_slice() else {
            panic!("expected one text item, got {:?}", plan.pages[0].items)
        };
        assert_eq!(text, "Hello");
        assert_close(origin.x, 66.67);
        assert_close(origin.y, 656.0);
        assert_close(*size, 10.67);
    }

    #[test]
    fn untouched_pages_issue_no_placements() {
        let session = session(3);
        let plan = plan_export(&session).expect("plan");
        assert_eq!(plan.pages.len(), 3);
        assert_eq!(plan.item_count(), 0);

        let bytes = flatten(&session, &RecordingEncoder { pages: 3 }).expect("flatten");
        assert!(bytes.is_empty());
    }

    #[test]
    fn moved_annotation_keeps_its_draw_order() {
        let mut session = session(1);
        session.add_text(0, ViewportPoint::new(10.0, 10.0), "first").expect("add");
        let second = session.add_text(0, ViewportPoint::new(300.0, 300.0), "second").expect("add");
        session.move_annotation(second, ViewportPoint::new(10.0, 10.0)).expect("move");

        let bytes = flatten(&session, &RecordingEncoder { pages: 1 }).expect("flatten");
        assert_eq!(String::from_utf8_lossy(&bytes), "text p0 first\ntext p0 second");
    }

    #[test]
    fn multi_line_text_advances_per_line() {
        let mut session = session(1);
        session.add_text(0, ViewportPoint::new(0.0, 0.0), "one\n\nthree").expect("add");

        let plan = plan_export(&session).expect("plan");
        let origins: Vec<_> = plan.pages[0]
            .items
            .iter()
            .map(|item| match item {
                FlattenItem::Text { origin, .. } => origin.y,
                other => panic!("unexpected item {other:?}"),
            })
            .collect();
        // 16px font at 1.5: baseline 10.67pt below the top, lines 12.8pt apart
        assert_eq!(origins.len(), 2);
        assert_close(origins[0], 800.0 - 10.667);
        assert_close(origins[1], 800.0 - 10.667 - 2.0 * 12.8);
    }

    #[test]
    fn stamp_is_anchored_by_its_bottom_left_corner() {
        let mut session = session(1);
        session.add_stamp(0, ViewportPoint::new(0.0, 0.0), png_stamp(200, 100), None).expect("add");

        let plan = plan_export(&session).expect("plan");
        let [FlattenItem::Stamp { origin, width, height, .. }] = plan.pages[0].items.as_slice() else {
            panic!("expected one stamp item")
        };
        assert_close(origin.x, 0.0);
        assert_close(origin.y, 750.0);
        assert_close(*width, 100.0);
        assert_close(*height, 50.0);
    }

    #[test]
    fn freehand_layer_is_drawn_last() {
        let mut session = session(2);
        session.add_text(1, ViewportPoint::new(50.0, 50.0), "over ink").expect("add");
        session.select_tool(Tool::Draw).expect("draw tool");
        session.pointer_down(1, ViewportPoint::new(10.0, 10.0)).expect("down");
        session.pointer_move(ViewportPoint::new(80.0, 90.0)).expect("move");
        session.pointer_up();

        let plan = plan_export(&session).expect("plan");
        assert!(plan.pages[0].items.is_empty());
        let items = &plan.pages[1].items;
        assert_eq!(items.len(), 2);
        assert!(matches!(items[0], FlattenItem::Text { .. }));
        let FlattenItem::Freehand { png, width, height } = &items[1] else {
            panic!("freehand should come last")
        };
        assert_eq!(image::guess_format(png).expect("png"), image::ImageFormat::Png);
        assert_eq!((*width, *height), (600.0, 800.0));
    }

    #[test]
    fn jpeg_stamp_fails_export_with_encoding_error() {
        let mut session = session(1);
        let id = session.add_stamp(0, ViewportPoint::new(0.0, 0.0), jpeg_stamp(), None).expect("add");

        let err = flatten(&session, &RecordingEncoder { pages: 1 }).expect_err("jpeg is not embeddable");
        assert_eq!(err.kind(), crate::ErrorKind::Encoding);
        assert!(matches!(err, SessionError::UnsupportedStamp { id: failed, .. } if failed == id));
        assert_eq!(session.annotations().len(), 1);
    }

    #[test]
    fn page_count_mismatch_is_reported() {
        let session = session(2);
        let err = flatten(&session, &RecordingEncoder { pages: 1 }).expect_err("mismatch");
        assert!(matches!(err, SessionError::PageCountMismatch { encoder: 1, session: 2 }));
    }

    #[test]
    fn repeated_exports_issue_identical_calls() {
        let mut session = session(1);
        session.add_text(0, ViewportPoint::new(5.0, 5.0), "same").expect("add");
        session.add_stamp(0, ViewportPoint::new(40.0, 40.0), png_stamp(10, 10), Some(30.0)).expect("add");

        let encoder = RecordingEncoder { pages: 1 };
        let first = flatten(&session, &encoder).expect("flatten");
        let second = flatten(&session, &encoder).expect("flatten");
        assert_eq!(first, second);
        assert_eq!(plan_export(&session).expect("plan"), plan_export(&session).expect("plan"));
    }
}
