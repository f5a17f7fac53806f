use image::{ImageFormat, Rgba, RgbaImage};
use lopdf::Document;
use pdf_engine::fixtures::blank_document;
use pdf_engine::{LopdfEncoder, LopdfEngine, PageSize};
use session_core::{
    to_document_space, Anchor, ErrorKind, PointerOutcome, SessionController, SessionError,
    StampImage, Tool, ViewportPoint,
};
use std::io::Cursor;

fn two_page_pdf() -> Vec<u8> {
    blank_document(&[PageSize::new(600.0, 800.0), PageSize::LETTER]).expect("fixture should build")
}

fn loaded() -> (SessionController, LopdfEngine) {
    let mut engine = LopdfEngine::new();
    let mut controller = SessionController::default();
    controller.load_document(&mut engine, two_page_pdf()).expect("fixture should load");
    (controller, engine)
}

fn page_content(bytes: &[u8], page_number: u32) -> String {
    let doc = Document::load_mem(bytes).expect("export should parse");
    let page_id = doc.get_pages()[&page_number];
    let content = doc.get_page_content(page_id).expect("page content should decode");
    String::from_utf8_lossy(&content).into_owned()
}

fn signature_png() -> StampImage {
    let raster = RgbaImage::from_pixel(120, 40, Rgba([20, 20, 120, 255]));
    StampImage::from_rgba(&raster).expect("signature should encode")
}

#[test]
fn load_builds_one_layer_set_per_page() {
    let (controller, _engine) = loaded();
    let session = controller.session().expect("session should exist");

    assert_eq!(session.page_count(), 2);
    assert_eq!(session.scale(), 1.5);
    assert_eq!(session.pages()[0].raster().dimensions(), (900, 1200));
    assert_eq!(session.pages()[1].size(), PageSize::LETTER);
    assert_eq!(session.tool(), Tool::Cursor);
}

#[test]
fn typed_text_is_flattened_at_its_baseline() {
    let (mut controller, _engine) = loaded();
    let session = controller.require_session().expect("session should exist");
    session.select_tool(Tool::Text).expect("text tool");
    session.pointer_down(0, ViewportPoint::new(100.0, 200.0)).expect("click should create text");
    session.pointer_up();
    session.edit_text("Hello").expect("new text should have focus");

    // the focused edit is committed by export itself
    let bytes = controller.export(&LopdfEncoder).expect("export should succeed");

    let content = page_content(&bytes, 1);
    assert!(content.contains("66.667 656.000 Td"), "unexpected content: {content}");
    assert!(content.contains("(Hello) Tj"));
    assert!(!page_content(&bytes, 2).contains("Tj ET Q"));
    let session = controller.session().expect("session should exist");
    assert!(session.text_focus().is_none());
}

#[test]
fn export_keeps_page_count_and_embeds_ink_and_stamps() {
    let (mut controller, _engine) = loaded();
    let session = controller.require_session().expect("session should exist");
    session.arm_stamp(signature_png());
    let placed = session.pointer_down(1, ViewportPoint::new(30.0, 40.0)).expect("stamp click");
    assert!(matches!(placed, PointerOutcome::Created(_)));
    session.pointer_up();

    session.select_tool(Tool::Draw).expect("draw tool");
    session.pointer_down(1, ViewportPoint::new(10.0, 10.0)).expect("stroke start");
    session.pointer_move(ViewportPoint::new(200.0, 220.0)).expect("stroke move");
    session.pointer_up();

    let bytes = controller.export(&LopdfEncoder).expect("export should succeed");
    let doc = Document::load_mem(&bytes).expect("export should parse");
    assert_eq!(doc.get_pages().len(), 2);

    let content = page_content(&bytes, 2);
    let stamp_at = content.find("/PmIm1 Do").expect("stamp should be drawn");
    let ink_at = content.find("/PmIm2 Do").expect("ink should be drawn");
    assert!(stamp_at < ink_at);
    assert!(content.contains("612.000 0 0 792.000 0.000 0.000 cm"));
}

#[test]
fn rescale_preserves_document_placement() {
    let (mut controller, engine) = loaded();
    let session = controller.require_session().expect("session should exist");
    let id = session.add_text(0, ViewportPoint::new(150.0, 300.0), "anchored").expect("add");
    let anchor = Anchor::TextBaseline { font_size_px: 16.0 };
    let before = to_document_space(ViewportPoint::new(150.0, 300.0), 800.0, 1.5, anchor);

    controller.change_scale(&engine, 3.0).expect("rescale should succeed");

    let session = controller.session().expect("session should exist");
    assert_eq!(session.pages()[0].raster().dimensions(), (1800, 2400));
    let annotation = session.annotations().get(id).expect("annotation should survive");
    let font_size = annotation.as_text().map(|text| text.font_size).expect("text");
    let after = to_document_space(
        annotation.position(),
        800.0,
        3.0,
        Anchor::TextBaseline { font_size_px: font_size },
    );
    assert!((before.x - after.x).abs() < 1e-3);
    assert!((before.y - after.y).abs() < 1e-3);
    // ink grid stays at the scale of first render
    assert_eq!(session.pages()[0].freehand().dimensions(), (900, 1200));
}

#[test]
fn bad_bytes_leave_the_session_alone() {
    let (mut controller, mut engine) = loaded();
    let before = controller.session().map(|session| session.generation());

    let err = controller
        .load_document(&mut engine, b"plain text, not a document".to_vec())
        .expect_err("text is not a pdf");
    assert!(matches!(err, SessionError::NotPdf));

    let err = controller
        .load_document(&mut engine, b"%PDF-1.7\n1 0 obj <<".to_vec())
        .expect_err("truncated pdf");
    assert!(matches!(err, SessionError::Decode(_)));
    assert_eq!(err.kind(), ErrorKind::Input);

    assert_eq!(controller.session().map(|session| session.generation()), before);
    assert!(!controller.is_loading());
}

#[test]
fn loading_a_second_document_replaces_everything() {
    let (mut controller, mut engine) = loaded();
    let session = controller.require_session().expect("session should exist");
    session.add_text(0, ViewportPoint::new(1.0, 1.0), "old").expect("add");

    let single = blank_document(&[PageSize::new(300.0, 300.0)]).expect("fixture should build");
    controller.load_document(&mut engine, single).expect("second load");

    let session = controller.session().expect("session should exist");
    assert_eq!(session.page_count(), 1);
    assert!(session.annotations().is_empty());
}

#[test]
fn export_without_document_fails() {
    let mut controller = SessionController::default();
    let err = controller.export(&LopdfEncoder).expect_err("nothing loaded");
    assert!(matches!(err, SessionError::NoDocument));
}

#[test]
fn jpeg_stamp_aborts_export() {
    let (mut controller, _engine) = loaded();
    let raster = image::RgbImage::from_pixel(16, 16, image::Rgb([200, 10, 10]));
    let mut jpeg = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(raster)
        .write_to(&mut jpeg, ImageFormat::Jpeg)
        .expect("jpeg should encode");
    let stamp = StampImage::from_bytes(jpeg.into_inner()).expect("jpeg should probe");

    let session = controller.require_session().expect("session should exist");
    session.add_stamp(0, ViewportPoint::new(0.0, 0.0), stamp, None).expect("add");

    let err = controller.export(&LopdfEncoder).expect_err("jpeg cannot be embedded");
    assert_eq!(err.kind(), ErrorKind::Encoding);
}
