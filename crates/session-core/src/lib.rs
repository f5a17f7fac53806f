//! Annotation session engine
//!
//! Loads a PDF through a [`PdfDecoder`](pdf_engine::PdfDecoder), keeps
//! per-page annotations and freehand ink in viewport space while the user
//! edits, and flattens everything back onto the original document through a
//! [`PdfEncoder`](pdf_engine::PdfEncoder).

pub mod annotation;
pub mod controller;
pub mod coords;
pub mod drag;
pub mod error;
pub mod export;
pub mod freehand;
pub mod page;
pub mod session;
pub mod store;
pub mod tool;

pub use annotation::{
    Annotation, AnnotationId, AnnotationKind, ImageStamp, StampImage, TextAnnotation, LINE_HEIGHT,
};
pub use controller::{Delivery, Generation, LoadTicket, RescaleTicket, SessionController};
pub use coords::{to_document_space, to_viewport_space, Anchor, DocumentPoint, ViewportPoint};
pub use drag::DragController;
pub use error::{ErrorKind, SessionError, SessionResult};
pub use export::{flatten, plan_export, replay, ExportPlan, FlattenItem, PagePlan};
pub use freehand::{stroke_segments, Brush, FreehandLayer, StrokeSegment};
pub use page::{InputEligibility, OverlayMode, PageLayerSet};
pub use session::{EditorStyle, PointerOutcome, Session, TextFocus};
pub use store::AnnotationStore;
pub use tool::{Tool, ToolStateMachine};
