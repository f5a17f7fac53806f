//! Session error taxonomy

use crate::annotation::AnnotationId;
use pdf_engine::PdfEngineError;

/// Broad class of a [`SessionError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller handed in unusable input (bytes, scale, tool name, image)
    Input,
    /// The operation is invalid for the current session state
    State,
    /// Export could not encode part of the session
    Encoding,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("input is not a PDF document")]
    NotPdf,
    #[error("failed to decode document: {0}")]
    Decode(#[source] PdfEngineError),
    #[error("document has no pages")]
    EmptyDocument,
    #[error("no document is loaded")]
    NoDocument,
    #[error("failed to open source bytes for editing: {0}")]
    OpenForEdit(#[source] PdfEngineError),
    #[error("export target has {encoder} pages but the session has {session}")]
    PageCountMismatch { encoder: u32, session: u32 },
    #[error("invalid scale {0}; scale must be finite and positive")]
    InvalidScale(f32),
    #[error("invalid stamp image: {0}")]
    InvalidStampImage(String),
    #[error("unknown tool {0:?}")]
    UnknownTool(String),
    #[error("invalid style: {0}")]
    InvalidStyle(String),

    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("annotation {0} not found")]
    AnnotationNotFound(AnnotationId),
    #[error("annotation {0} is not a text annotation")]
    NotText(AnnotationId),
    #[error("a drag is already in progress")]
    DragInProgress,
    #[error("no stamp image is armed")]
    NoStampArmed,
    #[error("no text annotation has edit focus")]
    NoTextFocus,
    #[error("a document is already attached to this load")]
    DocumentAlreadyAttached,

    #[error("cannot embed stamp {id}: {reason}")]
    UnsupportedStamp { id: AnnotationId, reason: String },
    #[error("failed to encode freehand layer of page {page}: {source}")]
    FreehandEncoding {
        page: u32,
        #[source]
        source: image::ImageError,
    },
    #[error("encoding failed: {0}")]
    Encoding(#[source] PdfEngineError),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::NotPdf
            | SessionError::Decode(_)
            | SessionError::EmptyDocument
            | SessionError::NoDocument
            | SessionError::OpenForEdit(_)
            | SessionError::PageCountMismatch { .. }
            | SessionError::InvalidScale(_)
            | SessionError::InvalidStampImage(_)
            | SessionError::UnknownTool(_)
            | SessionError::InvalidStyle(_) => ErrorKind::Input,
            SessionError::PageOutOfRange { .. }
            | SessionError::AnnotationNotFound(_)
            | SessionError::NotText(_)
            | SessionError::DragInProgress
            | SessionError::NoStampArmed
            | SessionError::NoTextFocus
            | SessionError::DocumentAlreadyAttached => ErrorKind::State,
            SessionError::UnsupportedStamp { .. }
            | SessionError::FreehandEncoding { .. }
            | SessionError::Encoding(_) => ErrorKind::Encoding,
        }
    }
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

pub(crate) fn validate_scale(scale: f32) -> SessionResult<f32> {
    if scale.is_finite() && scale > 0.0 {
        Ok(scale)
    } else {
        Err(SessionError::InvalidScale(scale))
    }
}
