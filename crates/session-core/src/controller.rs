//! Session lifecycle: loading, rescaling, export
//!
//! Loads and rescales are staged so that decoding can happen elsewhere. Each
//! one is issued a monotonically increasing [`Generation`]; results carrying
//! an older generation than the latest request are discarded. A session is
//! only ever replaced by one whose pages have all arrived.

use crate::error::{validate_scale, SessionError, SessionResult};
use crate::export;
use crate::session::{EditorStyle, Session};
use doc_model::EditorPreferences;
use pdf_engine::{
    looks_like_pdf, DocumentHandle, OpenSource, PdfDecoder, PdfEncoder, RenderRequest,
    RenderedPage,
};
use std::sync::Arc;

/// Monotonic token identifying one load or rescale request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(pub(crate) u64);

impl Generation {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    generation: Generation,
}

impl LoadTicket {
    pub fn generation(self) -> Generation {
        self.generation
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RescaleTicket {
    generation: Generation,
    session: Generation,
    scale: f32,
}

impl RescaleTicket {
    pub fn generation(self) -> Generation {
        self.generation
    }

    pub fn scale(self) -> f32 {
        self.scale
    }
}

/// Result of handing a staged result to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// A newer request superseded this one; the result was dropped
    Stale,
    /// Accepted; `remaining` pages are still outstanding
    Pending { remaining: u32 },
    /// The request completed. For loads, `retired` is the handle of the
    /// session that was replaced, which the caller should close.
    Ready { retired: Option<DocumentHandle> },
}

#[derive(Debug)]
struct PendingLoad {
    generation: Generation,
    source: Arc<[u8]>,
    scale: f32,
    document: Option<DocumentHandle>,
    slots: Vec<Option<RenderedPage>>,
}

#[derive(Debug)]
struct PendingRescale {
    ticket: RescaleTicket,
    slots: Vec<Option<RenderedPage>>,
}

fn stale(what: &'static str, generation: Generation) -> Delivery {
    tracing::debug!(generation = generation.raw(), "dropped stale {what}");
    Delivery::Stale
}

fn remaining(slots: &[Option<RenderedPage>]) -> u32 {
    slots.iter().filter(|slot| slot.is_none()).count() as u32
}

fn take_complete(slots: &mut Vec<Option<RenderedPage>>) -> Option<Vec<RenderedPage>> {
    if remaining(slots) > 0 {
        return None;
    }
    Some(std::mem::take(slots).into_iter().flatten().collect())
}

#[derive(Debug)]
pub struct SessionController {
    next_generation: u64,
    scale: f32,
    style: EditorStyle,
    session: Option<Session>,
    pending_load: Option<PendingLoad>,
    pending_rescale: Option<PendingRescale>,
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new(&EditorPreferences::default())
    }
}

impl SessionController {
    pub fn new(prefs: &EditorPreferences) -> Self {
        let prefs = prefs.clone().validated();
        Self {
            next_generation: 0,
            scale: prefs.initial_scale,
            style: EditorStyle::from(&prefs),
            session: None,
            pending_load: None,
            pending_rescale: None,
        }
    }

    /// Scale used for the next load and reported for the current session
    pub fn scale(&self) -> f32 {
        self.session.as_ref().map_or(self.scale, Session::scale)
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut Session> {
        self.session.as_mut()
    }

    pub fn require_session(&mut self) -> SessionResult<&mut Session> {
        self.session.as_mut().ok_or(SessionError::NoDocument)
    }

    pub fn is_loading(&self) -> bool {
        self.pending_load.is_some()
    }

    pub fn is_rescaling(&self) -> bool {
        self.pending_rescale.is_some()
    }

    fn issue_generation(&mut self) -> Generation {
        self.next_generation += 1;
        Generation(self.next_generation)
    }

    /// Start loading `bytes`. Supersedes any load still in flight; the
    /// current session stays untouched until the new one is complete.
    pub fn begin_load(&mut self, bytes: impl Into<Arc<[u8]>>) -> SessionResult<LoadTicket> {
        let source = bytes.into();
        if !looks_like_pdf(&source) {
            return Err(SessionError::NotPdf);
        }
        let scale = self.scale();
        let generation = self.issue_generation();
        if let Some(previous) = self.pending_load.replace(PendingLoad {
            generation,
            source,
            scale,
            document: None,
            slots: Vec::new(),
        }) {
            tracing::debug!(
                superseded = previous.generation.raw(),
                generation = generation.raw(),
                "load superseded"
            );
        }
        Ok(LoadTicket { generation })
    }

    /// Scale the pages of the load behind `ticket` must be rendered at
    pub fn load_scale(&self, ticket: LoadTicket) -> Option<f32> {
        self.current_load(ticket).map(|pending| pending.scale)
    }

    fn current_load(&self, ticket: LoadTicket) -> Option<&PendingLoad> {
        self.pending_load.as_ref().filter(|pending| pending.generation == ticket.generation)
    }

    fn current_load_mut(&mut self, ticket: LoadTicket) -> Option<&mut PendingLoad> {
        self.pending_load.as_mut().filter(|pending| pending.generation == ticket.generation)
    }

    /// Record the decoded document behind `ticket`. A load takes exactly one
    /// document; a second attach is rejected and leaves the load untouched.
    pub fn attach_document(
        &mut self,
        ticket: LoadTicket,
        document: DocumentHandle,
        page_count: u32,
    ) -> SessionResult<Delivery> {
        let Some(pending) = self.current_load_mut(ticket) else {
            return Ok(stale("document", ticket.generation));
        };
        if pending.document.is_some() {
            return Err(SessionError::DocumentAlreadyAttached);
        }
        if page_count == 0 {
            self.pending_load = None;
            return Err(SessionError::EmptyDocument);
        }
        pending.document = Some(document);
        pending.slots = vec![None; page_count as usize];
        Ok(Delivery::Pending { remaining: page_count })
    }

    /// Hand over one rendered page. Pages may arrive in any order; the new
    /// session is installed with pages in index order once all are present.
    pub fn deliver_page(
        &mut self,
        ticket: LoadTicket,
        page_index: u32,
        rendered: RenderedPage,
    ) -> SessionResult<Delivery> {
        let Some(pending) = self.current_load_mut(ticket) else {
            return Ok(stale("page", ticket.generation));
        };
        let page_count = pending.slots.len() as u32;
        let slot = pending
            .slots
            .get_mut(page_index as usize)
            .ok_or(SessionError::PageOutOfRange { page: page_index, page_count })?;
        *slot = Some(rendered);

        let Some(pages) = take_complete(&mut pending.slots) else {
            return Ok(Delivery::Pending { remaining: remaining(&pending.slots) });
        };
        let Some(pending) = self.pending_load.take() else {
            return Ok(Delivery::Stale);
        };
        let Some(document) = pending.document else {
            return Ok(Delivery::Stale);
        };

        let style = self.session.as_ref().map_or_else(|| self.style.clone(), |s| s.style().clone());
        let session =
            Session::new(pending.generation, document, pending.source, pending.scale, pages, style);
        tracing::info!(
            generation = pending.generation.raw(),
            pages = session.page_count(),
            scale = pending.scale,
            "document loaded"
        );
        let retired = self.session.replace(session).map(|old| old.document());
        self.pending_rescale = None;
        self.scale = pending.scale;
        Ok(Delivery::Ready { retired })
    }

    /// Abandon the load behind `ticket`. Returns false when it was already stale.
    pub fn fail_load(&mut self, ticket: LoadTicket) -> bool {
        if self.current_load(ticket).is_none() {
            return false;
        }
        self.pending_load = None;
        true
    }

    /// Decode and install `bytes` in one go. On failure the current
    /// session is left exactly as it was.
    #[tracing::instrument(skip_all, fields(bytes = bytes.len()))]
    pub fn load_document<D>(&mut self, decoder: &mut D, bytes: Vec<u8>) -> SessionResult<()>
    where
        D: PdfDecoder + ?Sized,
    {
        let source: Arc<[u8]> = bytes.into();
        let ticket = self.begin_load(Arc::clone(&source))?;
        let scale = self.load_scale(ticket).unwrap_or(self.scale);

        let handle = match decoder.open(OpenSource::Bytes(source.to_vec())) {
            Ok(handle) => handle,
            Err(err) => {
                self.fail_load(ticket);
                return Err(SessionError::Decode(err));
            }
        };

        match self.drive_load(decoder, ticket, handle, scale) {
            Ok(retired) => {
                if let Some(retired) = retired {
                    close_quietly(decoder, retired);
                }
                Ok(())
            }
            Err(err) => {
                self.fail_load(ticket);
                close_quietly(decoder, handle);
                tracing::warn!(error = %err, "document load failed");
                Err(err)
            }
        }
    }

    fn drive_load<D>(
        &mut self,
        decoder: &D,
        ticket: LoadTicket,
        handle: DocumentHandle,
        scale: f32,
    ) -> SessionResult<Option<DocumentHandle>>
    where
        D: PdfDecoder + ?Sized,
    {
        let page_count = decoder.page_count(handle).map_err(SessionError::Decode)?;
        self.attach_document(ticket, handle, page_count)?;
        for page_index in 0..page_count {
            let rendered = decoder
                .render(handle, RenderRequest { page_index, scale })
                .map_err(SessionError::Decode)?;
            if let Delivery::Ready { retired } = self.deliver_page(ticket, page_index, rendered)? {
                return Ok(retired);
            }
        }
        Ok(None)
    }

    /// Start re-rendering every page at `scale`. Supersedes any rescale
    /// still in flight.
    pub fn begin_rescale(&mut self, scale: f32) -> SessionResult<RescaleTicket> {
        let scale = validate_scale(scale)?;
        let session = self.session.as_ref().ok_or(SessionError::NoDocument)?;
        let (session_generation, page_count) = (session.generation(), session.page_count());
        let ticket =
            RescaleTicket { generation: self.issue_generation(), session: session_generation, scale };
        self.pending_rescale =
            Some(PendingRescale { ticket, slots: vec![None; page_count as usize] });
        Ok(ticket)
    }

    fn current_rescale(&self, ticket: RescaleTicket) -> bool {
        let live_session = self.session.as_ref().map(Session::generation) == Some(ticket.session);
        let latest = self
            .pending_rescale
            .as_ref()
            .is_some_and(|pending| pending.ticket.generation == ticket.generation);
        live_session && latest
    }

    pub fn deliver_rescaled_page(
        &mut self,
        ticket: RescaleTicket,
        page_index: u32,
        rendered: RenderedPage,
    ) -> SessionResult<Delivery> {
        if !self.current_rescale(ticket) {
            return Ok(stale("rescaled page", ticket.generation));
        }
        let Some(pending) = self.pending_rescale.as_mut() else {
            return Ok(Delivery::Stale);
        };
        let page_count = pending.slots.len() as u32;
        let slot = pending
            .slots
            .get_mut(page_index as usize)
            .ok_or(SessionError::PageOutOfRange { page: page_index, page_count })?;
        *slot = Some(rendered);

        let Some(pages) = take_complete(&mut pending.slots) else {
            return Ok(Delivery::Pending { remaining: remaining(&pending.slots) });
        };
        self.pending_rescale = None;
        if let Some(session) = self.session.as_mut() {
            session.apply_rescale(ticket.scale, pages);
            tracing::info!(scale = ticket.scale, "session rescaled");
        }
        self.scale = ticket.scale;
        Ok(Delivery::Ready { retired: None })
    }

    /// Abandon the rescale behind `ticket`
    pub fn fail_rescale(&mut self, ticket: RescaleTicket) -> bool {
        if !self.current_rescale(ticket) {
            return false;
        }
        self.pending_rescale = None;
        true
    }

    /// Re-render every page at `scale` and carry annotations over
    pub fn change_scale<D>(&mut self, decoder: &D, scale: f32) -> SessionResult<()>
    where
        D: PdfDecoder + ?Sized,
    {
        let ticket = self.begin_rescale(scale)?;
        let session = self.session.as_ref().ok_or(SessionError::NoDocument)?;
        let (handle, page_count) = (session.document(), session.page_count());

        for page_index in 0..page_count {
            let rendered = match decoder.render(handle, RenderRequest { page_index, scale }) {
                Ok(rendered) => rendered,
                Err(err) => {
                    self.fail_rescale(ticket);
                    return Err(SessionError::Decode(err));
                }
            };
            self.deliver_rescaled_page(ticket, page_index, rendered)?;
        }
        Ok(())
    }

    /// Flatten the current session onto a copy of its source document.
    /// The text edit in progress, if any, is committed first.
    pub fn export<E>(&mut self, encoder: &E) -> SessionResult<Vec<u8>>
    where
        E: PdfEncoder + ?Sized,
    {
        let session = self.require_session()?;
        session.commit_text_edit();
        export::flatten(session, encoder)
    }
}

fn close_quietly<D>(decoder: &mut D, handle: DocumentHandle)
where
    D: PdfDecoder + ?Sized,
{
    if let Err(err) = decoder.close(handle) {
        tracing::debug!(handle = handle.raw(), error = %err, "close failed");
    }
}
