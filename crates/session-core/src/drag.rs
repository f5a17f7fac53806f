//! Pointer-driven repositioning of one annotation at a time

use crate::annotation::AnnotationId;
use crate::coords::ViewportPoint;
use crate::error::{SessionError, SessionResult};
use crate::store::AnnotationStore;

#[derive(Debug, Clone, Copy, PartialEq)]
struct DragState {
    target: AnnotationId,
    /// Pointer position relative to the annotation's top-left corner
    grab_offset: ViewportPoint,
}

#[derive(Debug, Clone, Default)]
pub struct DragController {
    active: Option<DragState>,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.active.is_some()
    }

    pub fn target(&self) -> Option<AnnotationId> {
        self.active.map(|state| state.target)
    }

    /// Grab `id` at `pointer`. Fails without side effects if a drag is
    /// already running or the annotation does not exist.
    pub fn begin_drag(
        &mut self,
        store: &AnnotationStore,
        id: AnnotationId,
        pointer: ViewportPoint,
    ) -> SessionResult<()> {
        if self.active.is_some() {
            return Err(SessionError::DragInProgress);
        }
        let annotation = store.get(id).ok_or(SessionError::AnnotationNotFound(id))?;
        self.active = Some(DragState { target: id, grab_offset: pointer - annotation.position() });
        Ok(())
    }

    /// Follow the pointer. Returns the dragged id, or `None` when idle.
    /// A target that disappeared mid-drag ends the drag.
    pub fn on_pointer_move(
        &mut self,
        store: &mut AnnotationStore,
        pointer: ViewportPoint,
    ) -> SessionResult<Option<AnnotationId>> {
        let Some(state) = self.active else {
            return Ok(None);
        };
        if let Err(err) = store.move_to(state.target, pointer - state.grab_offset) {
            self.active = None;
            return Err(err);
        }
        Ok(Some(state.target))
    }

    /// Release the grab; a no-op when idle
    pub fn end_drag(&mut self) -> Option<AnnotationId> {
        self.active.take().map(|state| state.target)
    }

    /// Drop the grab without moving anything further
    pub(crate) fn cancel(&mut self) {
        self.active = None;
    }
}
