//! Per-page annotation store
//!
//! Each page owns an ordered list of annotations; insertion order is z-order
//! (later entries draw on top) and is the order export replays them.

use crate::annotation::{Annotation, AnnotationId, AnnotationKind};
use crate::coords::ViewportPoint;
use crate::error::{SessionError, SessionResult};

#[derive(Debug, Clone, Default)]
pub struct AnnotationStore {
    pages: Vec<Vec<Annotation>>,
}

impl AnnotationStore {
    /// An empty store with one (empty) list per page
    pub fn with_pages(page_count: u32) -> Self {
        Self { pages: (0..page_count).map(|_| Vec::new()).collect() }
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Total annotations across all pages
    pub fn len(&self) -> usize {
        self.pages.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.iter().all(Vec::is_empty)
    }

    /// Append a new annotation; it becomes the topmost on its page
    pub fn add(
        &mut self,
        page_index: u32,
        position: ViewportPoint,
        kind: AnnotationKind,
    ) -> SessionResult<AnnotationId> {
        let page_count = self.page_count();
        let page = self
            .pages
            .get_mut(page_index as usize)
            .ok_or(SessionError::PageOutOfRange { page: page_index, page_count })?;

        let annotation = Annotation::new(page_index, position, kind);
        let id = annotation.id();
        page.push(annotation);
        Ok(id)
    }

    pub fn remove(&mut self, id: AnnotationId) -> Option<Annotation> {
        let (page, slot) = self.locate(id)?;
        Some(self.pages[page].remove(slot))
    }

    /// Change the position only; z-order is untouched
    pub fn move_to(&mut self, id: AnnotationId, position: ViewportPoint) -> SessionResult<()> {
        let annotation = self.get_mut(id).ok_or(SessionError::AnnotationNotFound(id))?;
        annotation.position = position;
        Ok(())
    }

    /// Replace the content of a text annotation
    pub fn set_content(&mut self, id: AnnotationId, content: impl Into<String>) -> SessionResult<()> {
        let annotation = self.get_mut(id).ok_or(SessionError::AnnotationNotFound(id))?;
        match &mut annotation.kind {
            AnnotationKind::Text(text) => {
                text.content = content.into();
                Ok(())
            }
            AnnotationKind::Stamp(_) => Err(SessionError::NotText(id)),
        }
    }

    /// Annotations of one page in z-order; empty for unknown pages
    pub fn list(&self, page_index: u32) -> &[Annotation] {
        self.pages.get(page_index as usize).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.locate(id).map(|(page, slot)| &self.pages[page][slot])
    }

    pub fn contains(&self, id: AnnotationId) -> bool {
        self.locate(id).is_some()
    }

    /// All annotations, page by page in z-order
    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.pages.iter().flatten()
    }

    /// Topmost annotation on `page_index` whose extent contains `point`
    pub fn hit_test(&self, page_index: u32, point: ViewportPoint) -> Option<AnnotationId> {
        self.list(page_index)
            .iter()
            .rev()
            .find(|annotation| annotation.contains(point))
            .map(Annotation::id)
    }

    /// Scale every viewport quantity by `factor`
    pub(crate) fn rescale(&mut self, factor: f32) {
        for annotation in self.pages.iter_mut().flatten() {
            annotation.rescale(factor);
        }
    }

    fn get_mut(&mut self, id: AnnotationId) -> Option<&mut Annotation> {
        let (page, slot) = self.locate(id)?;
        Some(&mut self.pages[page][slot])
    }

    fn locate(&self, id: AnnotationId) -> Option<(usize, usize)> {
        self.pages.iter().enumerate().find_map(|(page, annotations)| {
            annotations.iter().position(|annotation| annotation.id() == id).map(|slot| (page, slot))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::tests::{png_stamp, text};
    use crate::annotation::ImageStamp;

    fn point(x: f32, y: f32) -> ViewportPoint {
        ViewportPoint::new(x, y)
    }

    #[test]
    fn add_appends_in_z_order() {
        let mut store = AnnotationStore::with_pages(2);
        let first = store.add(0, point(0.0, 0.0), text("a", 10.0)).expect("add should succeed");
        let second = store.add(0, point(5.0, 5.0), text("b", 10.0)).expect("add should succeed");

        let ids: Vec<_> = store.list(0).iter().map(Annotation::id).collect();
        assert_eq!(ids, vec![first, second]);
        assert!(store.list(1).is_empty());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn add_to_missing_page_fails() {
        let mut store = AnnotationStore::with_pages(1);
        let err = store.add(3, point(0.0, 0.0), text("a", 10.0)).expect_err("page 3 does not exist");
        assert!(matches!(err, SessionError::PageOutOfRange { page: 3, page_count: 1 }));
        assert!(store.is_empty());
    }

    #[test]
    fn move_keeps_z_order() {
        let mut store = AnnotationStore::with_pages(1);
        let first = store.add(0, point(0.0, 0.0), text("a", 10.0)).expect("add should succeed");
        let second = store.add(0, point(0.0, 0.0), text("b", 10.0)).expect("add should succeed");

        store.move_to(first, point(40.0, 40.0)).expect("move should succeed");

        let ids: Vec<_> = store.list(0).iter().map(Annotation::id).collect();
        assert_eq!(ids, vec![first, second]);
        assert_eq!(store.get(first).map(Annotation::position), Some(point(40.0, 40.0)));
    }

    #[test]
    fn remove_drops_annotation() {
        let mut store = AnnotationStore::with_pages(1);
        let id = store.add(0, point(0.0, 0.0), text("a", 10.0)).expect("add should succeed");

        assert!(store.remove(id).is_some());
        assert!(!store.contains(id));
        assert!(store.remove(id).is_none());
        assert!(matches!(store.move_to(id, point(1.0, 1.0)), Err(SessionError::AnnotationNotFound(_))));
    }

    #[test]
    fn set_content_rejects_stamps() {
        let mut store = AnnotationStore::with_pages(1);
        let stamp = ImageStamp { image: png_stamp(10, 10), width: 50.0 };
        let id = store
            .add(0, point(0.0, 0.0), AnnotationKind::Stamp(stamp))
            .expect("add should succeed");

        let before = store.get(id).cloned();

        assert!(matches!(store.set_content(id, "x"), Err(SessionError::NotText(_))));
        assert_eq!(store.get(id).cloned(), before);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn hit_test_prefers_topmost() {
        let mut store = AnnotationStore::with_pages(1);
        let _below = store.add(0, point(0.0, 0.0), text("wide text", 20.0)).expect("add should succeed");
        let above = store.add(0, point(10.0, 5.0), text("top", 20.0)).expect("add should succeed");

        assert_eq!(store.hit_test(0, point(15.0, 10.0)), Some(above));
        assert_eq!(store.hit_test(0, point(500.0, 500.0)), None);
        assert_eq!(store.hit_test(7, point(15.0, 10.0)), None);
    }
}
