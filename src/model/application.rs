use std::cell;
use std::path;
use std::rc;
use std::vec;

use crate::model::document;
use crate::signal;

use itertools::Itertools;
use tracing::{event, Level};

/* Owns every open Document and mints their identifiers. Closing is the only
   way a document leaves the collection, and about-to-close always fires
   while the document is still enumerable, so observers mirroring the
   collection get one last consistent look. */
pub struct Application {
    documents: cell::RefCell<vec::Vec<rc::Rc<document::Document>>>,
    next_document_id: cell::Cell<i32>,

    pub document_added: signal::Signal<rc::Rc<document::Document>>,
    pub document_about_to_close: signal::Signal<rc::Rc<document::Document>>,
}

impl Application {
    pub fn new() -> rc::Rc<Application> {
        rc::Rc::new(Application {
            documents: cell::RefCell::new(vec::Vec::new()),
            next_document_id: cell::Cell::new(1),
            document_added: signal::Signal::new(),
            document_about_to_close: signal::Signal::new(),
        })
    }

    pub fn new_document(&self) -> rc::Rc<document::Document> {
        let id = document::DocumentId::from_value(self.next_document_id.get());
        self.next_document_id.set(self.next_document_id.get() + 1);

        let doc = document::Document::new(id, format!("Anonymous{}", id));
        self.documents.borrow_mut().push(doc.clone());

        event!(Level::INFO, "created document {} '{}'", id, doc.name());
        self.document_added.emit(&doc);
        doc
    }

    pub fn document_count(&self) -> usize {
        self.documents.borrow().len()
    }

    pub fn document_at(&self, index: usize) -> Option<rc::Rc<document::Document>> {
        self.documents.borrow().get(index).cloned()
    }

    pub fn find_document_by_id(&self, id: document::DocumentId) -> Option<rc::Rc<document::Document>> {
        self.documents.borrow().iter().find(|d| d.id() == id).cloned()
    }

    /* Compares against the stored file path as-is; nothing is canonicalized
       or resolved against the filesystem. */
    pub fn find_document_by_location<P: AsRef<path::Path>>(
        &self,
        location: P,
    ) -> Option<rc::Rc<document::Document>> {
        let location = location.as_ref();
        self.documents
            .borrow()
            .iter()
            .find(|d| d.file_path() == location)
            .cloned()
    }

    pub fn find_index_of_document(&self, doc: &rc::Rc<document::Document>) -> Option<usize> {
        self.documents
            .borrow()
            .iter()
            .find_position(|d| d.id() == doc.id())
            .map(|(i, _)| i)
    }

    pub fn documents(&self) -> vec::Vec<rc::Rc<document::Document>> {
        self.documents.borrow().clone()
    }

    /* Emits about-to-close with the document still enumerable, then drops it
       from the collection. Documents this application doesn't own are
       ignored. */
    pub fn close_document(&self, doc: &rc::Rc<document::Document>) {
        if self.find_document_by_id(doc.id()).is_none() {
            event!(Level::WARN, "ignoring close request for unknown document {}", doc.id());
            return;
        }

        event!(Level::INFO, "closing document {} '{}'", doc.id(), doc.name());
        self.document_about_to_close.emit(doc);
        self.documents.borrow_mut().retain(|d| d.id() != doc.id());
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("documents", &self.document_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_document_mints_ascending_ids() {
        let app = Application::new();

        let d1 = app.new_document();
        let d2 = app.new_document();
        assert_ne!(d1.id(), d2.id());
        assert!(d2.id() > d1.id());
        assert_eq!(d1.name(), "Anonymous1");
        assert_eq!(d2.name(), "Anonymous2");
        assert_eq!(app.document_count(), 2);
    }

    #[test]
    fn test_document_added_fires_after_insertion() {
        let app = Application::new();
        let seen = rc::Rc::new(cell::RefCell::new(vec::Vec::new()));

        let _c = app.document_added.connect({
            let app = app.clone();
            let seen = seen.clone();
            move |doc| seen.borrow_mut().push((doc.id(), app.document_count()))
        });

        let d1 = app.new_document();
        assert_eq!(*seen.borrow(), vec![(d1.id(), 1)]);
    }

    #[test]
    fn test_document_at_bounds() {
        let app = Application::new();
        let d1 = app.new_document();

        assert!(app.document_at(0).is_some());
        assert!(app.document_at(1).is_none());
        assert_eq!(app.document_at(0).unwrap().id(), d1.id());
    }

    #[test]
    fn test_find_document_by_id() {
        let app = Application::new();
        let d1 = app.new_document();
        let _d2 = app.new_document();

        assert_eq!(app.find_document_by_id(d1.id()).unwrap().id(), d1.id());
        assert!(app.find_document_by_id(document::DocumentId::INVALID).is_none());
        assert!(app.find_document_by_id(document::DocumentId::from_value(99)).is_none());
    }

    #[test]
    fn test_find_document_by_location() {
        let app = Application::new();
        let d1 = app.new_document();
        let _d2 = app.new_document();
        d1.set_file_path("/models/frame.step");

        assert_eq!(
            app.find_document_by_location("/models/frame.step").unwrap().id(),
            d1.id()
        );
        assert!(app.find_document_by_location("/models/other.step").is_none());
        /* unset paths are empty, not absent */
        assert!(app.find_document_by_location("").is_some());
    }

    #[test]
    fn test_find_index_of_document() {
        let app = Application::new();
        let d1 = app.new_document();
        let d2 = app.new_document();

        assert_eq!(app.find_index_of_document(&d1), Some(0));
        assert_eq!(app.find_index_of_document(&d2), Some(1));

        let other = Application::new();
        let foreign = other.new_document();
        assert_eq!(app.find_index_of_document(&foreign), None);
    }

    #[test]
    fn test_close_document_signals_while_still_enumerable() {
        let app = Application::new();
        let d1 = app.new_document();
        let d2 = app.new_document();
        let seen = rc::Rc::new(cell::RefCell::new(vec::Vec::new()));

        let _c = app.document_about_to_close.connect({
            let app = app.clone();
            let seen = seen.clone();
            move |doc| {
                seen.borrow_mut().push((
                    doc.id(),
                    app.document_count(),
                    app.find_index_of_document(doc),
                ));
            }
        });

        app.close_document(&d1);
        assert_eq!(*seen.borrow(), vec![(d1.id(), 2, Some(0))]);
        assert_eq!(app.document_count(), 1);
        assert_eq!(app.find_index_of_document(&d2), Some(0));
    }

    #[test]
    fn test_close_unknown_document_is_ignored() {
        let app = Application::new();
        let _d1 = app.new_document();
        let fired = rc::Rc::new(cell::Cell::new(0));

        let _c = app.document_about_to_close.connect({
            let fired = fired.clone();
            move |_| fired.set(fired.get() + 1)
        });

        let other = Application::new();
        let foreign = other.new_document();
        app.close_document(&foreign);
        assert_eq!(fired.get(), 0);
        assert_eq!(app.document_count(), 1);

        /* closing twice: the second request no longer finds the document */
        let d1 = app.document_at(0).unwrap();
        app.close_document(&d1);
        app.close_document(&d1);
        assert_eq!(fired.get(), 1);
        assert_eq!(app.document_count(), 0);
    }

    #[test]
    fn test_ids_are_not_reused_after_close() {
        let app = Application::new();
        let d1 = app.new_document();
        let id1 = d1.id();

        app.close_document(&d1);
        let d2 = app.new_document();
        assert_ne!(d2.id(), id1);
        assert!(d2.id() > id1);
    }
}
