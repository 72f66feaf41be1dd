use std::cell;
use std::collections;
use std::path;
use std::rc;
use std::vec;

use crate::model::application;
use crate::model::document;
use crate::script::document::DocumentProxy;
use crate::signal;

use once_cell::unsync::OnceCell;
use tracing::{event, Level};

/* Script-facing face of the Application. Keeps one proxy per open document
   in two containers that always hold the same set: an ordered sequence
   (creation order) and an id lookup. Proxy teardown is driven exclusively by
   the application's about-to-close signal, so a proxy can never silently
   outlive its document. Documents the host opens behind the bridge's back
   are not wrapped; only newDocument and the construction-time scan admit
   proxies. */
pub struct ApplicationProxy {
    app: rc::Weak<application::Application>,
    proxies: cell::RefCell<vec::Vec<rc::Rc<DocumentProxy>>>,
    by_id: cell::RefCell<collections::HashMap<document::DocumentId, rc::Rc<DocumentProxy>>>,
    close_subscription: OnceCell<signal::Connection>,

    pub document_added: signal::Signal<rc::Rc<DocumentProxy>>,
    pub document_about_to_close: signal::Signal<rc::Rc<DocumentProxy>>,
    pub document_count_changed: signal::Signal<()>,
}

impl ApplicationProxy {
    pub fn new(app: &rc::Rc<application::Application>) -> rc::Rc<ApplicationProxy> {
        let proxy = rc::Rc::new(ApplicationProxy {
            app: rc::Rc::downgrade(app),
            proxies: cell::RefCell::new(vec::Vec::new()),
            by_id: cell::RefCell::new(collections::HashMap::new()),
            close_subscription: OnceCell::new(),
            document_added: signal::Signal::new(),
            document_about_to_close: signal::Signal::new(),
            document_count_changed: signal::Signal::new(),
        });

        proxy
            .close_subscription
            .set(app.document_about_to_close.connect({
                let weak = rc::Rc::downgrade(&proxy);
                move |doc| {
                    if let Some(proxy) = weak.upgrade() {
                        proxy.on_document_about_to_close(doc);
                    }
                }
            }))
            .unwrap();

        /* Documents already open get wrapped immediately, without signals. */
        for doc in app.documents() {
            proxy.index_document(&doc);
        }

        proxy
    }

    fn index_document(&self, doc: &rc::Rc<document::Document>) -> rc::Rc<DocumentProxy> {
        let doc_proxy = DocumentProxy::new(doc);
        self.proxies.borrow_mut().push(doc_proxy.clone());
        self.by_id.borrow_mut().insert(doc.id(), doc_proxy.clone());
        debug_assert_eq!(self.proxies.borrow().len(), self.by_id.borrow().len());
        doc_proxy
    }

    pub fn version_string(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /* The number of indexed proxies, which tracks open documents
       one-for-one. */
    pub fn document_count(&self) -> usize {
        self.proxies.borrow().len()
    }

    pub fn new_document(&self) -> Option<rc::Rc<DocumentProxy>> {
        let app = self.app.upgrade()?;
        let doc = app.new_document();
        let doc_proxy = self.index_document(&doc);
        self.document_added.emit(&doc_proxy);
        self.document_count_changed.emit(&());
        Some(doc_proxy)
    }

    pub fn document_at(&self, index: i64) -> Option<rc::Rc<DocumentProxy>> {
        if index < 0 {
            return None;
        }
        self.proxies.borrow().get(index as usize).cloned()
    }

    pub fn find_document_by_location<P: AsRef<path::Path>>(
        &self,
        location: P,
    ) -> Option<rc::Rc<DocumentProxy>> {
        let app = self.app.upgrade()?;
        let doc = app.find_document_by_location(location)?;
        /* a document we never wrapped resolves natively but not here */
        self.by_id.borrow().get(&doc.id()).cloned()
    }

    pub fn find_index_of_document(&self, doc_proxy: &rc::Rc<DocumentProxy>) -> i64 {
        let (Some(app), Some(doc)) = (self.app.upgrade(), doc_proxy.base_document()) else {
            return -1;
        };
        app.find_index_of_document(&doc).map_or(-1, |i| i as i64)
    }

    /* Asks the application to close; removal of the proxy happens in the
       about-to-close handler, never here. Detached proxies are ignored. */
    pub fn close_document(&self, doc_proxy: &rc::Rc<DocumentProxy>) {
        if let (Some(app), Some(doc)) = (self.app.upgrade(), doc_proxy.base_document()) {
            app.close_document(&doc);
        }
    }

    fn on_document_about_to_close(&self, doc: &rc::Rc<document::Document>) {
        let doc_proxy = match self.by_id.borrow().get(&doc.id()).cloned() {
            Some(doc_proxy) => doc_proxy,
            None => return, /* closing something we never wrapped */
        };

        event!(Level::DEBUG, "retiring proxy for document {}", doc.id());

        /* The notification goes out while the proxy is still indexed and
           still bound, so script callbacks get one last consistent look. */
        self.document_about_to_close.emit(&doc_proxy);

        self.by_id.borrow_mut().remove(&doc.id());
        self.proxies
            .borrow_mut()
            .retain(|p| !rc::Rc::ptr_eq(p, &doc_proxy));
        debug_assert_eq!(self.proxies.borrow().len(), self.by_id.borrow().len());

        doc_proxy.detach();
        self.document_count_changed.emit(&());
    }
}

impl std::fmt::Debug for ApplicationProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplicationProxy")
            .field("proxies", &self.document_count())
            .field("bound", &self.app.upgrade().is_some())
            .finish_non_exhaustive()
    }
}
