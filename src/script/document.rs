use std::cell;
use std::path;
use std::rc;

use crate::model::document;
use crate::model::document::structure;
use crate::model::tree;
use crate::signal;

/* Script-facing face of one Document. Holds the document's id and a weak
   reference, never ownership: every access re-resolves, so a proxy that
   outlives its document degrades to sentinel results instead of dangling.
   Only ApplicationProxy creates and detaches these. */
pub struct DocumentProxy {
    id: document::DocumentId,
    doc: cell::RefCell<rc::Weak<document::Document>>,
    subscriptions: cell::RefCell<signal::ConnectionBag>,

    pub name_changed: signal::Signal<()>,
    pub file_path_changed: signal::Signal<()>,
    pub entity_count_changed: signal::Signal<()>,
}

impl DocumentProxy {
    pub(crate) fn new(doc: &rc::Rc<document::Document>) -> rc::Rc<DocumentProxy> {
        let proxy = rc::Rc::new(DocumentProxy {
            id: doc.id(),
            doc: cell::RefCell::new(rc::Rc::downgrade(doc)),
            subscriptions: cell::RefCell::new(signal::ConnectionBag::new()),
            name_changed: signal::Signal::new(),
            file_path_changed: signal::Signal::new(),
            entity_count_changed: signal::Signal::new(),
        });

        /* Weak both ways: the proxy must not keep the document alive, and
           the document's signals must not keep the proxy alive. */
        let mut bag = signal::ConnectionBag::new();
        bag.hold(doc.name_changed.connect({
            let weak = rc::Rc::downgrade(&proxy);
            move |_| {
                if let Some(proxy) = weak.upgrade() {
                    proxy.name_changed.emit(&());
                }
            }
        }));
        bag.hold(doc.file_path_changed.connect({
            let weak = rc::Rc::downgrade(&proxy);
            move |_| {
                if let Some(proxy) = weak.upgrade() {
                    proxy.file_path_changed.emit(&());
                }
            }
        }));
        bag.hold(doc.entity_added.connect({
            let weak = rc::Rc::downgrade(&proxy);
            move |_| {
                if let Some(proxy) = weak.upgrade() {
                    proxy.entity_count_changed.emit(&());
                }
            }
        }));
        /* This one rides the about-to-destroy edge, so a count read from
           inside the notification still includes the dying entity. */
        bag.hold(doc.entity_about_to_be_destroyed.connect({
            let weak = rc::Rc::downgrade(&proxy);
            move |_| {
                if let Some(proxy) = weak.upgrade() {
                    proxy.entity_count_changed.emit(&());
                }
            }
        }));
        *proxy.subscriptions.borrow_mut() = bag;

        proxy
    }

    /* Tears down the model subscriptions first, then unbinds, so no
       re-emission can run against a proxy that has already lost its
       document. Safe to call more than once. */
    pub(crate) fn detach(&self) {
        self.subscriptions.borrow_mut().clear();
        *self.doc.borrow_mut() = rc::Weak::new();
    }

    pub(crate) fn base_document(&self) -> Option<rc::Rc<document::Document>> {
        self.doc.borrow().upgrade()
    }

    pub fn id(&self) -> document::DocumentId {
        match self.base_document() {
            Some(_) => self.id,
            None => document::DocumentId::INVALID,
        }
    }

    pub fn name(&self) -> String {
        self.base_document().map(|d| d.name()).unwrap_or_default()
    }

    pub fn set_name(&self, name: &str) {
        if let Some(doc) = self.base_document() {
            doc.set_name(name);
        }
    }

    pub fn file_path(&self) -> path::PathBuf {
        self.base_document().map(|d| d.file_path()).unwrap_or_default()
    }

    pub fn entity_count(&self) -> usize {
        self.base_document().map(|d| d.entity_count()).unwrap_or(0)
    }

    /* Depth-first over the whole model tree. The callback fires for every
       node except those whose immediate parent is classified as a
       reference; only the direct parent is consulted, and the walk itself is
       never pruned, so nodes deeper under a reference are still visited and
       judged against their own parent. Mutating this document's structure
       from inside the callback panics on the interior borrow. */
    pub fn traverse_model_tree<F: FnMut(tree::NodeId)>(&self, mut f: F) {
        let doc = match self.base_document() {
            Some(doc) => doc,
            None => return,
        };
        let tree = doc.model_tree();
        tree.traverse(|id| {
            let parent = tree.node_parent(id);
            if !parent.is_null() {
                if let Some(label) = tree.node_data(parent) {
                    if structure::is_reference(label) {
                        return;
                    }
                }
            }
            f(id);
        });
    }

    fn with_label<R, F: FnOnce(&structure::Label) -> R>(&self, id: tree::NodeId, f: F) -> Option<R> {
        let doc = self.base_document()?;
        let tree = doc.model_tree();
        tree.node_data(id).map(f)
    }

    /* The tree_node accessors re-resolve on every call and answer with a
       type-appropriate sentinel when the proxy is unbound or the id doesn't
       resolve. Nothing is cached. */
    pub fn tree_node_name(&self, id: tree::NodeId) -> String {
        self.with_label(id, |l| l.name.clone()).unwrap_or_default()
    }

    pub fn tree_node_tag(&self, id: tree::NodeId) -> String {
        self.with_label(id, |l| l.tag.clone()).unwrap_or_default()
    }

    pub fn tree_node_parent(&self, id: tree::NodeId) -> tree::NodeId {
        self.base_document()
            .map(|d| d.model_tree().node_parent(id))
            .unwrap_or(tree::NodeId::NULL)
    }

    pub fn tree_node_is_assembly(&self, id: tree::NodeId) -> bool {
        self.with_label(id, structure::is_assembly).unwrap_or(false)
    }

    pub fn tree_node_is_instance(&self, id: tree::NodeId) -> bool {
        self.with_label(id, structure::is_reference).unwrap_or(false)
    }

    pub fn tree_node_is_component(&self, id: tree::NodeId) -> bool {
        self.with_label(id, structure::is_component).unwrap_or(false)
    }
}

impl std::fmt::Debug for DocumentProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentProxy")
            .field("id", &self.id)
            .field("bound", &self.base_document().is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::vec;

    fn create_test_proxy(xml: &str) -> (rc::Rc<document::Document>, rc::Rc<DocumentProxy>) {
        let doc = document::Document::new(document::DocumentId::from_value(1), "testdoc");
        let fixture = structure::xml::Fixture::from_str(xml).unwrap();
        if let Some(name) = fixture.name {
            doc.set_name(&name);
        }
        for entity in fixture.entities {
            doc.add_entity(entity);
        }
        let proxy = DocumentProxy::new(&doc);
        (doc, proxy)
    }

    fn node(v: u32) -> tree::NodeId {
        tree::NodeId::from_value(v)
    }

    #[test]
    fn test_properties_while_bound() {
        let (doc, proxy) = create_test_proxy(include_str!("document_tests/filter_example.xml"));
        doc.set_file_path("/models/example.step");

        assert_eq!(proxy.id(), doc.id());
        assert_eq!(proxy.name(), "example");
        assert_eq!(proxy.file_path(), path::PathBuf::from("/models/example.step"));
        assert_eq!(proxy.entity_count(), 1);
    }

    #[test]
    fn test_properties_when_unbound() {
        let (doc, proxy) = create_test_proxy(include_str!("document_tests/filter_example.xml"));
        drop(doc);

        assert_eq!(proxy.id(), document::DocumentId::INVALID);
        assert_eq!(proxy.name(), "");
        assert_eq!(proxy.file_path(), path::PathBuf::new());
        assert_eq!(proxy.entity_count(), 0);

        /* total functions all the way down */
        proxy.set_name("ignored");
        let mut visited = 0;
        proxy.traverse_model_tree(|_| visited += 1);
        assert_eq!(visited, 0);
        assert_eq!(proxy.tree_node_name(node(1)), "");
        assert_eq!(proxy.tree_node_parent(node(1)), tree::NodeId::NULL);
        assert!(!proxy.tree_node_is_assembly(node(1)));
    }

    #[test]
    fn test_set_name_writes_through() {
        let (doc, proxy) = create_test_proxy(include_str!("document_tests/filter_example.xml"));

        proxy.set_name("renamed");
        assert_eq!(doc.name(), "renamed");
        assert_eq!(proxy.name(), "renamed");
    }

    #[test]
    fn test_reemission() {
        let (doc, proxy) = create_test_proxy(include_str!("document_tests/filter_example.xml"));
        let log = rc::Rc::new(cell::RefCell::new(vec::Vec::new()));

        let _c1 = proxy.name_changed.connect({
            let log = log.clone();
            move |_| log.borrow_mut().push("name")
        });
        let _c2 = proxy.file_path_changed.connect({
            let log = log.clone();
            move |_| log.borrow_mut().push("path")
        });
        let _c3 = proxy.entity_count_changed.connect({
            let log = log.clone();
            move |_| log.borrow_mut().push("count")
        });

        doc.set_name("renamed");
        doc.set_name("renamed"); /* unchanged, no signal */
        doc.set_file_path("/models/a.step");
        let extra = doc.add_entity(structure::EntityNode::builder().name("extra").build());
        doc.destroy_entity(extra);

        assert_eq!(*log.borrow(), vec!["name", "path", "count", "count"]);
    }

    #[test]
    fn test_count_read_during_destroy_notification() {
        let (doc, proxy) = create_test_proxy(include_str!("document_tests/filter_example.xml"));
        let extra = doc.add_entity(structure::EntityNode::builder().name("extra").build());
        let seen = rc::Rc::new(cell::RefCell::new(vec::Vec::new()));

        let _c = proxy.entity_count_changed.connect({
            let proxy = proxy.clone();
            let seen = seen.clone();
            move |_| seen.borrow_mut().push(proxy.entity_count())
        });

        doc.destroy_entity(extra);
        /* about-to-destroy fires before removal, so the count still
           includes the dying entity */
        assert_eq!(*seen.borrow(), vec![2]);
        assert_eq!(proxy.entity_count(), 1);
    }

    #[test]
    fn test_detach_stops_reemission_and_unbinds() {
        let (doc, proxy) = create_test_proxy(include_str!("document_tests/filter_example.xml"));
        let fired = rc::Rc::new(cell::Cell::new(0));

        let _c = proxy.name_changed.connect({
            let fired = fired.clone();
            move |_| fired.set(fired.get() + 1)
        });

        proxy.detach();
        assert_eq!(proxy.id(), document::DocumentId::INVALID);
        assert_eq!(doc.name_changed.subscriber_count(), 0);

        doc.set_name("nobody listening");
        assert_eq!(fired.get(), 0);

        proxy.detach(); /* again, harmlessly */
        assert_eq!(proxy.name(), "");
    }

    #[test]
    fn test_proxy_does_not_keep_document_alive() {
        let (doc, proxy) = create_test_proxy(include_str!("document_tests/filter_example.xml"));
        let weak = rc::Rc::downgrade(&doc);

        drop(doc);
        assert!(weak.upgrade().is_none());
        assert_eq!(proxy.entity_count(), 0);
    }

    /* filter_example.xml materializes in pre-order:
       1 root
       +- 2 asm (assembly)
       |  +- 3 leaf
       +- 4 ref (reference)
          +- 5 target */
    #[test]
    fn test_traverse_suppresses_reference_children() {
        let (_doc, proxy) = create_test_proxy(include_str!("document_tests/filter_example.xml"));

        let mut visited = vec::Vec::new();
        proxy.traverse_model_tree(|id| visited.push(id));
        assert_eq!(visited, vec![node(1), node(2), node(3), node(4)]);
    }

    /* reference_chain.xml:
       1 ref (reference)
       +- 2 mid
          +- 3 leaf
       The walk is not pruned: leaf's own parent is plain, so leaf is
       reported even though a reference sits above it. */
    #[test]
    fn test_traverse_reference_of_reference_is_single_level() {
        let (_doc, proxy) = create_test_proxy(include_str!("document_tests/reference_chain.xml"));

        let mut visited = vec::Vec::new();
        proxy.traverse_model_tree(|id| visited.push(id));
        assert_eq!(visited, vec![node(1), node(3)]);
    }

    #[test]
    fn test_traverse_callback_may_read_back() {
        let (_doc, proxy) = create_test_proxy(include_str!("document_tests/filter_example.xml"));

        let mut names = vec::Vec::new();
        proxy.traverse_model_tree(|id| names.push(proxy.tree_node_name(id)));
        assert_eq!(names, vec!["root", "asm", "leaf", "ref"]);
    }

    #[test]
    fn test_tree_node_accessors() {
        let (_doc, proxy) = create_test_proxy(include_str!("document_tests/filter_example.xml"));

        assert_eq!(proxy.tree_node_name(node(2)), "asm");
        assert_eq!(proxy.tree_node_tag(node(2)), "0:1:1");
        assert_eq!(proxy.tree_node_tag(node(5)), "0:1:2:1");
        assert_eq!(proxy.tree_node_parent(node(2)), node(1));
        assert_eq!(proxy.tree_node_parent(node(1)), tree::NodeId::NULL);

        assert!(proxy.tree_node_is_assembly(node(2)));
        assert!(!proxy.tree_node_is_assembly(node(4)));
        assert!(proxy.tree_node_is_instance(node(4)));
        assert!(!proxy.tree_node_is_instance(node(2)));

        /* unresolvable ids answer with sentinels */
        assert_eq!(proxy.tree_node_name(node(99)), "");
        assert_eq!(proxy.tree_node_tag(node(99)), "");
        assert_eq!(proxy.tree_node_parent(node(99)), tree::NodeId::NULL);
        assert!(!proxy.tree_node_is_assembly(node(99)));
        assert!(!proxy.tree_node_is_instance(node(99)));
        assert!(!proxy.tree_node_is_component(node(99)));
    }
}
