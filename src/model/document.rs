pub mod structure;

use std::cell;
use std::path;
use std::rc;

use crate::model::tree;
use crate::signal;

use tracing::{event, Level};

/* Identifies a Document for the life of the process. -1 is reserved as the
   invalid id and is what detached proxies report. */
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct DocumentId(i32);

impl DocumentId {
    pub const INVALID: DocumentId = DocumentId(-1);

    pub fn value(self) -> i32 {
        self.0
    }

    pub fn from_value(v: i32) -> DocumentId {
        DocumentId(v)
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/* A named, optionally file-backed container of entities. Each entity is one
   root subtree in the document's model tree; the entity count is exactly the
   number of those roots. All mutation goes through methods here so the
   matching signal always fires. */
pub struct Document {
    id: DocumentId,
    name: cell::RefCell<String>,
    file_path: cell::RefCell<path::PathBuf>,
    tree: cell::RefCell<tree::Tree<structure::Label>>,
    next_entity_ordinal: cell::Cell<u32>,

    pub name_changed: signal::Signal<String>,
    pub file_path_changed: signal::Signal<path::PathBuf>,
    pub entity_added: signal::Signal<tree::NodeId>,
    /* fires while the entity's subtree is still fully queryable */
    pub entity_about_to_be_destroyed: signal::Signal<tree::NodeId>,
}

#[derive(Debug)]
pub enum FixtureError {
    IoError(std::io::Error),
    XmlError(roxmltree::Error),
}

impl From<std::io::Error> for FixtureError {
    fn from(e: std::io::Error) -> FixtureError {
        FixtureError::IoError(e)
    }
}

impl From<roxmltree::Error> for FixtureError {
    fn from(e: roxmltree::Error) -> FixtureError {
        FixtureError::XmlError(e)
    }
}

impl Document {
    pub fn new<S: Into<String>>(id: DocumentId, name: S) -> rc::Rc<Document> {
        rc::Rc::new(Document {
            id,
            name: cell::RefCell::new(name.into()),
            file_path: cell::RefCell::new(path::PathBuf::new()),
            tree: cell::RefCell::new(tree::Tree::new()),
            next_entity_ordinal: cell::Cell::new(1),
            name_changed: signal::Signal::new(),
            file_path_changed: signal::Signal::new(),
            entity_added: signal::Signal::new(),
            entity_about_to_be_destroyed: signal::Signal::new(),
        })
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn name(&self) -> String {
        self.name.borrow().clone()
    }

    /* No signal when the new name equals the current one. */
    pub fn set_name(&self, name: &str) {
        if self.name.borrow().as_str() == name {
            return;
        }
        let name = name.to_string();
        *self.name.borrow_mut() = name.clone();
        self.name_changed.emit(&name);
    }

    pub fn file_path(&self) -> path::PathBuf {
        self.file_path.borrow().clone()
    }

    pub fn set_file_path<P: Into<path::PathBuf>>(&self, file_path: P) {
        let file_path = file_path.into();
        if *self.file_path.borrow() == file_path {
            return;
        }
        *self.file_path.borrow_mut() = file_path.clone();
        self.file_path_changed.emit(&file_path);
    }

    pub fn entity_count(&self) -> usize {
        self.tree.borrow().roots().len()
    }

    pub fn is_entity_root(&self, id: tree::NodeId) -> bool {
        self.tree.borrow().is_root(id)
    }

    /* Read access to the whole model tree. The borrow must not be held
       across calls back into this document's mutating methods. */
    pub fn model_tree(&self) -> cell::Ref<'_, tree::Tree<structure::Label>> {
        self.tree.borrow()
    }

    pub fn add_entity(&self, entity: structure::EntityNode) -> tree::NodeId {
        let ordinal = self.next_entity_ordinal.get();
        self.next_entity_ordinal.set(ordinal + 1);

        let root = {
            let mut tree = self.tree.borrow_mut();
            Document::materialize(&mut tree, tree::NodeId::NULL, entity, format!("0:{}", ordinal))
        };

        event!(Level::DEBUG, "document {}: added entity {}", self.id, root);
        self.entity_added.emit(&root);
        root
    }

    fn materialize(
        tree: &mut tree::Tree<structure::Label>,
        parent: tree::NodeId,
        node: structure::EntityNode,
        tag: String,
    ) -> tree::NodeId {
        let label = structure::Label {
            name: node.name,
            tag: tag.clone(),
            kind: node.kind,
        };
        let id = if parent.is_null() {
            tree.create_root(label)
        } else {
            tree.append_child(parent, label)
        };
        for (i, child) in node.children.into_iter().enumerate() {
            Document::materialize(tree, id, child, format!("{}:{}", tag, i + 1));
        }
        id
    }

    /* Ignores ids that aren't live entity roots. The signal fires before
       anything is detached. */
    pub fn destroy_entity(&self, entity: tree::NodeId) -> bool {
        if !self.tree.borrow().is_root(entity) {
            return false;
        }
        self.entity_about_to_be_destroyed.emit(&entity);
        self.tree.borrow_mut().remove_root(entity);
        event!(Level::DEBUG, "document {}: destroyed entity {}", self.id, entity);
        true
    }

    pub fn load_structure_fixture<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), FixtureError> {
        let text = std::fs::read_to_string(path)?;
        let xml = roxmltree::Document::parse(&text)?;
        let fixture = structure::xml::Fixture::from_xml(&xml);

        if let Some(name) = fixture.name {
            self.set_name(&name);
        }
        for entity in fixture.entities {
            self.add_entity(entity);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.id)
            .field("name", &self.name.borrow())
            .field("entities", &self.entity_count())
            .finish_non_exhaustive()
    }
}
