use std::fmt;
use std::vec;

/* Identifies one node within one Tree. Ids are small dense integers handed
   out at insertion and never reused for the life of the tree; NULL (0) is
   reserved and never identifies a node. Ids from one tree mean nothing to
   another. */
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NodeId(u32);

impl NodeId {
    pub const NULL: NodeId = NodeId(0);

    pub fn is_null(self) -> bool {
        self == NodeId::NULL
    }

    pub fn value(self) -> u32 {
        self.0
    }

    pub fn from_value(v: u32) -> NodeId {
        NodeId(v)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
struct NodeEntry<T> {
    data: T,
    parent: NodeId, /* NULL for roots */
    children: vec::Vec<NodeId>,
    alive: bool,
}

/* A forest of nodes addressed by NodeId. Insertion is append-only; removal
   only happens wholesale at the root of a subtree, so every child listed on
   a live node is itself live. Lookups on NULL, stale, or out-of-range ids
   fail softly rather than panicking. */
#[derive(Debug)]
pub struct Tree<T> {
    entries: vec::Vec<NodeEntry<T>>,
    roots: vec::Vec<NodeId>,
}

impl<T> Tree<T> {
    pub fn new() -> Tree<T> {
        Tree {
            entries: vec::Vec::new(),
            roots: vec::Vec::new(),
        }
    }

    fn entry(&self, id: NodeId) -> Option<&NodeEntry<T>> {
        if id.is_null() {
            return None;
        }
        self.entries.get(id.0 as usize - 1).filter(|e| e.alive)
    }

    fn allocate(&mut self, data: T, parent: NodeId) -> NodeId {
        let id = NodeId(self.entries.len() as u32 + 1);
        self.entries.push(NodeEntry {
            data,
            parent,
            children: vec::Vec::new(),
            alive: true,
        });
        id
    }

    pub fn create_root(&mut self, data: T) -> NodeId {
        let id = self.allocate(data, NodeId::NULL);
        self.roots.push(id);
        id
    }

    /* Panics if the parent is NULL or no longer live. */
    pub fn append_child(&mut self, parent: NodeId, data: T) -> NodeId {
        assert!(self.contains(parent), "append_child requires a live parent");
        let id = self.allocate(data, parent);
        self.entries[parent.0 as usize - 1].children.push(id);
        id
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.entry(id).is_some()
    }

    pub fn node_data(&self, id: NodeId) -> Option<&T> {
        self.entry(id).map(|e| &e.data)
    }

    pub fn node_data_mut(&mut self, id: NodeId) -> Option<&mut T> {
        if id.is_null() {
            return None;
        }
        self.entries
            .get_mut(id.0 as usize - 1)
            .filter(|e| e.alive)
            .map(|e| &mut e.data)
    }

    /* NULL both for roots and for ids that don't resolve. */
    pub fn node_parent(&self, id: NodeId) -> NodeId {
        self.entry(id).map_or(NodeId::NULL, |e| e.parent)
    }

    pub fn node_children(&self, id: NodeId) -> &[NodeId] {
        self.entry(id).map_or(&[], |e| &e.children[..])
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn is_root(&self, id: NodeId) -> bool {
        self.entry(id).map_or(false, |e| e.parent.is_null())
    }

    pub fn node_count(&self) -> usize {
        self.entries.iter().filter(|e| e.alive).count()
    }

    /* Discards an entire root subtree. Ids of the discarded nodes go stale
       and are never reissued. Returns false without touching anything if the
       id is not a live root. */
    pub fn remove_root(&mut self, id: NodeId) -> bool {
        if !self.is_root(id) {
            return false;
        }
        self.roots.retain(|&r| r != id);
        self.kill_subtree(id);
        true
    }

    fn kill_subtree(&mut self, id: NodeId) {
        let children = std::mem::take(&mut self.entries[id.0 as usize - 1].children);
        self.entries[id.0 as usize - 1].alive = false;
        for child in children {
            self.kill_subtree(child);
        }
    }

    /* Depth-first pre-order over the whole forest: each node before its
       children, roots in creation order, siblings in insertion order. */
    pub fn traverse<F: FnMut(NodeId)>(&self, mut f: F) {
        for &root in &self.roots {
            self.walk(root, &mut f);
        }
    }

    pub fn traverse_subtree<F: FnMut(NodeId)>(&self, start: NodeId, mut f: F) {
        if self.contains(start) {
            self.walk(start, &mut f);
        }
    }

    fn walk<F: FnMut(NodeId)>(&self, id: NodeId, f: &mut F) {
        f(id);
        for &child in self.node_children(id) {
            self.walk(child, f);
        }
    }
}

impl<T> Default for Tree<T> {
    fn default() -> Tree<T> {
        Tree::new()
    }
}
