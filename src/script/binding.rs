//! Engine-neutral dispatch surface. Each proxy class carries one static
//! table enumerating its script-visible members; a runtime adapter resolves
//! objects by handle and members by name, never by reflection. Lookups that
//! fail resolve to the calling operation's sentinel, so nothing here ever
//! returns an error to the script side.

use std::cell;
use std::collections;
use std::rc;
use std::vec;

use crate::model::tree;
use crate::script::application::ApplicationProxy;
use crate::script::document::DocumentProxy;
use crate::script::value;
use crate::signal;

use enum_dispatch::enum_dispatch;
use once_cell::sync::Lazy;
use tracing::{event, Level};

bitflags::bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct MemberFlags: u8 {
        /* the property accepts writes */
        const WRITE = 1 << 0;
        /* invoking it changes observable state */
        const SIDE_EFFECTS = 1 << 1;
    }
}

/* One row of a class's member table. */
pub struct Member<T> {
    pub name: &'static str,
    pub kind: MemberKind<T>,
    pub flags: MemberFlags,
}

pub enum MemberKind<T> {
    Property {
        get: fn(&T, &rc::Rc<Bindings>) -> value::Value,
        set: Option<fn(&T, value::Value)>,
    },
    Method(fn(&T, &rc::Rc<Bindings>, &[value::Value]) -> value::Value),
    Signal(fn(&T, &rc::Rc<Bindings>, value::ScriptFn) -> signal::Connection),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MemberRole {
    Property,
    Method,
    Signal,
}

/* Flat description of a table row, for host-side introspection. */
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MemberInfo {
    pub name: &'static str,
    pub role: MemberRole,
    pub flags: MemberFlags,
}

fn find_member<'t, T>(table: &'t [Member<T>], name: &str) -> Option<&'t Member<T>> {
    table.iter().find(|m| m.name == name)
}

fn dispatch_get<T>(
    target: &T,
    table: &[Member<T>],
    bindings: &rc::Rc<Bindings>,
    class: &'static str,
    name: &str,
) -> value::Value {
    match find_member(table, name).map(|m| &m.kind) {
        Some(MemberKind::Property { get, .. }) => get(target, bindings),
        Some(_) => {
            event!(Level::WARN, "{}.{} is not a property", class, name);
            value::Value::Null
        }
        None => {
            event!(Level::WARN, "{} has no member '{}'", class, name);
            value::Value::Null
        }
    }
}

fn dispatch_set<T>(target: &T, table: &[Member<T>], class: &'static str, name: &str, v: value::Value) {
    match find_member(table, name).map(|m| &m.kind) {
        Some(MemberKind::Property { set: Some(set), .. }) => set(target, v),
        Some(MemberKind::Property { set: None, .. }) => {
            event!(Level::WARN, "{}.{} is read-only", class, name);
        }
        Some(_) => {
            event!(Level::WARN, "{}.{} is not a property", class, name);
        }
        None => {
            event!(Level::WARN, "{} has no member '{}'", class, name);
        }
    }
}

fn dispatch_call<T>(
    target: &T,
    table: &[Member<T>],
    bindings: &rc::Rc<Bindings>,
    class: &'static str,
    name: &str,
    args: &[value::Value],
) -> value::Value {
    match find_member(table, name).map(|m| &m.kind) {
        Some(MemberKind::Method(invoke)) => invoke(target, bindings, args),
        Some(_) => {
            event!(Level::WARN, "{}.{} is not callable", class, name);
            value::Value::Null
        }
        None => {
            event!(Level::WARN, "{} has no member '{}'", class, name);
            value::Value::Null
        }
    }
}

fn dispatch_connect<T>(
    target: &T,
    table: &[Member<T>],
    bindings: &rc::Rc<Bindings>,
    class: &'static str,
    name: &str,
    f: value::ScriptFn,
) -> Option<signal::Connection> {
    match find_member(table, name).map(|m| &m.kind) {
        Some(MemberKind::Signal(connect)) => Some(connect(target, bindings, f)),
        Some(_) => {
            event!(Level::WARN, "{}.{} is not a signal", class, name);
            None
        }
        None => {
            event!(Level::WARN, "{} has no member '{}'", class, name);
            None
        }
    }
}

fn describe_table<T>(table: &[Member<T>]) -> vec::Vec<MemberInfo> {
    table
        .iter()
        .map(|m| MemberInfo {
            name: m.name,
            role: match m.kind {
                MemberKind::Property { .. } => MemberRole::Property,
                MemberKind::Method(_) => MemberRole::Method,
                MemberKind::Signal(_) => MemberRole::Signal,
            },
            flags: m.flags,
        })
        .collect()
}

#[enum_dispatch]
pub trait ScriptObjectExt {
    fn class_name(&self) -> &'static str;
    fn identity(&self) -> usize;
    fn describe(&self) -> vec::Vec<MemberInfo>;
    fn get(&self, bindings: &rc::Rc<Bindings>, name: &str) -> value::Value;
    fn set(&self, name: &str, v: value::Value);
    fn call(&self, bindings: &rc::Rc<Bindings>, name: &str, args: &[value::Value]) -> value::Value;
    fn connect(&self, bindings: &rc::Rc<Bindings>, name: &str, f: value::ScriptFn)
        -> Option<signal::Connection>;
}

#[derive(Clone, Debug)]
pub struct ApplicationObject(pub rc::Rc<ApplicationProxy>);

#[derive(Clone, Debug)]
pub struct DocumentObject(pub rc::Rc<DocumentProxy>);

#[enum_dispatch(ScriptObjectExt)]
#[derive(Clone, Debug)]
pub enum ScriptObject {
    Application(ApplicationObject),
    Document(DocumentObject),
}

/* First argument resolved as a Document object, or None. */
fn resolve_document(bindings: &rc::Rc<Bindings>, args: &[value::Value]) -> Option<DocumentObject> {
    match bindings.lookup(args.first()?.as_object()?)? {
        ScriptObject::Document(doc) => Some(doc),
        _ => None,
    }
}

/* First argument interpreted as a tree node id. Anything unconvertible
   becomes NULL, which every downstream accessor answers with its
   sentinel. */
fn node_arg(args: &[value::Value]) -> tree::NodeId {
    args.first()
        .and_then(value::Value::as_int)
        .and_then(|i| u32::try_from(i).ok())
        .map_or(tree::NodeId::NULL, tree::NodeId::from_value)
}

static APPLICATION_MEMBERS: Lazy<vec::Vec<Member<ApplicationObject>>> = Lazy::new(|| {
    vec![
        Member {
            name: "versionString",
            kind: MemberKind::Property {
                get: |app, _| value::Value::from(app.0.version_string()),
                set: None,
            },
            flags: MemberFlags::empty(),
        },
        Member {
            name: "documentCount",
            kind: MemberKind::Property {
                get: |app, _| value::Value::Int(app.0.document_count() as i64),
                set: None,
            },
            flags: MemberFlags::empty(),
        },
        Member {
            name: "newDocument",
            kind: MemberKind::Method(|app, bindings, _args| {
                value::Value::from(app.0.new_document().map(|p| bindings.intern_document(&p)))
            }),
            flags: MemberFlags::SIDE_EFFECTS,
        },
        Member {
            name: "documentAt",
            kind: MemberKind::Method(|app, bindings, args| {
                match args.first().and_then(value::Value::as_int) {
                    Some(index) => value::Value::from(
                        app.0.document_at(index).map(|p| bindings.intern_document(&p)),
                    ),
                    None => value::Value::Null,
                }
            }),
            flags: MemberFlags::empty(),
        },
        Member {
            name: "findDocumentByLocation",
            kind: MemberKind::Method(|app, bindings, args| {
                match args.first().and_then(|v| v.as_str()) {
                    Some(location) => value::Value::from(
                        app.0
                            .find_document_by_location(location)
                            .map(|p| bindings.intern_document(&p)),
                    ),
                    None => value::Value::Null,
                }
            }),
            flags: MemberFlags::empty(),
        },
        Member {
            name: "findIndexOfDocument",
            kind: MemberKind::Method(|app, bindings, args| {
                value::Value::Int(match resolve_document(bindings, args) {
                    Some(doc) => app.0.find_index_of_document(&doc.0),
                    None => -1,
                })
            }),
            flags: MemberFlags::empty(),
        },
        Member {
            name: "closeDocument",
            kind: MemberKind::Method(|app, bindings, args| {
                if let Some(doc) = resolve_document(bindings, args) {
                    app.0.close_document(&doc.0);
                }
                value::Value::Null
            }),
            flags: MemberFlags::SIDE_EFFECTS,
        },
        Member {
            name: "documentAdded",
            kind: MemberKind::Signal(|app, bindings, f| {
                let weak = rc::Rc::downgrade(bindings);
                app.0.document_added.connect(move |p| {
                    if let Some(bindings) = weak.upgrade() {
                        let id = bindings.intern_document(p);
                        f.call(&[value::Value::Object(id)]);
                    }
                })
            }),
            flags: MemberFlags::empty(),
        },
        Member {
            name: "documentAboutToClose",
            kind: MemberKind::Signal(|app, bindings, f| {
                let weak = rc::Rc::downgrade(bindings);
                app.0.document_about_to_close.connect(move |p| {
                    if let Some(bindings) = weak.upgrade() {
                        let id = bindings.intern_document(p);
                        f.call(&[value::Value::Object(id)]);
                    }
                })
            }),
            flags: MemberFlags::empty(),
        },
        Member {
            name: "documentCountChanged",
            kind: MemberKind::Signal(|app, _, f| {
                app.0.document_count_changed.connect(move |_| f.call(&[]))
            }),
            flags: MemberFlags::empty(),
        },
    ]
});

static DOCUMENT_MEMBERS: Lazy<vec::Vec<Member<DocumentObject>>> = Lazy::new(|| {
    vec![
        Member {
            name: "id",
            kind: MemberKind::Property {
                get: |doc, _| value::Value::Int(i64::from(doc.0.id().value())),
                set: None,
            },
            flags: MemberFlags::empty(),
        },
        Member {
            name: "name",
            kind: MemberKind::Property {
                get: |doc, _| value::Value::from(doc.0.name()),
                set: Some(|doc, v| match v.as_str() {
                    Some(name) => doc.0.set_name(name),
                    None => event!(Level::WARN, "ignoring non-string write to Document.name"),
                }),
            },
            flags: MemberFlags::WRITE | MemberFlags::SIDE_EFFECTS,
        },
        Member {
            name: "filePath",
            kind: MemberKind::Property {
                get: |doc, _| value::Value::from(doc.0.file_path().to_string_lossy().into_owned()),
                set: None,
            },
            flags: MemberFlags::empty(),
        },
        Member {
            name: "entityCount",
            kind: MemberKind::Property {
                get: |doc, _| value::Value::Int(doc.0.entity_count() as i64),
                set: None,
            },
            flags: MemberFlags::empty(),
        },
        Member {
            name: "traverseModelTree",
            kind: MemberKind::Method(|doc, _, args| {
                if let Some(f) = args.first().and_then(value::Value::as_fn) {
                    doc.0
                        .traverse_model_tree(|id| f.call(&[value::Value::Int(i64::from(id.value()))]));
                }
                value::Value::Null
            }),
            flags: MemberFlags::empty(),
        },
        Member {
            name: "treeNodeName",
            kind: MemberKind::Method(|doc, _, args| {
                value::Value::from(doc.0.tree_node_name(node_arg(args)))
            }),
            flags: MemberFlags::empty(),
        },
        Member {
            name: "treeNodeTag",
            kind: MemberKind::Method(|doc, _, args| {
                value::Value::from(doc.0.tree_node_tag(node_arg(args)))
            }),
            flags: MemberFlags::empty(),
        },
        Member {
            name: "treeNodeParent",
            kind: MemberKind::Method(|doc, _, args| {
                value::Value::Int(i64::from(doc.0.tree_node_parent(node_arg(args)).value()))
            }),
            flags: MemberFlags::empty(),
        },
        Member {
            name: "treeNodeIsAssembly",
            kind: MemberKind::Method(|doc, _, args| {
                value::Value::Bool(doc.0.tree_node_is_assembly(node_arg(args)))
            }),
            flags: MemberFlags::empty(),
        },
        Member {
            name: "treeNodeIsInstance",
            kind: MemberKind::Method(|doc, _, args| {
                value::Value::Bool(doc.0.tree_node_is_instance(node_arg(args)))
            }),
            flags: MemberFlags::empty(),
        },
        Member {
            name: "treeNodeIsComponent",
            kind: MemberKind::Method(|doc, _, args| {
                value::Value::Bool(doc.0.tree_node_is_component(node_arg(args)))
            }),
            flags: MemberFlags::empty(),
        },
        Member {
            name: "nameChanged",
            kind: MemberKind::Signal(|doc, _, f| doc.0.name_changed.connect(move |_| f.call(&[]))),
            flags: MemberFlags::empty(),
        },
        Member {
            name: "filePathChanged",
            kind: MemberKind::Signal(|doc, _, f| {
                doc.0.file_path_changed.connect(move |_| f.call(&[]))
            }),
            flags: MemberFlags::empty(),
        },
        Member {
            name: "entityCountChanged",
            kind: MemberKind::Signal(|doc, _, f| {
                doc.0.entity_count_changed.connect(move |_| f.call(&[]))
            }),
            flags: MemberFlags::empty(),
        },
    ]
});

impl ScriptObjectExt for ApplicationObject {
    fn class_name(&self) -> &'static str {
        "Application"
    }

    fn identity(&self) -> usize {
        rc::Rc::as_ptr(&self.0) as usize
    }

    fn describe(&self) -> vec::Vec<MemberInfo> {
        describe_table(&APPLICATION_MEMBERS)
    }

    fn get(&self, bindings: &rc::Rc<Bindings>, name: &str) -> value::Value {
        dispatch_get(self, &APPLICATION_MEMBERS, bindings, self.class_name(), name)
    }

    fn set(&self, name: &str, v: value::Value) {
        dispatch_set(self, &APPLICATION_MEMBERS, self.class_name(), name, v)
    }

    fn call(&self, bindings: &rc::Rc<Bindings>, name: &str, args: &[value::Value]) -> value::Value {
        dispatch_call(self, &APPLICATION_MEMBERS, bindings, self.class_name(), name, args)
    }

    fn connect(
        &self,
        bindings: &rc::Rc<Bindings>,
        name: &str,
        f: value::ScriptFn,
    ) -> Option<signal::Connection> {
        dispatch_connect(self, &APPLICATION_MEMBERS, bindings, self.class_name(), name, f)
    }
}

impl ScriptObjectExt for DocumentObject {
    fn class_name(&self) -> &'static str {
        "Document"
    }

    fn identity(&self) -> usize {
        rc::Rc::as_ptr(&self.0) as usize
    }

    fn describe(&self) -> vec::Vec<MemberInfo> {
        describe_table(&DOCUMENT_MEMBERS)
    }

    fn get(&self, bindings: &rc::Rc<Bindings>, name: &str) -> value::Value {
        dispatch_get(self, &DOCUMENT_MEMBERS, bindings, self.class_name(), name)
    }

    fn set(&self, name: &str, v: value::Value) {
        dispatch_set(self, &DOCUMENT_MEMBERS, self.class_name(), name, v)
    }

    fn call(&self, bindings: &rc::Rc<Bindings>, name: &str, args: &[value::Value]) -> value::Value {
        dispatch_call(self, &DOCUMENT_MEMBERS, bindings, self.class_name(), name, args)
    }

    fn connect(
        &self,
        bindings: &rc::Rc<Bindings>,
        name: &str,
        f: value::ScriptFn,
    ) -> Option<signal::Connection> {
        dispatch_connect(self, &DOCUMENT_MEMBERS, bindings, self.class_name(), name, f)
    }
}

/* Object registry handed to the embedding runtime. Hands out stable integer
   handles for proxies and routes get/set/call/connect through the member
   tables. Entries are held strongly for the whole session: a handle kept by
   a script after its document closed still resolves, to a detached proxy
   that answers with sentinels. Holding entries strongly also means an
   identity key can never be reused while its entry lives. */
pub struct Bindings {
    objects: cell::RefCell<collections::HashMap<value::ObjectId, ScriptObject>>,
    interned: cell::RefCell<collections::HashMap<usize, value::ObjectId>>,
    next_id: cell::Cell<u64>,
}

impl Bindings {
    pub fn new() -> rc::Rc<Bindings> {
        rc::Rc::new(Bindings {
            objects: cell::RefCell::new(collections::HashMap::new()),
            interned: cell::RefCell::new(collections::HashMap::new()),
            next_id: cell::Cell::new(1),
        })
    }

    /* Registers the root object scripts start from. */
    pub fn install(&self, app_proxy: &rc::Rc<ApplicationProxy>) -> value::ObjectId {
        self.intern_application(app_proxy)
    }

    fn intern(&self, object: ScriptObject) -> value::ObjectId {
        let key = object.identity();
        if let Some(&id) = self.interned.borrow().get(&key) {
            return id;
        }

        let id = value::ObjectId::from_value(self.next_id.get());
        self.next_id.set(self.next_id.get() + 1);
        event!(Level::DEBUG, "registered {} as object {}", object.class_name(), id.value());
        self.interned.borrow_mut().insert(key, id);
        self.objects.borrow_mut().insert(id, object);
        id
    }

    pub fn intern_application(&self, app_proxy: &rc::Rc<ApplicationProxy>) -> value::ObjectId {
        self.intern(ScriptObject::Application(ApplicationObject(app_proxy.clone())))
    }

    pub fn intern_document(&self, doc_proxy: &rc::Rc<DocumentProxy>) -> value::ObjectId {
        self.intern(ScriptObject::Document(DocumentObject(doc_proxy.clone())))
    }

    pub fn lookup(&self, id: value::ObjectId) -> Option<ScriptObject> {
        self.objects.borrow().get(&id).cloned()
    }

    pub fn describe(&self, target: value::ObjectId) -> vec::Vec<MemberInfo> {
        self.lookup(target).map(|o| o.describe()).unwrap_or_default()
    }

    pub fn get(self: &rc::Rc<Bindings>, target: value::ObjectId, name: &str) -> value::Value {
        match self.lookup(target) {
            Some(object) => object.get(self, name),
            None => {
                event!(Level::WARN, "get on unknown object {}", target.value());
                value::Value::Null
            }
        }
    }

    pub fn set(self: &rc::Rc<Bindings>, target: value::ObjectId, name: &str, v: value::Value) {
        match self.lookup(target) {
            Some(object) => object.set(name, v),
            None => {
                event!(Level::WARN, "set on unknown object {}", target.value());
            }
        }
    }

    pub fn call(
        self: &rc::Rc<Bindings>,
        target: value::ObjectId,
        name: &str,
        args: &[value::Value],
    ) -> value::Value {
        match self.lookup(target) {
            Some(object) => object.call(self, name, args),
            None => {
                event!(Level::WARN, "call on unknown object {}", target.value());
                value::Value::Null
            }
        }
    }

    pub fn connect(
        self: &rc::Rc<Bindings>,
        target: value::ObjectId,
        name: &str,
        f: value::ScriptFn,
    ) -> Option<signal::Connection> {
        match self.lookup(target) {
            Some(object) => object.connect(self, name, f),
            None => {
                event!(Level::WARN, "connect on unknown object {}", target.value());
                None
            }
        }
    }
}

impl std::fmt::Debug for Bindings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bindings")
            .field("objects", &self.objects.borrow().len())
            .finish_non_exhaustive()
    }
}
