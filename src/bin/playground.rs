use std::rc;

use trellis::model::application;
use trellis::model::document::structure;
use trellis::script::binding;
use trellis::script::value;

use tracing::instrument;

fn setup_tracing() {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .pretty()
        .with_max_level(tracing::Level::TRACE)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

/* Number of hops from a node to its root, asked entirely through the
   dispatch surface. */
fn depth_of(bindings: &rc::Rc<binding::Bindings>, doc: value::ObjectId, node: i64) -> usize {
    let mut depth = 0;
    let mut current = node;
    loop {
        current = match bindings
            .call(doc, "treeNodeParent", &[value::Value::Int(current)])
            .as_int()
        {
            Some(0) | None => break,
            Some(parent) => parent,
        };
        depth += 1;
    }
    depth
}

#[instrument]
fn print_tree(bindings: &rc::Rc<binding::Bindings>, doc: value::ObjectId) {
    let visit = value::ScriptFn::new({
        let bindings = bindings.clone();
        move |args| {
            let node = args[0].as_int().unwrap();
            let is = |method: &str| {
                bindings.call(doc, method, std::slice::from_ref(&args[0]))
                    == value::Value::Bool(true)
            };
            let kind = if is("treeNodeIsAssembly") {
                "assembly"
            } else if is("treeNodeIsInstance") {
                "instance"
            } else if is("treeNodeIsComponent") {
                "component"
            } else {
                "plain"
            };

            let name = bindings.call(doc, "treeNodeName", std::slice::from_ref(&args[0]));
            let tag = bindings.call(doc, "treeNodeTag", std::slice::from_ref(&args[0]));
            println!(
                "  {}{} <{}> [{}]",
                "  ".repeat(depth_of(&bindings, doc, node)),
                name.as_str().unwrap_or("?"),
                kind,
                tag.as_str().unwrap_or("?")
            );
        }
    });

    bindings.call(doc, "traverseModelTree", &[value::Value::Fn(visit)]);
}

fn main() {
    setup_tracing();

    let app = application::Application::new();
    let app_proxy = trellis::script::application::ApplicationProxy::new(&app);
    let bindings = binding::Bindings::new();
    let root = bindings.install(&app_proxy);

    println!("trellis {:?}", bindings.get(root, "versionString"));

    let _watch_added = bindings
        .connect(
            root,
            "documentAdded",
            value::ScriptFn::new({
                let bindings = bindings.clone();
                move |args| {
                    let handle = args[0].as_object().unwrap();
                    println!("+ document {:?}", bindings.get(handle, "name"));
                }
            }),
        )
        .unwrap();
    let _watch_closing = bindings
        .connect(
            root,
            "documentAboutToClose",
            value::ScriptFn::new({
                let bindings = bindings.clone();
                move |args| {
                    let handle = args[0].as_object().unwrap();
                    println!(
                        "- document {:?} ({:?} entities at close)",
                        bindings.get(handle, "name"),
                        bindings.get(handle, "entityCount")
                    );
                }
            }),
        )
        .unwrap();
    let _watch_count = bindings
        .connect(
            root,
            "documentCountChanged",
            value::ScriptFn::new({
                let bindings = bindings.clone();
                move |_| println!("document count is now {:?}", bindings.get(root, "documentCount"))
            }),
        )
        .unwrap();

    let handle = bindings
        .call(root, "newDocument", &[])
        .as_object()
        .expect("no application behind the bridge");

    match std::env::args().nth(1) {
        Some(path) => app
            .document_at(0)
            .unwrap()
            .load_structure_fixture(&path)
            .expect("loading fixture failed"),
        None => {
            app.document_at(0).unwrap().add_entity(
                structure::EntityNode::builder()
                    .name("chassis")
                    .kind(structure::Kind::Assembly)
                    .child(|b| b
                           .name("bolt")
                           .kind(structure::Kind::Component))
                    .child(|b| b
                           .name("wheel-ref")
                           .kind(structure::Kind::Reference)
                           .child(|b| b.name("wheel")))
                    .build(),
            );
        }
    }

    bindings.set(handle, "name", value::Value::from("playground"));

    println!(
        "{:?} entities in {:?}:",
        bindings.get(handle, "entityCount"),
        bindings.get(handle, "name")
    );
    print_tree(&bindings, handle);

    bindings.call(root, "closeDocument", &[value::Value::Object(handle)]);

    /* the handle outlives the close, answering with sentinels */
    println!(
        "after close: id {:?}, name {:?}, documents {:?}",
        bindings.get(handle, "id"),
        bindings.get(handle, "name"),
        bindings.get(root, "documentCount")
    );
}
