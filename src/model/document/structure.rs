use std::vec;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum Kind {
    #[default]
    Plain,
    Assembly,
    Reference, //< link to a definition elsewhere in the model
    Component,
}

/* What the document tree stores for every node. The tag is the node's entry
   path, colon-separated, assigned once when the entity is added and stable
   from then on. */
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Label {
    pub name: String,
    pub tag: String,
    pub kind: Kind,
}

/* Classification seam for the scripting bridge. */
pub fn is_assembly(label: &Label) -> bool {
    matches!(label.kind, Kind::Assembly)
}

pub fn is_reference(label: &Label) -> bool {
    matches!(label.kind, Kind::Reference)
}

pub fn is_component(label: &Label) -> bool {
    matches!(label.kind, Kind::Component)
}

/* A subtree of nodes-to-be, before a document has assigned tags. */
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct EntityNode {
    pub name: String,
    pub kind: Kind,
    pub children: vec::Vec<EntityNode>,
}

impl EntityNode {
    pub fn builder() -> EntityBuilder {
        EntityBuilder {
            node: EntityNode {
                name: String::new(),
                kind: Kind::Plain,
                children: vec::Vec::new(),
            },
        }
    }
}

pub struct EntityBuilder {
    node: EntityNode,
}

impl EntityBuilder {
    pub fn name<S: Into<String>>(mut self, name: S) -> EntityBuilder {
        self.node.name = name.into();
        self
    }

    pub fn kind(mut self, kind: Kind) -> EntityBuilder {
        self.node.kind = kind;
        self
    }

    pub fn child<F: FnOnce(EntityBuilder) -> EntityBuilder>(mut self, f: F) -> EntityBuilder {
        self.node.children.push(f(EntityNode::builder()).build());
        self
    }

    pub fn build(self) -> EntityNode {
        self.node
    }
}

pub mod xml {
    use super::*;

    use std::vec;

    extern crate roxmltree;

    /* One document worth of structure: an optional document name plus the
       entities to add, in order. */
    pub struct Fixture {
        pub name: Option<String>,
        pub entities: vec::Vec<EntityNode>,
    }

    impl Fixture {
        pub fn from_xml(document: &roxmltree::Document) -> Fixture {
            let re = document.root_element();
            assert!(re.has_tag_name("document"));

            Fixture {
                name: re.attribute("name").map(String::from),
                entities: re
                    .children()
                    .filter(|c| c.is_element())
                    .map(inflate_entity)
                    .collect(),
            }
        }

        pub fn from_str(text: &str) -> Result<Fixture, roxmltree::Error> {
            Ok(Fixture::from_xml(&roxmltree::Document::parse(text)?))
        }
    }

    pub fn inflate_entity(xml: roxmltree::Node) -> EntityNode {
        match xml.tag_name().name() {
            "node" => EntityNode {
                name: xml.attribute("name").unwrap().to_string(),
                kind: match xml.attribute("kind") {
                    None => Kind::Plain,
                    Some("plain") => Kind::Plain,
                    Some("assembly") => Kind::Assembly,
                    Some("reference") => Kind::Reference,
                    Some("component") => Kind::Component,
                    Some(invalid) => panic!("invalid kind attribute: {}", invalid),
                },
                children: xml
                    .children()
                    .filter(|c| c.is_element())
                    .map(inflate_entity)
                    .collect(),
            },
            tn => panic!("unexpected tag '{}'", tn),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let entity = EntityNode::builder()
            .name("chassis")
            .kind(Kind::Assembly)
            .child(|b| b
                   .name("bolt")
                   .kind(Kind::Component))
            .child(|b| b
                   .name("wheel-ref")
                   .kind(Kind::Reference)
                   .child(|b| b
                          .name("wheel")))
            .build();

        assert_eq!(entity.name, "chassis");
        assert_eq!(entity.kind, Kind::Assembly);
        assert_eq!(entity.children.len(), 2);
        assert_eq!(entity.children[0].name, "bolt");
        assert_eq!(entity.children[1].children[0].name, "wheel");
        assert_eq!(entity.children[1].children[0].kind, Kind::Plain);
    }

    #[test]
    fn test_predicates() {
        let label = |kind| Label {
            name: "n".to_string(),
            tag: "0:1".to_string(),
            kind,
        };

        assert!(is_assembly(&label(Kind::Assembly)));
        assert!(!is_assembly(&label(Kind::Reference)));
        assert!(is_reference(&label(Kind::Reference)));
        assert!(!is_reference(&label(Kind::Plain)));
        assert!(is_component(&label(Kind::Component)));
        assert!(!is_component(&label(Kind::Assembly)));
    }

    #[test]
    fn test_xml_fixture() {
        let fixture = xml::Fixture::from_str(
            r#"
            <document name="suspension">
              <node name="chassis" kind="assembly">
                <node name="bolt" kind="component"/>
                <node name="wheel-ref" kind="reference">
                  <node name="wheel"/>
                </node>
              </node>
              <node name="manual"/>
            </document>
            "#,
        )
        .unwrap();

        assert_eq!(fixture.name.as_deref(), Some("suspension"));
        assert_eq!(fixture.entities.len(), 2);

        let chassis = &fixture.entities[0];
        assert_eq!(chassis.kind, Kind::Assembly);
        assert_eq!(chassis.children[1].kind, Kind::Reference);
        assert_eq!(chassis.children[1].children[0].name, "wheel");

        assert_eq!(fixture.entities[1].kind, Kind::Plain);
        assert!(fixture.entities[1].children.is_empty());
    }

    #[test]
    fn test_xml_rejects_garbage() {
        assert!(xml::Fixture::from_str("<document><node name=").is_err());
    }

    /* Every Kind must parse from the fixture vocabulary and be covered
       above. Make tests for your new Kind! */
    #[allow(unused)]
    fn kind_coverage(kind: Kind) {
        match kind {
            Kind::Plain => test_xml_fixture(),
            Kind::Assembly => test_builder(),
            Kind::Reference => test_predicates(),
            Kind::Component => test_predicates(),
        }
    }
}
