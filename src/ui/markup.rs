//! UI element trees and the UI compiler
//!
//! The interpreter evaluates a `ui { }` block into [`BoundNode`]s (every
//! attribute and splice already a concrete value, component calls already
//! made) and [`UiCompiler`] lowers those into an immutable [`UiElement`].

use std::rc::Rc;

use crate::runtime::Value;

/// Compiled markup element. A fragment (several roots, or a text-only
/// child list) has an empty tag and renders as its children.
#[derive(Debug, Clone, PartialEq)]
pub struct UiElement {
    pub tag: String,
    pub attributes: Vec<(String, Value)>,
    pub children: Vec<UiChild>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiChild {
    Element(Rc<UiElement>),
    Text(String),
}

impl UiElement {
    pub fn fragment(children: Vec<UiChild>) -> Self {
        Self {
            tag: String::new(),
            attributes: Vec::new(),
            children,
        }
    }

    pub fn is_fragment(&self) -> bool {
        self.tag.is_empty()
    }
}

/// A ui-block node after evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum BoundNode {
    Element {
        tag: String,
        attributes: Vec<(String, Value)>,
        children: Vec<BoundNode>,
    },
    Text(Value),
    /// `{expr}` or a component call result
    Splice(Value),
}

#[derive(Debug, Default)]
pub struct UiCompiler;

impl UiCompiler {
    pub fn new() -> Self {
        Self
    }

    /// Compile a block's top-level nodes. A single element root is
    /// returned as-is; anything else is wrapped in a fragment.
    pub fn compile(&self, nodes: &[BoundNode]) -> UiElement {
        let mut children = self.compile_children(nodes);
        if children.len() == 1 {
            if let UiChild::Element(element) = &children[0] {
                let element = Rc::clone(element);
                children.clear();
                return Rc::try_unwrap(element).unwrap_or_else(|shared| (*shared).clone());
            }
        }
        UiElement::fragment(children)
    }

    fn compile_children(&self, nodes: &[BoundNode]) -> Vec<UiChild> {
        let mut children = Vec::new();
        for node in nodes {
            match node {
                BoundNode::Element { tag, attributes, children: inner } => {
                    children.push(UiChild::Element(Rc::new(UiElement {
                        tag: tag.clone(),
                        attributes: compile_attributes(attributes),
                        children: self.compile_children(inner),
                    })));
                }
                BoundNode::Text(value) => push_text(&mut children, value),
                BoundNode::Splice(value) => splice(&mut children, value),
            }
        }
        children
    }
}

/// `false` and `none` attributes are omitted
fn compile_attributes(attributes: &[(String, Value)]) -> Vec<(String, Value)> {
    attributes
        .iter()
        .filter(|(_, v)| !matches!(v, Value::Boolean(false) | Value::None))
        .cloned()
        .collect()
}

fn push_text(children: &mut Vec<UiChild>, value: &Value) {
    match value {
        Value::None => {}
        other => children.push(UiChild::Text(other.to_string())),
    }
}

fn splice(children: &mut Vec<UiChild>, value: &Value) {
    match value {
        Value::Element(element) if element.is_fragment() => {
            children.extend(element.children.iter().cloned());
        }
        Value::Element(element) => children.push(UiChild::Element(Rc::clone(element))),
        Value::Array(items) => {
            for item in items.iter() {
                splice(children, item);
            }
        }
        other => push_text(children, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text(s: &str) -> BoundNode {
        BoundNode::Text(Value::string(s))
    }

    #[test]
    fn test_single_root_is_not_wrapped() {
        let nodes = vec![BoundNode::Element {
            tag: "div".to_string(),
            attributes: vec![("class".to_string(), Value::string("card"))],
            children: vec![text("hi")],
        }];
        let element = UiCompiler::new().compile(&nodes);
        assert_eq!(element.tag, "div");
        assert_eq!(element.children, vec![UiChild::Text("hi".to_string())]);
    }

    #[test]
    fn test_false_and_none_attributes_are_dropped() {
        let nodes = vec![BoundNode::Element {
            tag: "input".to_string(),
            attributes: vec![
                ("disabled".to_string(), Value::Boolean(false)),
                ("checked".to_string(), Value::Boolean(true)),
                ("title".to_string(), Value::None),
            ],
            children: Vec::new(),
        }];
        let element = UiCompiler::new().compile(&nodes);
        assert_eq!(element.attributes, vec![("checked".to_string(), Value::Boolean(true))]);
    }

    #[test]
    fn test_splices_flatten_arrays_and_fragments() {
        let item = Rc::new(UiElement {
            tag: "li".to_string(),
            attributes: Vec::new(),
            children: vec![UiChild::Text("a".to_string())],
        });
        let fragment = Rc::new(UiElement::fragment(vec![UiChild::Text("x".to_string())]));
        let nodes = vec![BoundNode::Element {
            tag: "ul".to_string(),
            attributes: Vec::new(),
            children: vec![
                BoundNode::Splice(Value::array(vec![
                    Value::Element(Rc::clone(&item)),
                    Value::Element(Rc::clone(&item)),
                ])),
                BoundNode::Splice(Value::Element(fragment)),
                BoundNode::Splice(Value::None),
            ],
        }];
        let element = UiCompiler::new().compile(&nodes);
        assert_eq!(element.children.len(), 3);
        assert_eq!(element.children[2], UiChild::Text("x".to_string()));
    }

    #[test]
    fn test_compilation_is_deterministic() {
        let nodes = vec![text("a"), BoundNode::Splice(Value::Int(3))];
        let compiler = UiCompiler::new();
        assert_eq!(compiler.compile(&nodes), compiler.compile(&nodes));
        assert!(compiler.compile(&nodes).is_fragment());
    }
}
