//! Markup and stylesheet rendering
//!
//! Output is deterministic: attributes keep insertion order, children keep
//! document order and rules keep source order.

use std::fmt::Write;

use crate::runtime::Value;
use super::markup::{UiChild, UiElement};
use super::style::StyleRule;

const INDENT: &str = "  ";

/// Elements rendered without a closing tag
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr",
];

pub fn render_markup(element: &UiElement) -> String {
    let mut out = String::new();
    render_element(&mut out, element, 0);
    out
}

pub fn render_stylesheet(rules: &[StyleRule]) -> String {
    let mut out = String::new();
    for rule in rules {
        let _ = writeln!(out, "{} {{", rule.selectors);
        for (property, value) in &rule.declarations {
            let _ = writeln!(out, "{}{}: {};", INDENT, property, value);
        }
        out.push_str("}\n");
    }
    out
}

/// Markup of `element` followed by an embedded `<style>` block
pub fn render_artifact(element: Option<&UiElement>, rules: &[StyleRule]) -> String {
    let mut out = element.map(render_markup).unwrap_or_default();
    if !rules.is_empty() {
        out.push_str("<style>\n");
        out.push_str(&render_stylesheet(rules));
        out.push_str("</style>\n");
    }
    out
}

fn render_element(out: &mut String, element: &UiElement, depth: usize) {
    if element.is_fragment() {
        for child in &element.children {
            render_child(out, child, depth);
        }
        return;
    }

    let pad = INDENT.repeat(depth);
    let _ = write!(out, "{}<{}", pad, element.tag);
    for (name, value) in &element.attributes {
        match value {
            Value::Boolean(true) => {
                let _ = write!(out, " {}", name);
            }
            other => {
                let _ = write!(out, " {}=\"{}\"", name, escape_attribute(&other.to_string()));
            }
        }
    }
    out.push('>');

    if VOID_TAGS.contains(&element.tag.as_str()) {
        out.push('\n');
        return;
    }

    let inline = element.children.iter().all(|c| matches!(c, UiChild::Text(_)));
    if inline {
        for child in &element.children {
            if let UiChild::Text(text) = child {
                out.push_str(&escape_text(text));
            }
        }
    } else {
        out.push('\n');
        for child in &element.children {
            render_child(out, child, depth + 1);
        }
        out.push_str(&pad);
    }
    let _ = writeln!(out, "</{}>", element.tag);
}

fn render_child(out: &mut String, child: &UiChild, depth: usize) {
    match child {
        UiChild::Element(element) => render_element(out, element, depth),
        UiChild::Text(text) => {
            let _ = writeln!(out, "{}{}", INDENT.repeat(depth), escape_text(text));
        }
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attribute(text: &str) -> String {
    escape_text(text).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::style::SelectorList;
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    fn element(tag: &str, attributes: Vec<(&str, Value)>, children: Vec<UiChild>) -> UiElement {
        UiElement {
            tag: tag.to_string(),
            attributes: attributes.into_iter().map(|(n, v)| (n.to_string(), v)).collect(),
            children,
        }
    }

    #[test]
    fn test_nested_markup() {
        let title = element("h1", vec![], vec![UiChild::Text("Title".to_string())]);
        let card = element(
            "div",
            vec![("class", Value::string("card")), ("hidden", Value::Boolean(true))],
            vec![UiChild::Element(Rc::new(title)), UiChild::Text("a < b".to_string())],
        );
        assert_eq!(
            render_markup(&card),
            "<div class=\"card\" hidden>\n  <h1>Title</h1>\n  a &lt; b\n</div>\n"
        );
    }

    #[test]
    fn test_void_and_empty_elements() {
        let root = UiElement::fragment(vec![
            UiChild::Element(Rc::new(element("br", vec![], vec![]))),
            UiChild::Element(Rc::new(element("p", vec![("title", Value::string("say \"hi\""))], vec![]))),
        ]);
        assert_eq!(render_markup(&root), "<br>\n<p title=\"say &quot;hi&quot;\"></p>\n");
    }

    #[test]
    fn test_artifact_embeds_stylesheet() {
        let rules = vec![StyleRule {
            selectors: SelectorList::parse(".primary-btn").unwrap_or_else(|e| panic!("{}", e)),
            declarations: vec![("background".to_string(), "#3498db".to_string())],
        }];
        let page = element("p", vec![], vec![UiChild::Text("hi".to_string())]);
        assert_eq!(
            render_artifact(Some(&page), &rules),
            "<p>hi</p>\n<style>\n.primary-btn {\n  background: #3498db;\n}\n</style>\n"
        );
        assert_eq!(render_artifact(None, &[]), "");
    }
}
