//! Thin helpers over the `markup5ever_rcdom` tree.

use crate::common::inline::parse_style;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

/// Parse an HTML string (document or fragment) into a DOM.
pub fn parse(html: &str) -> RcDom {
    parse_document(RcDom::default(), Default::default()).one(html)
}

/// The `<body>` element of a parsed document.
pub fn body(dom: &RcDom) -> Option<Handle> {
    let html = element_children(&dom.document)
        .into_iter()
        .find(|node| tag_name(node).as_deref() == Some("html"))?;
    element_children(&html)
        .into_iter()
        .find(|node| tag_name(node).as_deref() == Some("body"))
}

/// Lowercase local tag name, `None` for non-element nodes.
pub fn tag_name(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Element { name, .. } => {
            let local: &str = &name.local;
            Some(local.to_ascii_lowercase())
        }
        _ => None,
    }
}

pub fn attr(node: &Handle, attribute: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|a| AsRef::<str>::as_ref(&a.name.local).eq_ignore_ascii_case(attribute))
            .map(|a| a.value.to_string()),
        _ => None,
    }
}

pub fn classes(node: &Handle) -> Vec<String> {
    attr(node, "class")
        .map(|c| c.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

pub fn has_class(node: &Handle, class: &str) -> bool {
    classes(node).iter().any(|c| c == class)
}

/// Value of one inline style property.
pub fn style_value(node: &Handle, property: &str) -> Option<String> {
    let style = attr(node, "style")?;
    parse_style(&style)
        .into_iter()
        .find(|(prop, _)| prop == property)
        .map(|(_, value)| value)
}

pub fn element_children(node: &Handle) -> Vec<Handle> {
    node.children
        .borrow()
        .iter()
        .filter(|child| matches!(child.data, NodeData::Element { .. }))
        .cloned()
        .collect()
}

/// Child elements with the given tag name.
pub fn children_named(node: &Handle, tag: &str) -> Vec<Handle> {
    element_children(node)
        .into_iter()
        .filter(|child| tag_name(child).as_deref() == Some(tag))
        .collect()
}

/// Concatenated text of all descendant text nodes.
pub fn text_content(node: &Handle) -> String {
    let mut text = String::new();
    collect_text(node, &mut text);
    text
}

fn collect_text(node: &Handle, out: &mut String) {
    if let NodeData::Text { contents } = &node.data {
        out.push_str(&contents.borrow());
    }
    for child in node.children.borrow().iter() {
        collect_text(child, out);
    }
}
