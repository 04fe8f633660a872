//! Server-side string rendering.

use std::borrow::Cow;

use super::vnode::{AttrValue, Element, VNode};
use crate::dom::document::serialize_style;

/// Elements that never have children or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

pub(crate) fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

/// Escape text content.
pub(crate) fn escape_text(s: &str) -> Cow<'_, str> {
    if !s.contains(['&', '<', '>']) {
        return Cow::Borrowed(s);
    }
    let mut escaped = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

/// Escape a double-quoted attribute value.
pub(crate) fn escape_attr(s: &str) -> Cow<'_, str> {
    if !s.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(s);
    }
    let mut escaped = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

/// Written between adjacent text siblings so the parsed markup keeps one
/// text node per virtual text node.
pub(crate) const TEXT_SEPARATOR: &str = "<!---->";

/// Render a virtual tree to HTML.
///
/// Keys are emitted as `data-key` so that hydration can match keyed
/// children. Event handlers have no markup form and are skipped; `false`
/// boolean properties and empty style maps are omitted.
pub fn render_to_string(node: &VNode) -> String {
    let mut out = String::new();
    write_node(node, &mut out, &mut false);
    out
}

impl VNode {
    pub fn render_to_string(&self) -> String {
        render_to_string(self)
    }
}

/// `after_text` tracks whether the previous sibling in the flattened child
/// list was text; fragments share it with their parent.
fn write_node(node: &VNode, out: &mut String, after_text: &mut bool) {
    match node {
        VNode::Text(text) => {
            if *after_text {
                out.push_str(TEXT_SEPARATOR);
            }
            out.push_str(&escape_text(text));
            *after_text = true;
        }
        VNode::Fragment(children) => {
            for child in children {
                write_node(child, out, after_text);
            }
        }
        VNode::Element(element) => {
            write_element(element, out);
            *after_text = false;
        }
    }
}

fn write_attr(name: &str, value: &str, out: &mut String) {
    out.push(' ');
    out.push_str(name);
    if !value.is_empty() {
        out.push_str("=\"");
        out.push_str(&escape_attr(value));
        out.push('"');
    }
}

fn write_element(element: &Element, out: &mut String) {
    let tag = element.tag();
    out.push('<');
    out.push_str(tag);

    if let Some(key) = element.key_ref() {
        write_attr("data-key", key, out);
    }
    for (name, value) in element.attrs() {
        match value {
            AttrValue::Text(text) => write_attr(name, text, out),
            AttrValue::Bool(true) => write_attr(name, "", out),
            AttrValue::Style(style) if !style.is_empty() => {
                write_attr(name, &serialize_style(style), out)
            }
            AttrValue::Bool(false) | AttrValue::Style(_) | AttrValue::Handler(_) => {}
        }
    }
    out.push('>');

    if is_void_element(tag) {
        return;
    }
    let mut after_text = false;
    for child in element.child_nodes() {
        write_node(child, out, &mut after_text);
    }
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}
