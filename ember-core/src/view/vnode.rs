//! Virtual nodes.
//!
//! A view is described as a tree of [`VNode`]s. There is no identity beyond
//! structure, except the optional key on an [`Element`] that lets the
//! reconciler move an existing live node instead of recreating it.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::dom::Event;

/// A node in a virtual tree.
#[derive(Debug, Clone, PartialEq)]
pub enum VNode {
    /// Text content. Numbers convert into this variant.
    Text(String),
    /// A sequence of nodes without a wrapper element.
    Fragment(Vec<VNode>),
    /// A structured element.
    Element(Element),
}

impl VNode {
    pub fn text(content: impl Into<String>) -> Self {
        VNode::Text(content.into())
    }

    pub fn fragment<I>(children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<VNode>,
    {
        VNode::Fragment(children.into_iter().map(Into::into).collect())
    }

    /// Number of nodes this expands to once fragments are flattened.
    pub fn flat_len(&self) -> usize {
        match self {
            VNode::Fragment(children) => children.iter().map(VNode::flat_len).sum(),
            _ => 1,
        }
    }
}

/// Start building an element.
pub fn el(tag: &str) -> Element {
    Element::new(tag)
}

/// A structured virtual node: tag, attributes, children and optional key.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    tag: String,
    key: Option<String>,
    attrs: IndexMap<String, AttrValue>,
    children: Vec<VNode>,
}

/// Attribute values, one variant per reconciliation rule.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// Plain string attribute. `class` and `value` live here too.
    Text(String),
    /// Boolean DOM property such as `checked` or `disabled`.
    Bool(bool),
    /// Inline style declarations.
    Style(IndexMap<String, String>),
    /// Delegated event handler, stored under `on{event}`.
    Handler(EventHandler),
}

/// A shareable event callback. Two handlers are equal when they are the
/// same allocation.
#[derive(Clone)]
pub struct EventHandler(Rc<dyn Fn(&mut Event)>);

impl EventHandler {
    pub fn new(f: impl Fn(&mut Event) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, event: &mut Event) {
        (self.0)(event)
    }
}

impl PartialEq for EventHandler {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventHandler(..)")
    }
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            key: None,
            attrs: IndexMap::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attrs
            .insert(name.to_ascii_lowercase(), AttrValue::Text(value.into()));
        self
    }

    pub fn class(self, value: impl Into<String>) -> Self {
        self.attr("class", value)
    }

    /// Add one inline style declaration.
    pub fn style(mut self, property: &str, value: impl Into<String>) -> Self {
        let entry = self
            .attrs
            .entry("style".to_string())
            .or_insert_with(|| AttrValue::Style(IndexMap::new()));
        match entry {
            AttrValue::Style(map) => {
                map.insert(property.to_string(), value.into());
            }
            other => {
                let mut map = IndexMap::new();
                map.insert(property.to_string(), value.into());
                *other = AttrValue::Style(map);
            }
        }
        self
    }

    /// Set a boolean DOM property.
    pub fn prop(mut self, name: &str, on: bool) -> Self {
        self.attrs
            .insert(name.to_ascii_lowercase(), AttrValue::Bool(on));
        self
    }

    /// Set the form `value` property.
    pub fn value(self, value: impl Into<String>) -> Self {
        self.attr("value", value)
    }

    /// Attach a delegated handler for events of type `event`.
    pub fn on(mut self, event: &str, handler: impl Fn(&mut Event) + 'static) -> Self {
        self.attrs.insert(
            format!("on{}", event.to_ascii_lowercase()),
            AttrValue::Handler(EventHandler::new(handler)),
        );
        self
    }

    pub fn key(mut self, key: impl ToString) -> Self {
        self.key = Some(key.to_string());
        self
    }

    pub fn child(mut self, child: impl Into<VNode>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<VNode>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn key_ref(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn attrs(&self) -> &IndexMap<String, AttrValue> {
        &self.attrs
    }

    pub fn child_nodes(&self) -> &[VNode] {
        &self.children
    }

    /// Handlers declared on this element, keyed by event type.
    pub fn handlers(&self) -> impl Iterator<Item = (&str, &EventHandler)> {
        self.attrs.iter().filter_map(|(name, value)| match value {
            AttrValue::Handler(handler) => name.strip_prefix("on").map(|kind| (kind, handler)),
            _ => None,
        })
    }
}

impl From<Element> for VNode {
    fn from(element: Element) -> Self {
        VNode::Element(element)
    }
}

impl From<&str> for VNode {
    fn from(text: &str) -> Self {
        VNode::Text(text.to_string())
    }
}

impl From<String> for VNode {
    fn from(text: String) -> Self {
        VNode::Text(text)
    }
}

impl From<&String> for VNode {
    fn from(text: &String) -> Self {
        VNode::Text(text.clone())
    }
}

impl From<Vec<VNode>> for VNode {
    fn from(children: Vec<VNode>) -> Self {
        VNode::Fragment(children)
    }
}

macro_rules! vnode_from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for VNode {
                fn from(n: $ty) -> Self {
                    VNode::Text(n.to_string())
                }
            }
        )*
    };
}

vnode_from_integer!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl From<f64> for VNode {
    fn from(n: f64) -> Self {
        VNode::Text(format_number(n))
    }
}

impl From<f32> for VNode {
    fn from(n: f32) -> Self {
        VNode::Text(format_number(f64::from(n)))
    }
}

/// Format a float the way a browser prints a number into text.
fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let sign = if n > 0.0 { "" } else { "-" };
        format!("{sign}Infinity")
    } else if n == 0.0 {
        "0".to_string()
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_collects_attribute_kinds() {
        let node = el("INPUT")
            .class("field")
            .style("color", "red")
            .style("margin", "0")
            .prop("checked", true)
            .value("x")
            .on("Click", |_: &mut Event| {})
            .key(3);

        assert_eq!(node.tag(), "input");
        assert_eq!(node.key_ref(), Some("3"));
        assert_eq!(
            node.attrs().keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["class", "style", "checked", "value", "onclick"]
        );
        match node.attrs().get("style") {
            Some(AttrValue::Style(map)) => assert_eq!(map.len(), 2),
            other => panic!("unexpected style value {other:?}"),
        }
        assert_eq!(node.handlers().map(|(k, _)| k).collect::<Vec<_>>(), vec!["click"]);
    }

    #[test]
    fn test_number_conversions() {
        assert_eq!(VNode::from(3), VNode::Text("3".into()));
        assert_eq!(VNode::from(2.5), VNode::Text("2.5".into()));
        assert_eq!(VNode::from(4.0), VNode::Text("4".into()));
        assert_eq!(VNode::from(-0.0), VNode::Text("0".into()));
        assert_eq!(VNode::from(f64::INFINITY), VNode::Text("Infinity".into()));
    }

    #[test]
    fn test_handler_equality_is_identity() {
        let a = EventHandler::new(|_| {});
        let b = EventHandler::new(|_| {});
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_flat_len_counts_through_fragments() {
        let tree = VNode::fragment(vec![
            VNode::text("a"),
            VNode::fragment(vec![VNode::text("b"), VNode::text("c")]),
            VNode::Fragment(Vec::new()),
        ]);
        assert_eq!(tree.flat_len(), 3);
    }
}
