//! Arena-backed document tree.
//!
//! Nodes are never freed: removing a node only detaches it, so a `NodeId`
//! handed out by a document stays valid for that document's lifetime. This
//! mirrors how a browser keeps detached nodes alive while script holds them.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;
use tracing::debug;

use super::event::{Event, Listener};
use crate::view::render::{escape_attr, escape_text, is_void_element};

/// DOM properties whose state is a flag rather than a string.
pub const BOOLEAN_PROPERTIES: &[&str] = &[
    "checked",
    "disabled",
    "selected",
    "hidden",
    "readonly",
    "required",
    "multiple",
    "autofocus",
    "open",
];

/// Handle to a node inside one [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

enum NodeData {
    Element(ElementData),
    Text(String),
}

#[derive(Default)]
struct ElementData {
    tag: String,
    attributes: IndexMap<String, String>,
    properties: IndexSet<String>,
    value: Option<String>,
    key: Option<String>,
    listeners: SmallVec<[(String, Listener); 2]>,
}

struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

struct Arena {
    nodes: Vec<Node>,
}

impl Arena {
    fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.get(id)?.data {
            NodeData::Element(element) => Some(element),
            NodeData::Text(_) => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.get_mut(id)?.data {
            NodeData::Element(element) => Some(element),
            NodeData::Text(_) => None,
        }
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            data,
        });
        id
    }

    fn detach(&mut self, child: NodeId) {
        let Some(parent) = self.get_mut(child).and_then(|node| node.parent.take()) else {
            return;
        };
        if let Some(parent) = self.get_mut(parent) {
            parent.children.retain(|&c| c != child);
        }
    }

    fn is_ancestor(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.get(node).and_then(|n| n.parent) {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }
}

/// A mutable node tree standing in for the browser document.
///
/// Cloning yields another handle to the same tree.
#[derive(Clone)]
pub struct Document {
    inner: Rc<RefCell<Arena>>,
}

/// Non-owning handle, used by listeners stored inside the tree itself.
#[derive(Clone)]
pub struct WeakDocument {
    inner: Weak<RefCell<Arena>>,
}

impl WeakDocument {
    pub fn upgrade(&self) -> Option<Document> {
        self.inner.upgrade().map(|inner| Document { inner })
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.inner.borrow().nodes.len())
            .finish()
    }
}

impl Document {
    /// Create a document holding only its root element.
    pub fn new() -> Self {
        let mut arena = Arena { nodes: Vec::new() };
        arena.push(NodeData::Element(ElementData {
            tag: "#document".to_string(),
            ..ElementData::default()
        }));
        Self {
            inner: Rc::new(RefCell::new(arena)),
        }
    }

    pub fn downgrade(&self) -> WeakDocument {
        WeakDocument {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn ptr_eq(&self, other: &Document) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn create_element(&self, tag: &str) -> NodeId {
        self.inner.borrow_mut().push(NodeData::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            ..ElementData::default()
        }))
    }

    pub fn create_text(&self, text: &str) -> NodeId {
        self.inner.borrow_mut().push(NodeData::Text(text.to_string()))
    }

    /// Whether `node` belongs to this document.
    pub fn contains(&self, node: NodeId) -> bool {
        self.inner.borrow().get(node).is_some()
    }

    /// Whether `node` is reachable from the root.
    pub fn is_connected(&self, node: NodeId) -> bool {
        let arena = self.inner.borrow();
        arena.get(node).is_some() && arena.is_ancestor(NodeId(0), node)
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        self.inner.borrow().element(node).is_some()
    }

    pub fn is_text(&self, node: NodeId) -> bool {
        matches!(
            self.inner.borrow().get(node).map(|n| &n.data),
            Some(NodeData::Text(_))
        )
    }

    // ---------------------------------------------------------------------
    // Tree structure
    // ---------------------------------------------------------------------

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.inner.borrow().get(node)?.parent
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.inner
            .borrow()
            .get(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// All nodes below `node`, in document order.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let arena = self.inner.borrow();
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = match arena.get(node) {
            Some(n) => n.children.iter().rev().copied().collect(),
            None => return out,
        };
        while let Some(next) = stack.pop() {
            out.push(next);
            if let Some(n) = arena.get(next) {
                stack.extend(n.children.iter().rev().copied());
            }
        }
        out
    }

    /// Append `child` to `parent`, moving it if it is already attached.
    pub fn append_child(&self, parent: NodeId, child: NodeId) {
        self.insert_before(parent, child, None);
    }

    /// Insert `child` into `parent` before `reference`, or at the end when
    /// `reference` is `None` or not a child of `parent`.
    pub fn insert_before(&self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        let mut arena = self.inner.borrow_mut();
        if arena.element(parent).is_none() || arena.get(child).is_none() {
            debug!(%parent, %child, "insert_before on unknown node ignored");
            return;
        }
        if arena.is_ancestor(child, parent) {
            debug!(%parent, %child, "insert_before would create a cycle");
            return;
        }
        arena.detach(child);
        if let Some(node) = arena.get_mut(child) {
            node.parent = Some(parent);
        }
        let Some(parent_node) = arena.get_mut(parent) else {
            return;
        };
        let position = reference
            .and_then(|r| parent_node.children.iter().position(|&c| c == r))
            .unwrap_or(parent_node.children.len());
        parent_node.children.insert(position, child);
    }

    /// Detach `child` from `parent`. Does nothing if `child` is elsewhere.
    pub fn remove_child(&self, parent: NodeId, child: NodeId) {
        let mut arena = self.inner.borrow_mut();
        if arena.get(child).and_then(|n| n.parent) == Some(parent) {
            arena.detach(child);
        }
    }

    /// Put `new` where `old` is and detach `old`.
    pub fn replace_child(&self, parent: NodeId, new: NodeId, old: NodeId) {
        self.insert_before(parent, new, Some(old));
        self.remove_child(parent, old);
    }

    // ---------------------------------------------------------------------
    // Node content
    // ---------------------------------------------------------------------

    pub fn tag(&self, node: NodeId) -> Option<String> {
        self.inner.borrow().element(node).map(|e| e.tag.clone())
    }

    pub fn text(&self, node: NodeId) -> Option<String> {
        match &self.inner.borrow().get(node)?.data {
            NodeData::Text(text) => Some(text.clone()),
            NodeData::Element(_) => None,
        }
    }

    pub fn set_text(&self, node: NodeId, text: &str) {
        if let Some(Node {
            data: NodeData::Text(current),
            ..
        }) = self.inner.borrow_mut().get_mut(node)
        {
            current.clear();
            current.push_str(text);
        }
    }

    /// Concatenated text of every text node under `node`.
    pub fn text_content(&self, node: NodeId) -> String {
        if let Some(text) = self.text(node) {
            return text;
        }
        self.descendants(node)
            .into_iter()
            .filter_map(|n| self.text(n))
            .collect()
    }

    // ---------------------------------------------------------------------
    // Attributes and properties
    // ---------------------------------------------------------------------

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.inner.borrow().element(node)?.attributes.get(name).cloned()
    }

    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.inner
            .borrow()
            .element(node)
            .is_some_and(|e| e.attributes.contains_key(name))
    }

    pub fn attribute_names(&self, node: NodeId) -> Vec<String> {
        self.inner
            .borrow()
            .element(node)
            .map(|e| e.attributes.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        if let Some(element) = self.inner.borrow_mut().element_mut(node) {
            element
                .attributes
                .insert(name.to_ascii_lowercase(), value.to_string());
        }
    }

    pub fn remove_attribute(&self, node: NodeId, name: &str) {
        if let Some(element) = self.inner.borrow_mut().element_mut(node) {
            element.attributes.shift_remove(name);
        }
    }

    /// Inline style declarations parsed from the `style` attribute.
    pub fn style(&self, node: NodeId) -> IndexMap<String, String> {
        self.attribute(node, "style")
            .map(|s| parse_style(&s))
            .unwrap_or_default()
    }

    pub fn set_style_property(&self, node: NodeId, property: &str, value: &str) {
        let mut style = self.style(node);
        style.insert(property.to_string(), value.to_string());
        self.write_style(node, &style);
    }

    pub fn remove_style_property(&self, node: NodeId, property: &str) {
        let mut style = self.style(node);
        if style.shift_remove(property).is_some() {
            self.write_style(node, &style);
        }
    }

    fn write_style(&self, node: NodeId, style: &IndexMap<String, String>) {
        if style.is_empty() {
            self.remove_attribute(node, "style");
        } else {
            self.set_attribute(node, "style", &serialize_style(style));
        }
    }

    /// Current state of a boolean DOM property such as `checked`.
    pub fn property(&self, node: NodeId, name: &str) -> bool {
        self.inner
            .borrow()
            .element(node)
            .is_some_and(|e| e.properties.contains(name))
    }

    pub fn set_property(&self, node: NodeId, name: &str, on: bool) {
        if let Some(element) = self.inner.borrow_mut().element_mut(node) {
            if on {
                element.properties.insert(name.to_string());
            } else {
                element.properties.shift_remove(name);
            }
        }
    }

    /// The form `value` property. Falls back to the `value` attribute until
    /// the property is written.
    pub fn value(&self, node: NodeId) -> Option<String> {
        let arena = self.inner.borrow();
        let element = arena.element(node)?;
        element
            .value
            .clone()
            .or_else(|| element.attributes.get("value").cloned())
    }

    pub fn set_value(&self, node: NodeId, value: &str) {
        if let Some(element) = self.inner.borrow_mut().element_mut(node) {
            element.value = Some(value.to_string());
        }
    }

    /// Key recorded for keyed reconciliation, falling back to the
    /// server-rendered `data-key` attribute.
    pub fn recorded_key(&self, node: NodeId) -> Option<String> {
        let arena = self.inner.borrow();
        let element = arena.element(node)?;
        element
            .key
            .clone()
            .or_else(|| element.attributes.get("data-key").cloned())
    }

    pub fn record_key(&self, node: NodeId, key: Option<&str>) {
        if let Some(element) = self.inner.borrow_mut().element_mut(node) {
            element.key = key.map(str::to_string);
        }
    }

    // ---------------------------------------------------------------------
    // Events
    // ---------------------------------------------------------------------

    pub fn add_event_listener(&self, node: NodeId, kind: &str, listener: Listener) {
        if let Some(element) = self.inner.borrow_mut().element_mut(node) {
            element.listeners.push((kind.to_string(), listener));
        }
    }

    pub fn listener_count(&self, node: NodeId, kind: &str) -> usize {
        self.inner
            .borrow()
            .element(node)
            .map_or(0, |e| e.listeners.iter().filter(|(k, _)| k == kind).count())
    }

    /// Dispatch an event at `target` and bubble it to the root.
    ///
    /// Listeners may mutate the document; each node's listener list is
    /// snapshotted before any of them runs.
    pub fn dispatch_event(&self, target: NodeId, kind: &str) -> Event {
        let mut event = Event::new(kind, target);
        let mut current = Some(target);
        while let Some(node) = current {
            let listeners: SmallVec<[Listener; 2]> = self
                .inner
                .borrow()
                .element(node)
                .map(|e| {
                    e.listeners
                        .iter()
                        .filter(|(k, _)| k == kind)
                        .map(|(_, l)| Rc::clone(l))
                        .collect()
                })
                .unwrap_or_default();
            event.set_current_target(node);
            for listener in listeners {
                listener(&mut event);
            }
            if event.propagation_stopped() {
                break;
            }
            current = self.parent(node);
        }
        event
    }

    // ---------------------------------------------------------------------
    // Serialization
    // ---------------------------------------------------------------------

    /// Markup of the children of `node`.
    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            self.write_html(child, &mut out);
        }
        out
    }

    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        let (tag, attributes) = {
            let arena = self.inner.borrow();
            match arena.get(node).map(|n| &n.data) {
                Some(NodeData::Text(text)) => {
                    out.push_str(&escape_text(text));
                    return;
                }
                Some(NodeData::Element(e)) => (e.tag.clone(), e.attributes.clone()),
                None => return,
            }
        };
        out.push('<');
        out.push_str(&tag);
        for (name, value) in &attributes {
            out.push(' ');
            out.push_str(name);
            if !value.is_empty() {
                out.push_str("=\"");
                out.push_str(&escape_attr(value));
                out.push('"');
            }
        }
        out.push('>');
        if is_void_element(&tag) {
            return;
        }
        for child in self.children(node) {
            self.write_html(child, out);
        }
        out.push_str("</");
        out.push_str(&tag);
        out.push('>');
    }
}

pub(crate) fn parse_style(style: &str) -> IndexMap<String, String> {
    style
        .split(';')
        .filter_map(|decl| {
            let (name, value) = decl.split_once(':')?;
            let name = name.trim();
            (!name.is_empty()).then(|| (name.to_string(), value.trim().to_string()))
        })
        .collect()
}

pub(crate) fn serialize_style(style: &IndexMap<String, String>) -> String {
    style
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_child_list_operations() {
        let doc = Document::new();
        let root = doc.root();
        let a = doc.create_element("a");
        let b = doc.create_element("b");
        let c = doc.create_element("c");

        doc.append_child(root, a);
        doc.append_child(root, c);
        doc.insert_before(root, b, Some(c));
        assert_eq!(doc.children(root), vec![a, b, c]);

        // Moving an attached node keeps it attached exactly once.
        doc.insert_before(root, c, Some(a));
        assert_eq!(doc.children(root), vec![c, a, b]);

        let d = doc.create_text("d");
        doc.replace_child(root, d, a);
        assert_eq!(doc.children(root), vec![c, d, b]);
        assert_eq!(doc.parent(a), None);
        assert!(!doc.is_connected(a));
        assert!(doc.is_connected(d));

        doc.remove_child(root, b);
        assert_eq!(doc.children(root), vec![c, d]);
    }

    #[test]
    fn test_cycle_rejected() {
        let doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("div");
        doc.append_child(outer, inner);
        doc.append_child(inner, outer);
        assert_eq!(doc.parent(outer), None);
    }

    #[test]
    fn test_style_roundtrip_through_attribute() {
        let doc = Document::new();
        let el = doc.create_element("p");
        doc.set_attribute(el, "style", "color: red;margin:0");
        assert_eq!(doc.style(el).get("margin").map(String::as_str), Some("0"));

        doc.set_style_property(el, "color", "blue");
        assert_eq!(doc.attribute(el, "style").as_deref(), Some("color: blue; margin: 0"));

        doc.remove_style_property(el, "color");
        doc.remove_style_property(el, "margin");
        assert!(!doc.has_attribute(el, "style"));
    }

    #[test]
    fn test_value_falls_back_to_attribute() {
        let doc = Document::new();
        let input = doc.create_element("input");
        doc.set_attribute(input, "value", "initial");
        assert_eq!(doc.value(input).as_deref(), Some("initial"));
        doc.set_value(input, "typed");
        assert_eq!(doc.value(input).as_deref(), Some("typed"));
        assert_eq!(doc.attribute(input, "value").as_deref(), Some("initial"));
    }

    #[test]
    fn test_recorded_key_prefers_explicit_key() {
        let doc = Document::new();
        let li = doc.create_element("li");
        doc.set_attribute(li, "data-key", "server");
        assert_eq!(doc.recorded_key(li).as_deref(), Some("server"));
        doc.record_key(li, Some("client"));
        assert_eq!(doc.recorded_key(li).as_deref(), Some("client"));
    }

    #[test]
    fn test_dispatch_bubbles_until_stopped() {
        let doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("button");
        doc.append_child(doc.root(), outer);
        doc.append_child(outer, inner);

        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        doc.add_event_listener(outer, "click", Rc::new(move |_: &mut Event| h.set(h.get() + 1)));
        let h = hits.clone();
        doc.add_event_listener(doc.root(), "click", Rc::new(move |_: &mut Event| h.set(h.get() + 10)));

        doc.dispatch_event(inner, "click");
        assert_eq!(hits.get(), 11);

        doc.add_event_listener(inner, "click", Rc::new(|e: &mut Event| e.stop_propagation()));
        let event = doc.dispatch_event(inner, "click");
        assert!(event.propagation_stopped());
        assert_eq!(hits.get(), 11);
    }

    #[test]
    fn test_inner_html_serialization() {
        let doc = Document::new();
        let ul = doc.create_element("ul");
        let li = doc.create_element("li");
        let br = doc.create_element("br");
        let text = doc.create_text("a < b");
        doc.set_attribute(li, "class", "item");
        doc.set_attribute(li, "hidden", "");
        doc.append_child(ul, li);
        doc.append_child(li, text);
        doc.append_child(ul, br);
        assert_eq!(
            doc.outer_html(ul),
            "<ul><li class=\"item\" hidden>a &lt; b</li><br></ul>"
        );
        assert_eq!(doc.text_content(ul), "a < b");
    }
}
