//! Attribute reconciliation rules.
//!
//! Each [`AttrValue`] kind has its own rule:
//!
//! - `class` compares token lists, so whitespace differences are not writes.
//! - `value` drives the form property, and mirrors the attribute.
//! - `Style` maps are applied declaration by declaration.
//! - `Bool` sets the DOM property and mirrors presence of the attribute.
//! - Handlers are left to the [`Delegator`](super::Delegator).
//! - Everything else is string-compared before writing.
//!
//! Live attributes the element no longer declares are removed.

use smallvec::SmallVec;

use super::reconcile::PatchStats;
use crate::dom::{Document, NodeId, BOOLEAN_PROPERTIES};
use crate::view::{AttrValue, Element};

/// Attributes that needed a write, for mismatch reporting.
pub(crate) type Changed = SmallVec<[String; 4]>;

/// Bring the attributes of `node` in line with `element`.
pub(crate) fn apply(doc: &Document, node: NodeId, element: &Element, stats: &mut PatchStats) -> Changed {
    let mut changed = Changed::new();

    match element.key_ref() {
        Some(key) => {
            if doc.attribute(node, "data-key").as_deref() != Some(key) {
                doc.set_attribute(node, "data-key", key);
                note(&mut changed, stats, "data-key");
            }
        }
        None if !element.attrs().contains_key("data-key") => {
            if doc.has_attribute(node, "data-key") {
                doc.remove_attribute(node, "data-key");
                note(&mut changed, stats, "data-key");
            }
        }
        // Declared as a plain attribute below.
        None => {}
    }
    doc.record_key(node, element.key_ref());

    for (name, value) in element.attrs() {
        match value {
            AttrValue::Text(text) if name == "class" => {
                let live = doc.attribute(node, "class");
                let same = live.as_deref().is_some_and(|live| {
                    live.split_whitespace().eq(text.split_whitespace())
                });
                if !same {
                    doc.set_attribute(node, "class", text);
                    note(&mut changed, stats, name);
                }
            }
            AttrValue::Text(text) if name == "value" => {
                if doc.value(node).as_deref() != Some(text.as_str()) {
                    doc.set_value(node, text);
                    note(&mut changed, stats, name);
                }
                if doc.attribute(node, "value").as_deref() != Some(text.as_str()) {
                    doc.set_attribute(node, "value", text);
                }
            }
            AttrValue::Text(text) => {
                if doc.attribute(node, name).as_deref() != Some(text.as_str()) {
                    doc.set_attribute(node, name, text);
                    note(&mut changed, stats, name);
                }
            }
            AttrValue::Bool(on) => {
                if doc.property(node, name) != *on {
                    doc.set_property(node, name, *on);
                    note(&mut changed, stats, name);
                }
                match (*on, doc.has_attribute(node, name)) {
                    (true, false) => doc.set_attribute(node, name, ""),
                    (false, true) => doc.remove_attribute(node, name),
                    _ => {}
                }
            }
            AttrValue::Style(style) => {
                let live = doc.style(node);
                let mut dirty = false;
                for (property, value) in style {
                    if live.get(property) != Some(value) {
                        doc.set_style_property(node, property, value);
                        dirty = true;
                    }
                }
                for property in live.keys().filter(|p| !style.contains_key(*p)) {
                    doc.remove_style_property(node, property);
                    dirty = true;
                }
                if dirty {
                    note(&mut changed, stats, name);
                }
            }
            AttrValue::Handler(_) => {}
        }
    }

    for name in doc.attribute_names(node) {
        if name == "data-key" || element.attrs().contains_key(&name) {
            continue;
        }
        doc.remove_attribute(node, &name);
        if BOOLEAN_PROPERTIES.contains(&name.as_str()) {
            doc.set_property(node, &name, false);
        }
        note(&mut changed, stats, &name);
    }

    changed
}

fn note(changed: &mut Changed, stats: &mut PatchStats, name: &str) {
    stats.attr_writes += 1;
    changed.push(name.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::el;

    fn element_with(markup: &str) -> (Document, NodeId) {
        let doc = Document::new();
        let root = doc.root();
        let nodes = doc.parse_into(root, markup).unwrap();
        (doc, nodes[0])
    }

    #[test]
    fn test_matching_attributes_write_nothing() {
        let (doc, node) = element_with(
            "<input class=\"a  b\" data-key=\"k\" style=\"color: red\" checked value=\"v\">",
        );
        let view = el("input")
            .key("k")
            .class("a b")
            .style("color", "red")
            .prop("checked", true)
            .value("v")
            .on("input", |_| {});
        let mut stats = PatchStats::default();
        let changed = apply(&doc, node, &view, &mut stats);
        assert!(changed.is_empty(), "unexpected writes: {changed:?}");
        assert_eq!(stats.attr_writes, 0);
        assert_eq!(doc.recorded_key(node).as_deref(), Some("k"));
    }

    #[test]
    fn test_each_kind_is_repaired() {
        let (doc, node) = element_with("<input class=\"old\" title=\"x\" style=\"margin: 0\" disabled>");
        let view = el("input")
            .class("new")
            .style("color", "blue")
            .prop("checked", true)
            .value("typed");
        let mut stats = PatchStats::default();
        let changed = apply(&doc, node, &view, &mut stats);

        assert_eq!(doc.attribute(node, "class").as_deref(), Some("new"));
        assert_eq!(doc.attribute(node, "style").as_deref(), Some("color: blue"));
        assert!(doc.property(node, "checked"));
        assert!(doc.has_attribute(node, "checked"));
        assert_eq!(doc.value(node).as_deref(), Some("typed"));
        assert!(!doc.has_attribute(node, "title"));
        assert!(!doc.has_attribute(node, "disabled"));
        assert!(!doc.property(node, "disabled"));
        assert_eq!(
            changed.as_slice(),
            ["class", "style", "checked", "value", "title", "disabled"]
        );
    }

    #[test]
    fn test_false_property_clears_attribute() {
        let (doc, node) = element_with("<button disabled></button>");
        let view = el("button").prop("disabled", false);
        let mut stats = PatchStats::default();
        apply(&doc, node, &view, &mut stats);
        assert!(!doc.property(node, "disabled"));
        assert!(!doc.has_attribute(node, "disabled"));
    }

    #[test]
    fn test_explicit_data_key_attribute_is_left_alone() {
        let (doc, node) = element_with("<li data-key=\"row-1\">a</li>");
        let view = el("li").attr("data-key", "row-1");
        let mut stats = PatchStats::default();
        for _ in 0..2 {
            let changed = apply(&doc, node, &view, &mut stats);
            assert!(changed.is_empty(), "unexpected writes: {changed:?}");
        }
        assert_eq!(stats.attr_writes, 0);
        assert_eq!(doc.recorded_key(node).as_deref(), Some("row-1"));
    }
}
