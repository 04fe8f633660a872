//! Property tests for reconciliation.
//!
//! Trees are generated with mixed keyed and unkeyed elements, nested
//! fragments and runs of adjacent text, then checked for:
//!
//! 1. Convergence: one pass over any server-rendered tree yields the target
//!    tree.
//! 2. Clean hydration: markup rendered from a view hydrates against that
//!    same view with no mismatches and no new nodes.

use ember_core::config::Config;
use ember_core::dom::{Document, NodeId};
use ember_core::hydrate::hydrate;
use ember_core::view::{el, render_to_string, VNode};
use proptest::prelude::*;

const TAGS: &[&str] = &["div", "span", "p", "li"];
const CLASSES: &[&str] = &["on", "off"];

/// A generated view, kept separate from `VNode` so failures print readably.
#[derive(Debug, Clone)]
enum Tree {
    Text(String),
    Fragment(Vec<Tree>),
    Element {
        tag: &'static str,
        key: Option<u8>,
        class: Option<&'static str>,
        children: Vec<Tree>,
    },
}

impl Tree {
    fn to_vnode(&self) -> VNode {
        match self {
            Tree::Text(text) => VNode::text(text.clone()),
            Tree::Fragment(children) => VNode::fragment(children.iter().map(Tree::to_vnode)),
            Tree::Element {
                tag,
                key,
                class,
                children,
            } => {
                let mut element = el(tag);
                if let Some(key) = key {
                    element = element.key(key);
                }
                if let Some(class) = class {
                    element = element.class(*class);
                }
                element.children(children.iter().map(Tree::to_vnode)).into()
            }
        }
    }
}

fn element_head() -> impl Strategy<Value = (&'static str, Option<u8>, Option<&'static str>)> {
    (
        prop::sample::select(TAGS),
        prop::option::of(0u8..4),
        prop::option::of(prop::sample::select(CLASSES)),
    )
}

fn tree() -> impl Strategy<Value = Tree> {
    let leaf = prop_oneof![
        "[a-z]{1,3}".prop_map(Tree::Text),
        element_head().prop_map(|(tag, key, class)| Tree::Element {
            tag,
            key,
            class,
            children: Vec::new(),
        }),
    ];
    leaf.prop_recursive(4, 48, 5, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..5).prop_map(Tree::Fragment),
            (element_head(), prop::collection::vec(inner, 0..5)).prop_map(
                |((tag, key, class), children)| Tree::Element {
                    tag,
                    key,
                    class,
                    children,
                }
            ),
        ]
    })
}

fn container(markup: &str) -> (Document, NodeId) {
    let doc = Document::new();
    let app = doc.create_element("div");
    doc.append_child(doc.root(), app);
    doc.parse_into(app, markup).unwrap();
    (doc, app)
}

/// Order-insensitive description of the children of `node`, skipping
/// whitespace-only text.
fn shape(doc: &Document, node: NodeId) -> Vec<String> {
    doc.children(node)
        .into_iter()
        .filter_map(|child| match doc.text(child) {
            Some(text) if text.trim().is_empty() => None,
            Some(text) => Some(format!("#text({text})")),
            None => {
                let mut attrs: Vec<String> = doc
                    .attribute_names(child)
                    .into_iter()
                    .map(|name| {
                        let value = doc.attribute(child, &name).unwrap_or_default();
                        format!("{name}={value}")
                    })
                    .collect();
                attrs.sort();
                Some(format!(
                    "<{} {}>[{}]",
                    doc.tag(child).unwrap_or_default(),
                    attrs.join(" "),
                    shape(doc, child).join(", ")
                ))
            }
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn one_pass_converges_for_any_pair(live in tree(), target in tree()) {
        let (doc, app) = container(&render_to_string(&live.to_vnode()));
        let view = target.to_vnode();
        hydrate(&doc, app, &view, &Config::production());

        let (expected_doc, expected_app) = container(&render_to_string(&view));
        prop_assert_eq!(shape(&doc, app), shape(&expected_doc, expected_app));
    }

    #[test]
    fn rendered_markup_hydrates_without_repairs(view in tree()) {
        let view = view.to_vnode();
        let (doc, app) = container(&render_to_string(&view));
        let before = shape(&doc, app);

        let stats = hydrate(&doc, app, &view, &Config::production()).stats();
        prop_assert_eq!(stats.mismatches, 0);
        prop_assert_eq!(stats.created, 0);
        prop_assert_eq!(stats.replaced + stats.removed + stats.moved, 0);
        prop_assert_eq!(stats.text_patches + stats.attr_writes, 0);
        prop_assert_eq!(shape(&doc, app), before);
    }
}
