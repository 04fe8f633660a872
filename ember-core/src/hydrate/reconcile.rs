//! Reconciliation
//!
//! Walks a live subtree and a virtual tree in lockstep and mutates the live
//! side until it matches. The first pass over server-rendered markup is
//! hydration; every later pass is an ordinary update. Both use the same
//! rules:
//!
//! - Text against a text node patches content only when it differs.
//! - An element against an element of the same tag is patched in place.
//! - Anything else is replaced.
//! - Keyed elements that are not at the cursor are searched for among the
//!   remaining live siblings and moved into position.
//! - Surplus live children are removed, except whitespace-only text.
//!
//! No repair is fatal. Mismatches found while hydrating are counted and,
//! unless the config says otherwise, logged as warnings.

use tracing::{trace, warn};

use super::attrs;
use super::delegate::Delegator;
use crate::config::Config;
use crate::dom::{Document, NodeId};
use crate::view::{Element, VNode};

/// Counters for the work done by a [`Reconciler`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchStats {
    /// Completed passes.
    pub passes: usize,
    /// Live nodes created, including nodes inside created subtrees.
    pub created: usize,
    /// Surplus live nodes removed.
    pub removed: usize,
    /// Keyed nodes moved into position.
    pub moved: usize,
    /// Live nodes replaced because they could not be patched.
    pub replaced: usize,
    /// Text nodes whose content was rewritten.
    pub text_patches: usize,
    /// Attribute, property and style writes.
    pub attr_writes: usize,
    /// Mismatches found while hydrating.
    pub mismatches: usize,
}

/// Keeps one live container in sync with successive virtual trees.
pub struct Reconciler {
    document: Document,
    root: NodeId,
    delegator: Delegator,
    config: Config,
    stats: PatchStats,
}

impl Reconciler {
    pub fn new(document: Document, root: NodeId, config: Config) -> Self {
        let delegator = Delegator::new(&document, root);
        for kind in &config.delegated_events {
            delegator.install(kind);
        }
        Self {
            document,
            root,
            delegator,
            config,
            stats: PatchStats::default(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn delegator(&self) -> &Delegator {
        &self.delegator
    }

    pub fn stats(&self) -> PatchStats {
        self.stats
    }

    /// Whether the next pass is the first one.
    pub fn is_hydrating(&self) -> bool {
        self.stats.passes == 0
    }

    /// Run one pass making the children of the root match `view`.
    pub fn hydrate(&mut self, view: &VNode) {
        trace!(root = %self.root, pass = self.stats.passes + 1, "reconcile pass");
        self.reconcile_children(self.root, std::slice::from_ref(view));
        self.stats.passes += 1;
    }

    /// Make the children of `parent` match `vnodes`.
    pub fn reconcile_children(&mut self, parent: NodeId, vnodes: &[VNode]) {
        let mut flat = Vec::with_capacity(vnodes.len());
        flatten(vnodes, &mut flat);

        let mut cursor = 0;
        for vnode in flat {
            let live = self.document.children(parent);
            if !matches!(vnode, VNode::Text(_)) {
                while cursor < live.len() && self.is_insignificant(live[cursor]) {
                    cursor += 1;
                }
            }

            let Some(&current) = live.get(cursor) else {
                self.mismatch(parent, "missing child");
                let node = self.create(vnode);
                self.document.append_child(parent, node);
                cursor += 1;
                continue;
            };

            match vnode {
                VNode::Text(text) => self.patch_text(parent, current, text),
                VNode::Element(element) => {
                    let current = match element.key_ref() {
                        Some(key) if self.document.recorded_key(current).as_deref() != Some(key) => {
                            match self.find_keyed(&live[cursor + 1..], key) {
                                Some(found) => {
                                    self.document.insert_before(parent, found, Some(current));
                                    self.stats.moved += 1;
                                    trace!(%found, key, "moved keyed node");
                                    found
                                }
                                None => {
                                    self.mismatch(current, "keyed node not found ahead");
                                    self.replace(parent, current, vnode);
                                    cursor += 1;
                                    continue;
                                }
                            }
                        }
                        _ => current,
                    };
                    if self.document.tag(current).as_deref() == Some(element.tag()) {
                        self.patch(current, element);
                    } else {
                        self.mismatch(current, "element tag differs");
                        self.replace(parent, current, vnode);
                    }
                }
                VNode::Fragment(_) => {}
            }
            cursor += 1;
        }

        let live = self.document.children(parent);
        for &surplus in live.iter().skip(cursor) {
            if self.is_insignificant(surplus) {
                continue;
            }
            self.mismatch(surplus, "surplus child");
            self.delegator.forget_subtree(&self.document, surplus);
            self.document.remove_child(parent, surplus);
            self.stats.removed += 1;
        }
    }

    fn patch_text(&mut self, parent: NodeId, current: NodeId, text: &str) {
        match self.document.text(current) {
            Some(live) if live == text => {}
            Some(_) => {
                self.mismatch(current, "text content differs");
                self.document.set_text(current, text);
                self.stats.text_patches += 1;
            }
            None => {
                self.mismatch(current, "expected a text node");
                let node = self.document.create_text(text);
                self.stats.created += 1;
                self.swap(parent, current, node);
            }
        }
    }

    /// Patch an element whose tag already matches.
    fn patch(&mut self, node: NodeId, element: &Element) {
        let changed = attrs::apply(&self.document, node, element, &mut self.stats);
        if !changed.is_empty() {
            let names = changed.join(", ");
            self.mismatch(node, &format!("attributes differ: {names}"));
        }
        self.delegator.set_handlers(node, element.handlers());
        self.reconcile_children(node, element.child_nodes());
    }

    /// Build a detached live subtree for `vnode`.
    fn create(&mut self, vnode: &VNode) -> NodeId {
        match vnode {
            VNode::Text(text) => {
                self.stats.created += 1;
                self.document.create_text(text)
            }
            VNode::Element(element) => {
                self.stats.created += 1;
                let node = self.document.create_element(element.tag());
                attrs::apply(&self.document, node, element, &mut self.stats);
                self.delegator.set_handlers(node, element.handlers());
                let mut flat = Vec::new();
                flatten(element.child_nodes(), &mut flat);
                for child in flat {
                    let child = self.create(child);
                    self.document.append_child(node, child);
                }
                node
            }
            // Fragments are flattened before they get here.
            VNode::Fragment(_) => self.document.create_text(""),
        }
    }

    fn replace(&mut self, parent: NodeId, old: NodeId, vnode: &VNode) {
        let node = self.create(vnode);
        self.swap(parent, old, node);
    }

    fn swap(&mut self, parent: NodeId, old: NodeId, new: NodeId) {
        self.delegator.forget_subtree(&self.document, old);
        self.document.replace_child(parent, new, old);
        self.stats.replaced += 1;
    }

    fn find_keyed(&self, candidates: &[NodeId], key: &str) -> Option<NodeId> {
        candidates.iter().copied().find(|&node| {
            self.document.is_element(node) && self.document.recorded_key(node).as_deref() == Some(key)
        })
    }

    fn is_insignificant(&self, node: NodeId) -> bool {
        self.document
            .text(node)
            .is_some_and(|text| text.trim().is_empty())
    }

    fn mismatch(&mut self, node: NodeId, what: &str) {
        if !self.is_hydrating() {
            return;
        }
        self.stats.mismatches += 1;
        if self.config.reports_mismatches() {
            warn!(%node, "hydration mismatch: {what}");
        }
    }
}

/// Collect the non-fragment nodes of `nodes`, in order.
fn flatten<'v>(nodes: &'v [VNode], out: &mut Vec<&'v VNode>) {
    for node in nodes {
        match node {
            VNode::Fragment(children) => flatten(children, out),
            other => out.push(other),
        }
    }
}
