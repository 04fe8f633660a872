//! Event delegation.
//!
//! Handlers declared in a view are never bound to the elements themselves.
//! One listener per event type sits on the delegation root and walks from
//! the event target back up to the root, invoking the handler each node
//! registered for that type, until a handler stops propagation.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, trace};

use crate::dom::{Document, Event, NodeId, WeakDocument};
use crate::view::EventHandler;

/// Per-root handler table plus the set of installed root listeners.
#[derive(Clone)]
pub struct Delegator {
    inner: Rc<DelegatorInner>,
}

struct DelegatorInner {
    document: WeakDocument,
    root: NodeId,
    installed: RefCell<IndexSet<String>>,
    handlers: RefCell<HashMap<NodeId, IndexMap<String, EventHandler>>>,
}

impl fmt::Debug for Delegator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delegator")
            .field("root", &self.inner.root)
            .field("installed", &self.inner.installed.borrow())
            .field("nodes", &self.inner.handlers.borrow().len())
            .finish()
    }
}

impl Delegator {
    pub fn new(document: &Document, root: NodeId) -> Self {
        Self {
            inner: Rc::new(DelegatorInner {
                document: document.downgrade(),
                root,
                installed: RefCell::new(IndexSet::new()),
                handlers: RefCell::new(HashMap::new()),
            }),
        }
    }

    pub fn root(&self) -> NodeId {
        self.inner.root
    }

    /// Install the root listener for `kind` unless it is already present.
    pub fn install(&self, kind: &str) {
        if !self.inner.installed.borrow_mut().insert(kind.to_string()) {
            return;
        }
        let Some(document) = self.inner.document.upgrade() else {
            return;
        };
        let weak: Weak<DelegatorInner> = Rc::downgrade(&self.inner);
        document.add_event_listener(
            self.inner.root,
            kind,
            Rc::new(move |event: &mut Event| {
                if let Some(inner) = weak.upgrade() {
                    inner.dispatch(event);
                }
            }),
        );
        debug!(root = %self.inner.root, kind, "installed delegated listener");
    }

    /// Replace every handler registered for `node`.
    pub(crate) fn set_handlers<'h>(
        &self,
        node: NodeId,
        handlers: impl Iterator<Item = (&'h str, &'h EventHandler)>,
    ) {
        let table: IndexMap<String, EventHandler> = handlers
            .map(|(kind, handler)| (kind.to_string(), handler.clone()))
            .collect();
        for kind in table.keys() {
            self.install(kind);
        }
        let mut all = self.inner.handlers.borrow_mut();
        if table.is_empty() {
            all.remove(&node);
        } else {
            all.insert(node, table);
        }
    }

    /// Drop the entries of `node` and everything below it.
    pub(crate) fn forget_subtree(&self, document: &Document, node: NodeId) {
        let mut all = self.inner.handlers.borrow_mut();
        if all.is_empty() {
            return;
        }
        all.remove(&node);
        for descendant in document.descendants(node) {
            all.remove(&descendant);
        }
    }

    pub fn clear(&self) {
        self.inner.handlers.borrow_mut().clear();
    }

    /// Number of nodes with at least one handler.
    pub fn handler_count(&self) -> usize {
        self.inner.handlers.borrow().len()
    }

    pub fn has_handler(&self, node: NodeId, kind: &str) -> bool {
        self.inner
            .handlers
            .borrow()
            .get(&node)
            .is_some_and(|table| table.contains_key(kind))
    }

    pub fn installed_events(&self) -> Vec<String> {
        self.inner.installed.borrow().iter().cloned().collect()
    }
}

impl DelegatorInner {
    fn dispatch(&self, event: &mut Event) {
        let Some(document) = self.document.upgrade() else {
            return;
        };
        let kind = event.kind().to_string();
        let mut current = Some(event.target());
        while let Some(node) = current {
            // The table borrow must end before user code runs.
            let handler = self
                .handlers
                .borrow()
                .get(&node)
                .and_then(|table| table.get(&kind))
                .cloned();
            if let Some(handler) = handler {
                trace!(%node, kind = %kind, "delegated handler");
                event.set_current_target(node);
                handler.call(event);
                if event.propagation_stopped() {
                    break;
                }
            }
            if node == self.root {
                break;
            }
            current = document.parent(node);
        }
        event.set_current_target(self.root);
    }
}
