//! DOM events as dispatched by [`Document::dispatch_event`](super::Document::dispatch_event).

use std::rc::Rc;

use super::NodeId;

/// A listener attached to a node.
pub type Listener = Rc<dyn Fn(&mut Event)>;

/// An event bubbling from `target` towards the document root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    kind: String,
    target: NodeId,
    current_target: NodeId,
    propagation_stopped: bool,
    default_prevented: bool,
}

impl Event {
    pub fn new(kind: impl Into<String>, target: NodeId) -> Self {
        Self {
            kind: kind.into(),
            target,
            current_target: target,
            propagation_stopped: false,
            default_prevented: false,
        }
    }

    /// Event type, e.g. `click`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The node the event was dispatched on.
    pub fn target(&self) -> NodeId {
        self.target
    }

    /// The node whose handler is currently running.
    pub fn current_target(&self) -> NodeId {
        self.current_target
    }

    pub(crate) fn set_current_target(&mut self, node: NodeId) {
        self.current_target = node;
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }
}
