//! Hydration and reconciliation.
//!
//! [`mount`] attaches a reactive view to a container that may already hold
//! server-rendered markup. The first pass adopts that markup, repairing
//! whatever does not match; each later pass, driven by the render effect,
//! applies the minimal set of live mutations. Event handlers declared by the
//! view are served by a [`Delegator`] installed on the container.

mod attrs;
mod delegate;
mod mount;
mod reconcile;

pub use delegate::Delegator;
pub use mount::{mount, Mount, RenderOutput, ERROR_CLASS};
pub use reconcile::{PatchStats, Reconciler};

use crate::config::Config;
use crate::dom::{Document, NodeId};
use crate::view::VNode;

/// Run a single, non-reactive hydration pass of `view` over `container`.
///
/// The returned reconciler can be fed later trees with
/// [`Reconciler::hydrate`].
pub fn hydrate(document: &Document, container: NodeId, view: &VNode, config: &Config) -> Reconciler {
    let mut reconciler = Reconciler::new(document.clone(), container, config.clone());
    reconciler.hydrate(view);
    reconciler
}
