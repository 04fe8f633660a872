//! Mounting a reactive view onto a document container.

use std::cell::RefCell;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use tracing::{debug, error, warn};

use super::delegate::Delegator;
use super::reconcile::{PatchStats, Reconciler};
use crate::config::Config;
use crate::dom::{Document, NodeId};
use crate::error::MountError;
use crate::reactive::effect::panic_message;
use crate::reactive::{Effect, Runtime};
use crate::view::{el, Element, VNode};

/// Class of the element shown in place of a view that failed to render.
pub const ERROR_CLASS: &str = "ember-error";

/// What a view function may return.
pub trait RenderOutput {
    fn into_render(self) -> Result<VNode, String>;
}

impl RenderOutput for VNode {
    fn into_render(self) -> Result<VNode, String> {
        Ok(self)
    }
}

impl RenderOutput for Element {
    fn into_render(self) -> Result<VNode, String> {
        Ok(self.into())
    }
}

impl<V: Into<VNode>, E: Display> RenderOutput for Result<V, E> {
    fn into_render(self) -> Result<VNode, String> {
        self.map(Into::into).map_err(|e| e.to_string())
    }
}

/// A view kept in sync with its container by a render effect.
pub struct Mount {
    effect: Effect,
    reconciler: Rc<RefCell<Reconciler>>,
    delegator: Delegator,
    container: NodeId,
}

/// Attach `view` to `container`, hydrating whatever markup is already there.
///
/// The view runs inside an effect, so any signal it reads triggers another
/// reconciliation pass when written. A view that returns `Err` or panics
/// replaces the container's content with an inline error message; the
/// effect stays subscribed and the next successful run restores the view.
///
/// # Errors
///
/// Fails if `container` is not a connected element of `document`.
pub fn mount<F, O>(
    runtime: &Runtime,
    document: &Document,
    container: NodeId,
    config: &Config,
    mut view: F,
) -> Result<Mount, MountError>
where
    F: FnMut() -> O + 'static,
    O: RenderOutput,
{
    if !document.contains(container) {
        return Err(MountError::UnknownNode(container));
    }
    if !document.is_element(container) {
        return Err(MountError::NotAnElement(container));
    }
    if !document.is_connected(container) {
        return Err(MountError::Detached(container));
    }

    let reconciler = Reconciler::new(document.clone(), container, config.clone());
    let delegator = reconciler.delegator().clone();
    let reconciler = Rc::new(RefCell::new(reconciler));

    let shared = Rc::clone(&reconciler);
    let effect = runtime.create_effect(move || {
        let output = panic::catch_unwind(AssertUnwindSafe(|| view().into_render()))
            .unwrap_or_else(|payload| Err(panic_message(payload.as_ref())));
        let vnode = output.unwrap_or_else(|message| {
            error!(%message, "view failed to render");
            error_view(&message)
        });
        match shared.try_borrow_mut() {
            Ok(mut reconciler) => reconciler.hydrate(&vnode),
            Err(_) => warn!("render requested during a reconciliation pass; skipped"),
        }
    });

    debug!(%container, "mounted view");
    Ok(Mount {
        effect,
        reconciler,
        delegator,
        container,
    })
}

fn error_view(message: &str) -> VNode {
    el("pre").class(ERROR_CLASS).child(message).into()
}

impl Mount {
    pub fn container(&self) -> NodeId {
        self.container
    }

    pub fn stats(&self) -> PatchStats {
        self.reconciler.borrow().stats()
    }

    pub fn delegator(&self) -> &Delegator {
        &self.delegator
    }

    pub fn effect(&self) -> &Effect {
        &self.effect
    }

    /// Stop re-rendering and drop every delegated handler. The live markup
    /// is left as it is.
    pub fn unmount(self) {
        self.effect.dispose();
        self.delegator.clear();
        debug!(container = %self.container, "unmounted view");
    }
}
