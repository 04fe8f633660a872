//! View model.
//!
//! Views are plain data: a closed [`VNode`] enum built with [`el`] and the
//! [`Element`] builder methods. The same tree renders to a string on the
//! server and drives reconciliation on the client.

pub(crate) mod render;
mod vnode;

pub use render::render_to_string;
pub use vnode::{el, AttrValue, Element, EventHandler, VNode};
