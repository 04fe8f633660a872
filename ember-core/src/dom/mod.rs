//! Host document.
//!
//! The reconciliation engine needs a small slice of a browser: element and
//! text creation, child list edits, attribute and property access, event
//! listeners, and session history. [`Document`] provides the tree part as an
//! arena-backed, in-process model; [`History`] is the seam for navigation.
//!
//! Server-rendered markup is loaded with [`Document::parse_into`], which is
//! what hydration then walks.

pub(crate) mod document;
mod event;
pub mod history;
mod parse;

pub use document::{Document, NodeId, WeakDocument, BOOLEAN_PROPERTIES};
pub use event::{Event, Listener};
pub use history::{History, HistoryListener, ListenerId, MemoryHistory};
