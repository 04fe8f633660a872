//! Ember Core
//!
//! This crate provides the core runtime for the Ember UI framework.
//! It implements:
//!
//! - Reactive primitives (signals, effects, memos, async resources)
//! - Batched, coalescing effect scheduling
//! - A virtual node model with server-side string rendering
//! - Hydration and keyed reconciliation against a live document
//! - Event delegation
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Runtime, dependency tracking and the reactive primitives
//! - `view`: Virtual nodes and `render_to_string`
//! - `dom`: The host document the reconciler mutates, plus session history
//! - `hydrate`: Reconciliation, attribute rules, delegation and mounting
//! - `config`: Development/production settings
//! - `devserver`: Rebuild notifications pushed by the dev server
//!
//! # Example
//!
//! ```rust
//! use ember_core::config::Config;
//! use ember_core::dom::Document;
//! use ember_core::hydrate::mount;
//! use ember_core::reactive::Runtime;
//! use ember_core::view::el;
//!
//! let rt = Runtime::new();
//! let doc = Document::new();
//! let app = doc.create_element("div");
//! doc.append_child(doc.root(), app);
//! doc.parse_into(app, "<span>0</span>").unwrap();
//!
//! let count = rt.create_signal(0);
//! let c = count.clone();
//! let _mounted = mount(&rt, &doc, app, &Config::default(), move || {
//!     el("span").child(c.get())
//! })
//! .unwrap();
//!
//! rt.batch(|| {
//!     count.update(|c| c + 1);
//!     count.update(|c| c + 1);
//! });
//! assert_eq!(doc.inner_html(app), "<span>2</span>");
//! ```

pub mod config;
pub mod devserver;
pub mod dom;
pub mod error;
pub mod hydrate;
pub mod reactive;
pub mod view;

pub use config::Config;
pub use error::{Error, Result};
pub use hydrate::{mount, Mount};
pub use reactive::{Effect, Memo, Resource, Runtime, Signal};
pub use view::{el, render_to_string, VNode};
