//! Reactive Primitives
//!
//! This module implements the reactive system: signals, effects, memos,
//! async resources and the location signal. Everything hangs off a
//! [`Runtime`] instance; there is no global state, so independent runtimes
//! (one per mounted tree, or one per test) never interfere.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! inside a running effect, the signal registers that effect as a
//! subscriber. A write that changes the value schedules every subscriber.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that re-runs whenever a signal
//! it read last time changes. Rendering is an effect.
//!
//! ## Memos
//!
//! A Memo is a derived value computed by an internal effect and published
//! through its own signal, which is only written when the value changes.
//!
//! ## Batches
//!
//! Inside [`Runtime::batch`], scheduled effects are collected and each runs
//! once when the outermost batch closes.
//!
//! # Example
//!
//! ```rust
//! use ember_core::reactive::Runtime;
//!
//! let rt = Runtime::new();
//! let count = rt.create_signal(1);
//!
//! let c = count.clone();
//! let doubled = rt.create_memo(move || c.get() * 2).unwrap();
//!
//! let d = doubled.clone();
//! let _effect = rt.create_effect(move || println!("doubled: {}", d.get()));
//!
//! rt.batch(|| {
//!     count.set(2);
//!     count.set(3);
//! });
//! assert_eq!(doubled.get(), 6);
//! ```

mod context;
pub(crate) mod effect;
mod location;
mod memo;
mod resource;
mod runtime;
mod signal;
mod subscriber;

pub use effect::{Cleanup, Effect, EffectOutput};
pub use location::{LocationHandle, LocationParts};
pub use memo::Memo;
pub use resource::{CancelToken, Resource};
pub use runtime::{Runtime, WeakRuntime};
pub use signal::{ReadSignal, Signal};
pub use subscriber::{SourceId, SubscriberId};
