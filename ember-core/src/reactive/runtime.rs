//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, memos, and
//! effects. It owns every effect, the tracking stack, and the batch state.
//!
//! # How It Works
//!
//! 1. When an effect runs, it enters a tracking context on the runtime's
//!    context stack; every signal read inside registers the effect.
//!
//! 2. When a signal's value changes, the signal asks the runtime to schedule
//!    each subscriber. Scheduling always goes through a batch: inside an open
//!    batch the subscriber joins the pending set, otherwise a single-item
//!    batch is opened and flushed immediately.
//!
//! 3. When the outermost batch closes, the pending set is drained. Every
//!    pending effect runs exactly once, in first-scheduled order, except that
//!    pending memo computations are drained ahead of plain effects so
//!    consumers never observe a memo that has not caught up with its inputs.
//!
//! # Instances
//!
//! There is no process-wide state. Each [`Runtime`] is an independent
//! reactive graph; handles created from one runtime never interact with
//! another. The runtime is single-threaded (`!Send`).

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use indexmap::IndexSet;
use tracing::{debug, trace};

use super::context::{ContextStack, ReactiveContext};
use super::effect::{Cleanup, Effect, EffectInner, EffectKind};
use super::location::LocationShared;
use super::subscriber::SubscriberId;

/// Handle to a reactive runtime.
///
/// Cloning the handle is cheap and shares the same graph.
#[derive(Clone, Default)]
pub struct Runtime {
    pub(crate) inner: Rc<RuntimeInner>,
}

/// A non-owning runtime handle.
///
/// Reactive closures stored inside the runtime capture this instead of a
/// [`Runtime`] so they never keep their own runtime alive.
#[derive(Clone, Default)]
pub struct WeakRuntime {
    inner: Weak<RuntimeInner>,
}

#[derive(Default)]
pub(crate) struct RuntimeInner {
    pub(crate) context: ContextStack,

    /// Every live effect, keyed by subscriber ID. This is the owning side;
    /// signals only hold IDs.
    effects: RefCell<HashMap<SubscriberId, Rc<EffectInner>>>,

    batch_depth: Cell<usize>,

    /// Effects scheduled while a batch is open, in first-scheduled order.
    pending: RefCell<IndexSet<SubscriberId>>,

    pub(crate) location: RefCell<Option<LocationShared>>,
}

impl Runtime {
    /// Create a new, empty runtime.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn downgrade(&self) -> WeakRuntime {
        WeakRuntime {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Run `f` with effect execution deferred until the outermost batch ends.
    ///
    /// Batches nest. However many writes happen inside, each affected
    /// effect runs once when the outermost batch exits.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        self.inner.batch(f)
    }

    /// Schedule `effect` to run.
    ///
    /// Joins the pending set if a batch is open; runs the effect right away
    /// otherwise.
    pub fn schedule(&self, effect: &Effect) {
        self.inner.schedule(effect.id());
    }

    /// Run `f` without registering any signal reads as dependencies.
    pub fn untrack<R>(&self, f: impl FnOnce() -> R) -> R {
        self.inner.untrack(f)
    }

    /// Register `f` to run before the current effect's next run, or when it
    /// is disposed. Ignored outside of an effect.
    pub fn on_cleanup(&self, f: impl FnOnce() + 'static) {
        let Some(id) = self.inner.context.current_subscriber() else {
            debug!("on_cleanup called outside of a running effect; ignored");
            return;
        };
        if let Some(effect) = self.inner.effect(id) {
            effect.push_cleanup(Cleanup::new(f));
        }
    }

    /// Whether a signal read right now would be tracked.
    pub fn is_tracking(&self) -> bool {
        self.inner.context.current_subscriber().is_some()
    }

    pub fn current_subscriber(&self) -> Option<SubscriberId> {
        self.inner.context.current_subscriber()
    }

    /// Whether a batch is currently open.
    pub fn is_batching(&self) -> bool {
        self.inner.batch_depth.get() > 0
    }

    /// Number of live (undisposed) effects, memos included.
    pub fn effect_count(&self) -> usize {
        self.inner.effects.borrow().len()
    }
}

impl WeakRuntime {
    pub fn upgrade(&self) -> Option<Runtime> {
        self.inner.upgrade().map(|inner| Runtime { inner })
    }

    pub(crate) fn upgrade_inner(&self) -> Option<Rc<RuntimeInner>> {
        self.inner.upgrade()
    }
}

impl RuntimeInner {
    pub(crate) fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        let guard = BatchGuard::enter(self);
        let out = f();
        if guard.outermost {
            self.flush();
        }
        out
    }

    pub(crate) fn schedule(&self, id: SubscriberId) {
        if self.batch_depth.get() > 0 {
            self.pending.borrow_mut().insert(id);
        } else {
            self.batch(|| {
                self.pending.borrow_mut().insert(id);
            });
        }
    }

    pub(crate) fn untrack<R>(&self, f: impl FnOnce() -> R) -> R {
        let _ctx = ReactiveContext::enter(&self.context, None);
        f()
    }

    pub(crate) fn register(&self, effect: Rc<EffectInner>) {
        self.effects.borrow_mut().insert(effect.id(), effect);
    }

    pub(crate) fn unregister(&self, id: SubscriberId) {
        // Dropped after the borrow ends; the body may own memo handles.
        let removed = self.effects.borrow_mut().remove(&id);
        self.pending.borrow_mut().shift_remove(&id);
        drop(removed);
    }

    pub(crate) fn effect(&self, id: SubscriberId) -> Option<Rc<EffectInner>> {
        self.effects.borrow().get(&id).cloned()
    }

    /// Dispose `effect` along with every effect it owns.
    pub(crate) fn dispose_effect(&self, effect: &EffectInner) {
        self.dispose_children(effect);
        effect.dispose();
        self.unregister(effect.id());
    }

    pub(crate) fn dispose_children(&self, effect: &EffectInner) {
        for id in effect.take_children() {
            if let Some(child) = self.effect(id) {
                self.dispose_effect(&child);
            }
        }
    }

    /// Drain the pending set. Runs with the batch still open, so writes made
    /// by the effects being drained are queued rather than run recursively.
    fn flush(&self) {
        let mut runs = 0usize;
        while let Some(effect) = self.next_pending() {
            effect.run(self);
            runs += 1;
        }
        trace!(runs, "batch flushed");
    }

    fn next_pending(&self) -> Option<Rc<EffectInner>> {
        let effects = self.effects.borrow();
        let mut pending = self.pending.borrow_mut();
        pending.retain(|id| effects.contains_key(id));

        let index = pending
            .iter()
            .position(|id| {
                effects
                    .get(id)
                    .is_some_and(|effect| effect.kind() == EffectKind::Memo)
            })
            .or_else(|| (!pending.is_empty()).then_some(0))?;

        let id = pending.shift_remove_index(index)?;
        effects.get(&id).cloned()
    }
}

impl Drop for RuntimeInner {
    fn drop(&mut self) {
        for effect in self.effects.get_mut().values() {
            effect.dispose();
        }
    }
}

/// Tracks batch depth; restores it even if the batched closure panics.
struct BatchGuard<'a> {
    runtime: &'a RuntimeInner,
    outermost: bool,
}

impl<'a> BatchGuard<'a> {
    fn enter(runtime: &'a RuntimeInner) -> Self {
        let depth = runtime.batch_depth.get();
        runtime.batch_depth.set(depth + 1);
        if depth == 0 {
            trace!("batch opened");
        }
        Self {
            runtime,
            outermost: depth == 0,
        }
    }
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        let depth = self.runtime.batch_depth.get();
        self.runtime.batch_depth.set(depth.saturating_sub(1));
        if self.outermost && std::thread::panicking() {
            self.runtime.pending.borrow_mut().clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn runtime_registers_and_disposes_effects() {
        let rt = Runtime::new();
        let effect = rt.create_effect(|| {});
        assert_eq!(rt.effect_count(), 1);

        effect.dispose();
        assert_eq!(rt.effect_count(), 0);
    }

    #[test]
    fn batch_defers_until_outermost_exit() {
        let rt = Runtime::new();
        let count = rt.create_signal(0);
        let log = Rc::new(RefCell::new(Vec::new()));

        let c = count.clone();
        let l = log.clone();
        let _effect = rt.create_effect(move || l.borrow_mut().push(c.get()));

        rt.batch(|| {
            count.set(1);
            rt.batch(|| count.set(2));
            assert!(rt.is_batching());
            assert_eq!(*log.borrow(), vec![0]);
            count.set(3);
        });

        assert!(!rt.is_batching());
        assert_eq!(*log.borrow(), vec![0, 3]);
    }

    #[test]
    fn pending_effects_run_in_first_scheduled_order() {
        let rt = Runtime::new();
        let a = rt.create_signal(0);
        let b = rt.create_signal(0);
        let order = Rc::new(RefCell::new(Vec::new()));

        let (sa, o) = (a.clone(), order.clone());
        let _ea = rt.create_effect(move || {
            sa.get();
            o.borrow_mut().push("a");
        });
        let (sb, o) = (b.clone(), order.clone());
        let _eb = rt.create_effect(move || {
            sb.get();
            o.borrow_mut().push("b");
        });
        order.borrow_mut().clear();

        rt.batch(|| {
            b.set(1);
            a.set(1);
            b.set(2);
        });

        assert_eq!(*order.borrow(), vec!["b", "a"]);
    }

    #[test]
    fn schedule_runs_immediately_outside_batch() {
        let rt = Runtime::new();
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        let effect = rt.create_effect(move || r.set(r.get() + 1));

        rt.schedule(&effect);
        assert_eq!(runs.get(), 2);

        rt.batch(|| {
            rt.schedule(&effect);
            rt.schedule(&effect);
            assert_eq!(runs.get(), 2);
        });
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn batch_depth_restored_after_panic() {
        let rt = Runtime::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            rt.batch(|| panic!("inside batch"));
        }));
        assert!(result.is_err());
        assert!(!rt.is_batching());
    }

    #[test]
    fn independent_runtimes_do_not_interact() {
        let rt1 = Runtime::new();
        let rt2 = Runtime::new();
        let s1 = rt1.create_signal(0);
        let runs = Rc::new(Cell::new(0));

        let (s, r) = (s1.clone(), runs.clone());
        let _effect = rt2.create_effect(move || {
            // Reads of a foreign runtime's signal are not tracked.
            s.get();
            r.set(r.get() + 1);
        });

        s1.set(5);
        assert_eq!(runs.get(), 1);
        assert_eq!(s1.subscriber_count(), 0);
    }

    #[test]
    fn untrack_skips_subscription() {
        let rt = Runtime::new();
        let s = rt.create_signal(1);
        let runs = Rc::new(Cell::new(0));

        let (sig, r, rt2) = (s.clone(), runs.clone(), rt.clone());
        let _effect = rt.create_effect(move || {
            rt2.untrack(|| sig.get());
            r.set(r.get() + 1);
        });

        s.set(2);
        assert_eq!(runs.get(), 1);
    }
}
