//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs once immediately, inside an implicit
//!    batch, to establish its initial dependencies.
//!
//! 2. When any dependency changes, the effect is scheduled on its runtime.
//!
//! 3. Before re-running, the effect runs its cleanup callbacks in
//!    registration order, then detaches from every source it read last
//!    time. The sources read during the new run become its dependency set,
//!    so after run N the effect is subscribed to exactly what run N read.
//!
//! # Failure
//!
//! A body that returns `Err` or panics is contained: the failure is logged,
//! the sources read up to that point stay subscribed, and the next write to
//! any of them retries the effect.
//!
//! # Cleanup
//!
//! A body may return a [`Cleanup`], or call
//! [`Runtime::on_cleanup`](super::Runtime::on_cleanup) any number of times.
//! Cleanups run before the next run and when the effect is disposed.
//!
//! # Ownership
//!
//! Effects and memos created while an effect body is running belong to that
//! effect. They are disposed before its next run, ahead of its cleanups, and
//! when it is disposed. Creating them inside
//! [`Runtime::untrack`](super::Runtime::untrack) opts out.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt::{self, Display};
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use smallvec::SmallVec;
use tracing::{error, trace, warn};

use super::context::ReactiveContext;
use super::runtime::{Runtime, RuntimeInner};
use super::subscriber::{Source, SubscriberId};

/// A callback run before an effect's next execution or on disposal.
pub struct Cleanup(Box<dyn FnOnce()>);

impl Cleanup {
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Box::new(f))
    }

    fn run(self) {
        (self.0)()
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Cleanup")
    }
}

/// What an effect body may return.
pub trait EffectOutput {
    fn into_outcome(self) -> Result<Option<Cleanup>, String>;
}

impl EffectOutput for () {
    fn into_outcome(self) -> Result<Option<Cleanup>, String> {
        Ok(None)
    }
}

impl EffectOutput for Cleanup {
    fn into_outcome(self) -> Result<Option<Cleanup>, String> {
        Ok(Some(self))
    }
}

impl<E: Display> EffectOutput for Result<(), E> {
    fn into_outcome(self) -> Result<Option<Cleanup>, String> {
        self.map(|()| None).map_err(|e| e.to_string())
    }
}

impl<E: Display> EffectOutput for Result<Cleanup, E> {
    fn into_outcome(self) -> Result<Option<Cleanup>, String> {
        self.map(Some).map_err(|e| e.to_string())
    }
}

pub(crate) type EffectBody = Box<dyn FnMut() -> Result<Option<Cleanup>, String>>;

/// Memo computations are drained before plain effects in a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EffectKind {
    Effect,
    Memo,
}

pub(crate) struct EffectInner {
    id: SubscriberId,
    kind: EffectKind,
    body: RefCell<EffectBody>,
    cleanups: RefCell<SmallVec<[Cleanup; 2]>>,
    /// Sources read during the last run.
    sources: RefCell<Vec<Weak<dyn Source>>>,
    /// Effects created during the last run.
    children: RefCell<SmallVec<[SubscriberId; 2]>>,
    disposed: Cell<bool>,
    run_count: Cell<usize>,
}

impl EffectInner {
    fn new(kind: EffectKind, body: EffectBody) -> Self {
        Self {
            id: SubscriberId::new(),
            kind,
            body: RefCell::new(body),
            cleanups: RefCell::new(SmallVec::new()),
            sources: RefCell::new(Vec::new()),
            children: RefCell::new(SmallVec::new()),
            disposed: Cell::new(false),
            run_count: Cell::new(0),
        }
    }

    pub(crate) fn id(&self) -> SubscriberId {
        self.id
    }

    pub(crate) fn kind(&self) -> EffectKind {
        self.kind
    }

    pub(crate) fn push_cleanup(&self, cleanup: Cleanup) {
        self.cleanups.borrow_mut().push(cleanup);
    }

    pub(crate) fn adopt(&self, child: SubscriberId) {
        self.children.borrow_mut().push(child);
    }

    pub(crate) fn take_children(&self) -> SmallVec<[SubscriberId; 2]> {
        std::mem::take(&mut *self.children.borrow_mut())
    }

    /// Execute the body inside a tracking context.
    pub(crate) fn run(&self, runtime: &RuntimeInner) {
        if self.disposed.get() {
            return;
        }
        let Ok(mut body) = self.body.try_borrow_mut() else {
            warn!(effect = ?self.id, "effect scheduled while already running; skipped");
            return;
        };

        runtime.dispose_children(self);
        self.run_cleanups();
        self.detach();

        trace!(effect = ?self.id, kind = ?self.kind, "running effect");
        let ctx = ReactiveContext::enter(&runtime.context, Some(self.id));
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (&mut **body)()));
        *self.sources.borrow_mut() = ctx.take_sources();
        drop(ctx);
        drop(body);

        self.run_count.set(self.run_count.get() + 1);

        match outcome {
            Ok(Ok(Some(cleanup))) => self.push_cleanup(cleanup),
            Ok(Ok(None)) => {}
            Ok(Err(message)) => {
                error!(effect = ?self.id, %message, "effect failed; subscriptions kept for retry");
            }
            Err(payload) => {
                error!(
                    effect = ?self.id,
                    message = %panic_message(payload.as_ref()),
                    "effect panicked; subscriptions kept for retry"
                );
            }
        }

        // Disposed from inside its own body.
        if self.disposed.get() {
            runtime.dispose_children(self);
            self.run_cleanups();
            self.detach();
        }
    }

    fn run_cleanups(&self) {
        let cleanups = std::mem::take(&mut *self.cleanups.borrow_mut());
        for cleanup in cleanups {
            cleanup.run();
        }
    }

    fn detach(&self) {
        let sources = std::mem::take(&mut *self.sources.borrow_mut());
        for source in sources.iter().filter_map(Weak::upgrade) {
            source.unsubscribe(self.id);
        }
    }

    pub(crate) fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        self.run_cleanups();
        self.detach();
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// The runtime owns the effect; this handle only observes or disposes it.
/// Dropping the handle does not stop the effect.
///
/// # Example
///
/// ```rust
/// use ember_core::reactive::Runtime;
///
/// let rt = Runtime::new();
/// let count = rt.create_signal(0);
///
/// let c = count.clone();
/// let effect = rt.create_effect(move || {
///     println!("Count is: {}", c.get());
/// });
///
/// count.set(5); // Prints: "Count is: 5"
/// assert_eq!(effect.run_count(), 2);
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Rc<EffectInner>,
    runtime: Weak<RuntimeInner>,
}

impl Runtime {
    /// Create an effect and run it once, synchronously.
    pub fn create_effect<F, O>(&self, mut f: F) -> Effect
    where
        F: FnMut() -> O + 'static,
        O: EffectOutput,
    {
        self.spawn_effect(EffectKind::Effect, Box::new(move || f().into_outcome()))
    }

    pub(crate) fn spawn_effect(&self, kind: EffectKind, body: EffectBody) -> Effect {
        let inner = Rc::new(EffectInner::new(kind, body));
        if let Some(parent) = self
            .inner
            .context
            .current_subscriber()
            .and_then(|id| self.inner.effect(id))
        {
            parent.adopt(inner.id);
        }
        self.inner.register(inner.clone());
        self.inner.batch(|| inner.run(&self.inner));
        Effect {
            inner,
            runtime: Rc::downgrade(&self.inner),
        }
    }
}

impl Effect {
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Dispose of the effect.
    ///
    /// Outstanding cleanups run now, after owned effects are disposed;
    /// later scheduling is a no-op.
    pub fn dispose(&self) {
        match self.runtime.upgrade() {
            Some(runtime) => runtime.dispose_effect(&self.inner),
            None => self.inner.dispose(),
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Number of times the body has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Number of live sources read during the last run.
    pub fn dependency_count(&self) -> usize {
        self.inner
            .sources
            .borrow()
            .iter()
            .filter(|source| source.strong_count() > 0)
            .count()
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
