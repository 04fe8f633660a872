//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a running effect, the signal registers
//!    that effect as a subscriber.
//!
//! 2. When a write produces a value that differs from the current one, every
//!    subscriber is scheduled on the owning runtime.
//!
//! 3. A write of an equal value is dropped without scheduling anything.
//!
//! # Memory Layout
//!
//! Each signal consists of:
//! - A unique ID
//! - The value, behind a `RefCell`
//! - An insertion-ordered set of subscriber IDs
//! - A weak link to its runtime, so effects capturing the signal do not keep
//!   the runtime alive

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::{Rc, Weak};

use indexmap::IndexSet;
use smallvec::SmallVec;
use tracing::trace;

use super::runtime::{Runtime, RuntimeInner};
use super::subscriber::{Source, SourceId, SubscriberId};

/// A reactive signal holding a value of type T.
///
/// # Example
///
/// ```rust
/// use ember_core::reactive::Runtime;
///
/// let rt = Runtime::new();
/// let count = rt.create_signal(0);
///
/// count.set(5);
/// count.update(|c| c + 1);
/// assert_eq!(count.get(), 6);
/// ```
pub struct Signal<T: 'static> {
    inner: Rc<SignalInner<T>>,
}

struct SignalInner<T> {
    id: SourceId,
    value: RefCell<T>,
    subscribers: RefCell<IndexSet<SubscriberId>>,
    runtime: Weak<RuntimeInner>,
}

impl<T: 'static> Source for SignalInner<T> {
    fn source_id(&self) -> SourceId {
        self.id
    }

    fn unsubscribe(&self, subscriber: SubscriberId) {
        self.subscribers.borrow_mut().shift_remove(&subscriber);
    }
}

impl Runtime {
    /// Create a new signal owned by this runtime.
    pub fn create_signal<T: 'static>(&self, value: T) -> Signal<T> {
        Signal {
            inner: Rc::new(SignalInner {
                id: SourceId::new(),
                value: RefCell::new(value),
                subscribers: RefCell::new(IndexSet::new()),
                runtime: Rc::downgrade(&self.inner),
            }),
        }
    }
}

impl<T: 'static> Signal<T> {
    pub fn id(&self) -> SourceId {
        self.inner.id
    }

    /// Get a clone of the current value, subscribing the running effect.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.track();
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value, subscribing the running effect.
    ///
    /// Writing to this same signal from inside `f` panics.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        f(&self.inner.value.borrow())
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.inner.value.borrow().clone()
    }

    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Set a new value and schedule subscribers if it differs.
    pub fn set(&self, value: T)
    where
        T: PartialEq,
    {
        if *self.inner.value.borrow() == value {
            return;
        }
        self.inner.value.replace(value);
        self.notify();
    }

    /// Compute the next value from the previous one, then [`set`](Self::set) it.
    pub fn update(&self, f: impl FnOnce(&T) -> T)
    where
        T: PartialEq,
    {
        let next = f(&self.inner.value.borrow());
        self.set(next);
    }

    /// Number of effects currently subscribed.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    /// Read-only view over this signal.
    pub fn read_only(&self) -> ReadSignal<T> {
        ReadSignal {
            signal: self.clone(),
        }
    }

    fn track(&self) {
        let Some(runtime) = self.inner.runtime.upgrade() else {
            return;
        };
        let Some(subscriber) = runtime.context.current_subscriber() else {
            return;
        };
        if self.inner.subscribers.borrow_mut().insert(subscriber) {
            let source: Weak<dyn Source> = Rc::downgrade(&self.inner) as Weak<SignalInner<T>>;
            runtime.context.track(source);
        }
    }

    fn notify(&self) {
        let subscribers: SmallVec<[SubscriberId; 8]> =
            self.inner.subscribers.borrow().iter().copied().collect();
        if subscribers.is_empty() {
            return;
        }
        let Some(runtime) = self.inner.runtime.upgrade() else {
            return;
        };
        trace!(signal = ?self.inner.id, subscribers = subscribers.len(), "signal changed");
        runtime.batch(|| {
            for id in subscribers {
                runtime.schedule(id);
            }
        });
    }
}

impl<T: 'static> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug + 'static> Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// A read-only signal, as exposed by memos and resources.
pub struct ReadSignal<T: 'static> {
    signal: Signal<T>,
}

impl<T: 'static> ReadSignal<T> {
    pub fn id(&self) -> SourceId {
        self.signal.id()
    }

    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.signal.get()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.signal.with(f)
    }

    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.signal.get_untracked()
    }

    pub fn subscriber_count(&self) -> usize {
        self.signal.subscriber_count()
    }
}

impl<T: 'static> Clone for ReadSignal<T> {
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
        }
    }
}

impl<T: Debug + 'static> Debug for ReadSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.signal.fmt(f)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
