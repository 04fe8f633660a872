//! Memo Implementation
//!
//! A Memo is a cached derived value recomputed by an internal effect.
//!
//! # How Memos Work
//!
//! 1. On creation, the derivation runs once inside the memo's own effect and
//!    seeds the output signal.
//!
//! 2. When a dependency changes, the internal effect recomputes. The output
//!    signal is written (untracked, batched) only when the new value differs
//!    from the cached one.
//!
//! 3. Readers subscribe to the output signal, never to the computation, so
//!    a recomputation that lands on the same value propagates nothing.
//!
//! Memo computations are drained ahead of plain effects within a flush, so
//! consumers only ever see a memo that reflects every write of the batch.
//!
//! Dropping the last [`Memo`] handle disposes the computation. A
//! [`ReadSignal`] taken from [`Memo::signal`] keeps the last value but does
//! not keep the memo recomputing.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::Rc;

use super::effect::{Effect, EffectKind};
use super::runtime::Runtime;
use super::signal::{ReadSignal, Signal};
use crate::error::ReactiveError;

/// A cached derived value that recomputes only when dependencies change.
///
/// # Example
///
/// ```rust
/// use ember_core::reactive::Runtime;
///
/// let rt = Runtime::new();
/// let count = rt.create_signal(3);
///
/// let c = count.clone();
/// let parity = rt.create_memo(move || c.get() % 2).unwrap();
/// assert_eq!(parity.get(), 1);
///
/// count.set(5);
/// assert_eq!(parity.get(), 1);
/// assert_eq!(parity.compute_count(), 2);
/// ```
pub struct Memo<T: 'static> {
    output: ReadSignal<T>,
    owner: Rc<MemoOwner>,
}

/// Shared by every clone of a memo handle.
struct MemoOwner {
    effect: Effect,
}

impl Drop for MemoOwner {
    fn drop(&mut self) {
        self.effect.dispose();
    }
}

impl Runtime {
    /// Create a memo over `derive`.
    ///
    /// Fails only when the first computation panics, since there is no
    /// value to seed the memo with.
    pub fn create_memo<T, F>(&self, derive: F) -> Result<Memo<T>, ReactiveError>
    where
        T: Clone + PartialEq + 'static,
        F: Fn() -> T + 'static,
    {
        let slot: Rc<RefCell<Option<Signal<T>>>> = Rc::default();
        let runtime = self.downgrade();

        let output_slot = slot.clone();
        let effect = self.spawn_effect(
            EffectKind::Memo,
            Box::new(move || {
                let next = derive();
                let Some(runtime) = runtime.upgrade() else {
                    return Err(ReactiveError::RuntimeDropped.to_string());
                };
                let existing = output_slot.borrow().clone();
                match existing {
                    Some(output) => runtime.untrack(|| runtime.batch(|| output.set(next))),
                    None => *output_slot.borrow_mut() = Some(runtime.create_signal(next)),
                }
                Ok(None)
            }),
        );

        let output = slot.borrow().clone();
        match output {
            Some(output) => Ok(Memo {
                output: output.read_only(),
                owner: Rc::new(MemoOwner { effect }),
            }),
            None => {
                effect.dispose();
                Err(ReactiveError::MemoInit)
            }
        }
    }
}

impl<T: 'static> Memo<T> {
    /// Get the current value, subscribing the running effect.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.output.get()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.output.with(f)
    }

    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.output.get_untracked()
    }

    /// The output signal readers subscribe to.
    pub fn signal(&self) -> ReadSignal<T> {
        self.output.clone()
    }

    /// Number of times the derivation has run.
    pub fn compute_count(&self) -> usize {
        self.owner.effect.run_count()
    }

    /// Number of effects subscribed to the memo's output.
    pub fn dependent_count(&self) -> usize {
        self.output.subscriber_count()
    }

    /// Stop recomputing. The last value stays readable.
    pub fn dispose(&self) {
        self.owner.effect.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.owner.effect.is_disposed()
    }
}

impl<T: 'static> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self {
            output: self.output.clone(),
            owner: Rc::clone(&self.owner),
        }
    }
}

impl<T: Debug + 'static> Debug for Memo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memo")
            .field("value", &self.output)
            .field("compute_count", &self.compute_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn memo_computes_on_creation() {
        let rt = Runtime::new();
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();

        let memo = rt
            .create_memo(move || {
                c.set(c.get() + 1);
                42
            })
            .unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(memo.get(), 42);
        assert_eq!(memo.get(), 42);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn memo_recomputes_when_source_changes() {
        let rt = Runtime::new();
        let signal = rt.create_signal(10);

        let s = signal.clone();
        let doubled = rt.create_memo(move || s.get() * 2).unwrap();
        assert_eq!(doubled.get(), 20);

        signal.set(5);
        assert_eq!(doubled.get(), 10);
        assert_eq!(doubled.compute_count(), 2);
    }

    #[test]
    fn unchanged_output_does_not_propagate() {
        let rt = Runtime::new();
        let source = rt.create_signal(1);

        let s = source.clone();
        let parity = rt.create_memo(move || s.get() % 2).unwrap();

        let runs = Rc::new(Cell::new(0));
        let (m, r) = (parity.clone(), runs.clone());
        let _consumer = rt.create_effect(move || {
            m.get();
            r.set(r.get() + 1);
        });

        source.set(3);
        source.set(5);

        assert_eq!(parity.compute_count(), 3);
        assert_eq!(parity.get(), 1);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn memo_chain_settles_before_consumers() {
        let rt = Runtime::new();
        let base = rt.create_signal(5);

        let b = base.clone();
        let doubled = rt.create_memo(move || b.get() * 2).unwrap();
        let d = doubled.clone();
        let plus_ten = rt.create_memo(move || d.get() + 10).unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let (b, p, s) = (base.clone(), plus_ten.clone(), seen.clone());
        let _consumer = rt.create_effect(move || {
            s.borrow_mut().push((b.get(), p.get()));
        });

        base.set(10);

        // Never an intermediate (10, 20) pair.
        assert_eq!(*seen.borrow(), vec![(5, 20), (10, 30)]);
    }

    #[test]
    fn memo_init_failure_is_reported() {
        let rt = Runtime::new();
        let result = rt.create_memo::<i32, _>(|| panic!("cannot derive"));
        assert_eq!(result.err(), Some(ReactiveError::MemoInit));
        assert_eq!(rt.effect_count(), 0);
    }

    #[test]
    fn dropping_the_last_handle_stops_recomputing() {
        let rt = Runtime::new();
        let signal = rt.create_signal(1);
        let calls = Rc::new(Cell::new(0));

        let (s, c) = (signal.clone(), calls.clone());
        let memo = rt
            .create_memo(move || {
                c.set(c.get() + 1);
                s.get() * 3
            })
            .unwrap();
        let output = memo.signal();
        let copy = memo.clone();
        drop(memo);

        signal.set(2);
        assert_eq!(calls.get(), 2);
        assert_eq!(rt.effect_count(), 1);

        drop(copy);
        assert_eq!(rt.effect_count(), 0);
        assert_eq!(signal.subscriber_count(), 0);

        signal.set(3);
        assert_eq!(calls.get(), 2);
        assert_eq!(output.get(), 6);
    }

    #[test]
    fn disposed_memo_keeps_last_value() {
        let rt = Runtime::new();
        let signal = rt.create_signal(1);

        let s = signal.clone();
        let memo = rt.create_memo(move || s.get() + 1).unwrap();
        memo.dispose();

        signal.set(10);
        assert!(memo.is_disposed());
        assert_eq!(memo.get(), 2);
    }
}
