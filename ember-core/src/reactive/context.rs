//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! the current computation is registered as a subscriber.
//!
//! # Implementation
//!
//! Each [`Runtime`](super::Runtime) owns its own context stack. Running an
//! effect pushes an entry; the entry is popped when the guard returned by
//! [`ReactiveContext::enter`] is dropped, so the stack depth is restored even
//! when the computation fails or panics.
//!
//! An entry with no subscriber marks an untracked region: reads inside it do
//! not subscribe anything, even when an effect is running further down the
//! stack.

use std::cell::RefCell;
use std::rc::Weak;

use super::subscriber::{Source, SubscriberId};

/// An entry in the reactive context stack.
pub(crate) struct ContextEntry {
    /// The computation being tracked, or `None` for an untracked region.
    subscriber: Option<SubscriberId>,
    /// Sources read during this computation.
    sources: Vec<Weak<dyn Source>>,
}

/// The per-runtime stack of running computations (innermost last).
#[derive(Default)]
pub(crate) struct ContextStack {
    entries: RefCell<Vec<ContextEntry>>,
}

impl ContextStack {
    pub(crate) fn current_subscriber(&self) -> Option<SubscriberId> {
        self.entries.borrow().last().and_then(|entry| entry.subscriber)
    }

    pub(crate) fn depth(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Record that the current computation read `source`.
    pub(crate) fn track(&self, source: Weak<dyn Source>) {
        if let Some(entry) = self.entries.borrow_mut().last_mut() {
            if entry.subscriber.is_some() {
                entry.sources.push(source);
            }
        }
    }
}

/// Guard that pops the context when dropped.
pub(crate) struct ReactiveContext<'a> {
    stack: &'a ContextStack,
    subscriber: Option<SubscriberId>,
    depth: usize,
}

impl<'a> ReactiveContext<'a> {
    /// Enter a new context for `subscriber` (or an untracked region).
    pub(crate) fn enter(stack: &'a ContextStack, subscriber: Option<SubscriberId>) -> Self {
        let mut entries = stack.entries.borrow_mut();
        entries.push(ContextEntry {
            subscriber,
            sources: Vec::new(),
        });
        Self {
            stack,
            subscriber,
            depth: entries.len(),
        }
    }

    /// Take the sources collected so far in this context.
    pub(crate) fn take_sources(&self) -> Vec<Weak<dyn Source>> {
        let mut entries = self.stack.entries.borrow_mut();
        entries
            .get_mut(self.depth - 1)
            .map(|entry| std::mem::take(&mut entry.sources))
            .unwrap_or_default()
    }
}

impl Drop for ReactiveContext<'_> {
    fn drop(&mut self) {
        let mut entries = self.stack.entries.borrow_mut();
        // Unwinding out of a nested guard can leave deeper entries behind.
        entries.truncate(self.depth);
        let popped = entries.pop();

        if let Some(entry) = popped {
            debug_assert_eq!(
                entry.subscriber, self.subscriber,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.subscriber, entry.subscriber
            );
        }
    }
}
