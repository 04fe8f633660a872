//! Session history seam.
//!
//! The location singleton only needs to read the current URL, push or
//! replace entries, and hear about popstate-style navigation. [`History`]
//! is that contract; [`MemoryHistory`] is the in-process implementation
//! used on the server and in tests.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

/// Identifies a subscription made with [`History::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Called with the new URL when the user navigates through history.
pub type HistoryListener = Rc<dyn Fn(&str)>;

pub trait History {
    /// The current URL.
    fn current(&self) -> String;

    /// Push a new entry. Does not notify listeners.
    fn push(&self, url: &str);

    /// Replace the current entry. Does not notify listeners.
    fn replace(&self, url: &str);

    fn subscribe(&self, listener: HistoryListener) -> ListenerId;

    fn unsubscribe(&self, id: ListenerId);
}

/// In-memory session history.
#[derive(Clone)]
pub struct MemoryHistory {
    inner: Rc<RefCell<MemoryHistoryInner>>,
}

struct MemoryHistoryInner {
    entries: Vec<String>,
    index: usize,
    listeners: IndexMap<ListenerId, HistoryListener>,
    next_listener: u64,
}

impl MemoryHistory {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(MemoryHistoryInner {
                entries: vec![initial.into()],
                index: 0,
                listeners: IndexMap::new(),
                next_listener: 0,
            })),
        }
    }

    /// Step back one entry, notifying listeners. Returns false at the start.
    pub fn back(&self) -> bool {
        self.go(-1)
    }

    /// Step forward one entry, notifying listeners. Returns false at the end.
    pub fn forward(&self) -> bool {
        self.go(1)
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().entries.is_empty()
    }

    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    fn go(&self, delta: isize) -> bool {
        let (url, listeners) = {
            let mut inner = self.inner.borrow_mut();
            let Some(index) = inner.index.checked_add_signed(delta) else {
                return false;
            };
            if index >= inner.entries.len() {
                return false;
            }
            inner.index = index;
            let listeners: Vec<HistoryListener> = inner.listeners.values().cloned().collect();
            (inner.entries[index].clone(), listeners)
        };
        for listener in listeners {
            listener(&url);
        }
        true
    }
}

impl History for MemoryHistory {
    fn current(&self) -> String {
        let inner = self.inner.borrow();
        inner.entries[inner.index].clone()
    }

    fn push(&self, url: &str) {
        let mut inner = self.inner.borrow_mut();
        let keep = inner.index + 1;
        inner.entries.truncate(keep);
        inner.entries.push(url.to_string());
        inner.index = keep;
    }

    fn replace(&self, url: &str) {
        let mut inner = self.inner.borrow_mut();
        let index = inner.index;
        inner.entries[index] = url.to_string();
    }

    fn subscribe(&self, listener: HistoryListener) -> ListenerId {
        let mut inner = self.inner.borrow_mut();
        let id = ListenerId(inner.next_listener);
        inner.next_listener += 1;
        inner.listeners.insert(id, listener);
        id
    }

    fn unsubscribe(&self, id: ListenerId) {
        self.inner.borrow_mut().listeners.shift_remove(&id);
    }
}

impl fmt::Debug for MemoryHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("MemoryHistory")
            .field("entries", &inner.entries)
            .field("index", &inner.index)
            .field("listeners", &inner.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn push_truncates_forward_entries() {
        let history = MemoryHistory::new("/");
        history.push("/a");
        history.push("/b");
        assert!(history.back());
        history.push("/c");

        assert_eq!(history.current(), "/c");
        assert_eq!(history.len(), 3);
        assert!(!history.forward());
    }

    #[test]
    fn back_notifies_listeners_but_push_does_not() {
        let history = MemoryHistory::new("/");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        let id = history.subscribe(Rc::new(move |url: &str| s.borrow_mut().push(url.to_string())));

        history.push("/next");
        assert!(seen.borrow().is_empty());

        assert!(history.back());
        assert_eq!(*seen.borrow(), vec!["/"]);
        assert!(!history.back());

        history.unsubscribe(id);
        assert_eq!(history.listener_count(), 0);
    }
}
