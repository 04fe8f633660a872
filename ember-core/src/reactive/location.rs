//! Location signal.
//!
//! One shared signal per runtime exposes the current URL parts. However many
//! call sites ask for it, the runtime holds a single history subscription,
//! released when the last [`LocationHandle`] is dropped.

use std::rc::Rc;

use tracing::debug;

use super::runtime::{Runtime, WeakRuntime};
use super::signal::{ReadSignal, Signal};
use crate::dom::history::{History, ListenerId};

/// The parts of a URL the UI routes on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LocationParts {
    /// Always starts with `/`.
    pub pathname: String,
    /// Empty, or starts with `?`.
    pub search: String,
    /// Empty, or starts with `#`.
    pub hash: String,
}

impl LocationParts {
    /// Split an absolute or root-relative URL.
    pub fn parse(url: &str) -> Self {
        let rest = match url.split_once("://") {
            Some((_, after_scheme)) => after_scheme
                .find('/')
                .map_or("/", |slash| &after_scheme[slash..]),
            None => url,
        };

        let (rest, hash) = match rest.find('#') {
            Some(at) => (&rest[..at], &rest[at..]),
            None => (rest, ""),
        };
        let (path, search) = match rest.find('?') {
            Some(at) => (&rest[..at], &rest[at..]),
            None => (rest, ""),
        };

        let pathname = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };

        Self {
            pathname,
            search: if search == "?" { String::new() } else { search.to_string() },
            hash: if hash == "#" { String::new() } else { hash.to_string() },
        }
    }

    pub fn href(&self) -> String {
        format!("{}{}{}", self.pathname, self.search, self.hash)
    }
}

/// The runtime-owned singleton state.
pub(crate) struct LocationShared {
    signal: Signal<LocationParts>,
    history: Rc<dyn History>,
    listener: ListenerId,
    ref_count: usize,
}

impl Drop for LocationShared {
    fn drop(&mut self) {
        self.history.unsubscribe(self.listener);
        debug!("location subscription released");
    }
}

/// A counted reference to the runtime's location signal.
pub struct LocationHandle {
    runtime: WeakRuntime,
    signal: Signal<LocationParts>,
    history: Rc<dyn History>,
}

impl Runtime {
    /// Acquire the location signal, subscribing to `history` on first use.
    ///
    /// Later callers share the existing subscription; the `history` they
    /// pass is ignored while one is live.
    pub fn use_location(&self, history: Rc<dyn History>) -> LocationHandle {
        let mut slot = self.inner.location.borrow_mut();
        let shared = slot.get_or_insert_with(|| {
            let signal = self.create_signal(LocationParts::parse(&history.current()));
            let listener_signal = signal.clone();
            let listener = history.subscribe(Rc::new(move |url: &str| {
                listener_signal.set(LocationParts::parse(url));
            }));
            debug!("location subscription created");
            LocationShared {
                signal,
                history,
                listener,
                ref_count: 0,
            }
        });
        shared.ref_count += 1;

        LocationHandle {
            runtime: self.downgrade(),
            signal: shared.signal.clone(),
            history: shared.history.clone(),
        }
    }

    /// Live references to the location singleton.
    pub fn location_refs(&self) -> usize {
        self.inner
            .location
            .borrow()
            .as_ref()
            .map_or(0, |shared| shared.ref_count)
    }
}

impl LocationHandle {
    /// Current location, subscribing the running effect.
    pub fn get(&self) -> LocationParts {
        self.signal.get()
    }

    /// The shared read signal behind every handle.
    pub fn location(&self) -> ReadSignal<LocationParts> {
        self.signal.read_only()
    }

    /// Push `url` onto history and update the signal.
    pub fn navigate(&self, url: &str) {
        self.history.push(url);
        self.signal.set(LocationParts::parse(url));
    }

    /// Replace the current history entry and update the signal.
    pub fn replace(&self, url: &str) {
        self.history.replace(url);
        self.signal.set(LocationParts::parse(url));
    }
}

impl Clone for LocationHandle {
    fn clone(&self) -> Self {
        if let Some(runtime) = self.runtime.upgrade_inner() {
            if let Some(shared) = runtime.location.borrow_mut().as_mut() {
                shared.ref_count += 1;
            }
        }
        Self {
            runtime: self.runtime.clone(),
            signal: self.signal.clone(),
            history: self.history.clone(),
        }
    }
}

impl Drop for LocationHandle {
    fn drop(&mut self) {
        let Some(runtime) = self.runtime.upgrade_inner() else {
            return;
        };
        let mut slot = runtime.location.borrow_mut();
        let remaining = slot.as_mut().map(|shared| {
            shared.ref_count = shared.ref_count.saturating_sub(1);
            shared.ref_count
        });
        let released = if remaining == Some(0) { slot.take() } else { None };
        drop(slot);
        drop(released);
    }
}
