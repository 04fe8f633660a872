//! Identity types for the reactive graph.
//!
//! A subscriber is any computation that re-runs when its sources change
//! (effects, and the internal effect behind every memo). A source is
//! anything a subscriber can read from (signals).

use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a subscriber.
///
/// Each effect gets a unique ID when created. The ID is what signals store
/// in their subscriber sets, so a signal never keeps an effect alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a source (signal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(u64);

impl SourceId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::new()
    }
}

/// Something a subscriber can depend on.
///
/// Effects keep a weak list of the sources they read during their last run
/// so they can detach from all of them before the next run.
pub(crate) trait Source {
    fn source_id(&self) -> SourceId;

    /// Drop `subscriber` from this source's subscriber set.
    fn unsubscribe(&self, subscriber: SubscriberId);
}
