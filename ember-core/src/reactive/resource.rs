//! Async Resources
//!
//! A resource wraps a cancellable asynchronous fetch as three signals:
//! `data`, `loading` and `error`.
//!
//! At most one fetch is live per resource. Every [`Resource::refetch`] mints
//! a fresh [`CancelToken`] and cancels the previous one; a fetch whose token
//! was cancelled settles without writing anything, so a slow stale response
//! can never overwrite a newer one.
//!
//! Fetches run as local tasks (`tokio::task::spawn_local`), so resources must
//! be created and refetched from inside a `tokio::task::LocalSet`.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures_util::future::{FutureExt, LocalBoxFuture};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::debug;

use super::effect::Effect;
use super::runtime::{Runtime, WeakRuntime};
use super::signal::{ReadSignal, Signal};

/// A flag shared between a resource and one in-flight fetch.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Rc<CancelInner>,
}

#[derive(Default)]
struct CancelInner {
    cancelled: Cell<bool>,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the fetch as superseded. Idempotent.
    pub fn cancel(&self) {
        if !self.inner.cancelled.replace(true) {
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.get()
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

type Fetcher<T, E> = Box<dyn Fn(CancelToken) -> LocalBoxFuture<'static, Result<T, E>>>;

/// An asynchronous value exposed as signals.
pub struct Resource<T: 'static, E: 'static> {
    inner: Rc<ResourceInner<T, E>>,
}

struct ResourceInner<T: 'static, E: 'static> {
    data: Signal<Option<T>>,
    loading: Signal<bool>,
    error: Signal<Option<E>>,
    active: RefCell<Option<CancelToken>>,
    fetcher: Fetcher<T, E>,
    runtime: WeakRuntime,
    source_effect: RefCell<Option<Effect>>,
    fetches: Cell<usize>,
}

impl Runtime {
    /// Create a resource that fetches once, starting on the next scheduling
    /// tick rather than synchronously.
    ///
    /// # Panics
    ///
    /// Panics when called outside a `tokio::task::LocalSet`.
    pub fn create_resource<T, E, F, Fut>(&self, fetcher: F, initial: Option<T>) -> Resource<T, E>
    where
        T: Clone + PartialEq + 'static,
        E: Clone + PartialEq + 'static,
        F: Fn(CancelToken) -> Fut + 'static,
        Fut: Future<Output = Result<T, E>> + 'static,
    {
        let resource = self.new_resource(Box::new(move |token| fetcher(token).boxed_local()), initial);

        let weak = Rc::downgrade(&resource.inner);
        tokio::task::spawn_local(async move {
            if let Some(inner) = weak.upgrade() {
                drop(Resource { inner }.refetch());
            }
        });
        resource
    }

    /// Create a resource that refetches whenever `source` changes.
    ///
    /// The first fetch starts synchronously, before the source is tracked.
    /// `fetcher` receives the source value current at the time of the fetch.
    ///
    /// # Panics
    ///
    /// Panics when called outside a `tokio::task::LocalSet`. A later source
    /// change outside one is contained by the tracking effect and leaves the
    /// resource as it was.
    pub fn create_resource_with<S, T, E, Src, F, Fut>(
        &self,
        source: Src,
        fetcher: F,
        initial: Option<T>,
    ) -> Resource<T, E>
    where
        S: 'static,
        T: Clone + PartialEq + 'static,
        E: Clone + PartialEq + 'static,
        Src: Fn() -> S + 'static,
        F: Fn(S, CancelToken) -> Fut + 'static,
        Fut: Future<Output = Result<T, E>> + 'static,
    {
        let source = Rc::new(source);
        let fetch_source = source.clone();
        let resource = self.new_resource(
            Box::new(move |token| fetcher((*fetch_source)(), token).boxed_local()),
            initial,
        );

        drop(resource.refetch());

        let weak = Rc::downgrade(&resource.inner);
        let mut tracked = false;
        let effect = self.create_effect(move || {
            (*source)();
            if !std::mem::replace(&mut tracked, true) {
                return;
            }
            if let Some(inner) = weak.upgrade() {
                drop(Resource { inner }.refetch());
            }
        });
        *resource.inner.source_effect.borrow_mut() = Some(effect);
        resource
    }

    fn new_resource<T, E>(&self, fetcher: Fetcher<T, E>, initial: Option<T>) -> Resource<T, E>
    where
        T: Clone + PartialEq + 'static,
        E: Clone + PartialEq + 'static,
    {
        Resource {
            inner: Rc::new(ResourceInner {
                data: self.create_signal(initial),
                loading: self.create_signal(false),
                error: self.create_signal(None),
                active: RefCell::new(None),
                fetcher,
                runtime: self.downgrade(),
                source_effect: RefCell::new(None),
                fetches: Cell::new(0),
            }),
        }
    }
}

impl<T, E> Resource<T, E>
where
    T: Clone + PartialEq + 'static,
    E: Clone + PartialEq + 'static,
{
    /// Start a new fetch, superseding any fetch still in flight.
    ///
    /// Failures land in [`error`](Self::error); they are never returned
    /// here. The handle resolves once the fetch has settled.
    ///
    /// # Panics
    ///
    /// Panics outside a `tokio::task::LocalSet`, before any state changes.
    pub fn refetch(&self) -> JoinHandle<()> {
        let inner = &self.inner;
        let runtime = inner.runtime.upgrade();
        let token = CancelToken::new();
        let future = match &runtime {
            Some(runtime) => runtime.untrack(|| (inner.fetcher)(token.clone())),
            None => (inner.fetcher)(token.clone()),
        };

        // Local tasks are not polled before this returns.
        let task_inner = Rc::clone(inner);
        let task_token = token.clone();
        let handle = tokio::task::spawn_local(async move {
            let result = future.await;
            if task_token.is_cancelled() {
                debug!("discarding result of cancelled fetch");
                return;
            }
            task_inner.settle(result);
            task_inner.active.borrow_mut().take();
        });

        if let Some(previous) = inner.active.replace(Some(token)) {
            debug!("cancelling superseded fetch");
            previous.cancel();
        }
        inner.fetches.set(inner.fetches.get() + 1);
        let start = || {
            inner.loading.set(true);
            inner.error.set(None);
        };
        match &runtime {
            Some(runtime) => runtime.batch(start),
            None => start(),
        }
        handle
    }

    /// Cancel the outstanding fetch and stop following the source.
    ///
    /// The last known data is kept.
    pub fn dispose(&self) {
        if let Some(token) = self.inner.active.borrow_mut().take() {
            token.cancel();
        }
        if let Some(effect) = self.inner.source_effect.borrow_mut().take() {
            effect.dispose();
        }
        self.inner.loading.set(false);
    }

    pub fn data(&self) -> Option<T> {
        self.inner.data.get()
    }

    pub fn loading(&self) -> bool {
        self.inner.loading.get()
    }

    pub fn error(&self) -> Option<E> {
        self.inner.error.get()
    }

    pub fn data_signal(&self) -> ReadSignal<Option<T>> {
        self.inner.data.read_only()
    }

    pub fn loading_signal(&self) -> ReadSignal<bool> {
        self.inner.loading.read_only()
    }

    pub fn error_signal(&self) -> ReadSignal<Option<E>> {
        self.inner.error.read_only()
    }

    /// Nothing fetched, nothing in flight.
    pub fn idle(&self) -> bool {
        !self.loading() && self.error_is_none() && self.inner.data.with(Option::is_none)
    }

    /// Settled with data and no error.
    pub fn success(&self) -> bool {
        !self.loading() && self.error_is_none() && self.inner.data.with(Option::is_some)
    }

    pub fn has_error(&self) -> bool {
        !self.error_is_none()
    }

    /// Number of fetches started so far.
    pub fn fetch_count(&self) -> usize {
        self.inner.fetches.get()
    }

    fn error_is_none(&self) -> bool {
        self.inner.error.with(Option::is_none)
    }
}

impl<T, E> ResourceInner<T, E>
where
    T: Clone + PartialEq + 'static,
    E: Clone + PartialEq + 'static,
{
    fn settle(&self, result: Result<T, E>) {
        let apply = || match result {
            Ok(value) => {
                self.data.set(Some(value));
                self.loading.set(false);
            }
            Err(error) => {
                debug!("fetch failed; recording error");
                self.error.set(Some(error));
                self.loading.set(false);
            }
        };
        match self.runtime.upgrade() {
            Some(runtime) => runtime.batch(apply),
            None => apply(),
        }
    }
}

impl<T: 'static, E: 'static> Clone for Resource<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use tokio::sync::oneshot;
    use tokio::task::LocalSet;

    type Reply = oneshot::Receiver<Result<i32, String>>;

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    fn queued_fetcher(
        queue: Rc<RefCell<VecDeque<Reply>>>,
    ) -> impl Fn(CancelToken) -> LocalBoxFuture<'static, Result<i32, String>> {
        move |_token| {
            let reply = queue.borrow_mut().pop_front();
            async move {
                match reply {
                    Some(reply) => reply.await.unwrap_or_else(|_| Err("sender dropped".into())),
                    None => Err("no reply queued".into()),
                }
            }
            .boxed_local()
        }
    }

    #[tokio::test]
    async fn stale_response_does_not_overwrite_newer_one() {
        LocalSet::new()
            .run_until(async {
                let rt = Runtime::new();
                let (tx_a, rx_a) = oneshot::channel();
                let (tx_b, rx_b) = oneshot::channel();
                let queue = Rc::new(RefCell::new(VecDeque::from([rx_a, rx_b])));
                let fetch = queued_fetcher(queue);

                let trigger = rt.create_signal(0);
                let t = trigger.clone();
                let resource = rt.create_resource_with(move || t.get(), move |_, token| fetch(token), None);
                assert!(resource.loading());

                let b = resource.refetch();
                tx_b.send(Ok(2)).unwrap();
                b.await.unwrap();
                assert_eq!(resource.data(), Some(2));
                assert!(!resource.loading());

                let _ = tx_a.send(Ok(1));
                settle().await;
                assert_eq!(resource.data(), Some(2));
                assert_eq!(resource.fetch_count(), 2);
                assert!(resource.success());
            })
            .await;
    }

    #[tokio::test]
    async fn sourceless_resource_starts_on_next_tick() {
        LocalSet::new()
            .run_until(async {
                let rt = Runtime::new();
                let (tx, rx) = oneshot::channel();
                let queue = Rc::new(RefCell::new(VecDeque::from([rx])));

                let resource = rt.create_resource(queued_fetcher(queue), None);
                assert_eq!(resource.fetch_count(), 0);
                assert!(resource.idle());

                settle().await;
                assert_eq!(resource.fetch_count(), 1);
                assert!(resource.loading());

                tx.send(Ok(7)).unwrap();
                settle().await;
                assert_eq!(resource.data(), Some(7));
                assert!(resource.success());
            })
            .await;
    }

    #[tokio::test]
    async fn rejection_is_captured_not_thrown() {
        LocalSet::new()
            .run_until(async {
                let rt = Runtime::new();
                let resource: Resource<i32, String> = rt.create_resource(
                    |_| async { Err::<i32, String>("offline".to_string()) },
                    Some(1),
                );

                settle().await;
                assert!(resource.has_error());
                assert_eq!(resource.error(), Some("offline".to_string()));
                assert_eq!(resource.data(), Some(1));
                assert!(!resource.loading());

                // A new fetch clears the previous error while loading.
                let _pending = resource.refetch();
                assert!(!resource.has_error());
            })
            .await;
    }

    #[tokio::test]
    async fn source_change_refetches_with_new_value() {
        LocalSet::new()
            .run_until(async {
                let rt = Runtime::new();
                let user = rt.create_signal(1);

                let u = user.clone();
                let resource: Resource<i32, String> = rt.create_resource_with(
                    move || u.get(),
                    |id, _| async move { Ok(id * 10) },
                    None,
                );

                settle().await;
                assert_eq!(resource.data(), Some(10));

                user.set(4);
                settle().await;
                assert_eq!(resource.data(), Some(40));
                assert_eq!(resource.fetch_count(), 2);
            })
            .await;
    }

    #[tokio::test]
    async fn dispose_cancels_without_touching_data() {
        LocalSet::new()
            .run_until(async {
                let rt = Runtime::new();
                let (tx, rx) = oneshot::channel();
                let queue = Rc::new(RefCell::new(VecDeque::from([rx])));
                let fetch = queued_fetcher(queue);

                let trigger = rt.create_signal(0);
                let t = trigger.clone();
                let resource =
                    rt.create_resource_with(move || t.get(), move |_, token| fetch(token), Some(3));

                resource.dispose();
                let _ = tx.send(Ok(99));
                settle().await;

                assert_eq!(resource.data(), Some(3));
                assert!(!resource.loading());

                trigger.set(1);
                assert_eq!(resource.fetch_count(), 1);
            })
            .await;
    }

    #[test]
    fn creating_outside_a_local_set_panics_without_leaking() {
        let rt = Runtime::new();
        let source = rt.create_signal(1);

        let s = source.clone();
        let created = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            rt.create_resource_with(
                move || s.get(),
                |id, _| async move { Ok::<i32, String>(id) },
                None,
            )
        }));

        assert!(created.is_err());
        assert_eq!(rt.effect_count(), 0);
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn source_change_outside_a_local_set_leaves_state_alone() {
        let tokio_rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let rt = Runtime::new();
        let user = rt.create_signal(1);

        let u = user.clone();
        let resource: Resource<i32, String> = tokio_rt.block_on(
            LocalSet::new().run_until(async {
                let resource = rt.create_resource_with(
                    move || u.get(),
                    |id, _| async move { Ok(id * 10) },
                    None,
                );
                settle().await;
                resource
            }),
        );
        assert_eq!(resource.data(), Some(10));

        // The refetch panics inside the tracking effect, which contains it.
        user.set(2);
        assert!(!resource.loading());
        assert_eq!(resource.fetch_count(), 1);
        assert_eq!(resource.data(), Some(10));
        assert!(resource.success());
    }

    #[tokio::test]
    async fn cancel_token_wakes_waiters() {
        LocalSet::new()
            .run_until(async {
                let token = CancelToken::new();
                let waiter = token.clone();
                let handle = tokio::task::spawn_local(async move {
                    waiter.cancelled().await;
                    true
                });

                settle().await;
                token.cancel();
                token.cancel();
                assert!(handle.await.unwrap());
                assert!(token.is_cancelled());
            })
            .await;
    }
}
