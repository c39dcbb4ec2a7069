#![forbid(unsafe_code)]

//! Push-based streams carrying mutation values.
//!
//! A [`MutationStream<T>`] is a hot, single-threaded event source: every
//! [`emit`](MutationStream::emit) is delivered synchronously to the callbacks
//! subscribed at that moment, in registration order. Values are handed out
//! by reference; they are immutable once emitted.
//!
//! Derived streams ([`map`](MutationStream::map),
//! [`scan`](MutationStream::scan), [`windowed`](MutationStream::windowed),
//! [`sectioned`](MutationStream::sectioned)) keep their upstream alive, so a
//! chain stays connected as long as its last handle lives.
//!
//! # Invariants
//!
//! 1. Subscribers are notified in registration order.
//! 2. Subscribers are held weakly; dropping a [`Subscription`] removes the
//!    callback before the next emission.
//! 3. No internal borrow is held while callbacks run, so callbacks may emit
//!    or subscribe re-entrantly.
//! 4. `scan` threads its accumulator explicitly: the step function receives
//!    the previous accumulator by value and returns the next one alongside
//!    its output.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use rowsync_core::{Mutation, SectionMetadata, SectionPayload, Tally, WindowedMutation};

pub(crate) type Callback<T> = dyn Fn(&T);

struct StreamInner<T> {
    subscribers: Vec<Weak<Callback<T>>>,
    emitted: u64,
}

/// Keeps a derived stream's parent and its subscription to it alive.
struct Upstream {
    _subscription: Subscription,
    _parent: Box<dyn Any>,
}

/// A hot, push-based stream of `T` values.
pub struct MutationStream<T> {
    inner: Rc<RefCell<StreamInner<T>>>,
    upstream: Option<Rc<Upstream>>,
}

impl<T> Clone for MutationStream<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            upstream: self.upstream.clone(),
        }
    }
}

impl<T: 'static> Default for MutationStream<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for MutationStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("MutationStream")
            .field("subscribers", &inner.subscribers.len())
            .field("emitted", &inner.emitted)
            .field("derived", &self.upstream.is_some())
            .finish()
    }
}

impl<T: 'static> MutationStream<T> {
    /// Create a stream with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(StreamInner {
                subscribers: Vec::new(),
                emitted: 0,
            })),
            upstream: None,
        }
    }

    /// Deliver `value` to every live subscriber.
    pub fn emit(&self, value: T) {
        let live: Vec<Rc<Callback<T>>> = {
            let mut inner = self.inner.borrow_mut();
            inner.emitted += 1;
            inner.subscribers.retain(|w| w.strong_count() > 0);
            inner.subscribers.iter().filter_map(Weak::upgrade).collect()
        };
        for callback in live {
            callback(&value);
        }
    }

    /// Register `callback` for every future emission.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let callback: Rc<Callback<T>> = Rc::new(callback);
        self.inner
            .borrow_mut()
            .subscribers
            .push(Rc::downgrade(&callback));
        Subscription::new(callback)
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .borrow()
            .subscribers
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Number of values emitted so far.
    #[must_use]
    pub fn emitted(&self) -> u64 {
        self.inner.borrow().emitted
    }

    /// A handle that emits into this stream without owning its upstream.
    fn sink(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            upstream: None,
        }
    }

    fn derive<U: 'static>(
        &self,
        forward: impl Fn(&T, &MutationStream<U>) + 'static,
    ) -> MutationStream<U> {
        let out = MutationStream::<U>::new();
        let sink = out.sink();
        let subscription = self.subscribe(move |value| forward(value, &sink));
        MutationStream {
            inner: out.inner,
            upstream: Some(Rc::new(Upstream {
                _subscription: subscription,
                _parent: Box::new(self.clone()),
            })),
        }
    }

    /// A stream of `f` applied to every value.
    #[must_use]
    pub fn map<U: 'static>(&self, f: impl Fn(&T) -> U + 'static) -> MutationStream<U> {
        self.derive(move |value, sink| sink.emit(f(value)))
    }

    /// A stream folding every value through `step`, which takes the previous
    /// accumulator by value and returns the next one with the output.
    #[must_use]
    pub fn scan<A: 'static, U: 'static>(
        &self,
        init: A,
        step: impl Fn(A, &T) -> (A, U) + 'static,
    ) -> MutationStream<U> {
        let acc = Cell::new(Some(init));
        self.derive(move |value, sink| {
            // Empty only while `step` itself re-enters this upstream.
            let Some(prev) = acc.take() else {
                return;
            };
            let (next, out) = step(prev, value);
            acc.set(Some(next));
            sink.emit(out);
        })
    }
}

impl<T: Clone + 'static> MutationStream<Mutation<T>> {
    /// Thread the window tally through the stream, starting from an empty
    /// sequence.
    #[must_use]
    pub fn windowed(&self) -> MutationStream<WindowedMutation<T>> {
        self.windowed_from(Tally::default())
    }

    /// Thread the window tally through the stream, starting from `start`.
    #[must_use]
    pub fn windowed_from(&self, start: Tally) -> MutationStream<WindowedMutation<T>> {
        self.scan(start, |tally, mutation| tally.wrap(mutation.clone()))
    }
}

impl<R: Clone + 'static> MutationStream<WindowedMutation<R>> {
    /// Wrap row mutations as section payloads. The first payload carries
    /// `metadata`; later ones leave it unchanged.
    #[must_use]
    pub fn sectioned(&self, metadata: SectionMetadata) -> MutationStream<SectionPayload<R>> {
        self.scan(Some(metadata), |pending, rows| {
            let payload = SectionPayload {
                metadata: pending,
                rows: rows.clone(),
            };
            (None, payload)
        })
    }
}

/// RAII guard for a stream callback. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    _callback: Box<dyn Any>,
}

impl Subscription {
    pub(crate) fn new<T: 'static>(callback: Rc<Callback<T>>) -> Self {
        Self {
            _callback: Box::new(callback),
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// Collects subscriptions for a logical scope (a widget, a merged table).
///
/// # Invariants
///
/// 1. Subscriptions are released in reverse registration order on drop.
/// 2. After drop, no callbacks from this scope will fire.
/// 3. `clear()` releases everything immediately; the scope stays reusable.
#[derive(Default)]
pub struct SubscriptionScope {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionScope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `subscription` alive until the scope is dropped or cleared.
    pub fn hold(&mut self, subscription: Subscription) -> &mut Self {
        self.subscriptions.push(subscription);
        self
    }

    /// Subscribe to `stream` within this scope.
    pub fn subscribe<T: 'static>(
        &mut self,
        stream: &MutationStream<T>,
        callback: impl Fn(&T) + 'static,
    ) -> &mut Self {
        self.hold(stream.subscribe(callback))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Release every subscription, newest first.
    pub fn clear(&mut self) {
        while self.subscriptions.pop().is_some() {}
    }
}

impl Drop for SubscriptionScope {
    fn drop(&mut self) {
        self.clear();
    }
}

impl std::fmt::Debug for SubscriptionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionScope")
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}
