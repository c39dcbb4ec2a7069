#![forbid(unsafe_code)]

//! Fan-in of per-section streams into one table stream.
//!
//! [`merge_sections`] subscribes to `N` section streams and exposes a single
//! [`TableStream`]. Every subscriber to the table stream first receives a
//! synthetic [`Mutation::Insert`] laying out `N` placeholder sections, then
//! one [`Mutation::Update`] per section payload, addressed to the index of
//! the stream that produced it.
//!
//! # Invariants
//!
//! 1. The placeholder batch reaches each subscriber before any update.
//! 2. Payloads produced before the first subscriber arrives are buffered and
//!    handed to that subscriber, in arrival order, right after its prefix.
//! 3. Deliveries go through one queue. A mutation emitted while another is
//!    being delivered (a consumer feeding a source from its callback) is
//!    queued and delivered after the current one completes.
//! 4. Each queued delivery remembers its recipients at enqueue time, so a
//!    late subscriber never sees updates enqueued before its prefix.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use rowsync_core::{
    IndexSet, Mutation, SectionMetadata, SectionPayload, TableMutation, WindowedMutation,
};
use tracing::{debug, trace};

use crate::reactive::stream::{Callback, MutationStream, Subscription, SubscriptionScope};

struct Delivery<R> {
    recipients: Vec<Weak<Callback<TableMutation<R>>>>,
    mutation: TableMutation<R>,
}

struct MergeInner<R> {
    section_count: usize,
    subscribers: Vec<Weak<Callback<TableMutation<R>>>>,
    backlog: Vec<TableMutation<R>>,
    primed: bool,
    queue: VecDeque<Delivery<R>>,
    delivering: bool,
    delivered: u64,
}

impl<R> MergeInner<R> {
    fn new(section_count: usize) -> Self {
        Self {
            section_count,
            subscribers: Vec::new(),
            backlog: Vec::new(),
            primed: false,
            queue: VecDeque::new(),
            delivering: false,
            delivered: 0,
        }
    }
}

/// Resets the delivering flag even if a subscriber panics.
struct DeliveringGuard<'a, R> {
    inner: &'a RefCell<MergeInner<R>>,
}

impl<R> Drop for DeliveringGuard<'_, R> {
    fn drop(&mut self) {
        self.inner.borrow_mut().delivering = false;
    }
}

/// A merged, whole-table mutation stream.
///
/// Holds its input streams and its subscriptions to them; dropping every
/// handle disconnects the merge.
pub struct TableStream<R> {
    inner: Rc<RefCell<MergeInner<R>>>,
    _sources: Rc<SubscriptionScope>,
    _inputs: Rc<[MutationStream<SectionPayload<R>>]>,
}

impl<R> Clone for TableStream<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            _sources: Rc::clone(&self._sources),
            _inputs: Rc::clone(&self._inputs),
        }
    }
}

impl<R> std::fmt::Debug for TableStream<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("TableStream")
            .field("sections", &inner.section_count)
            .field("subscribers", &inner.subscribers.len())
            .field("backlog", &inner.backlog.len())
            .field("queued", &inner.queue.len())
            .field("delivered", &inner.delivered)
            .finish()
    }
}

impl<R: 'static> TableStream<R> {
    /// Number of sections, one per input stream.
    #[must_use]
    pub fn section_count(&self) -> usize {
        self.inner.borrow().section_count
    }

    /// Updates waiting for the first subscriber.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.inner.borrow().backlog.len()
    }

    /// Mutations handed out so far (one per delivery, regardless of
    /// recipient count).
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.inner.borrow().delivered
    }

    /// Subscribe to the merged stream.
    ///
    /// The callback receives the placeholder prefix (and, for the first
    /// subscriber, any buffered updates) before this returns.
    pub fn subscribe(&self, callback: impl Fn(&TableMutation<R>) + 'static) -> Subscription {
        let callback: Rc<Callback<TableMutation<R>>> = Rc::new(callback);
        {
            let mut state = self.inner.borrow_mut();
            state.subscribers.push(Rc::downgrade(&callback));
            let prefix = placeholder_insert(state.section_count);
            state.queue.push_back(Delivery {
                recipients: vec![Rc::downgrade(&callback)],
                mutation: prefix,
            });
            if !state.primed {
                state.primed = true;
                let backlog = std::mem::take(&mut state.backlog);
                debug!(
                    sections = state.section_count,
                    buffered = backlog.len(),
                    "first subscriber on merged table stream"
                );
                for mutation in backlog {
                    state.queue.push_back(Delivery {
                        recipients: vec![Rc::downgrade(&callback)],
                        mutation,
                    });
                }
            }
        }
        drain(&self.inner);
        Subscription::new(callback)
    }
}

fn placeholder_insert<R>(count: usize) -> TableMutation<R> {
    WindowedMutation::new(
        Mutation::Insert {
            indices: IndexSet::from(0..count),
            values: (0..count).map(|_| SectionPayload::placeholder()).collect(),
        },
        0,
        count,
    )
}

fn push_update<R>(inner: &RefCell<MergeInner<R>>, section: usize, payload: SectionPayload<R>) {
    {
        let mut state = inner.borrow_mut();
        let animated = payload.rows.animated;
        let mutation = WindowedMutation::new(
            Mutation::Update {
                indices: IndexSet::single(section),
                values: vec![payload],
            },
            0,
            state.section_count,
        )
        .with_animated(animated);

        if !state.primed {
            trace!(section, "buffering section update until first subscriber");
            state.backlog.push(mutation);
            return;
        }
        state.subscribers.retain(|w| w.strong_count() > 0);
        let recipients = state.subscribers.clone();
        state.queue.push_back(Delivery {
            recipients,
            mutation,
        });
    }
    drain(inner);
}

fn drain<R>(inner: &RefCell<MergeInner<R>>) {
    {
        let mut state = inner.borrow_mut();
        if state.delivering {
            return;
        }
        state.delivering = true;
    }
    let _guard = DeliveringGuard { inner };
    loop {
        let next = inner.borrow_mut().queue.pop_front();
        let Some(delivery) = next else {
            break;
        };
        trace!(
            kind = %delivery.mutation.mutation.kind(),
            recipients = delivery.recipients.len(),
            "delivering table mutation"
        );
        for recipient in delivery.recipients.iter().filter_map(Weak::upgrade) {
            recipient(&delivery.mutation);
        }
        inner.borrow_mut().delivered += 1;
    }
}

/// Merge per-section payload streams into one table stream. Stream `i`
/// feeds section `i`.
pub fn merge_sections<R: Clone + 'static>(
    sources: impl IntoIterator<Item = MutationStream<SectionPayload<R>>>,
) -> TableStream<R> {
    let inputs: Vec<_> = sources.into_iter().collect();
    let inner = Rc::new(RefCell::new(MergeInner::new(inputs.len())));
    let mut scope = SubscriptionScope::new();
    for (section, source) in inputs.iter().enumerate() {
        let weak = Rc::downgrade(&inner);
        scope.subscribe(source, move |payload: &SectionPayload<R>| {
            if let Some(inner) = weak.upgrade() {
                push_update(&inner, section, payload.clone());
            }
        });
    }
    debug!(sections = inputs.len(), "merged section streams");
    TableStream {
        inner,
        _sources: Rc::new(scope),
        _inputs: Rc::from(inputs),
    }
}

/// A table with one implicit, header-less section fed by `rows`.
pub fn single_section<R: Clone + 'static>(
    rows: &MutationStream<WindowedMutation<R>>,
) -> TableStream<R> {
    merge_sections([rows.sectioned(SectionMetadata::default())])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowsync_core::{MutationKind, TableState};
    use std::cell::Cell;

    type Log = Rc<RefCell<Vec<TableMutation<char>>>>;

    fn record(stream: &TableStream<char>) -> (Log, Subscription) {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let sub = stream.subscribe(move |m| sink.borrow_mut().push(m.clone()));
        (log, sub)
    }

    fn row_payload(mutation: Mutation<char>, count: usize) -> SectionPayload<char> {
        SectionPayload::rows_only(WindowedMutation::new(mutation, 0, count))
    }

    #[test]
    fn prefix_precedes_updates() {
        let sources: Vec<MutationStream<SectionPayload<char>>> =
            (0..3).map(|_| MutationStream::new()).collect();
        let table = merge_sections(sources.clone());
        let (log, _sub) = record(&table);

        sources[1].emit(row_payload(Mutation::insert_at(0, 'a'), 1));

        let log = log.borrow();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].mutation.kind(), MutationKind::Insert);
        assert_eq!(log[0].mutation.values().len(), 3);
        assert_eq!(log[0].global_count, 3);
        assert_eq!(log[1].mutation.kind(), MutationKind::Update);
        assert_eq!(
            log[1].mutation.indices().and_then(IndexSet::first),
            Some(1)
        );
    }

    #[test]
    fn updates_before_subscribe_are_buffered() {
        let sources: Vec<MutationStream<SectionPayload<char>>> =
            (0..3).map(|_| MutationStream::new()).collect();
        let table = merge_sections(sources.clone());
        sources[2].emit(row_payload(Mutation::insert_at(0, 'z'), 1));
        assert_eq!(table.buffered(), 1);

        let (log, _sub) = record(&table);
        let log = log.borrow();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].mutation.kind(), MutationKind::Insert);
        assert_eq!(
            log[1].mutation.indices().and_then(IndexSet::first),
            Some(2)
        );
        assert_eq!(table.buffered(), 0);
    }

    #[test]
    fn late_subscriber_gets_its_own_prefix_only() {
        let source = MutationStream::new();
        let table = merge_sections([source.clone()]);
        let (first, _a) = record(&table);
        source.emit(row_payload(Mutation::insert_at(0, 'a'), 1));
        let (second, _b) = record(&table);
        source.emit(row_payload(Mutation::insert_at(1, 'b'), 2));

        assert_eq!(first.borrow().len(), 3);
        let second = second.borrow();
        assert_eq!(second.len(), 2);
        assert_eq!(second[0].mutation.kind(), MutationKind::Insert);
    }

    #[test]
    fn reentrant_emission_is_queued() {
        let a = MutationStream::new();
        let b = MutationStream::new();
        let table = merge_sections([a.clone(), b.clone()]);
        let order = Rc::new(RefCell::new(Vec::new()));
        let fired = Rc::new(Cell::new(false));

        let order_sink = Rc::clone(&order);
        let feed = b.clone();
        let _sub = table.subscribe(move |m: &TableMutation<char>| {
            order_sink.borrow_mut().push(("start", m.mutation.kind()));
            if m.mutation.kind() == MutationKind::Update && !fired.replace(true) {
                feed.emit(row_payload(Mutation::insert_at(0, 'b'), 1));
            }
            order_sink.borrow_mut().push(("end", m.mutation.kind()));
        });
        a.emit(row_payload(Mutation::insert_at(0, 'a'), 1));

        let order = order.borrow();
        assert_eq!(
            *order,
            vec![
                ("start", MutationKind::Insert),
                ("end", MutationKind::Insert),
                ("start", MutationKind::Update),
                ("end", MutationKind::Update),
                ("start", MutationKind::Update),
                ("end", MutationKind::Update),
            ]
        );
        assert_eq!(table.delivered(), 3);
    }

    #[test]
    fn single_section_mirrors_flat_rows() {
        let rows = MutationStream::new();
        let windowed = rows.windowed();
        let table = single_section(&windowed);
        let mirror = Rc::new(RefCell::new(TableState::new()));
        let sink = Rc::clone(&mirror);
        let _sub = table.subscribe(move |m| {
            sink.borrow_mut().apply(m).expect("valid mutation");
        });

        rows.emit(Mutation::insert([0, 1], ['a', 'c']));
        rows.emit(Mutation::insert_at(1, 'b'));
        rows.emit(Mutation::delete_at(0));

        let mirror = mirror.borrow();
        assert_eq!(mirror.len(), 1);
        assert_eq!(mirror.sections()[0].rows(), &['b', 'c']);
        assert_eq!(mirror.sections()[0].row_count(), 2);
        assert!(mirror.sections()[0].metadata().is_empty());
    }

    #[test]
    fn animated_flag_follows_payload() {
        let source = MutationStream::new();
        let table = merge_sections([source.clone()]);
        let (log, _sub) = record(&table);
        source.emit(SectionPayload::rows_only(
            WindowedMutation::new(Mutation::insert_at(0, 'q'), 0, 1).with_animated(false),
        ));
        assert!(!log.borrow()[1].animated);
    }

    proptest::proptest! {
        #[test]
        fn prefix_first_then_emission_order(
            sections in 1usize..6,
            emits in proptest::collection::vec((0usize..6, proptest::bool::ANY), 0..24),
        ) {
            let sources: Vec<MutationStream<SectionPayload<char>>> =
                (0..sections).map(|_| MutationStream::new()).collect();
            let table = merge_sections(sources.clone());
            let mut expected = Vec::new();
            let mut subscribed = None;
            for (i, (source, subscribe_now)) in emits.iter().enumerate() {
                if *subscribe_now && subscribed.is_none() {
                    subscribed = Some(record(&table));
                }
                let section = source % sections;
                let value = char::from(b'a' + (i % 26) as u8);
                sources[section].emit(row_payload(Mutation::reload([value]), 1));
                expected.push(section);
            }
            let (log, _sub) = subscribed.unwrap_or_else(|| record(&table));
            let log = log.borrow();
            proptest::prop_assert_eq!(log[0].mutation.kind(), MutationKind::Insert);
            proptest::prop_assert_eq!(log[0].mutation.values().len(), sections);
            let targets: Vec<usize> = log[1..]
                .iter()
                .filter_map(|m| m.mutation.indices().and_then(IndexSet::first))
                .collect();
            proptest::prop_assert_eq!(targets, expected);
        }
    }

    #[test]
    fn dropping_table_disconnects_sources() {
        let source = MutationStream::<SectionPayload<char>>::new();
        let table = merge_sections([source.clone()]);
        assert_eq!(source.subscriber_count(), 1);
        drop(table);
        assert_eq!(source.subscriber_count(), 0);
    }
}
