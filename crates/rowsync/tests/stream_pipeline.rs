//! End-to-end pipeline: producer streams, section merge, mirror binding.

#![cfg(feature = "runtime")]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rowsync::{
    ApplyError, ErrorPolicy, ListChange, MirrorBinding, MirrorConfig, MirrorPhase, Mutation,
    MutationKind, MutationStream, RowEdit, SectionMetadata, SectionPayload, TableMutation,
    TableUpdate, WindowedMutation, merge_sections, single_section,
};

type RowStream = MutationStream<Mutation<&'static str>>;
type PayloadStream = MutationStream<SectionPayload<&'static str>>;

fn sections(n: usize) -> (Vec<RowStream>, Vec<PayloadStream>) {
    let rows: Vec<RowStream> = (0..n).map(|_| MutationStream::new()).collect();
    let payloads = rows
        .iter()
        .enumerate()
        .map(|(i, r)| {
            r.windowed()
                .sectioned(SectionMetadata::new().with_header(format!("section {i}")))
        })
        .collect();
    (rows, payloads)
}

fn with_logging<T>(f: impl FnOnce() -> T) -> T {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("rowsync_runtime=trace"))
        .with_test_writer()
        .finish();
    tracing::subscriber::with_default(subscriber, f)
}

#[test]
fn placeholder_batch_precedes_early_updates() {
    let (rows, payloads) = sections(3);
    let table = merge_sections(payloads);

    // Section 2 reports before anyone listens.
    rows[2].emit(Mutation::insert_at(0, "late"));
    rows[0].emit(Mutation::insert_at(0, "first"));

    let log: Rc<RefCell<Vec<TableMutation<&'static str>>>> = Rc::default();
    let sink = Rc::clone(&log);
    let _sub = table.subscribe(move |m| sink.borrow_mut().push(m.clone()));

    let log = log.borrow();
    assert_eq!(log.len(), 3);
    assert_eq!(log[0].mutation.kind(), MutationKind::Insert);
    assert_eq!(log[0].mutation.values().len(), 3);
    assert!(
        log[0]
            .mutation
            .values()
            .iter()
            .all(|p| p.metadata.as_ref().is_some_and(SectionMetadata::is_empty))
    );
    let targets: Vec<_> = log[1..]
        .iter()
        .map(|m| m.mutation.indices().and_then(|s| s.first()))
        .collect();
    assert_eq!(targets, vec![Some(2), Some(0)]);
}

#[test]
fn mirror_tracks_three_sections() {
    with_logging(|| {
        let (rows, payloads) = sections(3);
        let table = merge_sections(payloads);
        let mirror = MirrorBinding::attach(&table, MirrorConfig::default());
        assert_eq!(mirror.phase(), MirrorPhase::Populated);
        assert_eq!(mirror.with_table(|t| t.len()), 3);

        rows[1].emit(Mutation::insert([0, 1], ["b0", "b1"]));
        rows[0].emit(Mutation::insert_at(0, "a0"));
        rows[1].emit(Mutation::move_to([1], 0));
        rows[2].emit(Mutation::reload(["c0", "c1", "c2"]));
        rows[2].emit(Mutation::delete([0, 2]));

        mirror.with_table(|t| {
            assert_eq!(t.sections()[0].rows(), &["a0"]);
            assert_eq!(t.sections()[1].rows(), &["b1", "b0"]);
            assert_eq!(t.sections()[2].rows(), &["c1"]);
            assert_eq!(t.sections()[2].row_count(), 1);
            assert_eq!(t.sections()[1].metadata().header(), Some("section 1"));
            assert!(t.window_consistent());
        });
        assert_eq!(mirror.applied(), 6);
    });
}

#[test]
fn reentrant_producer_is_serialized() {
    let (rows, payloads) = sections(2);
    let table = merge_sections(payloads);
    let depth = Rc::new(Cell::new(0usize));
    let max_depth = Rc::new(Cell::new(0usize));
    let echoed = Rc::new(Cell::new(false));

    let (d, m, e) = (Rc::clone(&depth), Rc::clone(&max_depth), Rc::clone(&echoed));
    let feed = rows[1].clone();
    let _sub = table.subscribe(move |mutation| {
        d.set(d.get() + 1);
        m.set(m.get().max(d.get()));
        if mutation.mutation.kind() == MutationKind::Update && !e.replace(true) {
            feed.emit(Mutation::insert_at(0, "echo"));
        }
        d.set(d.get() - 1);
    });
    let mirror = MirrorBinding::attach(&table, MirrorConfig::default());

    rows[0].emit(Mutation::insert_at(0, "origin"));

    assert_eq!(max_depth.get(), 1);
    mirror.with_table(|t| {
        assert_eq!(t.sections()[0].rows(), &["origin"]);
        assert_eq!(t.sections()[1].rows(), &["echo"]);
    });
}

#[test]
fn halt_policy_freezes_mirror() {
    with_logging(|| {
        let rows = MutationStream::new();
        let table = single_section(&rows.windowed());
        let mirror = MirrorBinding::attach(&table, MirrorConfig::default());

        rows.emit(Mutation::insert([0, 1], [1u8, 2]));
        rows.emit(Mutation::move_to([0, 1], 2));
        rows.emit(Mutation::insert_at(0, 0));

        assert_eq!(mirror.phase(), MirrorPhase::Halted);
        assert!(matches!(
            mirror.last_error().as_ref().map(ApplyError::root_cause),
            Some(ApplyError::DestinationOutOfBounds { destination: 2, len: 0 })
        ));
        mirror.with_table(|t| assert_eq!(t.sections()[0].rows(), &[1, 2]));
    });
}

#[test]
fn halted_mirror_does_not_affect_siblings() {
    let rows = MutationStream::new();
    let table = single_section(&rows.windowed());
    let strict = MirrorBinding::attach(&table, MirrorConfig::default());
    rows.emit(Mutation::delete_at(3));
    assert!(strict.is_halted());

    let fresh = MirrorBinding::attach(&table, MirrorConfig::default());
    rows.emit(Mutation::insert_at(0, 'x'));
    assert_eq!(fresh.phase(), MirrorPhase::Populated);
    fresh.with_table(|t| assert_eq!(t.sections()[0].rows(), &['x']));
    strict.with_table(|t| assert!(t.sections()[0].is_empty()));
}

#[test]
#[should_panic(expected = "table mutation could not be applied")]
fn panic_policy_propagates() {
    let rows = MutationStream::new();
    let table = single_section(&rows.windowed());
    let _mirror = MirrorBinding::attach(
        &table,
        MirrorConfig::default().with_error_policy(ErrorPolicy::Panic),
    );
    rows.emit(Mutation::update_at(0, 'x'));
}

#[test]
fn render_hook_gets_row_edits() {
    let rows = MutationStream::new();
    let table = single_section(&rows.windowed());
    let edits = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&edits);
    let _mirror = MirrorBinding::attach_with_render(
        &table,
        MirrorConfig::default(),
        move |update: &TableUpdate<'_, char>| {
            if !matches!(update.change, ListChange::Inserted(_)) {
                sink.borrow_mut().extend(update.change.row_edits());
            }
        },
    );

    rows.emit(Mutation::insert([0, 1, 2], ['a', 'b', 'c']));
    rows.emit(Mutation::move_to([2], 0));
    rows.emit(Mutation::update_at(1, 'A'));

    let edits = edits.borrow();
    assert!(edits.contains(&RowEdit::ReloadMetadata(0)));
    assert!(edits.iter().any(|e| matches!(e, RowEdit::Move { .. })));
    assert_eq!(edits.last().copied(), Some(RowEdit::Update(rowsync::IndexPath::new(0, 1))));
}

#[test]
fn scrolled_window_reports_offsets() {
    let rows = MutationStream::new();
    let table = single_section(&rows.windowed());
    let mirror = MirrorBinding::attach(&table, MirrorConfig::default());

    rows.emit(Mutation::reload([1, 2, 3, 4]));
    rows.emit(Mutation::scroll(2, [5, 6]));

    mirror.with_table(|t| {
        let section = &t.sections()[0];
        assert_eq!(section.rows(), &[3, 4, 5, 6]);
        assert_eq!(section.row_offset(), 2);
        assert_eq!(section.row_count(), 4);
    });
}

#[test]
fn dropping_mirror_stops_delivery() {
    let rows = MutationStream::new();
    let windowed = rows.windowed();
    let table = single_section(&windowed);
    let mirror = MirrorBinding::attach(&table, MirrorConfig::default());
    rows.emit(Mutation::insert_at(0, 1));
    let kept = mirror.snapshot();
    drop(mirror);
    rows.emit(Mutation::insert_at(1, 2));
    assert_eq!(kept.row_total(), 1);
    assert_eq!(table.delivered(), 3);
}

#[test]
fn hand_built_table_stream() {
    let stream = MutationStream::<TableMutation<u16>>::new();
    let mirror = MirrorBinding::attach(&stream, MirrorConfig::default());
    stream.emit(WindowedMutation::new(
        Mutation::reload([
            SectionPayload::filled(SectionMetadata::new().with_footer("end"), vec![1, 2]),
            SectionPayload::filled(SectionMetadata::new(), vec![3]),
        ]),
        0,
        2,
    ));
    stream.emit(WindowedMutation::new(Mutation::move_to([1], 0), 0, 2));
    mirror.with_table(|t| {
        assert_eq!(t.sections()[0].rows(), &[3]);
        assert_eq!(t.sections()[1].metadata().footer(), Some("end"));
    });
}
