//! Benchmarks for row- and section-level mutation application.
//!
//! Run with: cargo bench -p rowsync-core --bench apply_bench

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rowsync_core::{
    IndexSet, Mutation, SectionMetadata, SectionPayload, TableState, WindowedMutation, apply_list,
};
use std::hint::black_box;

/// A table of `sections` sections holding `rows` rows each.
fn make_table(sections: usize, rows: usize) -> TableState<u32> {
    let payloads = (0..sections)
        .map(|s| {
            SectionPayload::filled(
                SectionMetadata::new().with_header(format!("section {s}")),
                (0..rows as u32).collect(),
            )
        })
        .collect::<Vec<_>>();
    let mut table = TableState::new();
    table
        .apply(&WindowedMutation::new(Mutation::reload(payloads), 0, sections))
        .expect("reload");
    table
}

fn bench_row_inserts(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply/row_insert");

    for len in [100usize, 1_000, 10_000] {
        group.throughput(Throughput::Elements(16));
        let base: Vec<u32> = (0..len as u32).collect();
        let indices: IndexSet = (0..16).map(|i| i * (len / 16)).collect();
        let mutation = Mutation::insert(indices, vec![7u32; 16]);
        group.bench_with_input(BenchmarkId::new("spread", len), &(), |b, _| {
            b.iter(|| {
                let mut items = base.clone();
                black_box(apply_list(&mut items, &mutation).expect("insert"));
            });
        });
    }

    group.finish();
}

fn bench_row_move(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply/row_move");

    for len in [100usize, 1_000, 10_000] {
        let base: Vec<u32> = (0..len as u32).collect();
        let mutation = Mutation::<u32>::move_to([1, len / 2, len - 1], 0);
        group.bench_with_input(BenchmarkId::new("three", len), &(), |b, _| {
            b.iter(|| {
                let mut items = base.clone();
                black_box(apply_list(&mut items, &mutation).expect("move"));
            });
        });
    }

    group.finish();
}

fn bench_section_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply/section_update");

    for (sections, rows) in [(10usize, 100usize), (50, 200), (200, 50)] {
        let table = make_table(sections, rows);
        let mutation = WindowedMutation::new(
            Mutation::update_at(
                sections / 2,
                SectionPayload::rows_only(WindowedMutation::new(
                    Mutation::update_at(rows / 2, 99u32),
                    0,
                    rows,
                )),
            ),
            0,
            sections,
        );
        group.bench_with_input(
            BenchmarkId::new("single_row", format!("{sections}x{rows}")),
            &(),
            |b, _| {
                b.iter(|| {
                    let mut t = table.clone();
                    black_box(t.apply(&mutation).expect("update"));
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_row_inserts,
    bench_row_move,
    bench_section_update
);
criterion_main!(benches);
