#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use rowsync_core::{
    IndexSet, Mutation, SectionMetadata, SectionPayload, TableState, WindowedMutation,
};

#[derive(Arbitrary, Debug)]
enum RowOp {
    Insert(Vec<u8>, Vec<u16>),
    Delete(Vec<u8>),
    Update(Vec<u8>, Vec<u16>),
    Move(Vec<u8>, u8),
    Reload(Vec<u16>),
}

#[derive(Arbitrary, Debug)]
enum SectionOp {
    Insert(u8, Option<String>, Vec<u16>),
    Delete(Vec<u8>),
    Update(u8, Option<String>, RowOp),
    Move(Vec<u8>, u8),
    Scroll(i8, Vec<Vec<u16>>),
    Reload(Vec<Vec<u16>>),
}

// Sorted so most inputs reach the tree; `fuzz_list_apply` covers disorder.
fn indices(raw: &[u8]) -> IndexSet {
    let mut at: Vec<usize> = raw.iter().map(|&i| usize::from(i % 32)).collect();
    at.sort_unstable();
    at.dedup();
    at.into_iter().collect()
}

fn filled(rows: Vec<u16>) -> SectionPayload<u16> {
    SectionPayload::filled(SectionMetadata::new(), rows)
}

fn rows(op: RowOp) -> WindowedMutation<u16> {
    let mutation = match op {
        RowOp::Insert(at, values) => Mutation::insert(indices(&at), values),
        RowOp::Delete(at) => Mutation::delete(indices(&at)),
        RowOp::Update(at, values) => Mutation::update(indices(&at), values),
        RowOp::Move(at, destination) => Mutation::move_to(indices(&at), usize::from(destination)),
        RowOp::Reload(values) => Mutation::reload(values),
    };
    WindowedMutation::new(mutation, 0, 0)
}

fn header(text: Option<String>) -> Option<SectionMetadata> {
    text.map(|h| SectionMetadata::new().with_header(h))
}

fn to_mutation(op: SectionOp) -> Mutation<SectionPayload<u16>> {
    match op {
        SectionOp::Insert(at, title, values) => Mutation::insert_at(
            usize::from(at % 16),
            SectionPayload {
                metadata: header(title),
                rows: WindowedMutation::new(Mutation::reload(values), 0, 0),
            },
        ),
        SectionOp::Delete(at) => Mutation::delete(indices(&at)),
        SectionOp::Update(at, title, op) => Mutation::update_at(
            usize::from(at % 16),
            SectionPayload {
                metadata: header(title),
                rows: rows(op),
            },
        ),
        SectionOp::Move(at, destination) => {
            Mutation::move_to(indices(&at), usize::from(destination % 16))
        }
        SectionOp::Scroll(offset, sections) => {
            let offset = isize::from(offset % 4);
            let mut sections = sections.into_iter();
            let built: Vec<_> = (0..offset.unsigned_abs())
                .map(|_| filled(sections.next().unwrap_or_default()))
                .collect();
            Mutation::scroll(offset, built)
        }
        SectionOp::Reload(sections) => Mutation::reload(sections.into_iter().take(16).map(filled)),
    }
}

// A failed apply must leave the whole tree, rows included, untouched.
fuzz_target!(|ops: Vec<SectionOp>| {
    let mut table = TableState::new();
    for op in ops.into_iter().take(64) {
        let mutation = to_mutation(op);
        let count = mutation.delta(table.len());
        let before = table.clone();
        match table.apply(&WindowedMutation::new(mutation, 0, count)) {
            Ok(_) => assert_eq!(table.len(), count),
            Err(_) => assert_eq!(table, before),
        }
    }
});
