#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use rowsync_core::{IndexSet, Mutation, apply_list};

#[derive(Arbitrary, Debug)]
enum Op {
    Insert(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
    Update(Vec<u8>, Vec<u8>),
    Move(Vec<u8>, u8),
    Scroll(i8, Vec<u8>),
    Reload(Vec<u8>),
}

fn indices(raw: &[u8]) -> IndexSet {
    raw.iter().map(|&i| usize::from(i)).collect()
}

fn to_mutation(op: Op) -> Mutation<u8> {
    match op {
        Op::Insert(at, values) => Mutation::insert(indices(&at), values),
        Op::Delete(at) => Mutation::delete(indices(&at)),
        Op::Update(at, values) => Mutation::update(indices(&at), values),
        Op::Move(at, destination) => Mutation::move_to(indices(&at), usize::from(destination)),
        Op::Scroll(offset, values) => Mutation::scroll(isize::from(offset), values),
        Op::Reload(values) => Mutation::reload(values),
    }
}

// Arbitrary (often invalid) mutations: apply either fails without touching
// the list or leaves exactly `delta` elements.
fuzz_target!(|ops: Vec<Op>| {
    let mut items: Vec<u8> = Vec::new();
    for op in ops.into_iter().take(64) {
        let mutation = to_mutation(op);
        let before = items.clone();
        match apply_list(&mut items, &mutation) {
            Ok(_) => assert_eq!(items.len(), mutation.delta(before.len())),
            Err(_) => assert_eq!(items, before),
        }
    }
});
