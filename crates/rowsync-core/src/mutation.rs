#![forbid(unsafe_code)]

//! Single changes to an ordered collection.
//!
//! A [`Mutation`] carries the minimum data needed to replay one edit on a
//! mirror of the producer's sequence. Index conventions differ per kind:
//!
//! | Kind | Indices address | Values |
//! |------|-----------------|--------|
//! | `Insert` | the post-mutation sequence | one per index |
//! | `Delete` | the pre-mutation sequence | none |
//! | `Update` | both (length unchanged) | one per index |
//! | `Move` | the pre-mutation sequence; `destination` the result | none |
//! | `Scroll` | a run at one end of the window | `|offset|` replacements |
//! | `Reload` | nothing | the whole new sequence |
//!
//! # Invariants
//!
//! 1. `Insert`/`Update` carry exactly as many values as indices.
//! 2. `Scroll` carries exactly `|offset|` values.
//! 3. [`delta`](Mutation::delta) must see every mutation once, in delivery
//!    order. Skipping or reordering corrupts every later count; this is a
//!    documented precondition and is not checked.

use core::fmt;

use crate::index_set::IndexSet;

/// One described change to an ordered collection of `T`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "kind", rename_all = "snake_case")
)]
pub enum Mutation<T> {
    /// Insert `values` so they end up at `indices` of the result.
    Insert { indices: IndexSet, values: Vec<T> },
    /// Remove the elements at `indices`.
    Delete { indices: IndexSet },
    /// Replace the elements at `indices` with `values`.
    Update { indices: IndexSet, values: Vec<T> },
    /// Lift the elements at `indices` out and reinsert them, in order,
    /// starting at `destination` of the resulting sequence.
    Move { indices: IndexSet, destination: usize },
    /// Slide a window: `offset > 0` drops from the front and appends
    /// `values`; `offset < 0` drops from the back and prepends `values`.
    Scroll { offset: isize, values: Vec<T> },
    /// Replace the entire sequence.
    Reload { values: Vec<T> },
}

/// Discriminant of a [`Mutation`], for logging and dispatch tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Insert,
    Delete,
    Update,
    Move,
    Scroll,
    Reload,
}

impl MutationKind {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Delete => "delete",
            Self::Update => "update",
            Self::Move => "move",
            Self::Scroll => "scroll",
            Self::Reload => "reload",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<T> Mutation<T> {
    /// Insert `values` at `indices` of the resulting sequence.
    #[must_use]
    pub fn insert(indices: impl Into<IndexSet>, values: impl Into<Vec<T>>) -> Self {
        Self::Insert {
            indices: indices.into(),
            values: values.into(),
        }
    }

    /// Insert a single value.
    #[must_use]
    pub fn insert_at(index: usize, value: T) -> Self {
        Self::Insert {
            indices: IndexSet::single(index),
            values: vec![value],
        }
    }

    /// Append `values` to a sequence currently holding `len` elements.
    #[must_use]
    pub fn append(len: usize, values: Vec<T>) -> Self {
        Self::Insert {
            indices: IndexSet::from(len..len + values.len()),
            values,
        }
    }

    /// Delete the elements at `indices`.
    #[must_use]
    pub fn delete(indices: impl Into<IndexSet>) -> Self {
        Self::Delete {
            indices: indices.into(),
        }
    }

    /// Delete a single element.
    #[must_use]
    pub fn delete_at(index: usize) -> Self {
        Self::Delete {
            indices: IndexSet::single(index),
        }
    }

    /// Replace the elements at `indices`.
    #[must_use]
    pub fn update(indices: impl Into<IndexSet>, values: impl Into<Vec<T>>) -> Self {
        Self::Update {
            indices: indices.into(),
            values: values.into(),
        }
    }

    /// Replace a single element.
    #[must_use]
    pub fn update_at(index: usize, value: T) -> Self {
        Self::Update {
            indices: IndexSet::single(index),
            values: vec![value],
        }
    }

    /// Move the elements at `indices` to start at `destination`.
    #[must_use]
    pub fn move_to(indices: impl Into<IndexSet>, destination: usize) -> Self {
        Self::Move {
            indices: indices.into(),
            destination,
        }
    }

    /// Slide a window by `offset`, paired with the replacement `values`.
    #[must_use]
    pub fn scroll(offset: isize, values: impl Into<Vec<T>>) -> Self {
        Self::Scroll {
            offset,
            values: values.into(),
        }
    }

    /// Replace everything.
    #[must_use]
    pub fn reload(values: impl IntoIterator<Item = T>) -> Self {
        Self::Reload {
            values: values.into_iter().collect(),
        }
    }

    /// The discriminant.
    #[must_use]
    pub fn kind(&self) -> MutationKind {
        match self {
            Self::Insert { .. } => MutationKind::Insert,
            Self::Delete { .. } => MutationKind::Delete,
            Self::Update { .. } => MutationKind::Update,
            Self::Move { .. } => MutationKind::Move,
            Self::Scroll { .. } => MutationKind::Scroll,
            Self::Reload { .. } => MutationKind::Reload,
        }
    }

    /// The index set, for kinds that have one.
    #[must_use]
    pub fn indices(&self) -> Option<&IndexSet> {
        match self {
            Self::Insert { indices, .. }
            | Self::Delete { indices }
            | Self::Update { indices, .. }
            | Self::Move { indices, .. } => Some(indices),
            Self::Scroll { .. } | Self::Reload { .. } => None,
        }
    }

    /// Values carried by the mutation (empty for `Delete`/`Move`).
    #[must_use]
    pub fn values(&self) -> &[T] {
        match self {
            Self::Insert { values, .. }
            | Self::Update { values, .. }
            | Self::Scroll { values, .. }
            | Self::Reload { values } => values,
            Self::Delete { .. } | Self::Move { .. } => &[],
        }
    }

    /// Count of the sequence after this mutation, given the count before.
    ///
    /// `Insert` adds, `Delete` subtracts, `Reload` replaces; `Update`,
    /// `Move` and `Scroll` trade elements one for one and leave it alone.
    ///
    /// ```
    /// # use rowsync_core::Mutation;
    /// let mut count = 0;
    /// count = Mutation::insert([0, 1], ["a", "b"]).delta(count);
    /// assert_eq!(count, 2);
    /// count = Mutation::<&str>::delete_at(0).delta(count);
    /// assert_eq!(count, 1);
    /// count = Mutation::reload(["x", "y", "z"]).delta(count);
    /// assert_eq!(count, 3);
    /// ```
    #[must_use]
    pub fn delta(&self, running: usize) -> usize {
        match self {
            Self::Insert { indices, .. } => running + indices.len(),
            // An over-long delete is a producer bug; apply reports it.
            Self::Delete { indices } => running.saturating_sub(indices.len()),
            Self::Update { .. } | Self::Move { .. } | Self::Scroll { .. } => running,
            Self::Reload { values } => values.len(),
        }
    }

    /// Transform every carried value, keeping positions intact.
    #[must_use]
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Mutation<U> {
        match self {
            Self::Insert { indices, values } => Mutation::Insert {
                indices,
                values: values.into_iter().map(&mut f).collect(),
            },
            Self::Delete { indices } => Mutation::Delete { indices },
            Self::Update { indices, values } => Mutation::Update {
                indices,
                values: values.into_iter().map(&mut f).collect(),
            },
            Self::Move {
                indices,
                destination,
            } => Mutation::Move {
                indices,
                destination,
            },
            Self::Scroll { offset, values } => Mutation::Scroll {
                offset,
                values: values.into_iter().map(&mut f).collect(),
            },
            Self::Reload { values } => Mutation::Reload {
                values: values.into_iter().map(f).collect(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_follows_count_bookkeeping() {
        let mut count = 0;
        count = Mutation::insert([0, 1], ['a', 'b']).delta(count);
        assert_eq!(count, 2);
        count = Mutation::<char>::delete([0]).delta(count);
        assert_eq!(count, 1);
        count = Mutation::update([0], ['c']).delta(count);
        assert_eq!(count, 1);
        count = Mutation::reload(['x', 'y', 'z']).delta(count);
        assert_eq!(count, 3);
    }

    #[test]
    fn move_and_scroll_leave_count_alone() {
        assert_eq!(Mutation::<u8>::move_to([0, 2], 1).delta(7), 7);
        assert_eq!(Mutation::scroll(-2, [1u8, 2]).delta(7), 7);
    }

    #[test]
    fn append_targets_the_tail() {
        let m = Mutation::append(3, vec!['x', 'y']);
        assert_eq!(m.indices(), Some(&IndexSet::from([3, 4])));
        assert_eq!(m.values(), &['x', 'y']);
    }

    #[test]
    fn kind_names_are_stable() {
        assert_eq!(Mutation::<u8>::delete_at(0).kind().as_str(), "delete");
        assert_eq!(Mutation::reload([1u8]).kind().to_string(), "reload");
    }

    #[test]
    fn map_keeps_positions() {
        let m = Mutation::update([1, 4], [1, 2]).map(|v| v * 10);
        assert_eq!(m, Mutation::update([1, 4], [10, 20]));
        let moved = Mutation::<u8>::move_to([0], 3).map(u32::from);
        assert_eq!(moved, Mutation::<u32>::move_to([0], 3));
    }

    #[test]
    fn scroll_and_reload_have_no_indices() {
        assert!(Mutation::scroll(1, ['z']).indices().is_none());
        assert!(Mutation::<char>::reload([]).indices().is_none());
        assert!(Mutation::<char>::delete_at(2).values().is_empty());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_uses_kind_tag() {
        let json = serde_json::to_value(Mutation::insert_at(2, "a")).expect("serialize");
        assert_eq!(json["kind"], "insert");
        assert_eq!(json["indices"], serde_json::json!([2]));
        let back: Mutation<String> = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, Mutation::insert_at(2, "a".to_string()));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn decoding_rejects_unsorted_indices() {
        let json = serde_json::json!({"kind": "insert", "indices": [2, 0], "values": ["x", "y"]});
        assert!(serde_json::from_value::<Mutation<String>>(json).is_err());
    }
}
