#![forbid(unsafe_code)]

//! The mirrored section/row tree and the algorithm that applies mutations
//! to it.
//!
//! One generic routine, [`apply_list`], applies a [`Mutation`] to a `Vec` of
//! elements. What an element does when it is created or updated is decided
//! by [`Reconcile`]:
//!
//! - plain rows replace themselves with the new value;
//! - [`SectionState`] replaces its metadata when one is supplied and then
//!   recurses, applying the payload's row mutation to its own rows.
//!
//! [`TableState::apply`] is `apply_list` over sections, followed by copying
//! the outer window bookkeeping.
//!
//! # Invariants
//!
//! 1. Validation runs to completion before any element is touched. A failed
//!    apply, including one failing deep inside a section's rows, leaves the
//!    tree exactly as it was.
//! 2. Deletes and moves remove from the highest index down so lower indices
//!    stay valid while removing.
//! 3. Inserts are placed in ascending index order, so every index is final
//!    once written.
//! 4. `global_count`/`local_offset` are taken from the applied mutation, never
//!    recomputed.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Result |
//! |---------|-------|--------|
//! | Index past the end | Producer/consumer out of sync | [`ApplyError::OutOfBounds`] |
//! | Indices out of order or repeated | Malformed mutation | [`ApplyError::UnsortedIndices`] |
//! | Values vs indices differ | Malformed mutation | [`ApplyError::CountMismatch`] |
//! | New section without metadata | Malformed payload | [`ApplyError::MissingMetadata`] |
//! | Row error in section `i` | Any of the above, nested | [`ApplyError::Section`] |

use crate::change::{ListChange, RowChange, SectionChange, TableChange};
use crate::error::ApplyError;
use crate::mutation::Mutation;
use crate::section::{SectionMetadata, SectionPayload, TableMutation};
use crate::windowed::WindowedMutation;

/// How an element of a mirrored list is created from, and updated by, a
/// mutation payload `P`.
///
/// The `check_*` methods validate without side effects; [`apply_list`] runs
/// them for every affected element before calling `build`/`reconcile`.
pub trait Reconcile<P>: Sized {
    /// What an in-place update reports.
    type Change;

    /// Validate that `payload` can create a new element at `index`.
    fn check_new(index: usize, payload: &P) -> Result<(), ApplyError>;

    /// Validate that `payload` can update this element, found at `index`.
    fn check_update(&self, index: usize, payload: &P) -> Result<(), ApplyError>;

    /// Create a new element at `index`.
    fn build(index: usize, payload: &P) -> Result<Self, ApplyError>;

    /// Update this element in place.
    fn reconcile(&mut self, index: usize, payload: &P) -> Result<Self::Change, ApplyError>;
}

/// Plain values: creation clones, update overwrites.
impl<T: Clone> Reconcile<T> for T {
    type Change = ();

    fn check_new(_index: usize, _payload: &T) -> Result<(), ApplyError> {
        Ok(())
    }

    fn check_update(&self, _index: usize, _payload: &T) -> Result<(), ApplyError> {
        Ok(())
    }

    fn build(_index: usize, payload: &T) -> Result<Self, ApplyError> {
        Ok(payload.clone())
    }

    fn reconcile(&mut self, _index: usize, payload: &T) -> Result<(), ApplyError> {
        self.clone_from(payload);
        Ok(())
    }
}

fn check_count(indices: usize, values: usize) -> Result<(), ApplyError> {
    if indices == values {
        Ok(())
    } else {
        Err(ApplyError::CountMismatch { indices, values })
    }
}

/// Validate `mutation` against `items` without touching them.
pub fn check_list<E, P>(items: &[E], mutation: &Mutation<P>) -> Result<(), ApplyError>
where
    E: Reconcile<P>,
{
    let len = items.len();
    match mutation {
        Mutation::Insert { indices, values } => {
            indices.check_sorted()?;
            check_count(indices.len(), values.len())?;
            indices.check_below(len + values.len())?;
            for (index, payload) in indices.iter().zip(values) {
                E::check_new(index, payload)?;
            }
        }
        Mutation::Delete { indices } => {
            indices.check_sorted()?;
            indices.check_below(len)?;
        }
        Mutation::Update { indices, values } => {
            indices.check_sorted()?;
            check_count(indices.len(), values.len())?;
            indices.check_below(len)?;
            for (index, payload) in indices.iter().zip(values) {
                items[index].check_update(index, payload)?;
            }
        }
        Mutation::Move {
            indices,
            destination,
        } => {
            indices.check_sorted()?;
            indices.check_below(len)?;
            let remaining = len - indices.len();
            if *destination > remaining {
                return Err(ApplyError::DestinationOutOfBounds {
                    destination: *destination,
                    len: remaining,
                });
            }
        }
        Mutation::Scroll { offset, values } => {
            let run = offset.unsigned_abs();
            if run > len {
                return Err(ApplyError::ScrollOutOfRange {
                    offset: *offset,
                    len,
                });
            }
            check_count(run, values.len())?;
            let start = if *offset >= 0 { len - run } else { 0 };
            for (i, payload) in values.iter().enumerate() {
                E::check_new(start + i, payload)?;
            }
        }
        Mutation::Reload { values } => {
            for (index, payload) in values.iter().enumerate() {
                E::check_new(index, payload)?;
            }
        }
    }
    Ok(())
}

/// Apply `mutation` to `items`, reporting what changed.
///
/// On error `items` is left untouched.
///
/// ```
/// # use rowsync_core::{apply_list, Mutation};
/// let mut items = vec!['a', 'b', 'c', 'd'];
/// apply_list(&mut items, &Mutation::move_to([1, 3], 0)).unwrap();
/// assert_eq!(items, vec!['b', 'd', 'a', 'c']);
/// ```
pub fn apply_list<E, P>(
    items: &mut Vec<E>,
    mutation: &Mutation<P>,
) -> Result<ListChange<E::Change>, ApplyError>
where
    E: Reconcile<P>,
{
    check_list(items, mutation)?;

    let change = match mutation {
        Mutation::Insert { indices, values } => {
            items.reserve(values.len());
            for (index, payload) in indices.iter().zip(values) {
                items.insert(index, E::build(index, payload)?);
            }
            ListChange::Inserted(indices.clone())
        }
        Mutation::Delete { indices } => {
            for index in indices.iter().rev() {
                items.remove(index);
            }
            ListChange::Deleted(indices.clone())
        }
        Mutation::Update { indices, values } => {
            let mut updated = Vec::with_capacity(indices.len());
            for (index, payload) in indices.iter().zip(values) {
                updated.push((index, items[index].reconcile(index, payload)?));
            }
            ListChange::Updated(updated)
        }
        Mutation::Move {
            indices,
            destination,
        } => {
            let mut run: Vec<E> = indices.iter().rev().map(|i| items.remove(i)).collect();
            run.reverse();
            let count = run.len();
            items.splice(*destination..*destination, run);
            ListChange::Moved {
                from: indices.clone(),
                to: *destination..*destination + count,
            }
        }
        Mutation::Scroll { offset, values } => {
            let len = items.len();
            let run = offset.unsigned_abs();
            if *offset >= 0 {
                items.drain(..run);
                let start = items.len();
                for (i, payload) in values.iter().enumerate() {
                    items.push(E::build(start + i, payload)?);
                }
                ListChange::Scrolled {
                    removed: 0..run,
                    inserted: len - run..len,
                }
            } else {
                items.truncate(len - run);
                let fresh = values
                    .iter()
                    .enumerate()
                    .map(|(i, payload)| E::build(i, payload))
                    .collect::<Result<Vec<_>, _>>()?;
                items.splice(0..0, fresh);
                ListChange::Scrolled {
                    removed: len - run..len,
                    inserted: 0..run,
                }
            }
        }
        Mutation::Reload { values } => {
            *items = values
                .iter()
                .enumerate()
                .map(|(index, payload)| E::build(index, payload))
                .collect::<Result<Vec<_>, _>>()?;
            ListChange::Reloaded { len: items.len() }
        }
    };
    Ok(change)
}

/// One mirrored section: metadata plus its materialized rows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectionState<R> {
    metadata: SectionMetadata,
    rows: Vec<R>,
    row_offset: usize,
    row_count: usize,
}

impl<R> SectionState<R> {
    /// An empty section.
    #[must_use]
    pub fn new(metadata: SectionMetadata) -> Self {
        Self {
            metadata,
            rows: Vec::new(),
            row_offset: 0,
            row_count: 0,
        }
    }

    #[must_use]
    pub fn metadata(&self) -> &SectionMetadata {
        &self.metadata
    }

    /// Materialized rows, in order.
    #[must_use]
    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    #[must_use]
    pub fn row(&self, index: usize) -> Option<&R> {
        self.rows.get(index)
    }

    /// Position of the first materialized row in the section's full row
    /// sequence.
    #[must_use]
    pub fn row_offset(&self) -> usize {
        self.row_offset
    }

    /// Length of the section's full row sequence, materialized or not.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Number of materialized rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<R: Clone> SectionState<R> {
    /// Apply a row-level mutation and adopt its window bookkeeping.
    pub fn apply_rows(&mut self, rows: &WindowedMutation<R>) -> Result<RowChange, ApplyError> {
        let change = apply_list(&mut self.rows, &rows.mutation)?;
        self.row_offset = rows.local_offset;
        self.row_count = rows.global_count;
        Ok(change)
    }
}

impl<R: Clone> Reconcile<SectionPayload<R>> for SectionState<R> {
    type Change = SectionChange;

    fn check_new(index: usize, payload: &SectionPayload<R>) -> Result<(), ApplyError> {
        if payload.metadata.is_none() {
            return Err(ApplyError::MissingMetadata { index });
        }
        check_list::<R, R>(&[], &payload.rows.mutation).map_err(|e| e.in_section(index))
    }

    fn check_update(&self, index: usize, payload: &SectionPayload<R>) -> Result<(), ApplyError> {
        check_list(&self.rows, &payload.rows.mutation).map_err(|e| e.in_section(index))
    }

    fn build(index: usize, payload: &SectionPayload<R>) -> Result<Self, ApplyError> {
        let metadata = payload
            .metadata
            .clone()
            .ok_or(ApplyError::MissingMetadata { index })?;
        let mut section = Self::new(metadata);
        section
            .apply_rows(&payload.rows)
            .map_err(|e| e.in_section(index))?;
        Ok(section)
    }

    fn reconcile(
        &mut self,
        index: usize,
        payload: &SectionPayload<R>,
    ) -> Result<SectionChange, ApplyError> {
        let rows = self
            .apply_rows(&payload.rows)
            .map_err(|e| e.in_section(index))?;
        let metadata_replaced = match &payload.metadata {
            Some(metadata) => {
                self.metadata.clone_from(metadata);
                true
            }
            None => false,
        };
        Ok(SectionChange {
            metadata_replaced,
            rows,
        })
    }
}

/// Lifecycle of a mirrored table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Nothing applied yet.
    #[default]
    Uninitialized,
    /// At least one mutation applied.
    Populated,
}

/// The consumer-side mirror of a sectioned table.
///
/// Owned by exactly one consumer and changed only through
/// [`apply`](Self::apply), one mutation at a time, in delivery order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableState<R> {
    sections: Vec<SectionState<R>>,
    local_offset: usize,
    global_count: usize,
    phase: Phase,
}

impl<R> Default for TableState<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> TableState<R> {
    /// An empty, uninitialized table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sections: Vec::new(),
            local_offset: 0,
            global_count: 0,
            phase: Phase::Uninitialized,
        }
    }

    #[must_use]
    pub fn sections(&self) -> &[SectionState<R>] {
        &self.sections
    }

    #[must_use]
    pub fn section(&self, index: usize) -> Option<&SectionState<R>> {
        self.sections.get(index)
    }

    /// The row at `section`/`row`, if materialized.
    #[must_use]
    pub fn row(&self, section: usize, row: usize) -> Option<&R> {
        self.sections.get(section)?.row(row)
    }

    /// Position of the first materialized section in the whole table.
    #[must_use]
    pub fn local_offset(&self) -> usize {
        self.local_offset
    }

    /// Total section count of the whole table.
    #[must_use]
    pub fn global_count(&self) -> usize {
        self.global_count
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of materialized sections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Materialized rows across all sections.
    #[must_use]
    pub fn row_total(&self) -> usize {
        self.sections.iter().map(SectionState::len).sum()
    }

    /// Whether the materialized window fits inside the advertised total.
    #[must_use]
    pub fn window_consistent(&self) -> bool {
        self.local_offset + self.sections.len() <= self.global_count
    }
}

impl<R: Clone> TableState<R> {
    /// Apply one table mutation.
    ///
    /// On error the table is left exactly as it was.
    pub fn apply(&mut self, mutation: &TableMutation<R>) -> Result<TableChange, ApplyError> {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!(
            "table_apply",
            kind = mutation.mutation.kind().as_str(),
            sections = self.sections.len(),
            global_count = mutation.global_count,
        )
        .entered();

        let change = apply_list(&mut self.sections, &mutation.mutation)?;
        self.local_offset = mutation.local_offset;
        self.global_count = mutation.global_count;
        self.phase = Phase::Populated;
        Ok(change)
    }
}
