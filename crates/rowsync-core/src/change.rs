#![forbid(unsafe_code)]

//! Reports of what an applied mutation touched.
//!
//! Renderers use these to issue incremental updates (row insert/delete/move
//! animations) instead of redrawing everything. Index conventions match the
//! platform list-view APIs they feed: deleted and moved-from positions refer
//! to the sequence *before* the mutation, inserted and moved-to positions to
//! the sequence *after* it.

use std::ops::Range;

use crate::index_set::IndexSet;

/// What one mutation did to a list whose elements report `N` when updated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListChange<N = ()> {
    /// Elements now sit at these post-mutation positions.
    Inserted(IndexSet),
    /// Elements were removed from these pre-mutation positions.
    Deleted(IndexSet),
    /// Elements at these positions were updated in place.
    Updated(Vec<(usize, N)>),
    /// Elements left `from` and now occupy `to`, in the same order.
    Moved { from: IndexSet, to: Range<usize> },
    /// A window slide: `removed` (pre-mutation) dropped, `inserted`
    /// (post-mutation) filled with fresh elements.
    Scrolled {
        removed: Range<usize>,
        inserted: Range<usize>,
    },
    /// Everything was replaced; the list now holds `len` elements.
    Reloaded { len: usize },
}

impl<N> ListChange<N> {
    /// Whether the change replaced the whole list.
    #[must_use]
    pub fn is_reload(&self) -> bool {
        matches!(self, Self::Reloaded { .. })
    }

    /// Whether the change touched nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Inserted(set) | Self::Deleted(set) => set.is_empty(),
            Self::Updated(entries) => entries.is_empty(),
            Self::Moved { from, .. } => from.is_empty(),
            Self::Scrolled { removed, inserted } => removed.is_empty() && inserted.is_empty(),
            Self::Reloaded { .. } => false,
        }
    }
}

/// Row-level change; rows report nothing when updated.
pub type RowChange = ListChange<()>;

/// What an update did to one section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectionChange {
    /// Whether the section's header/footer were replaced.
    pub metadata_replaced: bool,
    /// The change applied to the section's rows.
    pub rows: RowChange,
}

/// Section-level change, with nested row changes for updated sections.
pub type TableChange = ListChange<SectionChange>;

/// Address of a row within a table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexPath {
    pub section: usize,
    pub row: usize,
}

impl IndexPath {
    #[must_use]
    pub const fn new(section: usize, row: usize) -> Self {
        Self { section, row }
    }
}

/// One row-level edit, flattened out of a [`TableChange`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowEdit {
    Insert(IndexPath),
    Delete(IndexPath),
    Update(IndexPath),
    Move { from: IndexPath, to: IndexPath },
    /// All rows of the section were replaced.
    ReloadSection(usize),
    /// Only the section's header/footer changed.
    ReloadMetadata(usize),
}

impl TableChange {
    /// Flatten the row-level changes of updated sections.
    ///
    /// Section-level inserts, deletes, moves, scrolls and reloads are not
    /// expanded into rows; renderers handle those at section granularity.
    #[must_use]
    pub fn row_edits(&self) -> Vec<RowEdit> {
        let Self::Updated(sections) = self else {
            return Vec::new();
        };
        let mut edits = Vec::new();
        for (section, change) in sections {
            let section = *section;
            if change.metadata_replaced {
                edits.push(RowEdit::ReloadMetadata(section));
            }
            match &change.rows {
                ListChange::Inserted(rows) => {
                    let at = |row| IndexPath::new(section, row);
                    edits.extend(rows.iter().map(|row| RowEdit::Insert(at(row))));
                }
                ListChange::Deleted(rows) => {
                    let at = |row| IndexPath::new(section, row);
                    edits.extend(rows.iter().map(|row| RowEdit::Delete(at(row))));
                }
                ListChange::Updated(rows) => {
                    edits.extend(
                        rows.iter()
                            .map(|(row, ())| RowEdit::Update(IndexPath::new(section, *row))),
                    );
                }
                ListChange::Moved { from, to } => {
                    edits.extend(from.iter().zip(to.clone()).map(|(f, t)| RowEdit::Move {
                        from: IndexPath::new(section, f),
                        to: IndexPath::new(section, t),
                    }));
                }
                ListChange::Scrolled { removed, inserted } => {
                    edits.extend(
                        removed
                            .clone()
                            .map(|row| RowEdit::Delete(IndexPath::new(section, row))),
                    );
                    edits.extend(
                        inserted
                            .clone()
                            .map(|row| RowEdit::Insert(IndexPath::new(section, row))),
                    );
                }
                ListChange::Reloaded { .. } => edits.push(RowEdit::ReloadSection(section)),
            }
        }
        edits
    }
}
