#![forbid(unsafe_code)]

//! Section payloads: row mutations tagged with header/footer metadata.
//!
//! A table is a sequence of sections, each holding a sequence of rows. The
//! row-level change for one section travels as a [`SectionPayload`]; the
//! table-level stream is a [`WindowedMutation`] *over* those payloads
//! ([`TableMutation`]), so whole sections are inserted, removed, moved and
//! updated exactly like any other element.
//!
//! `metadata` on a payload is `Some` only when a section is created or its
//! metadata is replaced. `None` means "rows changed, metadata untouched".
//! To clear an existing header/footer, send
//! `Some(SectionMetadata::default())`.

use crate::mutation::Mutation;
use crate::windowed::WindowedMutation;

/// Header/footer text attached to a section.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SectionMetadata {
    pub header: Option<String>,
    pub footer: Option<String>,
}

impl SectionMetadata {
    /// Metadata with neither header nor footer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the header.
    #[must_use]
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    /// Set the footer.
    #[must_use]
    pub fn with_footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    #[must_use]
    pub fn header(&self) -> Option<&str> {
        self.header.as_deref()
    }

    #[must_use]
    pub fn footer(&self) -> Option<&str> {
        self.footer.as_deref()
    }

    /// Whether both header and footer are absent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.header.is_none() && self.footer.is_none()
    }
}

/// A row-level mutation addressed to one section.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SectionPayload<R> {
    /// New metadata, or `None` to leave the section's metadata as is.
    pub metadata: Option<SectionMetadata>,
    /// The change to the section's rows.
    pub rows: WindowedMutation<R>,
}

impl<R> SectionPayload<R> {
    /// A payload that creates a section or replaces its metadata.
    #[must_use]
    pub fn new(metadata: SectionMetadata, rows: WindowedMutation<R>) -> Self {
        Self {
            metadata: Some(metadata),
            rows,
        }
    }

    /// A payload that changes rows only.
    #[must_use]
    pub fn rows_only(rows: WindowedMutation<R>) -> Self {
        Self {
            metadata: None,
            rows,
        }
    }

    /// A section holding exactly `rows` under `metadata`.
    #[must_use]
    pub fn filled(metadata: SectionMetadata, rows: Vec<R>) -> Self {
        let count = rows.len();
        Self::new(
            metadata,
            WindowedMutation::new(Mutation::Reload { values: rows }, 0, count),
        )
    }

    /// An empty section with empty metadata, used to lay out a table's shape
    /// before any section has reported.
    #[must_use]
    pub fn placeholder() -> Self {
        Self::filled(SectionMetadata::default(), Vec::new())
    }
}

/// The outer, section-granularity mutation.
pub type TableMutation<R> = WindowedMutation<SectionPayload<R>>;
