#![forbid(unsafe_code)]

//! Error taxonomy for mutation application.
//!
//! Every variant describes a producer bug: the mutation does not fit the
//! state it is applied to. A mirror that skipped such a mutation would no
//! longer match its producer, so callers fail fast instead.

use thiserror::Error;

/// Errors raised while validating or applying a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    /// An index does not fit the current (or resulting) sequence.
    #[error("index {index} out of bounds for length {len}")]
    OutOfBounds { index: usize, len: usize },

    /// A move destination lies past the end of the post-removal sequence.
    #[error("move destination {destination} exceeds remaining length {len}")]
    DestinationOutOfBounds { destination: usize, len: usize },

    /// The number of indices and values differ.
    #[error("{indices} indices paired with {values} values")]
    CountMismatch { indices: usize, values: usize },

    /// A scroll drops more elements than the window holds.
    #[error("scroll by {offset} exceeds window of length {len}")]
    ScrollOutOfRange { offset: isize, len: usize },

    /// A section was created without metadata.
    #[error("section created at {index} carries no metadata")]
    MissingMetadata { index: usize },

    /// A row-level mutation failed inside the section at `section`.
    #[error("row mutation for section {section} failed: {source}")]
    Section {
        section: usize,
        #[source]
        source: Box<ApplyError>,
    },

    /// Indices were not strictly increasing.
    #[error("indices are not strictly increasing")]
    UnsortedIndices,
}

impl ApplyError {
    /// Attribute a row-level error to the section that owns the rows.
    #[must_use]
    pub fn in_section(self, section: usize) -> Self {
        Self::Section {
            section,
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping section attribution layers.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::Section { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_error_reports_inner_cause() {
        let err = ApplyError::OutOfBounds { index: 4, len: 2 }.in_section(1);
        assert_eq!(
            err.to_string(),
            "row mutation for section 1 failed: index 4 out of bounds for length 2"
        );
        assert_eq!(
            err.root_cause(),
            &ApplyError::OutOfBounds { index: 4, len: 2 }
        );
    }

    #[test]
    fn source_chain_is_exposed() {
        use std::error::Error as _;
        let err = ApplyError::UnsortedIndices.in_section(0);
        assert!(err.source().is_some());
        assert!(ApplyError::UnsortedIndices.source().is_none());
    }
}
