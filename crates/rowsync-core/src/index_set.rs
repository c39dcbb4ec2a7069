#![forbid(unsafe_code)]

//! Ordered index sets addressing positions in a sequence.
//!
//! An [`IndexSet`] keeps positions exactly as the producer listed them.
//! Mutations require them to be strictly increasing: deletions walk the set
//! from the back so lower positions stay valid, insertions walk it from the
//! front so each position is final once written, and values pair with
//! positions by rank. The infallible conversions never reorder or drop
//! anything, so a producer that lists `[2, 0]` is rejected with
//! [`ApplyError::UnsortedIndices`] when the mutation is applied rather than
//! silently re-paired. [`IndexSet::from_sorted`] and deserialization reject
//! disorder up front.

use std::ops::Range;

use crate::error::ApplyError;

/// Sequence positions in producer order.
///
/// ```
/// # use rowsync_core::{ApplyError, IndexSet};
/// let set: IndexSet = [1, 3].into_iter().collect();
/// assert_eq!(set.last(), Some(3));
/// assert!(set.check_sorted().is_ok());
///
/// let unsorted = IndexSet::from([3, 1]);
/// assert_eq!(unsorted.check_sorted(), Err(ApplyError::UnsortedIndices));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "Vec<usize>", into = "Vec<usize>")
)]
pub struct IndexSet(Vec<usize>);

impl IndexSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// A set holding exactly one position.
    #[must_use]
    pub fn single(index: usize) -> Self {
        Self(vec![index])
    }

    /// Build a set from input that must already be strictly increasing.
    ///
    /// Out-of-order or repeated positions are rejected here instead of at
    /// apply time.
    pub fn from_sorted(indices: impl IntoIterator<Item = usize>) -> Result<Self, ApplyError> {
        let set = Self(indices.into_iter().collect());
        set.check_sorted()?;
        Ok(set)
    }

    /// Number of positions in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First position listed. The lowest one for a sorted set.
    #[must_use]
    pub fn first(&self) -> Option<usize> {
        self.0.first().copied()
    }

    /// Last position listed. The highest one for a sorted set.
    #[must_use]
    pub fn last(&self) -> Option<usize> {
        self.0.last().copied()
    }

    /// Whether `index` is a member.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        self.0.contains(&index)
    }

    /// Positions in producer order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = usize> + ExactSizeIterator + '_ {
        self.0.iter().copied()
    }

    /// Fail unless positions are strictly increasing.
    pub fn check_sorted(&self) -> Result<(), ApplyError> {
        if self.0.windows(2).all(|pair| pair[0] < pair[1]) {
            Ok(())
        } else {
            Err(ApplyError::UnsortedIndices)
        }
    }

    /// Fail unless every position is below `len`.
    pub fn check_below(&self, len: usize) -> Result<(), ApplyError> {
        match self.iter().max() {
            Some(index) if index >= len => Err(ApplyError::OutOfBounds { index, len }),
            _ => Ok(()),
        }
    }

    /// Shift every position by `by`, for translating local indices into a
    /// larger sequence.
    #[must_use]
    pub fn offset(&self, by: usize) -> Self {
        Self(self.0.iter().map(|i| i + by).collect())
    }
}

impl FromIterator<usize> for IndexSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Range<usize>> for IndexSet {
    fn from(range: Range<usize>) -> Self {
        range.collect()
    }
}

impl<const N: usize> From<[usize; N]> for IndexSet {
    fn from(indices: [usize; N]) -> Self {
        Self(indices.to_vec())
    }
}

impl TryFrom<Vec<usize>> for IndexSet {
    type Error = ApplyError;

    fn try_from(indices: Vec<usize>) -> Result<Self, Self::Error> {
        Self::from_sorted(indices)
    }
}

impl From<IndexSet> for Vec<usize> {
    fn from(set: IndexSet) -> Self {
        set.0
    }
}

impl<'a> IntoIterator for &'a IndexSet {
    type Item = usize;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, usize>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter().copied()
    }
}
