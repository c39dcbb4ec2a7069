#![forbid(unsafe_code)]

//! Mutations positioned inside a larger conceptual sequence.
//!
//! A consumer often materializes only a window of a much longer (possibly
//! unbounded) sequence. [`WindowedMutation`] pairs a [`Mutation`] with the
//! window's position (`local_offset`) and the total length of the whole
//! sequence after the change (`global_count`).
//!
//! Counts are threaded through a stream with an explicit accumulator,
//! [`Tally`]: each step consumes the previous tally and returns the next one
//! alongside its output. Nothing is captured and mutated behind the caller's
//! back, so replaying a prefix of a stream from a saved tally reproduces the
//! same bookkeeping.
//!
//! ```
//! # use rowsync_core::{windowed, Mutation};
//! let out: Vec<_> = windowed(vec![
//!     Mutation::insert([0, 1], ['a', 'b']),
//!     Mutation::delete_at(0),
//!     Mutation::reload(['x', 'y', 'z']),
//! ])
//! .map(|w| w.global_count)
//! .collect();
//! assert_eq!(out, vec![2, 1, 3]);
//! ```

use crate::mutation::Mutation;

/// A [`Mutation`] plus its position within a larger sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WindowedMutation<T> {
    /// The change itself, in window-local indices.
    pub mutation: Mutation<T>,
    /// Position of the first materialized element in the whole sequence.
    pub local_offset: usize,
    /// Length of the whole sequence after the change.
    pub global_count: usize,
    /// Presentation hint forwarded untouched to the rendering layer.
    #[cfg_attr(feature = "serde", serde(default = "animated_default"))]
    pub animated: bool,
}

#[cfg(feature = "serde")]
fn animated_default() -> bool {
    true
}

impl<T> WindowedMutation<T> {
    /// Wrap `mutation` with explicit window bookkeeping.
    #[must_use]
    pub fn new(mutation: Mutation<T>, local_offset: usize, global_count: usize) -> Self {
        Self {
            mutation,
            local_offset,
            global_count,
            animated: true,
        }
    }

    /// Set the presentation hint.
    #[must_use]
    pub fn with_animated(mut self, animated: bool) -> Self {
        self.animated = animated;
        self
    }

    /// The tally this mutation leaves behind.
    #[must_use]
    pub fn tally(&self) -> Tally {
        Tally {
            global_count: self.global_count,
            local_offset: self.local_offset,
        }
    }

    /// Transform carried values, keeping bookkeeping intact.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> WindowedMutation<U> {
        WindowedMutation {
            mutation: self.mutation.map(f),
            local_offset: self.local_offset,
            global_count: self.global_count,
            animated: self.animated,
        }
    }
}

/// Running window bookkeeping threaded through a mutation stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Tally {
    /// Length of the whole sequence.
    pub global_count: usize,
    /// Position of the window within it.
    pub local_offset: usize,
}

impl Tally {
    /// Start from a known count and offset.
    #[must_use]
    pub const fn new(global_count: usize, local_offset: usize) -> Self {
        Self {
            global_count,
            local_offset,
        }
    }

    /// The tally after `mutation`.
    ///
    /// The count follows [`Mutation::delta`]. A scroll slides the window
    /// (clamped at the start of the sequence); a reload resets it to the
    /// start.
    #[must_use]
    pub fn advance<T>(self, mutation: &Mutation<T>) -> Self {
        let global_count = mutation.delta(self.global_count);
        let local_offset = match mutation {
            Mutation::Scroll { offset, .. } if *offset >= 0 => {
                self.local_offset + offset.unsigned_abs()
            }
            Mutation::Scroll { offset, .. } => {
                self.local_offset.saturating_sub(offset.unsigned_abs())
            }
            Mutation::Reload { .. } => 0,
            Mutation::Insert { .. }
            | Mutation::Delete { .. }
            | Mutation::Update { .. }
            | Mutation::Move { .. } => self.local_offset,
        };
        Self {
            global_count,
            local_offset,
        }
    }

    /// Advance past `mutation` and wrap it with the resulting bookkeeping.
    #[must_use]
    pub fn wrap<T>(self, mutation: Mutation<T>) -> (Self, WindowedMutation<T>) {
        let next = self.advance(&mutation);
        let windowed = WindowedMutation::new(mutation, next.local_offset, next.global_count);
        (next, windowed)
    }
}

/// Wrap a mutation sequence starting from an empty sequence.
pub fn windowed<T, I>(mutations: I) -> impl Iterator<Item = WindowedMutation<T>>
where
    I: IntoIterator<Item = Mutation<T>>,
{
    windowed_from(Tally::default(), mutations)
}

/// Wrap a mutation sequence starting from `start`.
pub fn windowed_from<T, I>(start: Tally, mutations: I) -> impl Iterator<Item = WindowedMutation<T>>
where
    I: IntoIterator<Item = Mutation<T>>,
{
    mutations.into_iter().scan(start, |tally, mutation| {
        let (next, out) = tally.wrap(mutation);
        *tally = next;
        Some(out)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_returns_next_tally() {
        let (tally, w) = Tally::default().wrap(Mutation::insert([0, 1, 2], [1, 2, 3]));
        assert_eq!(tally, Tally::new(3, 0));
        assert_eq!(w.global_count, 3);
        assert_eq!(w.local_offset, 0);
        assert!(w.animated);
        assert_eq!(w.tally(), tally);
    }

    #[test]
    fn scroll_slides_offset_but_not_count() {
        let start = Tally::new(100, 10);
        let fwd = start.advance(&Mutation::scroll(2, ['e', 'f']));
        assert_eq!(fwd, Tally::new(100, 12));
        let back = fwd.advance(&Mutation::scroll(-5, ['a'; 5]));
        assert_eq!(back, Tally::new(100, 7));
        let clamped = Tally::new(100, 1).advance(&Mutation::scroll(-3, ['a'; 3]));
        assert_eq!(clamped.local_offset, 0);
    }

    #[test]
    fn reload_resets_offset() {
        let t = Tally::new(50, 20).advance(&Mutation::reload([1, 2]));
        assert_eq!(t, Tally::new(2, 0));
    }

    #[test]
    fn windowed_from_continues_a_saved_tally() {
        let saved = Tally::new(4, 0);
        let counts: Vec<_> = windowed_from(
            saved,
            vec![Mutation::delete([0, 1]), Mutation::insert_at(0, 'q')],
        )
        .map(|w| w.global_count)
        .collect();
        assert_eq!(counts, vec![2, 3]);
    }

    #[test]
    fn map_keeps_bookkeeping() {
        let w = WindowedMutation::new(Mutation::insert_at(0, 2), 5, 9).with_animated(false);
        let mapped = w.map(|v| v.to_string());
        assert_eq!(mapped.local_offset, 5);
        assert_eq!(mapped.global_count, 9);
        assert!(!mapped.animated);
        assert_eq!(mapped.mutation, Mutation::insert_at(0, "2".to_string()));
    }
}
