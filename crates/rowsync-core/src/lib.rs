#![forbid(unsafe_code)]

//! Mutation values and the mirrored section/row tree for rowsync.
//!
//! A producer describes each change to an ordered collection as a
//! [`Mutation`] rather than re-sending the collection. Consumers apply those
//! changes to their own copy, [`TableState`], and get back a
//! [`TableChange`] describing what moved so a renderer can animate only the
//! affected rows.
//!
//! # Layers
//!
//! | Layer | Type |
//! |-------|------|
//! | One change to a list | [`Mutation<T>`] |
//! | The change, positioned in a larger sequence | [`WindowedMutation<T>`] |
//! | A row change addressed to one section | [`SectionPayload<R>`] |
//! | A change to the list of sections | [`TableMutation<R>`] |
//! | The consumer's mirror | [`TableState<R>`] / [`SectionState<R>`] |
//!
//! The same [`WindowedMutation`] type is used twice: once over rows, once
//! over section payloads. The same [`apply_list`] routine applies both
//! levels; see [`state`] for how section updates recurse into rows.
//!
//! # Example
//!
//! ```
//! use rowsync_core::{
//!     Mutation, SectionMetadata, SectionPayload, TableState, WindowedMutation,
//! };
//!
//! let mut table = TableState::new();
//! table
//!     .apply(&WindowedMutation::new(
//!         Mutation::reload([SectionPayload::filled(
//!             SectionMetadata::new().with_header("Fruit"),
//!             vec!["apple", "pear"],
//!         )]),
//!         0,
//!         1,
//!     ))
//!     .unwrap();
//!
//! table
//!     .apply(&WindowedMutation::new(
//!         Mutation::update_at(
//!             0,
//!             SectionPayload::rows_only(WindowedMutation::new(
//!                 Mutation::insert_at(1, "fig"),
//!                 0,
//!                 3,
//!             )),
//!         ),
//!         0,
//!         1,
//!     ))
//!     .unwrap();
//!
//! assert_eq!(table.sections()[0].rows(), &["apple", "fig", "pear"]);
//! ```

pub mod change;
pub mod error;
pub mod index_set;
pub mod mutation;
pub mod section;
pub mod state;
pub mod windowed;

pub use change::{IndexPath, ListChange, RowChange, RowEdit, SectionChange, TableChange};
pub use error::ApplyError;
pub use index_set::IndexSet;
pub use mutation::{Mutation, MutationKind};
pub use section::{SectionMetadata, SectionPayload, TableMutation};
pub use state::{Phase, Reconcile, SectionState, TableState, apply_list, check_list};
pub use windowed::{Tally, WindowedMutation, windowed, windowed_from};
