#![forbid(unsafe_code)]

//! rowsync public facade and prelude.
//!
//! Re-exports the value types and mirrored tree from `rowsync-core` and,
//! with the default `runtime` feature, the streams, merge and mirror
//! binding from `rowsync-runtime`.
//!
//! ```
//! use rowsync::prelude::*;
//!
//! let rows = MutationStream::new();
//! let table = single_section(&rows.windowed());
//! let mirror = MirrorBinding::attach(&table, MirrorConfig::default());
//!
//! rows.emit(Mutation::insert([0, 1, 2], ['a', 'b', 'c']));
//! rows.emit(Mutation::move_to([2], 0));
//!
//! mirror.with_table(|table| {
//!     assert_eq!(table.sections()[0].rows(), &['c', 'a', 'b']);
//! });
//! ```

pub use rowsync_core as core;
#[cfg(feature = "runtime")]
pub use rowsync_runtime as runtime;

pub use rowsync_core::{
    ApplyError, IndexPath, IndexSet, ListChange, Mutation, MutationKind, Phase, Reconcile,
    RowChange, RowEdit, SectionChange, SectionMetadata, SectionPayload, SectionState, Tally,
    TableChange, TableMutation, TableState, WindowedMutation, apply_list, check_list, windowed,
    windowed_from,
};

#[cfg(feature = "runtime")]
pub use rowsync_runtime::{
    ErrorPolicy, MirrorBinding, MirrorConfig, MirrorPhase, MutationStream, Subscription,
    SubscriptionScope, TableSource, TableStream, TableUpdate, merge_sections, single_section,
};

#[cfg(feature = "policy-config")]
pub use rowsync_runtime::ConfigError;

pub mod prelude {
    pub use rowsync_core::{
        ApplyError, IndexSet, ListChange, Mutation, RowEdit, SectionMetadata, SectionPayload,
        TableChange, TableMutation, TableState, WindowedMutation,
    };

    #[cfg(feature = "runtime")]
    pub use rowsync_runtime::{
        ErrorPolicy, MirrorBinding, MirrorConfig, MutationStream, TableStream, merge_sections,
        single_section,
    };
}
