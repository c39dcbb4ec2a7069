#![forbid(unsafe_code)]

//! Streams, section merging and consumer bindings for rowsync.
//!
//! Producers emit [`Mutation`](rowsync_core::Mutation) values into a
//! [`MutationStream`]. [`MutationStream::windowed`] threads the running
//! count through them, [`MutationStream::sectioned`] wraps them for one
//! section, and [`merge_sections`] fans several sections into one
//! [`TableStream`]. A [`MirrorBinding`] applies that stream to a
//! consumer-owned table.
//!
//! # Feature Flags
//!
//! - `tracing`: spans around every apply inside `rowsync-core`.
//! - `policy-config`: load [`MirrorConfig`] from TOML or JSON.

pub mod config;
pub mod merge;
pub mod reactive;

#[cfg(feature = "policy-config")]
pub use config::ConfigError;
pub use config::{ERROR_POLICY_ENV, ErrorPolicy, MirrorConfig};
pub use merge::{TableStream, merge_sections, single_section};
pub use reactive::{
    MirrorBinding, MirrorPhase, MutationStream, Subscription, SubscriptionScope, TableSource,
    TableUpdate,
};
