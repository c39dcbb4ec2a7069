#![forbid(unsafe_code)]

//! Reactive plumbing for rowsync.
//!
//! - [`MutationStream`]: a hot, push-based stream with `map`, `scan`,
//!   `windowed` and `sectioned` combinators.
//! - [`Subscription`]: RAII guard that unsubscribes on drop.
//! - [`SubscriptionScope`]: a bag of subscriptions released together.
//! - [`MirrorBinding`]: applies a table stream to a consumer-owned
//!   [`TableState`](rowsync_core::TableState).
//!
//! # Architecture
//!
//! Streams use `Rc<RefCell<..>>` for single-threaded shared ownership.
//! Subscribers are stored as `Weak` callbacks and cleaned up lazily during
//! emission. Nothing here is `Send`; a mirror and the streams feeding it live
//! on one thread.

pub mod mirror;
pub mod stream;

pub use mirror::{MirrorBinding, MirrorPhase, TableSource, TableUpdate};
pub use stream::{MutationStream, Subscription, SubscriptionScope};
