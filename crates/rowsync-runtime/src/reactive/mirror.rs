#![forbid(unsafe_code)]

//! Consumer-side binding that keeps a [`TableState`] in sync with a table
//! stream.
//!
//! A [`MirrorBinding<R>`] subscribes to a [`TableSource`] and applies every
//! delivered [`TableMutation`] to its own [`TableState`], one at a time, in
//! delivery order. After each successful apply, the optional render hook
//! receives the table, the resulting [`TableChange`] and the mutation's
//! `animated` flag, so a view can issue matching incremental updates.
//!
//! # Usage
//!
//! ```
//! use rowsync_core::{Mutation, SectionMetadata};
//! use rowsync_runtime::{MirrorBinding, MirrorConfig, MutationStream, merge_sections};
//!
//! let rows = MutationStream::new();
//! let table = merge_sections([rows.windowed().sectioned(SectionMetadata::new())]);
//! let mirror = MirrorBinding::attach(&table, MirrorConfig::default());
//!
//! rows.emit(Mutation::insert([0, 1], ["a", "b"]));
//! assert_eq!(mirror.with_table(|t| t.row_total()), 2);
//! ```
//!
//! # Invariants
//!
//! 1. Exactly one mutation is applied at a time. Mutations delivered while
//!    an apply or render is in progress are queued and applied afterwards,
//!    in arrival order.
//! 2. A failed apply leaves the table at its last good state.
//! 3. Under [`ErrorPolicy::Halt`] nothing is applied after the first
//!    failure; under [`ErrorPolicy::Panic`] the failure panics.
//! 4. Dropping the binding detaches it; the table is discarded with it.
//!
//! # Failure Modes
//!
//! - Render hook calling back into the same binding: panics on the inner
//!   `RefCell` borrow. Read from the `TableUpdate` instead.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use rowsync_core::{ApplyError, Phase, TableChange, TableMutation, TableState};
use tracing::{error, trace, warn};

use super::stream::{MutationStream, Subscription};
use crate::config::{ErrorPolicy, MirrorConfig};
use crate::merge::TableStream;

// ---------------------------------------------------------------------------
// TableSource
// ---------------------------------------------------------------------------

/// Anything a mirror can attach to.
pub trait TableSource<R> {
    fn subscribe_table(&self, callback: impl Fn(&TableMutation<R>) + 'static) -> Subscription;
}

impl<R: 'static> TableSource<R> for TableStream<R> {
    fn subscribe_table(&self, callback: impl Fn(&TableMutation<R>) + 'static) -> Subscription {
        self.subscribe(callback)
    }
}

impl<R: 'static> TableSource<R> for MutationStream<TableMutation<R>> {
    fn subscribe_table(&self, callback: impl Fn(&TableMutation<R>) + 'static) -> Subscription {
        self.subscribe(callback)
    }
}

// ---------------------------------------------------------------------------
// MirrorBinding
// ---------------------------------------------------------------------------

/// What the render hook sees after each successful apply.
#[derive(Debug)]
pub struct TableUpdate<'a, R> {
    pub table: &'a TableState<R>,
    pub change: &'a TableChange,
    pub animated: bool,
}

/// Lifecycle of a mirror binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MirrorPhase {
    Uninitialized,
    Populated,
    /// An apply failed under [`ErrorPolicy::Halt`].
    Halted,
}

type RenderHook<R> = Box<dyn FnMut(&TableUpdate<'_, R>)>;

struct MirrorInner<R> {
    table: TableState<R>,
    config: MirrorConfig,
    halted: Option<ApplyError>,
    applied: u64,
    render: Option<RenderHook<R>>,
}

/// Resets the applying flag on scope exit, including unwinds.
struct ApplyingGuard<'a>(&'a Cell<bool>);

impl<'a> ApplyingGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for ApplyingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// A [`TableState`] kept in sync with a table stream.
pub struct MirrorBinding<R> {
    inner: Rc<RefCell<MirrorInner<R>>>,
    _subscription: Subscription,
}

impl<R> std::fmt::Debug for MirrorBinding<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("MirrorBinding")
            .field("sections", &inner.table.len())
            .field("applied", &inner.applied)
            .field("halted", &inner.halted.is_some())
            .field("config", &inner.config)
            .finish()
    }
}

impl<R: Clone + 'static> MirrorBinding<R> {
    /// Attach a fresh, empty mirror to `source`.
    pub fn attach(source: &impl TableSource<R>, config: MirrorConfig) -> Self {
        Self::attach_inner(source, config, None)
    }

    /// Attach with a hook that runs after every successful apply.
    pub fn attach_with_render(
        source: &impl TableSource<R>,
        config: MirrorConfig,
        render: impl FnMut(&TableUpdate<'_, R>) + 'static,
    ) -> Self {
        Self::attach_inner(source, config, Some(Box::new(render)))
    }

    fn attach_inner(
        source: &impl TableSource<R>,
        config: MirrorConfig,
        render: Option<RenderHook<R>>,
    ) -> Self {
        let inner = Rc::new(RefCell::new(MirrorInner {
            table: TableState::new(),
            config,
            halted: None,
            applied: 0,
            render,
        }));
        let target = Rc::clone(&inner);
        let applying = Cell::new(false);
        let pending: RefCell<VecDeque<TableMutation<R>>> = RefCell::new(VecDeque::new());
        let subscription = source.subscribe_table(move |mutation| {
            if applying.get() {
                pending.borrow_mut().push_back(mutation.clone());
                return;
            }
            let _guard = ApplyingGuard::enter(&applying);
            apply_one(&target, mutation);
            loop {
                let next = pending.borrow_mut().pop_front();
                let Some(next) = next else {
                    break;
                };
                apply_one(&target, &next);
            }
        });
        Self {
            inner,
            _subscription: subscription,
        }
    }
}

impl<R> MirrorBinding<R> {
    /// Read the mirrored table.
    pub fn with_table<U>(&self, f: impl FnOnce(&TableState<R>) -> U) -> U {
        f(&self.inner.borrow().table)
    }

    #[must_use]
    pub fn phase(&self) -> MirrorPhase {
        let inner = self.inner.borrow();
        if inner.halted.is_some() {
            return MirrorPhase::Halted;
        }
        match inner.table.phase() {
            Phase::Uninitialized => MirrorPhase::Uninitialized,
            Phase::Populated => MirrorPhase::Populated,
        }
    }

    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.inner.borrow().halted.is_some()
    }

    /// The error that halted the binding, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<ApplyError> {
        self.inner.borrow().halted.clone()
    }

    /// Mutations applied successfully so far.
    #[must_use]
    pub fn applied(&self) -> u64 {
        self.inner.borrow().applied
    }

    #[must_use]
    pub fn config(&self) -> MirrorConfig {
        self.inner.borrow().config.clone()
    }
}

impl<R: Clone> MirrorBinding<R> {
    /// A copy of the mirrored table.
    #[must_use]
    pub fn snapshot(&self) -> TableState<R> {
        self.inner.borrow().table.clone()
    }
}

fn apply_one<R: Clone>(inner: &RefCell<MirrorInner<R>>, mutation: &TableMutation<R>) {
    let mut guard = inner.borrow_mut();
    let state = &mut *guard;
    if state.halted.is_some() {
        trace!(kind = %mutation.mutation.kind(), "mirror halted, dropping mutation");
        return;
    }
    match state.table.apply(mutation) {
        Ok(change) => {
            state.applied += 1;
            trace!(
                kind = %mutation.mutation.kind(),
                sections = state.table.len(),
                global_count = state.table.global_count(),
                "applied table mutation"
            );
            if state.config.check_window && !state.table.window_consistent() {
                warn!(
                    local_offset = state.table.local_offset(),
                    sections = state.table.len(),
                    global_count = state.table.global_count(),
                    "materialized sections exceed the advertised total"
                );
            }
            if let Some(render) = state.render.as_mut() {
                render(&TableUpdate {
                    table: &state.table,
                    change: &change,
                    animated: mutation.animated,
                });
            }
        }
        Err(err) => match state.config.error_policy {
            ErrorPolicy::Panic => panic!("table mutation could not be applied: {err}"),
            ErrorPolicy::Halt => {
                error!(
                    error = %err,
                    kind = %mutation.mutation.kind(),
                    applied = state.applied,
                    "halting table mirror"
                );
                state.halted = Some(err);
            }
        },
    }
}
