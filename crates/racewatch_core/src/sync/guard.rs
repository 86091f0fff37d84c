//! # Scoped Access Guard
//!
//! RAII bracket around a declared read or write.

use std::sync::Arc;

use crate::identity::ThreadTag;
use crate::sync::access_state::{AccessKind, AccessState, Conflict};

/// Marks an access as in flight for as long as it lives.
///
/// Construction performs the start transition, `Drop` performs the matching
/// end transition exactly once, on every exit path including unwinding. The
/// guard is not `Clone`: moving it hands over the single release obligation.
///
/// The guard is advisory. It never blocks and never keeps the guarded body
/// from running.
///
/// ## Usage
///
/// ```rust,ignore
/// fn push(&self, value: T) {
///     let _guard = self.registry.scoped_write(self.id);
///     // mutate...
/// } // write_ended runs here
/// ```
#[must_use = "the access ends as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ScopedGuard {
    state: Arc<AccessState>,
    kind: AccessKind,
}

impl ScopedGuard {
    /// Runs the start transition for `kind` and returns the active guard.
    ///
    /// The guard exists before the transition runs, so a panicking
    /// `on_conflict` still unwinds through `Drop` and the pair completes.
    ///
    /// # Arguments
    ///
    /// * `state` - Access state of the object being accessed
    /// * `kind` - Declared intent
    /// * `me` - Calling thread
    /// * `on_conflict` - Called for every overlap the start transition sees
    pub fn enter(
        state: Arc<AccessState>,
        kind: AccessKind,
        me: ThreadTag,
        on_conflict: impl FnMut(Conflict),
    ) -> Self {
        let guard = Self { state, kind };
        guard.state.started(kind, me, on_conflict);
        guard
    }

    /// Returns the declared intent.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> AccessKind {
        self.kind
    }

    /// Returns the guarded access state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> &AccessState {
        &self.state
    }
}

impl Drop for ScopedGuard {
    fn drop(&mut self) {
        self.state.ended(self.kind);
    }
}
