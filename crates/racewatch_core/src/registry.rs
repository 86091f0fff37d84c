//! # Identity-Keyed Registry
//!
//! Maps object identities to their access state and hands out scoped guards.
//!
//! ## Lifecycle
//!
//! ```text
//!   register() / track(id)      state created (or lazily on first guard)
//!          │
//!   scoped_read(id) ─┐
//!   scoped_write(id) ┼──► guards borrow the state, report conflicts
//!          │         ┘
//!   on_destroy(id)              state erased, handle index recycled
//! ```
//!
//! The registry is an ordinary value: build one (directly or through
//! [`crate::DetectorConfig::build`]), share it with `Arc`, and keep it alive
//! for as long as tracked objects exist.

use std::panic::Location;
use std::sync::Arc;

use crate::error::{RaceWatchError, RaceWatchResult};
use crate::identity::{IdAllocator, ObjectId, ThreadTag};
use crate::report::{Reporter, ViolationPolicy};
use crate::storage::{SideStorage, StorageBackend};
use crate::sync::{AccessKind, AccessSnapshot, AccessState, ScopedGuard};

/// Registry counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Identities with a live access state.
    pub tracked: usize,
    /// Registry-issued handles not yet destroyed.
    pub live_handles: usize,
    /// Violations reported since creation.
    pub violations: u64,
}

/// Process-lifetime owner of every tracked object's access state.
///
/// # Thread Safety
///
/// All methods take `&self` and may be called from any thread. The guarded
/// access path performs one side-storage lookup and a handful of atomic
/// operations; it never waits on another guard.
#[derive(Debug)]
pub struct Registry<S: SideStorage = StorageBackend> {
    storage: S,
    reporter: Reporter,
    ids: IdAllocator,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(
            StorageBackend::default(),
            Reporter::for_policy(ViolationPolicy::default()),
        )
    }
}

impl<S: SideStorage> Registry<S> {
    /// Creates a registry over `storage`, reporting through `reporter`.
    #[must_use]
    pub fn new(storage: S, reporter: Reporter) -> Self {
        tracing::debug!(backend = storage.name(), "race detector registry created");
        Self {
            storage,
            reporter,
            ids: IdAllocator::new(),
        }
    }

    /// Issues a fresh handle and creates its access state immediately.
    ///
    /// Use this for objects whose address is not stable. Pair with
    /// [`Registry::on_destroy`].
    pub fn register(&self) -> ObjectId {
        let id = self.ids.allocate();
        let _ = self.get_or_create(id);
        id
    }

    /// Creates the access state for `id` now instead of on first access.
    ///
    /// Call from the tracked object's constructor so the first guarded
    /// access never allocates.
    pub fn track(&self, id: ObjectId) -> Arc<AccessState> {
        self.get_or_create(id)
    }

    /// Returns the access state for `id`, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns [`RaceWatchError::NullIdentity`] for a null id, or
    /// [`RaceWatchError::StorageExhausted`] if the backing store is full.
    pub fn try_get_or_create(&self, id: ObjectId) -> RaceWatchResult<Arc<AccessState>> {
        if id.is_null() {
            return Err(RaceWatchError::NullIdentity);
        }
        self.storage.find_or_insert(id)
    }

    /// Returns the access state for `id`, creating it if absent.
    ///
    /// Running out of slots terminates the process: silently skipping an
    /// object would disable detection for it.
    ///
    /// # Panics
    ///
    /// Panics if `id` is null.
    pub fn get_or_create(&self, id: ObjectId) -> Arc<AccessState> {
        assert!(!id.is_null(), "cannot track a null object identity");

        match self.storage.find_or_insert(id) {
            Ok(state) => state,
            Err(err) => fatal(id, &err),
        }
    }

    /// Declares a read of `id` until the returned guard is dropped.
    #[track_caller]
    pub fn scoped_read(&self, id: ObjectId) -> ScopedGuard {
        self.scoped(id, AccessKind::Read)
    }

    /// Declares a write of `id` until the returned guard is dropped.
    #[track_caller]
    pub fn scoped_write(&self, id: ObjectId) -> ScopedGuard {
        self.scoped(id, AccessKind::Write)
    }

    /// Declares an access of `kind` on `id` until the guard is dropped.
    #[track_caller]
    pub fn scoped(&self, id: ObjectId, kind: AccessKind) -> ScopedGuard {
        let location = Location::caller();
        let state = self.get_or_create(id);

        ScopedGuard::enter(state, kind, ThreadTag::current(), |conflict| {
            self.reporter.report(id, conflict, Some(location));
        })
    }

    /// Removes the access state for `id` and recycles the index of a
    /// registry-issued handle.
    ///
    /// Unlike [`Registry::on_destroy`] this does not check for active guards.
    /// Returns `false` if nothing was tracked under `id`.
    pub fn destroy(&self, id: ObjectId) -> bool {
        let removed = self.storage.erase(id);
        let released = id.is_handle() && self.ids.release(id);
        tracing::trace!(object = %id, removed, released, "access state destroyed");
        removed
    }

    /// Teardown hook for a tracked object. Call exactly once, after every
    /// guard on `id` has been dropped.
    pub fn on_destroy(&self, id: ObjectId) -> bool {
        if cfg!(debug_assertions) {
            if let Some(state) = self.storage.find(id) {
                let snap = state.snapshot();
                debug_assert!(
                    snap.readers == 0 && !snap.writing,
                    "object {id} destroyed while guards are active: {snap:?}"
                );
            }
        }

        self.destroy(id)
    }

    /// Returns the current state of `id` without creating it.
    #[must_use]
    pub fn inspect(&self, id: ObjectId) -> Option<AccessSnapshot> {
        self.storage.find(id).map(|state| state.snapshot())
    }

    /// Returns true if `id` currently has an access state.
    #[must_use]
    pub fn is_tracked(&self, id: ObjectId) -> bool {
        self.storage.find(id).is_some()
    }

    /// Returns registry counters.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            tracked: self.storage.len(),
            live_handles: self.ids.live_count(),
            violations: self.reporter.reported(),
        }
    }

    /// Returns the reporter.
    #[must_use]
    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    /// Returns the backing store.
    #[must_use]
    pub fn storage(&self) -> &S {
        &self.storage
    }
}

#[cold]
fn fatal(id: ObjectId, err: &RaceWatchError) -> ! {
    tracing::error!(object = %id, %err, "cannot track object, terminating");
    eprintln!("ERROR: race detector cannot track object {id}: {err}");
    std::process::abort();
}
