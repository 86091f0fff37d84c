//! # Identity-Keyed Side Storage
//!
//! Attaches an [`AccessState`] to objects that have no room for one.
//!
//! ## Contract
//!
//! - `find_or_insert` is safe under concurrent calls with the same or
//!   different identities, and creates at most one state per identity
//!   between an insert and the matching erase
//! - `erase` drops the slot; the next insert for that identity starts fresh
//!
//! States are handed out as `Arc`s. A guard keeps its state alive even if
//! the identity is erased under it (a caller contract violation, but not a
//! use-after-free).
//!
//! ## Backends
//!
//! | Backend | Growth | Exhaustion |
//! |---------|--------|------------|
//! | [`ShardedStorage`] | unbounded, sharded hash map | never |
//! | [`BoundedStorage`] | fixed pool allocated up front | [`crate::RaceWatchError::StorageExhausted`] |

mod bounded;
mod sharded;

use std::sync::Arc;

use crate::error::RaceWatchResult;
use crate::identity::ObjectId;
use crate::sync::AccessState;

pub use bounded::BoundedStorage;
pub use sharded::ShardedStorage;

/// Side table from object identity to access state.
pub trait SideStorage: Send + Sync {
    /// Returns the state for `id`, creating a fresh one if absent.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RaceWatchError::StorageExhausted`] if no slot is available.
    fn find_or_insert(&self, id: ObjectId) -> RaceWatchResult<Arc<AccessState>>;

    /// Returns the state for `id` without creating one.
    fn find(&self, id: ObjectId) -> Option<Arc<AccessState>>;

    /// Removes the state for `id`. Returns `false` if none was stored.
    fn erase(&self, id: ObjectId) -> bool;

    /// Number of identities currently stored.
    fn len(&self) -> usize;

    /// True if nothing is stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// Storage chosen at runtime from configuration.
#[derive(Debug)]
pub enum StorageBackend {
    /// Unbounded sharded map.
    Sharded(ShardedStorage),
    /// Fixed-capacity pool.
    Bounded(BoundedStorage),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::Sharded(ShardedStorage::default())
    }
}

impl SideStorage for StorageBackend {
    #[inline]
    fn find_or_insert(&self, id: ObjectId) -> RaceWatchResult<Arc<AccessState>> {
        match self {
            Self::Sharded(s) => s.find_or_insert(id),
            Self::Bounded(s) => s.find_or_insert(id),
        }
    }

    #[inline]
    fn find(&self, id: ObjectId) -> Option<Arc<AccessState>> {
        match self {
            Self::Sharded(s) => s.find(id),
            Self::Bounded(s) => s.find(id),
        }
    }

    fn erase(&self, id: ObjectId) -> bool {
        match self {
            Self::Sharded(s) => s.erase(id),
            Self::Bounded(s) => s.erase(id),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Sharded(s) => s.len(),
            Self::Bounded(s) => s.len(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Sharded(s) => s.name(),
            Self::Bounded(s) => s.name(),
        }
    }
}
