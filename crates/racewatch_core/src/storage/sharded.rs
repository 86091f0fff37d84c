//! # Sharded Side Storage
//!
//! Unbounded backend over a sharded concurrent hash map.

use std::sync::Arc;

use dashmap::DashMap;

use super::SideStorage;
use crate::error::RaceWatchResult;
use crate::identity::ObjectId;
use crate::sync::AccessState;

/// Unbounded side storage.
///
/// Lookups of an existing identity take a shard read lock only; creation
/// goes through the entry API, so two threads racing to create the same
/// identity end up sharing one state.
#[derive(Debug, Default)]
pub struct ShardedStorage {
    slots: DashMap<ObjectId, Arc<AccessState>>,
}

impl ShardedStorage {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a storage with room for `capacity` identities before resizing.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: DashMap::with_capacity(capacity),
        }
    }
}

impl SideStorage for ShardedStorage {
    #[inline]
    fn find_or_insert(&self, id: ObjectId) -> RaceWatchResult<Arc<AccessState>> {
        if let Some(state) = self.slots.get(&id) {
            return Ok(Arc::clone(state.value()));
        }

        let entry = self
            .slots
            .entry(id)
            .or_insert_with(|| Arc::new(AccessState::new()));
        Ok(Arc::clone(entry.value()))
    }

    #[inline]
    fn find(&self, id: ObjectId) -> Option<Arc<AccessState>> {
        self.slots.get(&id).map(|state| Arc::clone(state.value()))
    }

    fn erase(&self, id: ObjectId) -> bool {
        self.slots.remove(&id).is_some()
    }

    fn len(&self) -> usize {
        self.slots.len()
    }

    fn name(&self) -> &'static str {
        "sharded"
    }
}
