//! # Bounded Side Storage
//!
//! Fixed-capacity backend. Every access state is allocated once at startup
//! and recycled through a free list, so tracking a new object never touches
//! the heap.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;

use super::SideStorage;
use crate::error::{RaceWatchError, RaceWatchResult};
use crate::identity::ObjectId;
use crate::sync::AccessState;

/// Side storage with a hard slot limit.
///
/// # Example
///
/// ```rust,ignore
/// let storage = BoundedStorage::new(10_000);
///
/// // O(1), no heap allocation
/// let state = storage.find_or_insert(id)?;
///
/// // Slot goes back to the pool
/// storage.erase(id);
/// ```
#[derive(Debug)]
pub struct BoundedStorage {
    /// Live identities.
    slots: DashMap<ObjectId, Arc<AccessState>>,
    /// Pre-allocated states ready for reuse.
    free_list: Mutex<Vec<Arc<AccessState>>>,
    /// Total capacity.
    capacity: usize,
}

impl BoundedStorage {
    /// Creates a storage with `capacity` pre-allocated slots.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");

        let free_list: Vec<_> = (0..capacity).map(|_| Arc::new(AccessState::new())).collect();

        Self {
            slots: DashMap::with_capacity(capacity),
            free_list: Mutex::new(free_list),
            capacity,
        }
    }

    /// Returns the total capacity.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of free slots.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free_list.lock().len()
    }
}

impl SideStorage for BoundedStorage {
    fn find_or_insert(&self, id: ObjectId) -> RaceWatchResult<Arc<AccessState>> {
        if let Some(state) = self.slots.get(&id) {
            return Ok(Arc::clone(state.value()));
        }

        match self.slots.entry(id) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let Some(state) = self.free_list.lock().pop() else {
                    return Err(RaceWatchError::StorageExhausted {
                        capacity: self.capacity,
                    });
                };
                Ok(Arc::clone(entry.insert(state).value()))
            }
        }
    }

    #[inline]
    fn find(&self, id: ObjectId) -> Option<Arc<AccessState>> {
        self.slots.get(&id).map(|state| Arc::clone(state.value()))
    }

    fn erase(&self, id: ObjectId) -> bool {
        let Some((_, mut state)) = self.slots.remove(&id) else {
            return false;
        };

        // A guard still holding the state (caller contract violation) keeps
        // the old one alive; the pool gets a fresh state instead.
        let recycled = Arc::get_mut(&mut state)
            .map(|slot| *slot = AccessState::new())
            .is_some();
        if !recycled {
            state = Arc::new(AccessState::new());
        }

        self.free_list.lock().push(state);
        true
    }

    fn len(&self) -> usize {
        self.slots.len()
    }

    fn name(&self) -> &'static str {
        "bounded"
    }
}
