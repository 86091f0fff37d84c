//! # Tracked Vector
//!
//! A growable array whose every method runs inside a scoped guard.

use std::sync::Arc;

use parking_lot::Mutex;
use racewatch_core::{ObjectId, Registry, SideStorage, StorageBackend};

/// Vector shared across threads by reference, with declared intents.
///
/// Writes (`push`, `pop`, `clear`, `reserve` and the delegating writers)
/// open a write guard; reads open a read guard. Some methods delegate to
/// others on purpose, so one call nests reads inside writes, writes inside
/// writes, and so on, all on the calling thread.
///
/// The vector registers itself on construction and tears its access state
/// down on drop.
///
/// # Example
///
/// ```rust,ignore
/// let registry = Arc::new(DetectorConfig::batch().build()?);
/// let vec = TrackedVec::new(Arc::clone(&registry));
///
/// vec.push(1);
/// assert_eq!(vec.last(), Some(1));
/// ```
pub struct TrackedVec<T, S: SideStorage = StorageBackend> {
    registry: Arc<Registry<S>>,
    id: ObjectId,
    data: Mutex<Vec<T>>,
}

impl<T, S: SideStorage> TrackedVec<T, S> {
    /// Creates an empty vector tracked by `registry`.
    #[must_use]
    pub fn new(registry: Arc<Registry<S>>) -> Self {
        Self::with_capacity(registry, 0)
    }

    /// Creates an empty vector with room for `capacity` elements.
    #[must_use]
    pub fn with_capacity(registry: Arc<Registry<S>>, capacity: usize) -> Self {
        // Create the entry now so no guarded access ever allocates one.
        let id = registry.register();
        tracing::trace!(object = %id, capacity, "tracked vector created");

        Self {
            registry,
            id,
            data: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    /// Identity of this vector in its registry.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Registry this vector reports to.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry<S>> {
        &self.registry
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Appends an element.
    #[track_caller]
    pub fn push(&self, value: T) {
        let _guard = self.registry.scoped_write(self.id);
        self.data.lock().push(value);
    }

    /// Appends two elements through two nested `push` calls.
    #[track_caller]
    pub fn push_pair(&self, first: T, second: T) {
        let _guard = self.registry.scoped_write(self.id);
        self.push(first);
        self.push(second);
    }

    /// Removes and returns the last element.
    #[track_caller]
    pub fn pop(&self) -> Option<T> {
        let _guard = self.registry.scoped_write(self.id);
        self.data.lock().pop()
    }

    /// Removes every element.
    #[track_caller]
    pub fn clear(&self) {
        let _guard = self.registry.scoped_write(self.id);
        self.data.lock().clear();
    }

    /// Reserves room for at least `additional` more elements.
    #[track_caller]
    pub fn reserve(&self, additional: usize) {
        let _guard = self.registry.scoped_write(self.id);
        self.data.lock().reserve(additional);
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Number of elements.
    #[track_caller]
    #[must_use]
    pub fn len(&self) -> usize {
        let _guard = self.registry.scoped_read(self.id);
        self.data.lock().len()
    }

    /// True if there are no elements.
    #[track_caller]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let _guard = self.registry.scoped_read(self.id);
        self.data.lock().is_empty()
    }

    /// Allocated capacity.
    #[track_caller]
    #[must_use]
    pub fn capacity(&self) -> usize {
        let _guard = self.registry.scoped_read(self.id);
        self.data.lock().capacity()
    }

    /// Length and capacity through two nested reads.
    #[track_caller]
    #[must_use]
    pub fn len_and_capacity(&self) -> (usize, usize) {
        let _guard = self.registry.scoped_read(self.id);
        (self.len(), self.capacity())
    }
}

impl<T: Clone, S: SideStorage> TrackedVec<T, S> {
    /// Appends an element and returns a copy of the new last element.
    #[track_caller]
    pub fn push_and_get(&self, value: T) -> T {
        let _guard = self.registry.scoped_write(self.id);
        let mut data = self.data.lock();
        data.push(value);
        data[data.len() - 1].clone()
    }

    /// Appends an element and returns the element that was last before it.
    ///
    /// Nests a read (`last`) and a write (`push`) inside a write.
    #[track_caller]
    pub fn push_returning_previous_last(&self, value: T) -> Option<T> {
        let _guard = self.registry.scoped_write(self.id);
        let previous = self.last();
        self.push(value);
        previous
    }

    /// Copy of the last element.
    #[track_caller]
    #[must_use]
    pub fn last(&self) -> Option<T> {
        let _guard = self.registry.scoped_read(self.id);
        self.data.lock().last().cloned()
    }

    /// Copy of the element at `index`.
    #[track_caller]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<T> {
        let _guard = self.registry.scoped_read(self.id);
        self.data.lock().get(index).cloned()
    }

    /// Copy of every element.
    #[track_caller]
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        let _guard = self.registry.scoped_read(self.id);
        self.data.lock().clone()
    }
}

impl<T: Clone + Default, S: SideStorage> TrackedVec<T, S> {
    /// Appends `T::default()` and returns the new last element.
    ///
    /// A read that writes: nests a write inside a read on the same thread.
    #[track_caller]
    pub fn last_or_push_default(&self) -> T {
        let _guard = self.registry.scoped_read(self.id);
        self.push(T::default());
        self.last().unwrap_or_default()
    }
}

impl<T, S: SideStorage> Drop for TrackedVec<T, S> {
    fn drop(&mut self) {
        self.registry.on_destroy(self.id);
        tracing::trace!(object = %self.id, "tracked vector destroyed");
    }
}

impl<T: std::fmt::Debug, S: SideStorage> std::fmt::Debug for TrackedVec<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedVec")
            .field("id", &self.id)
            .field("data", &*self.data.lock())
            .finish_non_exhaustive()
    }
}
