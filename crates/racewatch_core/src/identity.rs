//! # Identities
//!
//! Two kinds of identity flow through the detector:
//!
//! - [`ObjectId`]: the opaque key of a tracked logical object
//! - [`ThreadTag`]: a cheap, atomically storable name for the calling thread
//!
//! An `ObjectId` is either issued by an [`IdAllocator`] (index + generation,
//! safe for objects that move or live in arenas) or derived from the address
//! of an object that is known not to move for its whole lifetime.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Tag bit set on every allocator-issued handle.
///
/// User-space addresses never have the top bit set, so issued handles and
/// address-derived identities cannot collide inside one registry.
const HANDLE_BIT: u64 = 1 << 63;

/// Mask for the 31 generation bits of an issued handle.
const GENERATION_MASK: u32 = 0x7FFF_FFFF;

/// Opaque identity of a tracked logical object.
///
/// Layout of an issued handle:
/// - Bit 63: handle tag
/// - Bits 32..63: generation counter for detecting stale references
/// - Lower 32 bits: slot index
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Null/invalid identity.
    pub const NULL: Self = Self(0);

    /// Creates an issued handle from index and generation.
    ///
    /// # Arguments
    ///
    /// * `index` - Slot index (0 to 2^32-1)
    /// * `generation` - Generation counter, truncated to 31 bits
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(HANDLE_BIT | (((generation & GENERATION_MASK) as u64) << 32) | (index as u64))
    }

    /// Derives an identity from the address of a value.
    ///
    /// Only valid while `value` stays at the same address, and only for
    /// non-zero-sized types (zero-sized values may share an address).
    #[inline]
    #[must_use]
    pub fn of<T>(value: &T) -> Self {
        Self::from_addr((value as *const T).cast::<()>() as usize)
    }

    /// Wraps a raw address as an identity.
    #[inline]
    #[must_use]
    pub const fn from_addr(addr: usize) -> Self {
        Self(addr as u64)
    }

    /// Rebuilds an identity from [`ObjectId::to_raw`] output.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw 64-bit value.
    #[inline]
    #[must_use]
    pub const fn to_raw(self) -> u64 {
        self.0
    }

    /// Returns true if this identity was issued by an [`IdAllocator`].
    #[inline]
    #[must_use]
    pub const fn is_handle(self) -> bool {
        self.0 & HANDLE_BIT != 0
    }

    /// Returns the index portion of an issued handle.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Returns the generation portion of an issued handle.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        ((self.0 >> 32) as u32) & GENERATION_MASK
    }

    /// Checks if this identity is null/invalid.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::NULL
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_handle() {
            write!(f, "#{}v{}", self.index(), self.generation())
        } else {
            write!(f, "{:#x}", self.0)
        }
    }
}

/// Source of fresh thread tags. Zero is reserved for [`ThreadTag::NONE`].
static NEXT_THREAD_TAG: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT_THREAD_TAG: ThreadTag =
        ThreadTag(NEXT_THREAD_TAG.fetch_add(1, Ordering::Relaxed));
}

/// Identity of an OS thread, as stored in access state.
///
/// `std::thread::ThreadId` cannot be stored in an atomic, so every thread
/// gets a process-unique `u64` on first use instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct ThreadTag(u64);

impl ThreadTag {
    /// No thread has touched the object yet.
    pub const NONE: Self = Self(0);

    /// Returns the tag of the calling thread.
    #[inline]
    #[must_use]
    pub fn current() -> Self {
        CURRENT_THREAD_TAG.with(|tag| *tag)
    }

    /// Rebuilds a tag from its raw value.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn to_raw(self) -> u64 {
        self.0
    }

    /// Checks if this is the "none" tag.
    #[inline]
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl Default for ThreadTag {
    fn default() -> Self {
        Self::NONE
    }
}

impl std::fmt::Display for ThreadTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_none() {
            f.write_str("none")
        } else {
            write!(f, "T{}", self.0)
        }
    }
}

/// Issues index/generation handles for tracked objects.
///
/// Freed indices are reused with a bumped generation, so a stale handle never
/// names the object that took over its slot.
///
/// # Thread Safety
///
/// Allocation and release take a short `parking_lot` lock. They happen at
/// object construction and destruction, never on the guarded access path.
#[derive(Debug, Default)]
pub struct IdAllocator {
    inner: Mutex<AllocatorSlots>,
}

#[derive(Debug, Default)]
struct AllocatorSlots {
    /// Current generation per index.
    generations: Vec<u32>,
    /// Indices available for reuse.
    free_list: Vec<u32>,
}

impl IdAllocator {
    /// Creates an empty allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a fresh handle.
    ///
    /// # Panics
    ///
    /// Panics if more than 2^32 objects are alive at once.
    pub fn allocate(&self) -> ObjectId {
        let mut slots = self.inner.lock();

        if let Some(index) = slots.free_list.pop() {
            let generation = slots.generations[index as usize];
            return ObjectId::new(index, generation);
        }

        let Ok(index) = u32::try_from(slots.generations.len()) else {
            panic!("object handle space exhausted");
        };
        slots.generations.push(0);
        ObjectId::new(index, 0)
    }

    /// Returns a handle's index to the free list.
    ///
    /// # Returns
    ///
    /// `false` if the handle is stale, foreign or already released.
    pub fn release(&self, id: ObjectId) -> bool {
        if !id.is_handle() {
            return false;
        }

        let mut slots = self.inner.lock();
        let index = id.index();

        match slots.generations.get_mut(index as usize) {
            Some(generation) if *generation == id.generation() => {
                *generation = generation.wrapping_add(1) & GENERATION_MASK;
                slots.free_list.push(index);
                true
            }
            _ => false,
        }
    }

    /// Returns true if the handle names a currently allocated slot.
    #[must_use]
    pub fn is_live(&self, id: ObjectId) -> bool {
        if !id.is_handle() {
            return false;
        }

        // Release bumps the generation, so a freed index never matches.
        let slots = self.inner.lock();
        slots.generations.get(id.index() as usize) == Some(&id.generation())
    }

    /// Returns the number of allocated, unreleased handles.
    #[must_use]
    pub fn live_count(&self) -> usize {
        let slots = self.inner.lock();
        slots.generations.len() - slots.free_list.len()
    }
}
