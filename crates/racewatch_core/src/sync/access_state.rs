//! # Per-Object Access State
//!
//! Lock-free reader/writer bookkeeping for one tracked object.
//!
//! ## Transitions
//!
//! ```text
//!   read_started   last_toucher := me   readers += 1   check writing
//!   write_started  last_toucher := me   writing := 1   check old writing, readers
//!   read_ended     readers -= 1
//!   write_ended    writing := 0
//! ```
//!
//! Each start transition publishes its own intent (increment or exchange)
//! BEFORE it looks at the other side. Two conflicting starts therefore cannot
//! both miss each other: whichever checks second sees the first one's mark.
//!
//! All atomics use `SeqCst`. The publish-then-check pattern spans two
//! different atomics (Dekker style), which acquire/release alone does not
//! order; relaxed would let both sides read stale values.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use crate::identity::ThreadTag;

/// Declared intent of a guarded access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessKind {
    /// Shared, non-mutating access.
    Read,
    /// Exclusive, mutating access.
    Write,
}

impl std::fmt::Display for AccessKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

/// Which pair of intents overlapped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// A read started while a write was active.
    ReadDuringWrite,
    /// A write started while another write was active.
    WriteDuringWrite,
    /// A write started while reads were active.
    WriteDuringRead,
}

impl ConflictKind {
    /// The access that was starting when the conflict was seen.
    #[inline]
    #[must_use]
    pub const fn attempted(self) -> AccessKind {
        match self {
            Self::ReadDuringWrite => AccessKind::Read,
            Self::WriteDuringWrite | Self::WriteDuringRead => AccessKind::Write,
        }
    }

    /// The access that was already in flight.
    #[inline]
    #[must_use]
    pub const fn active(self) -> AccessKind {
        match self {
            Self::ReadDuringWrite | Self::WriteDuringWrite => AccessKind::Write,
            Self::WriteDuringRead => AccessKind::Read,
        }
    }
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} during active {}", self.attempted(), self.active())
    }
}

/// A conflict observed by a start transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Conflict {
    /// The overlapping pair.
    pub kind: ConflictKind,
    /// Thread performing the start transition.
    pub thread: ThreadTag,
    /// Last thread to touch the object before this one.
    pub previous: ThreadTag,
}

/// Point-in-time copy of an [`AccessState`], for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct AccessSnapshot {
    /// Number of active readers.
    pub readers: usize,
    /// Whether a writer is active.
    pub writing: bool,
    /// Last thread to start an access.
    pub last_toucher: ThreadTag,
}

/// Concurrency state of one tracked object.
///
/// Mutated exclusively through the four transitions. The state never blocks
/// and never prevents an access; it only reports overlaps it can observe.
///
/// # Same-thread reentrancy
///
/// A conflict is not reported when the previous toucher is the calling
/// thread, which lets a write call a read helper (or another write) on the
/// same object. Known limitation: if thread B touches the object between two
/// nested accesses of thread A, the last-toucher value cannot tell whether B
/// is still active, so detection can be missed or over-reported in that
/// window.
#[derive(Debug, Default)]
pub struct AccessState {
    /// Number of active readers.
    readers: AtomicUsize,
    /// Whether a writer is active.
    writing: AtomicBool,
    /// Raw [`ThreadTag`] of the last thread to start an access.
    last_toucher: AtomicU64,
}

impl AccessState {
    /// Creates a fresh state: no readers, no writer, no toucher.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            readers: AtomicUsize::new(0),
            writing: AtomicBool::new(false),
            last_toucher: AtomicU64::new(0),
        }
    }

    /// Records `me` as last toucher and returns the previous one.
    #[inline]
    fn touch(&self, me: ThreadTag) -> ThreadTag {
        ThreadTag::from_raw(self.last_toucher.swap(me.to_raw(), Ordering::SeqCst))
    }

    /// Start of a read by `me`.
    ///
    /// Calls `on_conflict` if a writer from another thread is active.
    #[inline]
    pub fn read_started(&self, me: ThreadTag, mut on_conflict: impl FnMut(Conflict)) {
        let previous = self.touch(me);

        // Must be first: the increment has to be visible to a writer that
        // checks readers after setting its flag.
        self.readers.fetch_add(1, Ordering::SeqCst);

        if self.writing.load(Ordering::SeqCst) && previous != me {
            on_conflict(Conflict {
                kind: ConflictKind::ReadDuringWrite,
                thread: me,
                previous,
            });
        }
    }

    /// Start of a write by `me`.
    ///
    /// Calls `on_conflict` once per overlap found: another active writer,
    /// then active readers.
    #[inline]
    pub fn write_started(&self, me: ThreadTag, mut on_conflict: impl FnMut(Conflict)) {
        let previous = self.touch(me);

        // Must be first: exchange, so of two racing writers exactly one sees
        // the flag already set.
        let was_writing = self.writing.swap(true, Ordering::SeqCst);

        if previous == me {
            return;
        }

        if was_writing {
            on_conflict(Conflict {
                kind: ConflictKind::WriteDuringWrite,
                thread: me,
                previous,
            });
        }

        if self.readers.load(Ordering::SeqCst) > 0 {
            on_conflict(Conflict {
                kind: ConflictKind::WriteDuringRead,
                thread: me,
                previous,
            });
        }
    }

    /// End of a read.
    #[inline]
    pub fn read_ended(&self) {
        let before = self.readers.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(before > 0, "read_ended without matching read_started");
    }

    /// End of a write.
    #[inline]
    pub fn write_ended(&self) {
        self.writing.store(false, Ordering::SeqCst);
    }

    /// Start transition for `kind`.
    #[inline]
    pub fn started(&self, kind: AccessKind, me: ThreadTag, on_conflict: impl FnMut(Conflict)) {
        match kind {
            AccessKind::Read => self.read_started(me, on_conflict),
            AccessKind::Write => self.write_started(me, on_conflict),
        }
    }

    /// End transition for `kind`.
    #[inline]
    pub fn ended(&self, kind: AccessKind) {
        match kind {
            AccessKind::Read => self.read_ended(),
            AccessKind::Write => self.write_ended(),
        }
    }

    /// True if no writer is active.
    #[inline]
    #[must_use]
    pub fn can_read(&self) -> bool {
        !self.writing.load(Ordering::SeqCst)
    }

    /// True if no reader is active.
    #[inline]
    #[must_use]
    pub fn can_write(&self) -> bool {
        self.readers.load(Ordering::SeqCst) == 0
    }

    /// Copies the current field values.
    ///
    /// The three loads are not a single atomic snapshot.
    #[must_use]
    pub fn snapshot(&self) -> AccessSnapshot {
        AccessSnapshot {
            readers: self.readers.load(Ordering::SeqCst),
            writing: self.writing.load(Ordering::SeqCst),
            last_toucher: ThreadTag::from_raw(self.last_toucher.load(Ordering::SeqCst)),
        }
    }
}
