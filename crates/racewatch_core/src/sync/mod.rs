//! # Access Tracking Primitives
//!
//! No locks. The instrumentation must never become the bottleneck, or the
//! deadlock, it is trying to find.
//!
//! ## The Problem
//!
//! ```text
//! Thread 1:  WRITE to object O   ───────────────┐
//! Thread 2:  READ  from object O       ───┐     │  overlap: data race
//!                                          ▼     ▼
//! ```
//!
//! ## The Solution: Declared Intents
//!
//! ```text
//!   ScopedGuard::enter ──► AccessState::*_started ──► conflict? ──► report
//!          │
//!     guarded body
//!          │
//!   ScopedGuard::drop  ──► AccessState::*_ended
//! ```
//!
//! Every start transition is a couple of atomic read-modify-writes followed
//! by plain loads. Nothing spins, nothing sleeps.

mod access_state;
mod guard;

pub use access_state::{AccessKind, AccessSnapshot, AccessState, Conflict, ConflictKind};
pub use guard::ScopedGuard;
