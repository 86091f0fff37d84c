//! # RACEWATCH Collections
//!
//! Containers that declare every access to a [`racewatch_core::Registry`].
//!
//! ## Why instrument a memory-safe container?
//!
//! Each method is safe on its own: the data sits behind a lock. What the
//! type system cannot see is a compound sequence racing a writer:
//!
//! ```text
//! Reader:  if !v.is_empty() {          Writer:  v.clear();
//!              v.get(v.len() - 1)                 ▲ lands between the calls
//!          }
//! ```
//!
//! The detector flags the overlap of the reader's and the writer's declared
//! intents, which is exactly this check-then-act race.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

mod tracked_vec;

pub use tracked_vec::TrackedVec;
