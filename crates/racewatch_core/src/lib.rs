//! # RACEWATCH Core
//!
//! Runtime data-race detection by declared intent. Call sites announce
//! "I am about to read/write object O"; the detector answers immediately
//! whether that overlaps a conflicting access already in flight on O.
//!
//! ## Architecture Rules
//!
//! 1. **Never block** - instrumentation is a few atomics, never a lock on the
//!    guarded path
//! 2. **No layout changes** - per-object state lives in side storage keyed
//!    by identity
//! 3. **Reentrancy is not a race** - nested accesses on one thread are exempt
//! 4. **Never swallow a race** - every conflict reaches the reporting policy
//!
//! Only races that actually happen at runtime are caught, and only between
//! declared intents on the same object. There is no happens-before analysis.
//!
//! ## Example
//!
//! ```rust,ignore
//! use racewatch_core::{DetectorConfig, ObjectId};
//!
//! let registry = DetectorConfig::from_toml_file("racewatch.toml")?.build()?;
//! let id = registry.register();
//!
//! {
//!     let _guard = registry.scoped_write(id);
//!     // mutate the object...
//! }
//!
//! registry.on_destroy(id);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod identity;
pub mod registry;
pub mod report;
pub mod storage;
pub mod sync;

pub use config::{DetectorConfig, StorageConfig, StorageKind};
pub use error::{RaceWatchError, RaceWatchResult};
pub use identity::{IdAllocator, ObjectId, ThreadTag};
pub use registry::{Registry, RegistryStats};
pub use report::{
    AbortHandler, FileSink, LogHandler, PanicHandler, RecordingHandler, Reporter, Violation,
    ViolationHandler, ViolationPolicy, DEFAULT_LOG_FILE,
};
pub use storage::{BoundedStorage, ShardedStorage, SideStorage, StorageBackend};
pub use sync::{AccessKind, AccessSnapshot, AccessState, Conflict, ConflictKind, ScopedGuard};
