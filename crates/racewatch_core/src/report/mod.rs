//! # Violation Reporting
//!
//! Single extension point for every detected conflict.
//!
//! ```text
//!   AccessState start transition
//!          │ Conflict
//!          ▼
//!      Reporter ── count ── tracing::warn! ── FileSink (optional, flushed)
//!          │
//!          ▼
//!   ViolationHandler:  AbortHandler | LogHandler | PanicHandler | RecordingHandler | custom
//! ```
//!
//! The durable sink is written before the handler runs, so an aborting policy
//! still leaves its record on disk. Access state and registry logic never
//! depend on which handler is installed.

mod handler;
mod sink;

use std::panic::Location;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::identity::{ObjectId, ThreadTag};
use crate::sync::{AccessKind, Conflict, ConflictKind};

pub use handler::{AbortHandler, LogHandler, PanicHandler, RecordingHandler, ViolationHandler};
pub use sink::{FileSink, DEFAULT_LOG_FILE};

/// A detected overlap of conflicting intents on one object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Object both accesses declared.
    pub object: ObjectId,
    /// The overlapping pair.
    pub conflict: ConflictKind,
    /// Access that was starting.
    pub attempted: AccessKind,
    /// Access that was already in flight.
    pub active: AccessKind,
    /// Thread that was starting its access.
    pub thread: ThreadTag,
    /// Last thread to touch the object before `thread`.
    pub previous_thread: ThreadTag,
    /// Name of `thread`, if it has one.
    pub thread_name: Option<String>,
    /// Source location of the conflicting guard, `file:line:column`.
    pub location: Option<String>,
    /// Wall-clock time of detection, milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

impl Violation {
    /// Builds a record for a conflict seen by the calling thread.
    #[must_use]
    pub fn new(
        object: ObjectId,
        conflict: ConflictKind,
        thread: ThreadTag,
        previous_thread: ThreadTag,
        location: Option<String>,
    ) -> Self {
        let timestamp_ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default();

        Self {
            object,
            conflict,
            attempted: conflict.attempted(),
            active: conflict.active(),
            thread,
            previous_thread,
            thread_name: std::thread::current().name().map(str::to_owned),
            location,
            timestamp_ms,
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} on object {} (thread {}",
            self.conflict, self.object, self.thread
        )?;
        if let Some(name) = &self.thread_name {
            write!(f, " '{name}'")?;
        }
        write!(f, ", previous toucher {})", self.previous_thread)?;
        if let Some(location) = &self.location {
            write!(f, " at {location}")?;
        }
        Ok(())
    }
}

/// Built-in handler selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationPolicy {
    /// Terminate the process.
    Abort,
    /// Log, write the sink if configured, and continue.
    Record,
    /// Panic on the violating thread.
    Panic,
}

impl Default for ViolationPolicy {
    #[cfg(not(feature = "record-violations"))]
    fn default() -> Self {
        Self::Abort
    }

    #[cfg(feature = "record-violations")]
    fn default() -> Self {
        Self::Record
    }
}

impl std::fmt::Display for ViolationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Abort => f.write_str("abort"),
            Self::Record => f.write_str("record"),
            Self::Panic => f.write_str("panic"),
        }
    }
}

/// Dispatches conflicts to the sink and the handler.
pub struct Reporter {
    handler: Arc<dyn ViolationHandler>,
    sink: Option<FileSink>,
    reported: AtomicU64,
}

impl Reporter {
    /// Creates a reporter around `handler`.
    #[must_use]
    pub fn new(handler: Arc<dyn ViolationHandler>) -> Self {
        Self {
            handler,
            sink: None,
            reported: AtomicU64::new(0),
        }
    }

    /// Creates a reporter for a built-in policy.
    ///
    /// `Record` installs a [`LogHandler`], so violations are kept only in the
    /// log and the sink. Use [`Reporter::new`] with a [`RecordingHandler`] to
    /// collect them in memory.
    #[must_use]
    pub fn for_policy(policy: ViolationPolicy) -> Self {
        let handler: Arc<dyn ViolationHandler> = match policy {
            ViolationPolicy::Abort => Arc::new(AbortHandler),
            ViolationPolicy::Record => Arc::new(LogHandler),
            ViolationPolicy::Panic => Arc::new(PanicHandler),
        };
        Self::new(handler)
    }

    /// Adds a durable sink.
    #[must_use]
    pub fn with_sink(mut self, sink: FileSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Returns the sink, if any.
    #[must_use]
    pub fn sink(&self) -> Option<&FileSink> {
        self.sink.as_ref()
    }

    /// Number of violations reported so far.
    #[inline]
    #[must_use]
    pub fn reported(&self) -> u64 {
        self.reported.load(Ordering::Relaxed)
    }

    /// Reports one conflict on `object`.
    pub fn report(&self, object: ObjectId, conflict: Conflict, location: Option<&Location<'_>>) {
        let violation = Violation::new(
            object,
            conflict.kind,
            conflict.thread,
            conflict.previous,
            location.map(ToString::to_string),
        );

        self.reported.fetch_add(1, Ordering::Relaxed);

        tracing::warn!(
            object = %violation.object,
            conflict = %violation.conflict,
            thread = %violation.thread,
            previous_thread = %violation.previous_thread,
            location = violation.location.as_deref().unwrap_or("unknown"),
            "data race detected"
        );

        if let Some(sink) = &self.sink {
            if let Err(err) = sink.write(&violation) {
                tracing::error!(%err, "failed to persist violation");
                eprintln!("racewatch: failed to persist violation ({err}): {violation}");
            }
        }

        self.handler.on_violation(&violation);
    }
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter")
            .field("sink", &self.sink.as_ref().map(FileSink::path))
            .field("reported", &self.reported())
            .finish_non_exhaustive()
    }
}
