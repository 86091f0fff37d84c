//! # Violation Handlers
//!
//! The swappable half of reporting: what happens after a violation has been
//! counted, logged and written to the sink.

use parking_lot::Mutex;

use super::Violation;

/// Policy invoked for every detected violation.
///
/// Implementations must be callable from any thread, including from inside
/// the guarded code of the thread that raced.
pub trait ViolationHandler: Send + Sync {
    /// Handles one violation. Returning lets the guarded body continue.
    fn on_violation(&self, violation: &Violation);
}

/// Terminates the process on the first violation.
///
/// A detected race means memory-unsafety may already be in progress, so this
/// is the default outside batch runs.
#[derive(Clone, Copy, Debug, Default)]
pub struct AbortHandler;

impl ViolationHandler for AbortHandler {
    fn on_violation(&self, violation: &Violation) {
        tracing::error!(%violation, "aborting on data race");
        eprintln!("ERROR: data race detected: {violation}");
        std::process::abort();
    }
}

/// Panics on the violating thread.
///
/// Unwinding runs every live guard's end transition, so the access state
/// stays balanced. Intended for `#[should_panic]` style tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct PanicHandler;

impl ViolationHandler for PanicHandler {
    fn on_violation(&self, violation: &Violation) {
        panic!("data race detected: {violation}");
    }
}

/// Lets the process continue after a violation.
///
/// Keeps nothing in memory: the reporter has already emitted the
/// `tracing` event and written the durable sink, if one is configured.
/// This is what the `record` policy installs.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogHandler;

impl ViolationHandler for LogHandler {
    fn on_violation(&self, violation: &Violation) {
        tracing::trace!(object = %violation.object, "continuing after data race");
    }
}

/// Keeps every violation in memory and lets the process continue.
///
/// Memory grows with every report until [`RecordingHandler::take`] drains
/// it. Hold an `Arc` to the recorder and pass it to [`super::Reporter::new`].
#[derive(Debug, Default)]
pub struct RecordingHandler {
    recorded: Mutex<Vec<Violation>>,
}

impl RecordingHandler {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of recorded violations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.recorded.lock().len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recorded.lock().is_empty()
    }

    /// Returns a copy of all recorded violations.
    #[must_use]
    pub fn violations(&self) -> Vec<Violation> {
        self.recorded.lock().clone()
    }

    /// Removes and returns all recorded violations.
    pub fn take(&self) -> Vec<Violation> {
        std::mem::take(&mut *self.recorded.lock())
    }
}

impl ViolationHandler for RecordingHandler {
    fn on_violation(&self, violation: &Violation) {
        self.recorded.lock().push(violation.clone());
    }
}
