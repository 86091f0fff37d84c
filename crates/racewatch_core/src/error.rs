//! # Detector Error Types
//!
//! Errors surfaced by fallible detector operations. Conflicts themselves are
//! not errors: they go through the reporting policy (see [`crate::report`]).

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while building or running the detector.
#[derive(Error, Debug)]
pub enum RaceWatchError {
    /// The bounded side storage has no free slot for a new identity.
    #[error("side storage exhausted: all {capacity} slots are tracking live objects")]
    StorageExhausted {
        /// Configured slot capacity.
        capacity: usize,
    },

    /// A null identity was passed where a live object is required.
    #[error("null object identity cannot be tracked")]
    NullIdentity,

    /// A file (config or violation log) could not be read or written.
    #[error("i/o error on {path}: {source}")]
    Io {
        /// The file involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A violation record could not be encoded.
    #[error("failed to encode violation record: {0}")]
    Serialize(String),
}

impl RaceWatchError {
    /// Wraps an I/O error with the path it happened on.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for detector operations.
pub type RaceWatchResult<T> = Result<T, RaceWatchError>;
