//! # Violation Log
//!
//! Durable, append-only sink. One JSON object per line:
//!
//! ```text
//! {"object":9223372041149743107,"conflict":"read_during_write","attempted":"read","active":"write","thread":4,"previous_thread":2,...}
//! ```

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::Violation;
use crate::error::{RaceWatchError, RaceWatchResult};

/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "data-race-violations.log";

/// Line-oriented violation log.
///
/// Every record is flushed before `write` returns, so the line survives an
/// abort that follows immediately.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl FileSink {
    /// Opens (or creates) the log at `path` for appending.
    ///
    /// # Errors
    ///
    /// Returns [`RaceWatchError::Io`] if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> RaceWatchResult<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| RaceWatchError::io(&path, e))?;

        tracing::debug!(path = %path.display(), "violation log opened");

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Returns the log path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record and flushes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be encoded or written.
    pub fn write(&self, violation: &Violation) -> RaceWatchResult<()> {
        let line =
            serde_json::to_string(violation).map_err(|e| RaceWatchError::Serialize(e.to_string()))?;

        let mut writer = self.writer.lock();
        write_line(&mut *writer, &line).map_err(|e| RaceWatchError::io(&self.path, e))
    }

    /// Reads every record from a log file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a line is malformed.
    pub fn read_all(path: impl AsRef<Path>) -> RaceWatchResult<Vec<Violation>> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| RaceWatchError::io(path, e))?;

        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| RaceWatchError::io(path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(&line)
                .map_err(|e| RaceWatchError::Serialize(e.to_string()))?;
            records.push(record);
        }

        Ok(records)
    }
}

fn write_line(writer: &mut impl Write, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()
}
