//! # Detector Configuration
//!
//! Loaded once at startup from TOML:
//!
//! ```toml
//! policy = "record"                       # abort | record | panic
//! log_path = "data-race-violations.log"   # optional durable sink
//!
//! [storage]
//! backend = "bounded"                     # sharded | bounded
//! capacity = 65536
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{RaceWatchError, RaceWatchResult};
use crate::registry::Registry;
use crate::report::{FileSink, Reporter, ViolationHandler, ViolationPolicy, DEFAULT_LOG_FILE};
use crate::storage::{BoundedStorage, ShardedStorage, StorageBackend};

/// Which side storage to build.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Unbounded sharded map.
    #[default]
    Sharded,
    /// Fixed pool; exhaustion is fatal.
    Bounded,
}

/// Side storage settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Backend kind.
    pub backend: StorageKind,
    /// Slot count for `bounded` (required), initial capacity for `sharded`.
    pub capacity: Option<usize>,
}

/// Complete detector configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectorConfig {
    /// What to do on a violation.
    pub policy: ViolationPolicy,
    /// Append violations to this file, one JSON record per line.
    pub log_path: Option<PathBuf>,
    /// Side storage settings.
    pub storage: StorageConfig,
}

impl DetectorConfig {
    /// Terminate on the first race, no log file, unbounded storage.
    #[must_use]
    pub fn production() -> Self {
        Self {
            policy: ViolationPolicy::Abort,
            log_path: None,
            storage: StorageConfig::default(),
        }
    }

    /// Record every race to the default log file and keep running.
    #[must_use]
    pub fn batch() -> Self {
        Self {
            policy: ViolationPolicy::Record,
            log_path: Some(PathBuf::from(DEFAULT_LOG_FILE)),
            storage: StorageConfig::default(),
        }
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`RaceWatchError::InvalidConfig`] on malformed or inconsistent
    /// input.
    pub fn from_toml_str(text: &str) -> RaceWatchResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| RaceWatchError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`RaceWatchError::Io`] if the file cannot be read, otherwise
    /// as [`DetectorConfig::from_toml_str`].
    pub fn from_toml_file(path: impl AsRef<Path>) -> RaceWatchResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| RaceWatchError::io(path, e))?;
        Self::from_toml_str(&text)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`RaceWatchError::InvalidConfig`] if a bounded store has no
    /// usable capacity.
    pub fn validate(&self) -> RaceWatchResult<()> {
        if self.storage.backend == StorageKind::Bounded {
            match self.storage.capacity {
                None => {
                    return Err(RaceWatchError::InvalidConfig(
                        "bounded storage requires `capacity`".to_string(),
                    ))
                }
                Some(0) => {
                    return Err(RaceWatchError::InvalidConfig(
                        "bounded storage capacity must be greater than zero".to_string(),
                    ))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Builds a registry with the configured policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the log file
    /// cannot be opened.
    pub fn build(&self) -> RaceWatchResult<Registry> {
        self.build_reporter(Reporter::for_policy(self.policy))
    }

    /// Builds a registry that uses `handler` instead of the configured
    /// policy. Storage and log settings still apply.
    ///
    /// # Errors
    ///
    /// As [`DetectorConfig::build`].
    pub fn build_with_handler(
        &self,
        handler: Arc<dyn ViolationHandler>,
    ) -> RaceWatchResult<Registry> {
        self.build_reporter(Reporter::new(handler))
    }

    fn build_reporter(&self, mut reporter: Reporter) -> RaceWatchResult<Registry> {
        self.validate()?;

        if let Some(path) = &self.log_path {
            reporter = reporter.with_sink(FileSink::open(path)?);
        }

        let storage = match (self.storage.backend, self.storage.capacity) {
            (StorageKind::Bounded, Some(capacity)) => {
                StorageBackend::Bounded(BoundedStorage::new(capacity))
            }
            (StorageKind::Sharded, Some(capacity)) => {
                StorageBackend::Sharded(ShardedStorage::with_capacity(capacity))
            }
            _ => StorageBackend::Sharded(ShardedStorage::new()),
        };

        tracing::debug!(
            policy = %self.policy,
            backend = ?self.storage.backend,
            log = self.log_path.is_some(),
            "building race detector registry"
        );

        Ok(Registry::new(storage, reporter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = DetectorConfig::from_toml_str(
            r#"
            policy = "panic"
            log_path = "races.log"

            [storage]
            backend = "bounded"
            capacity = 128
            "#,
        )
        .unwrap();

        assert_eq!(config.policy, ViolationPolicy::Panic);
        assert_eq!(config.log_path.as_deref(), Some(Path::new("races.log")));
        assert_eq!(config.storage.backend, StorageKind::Bounded);
        assert_eq!(config.storage.capacity, Some(128));
    }

    #[test]
    fn test_empty_config_is_default() {
        let config = DetectorConfig::from_toml_str("").unwrap();
        assert_eq!(config, DetectorConfig::default());
    }

    #[test]
    fn test_bounded_without_capacity_rejected() {
        let err = DetectorConfig::from_toml_str("[storage]\nbackend = \"bounded\"\n").unwrap_err();
        assert!(matches!(err, RaceWatchError::InvalidConfig(_)));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = DetectorConfig::from_toml_str("polcy = \"abort\"\n").unwrap_err();
        assert!(matches!(err, RaceWatchError::InvalidConfig(_)));
    }

    #[test]
    fn test_presets() {
        assert_eq!(DetectorConfig::production().policy, ViolationPolicy::Abort);
        let batch = DetectorConfig::batch();
        assert_eq!(batch.policy, ViolationPolicy::Record);
        assert_eq!(batch.log_path.as_deref(), Some(Path::new(DEFAULT_LOG_FILE)));
    }

    #[test]
    fn test_build_bounded_registry() {
        let config = DetectorConfig {
            policy: ViolationPolicy::Record,
            log_path: None,
            storage: StorageConfig {
                backend: StorageKind::Bounded,
                capacity: Some(4),
            },
        };
        let registry = config.build().unwrap();
        assert!(matches!(registry.storage(), StorageBackend::Bounded(s) if s.capacity() == 4));
    }
}
