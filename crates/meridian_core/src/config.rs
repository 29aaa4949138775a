//! # Configuration
//!
//! TOML-backed configuration, loaded once at startup.
//!
//! Every field has a default, so an empty file is a valid configuration.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// Default initial entity capacity.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Default number of ticks between despawn flushes.
pub const DEFAULT_DESPAWN_INTERVAL: u64 = 60;

/// Store sizing and despawn cadence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Initial entity capacity. Grows on demand.
    pub capacity: usize,
    /// Ticks between despawn flushes.
    pub despawn_interval: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            despawn_interval: DEFAULT_DESPAWN_INTERVAL,
        }
    }
}

impl StoreConfig {
    /// Rejects values the store cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero despawn interval.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.despawn_interval == 0 {
            return Err(ConfigError::Invalid {
                field: "store.despawn_interval",
                reason: "must be at least 1 tick".to_string(),
            });
        }
        Ok(())
    }
}

/// Parses a configuration value from TOML text.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] if the text does not match `T`.
pub fn from_toml_str<T: DeserializeOwned>(text: &str) -> Result<T, ConfigError> {
    Ok(toml::from_str(text)?)
}

/// Reads and parses a TOML configuration file.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read and
/// [`ConfigError::Parse`] if its contents do not match `T`.
pub fn load<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    from_toml_str(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_uses_defaults() {
        let config: StoreConfig = from_toml_str("").unwrap();
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config: StoreConfig = from_toml_str("despawn_interval = 30").unwrap();
        assert_eq!(config.despawn_interval, 30);
        assert_eq!(config.capacity, DEFAULT_CAPACITY);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = StoreConfig {
            despawn_interval: 0,
            ..StoreConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result: Result<StoreConfig, _> = load("/nonexistent/meridian.toml");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
