//! # Core Error Types
//!
//! Errors raised by the store and configuration loading.
//!
//! Stale handles are deliberately absent: operations on them are no-ops.

use thiserror::Error;

/// Errors that can occur in the entity/component store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Every addressable slot index is in use or retired.
    #[error("entity capacity exhausted: limit {limit} slots")]
    CapacityExhausted {
        /// Number of addressable slots.
        limit: usize,
    },
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration text is not valid TOML for the schema.
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is out of its allowed range.
    #[error("invalid configuration value for {field}: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}
