//! # Networking Configuration
//!
//! One TOML document configures the whole stack:
//!
//! ```toml
//! [store]
//! capacity = 4096
//!
//! [sync]
//! sync_interval = 2
//! thresholds = { position = 0.5 }
//!
//! [prediction]
//! divergence_threshold = 3.0
//! ```
//!
//! Every section and field is optional.

use std::path::Path;

use meridian_core::config::{self, StoreConfig};
use meridian_core::{ComponentKind, ConfigError};
use serde::{Deserialize, Serialize};

/// Default simulation rate in ticks per second.
pub const DEFAULT_TICK_RATE: u32 = 60;

/// Full configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeridianConfig {
    /// Store sizing and despawn cadence.
    pub store: StoreConfig,
    /// Tick pacing.
    pub tick: TickConfig,
    /// Replication cadence and dead-bands.
    pub sync: SyncConfig,
    /// Spatial interest.
    pub interest: InterestConfig,
    /// Client prediction.
    pub prediction: PredictionConfig,
    /// Client smoothing of remote entities.
    pub interpolation: InterpolationConfig,
    /// Input pacing on both ends.
    pub input: InputConfig,
    /// Channel sizing.
    pub channels: ChannelConfig,
}

impl MeridianConfig {
    /// Parses and validates a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed text and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = config::from_toml_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: Self = config::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the stack cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store.validate()?;
        if self.tick.tick_rate == 0 {
            return Err(invalid("tick.tick_rate", "must be at least 1"));
        }
        if self.sync.sync_interval == 0 {
            return Err(invalid("sync.sync_interval", "must be at least 1 tick"));
        }
        if self.interest.cell_size.is_nan() || self.interest.cell_size <= 0.0 {
            return Err(invalid("interest.cell_size", "must be positive"));
        }
        if self.prediction.history_size == 0 {
            return Err(invalid("prediction.history_size", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.prediction.interpolation_alpha) {
            return Err(invalid("prediction.interpolation_alpha", "must lie in [0, 1]"));
        }
        if self.prediction.epsilon > self.prediction.divergence_threshold {
            return Err(invalid(
                "prediction.epsilon",
                "must not exceed divergence_threshold",
            ));
        }
        self.interpolation.validate()?;
        if self.input.throttle_rate == 0 {
            return Err(invalid("input.throttle_rate", "must be at least 1"));
        }
        if self.channels.inbox_capacity == 0 {
            return Err(invalid("channels.inbox_capacity", "must be at least 1"));
        }
        Ok(())
    }

    /// Fixed tick delta in milliseconds.
    #[must_use]
    pub fn tick_delta_ms(&self) -> f64 {
        1000.0 / f64::from(self.tick.tick_rate.max(1))
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

/// Tick pacing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Ticks per second.
    pub tick_rate: u32,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
        }
    }
}

/// Replication cadence and per-kind dead-bands.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Ticks between sync passes.
    pub sync_interval: u64,
    /// Per-kind resend thresholds.
    pub thresholds: Thresholds,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_interval: 2,
            thresholds: Thresholds::default(),
        }
    }
}

/// Minimum per-field change before a component is resent.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct Thresholds {
    pub position: f64,
    pub velocity: f64,
    pub rotation: f64,
    pub stats: f64,
    pub projectile: f64,
    pub health: f64,
    pub energy: f64,
    pub movement: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            position: 1.0,
            velocity: 0.1,
            rotation: 0.01,
            stats: 1.0,
            projectile: 1.0,
            health: 1.0,
            energy: 1.0,
            movement: 0.1,
        }
    }
}

impl Thresholds {
    /// Threshold for `kind`, or `None` if the kind is not replicated by value.
    #[must_use]
    pub const fn get(&self, kind: ComponentKind) -> Option<f64> {
        match kind {
            ComponentKind::Position => Some(self.position),
            ComponentKind::Velocity => Some(self.velocity),
            ComponentKind::Rotation => Some(self.rotation),
            ComponentKind::Stats => Some(self.stats),
            ComponentKind::Projectile => Some(self.projectile),
            ComponentKind::Health => Some(self.health),
            ComponentKind::Energy => Some(self.energy),
            ComponentKind::Movement => Some(self.movement),
            _ => None,
        }
    }

    /// Every threshold set to `value`.
    #[must_use]
    pub const fn uniform(value: f64) -> Self {
        Self {
            position: value,
            velocity: value,
            rotation: value,
            stats: value,
            projectile: value,
            health: value,
            energy: value,
            movement: value,
        }
    }
}

/// Spatial interest grid.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterestConfig {
    /// Cell edge length in world units.
    pub cell_size: f64,
    /// Neighbouring cells visible in each direction.
    pub radius: u32,
}

impl Default for InterestConfig {
    fn default() -> Self {
        Self {
            cell_size: 500.0,
            radius: 1,
        }
    }
}

/// Client prediction and reconciliation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Predict locally at all.
    pub enabled: bool,
    /// Inputs kept for replay.
    pub history_size: usize,
    /// Divergence above which the client rolls back and replays.
    pub divergence_threshold: f64,
    /// Fraction of the gap closed per soft correction.
    pub interpolation_alpha: f64,
    /// Divergence at or below which nothing is corrected.
    pub epsilon: f64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            history_size: 60,
            divergence_threshold: 5.0,
            interpolation_alpha: 0.15,
            epsilon: 0.1,
        }
    }
}

/// Smoothing of remote entities on the client.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolationConfig {
    /// Smooth remote entities at all.
    pub enabled: bool,
    /// Fraction of the remaining distance covered per tick.
    pub speed: f64,
    /// Distance below which the visual position snaps onto the target.
    pub snap_threshold: f64,
    /// Distance above which the visual position jumps straight to the target.
    pub rollback_threshold: f64,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            speed: 0.25,
            snap_threshold: 0.5,
            rollback_threshold: 100.0,
        }
    }
}

impl InterpolationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.speed.is_nan() || self.speed <= 0.0 || self.speed > 1.0 {
            return Err(invalid("interpolation.speed", "must lie in (0, 1]"));
        }
        if self.snap_threshold.is_nan() || self.snap_threshold < 0.0 {
            return Err(invalid("interpolation.snap_threshold", "must not be negative"));
        }
        if self.rollback_threshold.is_nan() || self.rollback_threshold <= self.snap_threshold {
            return Err(invalid(
                "interpolation.rollback_threshold",
                "must exceed snap_threshold",
            ));
        }
        Ok(())
    }
}

/// Input pacing.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Client: maximum sends per second on input change.
    pub throttle_rate: u32,
    /// Client: resend interval for unchanged input, in milliseconds.
    pub keepalive_ms: f64,
    /// Server: minimum spacing of accepted inputs per connection, in milliseconds.
    pub server_throttle_ms: f64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            throttle_rate: 30,
            keepalive_ms: 1000.0,
            server_throttle_ms: 100.0 / f64::from(DEFAULT_TICK_RATE),
        }
    }
}

/// Channel sizing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Bound of every inbox and outbox.
    pub inbox_capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            inbox_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config = MeridianConfig::from_toml_str("").unwrap();
        assert_eq!(config, MeridianConfig::default());
        assert_eq!(config.sync.thresholds.get(ComponentKind::Rotation), Some(0.01));
        assert_eq!(config.sync.thresholds.get(ComponentKind::Sync), None);
    }

    #[test]
    fn test_nested_override() {
        let config = MeridianConfig::from_toml_str(
            r"
            [store]
            capacity = 64

            [sync.thresholds]
            position = 0.25

            [prediction]
            history_size = 10
            ",
        )
        .unwrap();
        assert_eq!(config.store.capacity, 64);
        assert_eq!(config.sync.thresholds.position, 0.25);
        assert_eq!(config.sync.thresholds.velocity, 0.1);
        assert_eq!(config.prediction.history_size, 10);
        assert_eq!(config.prediction.divergence_threshold, 5.0);
        assert_eq!(config.interpolation, InterpolationConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = MeridianConfig::from_toml_str("[tick]\ntick_rate = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "tick.tick_rate", .. }));

        let err = MeridianConfig::from_toml_str("[prediction]\ninterpolation_alpha = 2.0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));

        let err = MeridianConfig::from_toml_str("[interpolation]\nspeed = 0.0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "interpolation.speed", .. }));

        let err = MeridianConfig::from_toml_str("[interpolation]\nrollback_threshold = 0.25").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "interpolation.rollback_threshold",
                ..
            }
        ));
    }

    #[test]
    fn test_tick_delta() {
        let config = MeridianConfig::default();
        assert!((config.tick_delta_ms() - 16.666_666).abs() < 1e-3);
    }
}
