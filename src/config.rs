//! Configuration System using Figment
//!
//! Configuration is layered, later layers overriding earlier ones:
//! 1. Built-in defaults
//! 2. `config/sequencer.toml` (or a path given on the command line)
//! 3. Environment variables prefixed with `EMU_SEQ_`, nested keys split on `__`
//!
//! # Example
//! ```no_run
//! use emu_sequencer::config::SequencerConfig;
//!
//! let config = SequencerConfig::load()?;
//! println!("Application: {}", config.application.name);
//! # Ok::<(), emu_sequencer::error::SequencerError>(())
//! ```
//!
//! An environment override looks like `EMU_SEQ_ENGINE__AUTO_ZERO_FIELD=true`.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{AppResult, SequencerError};
use crate::scan::composer::ComposerOptions;
use crate::scan::range::Stepping;
use crate::scan::validation::{ValidationPolicy, DEFAULT_ZERO_FIELD_TOLERANCE};
use crate::scripting::rhai_action::DEFAULT_MAX_OPERATIONS;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/sequencer.toml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "EMU_SEQ_";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SequencerConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Sequencing and validation behaviour
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "EMU Scan Sequencer".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Fields with an absolute value at or below this count as zero during validation
    #[serde(default = "default_zero_field_tolerance")]
    pub zero_field_tolerance: f64,
    /// A kept field requires the magnet device to be N/A
    #[serde(default = "default_true")]
    pub keep_requires_not_applicable: bool,
    /// Engage the active zero-field magnet automatically for near-zero field points
    #[serde(default)]
    pub auto_zero_field: bool,
    /// Fields below this (absolute, gauss) engage active zero field when enabled
    #[serde(default = "default_auto_zero_threshold")]
    pub auto_zero_threshold: f64,
    /// Event rate used to turn an event estimate into a run time (0 = not configured)
    #[serde(default)]
    pub event_rate_mev_per_hour: f64,
    /// Operation limit for custom action snippets
    #[serde(default = "default_script_max_operations")]
    pub script_max_operations: u64,
    /// How field scans step: `linear`, or `log` with `step_field` read as the number of fields
    #[serde(default)]
    pub field_stepping: Stepping,
}

// Default value functions
fn default_zero_field_tolerance() -> f64 {
    DEFAULT_ZERO_FIELD_TOLERANCE
}

fn default_true() -> bool {
    true
}

fn default_auto_zero_threshold() -> f64 {
    1e-3
}

fn default_script_max_operations() -> u64 {
    DEFAULT_MAX_OPERATIONS
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            zero_field_tolerance: default_zero_field_tolerance(),
            keep_requires_not_applicable: true,
            auto_zero_field: false,
            auto_zero_threshold: default_auto_zero_threshold(),
            event_rate_mev_per_hour: 0.0,
            script_max_operations: default_script_max_operations(),
            field_stepping: Stepping::Linear,
        }
    }
}

impl EngineConfig {
    /// Rule-set knobs derived from this configuration.
    pub fn validation_policy(&self) -> ValidationPolicy {
        ValidationPolicy {
            zero_field_tolerance: self.zero_field_tolerance,
            keep_requires_not_applicable: self.keep_requires_not_applicable,
            auto_zero_field: self.auto_zero_field,
        }
    }

    /// Run-time knobs derived from this configuration.
    pub fn composer_options(&self) -> ComposerOptions {
        ComposerOptions {
            auto_zero_threshold: self.auto_zero_field.then_some(self.auto_zero_threshold),
        }
    }

    /// Configured event rate, if any.
    pub fn event_rate(&self) -> Option<f64> {
        (self.event_rate_mev_per_hour > 0.0).then_some(self.event_rate_mev_per_hour)
    }
}

impl SequencerConfig {
    /// Load configuration from `config/sequencer.toml` and environment variables
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path. A missing file is not an error.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config: Self = Self::figment(path.as_ref()).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// The provider stack, exposed so callers can add their own layers.
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(SequencerConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(SequencerError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        let engine = &self.engine;
        if !(engine.zero_field_tolerance.is_finite() && engine.zero_field_tolerance > 0.0) {
            return Err(SequencerError::Configuration(format!(
                "Invalid zero_field_tolerance {}. Must be positive",
                engine.zero_field_tolerance
            )));
        }
        if !(engine.auto_zero_threshold.is_finite() && engine.auto_zero_threshold > 0.0) {
            return Err(SequencerError::Configuration(format!(
                "Invalid auto_zero_threshold {}. Must be positive",
                engine.auto_zero_threshold
            )));
        }
        if !engine.event_rate_mev_per_hour.is_finite() || engine.event_rate_mev_per_hour < 0.0 {
            return Err(SequencerError::Configuration(format!(
                "Invalid event_rate_mev_per_hour {}. Must be positive, or 0 to disable",
                engine.event_rate_mev_per_hour
            )));
        }
        if engine.script_max_operations == 0 {
            return Err(SequencerError::Configuration(
                "script_max_operations must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> AppResult<String> {
        toml::to_string_pretty(self).map_err(|e| SequencerError::Configuration(e.to_string()))
    }
}
