//! Custom error types for the sequencer.
//!
//! This module defines the primary error type, `SequencerError`, for the whole crate.
//! Using the `thiserror` crate, it provides a centralized and consistent way to handle
//! the different kinds of failures a scan invocation can run into.
//!
//! ## Error Hierarchy
//!
//! `SequencerError` keeps two classes of problem strictly apart:
//!
//! - **`InputFormat`**: Operator-entered text could not be cast to its typed value
//!   (e.g. `"abc"` for a start temperature). These are fatal to the current invocation
//!   and are surfaced immediately, never accumulated.
//! - Domain-rule violations are *not* errors at all. They are collected by
//!   [`crate::scan::validation::validate`] into a single combined message.
//!
//! The remaining variants cover the ambient stack:
//!
//! - **`Config`**: Wraps errors from `figment` while loading or extracting configuration.
//! - **`Configuration`**: Semantic problems with an otherwise well-formed configuration.
//! - **`Instrument`**: A collaborator (cryostat, magnet power supply, DAE) call failed.
//!   There are no retries; the whole run is aborted.
//! - **`Script`**: The per-run custom action failed to compile or evaluate.
//! - **`Cancelled`**: The run was cancelled at a point boundary.
//! - **`Io`**: Wraps standard `std::io::Error` (parameter files, config files).

use crate::scripting::ScriptError;
use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type AppResult<T> = std::result::Result<T, SequencerError>;

/// Every failure the sequencer reports. Rule violations are not errors.
#[derive(Error, Debug)]
pub enum SequencerError {
    #[error("Invalid value '{value}' for {parameter}: {reason}")]
    InputFormat {
        parameter: String,
        value: String,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("Instrument error: {0}")]
    Instrument(String),

    #[error("Custom action failed: {0}")]
    Script(#[from] ScriptError),

    /// `completed` counts the points measured before the cancellation was seen.
    #[error("Run cancelled after {completed} measurement point(s)")]
    Cancelled { completed: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SequencerError {
    /// Build an input-format error for a named parameter.
    pub fn input_format(
        parameter: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InputFormat {
            parameter: parameter.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a failed collaborator call, naming the operation that failed.
    pub fn instrument(operation: &str, source: anyhow::Error) -> Self {
        Self::Instrument(format!("{operation} failed: {source:#}"))
    }

    /// True for errors caused by operator-entered text.
    pub fn is_input_format(&self) -> bool {
        matches!(self, Self::InputFormat { .. })
    }
}
