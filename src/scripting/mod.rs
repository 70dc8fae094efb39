//! Per-run custom actions.
//!
//! Operators may attach one action to a run. It is evaluated exactly once, after the
//! magnet has been selected and before any temperature or field set-point is applied.
//!
//! # Architecture
//!
//! ```text
//! CustomAction trait
//!     ├── FnAction   (closure injected by the embedding application)
//!     └── RhaiAction (sandboxed Rhai snippet entered by the operator)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use emu_sequencer::scripting::{CustomAction, RhaiAction};
//!
//! let action = RhaiAction::compile(r#"log(`starting at ${start_temperature} K`)"#, 10_000)?;
//! action.execute(&parameters).await?;
//! ```

pub mod rhai_action;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::parameters::ScanParameters;

pub use rhai_action::RhaiAction;

/// Errors raised while preparing or evaluating a custom action.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// The snippet could not be parsed.
    #[error("Syntax error: {message}")]
    SyntaxError {
        /// Parser message including position.
        message: String,
    },

    /// The snippet (or injected closure) failed while running.
    #[error("Runtime error: {message}")]
    RuntimeError {
        /// Human-readable description of the failure.
        message: String,
    },

    /// The snippet referenced a variable that is not one of the run parameters.
    #[error("Variable not found: {name}")]
    VariableNotFound {
        /// Name and position of the missing variable.
        name: String,
    },

    /// The blocking evaluation task did not complete.
    #[error("Async error: {message}")]
    AsyncError {
        /// Join error description.
        message: String,
    },
}

/// One operator-supplied action, run once per scan.
#[async_trait]
pub trait CustomAction: Send + Sync {
    /// Evaluate the action. The run aborts if this fails.
    async fn execute(&self, parameters: &ScanParameters) -> Result<(), ScriptError>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

type ActionFn = dyn Fn(&ScanParameters) -> anyhow::Result<()> + Send + Sync;

/// A closure injected by the embedding application.
#[derive(Clone)]
pub struct FnAction {
    name: String,
    action: Arc<ActionFn>,
}

impl FnAction {
    /// Wrap `action`. `name` shows up in logs.
    pub fn new<F>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&ScanParameters) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            action: Arc::new(action),
        }
    }
}

impl fmt::Debug for FnAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAction").field("name", &self.name).finish()
    }
}

#[async_trait]
impl CustomAction for FnAction {
    async fn execute(&self, parameters: &ScanParameters) -> Result<(), ScriptError> {
        (self.action)(parameters).map_err(|e| ScriptError::RuntimeError {
            message: format!("{}: {e:#}", self.name),
        })
    }

    fn describe(&self) -> String {
        format!("closure '{}'", self.name)
    }
}
