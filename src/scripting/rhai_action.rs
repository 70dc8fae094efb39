//! Sandboxed Rhai custom actions.
//!
//! The snippet is compiled once when the parameters are cast, so a syntax error is
//! reported before anything on the instrument moves. Evaluation happens on a blocking
//! task with an operation limit.
//!
//! # Sandbox
//!
//! - `eval` is disabled
//! - At most `max_operations` operations per evaluation
//! - `print` and `debug` go to `tracing` instead of stdout
//! - The only registered function is `log(message)`
//!
//! The run parameters are visible to the snippet as constants: `start_temperature`,
//! `stop_temperature`, `step_temperature`, `start_field`, `stop_field`, `step_field`,
//! `mevents` and `magnet_device`. A kept endpoint is `()`.

use async_trait::async_trait;
use rhai::{Dynamic, Engine, EvalAltResult, Scope, AST};
use std::sync::Arc;
use tracing::{debug, info, Instrument};

use super::{CustomAction, ScriptError};
use crate::parameters::ScanParameters;

/// Operation limit when none is configured.
pub const DEFAULT_MAX_OPERATIONS: u64 = 10_000;

/// A compiled operator snippet.
pub struct RhaiAction {
    source: String,
    engine: Arc<Engine>,
    ast: Arc<AST>,
}

impl std::fmt::Debug for RhaiAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RhaiAction")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl RhaiAction {
    /// Compile `source` with the given operation limit.
    pub fn compile(source: &str, max_operations: u64) -> Result<Self, ScriptError> {
        let engine = Self::sandboxed_engine(max_operations);
        let ast = engine
            .compile(source)
            .map_err(|parse_error| ScriptError::SyntaxError {
                message: format!("Parse error: {parse_error}"),
            })?;

        Ok(Self {
            source: source.to_string(),
            engine: Arc::new(engine),
            ast: Arc::new(ast),
        })
    }

    /// The snippet as entered.
    pub fn source(&self) -> &str {
        &self.source
    }

    fn sandboxed_engine(max_operations: u64) -> Engine {
        let mut engine = Engine::new();

        // Limit operations to prevent infinite loops
        engine.on_progress(move |count| {
            if count > max_operations {
                Some(format!("Safety limit exceeded: maximum {max_operations} operations").into())
            } else {
                None
            }
        });

        engine.disable_symbol("eval");

        engine.on_print(|text| info!(target: "emu_sequencer::custom", "{text}"));
        engine.on_debug(|text, _source, pos| {
            debug!(target: "emu_sequencer::custom", position = %pos, "{text}");
        });
        engine.register_fn("log", |message: &str| {
            info!(target: "emu_sequencer::custom", "{message}");
        });

        engine
    }

    fn scope_for(parameters: &ScanParameters) -> Scope<'static> {
        fn keep_or(value: Option<f64>) -> Dynamic {
            value.map_or(Dynamic::UNIT, Dynamic::from)
        }

        let mut scope = Scope::new();
        scope.push_constant_dynamic("start_temperature", keep_or(parameters.temperature.start));
        scope.push_constant_dynamic("stop_temperature", keep_or(parameters.temperature.stop));
        scope.push_constant("step_temperature", parameters.temperature.step);
        scope.push_constant_dynamic("start_field", keep_or(parameters.field.start));
        scope.push_constant_dynamic("stop_field", keep_or(parameters.field.stop));
        scope.push_constant("step_field", parameters.field.step);
        scope.push_constant("mevents", parameters.mevents);
        scope.push_constant("magnet_device", parameters.magnet_device.code().to_string());
        scope
    }

    #[allow(clippy::boxed_local)] // Box is how Rhai returns errors
    fn convert_rhai_error(err: Box<EvalAltResult>) -> ScriptError {
        match *err {
            EvalAltResult::ErrorParsing(parse_error, pos) => ScriptError::SyntaxError {
                message: format!("{parse_error} at position {pos}"),
            },
            EvalAltResult::ErrorRuntime(msg, pos) | EvalAltResult::ErrorTerminated(msg, pos) => {
                ScriptError::RuntimeError {
                    message: format!("{msg} at position {pos}"),
                }
            }
            EvalAltResult::ErrorVariableNotFound(name, pos) => ScriptError::VariableNotFound {
                name: format!("{name} at position {pos}"),
            },
            other => ScriptError::RuntimeError {
                message: other.to_string(),
            },
        }
    }
}

#[async_trait]
impl CustomAction for RhaiAction {
    async fn execute(&self, parameters: &ScanParameters) -> Result<(), ScriptError> {
        let engine = self.engine.clone();
        let ast = self.ast.clone();
        let mut scope = Self::scope_for(parameters);
        let span = tracing::Span::current();

        // Execute in a blocking task to avoid blocking the async runtime
        tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            engine
                .run_ast_with_scope(&mut scope, &ast)
                .map_err(Self::convert_rhai_error)
        })
        .in_current_span()
        .await
        .map_err(|e| ScriptError::AsyncError {
            message: format!("Task join error: {e}"),
        })?
    }

    fn describe(&self) -> String {
        format!("rhai snippet '{}'", self.source.trim())
    }
}
