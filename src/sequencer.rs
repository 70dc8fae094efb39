//! The caller-facing facade: validate, estimate and run a parameter set.
//!
//! Every entry point takes the operator's raw text and casts it first. A cast failure
//! is returned as an error; domain-rule violations from [`Sequencer::validate`] are
//! returned as a message instead. [`Sequencer::run`] does not re-validate.

use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::config::EngineConfig;
use crate::error::AppResult;
use crate::hardware::capabilities::Instruments;
use crate::parameters::{RawParameters, ScanParameters};
use crate::scan::composer::{RunSummary, ScanComposer, ScanControl};
use crate::scan::estimate;
use crate::scan::magnet::device_code_list;
use crate::scan::range::Stepping;
use crate::scan::validation::{self, ValidationContext, ValidationResult};
use crate::scripting::{CustomAction, RhaiAction};

/// Scan sequencer bound to one set of instruments.
pub struct Sequencer {
    engine: EngineConfig,
    instruments: Instruments,
    action: Option<Arc<dyn CustomAction>>,
    control: ScanControl,
}

impl Sequencer {
    /// Sequencer with default engine settings and no injected action.
    pub fn new(instruments: Instruments) -> Self {
        Self {
            engine: EngineConfig::default(),
            instruments,
            action: None,
            control: ScanControl::new(),
        }
    }

    /// Replace the engine settings.
    pub fn with_engine_config(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Use `action` as the per-run custom action instead of the operator's snippet.
    pub fn with_action(mut self, action: Arc<dyn CustomAction>) -> Self {
        self.action = Some(action);
        self
    }

    /// Engine settings in effect.
    pub fn engine_config(&self) -> &EngineConfig {
        &self.engine
    }

    /// Handle that cancels the run in progress at its next point boundary.
    pub fn control(&self) -> ScanControl {
        self.control.clone()
    }

    /// Operator help text.
    pub fn help(&self) -> String {
        let mut text = format!(
            "Magnet device must be one of {} or if the field is KEEP then it can be N/A.\n",
            device_code_list()
        );
        if self.engine.auto_zero_field {
            text.push_str("If the field is zero, active ZF will be engaged automatically.\n");
        } else {
            text.push_str("If the field is zero magnet device must be ZF.\n");
        }
        if self.engine.field_stepping == Stepping::Log {
            text.push_str(
                "Fields step logarithmically from start to stop, step_field (n_fields) is the number of fields.\n",
            );
        }
        text.push_str(
            "The 'Total Estimated Run Time' is the total number of events in the script \
             written as a sexagesimal number",
        );
        if self.engine.event_rate().is_some() {
            text.push_str(", converted to time using the configured event rate");
        }
        text.push_str(".\n");
        text
    }

    /// Check a cast parameter set against the rules.
    pub fn check(&self, parameters: &ScanParameters) -> ValidationResult {
        let context = ValidationContext::new(
            parameters.temperature,
            parameters.field,
            parameters.magnet_device,
        )
        .with_policy(self.engine.validation_policy());
        validation::validate(&context)
    }

    /// `Ok(None)` when valid, `Ok(Some(message))` listing every violated rule.
    ///
    /// A snippet that does not compile is an error, like any other unreadable input.
    #[instrument(skip_all)]
    pub fn validate(&self, raw: &RawParameters) -> AppResult<Option<String>> {
        let parameters = self.cast(raw)?;
        self.prepare_action(&parameters)?;
        let message = self.check(&parameters).message();
        if let Some(message) = &message {
            info!(reasons = %message.trim_end(), "Parameters invalid");
        }
        Ok(message)
    }

    /// Total millions of events the run would collect.
    pub fn estimate(&self, raw: &RawParameters) -> AppResult<f64> {
        let parameters = self.cast(raw)?;
        Ok(estimate::estimate(
            &parameters.temperature.classify(),
            &parameters.field.classify(),
            parameters.mevents,
        ))
    }

    /// Wall-clock seconds, when an event rate is configured.
    pub fn estimate_seconds(&self, raw: &RawParameters) -> AppResult<Option<f64>> {
        let total = self.estimate(raw)?;
        Ok(self
            .engine
            .event_rate()
            .and_then(|rate| estimate::estimate_seconds(total, rate)))
    }

    /// Execute the run. Parameters are assumed to have passed [`validate`](Self::validate).
    pub async fn run(&self, raw: &RawParameters) -> AppResult<RunSummary> {
        let parameters = self.cast(raw)?;
        let action = self.prepare_action(&parameters)?;
        let mut composer = ScanComposer::new(self.instruments.clone())
            .with_options(self.engine.composer_options())
            .with_control(self.control.clone());
        composer.run(&parameters, action.as_deref()).await
    }

    /// Cast `raw` and apply the configured field stepping.
    pub fn cast(&self, raw: &RawParameters) -> AppResult<ScanParameters> {
        let mut parameters = raw.cast()?;
        parameters.field = parameters.field.with_stepping(self.engine.field_stepping);
        Ok(parameters)
    }

    fn prepare_action(&self, parameters: &ScanParameters) -> AppResult<Option<Arc<dyn CustomAction>>> {
        if let Some(action) = &self.action {
            if let Some(custom) = &parameters.custom {
                warn!(ignored = %custom, "Custom expression ignored, an action was injected");
            }
            return Ok(Some(action.clone()));
        }
        match &parameters.custom {
            None => Ok(None),
            Some(source) => {
                let action = RhaiAction::compile(source, self.engine.script_max_operations)?;
                Ok(Some(Arc::new(action)))
            }
        }
    }
}
