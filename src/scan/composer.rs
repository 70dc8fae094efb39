//! Scan composition: turning classified axes into ordered instrument calls.
//!
//! A run always happens in this order:
//!
//! 1. select the requested magnet, if the field axis is not undefined
//! 2. evaluate the custom action, if any
//! 3. apply point set-points (temperature, then field)
//! 4. walk the scan plan, measuring at every point
//!
//! When both axes scan, temperature is the outer loop and field the inner one.
//! The composer trusts its input; validation happens before a run is started.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::axis::AxisState;
use super::magnet::{MagnetDevice, MagnetSelector};
use crate::error::{AppResult, SequencerError};
use crate::hardware::capabilities::Instruments;
use crate::parameters::ScanParameters;
use crate::scripting::CustomAction;

/// Which axes are scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComposerState {
    /// Nothing scans. One measurement with the instrument as it is.
    NoOp,
    /// Temperature scans, field is kept or set once.
    TempOnly,
    /// Field scans, temperature is kept or set once.
    FieldOnly,
    /// Temperature outer loop, field inner loop.
    Both,
}

impl ComposerState {
    /// State for a pair of classified axes.
    pub fn from_axes(temperature: &AxisState, field: &AxisState) -> Self {
        match (temperature.is_scan(), field.is_scan()) {
            (false, false) => ComposerState::NoOp,
            (true, false) => ComposerState::TempOnly,
            (false, true) => ComposerState::FieldOnly,
            (true, true) => ComposerState::Both,
        }
    }
}

impl fmt::Display for ComposerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComposerState::NoOp => "no-op",
            ComposerState::TempOnly => "temperature scan",
            ComposerState::FieldOnly => "field scan",
            ComposerState::Both => "temperature and field scan",
        };
        f.write_str(name)
    }
}

/// One measurement point.
///
/// `temperature` and `field` are the values in effect (`None` when the axis is kept).
/// The `sets_*` flags say which axes are driven right before this point is measured;
/// point set-points are applied once up front and never flagged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanPoint {
    pub temperature: Option<f64>,
    pub field: Option<f64>,
    pub sets_temperature: bool,
    pub sets_field: bool,
}

type Values = Box<dyn Iterator<Item = (Option<f64>, bool)> + Send>;

/// Scan values tagged `true`, or the single point value tagged `false`.
fn axis_values(axis: &AxisState) -> Values {
    match axis.values() {
        Some(values) => Box::new(values.map(|v| (Some(v), true))),
        None => Box::new(iter::once((axis.point_value(), false))),
    }
}

/// Every measurement point for the given axes, in run order.
///
/// Yields `count(temperature) * count(field)` points; a run with no scanning
/// axis yields exactly one. Both loops are lazy, points are computed as they are taken.
pub fn plan(temperature: AxisState, field: AxisState) -> impl Iterator<Item = ScanPoint> + Send {
    axis_values(&temperature).flat_map(move |(t, t_scan)| {
        axis_values(&field)
            .enumerate()
            .map(move |(inner, (f, f_scan))| ScanPoint {
                temperature: t,
                field: f,
                sets_temperature: t_scan && inner == 0,
                sets_field: f_scan,
            })
    })
}

/// Cooperative cancellation handle, checked after every measurement.
#[derive(Debug, Clone, Default)]
pub struct ScanControl {
    cancelled: Arc<AtomicBool>,
}

impl ScanControl {
    /// A handle that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Every clone of this handle sees it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Run-time behaviour that is not part of the parameter set.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ComposerOptions {
    /// When set, field set-points with `|field| < threshold` are reached by switching
    /// to the active zero-field magnet instead of driving the requested one.
    pub auto_zero_threshold: Option<f64>,
}

/// What a completed run did. Points are counted as they are visited, not kept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Identifier also attached to every log line of the run.
    pub run_id: Uuid,
    pub state: ComposerState,
    /// Number of points visited.
    pub points: usize,
    pub first_point: Option<ScanPoint>,
    pub last_point: Option<ScanPoint>,
    /// Number of begin/wait/end brackets issued.
    pub measurements: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Drives the instrument through one run.
pub struct ScanComposer {
    instruments: Instruments,
    selector: MagnetSelector,
    options: ComposerOptions,
    control: ScanControl,
}

impl ScanComposer {
    /// Composer driving `instruments`, with default options.
    pub fn new(instruments: Instruments) -> Self {
        let selector = MagnetSelector::new(instruments.magnet.clone());
        Self {
            instruments,
            selector,
            options: ComposerOptions::default(),
            control: ScanControl::default(),
        }
    }

    /// Replace the run-time options.
    pub fn with_options(mut self, options: ComposerOptions) -> Self {
        self.options = options;
        self
    }

    /// Share `control` with the caller.
    pub fn with_control(mut self, control: ScanControl) -> Self {
        self.control = control;
        self
    }

    /// Handle for cancelling a run in progress from another task.
    pub fn control(&self) -> ScanControl {
        self.control.clone()
    }

    fn is_auto_zero(&self, field: f64) -> bool {
        self.options
            .auto_zero_threshold
            .is_some_and(|threshold| field.abs() < threshold)
    }

    /// Execute a run. Every collaborator call is awaited before the next is issued,
    /// and the first failure aborts the run.
    pub async fn run(
        &mut self,
        parameters: &ScanParameters,
        action: Option<&dyn CustomAction>,
    ) -> AppResult<RunSummary> {
        let run_id = Uuid::new_v4();
        let span = info_span!("scan_run", %run_id);
        self.run_inner(run_id, parameters, action)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &mut self,
        run_id: Uuid,
        parameters: &ScanParameters,
        action: Option<&dyn CustomAction>,
    ) -> AppResult<RunSummary> {
        let started_at = Utc::now();
        let temperature = parameters.temperature.classify();
        let field = parameters.field.classify();
        let state = ComposerState::from_axes(&temperature, &field);
        info!(%state, mevents = parameters.mevents, "Starting run");

        if !field.is_undefined() {
            let device = match field.point_value() {
                Some(value) if self.is_auto_zero(value) => {
                    warn!(field = value, "Zero field requested, engaging active zero field for the whole run");
                    MagnetDevice::ActiveZF
                }
                _ => parameters.magnet_device,
            };
            self.selector.select(device).await?;
        }

        if let Some(action) = action {
            debug!(action = %action.describe(), "Evaluating custom action");
            action.execute(parameters).await?;
        }

        if let Some(value) = temperature.point_value() {
            self.set_temperature(value).await?;
        }
        if let Some(value) = field.point_value() {
            if !self.is_auto_zero(value) {
                self.set_field(value).await?;
            }
        }

        let mut points = 0;
        let mut first_point = None;
        let mut last_point = None;
        let mut measurements = 0;
        for point in plan(temperature, field) {
            if point.sets_temperature {
                if let Some(value) = point.temperature {
                    self.set_temperature(value).await?;
                }
            }

            let zero_field = point.sets_field && point.field.is_some_and(|f| self.is_auto_zero(f));
            if zero_field {
                warn!(field = ?point.field, "Zero field requested, engaging active zero field");
                self.selector.engage_zero_field().await?;
            } else if point.sets_field {
                if let Some(value) = point.field {
                    self.set_field(value).await?;
                }
            }

            if self.measure(parameters.mevents).await? {
                measurements += 1;
            }
            info!(
                temperature = ?point.temperature,
                field = ?point.field,
                index = points,
                "Measurement point complete"
            );

            if zero_field {
                self.selector.restore().await?;
                info!("Restored requested magnet after zero-field point");
            }

            points += 1;
            first_point.get_or_insert(point);
            last_point = Some(point);
            if self.control.is_cancelled() {
                warn!(completed = points, "Run cancelled");
                return Err(SequencerError::Cancelled { completed: points });
            }
        }

        let summary = RunSummary {
            run_id,
            state,
            points,
            first_point,
            last_point,
            measurements,
            started_at,
            finished_at: Utc::now(),
        };
        info!(points, measurements, "Run finished");
        Ok(summary)
    }

    async fn set_temperature(&self, value: f64) -> AppResult<()> {
        debug!(temperature = value, "Setting temperature");
        self.instruments
            .temperature
            .set_temperature(value, true)
            .await
            .map_err(|e| SequencerError::instrument("set_temperature", e))
    }

    async fn set_field(&self, value: f64) -> AppResult<()> {
        debug!(field = value, "Setting field");
        self.instruments
            .field
            .set_field(value, true)
            .await
            .map_err(|e| SequencerError::instrument("set_field", e))
    }

    /// The begin/wait/end bracket. Skipped entirely unless `mevents > 0`.
    async fn measure(&self, mevents: f64) -> AppResult<bool> {
        if mevents <= 0.0 {
            debug!(mevents, "No events requested, skipping measurement");
            return Ok(false);
        }
        let run = &self.instruments.run;
        run.begin()
            .await
            .map_err(|e| SequencerError::instrument("begin", e))?;
        run.wait_for_mevents(mevents)
            .await
            .map_err(|e| SequencerError::instrument("wait_for_mevents", e))?;
        run.end()
            .await
            .map_err(|e| SequencerError::instrument("end", e))?;
        Ok(true)
    }
}
