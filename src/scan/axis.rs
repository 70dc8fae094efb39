//! Per-axis intent: leave unchanged, set once, or scan.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::range::{self, FloatRange, Stepping};

/// Which controllable quantity an axis drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    /// Sample temperature, in kelvin.
    Temperature,
    /// Applied magnetic field, in gauss.
    Field,
}

impl Axis {
    /// Lower-case name used in operator-facing messages.
    pub fn name(self) -> &'static str {
        match self {
            Axis::Temperature => "temperature",
            Axis::Field => "field",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operator request for one axis. `None` endpoints mean "keep".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisSpec {
    /// First value, or `None` to keep the current one.
    pub start: Option<f64>,
    /// Last value, or `None` to keep the current one.
    pub stop: Option<f64>,
    /// Increment between values. Read as a value count under [`Stepping::Log`].
    pub step: f64,
    /// How a scan walks from `start` to `stop`.
    #[serde(default)]
    pub stepping: Stepping,
}

impl AxisSpec {
    /// Linear request from raw endpoints and step.
    pub fn new(start: Option<f64>, stop: Option<f64>, step: f64) -> Self {
        Self {
            start,
            stop,
            step,
            stepping: Stepping::Linear,
        }
    }

    /// Same request, walked with `stepping`.
    pub fn with_stepping(mut self, stepping: Stepping) -> Self {
        self.stepping = stepping;
        self
    }

    /// Both endpoints "keep".
    pub fn keep() -> Self {
        Self::new(None, None, 0.0)
    }

    /// A single set-point.
    pub fn point(value: f64) -> Self {
        Self::new(Some(value), Some(value), 0.0)
    }

    /// A linear scan from `start` to `stop`.
    pub fn scan(start: f64, stop: f64, step: f64) -> Self {
        Self::new(Some(start), Some(stop), step)
    }

    /// Exactly one endpoint is "keep". Never valid.
    pub fn is_half_kept(&self) -> bool {
        self.start.is_some() != self.stop.is_some()
    }

    /// Either endpoint is "keep".
    pub fn has_keep(&self) -> bool {
        self.start.is_none() || self.stop.is_none()
    }

    /// Endpoints that were actually entered.
    pub fn endpoints(&self) -> impl Iterator<Item = f64> {
        self.start.into_iter().chain(self.stop)
    }

    /// Classify this request. See [`classify`].
    pub fn classify(&self) -> AxisState {
        match classify(self.start, self.stop, self.step) {
            AxisState::Scan { start, stop, step, .. } => AxisState::Scan {
                start,
                stop,
                step,
                stepping: self.stepping,
            },
            state => state,
        }
    }
}

/// Classified intent for an axis, derived fresh for every invocation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AxisState {
    /// Leave the axis alone.
    Undefined,
    /// Set once to `value`.
    Point { value: f64 },
    /// Walk from `start` to `stop`, both inclusive when reachable.
    Scan {
        start: f64,
        stop: f64,
        step: f64,
        #[serde(default)]
        stepping: Stepping,
    },
}

impl AxisState {
    /// The axis is left alone.
    pub fn is_undefined(&self) -> bool {
        matches!(self, AxisState::Undefined)
    }

    /// The axis moves during the run.
    pub fn is_scan(&self) -> bool {
        matches!(self, AxisState::Scan { .. })
    }

    /// Value to apply once before any scanning starts.
    pub fn point_value(&self) -> Option<f64> {
        match *self {
            AxisState::Point { value } => Some(value),
            _ => None,
        }
    }

    /// Values this axis contributes to the scan. `None` unless it is a scan.
    pub fn values(&self) -> Option<FloatRange> {
        match *self {
            AxisState::Scan {
                start,
                stop,
                step,
                stepping,
            } => Some(range::steps(start, stop, step, stepping)),
            _ => None,
        }
    }

    /// Undefined and Point contribute a single point; a scan contributes
    /// exactly as many as the range generator yields.
    pub fn point_count(&self) -> usize {
        match *self {
            AxisState::Undefined | AxisState::Point { .. } => 1,
            AxisState::Scan {
                start,
                stop,
                step,
                stepping,
            } => range::steps(start, stop, step, stepping).len(),
        }
    }
}

/// Classify an axis from its endpoints. Scans come out linear.
///
/// Equality is exact: values parsed from the same decimal text compare equal, and
/// nothing else should count as "the same point".
///
/// Exactly one endpoint present is an invalid combination that validation rejects.
/// Should it reach here anyway it classifies as [`AxisState::Undefined`], so that
/// an axis with a "keep" endpoint is never driven.
pub fn classify(start: Option<f64>, stop: Option<f64>, step: f64) -> AxisState {
    match (start, stop) {
        (Some(start), Some(stop)) if start == stop => AxisState::Point { value: start },
        (Some(start), Some(stop)) => AxisState::Scan {
            start,
            stop,
            step,
            stepping: Stepping::Linear,
        },
        _ => AxisState::Undefined,
    }
}
