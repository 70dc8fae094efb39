//! Inclusive, direction-aware floating-point ranges.
//!
//! Scan set-points are entered by an operator as decimal text, so the range is
//! computed on integers scaled by the decimal precision of the most precise input
//! rather than by repeatedly adding a float step. This keeps the final value exact
//! when `(stop - start)` is a whole number of steps and never overshoots otherwise.
//! Inputs too large to scale are stepped in floats, clamped to the bounds.
//!
//! Field scans can also be log-spaced, see [`Stepping::Log`].
//!
//! # Example
//!
//! ```
//! use emu_sequencer::scan::range::generate;
//!
//! let up: Vec<f64> = generate(0.5, 2.0, 0.5).collect();
//! assert_eq!(up, vec![0.5, 1.0, 1.5, 2.0]);
//!
//! // The sign of `step` is ignored, direction comes from start/stop
//! let down: Vec<f64> = generate(2.0, 1.0, 0.3).collect();
//! assert_eq!(down, vec![2.0, 1.7, 1.4, 1.1]);
//! ```

use serde::{Deserialize, Serialize};

/// Upper bound on the decimal places honoured when scaling inputs.
pub const MAX_DECIMAL_PLACES: u32 = 12;

/// Largest scaled magnitude stepped on integers. Beyond it the range falls back to
/// float stepping, where decimal exactness no longer matters.
const SCALED_LIMIT: f64 = 1e30;

/// How a scanning axis moves from `start` to `stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stepping {
    /// Fixed increments of `step`.
    #[default]
    Linear,
    /// `step` is the number of values. Offsets from `start` grow as
    /// `(1 + |stop - start|)^(k / (n - 1)) - 1`, so values are dense near `start`.
    Log,
}

/// Number of digits after the decimal point in the shortest representation of `value`.
///
/// `2.0` has zero places, `0.25` has two. Capped at [`MAX_DECIMAL_PLACES`].
pub fn decimal_places(value: f64) -> u32 {
    if !value.is_finite() {
        return 0;
    }
    let text = value.abs().to_string();
    match text.split_once('.') {
        Some((_, fraction)) => (fraction.len() as u32).min(MAX_DECIMAL_PLACES),
        None => 0,
    }
}

fn to_scaled(value: f64, scale: f64) -> i128 {
    (value * scale).round() as i128
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    /// Integer stepping at `10^places`.
    Scaled { origin: i128, stride: i128, scale: f64 },
    /// Magnitudes too large to scale.
    Float { stride: f64 },
    Log { span: f64, intervals: f64, scale: f64 },
}

/// Lazy range from `start` towards `stop`, linear or logarithmic.
///
/// Clone before consuming to walk the same values a second time.
#[derive(Debug, Clone)]
pub struct FloatRange {
    start: f64,
    stop: f64,
    kind: Kind,
    len: usize,
    index: usize,
}

impl FloatRange {
    fn single(start: f64) -> Self {
        Self {
            start,
            stop: start,
            kind: Kind::Float { stride: 0.0 },
            len: 1,
            index: 0,
        }
    }

    /// Build a linear range. `step`'s sign is ignored.
    ///
    /// A zero step (or non-finite input) yields `start` alone. Zero steps on a real
    /// scan are rejected by validation before a range is ever built.
    pub fn new(start: f64, stop: f64, step: f64) -> Self {
        if !(start.is_finite() && stop.is_finite() && step.is_finite()) {
            return Self::single(start);
        }
        let places = decimal_places(start)
            .max(decimal_places(stop))
            .max(decimal_places(step));
        let scale = 10f64.powi(places as i32);
        let largest = start.abs().max(stop.abs()).max(step.abs()) * scale;

        if largest < SCALED_LIMIT {
            let origin = to_scaled(start, scale);
            let target = to_scaled(stop, scale);
            let magnitude = to_scaled(step.abs(), scale);
            if origin == target || magnitude == 0 {
                return Self::single(start);
            }
            let len = usize::try_from((target - origin).abs() / magnitude)
                .map_or(usize::MAX, |n| n.saturating_add(1));
            let stride = if target < origin { -magnitude } else { magnitude };
            return Self {
                start,
                stop,
                kind: Kind::Scaled {
                    origin,
                    stride,
                    scale,
                },
                len,
                index: 0,
            };
        }

        let magnitude = step.abs();
        if start == stop || magnitude == 0.0 {
            return Self::single(start);
        }
        // `as` saturates, and an infinite span saturates to usize::MAX
        let steps = ((stop - start).abs() / magnitude).floor() as usize;
        let stride = if stop < start { -magnitude } else { magnitude };
        Self {
            start,
            stop,
            kind: Kind::Float { stride },
            len: steps.saturating_add(1),
            index: 0,
        }
    }

    /// Build a logarithmic range of `count` values, the first `start` and the last `stop`.
    pub fn log(start: f64, stop: f64, count: usize) -> Self {
        if !(start.is_finite() && stop.is_finite()) || start == stop || count <= 1 {
            return Self::single(start);
        }
        let places = decimal_places(start).max(decimal_places(stop));
        Self {
            start,
            stop,
            kind: Kind::Log {
                span: stop - start,
                intervals: (count - 1) as f64,
                scale: 10f64.powi(places as i32),
            },
            len: count,
            index: 0,
        }
    }

    fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.start.min(self.stop), self.start.max(self.stop))
    }

    fn value_at(&self, index: usize) -> f64 {
        if index == 0 {
            return self.start;
        }
        match self.kind {
            Kind::Scaled {
                origin,
                stride,
                scale,
            } => (origin + stride * index as i128) as f64 / scale,
            Kind::Float { stride } => self.clamp(self.start + stride * index as f64),
            Kind::Log {
                span,
                intervals,
                scale,
            } => {
                if index + 1 == self.len {
                    return self.stop;
                }
                let offset = (1.0 + span.abs()).powf(index as f64 / intervals) - 1.0;
                let value = self.start + offset.copysign(span);
                let scaled = value * scale;
                let rounded = if scaled.is_finite() {
                    scaled.round() / scale
                } else {
                    value
                };
                self.clamp(rounded)
            }
        }
    }
}

impl Iterator for FloatRange {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.index >= self.len {
            return None;
        }
        let value = self.value_at(self.index);
        self.index += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.len - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for FloatRange {}

/// Inclusive range from `start` to `stop` in steps of `|step|`.
pub fn generate(start: f64, stop: f64, step: f64) -> FloatRange {
    FloatRange::new(start, stop, step)
}

/// `count` logarithmically spaced values from `start` to `stop`, both included.
pub fn generate_log(start: f64, stop: f64, count: usize) -> FloatRange {
    FloatRange::log(start, stop, count)
}

/// Number of values a log scan takes from its `step` parameter. Fractions are
/// truncated and anything below one means a single value.
pub fn log_count(step: f64) -> usize {
    if step.is_finite() && step >= 1.0 {
        step.floor() as usize
    } else {
        1
    }
}

/// The range for `stepping`, reading `step` as an increment or as a count.
pub fn steps(start: f64, stop: f64, step: f64, stepping: Stepping) -> FloatRange {
    match stepping {
        Stepping::Linear => FloatRange::new(start, stop, step),
        Stepping::Log => FloatRange::log(start, stop, log_count(step)),
    }
}

/// Number of values [`generate`] would yield, without iterating.
pub fn point_count(start: f64, stop: f64, step: f64) -> usize {
    FloatRange::new(start, stop, step).len()
}
