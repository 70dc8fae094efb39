//! Run-length estimates.
//!
//! The base estimate is the total number of millions of events a run will collect.
//! With an event rate configured it converts to wall-clock seconds.

use super::axis::AxisState;

/// Total mevents: `count(temperature) * count(field) * mevents`.
///
/// Counts come from the same arithmetic the range generator iterates with, so the
/// estimate always agrees with the number of points a run would visit.
pub fn estimate(temperature: &AxisState, field: &AxisState, mevents: f64) -> f64 {
    let points = temperature.point_count() as f64 * field.point_count() as f64;
    points * mevents
}

/// Seconds needed to collect `total_mevents` at `rate` million events per hour.
///
/// `None` unless the rate is a positive finite number.
pub fn estimate_seconds(total_mevents: f64, rate_mev_per_hour: f64) -> Option<f64> {
    if rate_mev_per_hour.is_finite() && rate_mev_per_hour > 0.0 {
        Some(total_mevents / (rate_mev_per_hour / 3600.0))
    } else {
        None
    }
}

/// Render `value` as `hh:mm:ss`, reading it as a number of seconds.
///
/// Hours are not wrapped at 24. Fractional seconds are rounded.
pub fn format_sexagesimal(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let sign = if value < 0.0 { "-" } else { "" };
    let total = value.abs().round() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{sign}{hours:02}:{minutes:02}:{seconds:02}")
}
