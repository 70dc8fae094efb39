//! Scan sequencing and validation.
//!
//! # Architecture
//!
//! ```text
//! range       inclusive float ranges with exact decimal stepping
//! axis        keep / point / scan classification per axis
//! magnet      magnet devices and the selector owning "which magnet is active"
//! validation  ordered, non-short-circuiting rule table
//! composer    ordered instrument calls for a run
//! estimate    total events and wall-clock estimates
//! ```

pub mod axis;
pub mod composer;
pub mod estimate;
pub mod magnet;
pub mod range;
pub mod validation;

pub use axis::{classify, Axis, AxisSpec, AxisState};
pub use composer::{
    plan, ComposerOptions, ComposerState, RunSummary, ScanComposer, ScanControl, ScanPoint,
};
pub use estimate::{estimate, estimate_seconds, format_sexagesimal};
pub use magnet::{activation_for, MagnetDevice, MagnetSelector, Selection};
pub use range::{generate, generate_log, point_count, FloatRange, Stepping};
pub use validation::{validate, ValidationContext, ValidationPolicy, ValidationResult};
