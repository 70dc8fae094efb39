//! Instrument collaborators.
//!
//! `capabilities` defines what a scan run needs from the instrument, `mock` provides a
//! recording implementation used by the tests and the CLI.

pub mod capabilities;
pub mod mock;

pub use capabilities::{FieldControl, Instruments, MagnetSwitch, RunControl, TemperatureControl};
pub use mock::{InstrumentCall, MeasuredPoint, MockInstrument};
