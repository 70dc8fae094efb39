//! # EMU Scan Sequencer
//!
//! Scan sequencing and validation for temperature and magnetic-field scans on a
//! muon spectrometer. An operator describes a temperature and/or field trajectory
//! (a single point, a linear scan, or "keep") and a magnet device; the sequencer
//! checks that request against the instrument's rules and expands it into an ordered
//! list of set-points and measurements.
//!
//! ## Crate Structure
//!
//! - **`scan`**: The engine proper. Range generation, axis classification, magnet
//!   selection, the validation rule table, scan composition and run-length estimates.
//! - **`parameters`**: The nine operator-entered text fields and their casting into
//!   typed values.
//! - **`hardware`**: Async capability traits for the cryostat, magnet supplies, magnet
//!   switchboard and data acquisition, plus a recording mock instrument.
//! - **`scripting`**: The per-run custom action, either an injected closure or a
//!   sandboxed Rhai snippet.
//! - **`sequencer`**: The `validate` / `estimate` / `run` facade.
//! - **`config`**: Layered configuration (defaults, TOML file, environment).
//! - **`logging`**: `tracing` subscriber setup.
//! - **`error`**: The crate-wide `SequencerError` enum.

pub mod config;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod parameters;
pub mod scan;
pub mod scripting;
pub mod sequencer;

pub use error::{AppResult, SequencerError};
pub use parameters::{RawParameters, ScanParameters};
pub use sequencer::Sequencer;
