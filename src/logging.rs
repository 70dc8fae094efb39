//! Tracing Infrastructure
//!
//! Structured logging for the sequencer, built on `tracing` and `tracing-subscriber`:
//! - Structured events with spans per scan run
//! - Multiple output formats (pretty, compact, JSON)
//! - Environment-based filtering through `RUST_LOG`, falling back to the configured level
//!
//! # Example
//! ```no_run
//! use emu_sequencer::{config::SequencerConfig, logging};
//! use tracing::info;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SequencerConfig::load()?;
//! logging::init_from_config(&config)?;
//!
//! info!("Sequencer started");
//! # Ok(())
//! # }
//! ```

use std::fmt as stdfmt;
use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use crate::config::SequencerConfig;
use crate::error::{AppResult, SequencerError};

/// Output format for tracing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed format with colors (for interactive use)
    #[default]
    Pretty,
    /// Single-line format without colors
    Compact,
    /// JSON lines for log aggregation
    Json,
}

impl FromStr for OutputFormat {
    type Err = SequencerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(OutputFormat::Pretty),
            "compact" => Ok(OutputFormat::Compact),
            "json" => Ok(OutputFormat::Json),
            other => Err(SequencerError::Configuration(format!(
                "Invalid log format '{other}'. Must be one of: pretty, compact, json"
            ))),
        }
    }
}

impl stdfmt::Display for OutputFormat {
    fn fmt(&self, f: &mut stdfmt::Formatter<'_>) -> stdfmt::Result {
        let name = match self {
            OutputFormat::Pretty => "pretty",
            OutputFormat::Compact => "compact",
            OutputFormat::Json => "json",
        };
        f.write_str(name)
    }
}

/// Tracing configuration options
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Level used when `RUST_LOG` is not set
    pub level: Level,
    pub format: OutputFormat,
    /// Emit span NEW and CLOSE events
    pub with_span_events: bool,
    pub with_file_and_line: bool,
    /// ANSI colors (pretty format only)
    pub with_ansi: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: OutputFormat::Pretty,
            with_span_events: false,
            with_file_and_line: false,
            with_ansi: true,
        }
    }
}

impl TracingConfig {
    /// Defaults at `level`.
    pub fn new(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// Level taken from `[application] log_level`.
    pub fn from_config(config: &SequencerConfig) -> AppResult<Self> {
        Ok(Self::new(parse_log_level(&config.application.log_level)?))
    }

    /// Pretty or JSON output.
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Log span open and close.
    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.with_span_events = enabled;
        self
    }

    /// Toggle ANSI colors.
    pub fn with_ansi(mut self, enabled: bool) -> Self {
        self.with_ansi = enabled;
        self
    }
}

/// Initialize tracing from the loaded configuration.
pub fn init_from_config(config: &SequencerConfig) -> AppResult<()> {
    init(TracingConfig::from_config(config)?)
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn fmt_layer(config: &TracingConfig) -> BoxedLayer {
    let span_events = if config.with_span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    let base = fmt::layer()
        .with_span_events(span_events)
        .with_file(config.with_file_and_line)
        .with_line_number(config.with_file_and_line)
        .with_writer(std::io::stderr);

    match config.format {
        OutputFormat::Pretty => base.pretty().with_ansi(config.with_ansi).boxed(),
        OutputFormat::Compact => base.compact().with_ansi(false).boxed(),
        OutputFormat::Json => base.json().with_ansi(false).boxed(),
    }
}

/// Install the global subscriber.
///
/// Idempotent: if a global subscriber is already installed this returns `Ok(())`,
/// which keeps it safe to call from tests and libraries.
pub fn init(config: TracingConfig) -> AppResult<()> {
    if tracing::dispatcher::has_been_set() {
        return Ok(());
    }

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str().to_lowercase()));

    let result = tracing_subscriber::registry()
        .with(fmt_layer(&config).with_filter(env_filter))
        .try_init();

    match result {
        Ok(()) => Ok(()),
        // Lost a race with another initializer
        Err(_) if tracing::dispatcher::has_been_set() => Ok(()),
        Err(e) => Err(SequencerError::Configuration(format!(
            "Failed to initialize tracing: {e}"
        ))),
    }
}

/// Parse log level string into tracing Level
pub fn parse_log_level(level: &str) -> AppResult<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(SequencerError::Configuration(format!(
            "Invalid log level '{level}'. Must be one of: trace, debug, info, warn, error"
        ))),
    }
}
