//! Layered configuration loading: defaults, TOML file, environment.

use emu_sequencer::config::SequencerConfig;
use emu_sequencer::scan::range::Stepping;
use emu_sequencer::SequencerError;
use serial_test::serial;
use std::io::Write;
use tempfile::NamedTempFile;

const AUTO_ZERO_VAR: &str = "EMU_SEQ_ENGINE__AUTO_ZERO_FIELD";
const RATE_VAR: &str = "EMU_SEQ_ENGINE__EVENT_RATE_MEV_PER_HOUR";
const STEPPING_VAR: &str = "EMU_SEQ_ENGINE__FIELD_STEPPING";

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn clear_env() {
    std::env::remove_var(AUTO_ZERO_VAR);
    std::env::remove_var(RATE_VAR);
    std::env::remove_var(STEPPING_VAR);
}

#[test]
#[serial]
fn test_missing_file_uses_defaults() {
    clear_env();
    let config = SequencerConfig::load_from("/nonexistent/sequencer.toml").unwrap();
    assert_eq!(config, SequencerConfig::default());
}

#[test]
#[serial]
fn test_file_overrides_defaults() {
    clear_env();
    let file = write_config(
        r#"
[application]
name = "EMU test"
log_level = "debug"

[engine]
auto_zero_field = true
event_rate_mev_per_hour = 110.0
"#,
    );
    let config = SequencerConfig::load_from(file.path()).unwrap();
    assert_eq!(config.application.name, "EMU test");
    assert_eq!(config.application.log_level, "debug");
    assert!(config.engine.auto_zero_field);
    assert_eq!(config.engine.event_rate(), Some(110.0));
    // untouched keys keep their defaults
    assert_eq!(config.engine.zero_field_tolerance, 1e-9);
    assert!(config.engine.keep_requires_not_applicable);
}

#[test]
#[serial]
fn test_env_overrides_file() {
    clear_env();
    let file = write_config("[engine]\nauto_zero_field = false\n");
    std::env::set_var(AUTO_ZERO_VAR, "true");
    std::env::set_var(RATE_VAR, "55.5");

    let result = SequencerConfig::load_from(file.path());
    clear_env();

    let config = result.unwrap();
    assert!(config.engine.auto_zero_field);
    assert_eq!(config.engine.event_rate_mev_per_hour, 55.5);
}

#[test]
#[serial]
fn test_field_stepping_from_file_and_env() {
    clear_env();
    let file = write_config("[engine]\nfield_stepping = \"log\"\n");
    let config = SequencerConfig::load_from(file.path()).unwrap();
    assert_eq!(config.engine.field_stepping, Stepping::Log);

    std::env::set_var(STEPPING_VAR, "linear");
    let result = SequencerConfig::load_from(file.path());
    clear_env();
    assert_eq!(result.unwrap().engine.field_stepping, Stepping::Linear);

    let file = write_config("[engine]\nfield_stepping = \"geometric\"\n");
    assert!(matches!(
        SequencerConfig::load_from(file.path()),
        Err(SequencerError::Config(_))
    ));
}

#[test]
#[serial]
fn test_invalid_values_rejected() {
    clear_env();
    let file = write_config("[engine]\nzero_field_tolerance = -1.0\n");
    let err = SequencerConfig::load_from(file.path()).unwrap_err();
    assert!(matches!(err, SequencerError::Configuration(_)));
    assert!(err.to_string().contains("zero_field_tolerance"));

    let file = write_config("[application]\nname = \"x\"\nlog_level = \"loud\"\n");
    assert!(matches!(
        SequencerConfig::load_from(file.path()),
        Err(SequencerError::Configuration(_))
    ));
}

#[test]
#[serial]
fn test_malformed_file_is_config_error() {
    clear_env();
    let file = write_config("[engine]\nauto_zero_field = \"sometimes\"\n");
    assert!(matches!(
        SequencerConfig::load_from(file.path()),
        Err(SequencerError::Config(_))
    ));
}

#[test]
#[serial]
fn test_to_toml_loads_back() {
    clear_env();
    let mut config = SequencerConfig::default();
    config.engine.auto_zero_field = true;
    config.engine.script_max_operations = 500;
    config.engine.field_stepping = Stepping::Log;
    let file = write_config(&config.to_toml().unwrap());
    assert_eq!(SequencerConfig::load_from(file.path()).unwrap(), config);
}

#[test]
#[serial]
fn test_logging_init_from_config_is_idempotent() {
    use emu_sequencer::logging::{self, OutputFormat, TracingConfig};

    clear_env();
    let config = SequencerConfig::load_from("/nonexistent/sequencer.toml").unwrap();
    assert!(logging::init_from_config(&config).is_ok());
    assert!(logging::init(TracingConfig::default().with_format(OutputFormat::Json)).is_ok());
}
