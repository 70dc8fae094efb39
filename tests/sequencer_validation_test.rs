//! Validation through the facade, starting from operator-entered text.

use emu_sequencer::config::EngineConfig;
use emu_sequencer::hardware::{Instruments, MockInstrument};
use emu_sequencer::{RawParameters, Sequencer, SequencerError};
use std::sync::Arc;

fn sequencer() -> Sequencer {
    Sequencer::new(Instruments::from_single(Arc::new(MockInstrument::new())))
}

fn raw(pairs: &[(&str, &str)]) -> RawParameters {
    let mut raw = RawParameters::default();
    for (key, value) in pairs {
        raw.set(key, *value).unwrap();
    }
    raw
}

/// Temperature scan 10.5 -> 1.0, field and magnet overridable.
fn temperature_scan_with(pairs: &[(&str, &str)]) -> RawParameters {
    let mut all = vec![
        ("start_temperature", "10.5"),
        ("stop_temperature", "1.0"),
        ("step_temperature", "1"),
        ("step_field", "1"),
        ("mevents", "10"),
    ];
    all.extend_from_slice(pairs);
    raw(&all)
}

#[test]
fn test_valid_temperature_scan() {
    let params = temperature_scan_with(&[("magnet_device", "N/A")]);
    assert_eq!(sequencer().validate(&params).unwrap(), None);
}

#[test]
fn test_half_kept_temperature() {
    for (start, stop) in [("keep", "1.0"), ("1.0", "keep")] {
        let params = raw(&[("start_temperature", start), ("stop_temperature", stop)]);
        assert_eq!(
            sequencer().validate(&params).unwrap().as_deref(),
            Some("If start temperature or stop temperature is keep, the other must also be keep\n")
        );
    }
}

#[test]
fn test_half_kept_field() {
    let params = raw(&[("start_field", "keep"), ("stop_field", "1.0")]);
    assert_eq!(
        sequencer().validate(&params).unwrap().as_deref(),
        Some("If start field or stop field is keep, the other must also be keep\n")
    );
}

#[test]
fn test_zero_steps() {
    let params = raw(&[
        ("start_temperature", "10.5"),
        ("stop_temperature", "1.0"),
        ("step_temperature", "0"),
        ("start_field", "2"),
        ("stop_field", "30.0"),
        ("step_field", "0"),
        ("magnet_device", "TF"),
    ]);
    assert_eq!(
        sequencer().validate(&params).unwrap().as_deref(),
        Some("Cannot step through temperatures when step is zero\nCannot step through fields when step is zero\n")
    );
}

#[test]
fn test_negative_steps() {
    let params = raw(&[
        ("start_temperature", "10.5"),
        ("stop_temperature", "1.0"),
        ("step_temperature", "-0.0001"),
        ("start_field", "2"),
        ("stop_field", "30.0"),
        ("step_field", "-2"),
        ("magnet_device", "TF"),
    ]);
    assert_eq!(
        sequencer().validate(&params).unwrap().as_deref(),
        Some("Step temperature must be positive\nStep field must be positive\n")
    );
}

#[test]
fn test_zero_field_with_other_magnets() {
    for (code, name) in [("LF", "Danfysik"), ("TF", "T20 Coils")] {
        let params = temperature_scan_with(&[
            ("start_field", "0"),
            ("stop_field", "0"),
            ("magnet_device", code),
        ]);
        assert_eq!(
            sequencer().validate(&params).unwrap(),
            Some(format!(
                "Trying to set a zero field without using the active zero field ({name}, Active ZF)\n"
            ))
        );
    }
}

#[test]
fn test_non_zero_field_with_active_zf() {
    for (start, stop) in [("1", "20.2"), ("1", "1")] {
        let params = temperature_scan_with(&[
            ("start_field", start),
            ("stop_field", stop),
            ("magnet_device", "ZF"),
        ]);
        assert_eq!(
            sequencer().validate(&params).unwrap().as_deref(),
            Some("Cannot set a non-zero field with the active zero field\n")
        );
    }
}

#[test]
fn test_field_with_not_applicable_magnet() {
    for stop in ["1", "10.0"] {
        let params = temperature_scan_with(&[
            ("start_field", "1"),
            ("stop_field", stop),
            ("magnet_device", "N/A"),
        ]);
        assert_eq!(
            sequencer().validate(&params).unwrap().as_deref(),
            Some("Field set but magnet devices N/A not in possible devices ['ZF', 'LF', 'TF']\n")
        );
    }
}

#[test]
fn test_kept_field_with_magnet() {
    let params = temperature_scan_with(&[("magnet_device", "TF")]);
    assert_eq!(
        sequencer().validate(&params).unwrap().as_deref(),
        Some("If start_field or stop_field is keep, then the selected magnet must be N/A\n")
    );
}

#[test]
fn test_invalid_magnet_is_input_error_not_message() {
    let params = temperature_scan_with(&[
        ("start_field", "1"),
        ("stop_field", "1"),
        ("magnet_device", "INVALID"),
    ]);
    let err = sequencer().validate(&params).unwrap_err();
    assert!(err.is_input_format());
    assert!(err
        .to_string()
        .contains("Magnet device must be one of ['ZF', 'LF', 'TF'] or N/A"));
}

#[test]
fn test_unparseable_number_is_input_error() {
    let params = raw(&[("start_temperature", "warm"), ("stop_temperature", "1")]);
    let err = sequencer().validate(&params).unwrap_err();
    assert!(matches!(err, SequencerError::InputFormat { ref parameter, .. } if parameter == "start_temperature"));
}

#[test]
fn test_keep_is_case_insensitive() {
    let params = raw(&[("start_temperature", "KEEP"), ("stop_temperature", "Keep")]);
    assert_eq!(sequencer().validate(&params).unwrap(), None);
}

#[test]
fn test_auto_zero_field_relaxes_zero_rule() {
    let engine = EngineConfig {
        auto_zero_field: true,
        ..EngineConfig::default()
    };
    let params = raw(&[
        ("start_field", "0"),
        ("stop_field", "100"),
        ("step_field", "10"),
        ("magnet_device", "LF"),
    ]);
    assert!(sequencer().validate(&params).unwrap().is_some());
    assert_eq!(
        sequencer()
            .with_engine_config(engine)
            .validate(&params)
            .unwrap(),
        None
    );
}

#[test]
fn test_estimate_counts_points() {
    let params = raw(&[
        ("start_temperature", "1"),
        ("stop_temperature", "10"),
        ("step_temperature", "1"),
        ("start_field", "0"),
        ("stop_field", "100"),
        ("step_field", "50"),
        ("mevents", "10"),
        ("magnet_device", "ZF"),
    ]);
    assert_eq!(sequencer().estimate(&params).unwrap(), 300.0);
}

#[test]
fn test_estimate_non_divisible_and_point_axes() {
    let params = raw(&[
        ("start_temperature", "1"),
        ("stop_temperature", "2"),
        ("step_temperature", "0.3"),
        ("start_field", "5"),
        ("stop_field", "5"),
        ("mevents", "2.5"),
    ]);
    assert_eq!(sequencer().estimate(&params).unwrap(), 10.0);
}

#[test]
fn test_field_scan_from_zero_on_active_zf() {
    let params = raw(&[
        ("start_field", "0"),
        ("stop_field", "10"),
        ("step_field", "5"),
        ("magnet_device", "ZF"),
    ]);
    assert_eq!(sequencer().validate(&params).unwrap(), None);
}

#[test]
fn test_magnet_and_zero_field_rules_both_fire() {
    let params = raw(&[
        ("start_field", "0"),
        ("stop_field", "0"),
        ("magnet_device", "N/A"),
    ]);
    let message = sequencer().validate(&params).unwrap().unwrap();
    let magnet = message
        .find("Field set but magnet devices N/A not in possible devices")
        .unwrap();
    let zero = message
        .find("Trying to set a zero field without using the active zero field")
        .unwrap();
    assert!(magnet < zero);
    assert_eq!(message.lines().count(), 2);
}
