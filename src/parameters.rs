//! Operator-entered parameters and their typed form.
//!
//! Parameters arrive as nine text fields. Casting turns them into a [`ScanParameters`]
//! or fails on the first field that cannot be read; a cast failure is an
//! [`SequencerError::InputFormat`], which is never mixed into the validation message.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{AppResult, SequencerError};
use crate::scan::axis::AxisSpec;
use crate::scan::magnet::MagnetDevice;

/// Text accepted (case-insensitively) for "leave this endpoint as it is".
pub const KEEP: &str = "keep";

/// Field names, in form order.
pub const PARAMETER_NAMES: [&str; 9] = [
    "start_temperature",
    "stop_temperature",
    "step_temperature",
    "start_field",
    "stop_field",
    "step_field",
    "custom",
    "mevents",
    "magnet_device",
];

/// The nine text fields exactly as the operator entered them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawParameters {
    pub start_temperature: String,
    pub stop_temperature: String,
    pub step_temperature: String,
    pub start_field: String,
    pub stop_field: String,
    /// Field increment, or the number of fields when field stepping is `log`.
    #[serde(alias = "n_fields")]
    pub step_field: String,
    pub custom: String,
    pub mevents: String,
    pub magnet_device: String,
}

impl Default for RawParameters {
    fn default() -> Self {
        Self {
            start_temperature: KEEP.to_string(),
            stop_temperature: KEEP.to_string(),
            step_temperature: "0".to_string(),
            start_field: KEEP.to_string(),
            stop_field: KEEP.to_string(),
            step_field: "0".to_string(),
            custom: String::new(),
            mevents: "10".to_string(),
            magnet_device: "N/A".to_string(),
        }
    }
}

impl RawParameters {
    /// Overwrite one field by name.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> AppResult<()> {
        let value = value.into();
        let slot = match key {
            "start_temperature" => &mut self.start_temperature,
            "stop_temperature" => &mut self.stop_temperature,
            "step_temperature" => &mut self.step_temperature,
            "start_field" => &mut self.start_field,
            "stop_field" => &mut self.stop_field,
            "step_field" | "n_fields" => &mut self.step_field,
            "custom" => &mut self.custom,
            "mevents" => &mut self.mevents,
            "magnet_device" => &mut self.magnet_device,
            _ => {
                return Err(SequencerError::input_format(
                    key,
                    value,
                    format!("unknown parameter, expected one of {}", PARAMETER_NAMES.join(", ")),
                ))
            }
        };
        *slot = value;
        Ok(())
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, key: &str, value: impl Into<String>) -> AppResult<Self> {
        self.set(key, value)?;
        Ok(self)
    }

    /// Read parameters from a TOML table. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> AppResult<Self> {
        toml::from_str(text)
            .map_err(|e| SequencerError::input_format("parameters", "<toml>", e.to_string()))
    }

    /// Read parameters from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Cast every field to its typed value.
    pub fn cast(&self) -> AppResult<ScanParameters> {
        Ok(ScanParameters {
            temperature: AxisSpec::new(
                float_or_keep("start_temperature", &self.start_temperature)?,
                float_or_keep("stop_temperature", &self.stop_temperature)?,
                finite_float("step_temperature", &self.step_temperature)?,
            ),
            field: AxisSpec::new(
                float_or_keep("start_field", &self.start_field)?,
                float_or_keep("stop_field", &self.stop_field)?,
                finite_float("step_field", &self.step_field)?,
            ),
            custom: custom_expression(&self.custom),
            mevents: finite_float("mevents", &self.mevents)?,
            magnet_device: self.magnet_device.parse()?,
        })
    }
}

/// Fully typed parameter set for one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanParameters {
    /// Requested temperature axis.
    pub temperature: AxisSpec,
    /// Requested field axis.
    pub field: AxisSpec,
    /// Custom action source, if any.
    pub custom: Option<String>,
    /// Millions of events to collect at each measurement point.
    pub mevents: f64,
    /// Magnet to drive the field with.
    pub magnet_device: MagnetDevice,
}

impl Default for ScanParameters {
    fn default() -> Self {
        Self {
            temperature: AxisSpec::keep(),
            field: AxisSpec::keep(),
            custom: None,
            mevents: 10.0,
            magnet_device: MagnetDevice::NotApplicable,
        }
    }
}

// =============================================================================
// Casters
// =============================================================================

/// A finite float. Surrounding whitespace is ignored.
pub fn finite_float(parameter: &str, raw: &str) -> AppResult<f64> {
    let text = raw.trim();
    let value: f64 = text
        .parse()
        .map_err(|_| SequencerError::input_format(parameter, raw, "could not convert string to float"))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SequencerError::input_format(parameter, raw, "value must be finite"))
    }
}

/// `keep` (any case) means `None`, anything else must be a finite float.
pub fn float_or_keep(parameter: &str, raw: &str) -> AppResult<Option<f64>> {
    if raw.trim().eq_ignore_ascii_case(KEEP) {
        Ok(None)
    } else {
        finite_float(parameter, raw).map(Some)
    }
}

/// Blank text, or the literal `None`, means no custom action.
pub fn custom_expression(raw: &str) -> Option<String> {
    let text = raw.trim();
    if text.is_empty() || text == "None" {
        None
    } else {
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cast_to_noop() {
        let params = RawParameters::default().cast().unwrap();
        assert_eq!(params, ScanParameters::default());
        assert!(params.temperature.classify().is_undefined());
        assert!(params.field.classify().is_undefined());
    }

    #[test]
    fn test_float_or_keep() {
        assert_eq!(float_or_keep("start_field", "keep").unwrap(), None);
        assert_eq!(float_or_keep("start_field", "KEEP").unwrap(), None);
        assert_eq!(float_or_keep("start_field", " Keep ").unwrap(), None);
        assert_eq!(float_or_keep("start_field", "1.5").unwrap(), Some(1.5));
        assert_eq!(float_or_keep("start_field", "-2").unwrap(), Some(-2.0));
    }

    #[test]
    fn test_bad_float_is_input_format_error() {
        let err = float_or_keep("start_temperature", "abc").unwrap_err();
        assert!(err.is_input_format());
        assert!(err.to_string().contains("start_temperature"));
    }

    #[test]
    fn test_non_finite_rejected() {
        for raw in ["inf", "NaN", "-infinity"] {
            assert!(finite_float("mevents", raw).is_err(), "{raw} accepted");
        }
    }

    #[test]
    fn test_custom_expression() {
        assert_eq!(custom_expression(""), None);
        assert_eq!(custom_expression("   "), None);
        assert_eq!(custom_expression("None"), None);
        assert_eq!(custom_expression(" log(\"x\") "), Some("log(\"x\")".to_string()));
    }

    #[test]
    fn test_set_by_name() {
        let raw = RawParameters::default()
            .with("start_temperature", "1")
            .unwrap()
            .with("stop_temperature", "10")
            .unwrap()
            .with("magnet_device", "lf")
            .unwrap();
        let params = raw.cast().unwrap();
        assert_eq!(params.temperature, AxisSpec::new(Some(1.0), Some(10.0), 0.0));
        assert_eq!(params.magnet_device, MagnetDevice::Danfysik);
    }

    #[test]
    fn test_set_unknown_key() {
        let mut raw = RawParameters::default();
        let err = raw.set("start_pressure", "1").unwrap_err();
        assert!(err.is_input_format());
    }

    #[test]
    fn test_bad_magnet_is_input_format_error() {
        let raw = RawParameters::default().with("magnet_device", "INVALID").unwrap();
        let err = raw.cast().unwrap_err();
        assert!(err.is_input_format());
        assert!(err
            .to_string()
            .contains("Magnet device must be one of ['ZF', 'LF', 'TF'] or N/A"));
    }

    #[test]
    fn test_from_toml_fills_defaults() {
        let raw = RawParameters::from_toml_str(
            r#"
                start_field = "0"
                stop_field = "100"
                step_field = "10"
                magnet_device = "ZF"
            "#,
        )
        .unwrap();
        assert_eq!(raw.start_temperature, "keep");
        assert_eq!(raw.mevents, "10");
        assert_eq!(raw.magnet_device, "ZF");
    }

    #[test]
    fn test_n_fields_is_step_field() {
        let raw = RawParameters::default().with("n_fields", "12").unwrap();
        assert_eq!(raw.step_field, "12");

        let raw = RawParameters::from_toml_str("start_field = \"0\"\nstop_field = \"50\"\nn_fields = \"6\"\n")
            .unwrap();
        assert_eq!(raw.step_field, "6");
        assert_eq!(raw.cast().unwrap().field.step, 6.0);
    }

    #[test]
    fn test_from_toml_rejects_unknown_keys() {
        assert!(RawParameters::from_toml_str("colour = \"blue\"").is_err());
    }
}
