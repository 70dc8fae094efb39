//! Domain rules a parameter set must satisfy before it is run.
//!
//! Every rule is evaluated, in a fixed order, and each violated rule contributes one
//! line to the combined message. Nothing short-circuits: an operator fixing a form
//! sees every problem at once.

use serde::{Deserialize, Serialize};

use super::axis::{Axis, AxisSpec, AxisState};
use super::magnet::{device_code_list, MagnetDevice};
use super::range::Stepping;

/// Absolute tolerance for "this field is zero".
pub const DEFAULT_ZERO_FIELD_TOLERANCE: f64 = 1e-9;

/// Tunable parts of the rule set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationPolicy {
    /// Fields with `|value| <= zero_field_tolerance` count as zero.
    pub zero_field_tolerance: f64,
    /// A kept field requires the magnet to be `N/A`.
    pub keep_requires_not_applicable: bool,
    /// Zero-field points are handled by switching magnets mid-run, so a zero field
    /// on a non-ZF magnet is allowed.
    pub auto_zero_field: bool,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            zero_field_tolerance: DEFAULT_ZERO_FIELD_TOLERANCE,
            keep_requires_not_applicable: true,
            auto_zero_field: false,
        }
    }
}

/// Everything a rule may look at.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext {
    /// Requested temperature axis.
    pub temperature: AxisSpec,
    /// Requested field axis.
    pub field: AxisSpec,
    /// Selected magnet.
    pub magnet: MagnetDevice,
    /// Tunable rule behaviour.
    pub policy: ValidationPolicy,
}

impl ValidationContext {
    /// Context under the default policy.
    pub fn new(temperature: AxisSpec, field: AxisSpec, magnet: MagnetDevice) -> Self {
        Self {
            temperature,
            field,
            magnet,
            policy: ValidationPolicy::default(),
        }
    }

    /// Replace the policy.
    pub fn with_policy(mut self, policy: ValidationPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn spec(&self, axis: Axis) -> &AxisSpec {
        match axis {
            Axis::Temperature => &self.temperature,
            Axis::Field => &self.field,
        }
    }

    fn is_zero(&self, value: f64) -> bool {
        value.abs() <= self.policy.zero_field_tolerance
    }

    /// Field endpoints, only when both are set.
    fn field_endpoints(&self) -> Option<(f64, f64)> {
        match self.field.classify() {
            AxisState::Undefined => None,
            _ => self.field.start.zip(self.field.stop),
        }
    }
}

/// Outcome of [`validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Every rule passed.
    Valid,
    /// One newline-terminated fragment per violated rule, in rule order.
    Invalid(Vec<String>),
}

impl ValidationResult {
    /// No rule was violated.
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    /// The combined operator message, or `None` when valid.
    pub fn message(&self) -> Option<String> {
        match self {
            ValidationResult::Valid => None,
            ValidationResult::Invalid(reasons) => Some(reasons.concat()),
        }
    }
}

type Check = fn(&ValidationContext) -> Vec<String>;

/// A named rule.
pub struct Rule {
    /// Identifier used in logs.
    pub name: &'static str,
    check: Check,
}

impl Rule {
    /// Violations this rule finds in `context`, empty when it passes.
    pub fn evaluate(&self, context: &ValidationContext) -> Vec<String> {
        (self.check)(context)
    }
}

// =============================================================================
// Rules
// =============================================================================

fn both_or_neither_keep(context: &ValidationContext) -> Vec<String> {
    [Axis::Temperature, Axis::Field]
        .into_iter()
        .filter(|axis| context.spec(*axis).is_half_kept())
        .map(|axis| format!("If start {axis} or stop {axis} is keep, the other must also be keep\n"))
        .collect()
}

fn step_positive(context: &ValidationContext) -> Vec<String> {
    let mut reasons = Vec::new();
    for axis in [Axis::Temperature, Axis::Field] {
        if let AxisState::Scan { step, stepping, .. } = context.spec(axis).classify() {
            if step == 0.0 {
                reasons.push(format!("Cannot step through {axis}s when step is zero\n"));
            } else if step < 0.0 {
                reasons.push(format!("Step {axis} must be positive\n"));
            } else if stepping == Stepping::Log && step.fract() != 0.0 {
                reasons.push(format!("Number of {axis}s must be a whole number\n"));
            }
        }
    }
    reasons
}

fn temperature_lower_bound(context: &ValidationContext) -> Vec<String> {
    if context.temperature.endpoints().any(|t| t < 0.0) {
        vec!["Temperature too low\n".to_string()]
    } else {
        Vec::new()
    }
}

fn magnet_required(context: &ValidationContext) -> Vec<String> {
    if context.field_endpoints().is_some() && !context.magnet.is_activatable() {
        vec![format!(
            "Field set but magnet devices {} not in possible devices {}\n",
            context.magnet,
            device_code_list()
        )]
    } else {
        Vec::new()
    }
}

fn zero_field_needs_active_zf(context: &ValidationContext) -> Vec<String> {
    if context.policy.auto_zero_field || context.magnet == MagnetDevice::ActiveZF {
        return Vec::new();
    }
    let Some((start, stop)) = context.field_endpoints() else {
        return Vec::new();
    };
    let touches_zero = context.is_zero(start) || context.is_zero(stop);
    let crosses_zero = start * stop < 0.0;
    if touches_zero || crosses_zero {
        vec![format!(
            "Trying to set a zero field without using the active zero field ({}, {})\n",
            context.magnet,
            MagnetDevice::ActiveZF
        )]
    } else {
        Vec::new()
    }
}

fn nonzero_field_forbids_active_zf(context: &ValidationContext) -> Vec<String> {
    if context.magnet != MagnetDevice::ActiveZF {
        return Vec::new();
    }
    match context.field_endpoints() {
        Some((start, stop)) if !context.is_zero(start) && !context.is_zero(stop) => {
            vec!["Cannot set a non-zero field with the active zero field\n".to_string()]
        }
        _ => Vec::new(),
    }
}

fn keep_implies_not_applicable(context: &ValidationContext) -> Vec<String> {
    if context.policy.keep_requires_not_applicable
        && context.field.has_keep()
        && context.magnet != MagnetDevice::NotApplicable
    {
        vec!["If start_field or stop_field is keep, then the selected magnet must be N/A\n".to_string()]
    } else {
        Vec::new()
    }
}

/// The rule table, in evaluation order.
pub const RULES: [Rule; 7] = [
    Rule {
        name: "both_or_neither_keep",
        check: both_or_neither_keep,
    },
    Rule {
        name: "step_positive",
        check: step_positive,
    },
    Rule {
        name: "temperature_lower_bound",
        check: temperature_lower_bound,
    },
    Rule {
        name: "magnet_required",
        check: magnet_required,
    },
    Rule {
        name: "zero_field_needs_active_zf",
        check: zero_field_needs_active_zf,
    },
    Rule {
        name: "nonzero_field_forbids_active_zf",
        check: nonzero_field_forbids_active_zf,
    },
    Rule {
        name: "keep_implies_not_applicable",
        check: keep_implies_not_applicable,
    },
];

/// Evaluate every rule and combine the violations.
pub fn validate(context: &ValidationContext) -> ValidationResult {
    let reasons: Vec<String> = RULES
        .iter()
        .flat_map(|rule| {
            let found = rule.evaluate(context);
            if !found.is_empty() {
                tracing::debug!(rule = rule.name, violations = found.len(), "Rule violated");
            }
            found
        })
        .collect();

    if reasons.is_empty() {
        ValidationResult::Valid
    } else {
        ValidationResult::Invalid(reasons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(temperature: AxisSpec, field: AxisSpec, magnet: MagnetDevice) -> ValidationContext {
        ValidationContext::new(temperature, field, magnet)
    }

    fn message(context: &ValidationContext) -> Option<String> {
        validate(context).message()
    }

    fn message_of(context: &ValidationContext) -> String {
        message(context).unwrap_or_default()
    }

    #[test]
    fn test_valid_temperature_scan_with_kept_field() {
        let ctx = context(
            AxisSpec::scan(10.5, 1.0, 1.0),
            AxisSpec::keep(),
            MagnetDevice::NotApplicable,
        );
        assert_eq!(validate(&ctx), ValidationResult::Valid);
    }

    #[test]
    fn test_half_kept_temperature() {
        for spec in [
            AxisSpec::new(None, Some(1.0), 1.0),
            AxisSpec::new(Some(1.0), None, 1.0),
        ] {
            let ctx = context(spec, AxisSpec::keep(), MagnetDevice::NotApplicable);
            assert_eq!(
                message(&ctx).unwrap(),
                "If start temperature or stop temperature is keep, the other must also be keep\n"
            );
        }
    }

    #[test]
    fn test_half_kept_field() {
        let ctx = context(
            AxisSpec::keep(),
            AxisSpec::new(None, Some(1.0), 1.0),
            MagnetDevice::NotApplicable,
        );
        assert_eq!(
            message(&ctx).unwrap(),
            "If start field or stop field is keep, the other must also be keep\n"
        );
    }

    #[test]
    fn test_zero_steps_reported_for_both_axes() {
        let ctx = context(
            AxisSpec::scan(10.5, 1.0, 0.0),
            AxisSpec::scan(2.0, 30.0, 0.0),
            MagnetDevice::T20Coils,
        );
        assert_eq!(
            message(&ctx).unwrap(),
            "Cannot step through temperatures when step is zero\nCannot step through fields when step is zero\n"
        );
    }

    #[test]
    fn test_negative_steps_reported_for_both_axes() {
        let ctx = context(
            AxisSpec::scan(10.5, 1.0, -0.0001),
            AxisSpec::scan(2.0, 30.0, -2.0),
            MagnetDevice::T20Coils,
        );
        assert_eq!(
            message(&ctx).unwrap(),
            "Step temperature must be positive\nStep field must be positive\n"
        );
    }

    #[test]
    fn test_step_ignored_for_points() {
        let ctx = context(
            AxisSpec::new(Some(5.0), Some(5.0), 0.0),
            AxisSpec::new(Some(3.0), Some(3.0), -1.0),
            MagnetDevice::Danfysik,
        );
        assert!(validate(&ctx).is_valid());
    }

    #[test]
    fn test_log_field_count_must_be_whole() {
        let log = |step| AxisSpec::scan(0.0, 100.0, step).with_stepping(Stepping::Log);
        let ctx = context(AxisSpec::keep(), log(2.5), MagnetDevice::ActiveZF);
        assert_eq!(message_of(&ctx), "Number of fields must be a whole number\n");

        let ctx = context(AxisSpec::keep(), log(0.0), MagnetDevice::ActiveZF);
        assert!(message_of(&ctx).starts_with("Cannot step through fields when step is zero\n"));

        let ctx = context(AxisSpec::point(5.0), log(10.0), MagnetDevice::ActiveZF);
        assert!(!message_of(&ctx).contains("whole number"));
        // fractional linear steps are fine
        let ctx = context(AxisSpec::scan(1.0, 2.0, 0.5), AxisSpec::keep(), MagnetDevice::NotApplicable);
        assert!(validate(&ctx).is_valid());
    }

    #[test]
    fn test_temperature_too_low() {
        let ctx = context(
            AxisSpec::scan(-1.0, 5.0, 1.0),
            AxisSpec::keep(),
            MagnetDevice::NotApplicable,
        );
        assert_eq!(message(&ctx).unwrap(), "Temperature too low\n");
    }

    #[test]
    fn test_zero_field_needs_active_zf() {
        for magnet in [MagnetDevice::Danfysik, MagnetDevice::T20Coils] {
            let ctx = context(
                AxisSpec::scan(10.5, 1.0, 1.0),
                AxisSpec::new(Some(0.0), Some(0.0), 2.0),
                magnet,
            );
            assert_eq!(
                message(&ctx).unwrap(),
                format!(
                    "Trying to set a zero field without using the active zero field ({}, Active ZF)\n",
                    magnet.name()
                )
            );
        }
    }

    #[test]
    fn test_zero_field_within_tolerance() {
        let ctx = context(
            AxisSpec::keep(),
            AxisSpec::point(1e-12),
            MagnetDevice::Danfysik,
        );
        assert!(message(&ctx)
            .unwrap()
            .starts_with("Trying to set a zero field"));
    }

    #[test]
    fn test_scan_crossing_zero_needs_active_zf() {
        let ctx = context(
            AxisSpec::keep(),
            AxisSpec::scan(-5.0, 5.0, 2.0),
            MagnetDevice::Danfysik,
        );
        assert_eq!(
            message(&ctx).unwrap(),
            "Trying to set a zero field without using the active zero field (Danfysik, Active ZF)\n"
        );
    }

    #[test]
    fn test_auto_zero_field_allows_zero_on_other_magnets() {
        let policy = ValidationPolicy {
            auto_zero_field: true,
            ..ValidationPolicy::default()
        };
        let ctx = context(
            AxisSpec::keep(),
            AxisSpec::scan(0.0, 100.0, 10.0),
            MagnetDevice::Danfysik,
        )
        .with_policy(policy);
        assert!(validate(&ctx).is_valid());
    }

    #[test]
    fn test_nonzero_field_forbids_active_zf() {
        for field in [AxisSpec::scan(1.0, 20.2, 2.0), AxisSpec::point(1.0)] {
            let ctx = context(AxisSpec::scan(10.5, 1.0, 1.0), field, MagnetDevice::ActiveZF);
            assert_eq!(
                message(&ctx).unwrap(),
                "Cannot set a non-zero field with the active zero field\n"
            );
        }
    }

    #[test]
    fn test_zero_point_on_active_zf_is_valid() {
        let ctx = context(AxisSpec::keep(), AxisSpec::point(0.0), MagnetDevice::ActiveZF);
        assert!(validate(&ctx).is_valid());
    }

    #[test]
    fn test_scan_from_zero_on_active_zf_is_valid() {
        for field in [AxisSpec::scan(0.0, 10.0, 5.0), AxisSpec::scan(10.0, 0.0, 5.0)] {
            let ctx = context(AxisSpec::keep(), field, MagnetDevice::ActiveZF);
            assert_eq!(validate(&ctx), ValidationResult::Valid);
        }
    }

    #[test]
    fn test_magnet_and_zero_field_both_reported() {
        let ctx = context(
            AxisSpec::keep(),
            AxisSpec::point(0.0),
            MagnetDevice::NotApplicable,
        );
        assert_eq!(
            message(&ctx).unwrap(),
            "Field set but magnet devices N/A not in possible devices ['ZF', 'LF', 'TF']\n\
             Trying to set a zero field without using the active zero field (N/A, Active ZF)\n"
        );
    }

    #[test]
    fn test_field_set_with_not_applicable_magnet() {
        for field in [AxisSpec::point(1.0), AxisSpec::scan(1.0, 10.0, 2.0)] {
            let ctx = context(
                AxisSpec::scan(10.5, 1.0, 1.0),
                field,
                MagnetDevice::NotApplicable,
            );
            assert_eq!(
                message(&ctx).unwrap(),
                "Field set but magnet devices N/A not in possible devices ['ZF', 'LF', 'TF']\n"
            );
        }
    }

    #[test]
    fn test_kept_field_requires_not_applicable() {
        let ctx = context(
            AxisSpec::point(10.0),
            AxisSpec::keep(),
            MagnetDevice::T20Coils,
        );
        assert_eq!(
            message(&ctx).unwrap(),
            "If start_field or stop_field is keep, then the selected magnet must be N/A\n"
        );
    }

    #[test]
    fn test_keep_rule_can_be_disabled() {
        let policy = ValidationPolicy {
            keep_requires_not_applicable: false,
            ..ValidationPolicy::default()
        };
        let ctx = context(AxisSpec::point(10.0), AxisSpec::keep(), MagnetDevice::T20Coils)
            .with_policy(policy);
        assert!(validate(&ctx).is_valid());
    }

    #[test]
    fn test_violations_are_all_reported_in_order() {
        let ctx = context(
            AxisSpec::new(Some(-2.0), None, 1.0),
            AxisSpec::scan(0.0, 10.0, -1.0),
            MagnetDevice::Danfysik,
        );
        let ValidationResult::Invalid(reasons) = validate(&ctx) else {
            panic!("expected violations");
        };
        assert_eq!(
            reasons,
            vec![
                "If start temperature or stop temperature is keep, the other must also be keep\n",
                "Step field must be positive\n",
                "Temperature too low\n",
                "Trying to set a zero field without using the active zero field (Danfysik, Active ZF)\n",
            ]
        );
    }

    #[test]
    fn test_rule_table_order() {
        let names: Vec<&str> = RULES.iter().map(|r| r.name).collect();
        assert_eq!(names.first(), Some(&"both_or_neither_keep"));
        assert_eq!(names.last(), Some(&"keep_implies_not_applicable"));
        assert_eq!(names.len(), 7);
    }
}
