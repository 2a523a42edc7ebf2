//! Custom rule evaluation

use crate::field_extractor::NormalizedFields;
use crate::types::transaction::{value_text, CustomRule, RuleCondition};
use crate::types::verdict::FraudVerdict;
use serde_json::Value;

/// Evaluates caller supplied rules against a transaction's normalized fields.
///
/// Rules are checked in order and evaluation stops at the first violation.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleEvaluator;

impl RuleEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Return a rule verdict for the first violated rule, or `None` when no
    /// rule fires.
    pub fn evaluate(&self, fields: &NormalizedFields, rules: &[CustomRule]) -> Option<FraudVerdict> {
        rules
            .iter()
            .find(|rule| Self::is_violated(fields, rule))
            .map(FraudVerdict::rule_violation)
    }

    /// Check a single rule. A missing field never violates.
    pub fn is_violated(fields: &NormalizedFields, rule: &CustomRule) -> bool {
        let Some(value) = fields.get(rule.field) else {
            return false;
        };

        match rule.condition {
            RuleCondition::Equals => strict_equals(value, &rule.value),
            RuleCondition::Contains => {
                text_of(value).is_some_and(|text| text.contains(&value_text(&rule.value)))
            }
            RuleCondition::StartsWith => {
                text_of(value).is_some_and(|text| text.starts_with(&value_text(&rule.value)))
            }
            RuleCondition::EndsWith => {
                text_of(value).is_some_and(|text| text.ends_with(&value_text(&rule.value)))
            }
            RuleCondition::GreaterThan => compare(value, &rule.value, |a, b| a > b),
            RuleCondition::LessThan => compare(value, &rule.value, |a, b| a < b),
        }
    }
}

/// Parse a JSON value as a floating point number.
///
/// Numbers pass through. Strings are read like a decimal literal prefix:
/// leading whitespace is skipped and the longest leading float is taken, so
/// `"150.00 INR"` is 150. A string with no numeric prefix (`"$150"`, `"inf"`)
/// and any other JSON type yield `None`, which never satisfies a numeric
/// comparison.
pub fn parse_numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => leading_float(s),
        _ => None,
    }
}

fn leading_float(text: &str) -> Option<f64> {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let digits_from = |start: usize| {
        bytes[start..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
    };

    let mut end = 0;
    let negative = bytes.first() == Some(&b'-');
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    if s[end..].starts_with("Infinity") {
        return Some(if negative { f64::NEG_INFINITY } else { f64::INFINITY });
    }

    let int_digits = digits_from(end);
    end += int_digits;
    let mut mantissa_digits = int_digits;
    if bytes.get(end) == Some(&b'.') {
        let frac_digits = digits_from(end + 1);
        if int_digits + frac_digits > 0 {
            end += 1 + frac_digits;
            mantissa_digits += frac_digits;
        }
    }
    if mantissa_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_digits = digits_from(exp);
        if exp_digits > 0 {
            end = exp + exp_digits;
        }
    }

    s[..end].parse::<f64>().ok()
}

fn compare(value: &Value, operand: &Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (parse_numeric(value), parse_numeric(operand)) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

// Same JSON type and same value; numbers compare numerically so 150 and 150.0 match.
fn strict_equals(value: &Value, operand: &Value) -> bool {
    match (value, operand) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => value == operand,
    }
}

// Text conditions only apply to string fields.
fn text_of(value: &Value) -> Option<&str> {
    value.as_str()
}
