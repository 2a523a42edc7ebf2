//! Fraud verdict and per-transaction result structures

use crate::types::transaction::CustomRule;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Score assigned to every custom rule match
pub const RULE_MATCH_SCORE: f64 = 1.0;

/// Which tier of the screening pipeline produced a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FraudSource {
    /// A caller supplied custom rule fired
    Rule,
    /// The fallback pattern detector decided
    Pattern,
    /// Screening failed for this transaction (isolated failure policy only)
    Error,
}

impl FraudSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FraudSource::Rule => "rule",
            FraudSource::Pattern => "pattern",
            FraudSource::Error => "error",
        }
    }
}

impl fmt::Display for FraudSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fraud determination for one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudVerdict {
    pub is_fraud_detected: bool,
    pub fraud_source: FraudSource,
    pub fraud_reason: String,
    pub fraud_score: f64,
}

impl FraudVerdict {
    /// Verdict for a custom rule violation
    pub fn rule_violation(rule: &CustomRule) -> Self {
        Self {
            is_fraud_detected: true,
            fraud_source: FraudSource::Rule,
            fraud_reason: format!(
                "Rule violation: {} {} {}",
                rule.field,
                rule.condition,
                crate::types::transaction::value_text(&rule.value)
            ),
            fraud_score: RULE_MATCH_SCORE,
        }
    }

    /// Verdict recorded when screening could not complete for a transaction
    pub fn screening_failed(reason: impl Into<String>) -> Self {
        Self {
            is_fraud_detected: false,
            fraud_source: FraudSource::Error,
            fraud_reason: reason.into(),
            fraud_score: 0.0,
        }
    }
}

/// Entry returned to the caller for each screened transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEntry {
    pub is_fraud: bool,
    pub fraud_source: FraudSource,
    pub fraud_reason: String,
    pub fraud_score: f64,
    /// Input rules echoed back verbatim for auditability
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_rules: Option<Value>,
}

impl ResultEntry {
    pub fn new(verdict: &FraudVerdict, custom_rules: Option<Value>) -> Self {
        Self {
            is_fraud: verdict.is_fraud_detected,
            fraud_source: verdict.fraud_source,
            fraud_reason: verdict.fraud_reason.clone(),
            fraud_score: verdict.fraud_score,
            custom_rules,
        }
    }
}
