//! Fallback pattern detection.
//!
//! The pattern engine itself lives outside this service; the core only knows
//! its contract: normalized fields and the (possibly empty) rule list in, a
//! verdict out.

use crate::field_extractor::NormalizedFields;
use crate::types::transaction::CustomRule;
use crate::types::verdict::FraudVerdict;
use anyhow::{Context, Result};
use async_nats::Client;
use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

/// Pattern based fraud detection invoked when no custom rule fires.
///
/// Errors are not recovered by the caller; they abort the transaction. A
/// verdict whose source is not `pattern` is treated as an error.
#[async_trait]
pub trait FallbackDetector: Send + Sync {
    async fn detect(&self, fields: &NormalizedFields, rules: &[CustomRule]) -> Result<FraudVerdict>;
}

/// Request body sent to the pattern engine
#[derive(Debug, Serialize)]
pub struct DetectionRequest<'a> {
    pub transaction: &'a NormalizedFields,
    pub custom_rules: &'a [CustomRule],
}

/// Detector client that asks a pattern engine over NATS request/reply.
#[derive(Clone)]
pub struct NatsPatternDetector {
    client: Client,
    subject: String,
}

impl NatsPatternDetector {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Get the subject name
    pub fn subject(&self) -> &str {
        &self.subject
    }
}

#[async_trait]
impl FallbackDetector for NatsPatternDetector {
    async fn detect(&self, fields: &NormalizedFields, rules: &[CustomRule]) -> Result<FraudVerdict> {
        let payload = serde_json::to_vec(&DetectionRequest {
            transaction: fields,
            custom_rules: rules,
        })?;

        let response = self
            .client
            .request(self.subject.clone(), payload.into())
            .await
            .with_context(|| format!("Pattern detection request on {} failed", self.subject))?;

        let verdict: FraudVerdict = serde_json::from_slice(&response.payload)
            .context("Pattern engine returned an invalid verdict")?;

        debug!(
            transaction_id = %fields.id_key(),
            fraud_source = %verdict.fraud_source,
            is_fraud = verdict.is_fraud_detected,
            fraud_score = verdict.fraud_score,
            "Pattern detection complete"
        );

        Ok(verdict)
    }
}
