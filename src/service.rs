//! Entry point for one batch screening request

use crate::error::{ErrorBody, ScreeningError};
use crate::metrics::ScreeningMetrics;
use crate::screening::aggregator::BatchResults;
use crate::screening::scheduler::BatchScheduler;
use crate::validation::validate_request;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Request envelope delivered by the transport.
///
/// `requester_id` is the identity the transport authenticated; the service
/// only checks that it is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub requester_id: Option<String>,
    #[serde(default)]
    pub transactions: Value,
}

/// Reply body: either the result mapping or a single error object
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ScreeningReply {
    Results(BatchResults),
    Error { error: ErrorBody },
}

/// Validates requests and runs them through the batch scheduler.
pub struct ScreeningService {
    scheduler: BatchScheduler,
    metrics: Arc<ScreeningMetrics>,
}

impl ScreeningService {
    pub fn new(scheduler: BatchScheduler, metrics: Arc<ScreeningMetrics>) -> Self {
        Self { scheduler, metrics }
    }

    /// Screen a batch on behalf of `requester_id`.
    pub async fn screen(
        &self,
        requester_id: Option<&str>,
        payload: &Value,
    ) -> Result<BatchResults, ScreeningError> {
        let (requester, transactions) = validate_request(requester_id, payload).map_err(|e| {
            warn!(status_code = e.status_code(), reason = %e, "Rejected screening request");
            e
        })?;

        match self.scheduler.run(&transactions, &requester).await {
            Ok(outcome) => {
                self.metrics.record_batch(true);
                if !outcome.persist_failures.is_empty() {
                    warn!(
                        requester = %requester,
                        transaction_ids = ?outcome.persist_failures,
                        "Screening records not persisted"
                    );
                }
                if !outcome.screening_failures.is_empty() {
                    warn!(
                        requester = %requester,
                        groups = outcome.groups,
                        transaction_ids = ?outcome.screening_failures,
                        "Transactions answered with screening error entries"
                    );
                }
                Ok(outcome.results)
            }
            Err(e) => {
                self.metrics.record_batch(false);
                error!(requester = %requester, error = %e, "Server error");
                Err(e.into())
            }
        }
    }

    /// Decode a request envelope and screen it
    pub async fn handle(&self, body: &[u8]) -> Result<BatchResults, ScreeningError> {
        let request: BatchRequest = serde_json::from_slice(body)
            .map_err(|e| ScreeningError::Malformed(format!("Invalid request envelope: {e}")))?;
        self.screen(request.requester_id.as_deref(), &request.transactions)
            .await
    }

    /// Handle a request and encode the reply body
    pub async fn respond(&self, body: &[u8]) -> Vec<u8> {
        let reply = match self.handle(body).await {
            Ok(results) => {
                info!(transactions = results.len(), "Screening request completed");
                ScreeningReply::Results(results)
            }
            Err(e) => ScreeningReply::Error { error: e.to_body() },
        };

        serde_json::to_vec(&reply).unwrap_or_else(|e| {
            error!(error = %e, "Failed to encode screening reply");
            br#"{"error":{"message":"Internal server error","status_code":500}}"#.to_vec()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::SqliteSink;
    use crate::screening::processor::TransactionProcessor;
    use crate::test_support::{pattern_verdict, FakeDetector, FakeSink};
    use crate::types::verdict::FraudSource;
    use serde_json::json;
    use std::sync::atomic::Ordering;

    fn service(detector: FakeDetector) -> (ScreeningService, SqliteSink) {
        let metrics = Arc::new(ScreeningMetrics::new());
        let sink = SqliteSink::open_in_memory().unwrap();
        let processor = TransactionProcessor::new(Arc::new(detector), Arc::new(sink.clone()), metrics.clone());
        let scheduler = BatchScheduler::new(Arc::new(processor));
        (ScreeningService::new(scheduler, metrics), sink)
    }

    #[tokio::test]
    async fn test_rule_violation_example() {
        let (service, sink) = service(FakeDetector::new(pattern_verdict(false, 0.1)));
        let payload = json!([{
            "transaction_id": "t1",
            "transaction_amount": "150",
            "custom_rules": [{"field": "transaction_amount", "condition": "greater_than", "value": "100"}]
        }]);

        let results = service.screen(Some("user-1"), &payload).await.unwrap();

        let entry = &results["t1"];
        assert!(entry.is_fraud);
        assert_eq!(entry.fraud_source, FraudSource::Rule);
        assert_eq!(entry.fraud_reason, "Rule violation: transaction_amount greater_than 100");
        assert_eq!(entry.fraud_score, 1.0);
        assert_eq!(
            serde_json::to_value(&entry.custom_rules).unwrap(),
            json!([{"field": "transaction_amount", "condition": "greater_than", "value": "100"}])
        );
        assert_eq!(sink.record_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_no_violation_example_uses_pattern_verdict() {
        let verdict = pattern_verdict(true, 0.66);
        let (service, _sink) = service(FakeDetector::new(verdict.clone()));
        let payload = json!([{
            "transaction_id": "t1",
            "transaction_amount": "150",
            "custom_rules": [{"field": "transaction_amount", "condition": "greater_than", "value": "200"}]
        }]);

        let results = service.screen(Some("user-1"), &payload).await.unwrap();

        let entry = &results["t1"];
        assert_eq!(entry.fraud_source, FraudSource::Pattern);
        assert_eq!(entry.is_fraud, verdict.is_fraud_detected);
        assert_eq!(entry.fraud_reason, verdict.fraud_reason);
        assert_eq!(entry.fraud_score, verdict.fraud_score);
    }

    #[tokio::test]
    async fn test_detector_failure_is_opaque_internal_error() {
        let (service, _sink) = service(FakeDetector::failing_for(&["t2"], pattern_verdict(false, 0.1)));
        let payload = json!([{"transaction_id": "t1"}, {"transaction_id": "t2"}]);

        let err = service.screen(Some("user-1"), &payload).await.unwrap_err();

        assert_eq!(err.status_code(), 500);
        assert_eq!(err.public_message(), "Internal server error");
        assert_eq!(service.metrics.batches_failed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_validation_failures_skip_screening() {
        let detector = FakeDetector::new(pattern_verdict(false, 0.1));
        let (service, sink) = service(detector);

        let err = service
            .screen(None, &json!([{"transaction_id": "t1"}]))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 401);

        let err = service
            .screen(Some("u"), &json!([{"transaction_amount": 1}]))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(sink.record_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_respond_encodes_results_and_errors() {
        let (service, _sink) = service(FakeDetector::new(pattern_verdict(false, 0.1)));

        let ok = service
            .respond(br#"{"requester_id":"u1","transactions":[{"transaction_id":"a"}]}"#)
            .await;
        let ok: Value = serde_json::from_slice(&ok).unwrap();
        assert_eq!(ok["a"]["fraud_source"], json!("pattern"));

        let rejected = service
            .respond(br#"{"transactions":[{"transaction_id":"a"}]}"#)
            .await;
        let rejected: Value = serde_json::from_slice(&rejected).unwrap();
        assert_eq!(
            rejected,
            json!({"error": {"message": "Unauthorised Access not allowed", "status_code": 401}})
        );

        let garbage = service.respond(b"not json").await;
        let garbage: Value = serde_json::from_slice(&garbage).unwrap();
        assert_eq!(garbage["error"]["status_code"], json!(400));
    }

    #[tokio::test]
    async fn test_unpersisted_transactions_still_answered() {
        let metrics = Arc::new(ScreeningMetrics::new());
        let sink = Arc::new(FakeSink::failing_for(&["b"]));
        let processor = TransactionProcessor::new(
            Arc::new(FakeDetector::new(pattern_verdict(true, 0.9))),
            sink.clone(),
            metrics.clone(),
        );
        let service = ScreeningService::new(BatchScheduler::new(Arc::new(processor)), metrics);
        let payload = json!([{"transaction_id": "a"}, {"transaction_id": "b"}]);

        let results = service.screen(Some("user-1"), &payload).await.unwrap();

        assert_eq!(results.len(), 2);
        assert!(results["b"].is_fraud);
        assert_eq!(sink.saved_ids(), vec!["a".to_string()]);
        assert_eq!(service.metrics.persist_failures.load(Ordering::Relaxed), 1);
        assert_eq!(service.metrics.batches_completed.load(Ordering::Relaxed), 1);
    }
}
