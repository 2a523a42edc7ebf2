//! Screening of a single transaction

use crate::error::BatchError;
use crate::field_extractor::FieldExtractor;
use crate::metrics::ScreeningMetrics;
use crate::persistence::{PersistOutcome, PersistenceSink, RequesterId, ScreeningRecord};
use crate::screening::detector::FallbackDetector;
use crate::screening::rules::RuleEvaluator;
use crate::types::transaction::Transaction;
use crate::types::verdict::{FraudSource, FraudVerdict, ResultEntry};
use anyhow::{anyhow, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Result of screening one transaction
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenedTransaction {
    pub transaction_id: String,
    pub entry: ResultEntry,
    pub persistence: PersistOutcome,
}

impl ScreenedTransaction {
    /// Entry for a transaction whose screening failed and was isolated.
    /// Nothing is persisted for it.
    pub fn failed(tx: &Transaction, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            transaction_id: tx.id_key(),
            entry: ResultEntry::new(&FraudVerdict::screening_failed(reason.clone()), tx.echoed_rules()),
            persistence: PersistOutcome::Failed(reason),
        }
    }
}

/// Runs the two-tier decision for one transaction and persists the outcome.
pub struct TransactionProcessor {
    extractor: FieldExtractor,
    evaluator: RuleEvaluator,
    detector: Arc<dyn FallbackDetector>,
    sink: Arc<dyn PersistenceSink>,
    metrics: Arc<ScreeningMetrics>,
    detector_timeout: Option<Duration>,
    persist_timeout: Option<Duration>,
}

impl TransactionProcessor {
    pub fn new(
        detector: Arc<dyn FallbackDetector>,
        sink: Arc<dyn PersistenceSink>,
        metrics: Arc<ScreeningMetrics>,
    ) -> Self {
        Self {
            extractor: FieldExtractor::new(),
            evaluator: RuleEvaluator::new(),
            detector,
            sink,
            metrics,
            detector_timeout: None,
            persist_timeout: None,
        }
    }

    /// Bound each detector call and each persistence write
    pub fn with_timeouts(
        mut self,
        detector_timeout: Option<Duration>,
        persist_timeout: Option<Duration>,
    ) -> Self {
        self.detector_timeout = detector_timeout;
        self.persist_timeout = persist_timeout;
        self
    }

    /// Screen one transaction.
    ///
    /// Custom rules are tried first; the fallback detector runs only when none
    /// fires. A detector failure is returned as an error. A persistence
    /// failure is logged and reported in the result but never fails the call.
    pub async fn process(
        &self,
        tx: &Transaction,
        requester: &RequesterId,
    ) -> Result<ScreenedTransaction, BatchError> {
        let start_time = Instant::now();
        let fields = self.extractor.extract(tx);
        let transaction_id = fields.id_key();
        let rules = tx.rules();

        let verdict = match self.evaluator.evaluate(&fields, rules) {
            Some(verdict) => verdict,
            None => {
                let detection = with_timeout(
                    self.detector_timeout,
                    self.detector.detect(&fields, rules),
                    "pattern detection",
                )
                .await
                .and_then(require_pattern_source);

                match detection {
                    Ok(verdict) => verdict,
                    Err(e) => {
                        let reason = format!("{e:#}");
                        self.metrics.record_detector_failure();
                        error!(
                            transaction_id = %transaction_id,
                            error = %reason,
                            "Fallback detection failed"
                        );
                        return Err(BatchError::Detection {
                            transaction_id,
                            reason,
                        });
                    }
                }
            }
        };

        let entry = ResultEntry::new(&verdict, tx.echoed_rules());
        let record = ScreeningRecord::new(fields, verdict, requester.clone());
        let persistence = self.persist(&record).await;

        let processing_time = start_time.elapsed();
        self.metrics
            .record_transaction(processing_time, entry.fraud_source, entry.is_fraud);

        debug!(
            transaction_id = %transaction_id,
            fraud_source = %entry.fraud_source,
            is_fraud = entry.is_fraud,
            fraud_score = entry.fraud_score,
            processing_time_us = processing_time.as_micros(),
            "Transaction screened"
        );

        Ok(ScreenedTransaction {
            transaction_id,
            entry,
            persistence,
        })
    }

    async fn persist(&self, record: &ScreeningRecord) -> PersistOutcome {
        let write = self.sink.save(record);
        let result = match self.persist_timeout {
            Some(limit) => match tokio::time::timeout(limit, write).await {
                Ok(result) => result,
                Err(_) => {
                    // The blocking insert is not cancelled and may still commit.
                    let reason = format!(
                        "persistence write timed out after {} ms; the row may still be committed",
                        limit.as_millis()
                    );
                    self.metrics.record_persist_failure();
                    warn!(
                        transaction_id = %record.transaction_id(),
                        record_id = %record.record_id,
                        error = %reason,
                        "Screening record write unconfirmed"
                    );
                    return PersistOutcome::Failed(reason);
                }
            },
            None => write.await,
        };

        match result {
            Ok(()) => PersistOutcome::Saved,
            Err(e) => {
                let reason = format!("{e:#}");
                self.metrics.record_persist_failure();
                error!(
                    transaction_id = %record.transaction_id(),
                    record_id = %record.record_id,
                    error = %reason,
                    "Database error while saving screening record"
                );
                PersistOutcome::Failed(reason)
            }
        }
    }
}

// Only rules may produce a rule verdict, and `error` is reserved for
// isolated failures.
fn require_pattern_source(verdict: FraudVerdict) -> Result<FraudVerdict> {
    if verdict.fraud_source != FraudSource::Pattern {
        return Err(anyhow!(
            "pattern engine returned fraud_source \"{}\"",
            verdict.fraud_source
        ));
    }
    Ok(verdict)
}

async fn with_timeout<T>(
    limit: Option<Duration>,
    fut: impl Future<Output = Result<T>>,
    what: &str,
) -> Result<T> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| anyhow!("{what} timed out after {} ms", limit.as_millis()))?,
        None => fut.await,
    }
}
