//! Batch scheduling: fixed-size groups, run one after another, with the
//! members of each group screened concurrently.

use crate::config::{FailurePolicy, ScreeningConfig};
use crate::error::BatchError;
use crate::persistence::RequesterId;
use crate::screening::aggregator::{BatchResults, ResultAggregator};
use crate::screening::processor::{ScreenedTransaction, TransactionProcessor};
use crate::types::transaction::Transaction;
use futures::future::{join_all, try_join_all};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default number of transactions screened at once
pub const DEFAULT_GROUP_SIZE: usize = 5;

/// Outcome of a completed batch
#[derive(Debug)]
pub struct BatchOutcome {
    pub results: BatchResults,
    /// Number of groups the batch was split into
    pub groups: usize,
    /// Ids whose screening record could not be persisted
    pub persist_failures: Vec<String>,
    /// Ids that received an error entry (isolate policy only)
    pub screening_failures: Vec<String>,
}

/// Splits a batch into groups and screens each group concurrently.
pub struct BatchScheduler {
    processor: Arc<TransactionProcessor>,
    group_size: usize,
    group_deadline: Option<Duration>,
    failure_policy: FailurePolicy,
}

impl BatchScheduler {
    pub fn new(processor: Arc<TransactionProcessor>) -> Self {
        Self {
            processor,
            group_size: DEFAULT_GROUP_SIZE,
            group_deadline: None,
            failure_policy: FailurePolicy::AbortBatch,
        }
    }

    pub fn from_config(processor: Arc<TransactionProcessor>, config: &ScreeningConfig) -> Self {
        Self::new(processor)
            .with_group_size(config.group_size)
            .with_group_deadline(config.group_deadline())
            .with_failure_policy(config.failure_policy)
    }

    /// Set the concurrency ceiling; values below 1 are raised to 1
    pub fn with_group_size(mut self, group_size: usize) -> Self {
        self.group_size = group_size.max(1);
        self
    }

    pub fn with_group_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.group_deadline = deadline;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn group_size(&self) -> usize {
        self.group_size
    }

    /// Screen every transaction and return the results keyed by id.
    ///
    /// Groups run strictly in order; the next group starts only once every
    /// member of the current one has finished.
    pub async fn run(
        &self,
        transactions: &[Transaction],
        requester: &RequesterId,
    ) -> Result<BatchOutcome, BatchError> {
        let mut aggregator = ResultAggregator::with_capacity(transactions.len());
        let mut groups = 0;

        for (index, group) in transactions.chunks(self.group_size).enumerate() {
            let screened = self.run_group(index, group, requester).await?;
            for item in screened {
                aggregator.record(item);
            }
            groups += 1;
            debug!(group = index, size = group.len(), "Group screened");
        }

        let persist_failures = aggregator.persist_failures().to_vec();
        let screening_failures = aggregator.screening_failures().to_vec();

        info!(
            requester = %requester,
            transactions = transactions.len(),
            groups,
            persist_failures = persist_failures.len(),
            screening_failures = screening_failures.len(),
            "Batch screened"
        );

        Ok(BatchOutcome {
            results: aggregator.into_results(),
            groups,
            persist_failures,
            screening_failures,
        })
    }

    async fn run_group(
        &self,
        index: usize,
        group: &[Transaction],
        requester: &RequesterId,
    ) -> Result<Vec<ScreenedTransaction>, BatchError> {
        let screening = self.screen_group(group, requester);

        match self.group_deadline {
            Some(deadline) => tokio::time::timeout(deadline, screening)
                .await
                .map_err(|_| BatchError::GroupDeadline {
                    group: index,
                    deadline_ms: deadline.as_millis(),
                })?,
            None => screening.await,
        }
    }

    async fn screen_group(
        &self,
        group: &[Transaction],
        requester: &RequesterId,
    ) -> Result<Vec<ScreenedTransaction>, BatchError> {
        let tasks = group.iter().map(|tx| self.processor.process(tx, requester));

        match self.failure_policy {
            // First detector error fails the group and with it the batch
            FailurePolicy::AbortBatch => try_join_all(tasks).await,
            FailurePolicy::Isolate => {
                let outcomes = join_all(tasks).await;
                Ok(group
                    .iter()
                    .zip(outcomes)
                    .map(|(tx, outcome)| {
                        outcome.unwrap_or_else(|err| {
                            warn!(
                                transaction_id = %tx.id_key(),
                                error = %err,
                                "Screening failed, recording error entry"
                            );
                            ScreenedTransaction::failed(tx, "Fallback detection failed")
                        })
                    })
                    .collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::ScreeningMetrics;
    use crate::test_support::{pattern_verdict, FakeDetector, FakeSink};
    use crate::types::transaction::{CustomRule, RuleCondition, RuleField};
    use crate::types::verdict::FraudSource;

    fn batch(n: usize) -> Vec<Transaction> {
        (0..n).map(|i| Transaction::new(format!("t{i}"))).collect()
    }

    fn scheduler(detector: Arc<FakeDetector>, sink: Arc<FakeSink>) -> BatchScheduler {
        let processor = TransactionProcessor::new(detector, sink, Arc::new(ScreeningMetrics::new()));
        BatchScheduler::new(Arc::new(processor))
    }

    #[tokio::test]
    async fn test_every_transaction_reported_once() {
        let detector = Arc::new(FakeDetector::new(pattern_verdict(false, 0.1)));
        let sink = Arc::new(FakeSink::new());
        let scheduler = scheduler(detector, sink.clone());

        let outcome = scheduler.run(&batch(12), &RequesterId::new("u1")).await.unwrap();

        assert_eq!(outcome.groups, 3);
        assert_eq!(outcome.results.len(), 12);
        for i in 0..12 {
            assert!(outcome.results.contains_key(&format!("t{i}")));
        }
        assert_eq!(sink.saved_ids().len(), 12);
    }

    #[tokio::test]
    async fn test_group_count_is_ceiling() {
        let detector = Arc::new(FakeDetector::new(pattern_verdict(false, 0.1)));
        let sink = Arc::new(FakeSink::new());

        for (n, size, expected) in [(0, 5, 0), (1, 5, 1), (5, 5, 1), (6, 5, 2), (7, 3, 3), (4, 1, 4)] {
            let scheduler = scheduler(detector.clone(), sink.clone()).with_group_size(size);
            let outcome = scheduler.run(&batch(n), &RequesterId::new("u1")).await.unwrap();
            assert_eq!(outcome.groups, expected, "n={n} size={size}");
            assert_eq!(outcome.results.len(), n);
        }
    }

    #[tokio::test]
    async fn test_concurrency_bounded_by_group_size() {
        let detector = Arc::new(
            FakeDetector::new(pattern_verdict(false, 0.1)).with_delay(Duration::from_millis(20)),
        );
        let scheduler = scheduler(detector.clone(), Arc::new(FakeSink::new()));

        scheduler.run(&batch(12), &RequesterId::new("u1")).await.unwrap();

        assert_eq!(detector.max_in_flight(), 5);
    }

    #[tokio::test]
    async fn test_groups_run_in_order() {
        let detector = Arc::new(
            FakeDetector::new(pattern_verdict(false, 0.1)).with_delay(Duration::from_millis(5)),
        );
        let scheduler = scheduler(detector.clone(), Arc::new(FakeSink::new())).with_group_size(3);

        scheduler.run(&batch(9), &RequesterId::new("u1")).await.unwrap();

        let calls = detector.call_order();
        assert_eq!(calls.len(), 9);
        for (position, id) in calls.iter().enumerate() {
            let index: usize = id.trim_start_matches('t').parse().unwrap();
            assert_eq!(index / 3, position / 3, "{id} started outside its group");
        }
    }

    #[tokio::test]
    async fn test_detector_failure_aborts_batch() {
        let detector = Arc::new(FakeDetector::failing_for(&["t7"], pattern_verdict(false, 0.1)));
        let scheduler = scheduler(detector.clone(), Arc::new(FakeSink::new()));

        let err = scheduler.run(&batch(12), &RequesterId::new("u1")).await.unwrap_err();

        assert!(matches!(err, BatchError::Detection { ref transaction_id, .. } if transaction_id == "t7"));
        // The third group never started
        assert!(detector.call_order().iter().all(|id| id != "t10"));
    }

    #[tokio::test]
    async fn test_isolate_policy_keeps_batch_going() {
        let detector = Arc::new(FakeDetector::failing_for(&["t7"], pattern_verdict(false, 0.1)));
        let sink = Arc::new(FakeSink::new());
        let scheduler = scheduler(detector, sink.clone()).with_failure_policy(FailurePolicy::Isolate);

        let outcome = scheduler.run(&batch(12), &RequesterId::new("u1")).await.unwrap();

        assert_eq!(outcome.results.len(), 12);
        assert_eq!(outcome.results["t7"].fraud_source, FraudSource::Error);
        assert_eq!(outcome.results["t8"].fraud_source, FraudSource::Pattern);
        assert_eq!(outcome.screening_failures, vec!["t7".to_string()]);
        assert!(outcome.persist_failures.is_empty());
        assert_eq!(sink.saved_ids().len(), 11);
    }

    #[tokio::test]
    async fn test_persist_failure_isolated_to_one_entry() {
        let detector = Arc::new(FakeDetector::new(pattern_verdict(true, 0.9)));
        let sink = Arc::new(FakeSink::failing_for(&["t2"]));
        let scheduler = scheduler(detector, sink.clone());

        let outcome = scheduler.run(&batch(4), &RequesterId::new("u1")).await.unwrap();

        assert_eq!(outcome.results.len(), 4);
        assert_eq!(outcome.persist_failures, vec!["t2".to_string()]);
        for entry in outcome.results.values() {
            assert!(entry.is_fraud);
            assert_eq!(entry.fraud_score, 0.9);
        }
        assert_eq!(sink.saved_ids().len(), 3);
    }

    #[tokio::test]
    async fn test_group_deadline_fails_batch() {
        let detector = Arc::new(
            FakeDetector::new(pattern_verdict(false, 0.1)).with_delay(Duration::from_millis(500)),
        );
        let scheduler = scheduler(detector, Arc::new(FakeSink::new()))
            .with_group_deadline(Some(Duration::from_millis(20)));

        let err = scheduler.run(&batch(3), &RequesterId::new("u1")).await.unwrap_err();
        assert!(matches!(err, BatchError::GroupDeadline { group: 0, .. }));
    }

    #[tokio::test]
    async fn test_mixed_rule_and_pattern_verdicts() {
        let detector = Arc::new(FakeDetector::new(pattern_verdict(false, 0.3)));
        let scheduler = scheduler(detector.clone(), Arc::new(FakeSink::new()));
        let rule = |threshold: &str| {
            vec![CustomRule::new(RuleField::TransactionAmount, RuleCondition::GreaterThan, threshold)]
        };
        let transactions = vec![
            Transaction::new("hit")
                .with_field(RuleField::TransactionAmount, "150")
                .with_rules(rule("100")),
            Transaction::new("miss")
                .with_field(RuleField::TransactionAmount, "150")
                .with_rules(rule("200")),
            Transaction::new("bare"),
        ];

        let outcome = scheduler.run(&transactions, &RequesterId::new("u1")).await.unwrap();

        assert_eq!(outcome.results["hit"].fraud_source, FraudSource::Rule);
        assert_eq!(outcome.results["miss"].fraud_source, FraudSource::Pattern);
        assert_eq!(outcome.results["bare"].fraud_source, FraudSource::Pattern);
        assert_eq!(detector.call_order().len(), 2);
    }

    #[test]
    fn test_from_config() {
        let processor = TransactionProcessor::new(
            Arc::new(FakeDetector::new(pattern_verdict(false, 0.1))),
            Arc::new(FakeSink::new()),
            Arc::new(ScreeningMetrics::new()),
        );
        let config = ScreeningConfig {
            group_size: 0,
            ..Default::default()
        };
        let scheduler = BatchScheduler::from_config(Arc::new(processor), &config);
        assert_eq!(scheduler.group_size(), 1);
    }
}
