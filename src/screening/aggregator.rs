//! Collects per-transaction results into the response mapping

use crate::screening::processor::ScreenedTransaction;
use crate::types::verdict::{FraudSource, ResultEntry};
use std::collections::HashMap;

/// Response mapping keyed by transaction id
pub type BatchResults = HashMap<String, ResultEntry>;

/// Accumulates screened transactions for one batch.
///
/// Duplicate ids overwrite silently; the last write wins.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    results: BatchResults,
    persist_failures: Vec<String>,
    screening_failures: Vec<String>,
}

impl ResultAggregator {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            results: HashMap::with_capacity(capacity),
            ..Default::default()
        }
    }

    pub fn record(&mut self, screened: ScreenedTransaction) {
        if screened.entry.fraud_source == FraudSource::Error {
            self.screening_failures.push(screened.transaction_id.clone());
        } else if !screened.persistence.is_saved() {
            self.persist_failures.push(screened.transaction_id.clone());
        }
        self.results.insert(screened.transaction_id, screened.entry);
    }

    /// Ids whose screening record could not be written
    pub fn persist_failures(&self) -> &[String] {
        &self.persist_failures
    }

    /// Ids that received an error entry instead of a verdict
    pub fn screening_failures(&self) -> &[String] {
        &self.screening_failures
    }

    pub fn into_results(self) -> BatchResults {
        self.results
    }
}
