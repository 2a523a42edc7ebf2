//! Scripted detector and sink doubles shared by the unit tests

use crate::field_extractor::NormalizedFields;
use crate::persistence::{PersistenceSink, ScreeningRecord};
use crate::screening::detector::FallbackDetector;
use crate::types::transaction::CustomRule;
use crate::types::verdict::{FraudSource, FraudVerdict};
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn pattern_verdict(is_fraud: bool, score: f64) -> FraudVerdict {
    FraudVerdict {
        is_fraud_detected: is_fraud,
        fraud_source: FraudSource::Pattern,
        fraud_reason: if is_fraud {
            "Suspicious velocity pattern".to_string()
        } else {
            "No suspicious pattern".to_string()
        },
        fraud_score: score,
    }
}

fn id_set(ids: &[&str]) -> HashSet<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

pub struct FakeDetector {
    verdict: FraudVerdict,
    fail_ids: HashSet<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
    last_rule_count: Mutex<Option<usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeDetector {
    pub fn new(verdict: FraudVerdict) -> Self {
        Self {
            verdict,
            fail_ids: HashSet::new(),
            delay: None,
            calls: Mutex::new(Vec::new()),
            last_rule_count: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn failing_for(ids: &[&str], verdict: FraudVerdict) -> Self {
        Self {
            fail_ids: id_set(ids),
            ..Self::new(verdict)
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn call_order(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_rule_count(&self) -> Option<usize> {
        *self.last_rule_count.lock().unwrap()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FallbackDetector for FakeDetector {
    async fn detect(&self, fields: &NormalizedFields, rules: &[CustomRule]) -> Result<FraudVerdict> {
        let id = fields.id_key();
        self.calls.lock().unwrap().push(id.clone());
        *self.last_rule_count.lock().unwrap() = Some(rules.len());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_ids.contains(&id) {
            bail!("pattern engine unavailable");
        }
        Ok(self.verdict.clone())
    }
}

pub struct FakeSink {
    fail_all: bool,
    fail_ids: HashSet<String>,
    delay: Option<Duration>,
    records: Mutex<Vec<ScreeningRecord>>,
}

impl FakeSink {
    pub fn new() -> Self {
        Self {
            fail_all: false,
            fail_ids: HashSet::new(),
            delay: None,
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::new()
        }
    }

    pub fn failing_for(ids: &[&str]) -> Self {
        Self {
            fail_ids: id_set(ids),
            ..Self::new()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn records(&self) -> Vec<ScreeningRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn saved_ids(&self) -> Vec<String> {
        self.records().iter().map(ScreeningRecord::transaction_id).collect()
    }
}

#[async_trait]
impl PersistenceSink for FakeSink {
    async fn save(&self, record: &ScreeningRecord) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let id = record.transaction_id();
        if self.fail_all || self.fail_ids.contains(&id) {
            bail!("connection reset while writing {id}");
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}
