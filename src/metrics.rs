//! Counters and latency statistics for the screening service.

use crate::types::verdict::FraudSource;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector shared by every screening component
pub struct ScreeningMetrics {
    /// Total transactions screened (any outcome)
    pub transactions_screened: AtomicU64,
    /// Verdicts produced by custom rules
    pub rule_verdicts: AtomicU64,
    /// Verdicts produced by the pattern detector
    pub pattern_verdicts: AtomicU64,
    /// Transactions flagged as fraudulent
    pub fraud_detected: AtomicU64,
    /// Failed persistence writes
    pub persist_failures: AtomicU64,
    /// Fallback detector errors and timeouts
    pub detector_failures: AtomicU64,
    /// Batches completed successfully
    pub batches_completed: AtomicU64,
    /// Batches that ended in an internal failure
    pub batches_failed: AtomicU64,
    /// Per-transaction screening times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    start_time: Instant,
}

impl ScreeningMetrics {
    pub fn new() -> Self {
        Self {
            transactions_screened: AtomicU64::new(0),
            rule_verdicts: AtomicU64::new(0),
            pattern_verdicts: AtomicU64::new(0),
            fraud_detected: AtomicU64::new(0),
            persist_failures: AtomicU64::new(0),
            detector_failures: AtomicU64::new(0),
            batches_completed: AtomicU64::new(0),
            batches_failed: AtomicU64::new(0),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    /// Record a screened transaction and where its verdict came from
    pub fn record_transaction(&self, processing_time: Duration, source: FraudSource, is_fraud: bool) {
        self.transactions_screened.fetch_add(1, Ordering::Relaxed);

        match source {
            FraudSource::Rule => self.rule_verdicts.fetch_add(1, Ordering::Relaxed),
            FraudSource::Pattern => self.pattern_verdicts.fetch_add(1, Ordering::Relaxed),
            FraudSource::Error => 0,
        };

        if is_fraud {
            self.fraud_detected.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only the most recent window
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }
    }

    pub fn record_persist_failure(&self) {
        self.persist_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_detector_failure(&self) {
        self.detector_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch(&self, succeeded: bool) {
        if succeeded {
            self.batches_completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.batches_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let Ok(times) = self.processing_times.read() else {
            return ProcessingStats::default();
        };
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[((count as f64 * 0.95) as usize).min(count - 1)],
            p99_us: sorted[((count as f64 * 0.99) as usize).min(count - 1)],
            max_us: sorted[count - 1],
        }
    }

    /// Current throughput (transactions per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.transactions_screened.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let screened = self.transactions_screened.load(Ordering::Relaxed);
        let fraud = self.fraud_detected.load(Ordering::Relaxed);
        let fraud_rate = if screened > 0 {
            (fraud as f64 / screened as f64) * 100.0
        } else {
            0.0
        };
        let processing = self.get_processing_stats();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║              FRAUD SCREENING - METRICS SUMMARY               ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Transactions Screened:  {:>8}  │  Throughput: {:>6.1} tx/s ║",
            screened,
            self.get_throughput()
        );
        info!(
            "║ Fraud Detected:         {:>8}  │  Fraud Rate: {:>6.1}%     ║",
            fraud, fraud_rate
        );
        info!(
            "║ Rule Verdicts:          {:>8}  │  Pattern Verdicts: {:>8} ║",
            self.rule_verdicts.load(Ordering::Relaxed),
            self.pattern_verdicts.load(Ordering::Relaxed)
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Persist Failures:       {:>8}  │  Detector Failures: {:>7} ║",
            self.persist_failures.load(Ordering::Relaxed),
            self.detector_failures.load(Ordering::Relaxed)
        );
        info!(
            "║ Batches Completed:      {:>8}  │  Batches Failed: {:>10} ║",
            self.batches_completed.load(Ordering::Relaxed),
            self.batches_failed.load(Ordering::Relaxed)
        );
        info!(
            "║ Screening Time (μs): mean={:>5} p50={:>5} p95={:>5} p99={:>5} ║",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.p99_us
        );
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for ScreeningMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Periodic metrics reporter
pub struct MetricsReporter {
    metrics: Arc<ScreeningMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ScreeningMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
