//! Configuration management for the fraud screening service

use anyhow::{ensure, Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// What the scheduler does when the fallback detector fails for a transaction
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Fail the whole batch; no partial results are returned
    #[default]
    AbortBatch,
    /// Record an error entry for the failed transaction and keep going
    Isolate,
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub screening: ScreeningConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject on which batch screening requests arrive
    pub request_subject: String,
    /// Queue group shared by service instances; each request goes to one member
    #[serde(default)]
    pub queue_group: Option<String>,
    /// Subject of the pattern detection engine
    pub detector_subject: String,
    /// Maximum batch requests handled at once
    #[serde(default = "default_max_inflight_batches")]
    pub max_inflight_batches: usize,
}

fn default_max_inflight_batches() -> usize {
    8
}

/// Batch screening configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ScreeningConfig {
    /// Transactions screened concurrently per group
    #[serde(default = "default_group_size")]
    pub group_size: usize,
    /// Fallback detector call timeout in milliseconds (0 disables)
    #[serde(default = "default_detector_timeout_ms")]
    pub detector_timeout_ms: u64,
    /// Persistence write timeout in milliseconds (0 disables)
    #[serde(default = "default_persist_timeout_ms")]
    pub persist_timeout_ms: u64,
    /// Deadline for a whole group in milliseconds (0 disables)
    #[serde(default = "default_group_deadline_ms")]
    pub group_deadline_ms: u64,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

fn default_group_size() -> usize {
    5
}

fn default_detector_timeout_ms() -> u64 {
    5_000
}

fn default_persist_timeout_ms() -> u64 {
    2_000
}

fn default_group_deadline_ms() -> u64 {
    30_000
}

impl ScreeningConfig {
    pub fn detector_timeout(&self) -> Option<Duration> {
        millis(self.detector_timeout_ms)
    }

    pub fn persist_timeout(&self) -> Option<Duration> {
        millis(self.persist_timeout_ms)
    }

    pub fn group_deadline(&self) -> Option<Duration> {
        millis(self.group_deadline_ms)
    }
}

fn millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            group_size: default_group_size(),
            detector_timeout_ms: default_detector_timeout_ms(),
            persist_timeout_ms: default_persist_timeout_ms(),
            group_deadline_ms: default_group_deadline_ms(),
            failure_policy: FailurePolicy::AbortBatch,
        }
    }
}

/// Screening store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file
    pub path: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
    /// Seconds between metrics summaries
    #[serde(default = "default_metrics_interval_secs")]
    pub metrics_interval_secs: u64,
}

fn default_metrics_interval_secs() -> u64 {
    60
}

impl AppConfig {
    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        let config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the scheduler cannot run with
    pub fn validate(&self) -> Result<()> {
        ensure!(self.screening.group_size >= 1, "screening.group_size must be at least 1");
        ensure!(
            self.nats.max_inflight_batches >= 1,
            "nats.max_inflight_batches must be at least 1"
        );
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                request_subject: "fraud.screen.batch".to_string(),
                queue_group: None,
                detector_subject: "fraud.patterns.detect".to_string(),
                max_inflight_batches: default_max_inflight_batches(),
            },
            screening: ScreeningConfig::default(),
            database: DatabaseConfig {
                path: "data/fraud_detection.db".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
                metrics_interval_secs: default_metrics_interval_secs(),
            },
        }
    }
}
