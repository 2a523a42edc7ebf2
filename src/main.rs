//! Fraud Screening Service - Main Entry Point
//!
//! Receives transaction batches over NATS request/reply, screens them with
//! custom rules and the pattern detection engine, and replies with a verdict
//! per transaction.

use anyhow::{Context, Result};
use fraud_screening::{
    config::{AppConfig, LoggingConfig},
    consumer::BatchRequestConsumer,
    metrics::{MetricsReporter, ScreeningMetrics},
    persistence::SqliteSink,
    producer::ReplyPublisher,
    screening::{BatchScheduler, NatsPatternDetector, TransactionProcessor},
    service::ScreeningService,
};
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/config.toml".to_string());
    let config = AppConfig::load_from_path(&config_path)?;

    // Initialize logging
    init_logging(&config.logging)?;

    info!("Starting Fraud Screening Service");
    info!(path = %config_path, "Configuration loaded successfully");
    info!(
        "Group size: {}, failure policy: {:?}, detector timeout: {} ms",
        config.screening.group_size,
        config.screening.failure_policy,
        config.screening.detector_timeout_ms
    );

    let metrics = Arc::new(ScreeningMetrics::new());

    // Open the screening store once; every write shares this handle
    let db_path = Path::new(&config.database.path);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create database directory {}", parent.display()))?;
    }
    let sink = SqliteSink::open(db_path)?;
    info!(records = sink.record_count()?, "Screening store ready");

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    let detector = Arc::new(NatsPatternDetector::new(
        client.clone(),
        &config.nats.detector_subject,
    ));
    info!(subject = %detector.subject(), "Pattern detector client configured");

    let processor = TransactionProcessor::new(detector, Arc::new(sink), metrics.clone())
        .with_timeouts(
            config.screening.detector_timeout(),
            config.screening.persist_timeout(),
        );
    let scheduler = BatchScheduler::from_config(Arc::new(processor), &config.screening);
    info!(group_size = scheduler.group_size(), "Batch scheduler ready");
    let service = Arc::new(ScreeningService::new(scheduler, metrics.clone()));

    let consumer = BatchRequestConsumer::new(client.clone(), &config.nats.request_subject)
        .with_queue_group(config.nats.queue_group.clone());
    let publisher = ReplyPublisher::new(client.clone());

    // Semaphore to limit concurrently handled batches
    let semaphore = Arc::new(Semaphore::new(config.nats.max_inflight_batches));
    info!(
        "Handling up to {} batches at once on subject {}",
        config.nats.max_inflight_batches,
        consumer.subject()
    );

    // Periodic metrics summary
    let metrics_clone = metrics.clone();
    let interval_secs = config.logging.metrics_interval_secs;
    tokio::spawn(async move {
        MetricsReporter::new(metrics_clone, interval_secs).start().await;
    });

    let mut subscription = consumer.subscribe().await?;

    loop {
        let message = tokio::select! {
            message = subscription.next() => match message {
                Some(message) => message,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        };

        // Acquire permit (limits concurrent batches)
        let permit = semaphore.clone().acquire_owned().await?;

        let service = service.clone();
        let publisher = publisher.clone();

        tokio::spawn(async move {
            let body = service.respond(&message.payload).await;

            if let Err(e) = publisher.reply(message.reply.clone(), body).await {
                error!(error = %e, "Failed to publish screening reply");
            }

            // Release permit when done
            drop(permit);
        });
    }

    info!("Screening service shutting down...");
    metrics.print_summary();

    Ok(())
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("fraud_screening={}", logging.level)))?;

    if logging.format == "json" {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}
