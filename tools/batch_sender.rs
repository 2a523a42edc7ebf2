//! Test Batch Sender
//!
//! Generates batches of candidate transactions (some with custom rules) and
//! sends them to the screening service over NATS request/reply.

use rand::Rng;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};

/// Request envelope matching the service's expected format
#[derive(Debug, Serialize)]
struct BatchRequest {
    requester_id: String,
    transactions: Vec<Value>,
}

/// Transaction generator for testing
struct TransactionGenerator {
    rng: rand::rngs::ThreadRng,
}

impl TransactionGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    /// Generate an ordinary looking transaction
    fn generate_legitimate(&mut self) -> Value {
        let amount = self.rng.gen_range(10.0..500.0_f64);
        let channel = self.random_choice(&["web", "mobile", "pos"]);
        let mode = self.random_choice(&["card", "upi", "netbanking"]);
        let bank = self.random_choice(&["HDFC", "ICICI", "SBI", "AXIS"]);
        let domain = self.random_choice(&["gmail.com", "yahoo.com", "outlook.com"]);
        let brand = self.random_choice(&["VISA", "MASTERCARD", "RUPAY"]);
        let device = self.random_choice(&["android", "ios", "desktop"]);
        let browser = self.random_choice(&["chrome", "safari", "firefox"]);
        let mobile = format!("+91{}", self.rng.gen_range(7_000_000_000_u64..9_999_999_999));
        let payee = format!("payee_{}", self.rng.gen_range(1..500));

        json!({
            "transaction_id": uuid::Uuid::new_v4().to_string(),
            "transaction_date": chrono::Utc::now().to_rfc3339(),
            "transaction_amount": format!("{amount:.2}"),
            "transaction_channel": channel,
            "transaction_payment_mode": mode,
            "payment_gateway_bank": bank,
            "payer_email": format!("user{}@{}", self.rng.gen_range(1..10_000), domain),
            "payer_mobile": mobile,
            "payer_card_brand": brand,
            "payer_device": device,
            "payer_browser": browser,
            "payee_id": payee,
        })
    }

    /// Generate a transaction likely to trip a custom rule or the pattern engine
    fn generate_suspicious(&mut self) -> Value {
        let mut tx = self.generate_legitimate();
        tx["transaction_amount"] = json!(self.rng.gen_range(5_000.0..50_000.0_f64));
        tx["payer_email"] = json!(format!("x{}@tempmail.com", self.rng.gen_range(1..1000)));
        tx["transaction_channel"] = json!("web");
        tx
    }

    /// Attach a random rule set to roughly half the transactions
    fn maybe_attach_rules(&mut self, tx: &mut Value) {
        if !self.rng.gen_bool(0.5) {
            return;
        }
        let rules = [
            json!({"field": "transaction_amount", "condition": "greater_than", "value": "10000"}),
            json!({"field": "payer_email", "condition": "ends_with", "value": "@tempmail.com"}),
            json!({"field": "payer_card_brand", "condition": "equals", "value": "RUPAY"}),
            json!({"field": "payer_mobile", "condition": "starts_with", "value": "+917"}),
        ];
        let count = self.rng.gen_range(1..=rules.len());
        tx["custom_rules"] = Value::Array(rules[..count].to_vec());
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }

    fn batch(&mut self, size: usize, fraud_rate: f64) -> Vec<Value> {
        (0..size)
            .map(|_| {
                let mut tx = if self.rng.gen_bool(fraud_rate) {
                    self.generate_suspicious()
                } else {
                    self.generate_legitimate()
                };
                self.maybe_attach_rules(&mut tx);
                tx
            })
            .collect()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("batch_sender=info".parse()?),
        )
        .init();

    info!("Starting Test Batch Sender");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("fraud.screen.batch");
    let batches: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(10);
    let batch_size: usize = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(12);
    let fraud_rate: f64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(0.1);
    let delay_ms: u64 = args.get(6).and_then(|s| s.parse().ok()).unwrap_or(500);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        batches = batches,
        batch_size = batch_size,
        fraud_rate = fraud_rate,
        "Configuration loaded"
    );

    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(batches, batch_size, fraud_rate);
        }
    };

    let mut generator = TransactionGenerator::new();

    for i in 0..batches {
        let request = BatchRequest {
            requester_id: "batch-sender".to_string(),
            transactions: generator.batch(batch_size, fraud_rate),
        };
        let payload = serde_json::to_vec(&request)?;

        match client.request(subject.to_string(), payload.into()).await {
            Ok(reply) => {
                let body: Value = serde_json::from_slice(&reply.payload)?;
                if let Some(error) = body.get("error") {
                    warn!(batch = i + 1, error = %error, "Batch rejected");
                } else if let Some(results) = body.as_object() {
                    let flagged = results
                        .values()
                        .filter(|entry| entry["is_fraud"] == json!(true))
                        .count();
                    let by_rule = results
                        .values()
                        .filter(|entry| entry["fraud_source"] == json!("rule"))
                        .count();
                    info!(
                        batch = i + 1,
                        screened = results.len(),
                        flagged = flagged,
                        by_rule = by_rule,
                        "Batch screened"
                    );
                }
            }
            Err(e) => warn!(batch = i + 1, error = %e, "Screening request failed"),
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!("Completed! Sent {} batches of {} transactions", batches, batch_size);

    Ok(())
}

fn run_dry_mode(batches: u64, batch_size: usize, fraud_rate: f64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = TransactionGenerator::new();

    for i in 0..batches {
        let request = BatchRequest {
            requester_id: "batch-sender".to_string(),
            transactions: generator.batch(batch_size, fraud_rate),
        };
        let json = serde_json::to_string_pretty(&request)?;

        if i == 0 {
            info!("Sample batch:\n{}", json);
        }
    }

    Ok(())
}
