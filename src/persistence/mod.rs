//! Persistence sink for screened transactions.
//!
//! Records are append-only: one row per screened transaction, never updated
//! or deleted by this service.

pub mod schema;

use crate::field_extractor::NormalizedFields;
use crate::types::transaction::value_text;
use crate::types::verdict::FraudVerdict;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

/// Authenticated identity on whose behalf a batch is screened
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequesterId(String);

impl RequesterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequesterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Write-once row describing one screened transaction
#[derive(Debug, Clone)]
pub struct ScreeningRecord {
    pub record_id: Uuid,
    pub fields: NormalizedFields,
    pub verdict: FraudVerdict,
    pub requester: RequesterId,
    pub created_at: DateTime<Utc>,
}

impl ScreeningRecord {
    pub fn new(fields: NormalizedFields, verdict: FraudVerdict, requester: RequesterId) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            fields,
            verdict,
            requester,
            created_at: Utc::now(),
        }
    }

    pub fn transaction_id(&self) -> String {
        self.fields.id_key()
    }
}

/// Outcome of a persistence attempt, reported back to the processor.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistOutcome {
    Saved,
    Failed(String),
}

impl PersistOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, PersistOutcome::Saved)
    }
}

/// Durable store for screening records.
///
/// Implementations must accept concurrent independent writes.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn save(&self, record: &ScreeningRecord) -> Result<()>;
}

/// SQLite backed sink; the connection is shared behind a mutex and writes
/// run on the blocking thread pool.
#[derive(Clone)]
pub struct SqliteSink {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSink {
    /// Open (or create) the database file and migrate its schema
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        schema::migrate(&conn).context("Failed to migrate database schema")?;
        info!(path = %path.display(), "Screening store opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Total number of stored records
    pub fn record_count(&self) -> Result<usize> {
        let conn = self.conn.lock().map_err(|_| anyhow!("Database lock poisoned"))?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM fraud_detection", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn insert(conn: &Connection, record: &ScreeningRecord) -> Result<(), rusqlite::Error> {
        let f = &record.fields;
        let text = |v: &Option<serde_json::Value>| v.as_ref().map(value_text);

        conn.execute(
            "INSERT INTO fraud_detection (
                record_id, transaction_id, transaction_date, transaction_amount,
                transaction_channel, transaction_payment_mode, payment_gateway_bank,
                payer_email, payer_mobile, payer_card_brand, payer_device,
                payer_browser, payee_id, is_fraud_predicted, fraud_source,
                fraud_reason, fraud_score, user_id, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
            rusqlite::params![
                record.record_id.to_string(),
                f.id_key(),
                text(&f.transaction_date),
                text(&f.transaction_amount),
                text(&f.transaction_channel),
                text(&f.transaction_payment_mode),
                text(&f.payment_gateway_bank),
                text(&f.payer_email),
                text(&f.payer_mobile),
                text(&f.payer_card_brand),
                text(&f.payer_device),
                text(&f.payer_browser),
                text(&f.payee_id),
                record.verdict.is_fraud_detected,
                record.verdict.fraud_source.as_str(),
                record.verdict.fraud_reason,
                record.verdict.fraud_score,
                record.requester.as_str(),
                record.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

#[async_trait]
impl PersistenceSink for SqliteSink {
    async fn save(&self, record: &ScreeningRecord) -> Result<()> {
        let conn = self.conn.clone();
        let owned = record.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let conn = conn.lock().map_err(|_| anyhow!("Database lock poisoned"))?;
            SqliteSink::insert(&conn, &owned)?;
            Ok(())
        })
        .await
        .context("Persistence task panicked")??;

        debug!(
            transaction_id = %record.transaction_id(),
            record_id = %record.record_id,
            "Screening record saved"
        );
        Ok(())
    }
}
