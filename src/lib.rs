//! Fraud Screening Library
//!
//! Batch fraud screening: each transaction is checked against caller supplied
//! custom rules first and handed to a pattern detection engine when none
//! fires. Every verdict is persisted and returned keyed by transaction id.

pub mod config;
pub mod consumer;
pub mod error;
pub mod field_extractor;
pub mod metrics;
pub mod persistence;
pub mod producer;
pub mod screening;
pub mod service;
pub mod types;
pub mod validation;

#[cfg(test)]
mod test_support;

pub use config::AppConfig;
pub use consumer::BatchRequestConsumer;
pub use error::ScreeningError;
pub use field_extractor::{FieldExtractor, NormalizedFields};
pub use persistence::{PersistenceSink, RequesterId, SqliteSink};
pub use producer::ReplyPublisher;
pub use screening::{BatchScheduler, FallbackDetector, TransactionProcessor};
pub use service::ScreeningService;
pub use types::{transaction::Transaction, verdict::FraudVerdict};
