//! Two-tier screening: custom rules, then fallback pattern detection

pub mod aggregator;
pub mod detector;
pub mod processor;
pub mod rules;
pub mod scheduler;

pub use aggregator::{BatchResults, ResultAggregator};
pub use detector::{FallbackDetector, NatsPatternDetector};
pub use processor::{ScreenedTransaction, TransactionProcessor};
pub use rules::RuleEvaluator;
pub use scheduler::{BatchOutcome, BatchScheduler};
