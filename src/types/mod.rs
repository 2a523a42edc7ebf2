//! Type definitions for the fraud screening service

pub mod transaction;
pub mod verdict;

pub use transaction::{CustomRule, RuleCondition, RuleField, Transaction};
pub use verdict::{FraudSource, FraudVerdict, ResultEntry};
