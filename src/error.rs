//! Request level error taxonomy

use serde::Serialize;
use thiserror::Error;

pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorised Access not allowed";
pub const NOT_AN_ARRAY_MESSAGE: &str = "Request body must be an array of transactions";
pub const MISSING_ID_MESSAGE: &str = "All transactions must have a transaction_id";
pub const INTERNAL_MESSAGE: &str = "Internal server error";

/// Failures visible to the caller of a screening request
#[derive(Error, Debug)]
pub enum ScreeningError {
    #[error("Unauthorised Access not allowed")]
    Unauthorized,

    #[error("{0}")]
    Malformed(String),

    /// Detail is logged but never returned to the caller
    #[error("internal failure: {0}")]
    Internal(String),
}

impl ScreeningError {
    /// HTTP-style status category
    pub fn status_code(&self) -> u16 {
        match self {
            ScreeningError::Unauthorized => 401,
            ScreeningError::Malformed(_) => 400,
            ScreeningError::Internal(_) => 500,
        }
    }

    /// Message safe to return to the caller
    pub fn public_message(&self) -> String {
        match self {
            ScreeningError::Internal(_) => INTERNAL_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            message: self.public_message(),
            status_code: self.status_code(),
        }
    }
}

/// Single error object returned on a failed request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub status_code: u16,
}

/// Failures that abort a batch run
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BatchError {
    #[error("fallback detection failed for transaction {transaction_id}: {reason}")]
    Detection { transaction_id: String, reason: String },

    #[error("group {group} exceeded its deadline of {deadline_ms} ms")]
    GroupDeadline { group: usize, deadline_ms: u128 },
}

impl From<BatchError> for ScreeningError {
    fn from(err: BatchError) -> Self {
        ScreeningError::Internal(err.to_string())
    }
}
