//! Request shape validation, run before any screening work starts.

use crate::error::{ScreeningError, MISSING_ID_MESSAGE, NOT_AN_ARRAY_MESSAGE};
use crate::persistence::RequesterId;
use crate::types::transaction::Transaction;
use serde_json::Value;

/// Check the requester and payload, returning the typed batch.
///
/// Order matters: identity first, then payload shape, then every
/// `transaction_id`, and only then the full transaction parse (which also
/// rejects unknown rule fields and conditions).
pub fn validate_request(
    requester_id: Option<&str>,
    payload: &Value,
) -> Result<(RequesterId, Vec<Transaction>), ScreeningError> {
    let requester = match requester_id.map(str::trim) {
        Some(id) if !id.is_empty() => RequesterId::new(id),
        _ => return Err(ScreeningError::Unauthorized),
    };

    let items = payload
        .as_array()
        .ok_or_else(|| ScreeningError::Malformed(NOT_AN_ARRAY_MESSAGE.to_string()))?;

    if !items.iter().all(has_transaction_id) {
        return Err(ScreeningError::Malformed(MISSING_ID_MESSAGE.to_string()));
    }

    let transactions = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value::<Transaction>(item.clone()).map_err(|e| {
                ScreeningError::Malformed(format!("Invalid transaction at index {index}: {e}"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok((requester, transactions))
}

/// A usable id is a non-empty string or a non-zero number.
fn has_transaction_id(item: &Value) -> bool {
    match item.get("transaction_id") {
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    }
}
