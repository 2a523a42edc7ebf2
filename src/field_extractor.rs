//! Field extraction for rule evaluation and pattern detection.
//!
//! Reduces a raw transaction to the fixed twelve-field view that both the
//! rule evaluator and the fallback detector read.

use crate::types::transaction::{RuleField, Transaction};
use serde::Serialize;
use serde_json::Value;

/// Fixed-shape view of a transaction.
///
/// Missing optional fields stay `None`. Serializes with every field present
/// (missing ones as `null`) so the detector always sees the same shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedFields {
    pub transaction_id: Value,
    pub transaction_date: Option<Value>,
    pub transaction_amount: Option<Value>,
    pub transaction_channel: Option<Value>,
    pub transaction_payment_mode: Option<Value>,
    pub payment_gateway_bank: Option<Value>,
    pub payer_email: Option<Value>,
    pub payer_mobile: Option<Value>,
    pub payer_card_brand: Option<Value>,
    pub payer_device: Option<Value>,
    pub payer_browser: Option<Value>,
    pub payee_id: Option<Value>,
}

impl NormalizedFields {
    /// Look up a field by rule field name
    pub fn get(&self, field: RuleField) -> Option<&Value> {
        match field {
            RuleField::TransactionId => Some(&self.transaction_id),
            RuleField::TransactionDate => self.transaction_date.as_ref(),
            RuleField::TransactionAmount => self.transaction_amount.as_ref(),
            RuleField::TransactionChannel => self.transaction_channel.as_ref(),
            RuleField::TransactionPaymentMode => self.transaction_payment_mode.as_ref(),
            RuleField::PaymentGatewayBank => self.payment_gateway_bank.as_ref(),
            RuleField::PayerEmail => self.payer_email.as_ref(),
            RuleField::PayerMobile => self.payer_mobile.as_ref(),
            RuleField::PayerCardBrand => self.payer_card_brand.as_ref(),
            RuleField::PayerDevice => self.payer_device.as_ref(),
            RuleField::PayerBrowser => self.payer_browser.as_ref(),
            RuleField::PayeeId => self.payee_id.as_ref(),
        }
    }

    /// Result key for this transaction
    pub fn id_key(&self) -> String {
        crate::types::transaction::value_text(&self.transaction_id)
    }
}

/// Extracts normalized fields from raw transactions.
pub struct FieldExtractor;

impl FieldExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Copy the twelve screening fields out of a transaction.
    pub fn extract(&self, tx: &Transaction) -> NormalizedFields {
        NormalizedFields {
            transaction_id: tx.transaction_id.clone(),
            transaction_date: tx.transaction_date.clone(),
            transaction_amount: tx.transaction_amount.clone(),
            transaction_channel: tx.transaction_channel.clone(),
            transaction_payment_mode: tx.transaction_payment_mode.clone(),
            payment_gateway_bank: tx.payment_gateway_bank.clone(),
            payer_email: tx.payer_email.clone(),
            payer_mobile: tx.payer_mobile.clone(),
            payer_card_brand: tx.payer_card_brand.clone(),
            payer_device: tx.payer_device.clone(),
            payer_browser: tx.payer_browser.clone(),
            payee_id: tx.payee_id.clone(),
        }
    }
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::new()
    }
}
