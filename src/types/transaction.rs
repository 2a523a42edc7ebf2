//! Candidate transaction and custom rule data structures

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};
use std::fmt;

/// A candidate transaction submitted for screening.
///
/// Every descriptive field is optional and kept as raw JSON so that rules can
/// compare against exactly what the caller sent (`transaction_amount` may be a
/// number or a string).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique key for the transaction within a batch
    pub transaction_id: Value,

    #[serde(default)]
    pub transaction_date: Option<Value>,

    /// Numeric or string amount
    #[serde(default)]
    pub transaction_amount: Option<Value>,

    #[serde(default)]
    pub transaction_channel: Option<Value>,

    #[serde(default)]
    pub transaction_payment_mode: Option<Value>,

    #[serde(default)]
    pub payment_gateway_bank: Option<Value>,

    #[serde(default)]
    pub payer_email: Option<Value>,

    #[serde(default)]
    pub payer_mobile: Option<Value>,

    #[serde(default)]
    pub payer_card_brand: Option<Value>,

    #[serde(default)]
    pub payer_device: Option<Value>,

    #[serde(default)]
    pub payer_browser: Option<Value>,

    #[serde(default)]
    pub payee_id: Option<Value>,

    /// Caller supplied rules, evaluated in order before pattern detection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_rules: Option<RuleList>,
}

impl Transaction {
    /// Create a transaction with only an identifier set
    pub fn new(transaction_id: impl Into<String>) -> Self {
        Self {
            transaction_id: Value::String(transaction_id.into()),
            ..Default::default()
        }
    }

    /// Set a descriptive field by name
    pub fn with_field(mut self, field: RuleField, value: impl Into<Value>) -> Self {
        let value = value.into();
        let slot = match field {
            RuleField::TransactionId => {
                self.transaction_id = value;
                return self;
            }
            RuleField::TransactionDate => &mut self.transaction_date,
            RuleField::TransactionAmount => &mut self.transaction_amount,
            RuleField::TransactionChannel => &mut self.transaction_channel,
            RuleField::TransactionPaymentMode => &mut self.transaction_payment_mode,
            RuleField::PaymentGatewayBank => &mut self.payment_gateway_bank,
            RuleField::PayerEmail => &mut self.payer_email,
            RuleField::PayerMobile => &mut self.payer_mobile,
            RuleField::PayerCardBrand => &mut self.payer_card_brand,
            RuleField::PayerDevice => &mut self.payer_device,
            RuleField::PayerBrowser => &mut self.payer_browser,
            RuleField::PayeeId => &mut self.payee_id,
        };
        *slot = Some(value);
        self
    }

    /// Attach custom rules
    pub fn with_rules(mut self, rules: Vec<CustomRule>) -> Self {
        self.custom_rules = Some(RuleList::from(rules));
        self
    }

    /// Key under which this transaction's result is reported.
    pub fn id_key(&self) -> String {
        value_text(&self.transaction_id)
    }

    /// Custom rules, or an empty slice when none were supplied
    pub fn rules(&self) -> &[CustomRule] {
        self.custom_rules.as_ref().map(RuleList::rules).unwrap_or(&[])
    }

    /// The `custom_rules` JSON exactly as the caller sent it
    pub fn echoed_rules(&self) -> Option<Value> {
        self.custom_rules.as_ref().map(|list| list.raw().clone())
    }
}

/// Render a JSON value the way it appears in rule reasons and stored rows.
///
/// Strings are rendered without quotes; everything else uses its JSON text.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Transaction field a custom rule can inspect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleField {
    TransactionId,
    TransactionDate,
    TransactionAmount,
    TransactionChannel,
    TransactionPaymentMode,
    PaymentGatewayBank,
    PayerEmail,
    PayerMobile,
    PayerCardBrand,
    PayerDevice,
    PayerBrowser,
    PayeeId,
}

impl RuleField {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleField::TransactionId => "transaction_id",
            RuleField::TransactionDate => "transaction_date",
            RuleField::TransactionAmount => "transaction_amount",
            RuleField::TransactionChannel => "transaction_channel",
            RuleField::TransactionPaymentMode => "transaction_payment_mode",
            RuleField::PaymentGatewayBank => "payment_gateway_bank",
            RuleField::PayerEmail => "payer_email",
            RuleField::PayerMobile => "payer_mobile",
            RuleField::PayerCardBrand => "payer_card_brand",
            RuleField::PayerDevice => "payer_device",
            RuleField::PayerBrowser => "payer_browser",
            RuleField::PayeeId => "payee_id",
        }
    }
}

impl fmt::Display for RuleField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison applied by a custom rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCondition {
    Equals,
    Contains,
    GreaterThan,
    LessThan,
    StartsWith,
    EndsWith,
}

impl RuleCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleCondition::Equals => "equals",
            RuleCondition::Contains => "contains",
            RuleCondition::GreaterThan => "greater_than",
            RuleCondition::LessThan => "less_than",
            RuleCondition::StartsWith => "starts_with",
            RuleCondition::EndsWith => "ends_with",
        }
    }
}

impl fmt::Display for RuleCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A caller supplied screening rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomRule {
    pub field: RuleField,
    pub condition: RuleCondition,
    /// Comparison operand, string or number
    pub value: Value,
}

impl CustomRule {
    pub fn new(field: RuleField, condition: RuleCondition, value: impl Into<Value>) -> Self {
        Self {
            field,
            condition,
            value: value.into(),
        }
    }
}

impl CustomRule {
    fn to_json(&self) -> Value {
        json!({
            "field": self.field.as_str(),
            "condition": self.condition.as_str(),
            "value": self.value,
        })
    }
}

/// Ordered custom rules together with the JSON they were parsed from.
///
/// Evaluation reads the typed rules; results echo the raw JSON, so keys the
/// service does not know about survive the round trip.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RuleList {
    rules: Vec<CustomRule>,
    raw: Value,
}

impl RuleList {
    pub fn rules(&self) -> &[CustomRule] {
        &self.rules
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }
}

impl From<Vec<CustomRule>> for RuleList {
    fn from(rules: Vec<CustomRule>) -> Self {
        let raw = Value::Array(rules.iter().map(CustomRule::to_json).collect());
        Self { rules, raw }
    }
}

impl Serialize for RuleList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RuleList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        let rules = Vec::<CustomRule>::deserialize(&raw).map_err(de::Error::custom)?;
        Ok(Self { rules, raw })
    }
}
