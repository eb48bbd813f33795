use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::utils::is_valid_amount_string;

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CreateTransactionRequest {
    #[validate(required, length(min = 1))]
    pub username: Option<String>,

    #[serde(rename = "type")]
    #[validate(required, length(min = 1))]
    pub category_type: Option<String>,

    /// A JSON number or a numeric string.
    #[validate(required)]
    pub amount: Option<Value>,
}

#[derive(Debug, PartialEq)]
pub enum AmountError {
    Missing,
    NotAFloat,
}

/// Reads the amount of a transaction body.
pub fn parse_amount(value: &Value) -> Result<f64, AmountError> {
    match value {
        Value::Number(n) => n.as_f64().ok_or(AmountError::NotAFloat),
        Value::String(s) if s.trim().is_empty() => Err(AmountError::Missing),
        Value::String(s) => {
            let s = s.trim();
            if !is_valid_amount_string(s) {
                return Err(AmountError::NotAFloat);
            }
            s.parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .ok_or(AmountError::NotAFloat)
        }
        Value::Null => Err(AmountError::Missing),
        _ => Err(AmountError::NotAFloat),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteTransactionRequest {
    #[serde(rename = "_id")]
    pub id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteTransactionsRequest {
    #[serde(rename = "_ids")]
    pub ids: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct CreatedTransaction {
    pub username: String,
    #[serde(rename = "type")]
    pub category_type: String,
    pub amount: f64,
    pub date: chrono::DateTime<chrono::Utc>,
}
