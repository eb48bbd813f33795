use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    #[serde(rename = "type")]
    pub category_type: String,
    pub amount: f64,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub date: DateTime<Utc>,
}

impl Transaction {
    pub fn new(username: String, category_type: String, amount: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            username,
            category_type,
            amount,
            date: Utc::now(),
        }
    }
}

/// Transaction joined with the color of its category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionView {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub username: String,
    #[serde(rename = "type")]
    pub category_type: String,
    pub amount: f64,
    pub date: DateTime<Utc>,
    pub color: String,
}

impl TransactionView {
    pub fn joined(tx: &Transaction, color: &str) -> Self {
        Self {
            id: Some(tx.id.clone()),
            username: tx.username.clone(),
            category_type: tx.category_type.clone(),
            amount: tx.amount,
            date: tx.date,
            color: color.to_string(),
        }
    }

    /// Drops the document id for listings that do not expose it.
    pub fn without_id(mut self) -> Self {
        self.id = None;
        self
    }
}
