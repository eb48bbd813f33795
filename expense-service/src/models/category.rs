use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub category_type: String,
    pub color: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl Category {
    pub fn new(category_type: String, color: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            category_type,
            color,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryView {
    #[serde(rename = "type")]
    pub category_type: String,
    pub color: String,
}

impl From<&Category> for CategoryView {
    fn from(category: &Category) -> Self {
        Self {
            category_type: category.category_type.clone(),
            color: category.color.clone(),
        }
    }
}
