use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CategoryRequest {
    #[serde(rename = "type")]
    #[validate(required, length(min = 1))]
    pub category_type: Option<String>,

    #[validate(required, length(min = 1))]
    pub color: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct DeleteCategoriesRequest {
    #[validate(required)]
    pub types: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub message: String,
    pub count: u64,
}
