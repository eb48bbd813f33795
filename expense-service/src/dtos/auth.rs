use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Default, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(required, length(min = 1))]
    pub username: Option<String>,

    #[validate(required, length(min = 1))]
    pub email: Option<String>,

    #[validate(required, length(min = 1))]
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(required, length(min = 1))]
    pub email: Option<String>,

    #[validate(required, length(min = 1))]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TokenPair {
    #[serde(rename = "accessToken")]
    pub access_token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteUserRequest {
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteUserResponse {
    #[serde(rename = "deletedTransactions")]
    pub deleted_transactions: u64,
    #[serde(rename = "deletedFromGroup")]
    pub deleted_from_group: bool,
}

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub users: Vec<crate::models::UserInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_requires_every_field() {
        let body: RegisterRequest =
            serde_json::from_str(r#"{"username":"mario","email":"m@example.com"}"#).unwrap();
        assert!(body.validate().is_err());

        let body: RegisterRequest = serde_json::from_str(
            r#"{"username":"mario","email":"m@example.com","password":""}"#,
        )
        .unwrap();
        assert!(body.validate().is_err());
    }

    #[test]
    fn test_token_pair_uses_cookie_names() {
        let pair = TokenPair {
            access_token: "a".into(),
            refresh_token: "r".into(),
        };
        let value = serde_json::to_value(pair).unwrap();
        assert_eq!(value["accessToken"], "a");
        assert_eq!(value["refreshToken"], "r");
    }
}
