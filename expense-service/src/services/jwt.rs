use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

use crate::config::JwtConfig;
use crate::models::User;

/// Identity carried by both tokens of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    pub email: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role.as_str().to_string(),
            id: Some(user.id.clone()),
        }
    }
}

/// Decoded token payload.
///
/// Identity fields default to empty when absent so that a correctly signed
/// but incomplete token still decodes and can be rejected for missing
/// information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
}

impl Claims {
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.email.is_empty() && !self.role.is_empty()
    }

    /// Same user on both sides: username, email and role all agree.
    pub fn same_subject(&self, other: &Claims) -> bool {
        self.username == other.username && self.email == other.email && self.role == other.role
    }

    pub fn identity(&self) -> Identity {
        Identity {
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role.clone(),
            id: self.id.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct EncodedClaims<'a> {
    #[serde(flatten)]
    identity: &'a Identity,
    exp: i64,
    iat: i64,
}

/// Why a token failed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    Expired,
    NotBefore,
    Invalid(String),
}

impl TokenError {
    /// Stable name reported to clients.
    pub fn name(&self) -> &'static str {
        match self {
            TokenError::Expired => "TokenExpiredError",
            TokenError::NotBefore => "NotBeforeError",
            TokenError::Invalid(_) => "JsonWebTokenError",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::ImmatureSignature => TokenError::NotBefore,
            _ => TokenError::Invalid(err.to_string()),
        }
    }
}

/// HS256 codec for access and refresh tokens.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_nbf = true;

        Self {
            encoding_key: EncodingKey::from_secret(config.access_key.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.access_key.as_bytes()),
            validation,
            access_ttl: Duration::minutes(config.access_token_expiry_minutes),
            refresh_ttl: Duration::days(config.refresh_token_expiry_days),
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn sign(&self, identity: &Identity, lifetime: Duration) -> Result<String, anyhow::Error> {
        let now = Utc::now();
        let claims = EncodedClaims {
            identity,
            exp: (now + lifetime).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode token: {}", e))
    }

    pub fn sign_access(&self, identity: &Identity) -> Result<String, anyhow::Error> {
        self.sign(identity, self.access_ttl)
    }

    pub fn sign_refresh(&self, identity: &Identity) -> Result<String, anyhow::Error> {
        self.sign(identity, self.refresh_ttl)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(TokenError::from)
    }
}
