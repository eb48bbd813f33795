use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
    response::{IntoResponse, Response},
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use service_core::error::AppError;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid email regex")
});

// Every component is optional, so "", "+", "." and "e5" all match.
static AMOUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[-+]?[0-9]*(?:\.[0-9]*)?(?:[eE][-+]?[0-9]+)?$").expect("valid amount regex")
});

/// Syntactic email check. No DNS or mailbox verification.
pub fn is_valid_email(s: &str) -> bool {
    EMAIL_RE.is_match(s)
}

/// Loose numeric-shape check used before an amount is parsed.
pub fn is_valid_amount_string(s: &str) -> bool {
    AMOUNT_RE.is_match(s)
}

/// JSON body extractor tolerant of absent bodies.
///
/// An empty body deserializes as `{}` so that handlers can report which
/// field is missing with their own message instead of a generic rejection.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned + 'static,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;

        let raw: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
            b"{}"
        } else {
            &bytes
        };

        serde_json::from_slice(raw).map(JsonBody).map_err(|e| {
            tracing::debug!(error = %e, "Rejected request body");
            AppError::BadRequest(anyhow::anyhow!("Body error")).into_response()
        })
    }
}
