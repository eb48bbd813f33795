use service_core::error::AppError;
use thiserror::Error;

/// Failures of the expense-service operations. The message of each variant
/// is the text shown to the client.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    Database(#[from] mongodb::error::Error),

    #[error("{0}")]
    Internal(#[from] anyhow::Error),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidCredentials(String),

    #[error("{0}")]
    Expired(String),
}

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ServiceError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ServiceError::NotFound(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        ServiceError::Unauthorized(msg.into())
    }
}

/// Wire statuses follow the clients' expectations: lookups that miss and
/// bad credentials are 400, an already-open session is 401.
impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::Validation(msg)
            | ServiceError::NotFound(msg)
            | ServiceError::InvalidCredentials(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            ServiceError::Unauthorized(msg)
            | ServiceError::Conflict(msg)
            | ServiceError::Expired(msg) => AppError::Unauthorized(anyhow::anyhow!(msg)),
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ServiceError::Validation(AppError::from(errors).message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_wire_statuses() {
        let cases = [
            (ServiceError::validation("x"), StatusCode::BAD_REQUEST),
            (ServiceError::not_found("x"), StatusCode::BAD_REQUEST),
            (ServiceError::InvalidCredentials("x".into()), StatusCode::BAD_REQUEST),
            (ServiceError::unauthorized("x"), StatusCode::UNAUTHORIZED),
            (ServiceError::Conflict("x".into()), StatusCode::UNAUTHORIZED),
            (ServiceError::Expired("x".into()), StatusCode::UNAUTHORIZED),
            (
                ServiceError::Internal(anyhow::anyhow!("x")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status(), status);
        }
    }

    #[test]
    fn test_message_is_passed_through() {
        let app: AppError = ServiceError::not_found("user not found, please register").into();
        assert_eq!(app.message(), "user not found, please register");
    }
}
