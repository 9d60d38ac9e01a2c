use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::error;

use jtrace_crypto::SignatureError;

use crate::envelope::{Envelope, fail};

pub type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or out-of-range input.
    #[error("{message}")]
    Validation { message: String, details: Value },
    /// The resource does not exist or belongs to someone else.
    #[error("{0}")]
    NotFound(String),
    /// A business rule refused the request.
    #[error("{0}")]
    Rejected(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error(transparent)]
    Signature(#[from] SignatureError),
    /// Raw file route only: the file behind a valid link is missing.
    #[error("{0}")]
    FileNotFound(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: Value::Null,
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation {
            message: "Invalid parameters".into(),
            details: serde_json::to_value(&errors).unwrap_or(Value::Null),
        }
    }
}

fn detail(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Validation { message, details } => fail(message, details).into_response(),
            Self::NotFound(message) | Self::Rejected(message) => {
                fail(message, Value::Null).into_response()
            }
            Self::Unauthorized(message) => detail(StatusCode::UNAUTHORIZED, message),
            Self::Forbidden(message) => detail(StatusCode::FORBIDDEN, message),
            Self::Signature(e) => detail(StatusCode::FORBIDDEN, e.to_string()),
            Self::FileNotFound(message) => detail(StatusCode::NOT_FOUND, message),
            Self::Internal(e) => {
                error!("Internal error: {:#}", e);
                fail("Internal server error", Value::Null).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(ApiError::invalid("x").into_response().status(), StatusCode::OK);
        assert_eq!(
            ApiError::NotFound("x".into()).into_response().status(),
            StatusCode::OK
        );
        assert_eq!(
            ApiError::Unauthorized("x".into()).into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Signature(SignatureError::Expired).into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::FileNotFound("x".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Internal(anyhow::anyhow!("boom")).into_response().status(),
            StatusCode::OK
        );
    }
}
