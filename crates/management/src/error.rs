//! HTTP mapping for domain errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mailwise_core::MailwiseError;
use tracing::error;

use crate::models::ErrorResponse;

/// A [`MailwiseError`] rendered as a JSON error body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            message: message.into(),
        }
    }
}

impl From<MailwiseError> for ApiError {
    fn from(err: MailwiseError) -> Self {
        match &err {
            MailwiseError::Validation(msg) => {
                Self::new(StatusCode::BAD_REQUEST, "validation_failed", msg.clone())
            }
            MailwiseError::NotFound { .. } => {
                Self::new(StatusCode::NOT_FOUND, "not_found", err.to_string())
            }
            MailwiseError::Conflict(msg) => Self::new(StatusCode::CONFLICT, "conflict", msg.clone()),
            _ => {
                error!(error = %err, "Request failed");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal processing error",
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.error,
                message: self.message,
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
