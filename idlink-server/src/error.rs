//! API error type
//!
//! Every failure leaves the service as `{ "error": message }`. Store and
//! invariant failures are logged here and answered with a generic message so
//! no store internals reach the caller.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::identity::IdentityError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Request could not be parsed (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Identity(#[from] IdentityError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Identity(IdentityError::InvalidRequest(msg)) => {
                (StatusCode::BAD_REQUEST, msg)
            }
            ApiError::Identity(IdentityError::NotFound(id)) => (
                StatusCode::NOT_FOUND,
                format!("Contact {} not found or already deleted", id),
            ),
            ApiError::Identity(err @ IdentityError::ConfirmationRequired) => {
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            ApiError::Identity(IdentityError::StoreUnavailable(source)) => {
                error!(error = %source, "Contact store failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database unavailable, please retry".to_string(),
                )
            }
            ApiError::Identity(IdentityError::InvariantViolation(detail)) => {
                error!(detail = %detail, "Identity invariant violated - stored clusters are inconsistent");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
