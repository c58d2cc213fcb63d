use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use crate::pace::PaceError;

/// Error taxonomy for the HTTP API. Gateway failures never terminate the
/// application; they are mapped to a status here and surfaced to the caller.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Auth(String),
    #[error("account not confirmed")]
    Unconfirmed,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{0}")]
    Conflict(String),
    #[error("store error")]
    Store(#[from] sqlx::Error),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl From<PaceError> for ApiError {
    fn from(e: PaceError) -> Self {
        ApiError::InvalidInput(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::Unconfirmed => StatusCode::FORBIDDEN,
            ApiError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Store(e) => {
                error!(error = %e, "store error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Internal(e) => {
                error!(error = %e, "internal error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        // 5xx bodies stay generic; the detail is already in the log.
        (status, self.to_string()).into_response()
    }
}
