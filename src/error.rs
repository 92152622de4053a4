use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::repository::RepositoryError;

/// ApiError
///
/// Every failure a request can end with. All variants are recovered at the request
/// boundary and rendered as a status code plus `{"message": ...}`; none of them crash
/// the process.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Login or Basic credentials did not match the store.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Missing, malformed, expired, or badly signed session token.
    #[error("invalid token: {0}")]
    TokenInvalid(String),

    /// Authenticated, but neither the owner nor an admin.
    #[error("access denied")]
    AccessDenied,

    #[error("{0} not found")]
    ResourceNotFound(String),

    #[error("user with email {0} already exists")]
    DuplicateAccount(String),

    /// Current password mismatch during a password change.
    #[error("wrong current password")]
    WrongCurrentPassword,

    #[error("{0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidCredentials | ApiError::TokenInvalid(_) => StatusCode::UNAUTHORIZED,
            ApiError::AccessDenied => StatusCode::FORBIDDEN,
            ApiError::ResourceNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::DuplicateAccount(_) => StatusCode::CONFLICT,
            ApiError::WrongCurrentPassword | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Repository(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
            ApiError::Storage(_) | ApiError::Repository(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Token and credential failures share one body so callers cannot tell which
        // part of the credential was wrong.
        let message = match &self {
            ApiError::InvalidCredentials | ApiError::TokenInvalid(_) => {
                tracing::debug!("authentication rejected: {}", self);
                "Unauthorized".to_string()
            }
            _ if status == StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!("request failed: {:?}", self);
                "Internal server error".to_string()
            }
            other => {
                tracing::debug!("request rejected ({}): {}", status, other);
                other.to_string()
            }
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}
