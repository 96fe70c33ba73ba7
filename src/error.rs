use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::auth::service::AuthError;

/// Errors surfaced to HTTP clients. Every variant maps to a stable machine
/// code in the `{"status":"error","error":{code,message}}` envelope.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Validation(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("{0}")]
    InvalidToken(String),

    #[error("Authentication is required")]
    AuthenticationRequired,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "INVALID_REQUEST",
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::InvalidCredentials => "INVALID_CREDENTIALS",
            ApiError::InvalidToken(_) => "INVALID_TOKEN",
            ApiError::AuthenticationRequired => "AUTHENTICATION_REQUIRED",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidCredentials
            | ApiError::InvalidToken(_)
            | ApiError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // 5xx bodies stay generic; the cause is logged here instead.
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        let body = json!({
            "status": "error",
            "error": { "code": self.code(), "message": message },
        });
        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::EmailTaken => {
                ApiError::Validation("A user with this email already exists".into())
            }
            AuthError::InvalidCredentials => ApiError::InvalidCredentials,
            AuthError::InvalidToken => {
                ApiError::InvalidToken("Invalid or expired token".into())
            }
            AuthError::Store(e) => ApiError::Internal(e.into()),
            AuthError::Hashing(e) => ApiError::Internal(e),
            AuthError::TokenSign(e) => ApiError::Internal(e),
        }
    }
}
