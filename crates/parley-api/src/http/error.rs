//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use parley_types::error::ChatError;

use crate::http::response::ApiResponse;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Errors from generation and conversation management.
    Chat(ChatError),
    /// A credential was presented but not recognized.
    Unauthorized(String),
    Internal(String),
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        AppError::Chat(e)
    }
}

/// HTTP status for a caller-facing error.
pub fn status_for(err: &ChatError) -> StatusCode {
    match err {
        ChatError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
        ChatError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        ChatError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        ChatError::FailedPrecondition(_) => StatusCode::PRECONDITION_FAILED,
        ChatError::ResourceExhausted(_) => StatusCode::TOO_MANY_REQUESTS,
        ChatError::NotFound(_) => StatusCode::NOT_FOUND,
        ChatError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, &str) {
        match self {
            AppError::Chat(e) => (status_for(e), e.code(), e.message()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::error!(code, "{message}");
        }

        let body = ApiResponse::error(code, message, uuid::Uuid::now_v7().to_string());
        let body = serde_json::to_string(&body).unwrap_or_else(|_| {
            r#"{"errors":[{"code":"SERIALIZATION_ERROR","message":"Failed to serialize response"}]}"#.to_string()
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response()
    }
}
