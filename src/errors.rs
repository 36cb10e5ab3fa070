use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("missing or invalid credential")]
    Unauthorized,

    #[error("{0} is not an authorized approver")]
    Forbidden(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid action: {0}")]
    InvalidAction(String),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("storage degraded: {0}")]
    StorageDegraded(#[from] StoreError),
}

impl AppError {
    /// Stable machine-readable code, shared by the HTTP envelope and the CLI.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::InvalidPayload(_) => "invalid_payload",
            AppError::MissingField(_) => "missing_field",
            AppError::InvalidAction(_) => "invalid_action",
            AppError::NotFound(_) => "not_found",
            AppError::StorageDegraded(_) => "storage_degraded",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "authentication_error"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "permission_error"),
            AppError::InvalidPayload(_)
            | AppError::MissingField(_)
            | AppError::InvalidAction(_) => (StatusCode::BAD_REQUEST, "invalid_request_error"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found_error"),
            AppError::StorageDegraded(e) => {
                tracing::error!("storage error: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "storage_error")
            }
        };

        let body = Json(json!({
            "error": {
                "message": self.to_string(),
                "type": error_type,
                "code": self.code(),
            }
        }));

        (status, body).into_response()
    }
}
