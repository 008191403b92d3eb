// JSON error body + status mapping for the HTTP surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::CoreError;

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub error_code: String,
}

impl ApiError {
    pub fn response(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
        (
            status,
            Json(ApiError {
                error: message.into(),
                error_code: code.to_string(),
            }),
        )
            .into_response()
    }
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            CoreError::Config(_) => (StatusCode::BAD_REQUEST, "config_error"),
            CoreError::CapabilityMismatch { .. } => {
                (StatusCode::BAD_REQUEST, "capability_mismatch")
            }
            CoreError::Data(_) => (StatusCode::NOT_FOUND, "not_found"),
            CoreError::Provider(_) | CoreError::Http(_) => {
                (StatusCode::BAD_GATEWAY, "provider_error")
            }
            CoreError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            CoreError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
            CoreError::Invariant(_) | CoreError::Cancelled => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        ApiError::response(status, code, self.to_string())
    }
}
