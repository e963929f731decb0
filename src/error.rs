//! Common error types for the pool balancer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No backend pool configured for API group: {0}")]
    UnknownGroup(String),

    #[error("No backend available for API group: {0}")]
    NoHealthyBackend(String),

    #[error("Unsupported server preference: {0}")]
    InvalidPreference(String),

    #[error("Method {0} is not allowed for GraphQL; only POST is accepted")]
    MethodNotAllowed(String),

    #[error("Forwarding to backend {address} failed: {source}")]
    ForwardFailure {
        address: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Dispatch queue is at capacity")]
    QueueFull,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response envelope
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub message: String,
    pub r#type: String,
    pub code: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code) = match &self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None),
            AppError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None),
            AppError::Json(_) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                Some("invalid_json"),
            ),
            AppError::UnknownGroup(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "routing_error",
                Some("unknown_group"),
            ),
            AppError::NoHealthyBackend(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "routing_error",
                Some("no_healthy_backend"),
            ),
            AppError::InvalidPreference(_) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                Some("invalid_preference"),
            ),
            AppError::MethodNotAllowed(_) => (
                StatusCode::METHOD_NOT_ALLOWED,
                "invalid_request_error",
                Some("method_not_allowed"),
            ),
            AppError::ForwardFailure { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "forward_error",
                Some("transport_failure"),
            ),
            AppError::QueueFull => (
                StatusCode::SERVICE_UNAVAILABLE,
                "routing_error",
                Some("queue_full"),
            ),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None),
        };

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                message: self.to_string(),
                r#type: error_type.to_string(),
                code: code.map(|c| c.to_string()),
            },
        });

        (status, body).into_response()
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_preference_message_names_token() {
        let err = AppError::InvalidPreference("server4".to_string());
        assert_eq!(err.to_string(), "Unsupported server preference: server4");
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::UnknownGroup("GRPC".into()), StatusCode::SERVICE_UNAVAILABLE),
            (AppError::NoHealthyBackend("REST".into()), StatusCode::SERVICE_UNAVAILABLE),
            (AppError::InvalidPreference("server9".into()), StatusCode::BAD_REQUEST),
            (AppError::MethodNotAllowed("GET".into()), StatusCode::METHOD_NOT_ALLOWED),
            (AppError::QueueFull, StatusCode::SERVICE_UNAVAILABLE),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
