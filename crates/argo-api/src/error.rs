//! API error types and JSON error response formatting.
//!
//! ApiError provides a consistent JSON error response format across all
//! endpoints, mapping internal errors to appropriate HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use argo_chat::ChatError;
use argo_core::error::ArgoError;

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid parameters.
    BadRequest(String),
    /// 401 Unauthorized - missing credentials or resource owned by someone else.
    Unauthorized(String),
    /// 404 Not Found - resource does not exist.
    NotFound(String),
    /// 500 Internal Server Error - unexpected server error.
    Internal(String),
    /// 502 Bad Gateway - an upstream service failed.
    BadGateway(String),
    /// 503 Service Unavailable - component not configured.
    ServiceUnavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Internal(msg) => {
                tracing::error!("internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "bad_gateway", msg),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ArgoError> for ApiError {
    fn from(err: ArgoError) -> Self {
        match err {
            ArgoError::Unauthorized(msg) => ApiError::Unauthorized(msg),
            ArgoError::NotFound(msg) => ApiError::NotFound(msg),
            ArgoError::InvalidInput(msg) => ApiError::BadRequest(msg),
            ArgoError::ConfigurationMissing(_) | ArgoError::Config(_) => {
                ApiError::ServiceUnavailable(err.to_string())
            }
            ArgoError::Upstream(msg) => ApiError::BadGateway(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::EmptyMessage | ChatError::MessageTooLong(_) => {
                ApiError::BadRequest(err.to_string())
            }
            ChatError::InvalidInput(msg) => ApiError::BadRequest(msg),
            ChatError::Unauthorized(msg) => ApiError::Unauthorized(msg),
            ChatError::Configuration(msg) => ApiError::ServiceUnavailable(msg),
            ChatError::Model(msg) => ApiError::BadGateway(msg),
            ChatError::Storage(msg) => ApiError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (ApiError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (ApiError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (ApiError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ApiError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (ApiError::BadGateway("x".into()), StatusCode::BAD_GATEWAY),
            (
                ApiError::ServiceUnavailable("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_from_argo_error() {
        assert!(matches!(
            ApiError::from(ArgoError::Unauthorized("no".into())),
            ApiError::Unauthorized(_)
        ));
        assert!(matches!(
            ApiError::from(ArgoError::ConfigurationMissing("bucket".into())),
            ApiError::ServiceUnavailable(_)
        ));
        assert!(matches!(
            ApiError::from(ArgoError::InvalidInput("a/b".into())),
            ApiError::BadRequest(_)
        ));
        assert!(matches!(
            ApiError::from(ArgoError::Upstream("plaid".into())),
            ApiError::BadGateway(_)
        ));
        assert!(matches!(
            ApiError::from(ArgoError::Storage("disk".into())),
            ApiError::Internal(_)
        ));
    }

    #[test]
    fn test_from_chat_error() {
        assert!(matches!(
            ApiError::from(ChatError::EmptyMessage),
            ApiError::BadRequest(_)
        ));
        assert!(matches!(
            ApiError::from(ChatError::Unauthorized("x".into())),
            ApiError::Unauthorized(_)
        ));
        assert!(matches!(
            ApiError::from(ChatError::InvalidInput("x".into())),
            ApiError::BadRequest(_)
        ));
    }
}
