use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::json;
use std::error::Error as StdError;
use std::fmt;

const RATE_LIMIT_RETRY_AFTER_SECS: u64 = 60;

/// Handler-level failures, serialized as the structured error envelope
/// `{"error": {"message", "error_code", "timestamp", "type"}}`.
#[derive(Debug)]
pub enum ApiError {
    /// The generation provider cannot serve requests (503).
    ServiceUnavailable(String),
    /// Malformed inbound request (422). Never retried.
    Validation(String),
    /// Too many requests (429); carries fixed retry-after guidance.
    RateLimited(String),
    /// Anything else (500).
    Internal(String),
}

impl ApiError {
    fn message(&self) -> &str {
        match self {
            ApiError::ServiceUnavailable(m)
            | ApiError::Validation(m)
            | ApiError::RateLimited(m)
            | ApiError::Internal(m) => m,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ApiError::ServiceUnavailable(_) => "AI_SERVICE_ERROR",
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::RateLimited(_) => "RATE_LIMIT_EXCEEDED",
            ApiError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    fn failure_type(&self) -> &'static str {
        match self {
            ApiError::ServiceUnavailable(_) => "service_error",
            ApiError::Validation(_) => "validation_error",
            ApiError::RateLimited(_) => "rate_limit_error",
            ApiError::Internal(_) => "server_error",
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl StdError for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut error = json!({
            "message": self.message(),
            "error_code": self.error_code(),
            "timestamp": Utc::now().to_rfc3339(),
            "type": self.failure_type(),
        });
        if matches!(self, ApiError::RateLimited(_)) {
            error["retry_after"] = json!(RATE_LIMIT_RETRY_AFTER_SECS);
        }
        (self.status(), Json(json!({ "error": error }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::ServiceUnavailable("down".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::Validation("empty".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::RateLimited("slow down".into()).status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_display_includes_code_and_message() {
        let error = ApiError::Validation("message cannot be empty".into());
        assert_eq!(
            error.to_string(),
            "VALIDATION_ERROR: message cannot be empty"
        );
    }

    #[tokio::test]
    async fn test_envelope_shape() {
        let response = ApiError::Validation("prompt cannot be empty".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["error"]["message"], "prompt cannot be empty");
        assert_eq!(value["error"]["error_code"], "VALIDATION_ERROR");
        assert_eq!(value["error"]["type"], "validation_error");
        assert!(value["error"]["timestamp"].is_string());
        assert!(value["error"].get("retry_after").is_none());
    }

    #[tokio::test]
    async fn test_rate_limit_envelope_carries_retry_after() {
        let response = ApiError::RateLimited("too many requests".into()).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["error"]["retry_after"], 60);
        assert_eq!(value["error"]["type"], "rate_limit_error");
    }
}
