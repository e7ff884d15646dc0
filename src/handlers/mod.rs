// ---------------------------------------------------------------------------
// handlers/ - non-MCP HTTP handlers and the shared error body
// ---------------------------------------------------------------------------

pub(crate) mod system;

pub use system::{health, readiness};

use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

pub const HEADER_REQUEST_ID: &str = "x-request-id";

// ---------------------------------------------------------------------------
// Jaskier Shared Pattern -- error
// ---------------------------------------------------------------------------

/// Error returned outside the JSON-RPC envelope (auth, body limits).
/// Logs full details server-side, returns sanitized JSON to the client.
///
/// Response format:
/// ```json
/// {
///   "error": {
///     "code": "UNAUTHORIZED",
///     "message": "Human-readable description",
///     "request_id": "uuid",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not authenticated: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),
}

impl ApiError {
    fn error_code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    /// Auth failures never say which check failed.
    fn sanitized_message(&self) -> String {
        match self {
            ApiError::PayloadTooLarge(m) => m.clone(),
            ApiError::Unauthorized(_) => "Missing credentials".to_string(),
            ApiError::Forbidden(_) => "Invalid credentials".to_string(),
        }
    }

    /// Attach a correlation id to the response body.
    pub fn with_request_id(self, request_id: impl Into<String>) -> ApiErrorWithContext {
        ApiErrorWithContext {
            error: self,
            request_id: request_id.into(),
            details: None,
        }
    }
}

/// ApiError with correlation id and optional structured details.
pub struct ApiErrorWithContext {
    pub error: ApiError,
    pub request_id: String,
    pub details: Option<Value>,
}

impl ApiErrorWithContext {
    pub fn details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl axum::response::IntoResponse for ApiErrorWithContext {
    fn into_response(self) -> axum::response::Response {
        let status = self.error.status_code();

        tracing::warn!(
            request_id = %self.request_id,
            code = self.error.error_code(),
            "API error ({}): {}",
            status.as_u16(),
            self.error
        );

        let body = json!({
            "error": {
                "code": self.error.error_code(),
                "message": self.error.sanitized_message(),
                "request_id": self.request_id,
                "details": self.details,
            }
        });
        (status, Json(body)).into_response()
    }
}

/// Correlation id from `X-Request-Id`, or a fresh uuid.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(HEADER_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use axum::response::IntoResponse;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn error_body_is_structured_and_sanitized() {
        let resp = ApiError::Forbidden("api key mismatch for key #3".into())
            .with_request_id("req-9")
            .into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "FORBIDDEN");
        assert_eq!(body["error"]["message"], "Invalid credentials");
        assert_eq!(body["error"]["request_id"], "req-9");
        assert!(body["error"]["details"].is_null());
    }

    #[test]
    fn request_id_prefers_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_id(&headers).len(), 36);
        headers.insert(HEADER_REQUEST_ID, HeaderValue::from_static("abc-123"));
        assert_eq!(request_id(&headers), "abc-123");
    }
}
