// Jaskier Shared Pattern -- auth
// Credential check in front of the MCP endpoint.
// Direct callers send `X-Api-Key`; machine-to-machine callers sign the request
// (see `mcp::signing`). Missing credentials are 401, wrong ones 403, and both
// are rejected before the body reaches the dispatcher. With neither an API key
// nor a signing key configured, auth is disabled (dev mode).

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use crate::handlers::{request_id, ApiError};
use crate::mcp::signing::{RequestSignature, SigningError};
use crate::mcp::transport::HEADER_API_KEY;
use crate::state::AppState;

/// Who passed the check. Inserted into request extensions for the handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// Auth disabled.
    Anonymous,
    ApiKey,
    Signed { key_id: String },
}

impl Principal {
    pub fn label(&self) -> Option<String> {
        match self {
            Principal::Anonymous => None,
            Principal::ApiKey => Some("api-key".to_string()),
            Principal::Signed { key_id } => Some(format!("signed:{key_id}")),
        }
    }
}

/// Middleware for the protected `/mcp` routes. Public routes (health) must not
/// use it.
pub async fn require_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let cfg = state.config.clone();

    if cfg.auth_disabled() {
        request.extensions_mut().insert(Principal::Anonymous);
        return next.run(request).await;
    }

    let req_id = request_id(request.headers());

    // ── API key ─────────────────────────────────────────────────────────
    if let Some(provided) = request.headers().get(HEADER_API_KEY) {
        let matches = cfg
            .api_key
            .as_deref()
            .is_some_and(|expected| bool::from(provided.as_bytes().ct_eq(expected.as_bytes())));
        if !matches {
            return ApiError::Forbidden("X-Api-Key does not match".into())
                .with_request_id(req_id)
                .into_response();
        }
        request.extensions_mut().insert(Principal::ApiKey);
        return next.run(request).await;
    }

    // ── Request signature ───────────────────────────────────────────────
    let signature = match RequestSignature::from_headers(request.headers()) {
        Ok(Some(sig)) => sig,
        Ok(None) => {
            return ApiError::Unauthorized("no X-Api-Key or signature headers".into())
                .with_request_id(req_id)
                .into_response();
        }
        Err(e @ SigningError::MissingHeader(_)) => {
            return ApiError::Unauthorized(e.to_string())
                .with_request_id(req_id)
                .into_response();
        }
        Err(e) => {
            return ApiError::Forbidden(e.to_string())
                .with_request_id(req_id)
                .into_response();
        }
    };

    let Some(credentials) = cfg.signing.as_ref() else {
        return ApiError::Forbidden("request signing is not enabled".into())
            .with_request_id(req_id)
            .into_response();
    };

    // The signature covers the body, so it is buffered here and handed on.
    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, cfg.max_body_bytes).await {
        Ok(b) => b,
        Err(e) => {
            return ApiError::PayloadTooLarge(format!("request body rejected: {e}"))
                .with_request_id(req_id)
                .details(serde_json::json!({ "max_body_bytes": cfg.max_body_bytes }))
                .into_response();
        }
    };

    if let Err(e) = credentials.verify(
        parts.method.as_str(),
        parts.uri.path(),
        &bytes,
        &signature,
        chrono::Utc::now().timestamp(),
        cfg.signature_window,
    ) {
        return ApiError::Forbidden(e.to_string())
            .with_request_id(req_id)
            .into_response();
    }

    let mut request = Request::from_parts(parts, Body::from(bytes));
    request.extensions_mut().insert(Principal::Signed {
        key_id: signature.key_id,
    });
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_labels() {
        assert_eq!(Principal::Anonymous.label(), None);
        assert_eq!(Principal::ApiKey.label().as_deref(), Some("api-key"));
        assert_eq!(
            Principal::Signed { key_id: "svc".into() }.label().as_deref(),
            Some("signed:svc")
        );
    }
}
