// Jaskier Shared Pattern -- backend integration test
// MCP gateway - Health endpoint integration test

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use mcp_gateway::config::GatewayConfig;
use mcp_gateway::mcp::registry::ToolRegistry;
use mcp_gateway::state::AppState;

fn test_app() -> axum::Router {
    let config = GatewayConfig {
        api_key: Some("secret-key".into()),
        ..GatewayConfig::default()
    };
    let state = AppState::with_builtin_tools(config).unwrap();
    mcp_gateway::create_router(state)
}

/// Collect a response body into a `serde_json::Value`.
async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_endpoint_needs_no_credentials() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["app"], "mcp-gateway");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(json["tools"], 4);
    assert!(json["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn readiness_reflects_registered_tools() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/api/health/ready")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["ready"], true);

    let empty = mcp_gateway::create_router(AppState::new(GatewayConfig::default(), ToolRegistry::new()));
    let response = empty
        .oneshot(
            Request::builder()
                .uri("/api/health/ready")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/nonexistent")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
