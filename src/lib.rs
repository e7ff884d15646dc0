pub mod auth;
pub mod config;
pub mod handlers;
pub mod mcp;
pub mod state;
pub mod tools;

use axum::middleware;
use axum::routing::get;
use axum::Router;

use crate::state::AppState;

/// Build the application router.
///
/// `/mcp` sits behind [`auth::require_auth`]; the health endpoints are public.
/// Outer layers (CORS, rate limiting, body limit, tracing) are added by the
/// binary so tests can drive the bare router.
pub fn create_router(state: AppState) -> Router {
    let mcp_routes = Router::new()
        .route("/mcp", get(mcp::http::mcp_get).post(mcp::http::mcp_post))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_auth));

    Router::new()
        // Health
        .route("/api/health", get(handlers::health))
        .route("/api/health/ready", get(handlers::readiness))
        // MCP endpoint
        .merge(mcp_routes)
        // Shared state
        .with_state(state)
}
