// ---------------------------------------------------------------------------
// handlers/system.rs - Health and readiness
// ---------------------------------------------------------------------------

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub app: String,
    pub uptime_seconds: u64,
    pub tools: usize,
}

/// GET /api/health - unauthenticated.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        app: "mcp-gateway".to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        tools: state.tool_count(),
    })
}

/// GET /api/health/ready - ready once at least one tool is registered.
pub async fn readiness(State(state): State<AppState>) -> axum::response::Response {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use serde_json::json;

    let tools = state.tool_count();
    if tools > 0 {
        (StatusCode::OK, Json(json!({ "ready": true, "tools": tools }))).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "ready": false, "tools": 0 })),
        )
            .into_response()
    }
}
