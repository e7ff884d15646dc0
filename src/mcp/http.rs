// Jaskier Shared Pattern -- mcp/http
//! axum handlers for the `/mcp` endpoint.
//!
//! `POST /mcp` runs the dispatcher and answers with one JSON-RPC envelope, or
//! with an event stream when the caller asked for `text/event-stream` and the
//! call is a discovery. `GET /mcp` always answers with the discovery stream.

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Extension, State};
use axum::http::header::ACCEPT;
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::Stream;
use serde_json::Value;

use crate::auth::Principal;
use crate::handlers::request_id;
use crate::state::AppState;

use super::error::{rpc_error, ErrorKind};
use super::server::{Dispatcher, RequestMetadata};
use super::transport::EVENT_STREAM;
use super::types::{RpcId, RpcResponse, STREAM_DONE_SENTINEL};

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// POST /mcp
pub async fn mcp_post(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let meta = RequestMetadata {
        request_id: request_id(&headers),
        principal: principal.label(),
    };

    if accepts_event_stream(&headers) {
        if let Some(id) = Dispatcher::peek_discovery(&body) {
            tracing::debug!(request_id = %meta.request_id, id = %id, "MCP server: streaming discovery");
            return discovery_stream(&state.dispatcher, id).into_response();
        }
    }

    let (status, response) = state.dispatcher.dispatch(&body, &meta).await;
    (status, Json(response)).into_response()
}

/// GET /mcp - discovery stream without a request envelope, so the id is null.
pub async fn mcp_get(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    tracing::debug!(principal = principal.label().as_deref().unwrap_or("-"), "MCP server: GET discovery stream");
    discovery_stream(&state.dispatcher, RpcId::Null)
}

/// One `data:` frame holding the full tool list, then the `[DONE]` sentinel.
pub fn discovery_stream(
    dispatcher: &Dispatcher,
    id: RpcId,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>> + use<>> {
    let response = match serde_json::to_value(dispatcher.list_tools_result()) {
        Ok(result) => RpcResponse::success(id, result),
        Err(e) => RpcResponse::failure(
            id,
            rpc_error(ErrorKind::InternalError, "Internal error", Some(Value::String(e.to_string()))),
        ),
    };

    let frames = [
        Event::default().json_data(&response),
        Ok(Event::default().data(STREAM_DONE_SENTINEL)),
    ];

    Sse::new(futures_util::stream::iter(frames))
        .keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL).text("keep-alive"))
}

fn accepts_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.split(',').any(|part| part.trim().starts_with(EVENT_STREAM)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn accept_header_detection() {
        let mut headers = HeaderMap::new();
        assert!(!accepts_event_stream(&headers));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        assert!(!accepts_event_stream(&headers));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/event-stream;q=0.9"));
        assert!(accepts_event_stream(&headers));
    }
}
