// Jaskier Shared Pattern -- mcp/server
//! Protocol dispatcher - validates an incoming JSON-RPC envelope, routes it to
//! the tool registry and builds the response.
//!
//! Supported methods:
//! - `mcp.discovery.list_tools` - list registered tools in registration order
//! - `mcp.tools.call_tool` - execute a tool by `tool_id`
//! - `<tool id>` - direct invocation, `params` are the tool arguments
//!
//! The dispatcher holds no per-call state: the registry is read-only and each
//! call builds its own response.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use futures_util::FutureExt;
use serde_json::{json, Map, Value};

use super::error::{rpc_error, ErrorKind};
use super::registry::{ToolError, ToolHandler, ToolRegistry};
use super::types::{
    ListToolsResult, RpcId, RpcResponse, JSONRPC_VERSION, METHOD_CALL_TOOL, METHOD_LIST_TOOLS,
};

pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-request context supplied by the HTTP layer. Only used for logging.
#[derive(Debug, Clone, Default)]
pub struct RequestMetadata {
    pub request_id: String,
    /// API key holder or signing key id that authenticated the call.
    pub principal: Option<String>,
}

/// A failed step of the dispatch pipeline.
#[derive(Debug)]
struct Rejection {
    kind: ErrorKind,
    id: RpcId,
    message: String,
    data: Option<Value>,
}

impl Rejection {
    fn new(kind: ErrorKind, id: RpcId, message: impl Into<String>) -> Self {
        Self {
            kind,
            id,
            message: message.into(),
            data: None,
        }
    }

    fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    fn into_response(self) -> (StatusCode, RpcResponse) {
        let status = self.kind.http_status();
        let error = rpc_error(self.kind, self.message, self.data);
        (status, RpcResponse::failure(self.id, error))
    }
}

enum Route {
    ListTools,
    CallTool,
    Direct(Arc<dyn ToolHandler>, String),
}

/// A decoded, version-checked envelope.
struct Envelope {
    id: RpcId,
    method: String,
    params: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    tool_timeout: Duration,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn list_tools_result(&self) -> ListToolsResult {
        ListToolsResult {
            tools: self.registry.list().to_vec(),
        }
    }

    /// Parse, validate and execute one call. Always yields exactly one response.
    pub async fn dispatch(&self, raw_body: &[u8], meta: &RequestMetadata) -> (StatusCode, RpcResponse) {
        match self.try_dispatch(raw_body, meta).await {
            Ok((id, result)) => (StatusCode::OK, RpcResponse::success(id, result)),
            Err(rejection) => {
                tracing::warn!(
                    request_id = %meta.request_id,
                    code = rejection.kind.code(),
                    id = %rejection.id,
                    "MCP dispatch rejected: {}",
                    rejection.message
                );
                rejection.into_response()
            }
        }
    }

    /// Id of a well-formed discovery request, used by the HTTP layer to decide
    /// whether to answer with an event stream.
    pub fn peek_discovery(raw_body: &[u8]) -> Option<RpcId> {
        let env = decode_envelope(raw_body).ok()?;
        (env.method == METHOD_LIST_TOOLS).then_some(env.id)
    }

    async fn try_dispatch(&self, raw_body: &[u8], meta: &RequestMetadata) -> Result<(RpcId, Value), Rejection> {
        let Envelope { id, method, params } = decode_envelope(raw_body)?;

        tracing::debug!(
            request_id = %meta.request_id,
            method = %method,
            id = %id,
            principal = meta.principal.as_deref().unwrap_or("-"),
            "MCP server: incoming request"
        );

        let route = self.resolve(&method, &id)?;
        let params = params_object(params, &id)?;

        match route {
            Route::ListTools => {
                let result = serde_json::to_value(self.list_tools_result()).map_err(|e| {
                    Rejection::new(ErrorKind::InternalError, id.clone(), "Internal error")
                        .with_data(Value::String(e.to_string()))
                })?;
                Ok((id, result))
            }
            Route::CallTool => {
                let (tool_id, args) = call_tool_params(params, &id)?;
                let handler = self.registry.lookup(&tool_id).ok_or_else(|| {
                    Rejection::new(
                        ErrorKind::MethodNotFound,
                        id.clone(),
                        format!("Method not found: {tool_id}"),
                    )
                })?;
                let content = self.run_tool(&tool_id, handler, args, &id).await?;
                Ok((id, json!({ "content": content })))
            }
            Route::Direct(handler, tool_id) => {
                let result = self.run_tool(&tool_id, handler, params, &id).await?;
                Ok((id, result))
            }
        }
    }

    fn resolve(&self, method: &str, id: &RpcId) -> Result<Route, Rejection> {
        match method {
            METHOD_LIST_TOOLS => Ok(Route::ListTools),
            METHOD_CALL_TOOL => Ok(Route::CallTool),
            other => self
                .registry
                .lookup(other)
                .map(|h| Route::Direct(h, other.to_string()))
                .ok_or_else(|| {
                    Rejection::new(
                        ErrorKind::MethodNotFound,
                        id.clone(),
                        format!("Method not found: {other}"),
                    )
                }),
        }
    }

    async fn run_tool(
        &self,
        tool_id: &str,
        handler: Arc<dyn ToolHandler>,
        params: Map<String, Value>,
        id: &RpcId,
    ) -> Result<Value, Rejection> {
        tracing::info!(tool = %tool_id, "MCP server: tools/call");

        // The handler is invoked inside the future so a panic while building
        // it is caught as well.
        let call = AssertUnwindSafe(async move { handler.call(params).await }).catch_unwind();

        let failed = |detail: String| {
            Rejection::new(
                ErrorKind::ToolExecutionError,
                id.clone(),
                format!("Tool execution failed: {tool_id}"),
            )
            .with_data(Value::String(detail))
        };

        match tokio::time::timeout(self.tool_timeout, call).await {
            Err(_) => Err(failed(format!(
                "timed out after {}s",
                self.tool_timeout.as_secs_f64()
            ))),
            Ok(Err(panic)) => Err(failed(panic_message(panic.as_ref()))),
            Ok(Ok(Err(ToolError::InvalidParams(msg)))) => Err(Rejection::new(
                ErrorKind::InvalidParams,
                id.clone(),
                format!("Invalid params: {msg}"),
            )),
            Ok(Ok(Err(ToolError::Execution(msg)))) => Err(failed(msg)),
            Ok(Ok(Ok(value))) => Ok(value),
        }
    }
}

fn decode_envelope(raw_body: &[u8]) -> Result<Envelope, Rejection> {
    let value: Value = serde_json::from_slice(raw_body).map_err(|e| {
        Rejection::new(ErrorKind::ParseError, RpcId::Null, format!("Parse error: {e}"))
    })?;

    let Value::Object(mut obj) = value else {
        return Err(Rejection::new(
            ErrorKind::InvalidRequest,
            RpcId::Null,
            "Invalid Request: envelope must be a JSON object",
        ));
    };

    let id = match obj.get("id") {
        None => RpcId::Null,
        Some(raw) => RpcId::from_value(raw).ok_or_else(|| {
            Rejection::new(
                ErrorKind::InvalidRequest,
                RpcId::Null,
                "Invalid Request: 'id' must be a string, an integer or null",
            )
        })?,
    };

    if obj.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
        return Err(Rejection::new(
            ErrorKind::InvalidRequest,
            id,
            format!("Invalid Request: 'jsonrpc' must be \"{JSONRPC_VERSION}\""),
        ));
    }

    let method = match obj.get("method").and_then(Value::as_str) {
        Some(m) if !m.is_empty() => m.to_string(),
        _ => {
            return Err(Rejection::new(
                ErrorKind::InvalidRequest,
                id,
                "Invalid Request: missing 'method'",
            ));
        }
    };

    Ok(Envelope {
        id,
        method,
        params: obj.remove("params"),
    })
}

fn params_object(params: Option<Value>, id: &RpcId) -> Result<Map<String, Value>, Rejection> {
    match params {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err(Rejection::new(
            ErrorKind::InvalidParams,
            id.clone(),
            "Invalid params: 'params' must be an object",
        )),
    }
}

fn call_tool_params(mut params: Map<String, Value>, id: &RpcId) -> Result<(String, Map<String, Value>), Rejection> {
    let invalid = |msg: &str| Rejection::new(ErrorKind::InvalidParams, id.clone(), format!("Invalid params: {msg}"));

    let tool_id = match params.remove("tool_id") {
        Some(Value::String(s)) if !s.is_empty() => s,
        _ => return Err(invalid("missing 'tool_id'")),
    };
    let args = match params.remove("params") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(invalid("'params' of call_tool must be an object")),
    };
    Ok((tool_id, args))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
