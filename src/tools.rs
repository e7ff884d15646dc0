// src/tools.rs
//! Built-in tools exposed by the gateway.
//!
//! - `add` - sum of two integers
//! - `multiply` - product of two numbers
//! - `server_status` - liveness, version and uptime of this process
//! - `lookup_context` - context record for a free-text query
//!
//! Every handler takes the raw `params` object and validates its own
//! arguments; shape problems surface as `ToolError::InvalidParams`.

use std::time::Instant;

use chrono::SecondsFormat;
use serde_json::{json, Map, Value};

use crate::mcp::registry::{RegistryError, ToolError, ToolRegistry};
use crate::mcp::types::ToolDefinition;

/// Register every built-in tool, in the order discovery lists them.
pub fn register_builtin_tools(registry: &mut ToolRegistry, started: Instant) -> Result<(), RegistryError> {
    registry.register(
        ToolDefinition::new(
            "add",
            "Add two integers",
            json!({
                "type": "object",
                "properties": {
                    "a": { "type": "integer" },
                    "b": { "type": "integer" }
                },
                "required": ["a", "b"]
            }),
        ),
        tool_add,
    )?;

    registry.register(
        ToolDefinition::new(
            "multiply",
            "Multiply two numbers",
            json!({
                "type": "object",
                "properties": {
                    "a": { "type": "number" },
                    "b": { "type": "number" }
                },
                "required": ["a", "b"]
            }),
        ),
        tool_multiply,
    )?;

    registry.register(
        ToolDefinition::new(
            "server_status",
            "Get the current server status",
            json!({ "type": "object", "properties": {} }),
        ),
        move |_params: Map<String, Value>| async move { Ok::<_, ToolError>(server_status(started)) },
    )?;

    registry.register(
        ToolDefinition::new(
            "lookup_context",
            "Fetch context information related to a query",
            json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Free-text question" }
                },
                "required": ["query"]
            }),
        ),
        tool_lookup_context,
    )?;

    tracing::info!(tools = registry.len(), "built-in tools registered");
    Ok(())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn tool_add(params: Map<String, Value>) -> Result<Value, ToolError> {
    let a = int_arg(&params, "a")?;
    let b = int_arg(&params, "b")?;
    tracing::debug!(a, b, "add() tool called");
    a.checked_add(b)
        .map(Value::from)
        .ok_or_else(|| ToolError::Execution(format!("integer overflow adding {a} and {b}")))
}

async fn tool_multiply(params: Map<String, Value>) -> Result<Value, ToolError> {
    let a = number_arg(&params, "a")?;
    let b = number_arg(&params, "b")?;
    tracing::debug!(a, b, "multiply() tool called");
    let product = a * b;
    if !product.is_finite() {
        return Err(ToolError::Execution(format!("{a} * {b} is not a finite number")));
    }
    Ok(json!(product))
}

fn server_status(started: Instant) -> Value {
    json!({
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime": started.elapsed().as_secs(),
    })
}

async fn tool_lookup_context(params: Map<String, Value>) -> Result<Value, ToolError> {
    let query = str_arg(&params, "query")?;
    tracing::info!(query = %query, "lookup_context: processing query");

    // Placeholder answer until a knowledge source is wired in.
    Ok(json!({
        "queryReceived": query,
        "context": format!("Context information related to \"{query}\"."),
        "details": format!("Further details about \"{query}\"."),
        "timestamp": chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

fn int_arg(params: &Map<String, Value>, name: &str) -> Result<i64, ToolError> {
    params
        .get(name)
        .ok_or_else(|| ToolError::missing(name))?
        .as_i64()
        .ok_or_else(|| ToolError::InvalidParams(format!("argument '{name}' must be an integer")))
}

fn number_arg(params: &Map<String, Value>, name: &str) -> Result<f64, ToolError> {
    params
        .get(name)
        .ok_or_else(|| ToolError::missing(name))?
        .as_f64()
        .ok_or_else(|| ToolError::InvalidParams(format!("argument '{name}' must be a number")))
}

fn str_arg<'a>(params: &'a Map<String, Value>, name: &str) -> Result<&'a str, ToolError> {
    match params.get(name) {
        None => Err(ToolError::missing(name)),
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s),
        Some(_) => Err(ToolError::InvalidParams(format!(
            "argument '{name}' must be a non-empty string"
        ))),
    }
}
