// Jaskier Shared Pattern -- mcp/types
//! JSON-RPC envelope and MCP payload types.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::error::RpcError;

pub const JSONRPC_VERSION: &str = "2.0";

/// Reserved discovery method. Takes no params, returns [`ListToolsResult`].
pub const METHOD_LIST_TOOLS: &str = "mcp.discovery.list_tools";

/// Reserved tool-call method. Takes [`CallToolParams`], returns [`CallToolResult`].
pub const METHOD_CALL_TOOL: &str = "mcp.tools.call_tool";

/// SSE payload that terminates a discovery stream.
pub const STREAM_DONE_SENTINEL: &str = "[DONE]";

// ── Request id ──────────────────────────────────────────────────────────────

/// JSON-RPC request id. `Null` is an explicit `"id": null`; an omitted id is
/// modelled as `Option::None` on the request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcId {
    Number(i64),
    String(String),
    #[default]
    Null,
}

impl RpcId {
    pub fn is_null(&self) -> bool {
        matches!(self, RpcId::Null)
    }

    /// Best-effort extraction from an arbitrary JSON value (used when the
    /// envelope is otherwise invalid).
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(RpcId::String(s.clone())),
            Value::Number(n) => n.as_i64().map(RpcId::Number),
            Value::Null => Some(RpcId::Null),
            _ => None,
        }
    }
}

impl From<&str> for RpcId {
    fn from(s: &str) -> Self {
        RpcId::String(s.to_string())
    }
}

impl From<String> for RpcId {
    fn from(s: String) -> Self {
        RpcId::String(s)
    }
}

impl From<i64> for RpcId {
    fn from(n: i64) -> Self {
        RpcId::Number(n)
    }
}

impl fmt::Display for RpcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcId::Number(n) => write!(f, "{n}"),
            RpcId::String(s) => f.write_str(s),
            RpcId::Null => f.write_str("null"),
        }
    }
}

/// Keeps "present but null" distinct from "absent" for optional fields.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

// ── Request ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<RpcId>,
}

impl RpcRequest {
    pub fn new(id: impl Into<RpcId>, method: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id: Some(id.into()),
        }
    }

    /// Fire-and-forget request without an id.
    pub fn notification(method: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id: None,
        }
    }

    pub fn list_tools(id: impl Into<RpcId>) -> Self {
        Self::new(id, METHOD_LIST_TOOLS, Map::new())
    }

    pub fn call_tool(id: impl Into<RpcId>, tool_id: &str, params: Map<String, Value>) -> Self {
        let mut outer = Map::new();
        outer.insert("tool_id".to_string(), Value::String(tool_id.to_string()));
        outer.insert("params".to_string(), Value::Object(params));
        Self::new(id, METHOD_CALL_TOOL, outer)
    }

    /// Id to echo in the response (`Null` for notifications).
    pub fn response_id(&self) -> RpcId {
        self.id.clone().unwrap_or_default()
    }
}

// ── Response ────────────────────────────────────────────────────────────────

/// Exactly one of `result` / `error`.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcOutcome {
    Result(Value),
    Error(RpcError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawResponse", into = "RawResponse")]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub outcome: RpcOutcome,
    pub id: RpcId,
}

impl RpcResponse {
    pub fn success(id: RpcId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            outcome: RpcOutcome::Result(result),
            id,
        }
    }

    pub fn failure(id: RpcId, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            outcome: RpcOutcome::Error(error),
            id,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, RpcOutcome::Error(_))
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            RpcOutcome::Result(v) => Some(v),
            RpcOutcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&RpcError> {
        match &self.outcome {
            RpcOutcome::Error(e) => Some(e),
            RpcOutcome::Result(_) => None,
        }
    }

    pub fn into_result(self) -> Result<Value, RpcError> {
        match self.outcome {
            RpcOutcome::Result(v) => Ok(v),
            RpcOutcome::Error(e) => Err(e),
        }
    }
}

/// Wire shape of a response; converted into [`RpcResponse`] so that the
/// result/error exclusivity is checked once, at decode time.
#[derive(Serialize, Deserialize)]
struct RawResponse {
    jsonrpc: String,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
    #[serde(default)]
    id: RpcId,
}

impl TryFrom<RawResponse> for RpcResponse {
    type Error = String;

    fn try_from(raw: RawResponse) -> Result<Self, Self::Error> {
        let outcome = match (raw.result, raw.error) {
            (Some(result), None) => RpcOutcome::Result(result),
            (None, Some(error)) => RpcOutcome::Error(error),
            (Some(_), Some(_)) => return Err("response carries both 'result' and 'error'".into()),
            (None, None) => return Err("response carries neither 'result' nor 'error'".into()),
        };
        Ok(Self {
            jsonrpc: raw.jsonrpc,
            outcome,
            id: raw.id,
        })
    }
}

impl From<RpcResponse> for RawResponse {
    fn from(resp: RpcResponse) -> Self {
        let (result, error) = match resp.outcome {
            RpcOutcome::Result(v) => (Some(v), None),
            RpcOutcome::Error(e) => (None, Some(e)),
        };
        Self {
            jsonrpc: resp.jsonrpc,
            result,
            error,
            id: resp.id,
        }
    }
}

// ── MCP payloads ────────────────────────────────────────────────────────────

/// Public description of a registered tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub id: String,
    pub description: String,
    #[serde(alias = "parameter_schema")]
    pub parameter_schema: Value,
}

impl ToolDefinition {
    pub fn new(id: impl Into<String>, description: impl Into<String>, parameter_schema: Value) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            parameter_schema,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListToolsResult {
    pub tools: Vec<ToolDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallToolParams {
    pub tool_id: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallToolResult {
    pub content: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::error::{rpc_error, ErrorKind};
    use serde_json::json;

    #[test]
    fn request_serializes_in_wire_order() {
        let mut params = Map::new();
        params.insert("a".into(), json!(2));
        let req = RpcRequest::call_tool("1", "add", params);
        let s = serde_json::to_string(&req).unwrap();
        assert_eq!(
            s,
            r#"{"jsonrpc":"2.0","method":"mcp.tools.call_tool","params":{"tool_id":"add","params":{"a":2}},"id":"1"}"#
        );
    }

    #[test]
    fn omitted_id_differs_from_null_id() {
        let omitted: RpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"m"}"#).unwrap();
        let null: RpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"m","id":null}"#).unwrap();
        assert_eq!(omitted.id, None);
        assert_eq!(null.id, Some(RpcId::Null));
        assert!(!serde_json::to_string(&omitted).unwrap().contains("\"id\""));
    }

    #[test]
    fn numeric_and_string_ids_are_distinct() {
        let n: RpcId = serde_json::from_value(json!(1)).unwrap();
        let s: RpcId = serde_json::from_value(json!("1")).unwrap();
        assert_eq!(n, RpcId::Number(1));
        assert_eq!(s, RpcId::String("1".into()));
        assert_ne!(n, s);
    }

    #[test]
    fn success_response_matches_wire_shape() {
        let resp = RpcResponse::success("1".into(), json!({ "content": 5 }));
        assert_eq!(
            serde_json::to_string(&resp).unwrap(),
            r#"{"jsonrpc":"2.0","result":{"content":5},"id":"1"}"#
        );
    }

    #[test]
    fn error_response_with_null_id() {
        let resp = RpcResponse::failure(RpcId::Null, rpc_error(ErrorKind::ParseError, "bad", None));
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({ "jsonrpc": "2.0", "error": { "code": -32700, "message": "bad" }, "id": null })
        );
    }

    #[test]
    fn null_result_is_still_a_result() {
        let resp: RpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","result":null,"id":3}"#).unwrap();
        assert_eq!(resp.result(), Some(&Value::Null));
        assert_eq!(resp.id, RpcId::Number(3));
    }

    #[test]
    fn result_and_error_together_are_rejected() {
        let raw = r#"{"jsonrpc":"2.0","result":1,"error":{"code":-1,"message":"x"},"id":1}"#;
        assert!(serde_json::from_str::<RpcResponse>(raw).is_err());
        assert!(serde_json::from_str::<RpcResponse>(r#"{"jsonrpc":"2.0","id":1}"#).is_err());
    }

    #[test]
    fn tool_definition_uses_camel_case_schema() {
        let def = ToolDefinition::new("add", "Add", json!({ "type": "object" }));
        let v = serde_json::to_value(&def).unwrap();
        assert_eq!(v["parameterSchema"], json!({ "type": "object" }));
        let back: ToolDefinition = serde_json::from_value(json!({
            "id": "add", "description": "Add", "parameter_schema": {}
        }))
        .unwrap();
        assert_eq!(back.parameter_schema, json!({}));
    }
}
