// Jaskier Shared Pattern -- mcp/client
//! MCP client façade: "discover tools, then invoke one" over the transport.
//!
//! Each call gets a fresh uuid request id and its own deadline. Nothing is
//! retried here; the caller decides what to do with a failure.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use serde_json::{Map, Value};
use url::Url;
use uuid::Uuid;

use super::error::{rpc_error, ErrorKind, McpError, TransportFailure};
use super::signing::SigningCredentials;
use super::transport::{McpTransport, StreamFrame, TransportContext};
use super::types::{CallToolResult, ListToolsResult, RpcId, RpcRequest, ToolDefinition};

pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone)]
pub struct McpClientOptions {
    pub endpoint: Url,
    pub timeout: Duration,
    pub api_key: Option<String>,
    pub signing: Option<SigningCredentials>,
}

impl McpClientOptions {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            timeout: DEFAULT_CLIENT_TIMEOUT,
            api_key: None,
            signing: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_signing(mut self, credentials: SigningCredentials) -> Self {
        self.signing = Some(credentials);
        self
    }
}

#[derive(Debug, Clone)]
pub struct McpClient {
    transport: McpTransport,
    endpoint: Url,
    timeout: Duration,
}

impl McpClient {
    pub fn new(options: McpClientOptions) -> Result<Self, TransportFailure> {
        let http = Client::builder()
            .user_agent(concat!("mcp-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportFailure::Connect {
                target: options.endpoint.to_string(),
                detail: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self::with_http_client(http, options))
    }

    /// Reuse an existing `reqwest::Client` (and its connection pool).
    pub fn with_http_client(http: Client, options: McpClientOptions) -> Self {
        let mut ctx = TransportContext::new(http);
        if let Some(key) = options.api_key {
            ctx = ctx.with_api_key(key);
        }
        if let Some(creds) = options.signing {
            ctx = ctx.with_signing(creds);
        }
        Self {
            transport: McpTransport::new(Arc::new(ctx)),
            endpoint: options.endpoint,
            timeout: options.timeout,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Streaming discovery. Collects every tool batch until the completion
    /// marker; a stream that closes without one is a failure.
    pub async fn discover_tools(&self) -> Result<Vec<ToolDefinition>, McpError> {
        let request = RpcRequest::list_tools(next_id());
        let frames = self.transport.invoke_streaming(&self.endpoint, &request, self.timeout);
        futures_util::pin_mut!(frames);

        let mut tools = Vec::new();
        while let Some(frame) = frames.next().await {
            match frame? {
                StreamFrame::Tools(batch) => tools.extend(batch),
                StreamFrame::KeepAlive => {}
                StreamFrame::Complete => {
                    tracing::debug!(endpoint = %self.endpoint, tools = tools.len(), "MCP client: discovery complete");
                    return Ok(tools);
                }
            }
        }
        Err(TransportFailure::StreamClosed.into())
    }

    /// Discovery as a single request/response exchange.
    pub async fn discover_tools_unary(&self) -> Result<Vec<ToolDefinition>, McpError> {
        let request = RpcRequest::list_tools(next_id());
        let result = self
            .transport
            .invoke_unary(&self.endpoint, &request, self.timeout)
            .await?
            .into_result()?;

        let list: ListToolsResult = serde_json::from_value(result).map_err(|e| TransportFailure::MalformedBody {
            status: 200,
            detail: format!("discovery result: {e}"),
        })?;
        Ok(list.tools)
    }

    /// Invoke a tool and return its `content`.
    pub async fn call_tool(&self, tool_id: &str, params: Map<String, Value>) -> Result<Value, McpError> {
        let request = RpcRequest::call_tool(next_id(), tool_id, params);
        tracing::debug!(endpoint = %self.endpoint, tool = %tool_id, "MCP client: call_tool");

        let result = self
            .transport
            .invoke_unary(&self.endpoint, &request, self.timeout)
            .await?
            .into_result()?;

        let call: CallToolResult = serde_json::from_value(result).map_err(|e| TransportFailure::MalformedBody {
            status: 200,
            detail: format!("call_tool result: {e}"),
        })?;
        Ok(call.content)
    }

    /// Discover, then call `tool_id` only if the server listed it.
    pub async fn discover_and_call(&self, tool_id: &str, params: Map<String, Value>) -> Result<Value, McpError> {
        let tools = self.discover_tools().await?;
        if !tools.iter().any(|t| t.id == tool_id) {
            tracing::warn!(endpoint = %self.endpoint, tool = %tool_id, "MCP client: tool not advertised by server");
            return Err(rpc_error(ErrorKind::MethodNotFound, format!("Method not found: {tool_id}"), None).into());
        }
        self.call_tool(tool_id, params).await
    }
}

fn next_id() -> RpcId {
    RpcId::String(Uuid::new_v4().to_string())
}
