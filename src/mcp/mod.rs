// Jaskier Shared Pattern -- mcp
//! MCP (Model Context Protocol) gateway core - server and client.
//!
//! **Server**: [`registry::ToolRegistry`] holds the tools registered at
//! startup, [`server::Dispatcher`] turns a raw JSON-RPC body into exactly one
//! response, and [`http`] mounts it at `/mcp`.
//!
//! **Client**: [`client::McpClient`] discovers a remote server's tools (over an
//! event stream or a single exchange) and calls them through
//! [`transport::McpTransport`], which handles API keys, request signing and
//! deadlines.
//!
//! Protocol: JSON-RPC 2.0 over HTTP with two reserved methods,
//! `mcp.discovery.list_tools` and `mcp.tools.call_tool`.

pub mod client;
pub mod error;
pub mod http;
pub mod registry;
pub mod server;
pub mod signing;
pub mod sse;
pub mod transport;
pub mod types;

pub use client::{McpClient, McpClientOptions};
pub use error::{ErrorKind, McpError, RpcError, TransportFailure};
pub use registry::{ToolError, ToolHandler, ToolRegistry};
pub use server::Dispatcher;
pub use types::{RpcId, RpcRequest, RpcResponse, ToolDefinition};
