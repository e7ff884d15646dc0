// Jaskier Shared Pattern -- mcp/error
//! Error vocabulary shared by the dispatcher, the transport and the client.
//!
//! Two independent axes:
//! - [`ErrorKind`] / [`RpcError`] - protocol-level failures that travel inside
//!   a JSON-RPC envelope and always carry a reserved numeric code.
//! - [`TransportFailure`] - anything that went wrong before RPC semantics could
//!   apply (connect, auth, timeout, non-JSON body). These are never turned into
//!   an `RpcError`.
//!
//! [`McpError`] is the single terminal outcome a client call can fail with.

use std::time::Duration;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Protocol error kinds ────────────────────────────────────────────────────

/// Reserved JSON-RPC error categories plus the tool-level execution failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    ToolExecutionError,
}

impl ErrorKind {
    pub const fn code(self) -> i32 {
        match self {
            ErrorKind::ParseError => -32700,
            ErrorKind::InvalidRequest => -32600,
            ErrorKind::MethodNotFound => -32601,
            ErrorKind::InvalidParams => -32602,
            ErrorKind::InternalError => -32603,
            ErrorKind::ToolExecutionError => -32000,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -32700 => Some(ErrorKind::ParseError),
            -32600 => Some(ErrorKind::InvalidRequest),
            -32601 => Some(ErrorKind::MethodNotFound),
            -32602 => Some(ErrorKind::InvalidParams),
            -32603 => Some(ErrorKind::InternalError),
            -32000 => Some(ErrorKind::ToolExecutionError),
            _ => None,
        }
    }

    /// HTTP status used for a response carrying this kind.
    ///
    /// Caller mistakes are 400, failures on our side are 500. Applied to every
    /// protocol error, including `MethodNotFound`.
    pub const fn http_status(self) -> StatusCode {
        match self {
            ErrorKind::ParseError
            | ErrorKind::InvalidRequest
            | ErrorKind::MethodNotFound
            | ErrorKind::InvalidParams => StatusCode::BAD_REQUEST,
            ErrorKind::InternalError | ErrorKind::ToolExecutionError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

// ── RpcError ────────────────────────────────────────────────────────────────

/// The `error` member of a JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("RPC error {code}: {message}")]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// Known kind for this code, `None` for application-defined codes.
    pub fn kind(&self) -> Option<ErrorKind> {
        ErrorKind::from_code(self.code)
    }
}

/// Central translation from a failure category to its wire error.
///
/// Every failure site in the dispatcher goes through here so codes and
/// statuses cannot drift apart.
pub fn rpc_error(kind: ErrorKind, message: impl Into<String>, data: Option<Value>) -> RpcError {
    RpcError {
        code: kind.code(),
        message: message.into(),
        data,
    }
}

// ── Transport failures ──────────────────────────────────────────────────────

/// Failure that happened before (or instead of) a decodable JSON-RPC exchange.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportFailure {
    #[error("could not encode request: {0}")]
    Encode(String),

    #[error("connection to '{target}' failed: {detail}")]
    Connect { target: String, detail: String },

    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("request rejected with HTTP {status}: {body}")]
    Unauthorized { status: u16, body: String },

    #[error("server returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("response is not a valid JSON-RPC envelope (HTTP {status}): {detail}")]
    MalformedBody { status: u16, detail: String },

    #[error("stream closed before completion marker")]
    StreamClosed,
}

impl TransportFailure {
    /// HTTP-like status describing this failure to the caller.
    pub fn status(&self) -> u16 {
        match self {
            TransportFailure::Encode(_) => 400,
            TransportFailure::Connect { .. } => 502,
            TransportFailure::Timeout(_) => 504,
            TransportFailure::Unauthorized { status, .. }
            | TransportFailure::Http { status, .. }
            | TransportFailure::MalformedBody { status, .. } => *status,
            TransportFailure::StreamClosed => 502,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportFailure::Timeout(_))
    }
}

// ── McpError ────────────────────────────────────────────────────────────────

/// Terminal failure of a client call: exactly one of the two axes.
#[derive(Debug, Clone, thiserror::Error)]
pub enum McpError {
    #[error(transparent)]
    Transport(#[from] TransportFailure),

    #[error(transparent)]
    Rpc(#[from] RpcError),
}

impl McpError {
    pub fn rpc_kind(&self) -> Option<ErrorKind> {
        match self {
            McpError::Rpc(e) => e.kind(),
            McpError::Transport(_) => None,
        }
    }

    pub fn as_transport(&self) -> Option<&TransportFailure> {
        match self {
            McpError::Transport(t) => Some(t),
            McpError::Rpc(_) => None,
        }
    }
}
