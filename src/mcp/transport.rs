// Jaskier Shared Pattern -- mcp/transport
//! HTTP transport for outgoing MCP calls.
//!
//! [`TransportContext`] is built once (HTTP client, optional API key, optional
//! signing credentials) and shared behind an `Arc`; it is never refreshed.
//! Every call builds its own [`TransportInvocation`] and consumes it.
//!
//! A single deadline covers the whole exchange: sending, reading the unary
//! body, and every read of a streaming body.

use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{ACCEPT, CONTENT_TYPE};
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tokio::time::{timeout_at, Instant};
use url::Url;

use super::error::{McpError, RpcError, TransportFailure};
use super::signing::SigningCredentials;
use super::sse::{decode_stream, SseEvent};
use super::types::{ListToolsResult, RpcId, RpcRequest, RpcResponse, ToolDefinition, JSONRPC_VERSION};

pub const HEADER_API_KEY: &str = "x-api-key";
pub const EVENT_STREAM: &str = "text/event-stream";

/// Longest slice of a non-JSON body kept in a failure.
const MAX_DIAGNOSTIC_BODY: usize = 500;

// ── Context ─────────────────────────────────────────────────────────────────

/// Immutable per-process transport state.
#[derive(Debug, Clone)]
pub struct TransportContext {
    client: Client,
    api_key: Option<String>,
    signing: Option<SigningCredentials>,
}

impl TransportContext {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            api_key: None,
            signing: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_signing(mut self, credentials: SigningCredentials) -> Self {
        self.signing = Some(credentials);
        self
    }

    pub fn signing(&self) -> Option<&SigningCredentials> {
        self.signing.as_ref()
    }
}

// ── Invocation ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Unary,
    Streaming,
}

/// One network exchange. Owned by the calling routine and consumed by send.
#[derive(Debug)]
pub struct TransportInvocation {
    target: Url,
    payload: Vec<u8>,
    mode: Mode,
    timeout: Duration,
}

impl TransportInvocation {
    pub fn new(target: &Url, request: &RpcRequest, mode: Mode, timeout: Duration) -> Result<Self, TransportFailure> {
        let payload = serde_json::to_vec(request).map_err(|e| TransportFailure::Encode(e.to_string()))?;
        Ok(Self {
            target: target.clone(),
            payload,
            mode,
            timeout,
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }
}

/// A decoded unit of a streaming discovery.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    Tools(Vec<ToolDefinition>),
    KeepAlive,
    Complete,
}

// ── Transport ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct McpTransport {
    ctx: Arc<TransportContext>,
}

impl McpTransport {
    pub fn new(ctx: Arc<TransportContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &TransportContext {
        &self.ctx
    }

    /// Send one request and decode exactly one response.
    ///
    /// A non-2xx status whose body is still a JSON-RPC envelope is returned as
    /// that envelope; anything else that is not an envelope is a failure.
    pub async fn invoke_unary(
        &self,
        target: &Url,
        request: &RpcRequest,
        timeout: Duration,
    ) -> Result<RpcResponse, TransportFailure> {
        let deadline = Instant::now() + timeout;
        let invocation = TransportInvocation::new(target, request, Mode::Unary, timeout)?;

        let response = self.send(invocation, deadline).await?;
        let status = response.status().as_u16();
        let body = match timeout_at(deadline, response.bytes()).await {
            Err(_) => return Err(TransportFailure::Timeout(timeout)),
            Ok(Err(e)) => return Err(classify(target, &e, timeout)),
            Ok(Ok(body)) => body,
        };

        decode_unary(status, &body, &request.response_id())
    }

    /// Lazily issue a streaming discovery call.
    ///
    /// Nothing is sent until the stream is first polled. The stream ends after
    /// [`StreamFrame::Complete`] or after the first error; dropping it early
    /// closes the connection.
    pub fn invoke_streaming(
        &self,
        target: &Url,
        request: &RpcRequest,
        timeout: Duration,
    ) -> impl Stream<Item = Result<StreamFrame, McpError>> + Send + use<> {
        let transport = self.clone();
        let target = target.clone();
        let invocation = TransportInvocation::new(&target, request, Mode::Streaming, timeout);
        let expected_id = request.response_id();

        async_stream::stream! {
            let deadline = Instant::now() + timeout;
            let invocation = match invocation {
                Ok(inv) => inv,
                Err(e) => {
                    yield Err(McpError::from(e));
                    return;
                }
            };

            let response = match transport.send(invocation, deadline).await {
                Ok(r) => r,
                Err(e) => {
                    yield Err(McpError::from(e));
                    return;
                }
            };

            let status = response.status().as_u16();
            let is_event_stream = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|ct| ct.starts_with(EVENT_STREAM));

            // Plain JSON answer: an error envelope, or a server without streaming.
            if !is_event_stream {
                let body = match timeout_at(deadline, response.bytes()).await {
                    Err(_) => {
                        yield Err(McpError::from(TransportFailure::Timeout(timeout)));
                        return;
                    }
                    Ok(Err(e)) => {
                        yield Err(McpError::from(classify(&target, &e, timeout)));
                        return;
                    }
                    Ok(Ok(body)) => body,
                };
                match decode_unary(status, &body, &expected_id) {
                    Err(e) => yield Err(McpError::from(e)),
                    Ok(resp) => match frame_from_response(resp, status) {
                        Err(e) => yield Err(e),
                        Ok(frame) => {
                            yield Ok(frame);
                            yield Ok(StreamFrame::Complete);
                        }
                    },
                }
                return;
            }

            let events = decode_stream(response.bytes_stream());
            futures_util::pin_mut!(events);

            loop {
                let next = match timeout_at(deadline, events.next()).await {
                    Err(_) => {
                        yield Err(McpError::from(TransportFailure::Timeout(timeout)));
                        return;
                    }
                    Ok(next) => next,
                };

                match next {
                    None => {
                        yield Err(McpError::from(TransportFailure::StreamClosed));
                        return;
                    }
                    Some(Err(e)) => {
                        yield Err(McpError::from(classify(&target, &e, timeout)));
                        return;
                    }
                    Some(Ok(SseEvent::KeepAlive)) => yield Ok(StreamFrame::KeepAlive),
                    Some(Ok(SseEvent::Done)) => {
                        yield Ok(StreamFrame::Complete);
                        return;
                    }
                    Some(Ok(SseEvent::Message(value))) => match frame_from_message(value, &expected_id, status) {
                        Ok(Some(frame)) => yield Ok(frame),
                        Ok(None) => {}
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    },
                }
            }
        }
    }

    async fn send(&self, invocation: TransportInvocation, deadline: Instant) -> Result<reqwest::Response, TransportFailure> {
        let TransportInvocation {
            target,
            payload,
            mode,
            timeout,
        } = invocation;

        let accept = match mode {
            Mode::Unary => "application/json",
            Mode::Streaming => EVENT_STREAM,
        };

        let mut req = self
            .ctx
            .client
            .post(target.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, accept);

        if let Some(key) = &self.ctx.api_key {
            req = req.header(HEADER_API_KEY, key);
        }
        if let Some(creds) = &self.ctx.signing {
            let signature = creds
                .sign("POST", target.path(), &payload, chrono::Utc::now().timestamp())
                .map_err(|e| TransportFailure::Encode(e.to_string()))?;
            for (name, value) in signature.header_pairs() {
                req = req.header(name, value);
            }
        }

        tracing::debug!(url = %target, mode = ?mode, bytes = payload.len(), "MCP transport: sending");

        match timeout_at(deadline, req.body(payload).send()).await {
            Err(_) => Err(TransportFailure::Timeout(timeout)),
            Ok(Err(e)) => Err(classify(&target, &e, timeout)),
            Ok(Ok(response)) => Ok(response),
        }
    }
}

// ── Decoding ────────────────────────────────────────────────────────────────

fn decode_unary(status: u16, body: &[u8], expected_id: &RpcId) -> Result<RpcResponse, TransportFailure> {
    let decoded = serde_json::from_slice::<RpcResponse>(body).or_else(|e| {
        // Some servers answer failures with a bare `{error, id}` object.
        match (status, serde_json::from_slice::<BareError>(body)) {
            (300.., Ok(bare)) => Ok(RpcResponse::failure(bare.id, bare.error)),
            _ => Err(e),
        }
    });

    match decoded {
        Ok(resp) => {
            check_envelope(&resp, expected_id, status)?;
            Ok(resp)
        }
        Err(e) => {
            let text = truncate_str(&String::from_utf8_lossy(body), MAX_DIAGNOSTIC_BODY);
            Err(match status {
                401 | 403 => TransportFailure::Unauthorized { status, body: text },
                200..=299 => TransportFailure::MalformedBody {
                    status,
                    detail: e.to_string(),
                },
                _ => TransportFailure::Http { status, body: text },
            })
        }
    }
}

#[derive(Deserialize)]
struct BareError {
    error: RpcError,
    #[serde(default)]
    id: RpcId,
}

/// A response must speak JSON-RPC 2.0 and echo the request id. Errors raised
/// before the server could read the id legitimately carry `null`.
fn check_envelope(resp: &RpcResponse, expected: &RpcId, status: u16) -> Result<(), TransportFailure> {
    if resp.jsonrpc != JSONRPC_VERSION {
        return Err(TransportFailure::MalformedBody {
            status,
            detail: format!("unsupported jsonrpc version '{}'", resp.jsonrpc),
        });
    }
    if resp.id == *expected || (resp.id.is_null() && resp.is_error()) {
        return Ok(());
    }
    Err(TransportFailure::MalformedBody {
        status,
        detail: format!("response id {} does not match request id {}", resp.id, expected),
    })
}

fn frame_from_response(resp: RpcResponse, status: u16) -> Result<StreamFrame, McpError> {
    let result = resp.into_result()?;
    let list: ListToolsResult = serde_json::from_value(result).map_err(|e| TransportFailure::MalformedBody {
        status,
        detail: format!("discovery result: {e}"),
    })?;
    Ok(StreamFrame::Tools(list.tools))
}

/// Map one SSE payload to a frame. Unusable frames are skipped (`Ok(None)`),
/// an error envelope ends the stream.
fn frame_from_message(value: Value, expected_id: &RpcId, status: u16) -> Result<Option<StreamFrame>, McpError> {
    let resp: RpcResponse = match serde_json::from_value(value) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!("MCP transport: skipping non-envelope stream frame: {}", e);
            return Ok(None);
        }
    };
    if let Err(e) = check_envelope(&resp, expected_id, status) {
        tracing::warn!(id = %resp.id, expected = %expected_id, "MCP transport: skipping frame: {}", e);
        return Ok(None);
    }
    match frame_from_response(resp, status) {
        Err(McpError::Transport(e)) => {
            tracing::warn!("MCP transport: skipping unreadable discovery frame: {}", e);
            Ok(None)
        }
        other => other.map(Some),
    }
}

fn classify(target: &Url, err: &reqwest::Error, timeout: Duration) -> TransportFailure {
    if err.is_timeout() {
        return TransportFailure::Timeout(timeout);
    }
    TransportFailure::Connect {
        target: format!("{}{}", target.origin().ascii_serialization(), target.path()),
        detail: err.to_string(),
    }
}

fn truncate_str(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let boundary = s
            .char_indices()
            .take_while(|(i, _)| *i < max_len)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(max_len);
        format!("{}...", &s[..boundary])
    }
}
