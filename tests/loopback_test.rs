// Jaskier Shared Pattern -- backend integration test
// MCP gateway - client façade against the real router over TCP

use std::time::Duration;

use serde_json::{json, Map, Value};
use url::Url;

use mcp_gateway::config::GatewayConfig;
use mcp_gateway::mcp::error::{ErrorKind, McpError, TransportFailure};
use mcp_gateway::mcp::registry::{ToolError, ToolRegistry};
use mcp_gateway::mcp::signing::SigningCredentials;
use mcp_gateway::mcp::types::ToolDefinition;
use mcp_gateway::mcp::{McpClient, McpClientOptions};
use mcp_gateway::state::AppState;

const API_KEY: &str = "loopback-key";

/// Serve `state` on an ephemeral port and return the `/mcp` URL.
async fn spawn_server(state: AppState) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = mcp_gateway::create_router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{addr}/mcp")).unwrap()
}

fn secured_config() -> GatewayConfig {
    GatewayConfig {
        api_key: Some(API_KEY.into()),
        signing: Some(SigningCredentials::new("svc-a", b"loopback-secret".to_vec())),
        ..GatewayConfig::default()
    }
}

fn client(endpoint: Url) -> McpClient {
    McpClient::new(
        McpClientOptions::new(endpoint)
            .with_api_key(API_KEY)
            .with_timeout(Duration::from_secs(5)),
    )
    .unwrap()
}

fn args(v: Value) -> Map<String, Value> {
    match v {
        Value::Object(m) => m,
        _ => panic!("args must be an object"),
    }
}

#[tokio::test]
async fn streaming_discovery_matches_registry_order() {
    let state = AppState::with_builtin_tools(secured_config()).unwrap();
    let expected = state.dispatcher.registry().list().to_vec();
    let endpoint = spawn_server(state).await;

    let tools = client(endpoint.clone()).discover_tools().await.unwrap();
    assert_eq!(tools, expected);

    let unary = client(endpoint).discover_tools_unary().await.unwrap();
    assert_eq!(unary, expected);
}

#[tokio::test]
async fn call_tool_round_trip() {
    let endpoint = spawn_server(AppState::with_builtin_tools(secured_config()).unwrap()).await;
    let client = client(endpoint);

    let sum = client.call_tool("add", args(json!({ "a": 2, "b": 3 }))).await.unwrap();
    assert_eq!(sum, json!(5));

    let ctx = client
        .discover_and_call("lookup_context", args(json!({ "query": "weather" })))
        .await
        .unwrap();
    assert_eq!(ctx["queryReceived"], "weather");
}

#[tokio::test]
async fn protocol_errors_arrive_as_rpc_errors() {
    let endpoint = spawn_server(AppState::with_builtin_tools(secured_config()).unwrap()).await;
    let client = client(endpoint);

    let err = client
        .call_tool("subtract", args(json!({ "a": 2, "b": 3 })))
        .await
        .unwrap_err();
    let McpError::Rpc(rpc) = &err else {
        panic!("expected an RPC error, got {err:?}");
    };
    assert_eq!(rpc.kind(), Some(ErrorKind::MethodNotFound));
    assert_eq!(rpc.message, "Method not found: subtract");

    let err = client.call_tool("add", args(json!({ "a": 2 }))).await.unwrap_err();
    assert_eq!(err.rpc_kind(), Some(ErrorKind::InvalidParams));

    let err = client.discover_and_call("subtract", Map::new()).await.unwrap_err();
    assert_eq!(err.rpc_kind(), Some(ErrorKind::MethodNotFound));
}

#[tokio::test]
async fn failing_tool_is_tool_execution_error_with_data() {
    let mut registry = ToolRegistry::new();
    registry
        .register(
            ToolDefinition::new("flaky", "Always fails", json!({ "type": "object" })),
            |_p: Map<String, Value>| async move {
                Err::<Value, _>(ToolError::Execution("upstream unavailable".into()))
            },
        )
        .unwrap();
    let endpoint = spawn_server(AppState::new(secured_config(), registry)).await;

    let err = client(endpoint).call_tool("flaky", Map::new()).await.unwrap_err();
    let McpError::Rpc(rpc) = err else {
        panic!("expected an RPC error");
    };
    assert_eq!(rpc.kind(), Some(ErrorKind::ToolExecutionError));
    assert_eq!(rpc.data, Some(json!("upstream unavailable")));
}

#[tokio::test]
async fn bad_credentials_are_transport_failures() {
    let endpoint = spawn_server(AppState::with_builtin_tools(secured_config()).unwrap()).await;

    let wrong_key = McpClient::new(McpClientOptions::new(endpoint.clone()).with_api_key("nope")).unwrap();
    let err = wrong_key.call_tool("add", args(json!({ "a": 1, "b": 1 }))).await.unwrap_err();
    assert!(
        matches!(err.as_transport(), Some(TransportFailure::Unauthorized { status: 403, .. })),
        "{err:?}"
    );

    let anonymous = McpClient::new(McpClientOptions::new(endpoint)).unwrap();
    let err = anonymous.discover_tools().await.unwrap_err();
    assert!(
        matches!(err.as_transport(), Some(TransportFailure::Unauthorized { status: 401, .. })),
        "{err:?}"
    );
}

#[tokio::test]
async fn signed_client_is_accepted() {
    let endpoint = spawn_server(AppState::with_builtin_tools(secured_config()).unwrap()).await;
    let signed = McpClient::new(
        McpClientOptions::new(endpoint.clone())
            .with_signing(SigningCredentials::new("svc-a", b"loopback-secret".to_vec())),
    )
    .unwrap();
    let product = signed
        .call_tool("multiply", args(json!({ "a": 2.5, "b": 4 })))
        .await
        .unwrap();
    assert_eq!(product, json!(10.0));
    assert_eq!(signed.discover_tools().await.unwrap().len(), 4);

    let forged = McpClient::new(
        McpClientOptions::new(endpoint).with_signing(SigningCredentials::new("svc-a", b"forged".to_vec())),
    )
    .unwrap();
    let err = forged.call_tool("add", args(json!({ "a": 1, "b": 1 }))).await.unwrap_err();
    assert!(matches!(err.as_transport(), Some(TransportFailure::Unauthorized { status: 403, .. })));
}

#[tokio::test]
async fn slow_tool_hits_client_deadline() {
    let mut registry = ToolRegistry::new();
    registry
        .register(
            ToolDefinition::new("sleepy", "Sleeps", json!({ "type": "object" })),
            |_p: Map<String, Value>| async move {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Ok::<_, ToolError>(Value::Null)
            },
        )
        .unwrap();
    let endpoint = spawn_server(AppState::new(secured_config(), registry)).await;

    let impatient = McpClient::new(
        McpClientOptions::new(endpoint)
            .with_api_key(API_KEY)
            .with_timeout(Duration::from_millis(200)),
    )
    .unwrap();

    let started = std::time::Instant::now();
    let err = impatient.call_tool("sleepy", Map::new()).await.unwrap_err();
    assert!(err.as_transport().is_some_and(TransportFailure::is_timeout), "{err:?}");
    assert!(started.elapsed() < Duration::from_secs(2));
}
