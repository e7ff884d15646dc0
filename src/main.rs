use std::time::Duration;

use anyhow::Context;
use axum::http::{header, HeaderName, HeaderValue, Method};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use mcp_gateway::config::GatewayConfig;
use mcp_gateway::handlers::HEADER_REQUEST_ID;
use mcp_gateway::mcp::signing::{HEADER_KEY_ID, HEADER_SIGNATURE, HEADER_TIMESTAMP};
use mcp_gateway::mcp::transport::HEADER_API_KEY;
use mcp_gateway::state::AppState;

fn build_app(config: GatewayConfig) -> anyhow::Result<axum::Router> {
    // CORS - explicit allowlist when configured, otherwise any origin
    let allow_origin = if config.cors_origins.is_empty() {
        AllowOrigin::any()
    } else {
        let origins = config
            .cors_origins
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .context("MCP_CORS_ORIGINS contains an invalid origin")?;
        AllowOrigin::list(origins)
    };
    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(HEADER_API_KEY),
            HeaderName::from_static(HEADER_KEY_ID),
            HeaderName::from_static(HEADER_TIMESTAMP),
            HeaderName::from_static(HEADER_SIGNATURE),
            HeaderName::from_static(HEADER_REQUEST_ID),
        ])
        .max_age(Duration::from_secs(86_400));

    // Security headers
    let nosniff: SetResponseHeaderLayer<HeaderValue> = SetResponseHeaderLayer::overriding(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    let frame_deny: SetResponseHeaderLayer<HeaderValue> = SetResponseHeaderLayer::overriding(
        header::X_FRAME_OPTIONS,
        HeaderValue::from_static("DENY"),
    );

    // Rate limiting: 30 req burst, replenish 1 per 2 seconds, per IP
    // Jaskier Shared Pattern -- rate_limit
    let governor_conf = GovernorConfigBuilder::default()
        .per_second(2)
        .burst_size(30)
        .finish()
        .context("invalid rate limit configuration")?;

    let max_body_bytes = config.max_body_bytes;
    let state = AppState::with_builtin_tools(config).context("failed to register built-in tools")?;

    let app = mcp_gateway::create_router(state)
        .layer(GovernorLayer::new(governor_conf))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(cors)
        .layer(nosniff)
        .layer(frame_deny)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        );

    Ok(app)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;

    dotenvy::dotenv().ok();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .init();
    }

    let config = GatewayConfig::from_env().context("invalid configuration")?;
    if config.auth_disabled() {
        tracing::warn!("auth: neither MCP_API_KEY nor signing key configured -- /mcp is open (dev mode)");
    }

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = build_app(config)?;

    tracing::info!("MCP gateway listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!("failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
