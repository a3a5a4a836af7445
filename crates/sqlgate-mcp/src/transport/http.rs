//! HTTP transport: request/response, push-stream and MCP tool surfaces

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderValue, Method, header};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::{Router, middleware};
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::streamable_http_server::{StreamableHttpServerConfig, StreamableHttpService};
use serde::Serialize;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::auth::{AuthConfig, bearer_auth_middleware};
use super::{rest, stream};
use crate::config::Config;
use crate::executor::QueryExecutor;
use crate::server::{ServerHandler, TOOL_NAME};
use crate::{Error, Result};

pub const MANIFEST_NAME: &str = "sql_database_query";
const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

/// Shared state of the HTTP handlers
#[derive(Debug, Clone)]
pub struct AppState {
    pub(crate) executor: Arc<QueryExecutor>,
}

impl AppState {
    #[must_use]
    pub const fn from_executor(executor: Arc<QueryExecutor>) -> Self {
        Self { executor }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    db_type: &'static str,
    version: &'static str,
}

/// Run the HTTP server until `shutdown` resolves
pub async fn run_http(
    handler: ServerHandler,
    config: &Config,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let host = config.transport.http_host;
    let addr = SocketAddr::new(host, config.transport.http_port);
    let cancellation_token = CancellationToken::new();

    let auth_config = AuthConfig::new(config.api_key.clone());
    emit_security_warnings(host, config.transport.cors_origin.as_deref(), &auth_config);

    let app = router(
        handler,
        auth_config,
        config.transport.cors_origin.as_deref(),
        &cancellation_token,
    );

    tracing::info!("HTTP server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Transport(format!("Failed to bind to {addr}: {e}")))?;

    let token = cancellation_token.clone();
    tokio::spawn(async move {
        shutdown.await;
        token.cancel();
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancellation_token.cancelled().await })
        .await
        .map_err(|e| Error::Transport(format!("HTTP server error: {e}")))?;

    tracing::info!("HTTP server shutdown complete");
    Ok(())
}

/// Assemble every route; `/mcp`, `/sse` and `/tools` sit behind the API key
pub fn router(
    handler: ServerHandler,
    auth_config: AuthConfig,
    cors_origin: Option<&str>,
    cancellation_token: &CancellationToken,
) -> Router {
    let state = AppState::from_executor(Arc::clone(handler.executor()));

    let session_manager = Arc::new(LocalSessionManager::default());
    let mcp_config = StreamableHttpServerConfig::default()
        .with_cancellation_token(cancellation_token.child_token());
    let mcp_service =
        StreamableHttpService::new(move || Ok(handler.clone()), session_manager, mcp_config);

    let protected = Router::new()
        .route("/mcp", post(rest::mcp_handler))
        .route("/sse", get(stream::sse_handler).post(stream::sse_handler))
        .nest_service("/tools", mcp_service)
        .layer(middleware::from_fn_with_state(
            auth_config,
            bearer_auth_middleware,
        ));

    #[allow(unused_mut)]
    let mut public = Router::new()
        .route("/health", get(health_handler))
        .route("/manifest", get(manifest_handler));

    #[cfg(feature = "metrics")]
    {
        public = public.route("/metrics", get(metrics_handler));
    }

    public
        .merge(protected)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(cors_origin))
}

fn build_cors_layer(cors_origin: Option<&str>) -> CorsLayer {
    let origin = cors_origin
        .and_then(|o| o.parse::<HeaderValue>().ok())
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CORS_ORIGIN));

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

fn emit_security_warnings(host: IpAddr, cors_origin: Option<&str>, auth_config: &AuthConfig) {
    let is_non_loopback = !host.is_loopback();
    let is_all_interfaces = host == IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        || host == IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED);

    if is_all_interfaces {
        tracing::warn!(
            "HTTP server binding to all interfaces (0.0.0.0). \
             This exposes the server to all network interfaces."
        );
    } else if is_non_loopback {
        tracing::warn!(
            "HTTP server binding to non-loopback address ({host}). \
             Ensure network security policies are in place."
        );
    }

    if !auth_config.is_enabled() && is_non_loopback {
        tracing::warn!(
            "SECURITY WARNING: HTTP server accessible from network without authentication. \
             Set MCP_API_KEY environment variable to enable authentication."
        );
    }

    if cors_origin.is_none() {
        tracing::info!(
            "CORS origin not configured (MCP_CORS_ORIGIN). \
             Using restrictive default: {DEFAULT_CORS_ORIGIN}"
        );
    }
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        db_type: state.executor.backend().as_str(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Tool discovery document for agent platforms
fn manifest(executor: &QueryExecutor) -> Value {
    let tables: Vec<&str> = executor.policy().allowed_tables().into_iter().collect();
    json!({
        "name": MANIFEST_NAME,
        "description": "Securely query PostgreSQL/MySQL via natural language.",
        "version": env!("CARGO_PKG_VERSION"),
        "tools": [
            {
                "name": TOOL_NAME,
                "description": format!(
                    "Execute a SELECT SQL query on allowed tables: {}.",
                    tables.join(", ")
                ),
                "parameters": {
                    "type": "object",
                    "properties": {
                        "sql": {"type": "string", "description": "Valid SELECT SQL"}
                    },
                    "required": ["sql"]
                }
            }
        ]
    })
}

async fn manifest_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(manifest(&state.executor))
}

#[cfg(feature = "metrics")]
async fn metrics_handler() -> impl IntoResponse {
    (
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        crate::observability::render_metrics(),
    )
}
