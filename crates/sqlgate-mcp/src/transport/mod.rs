//! Transport layer
//!
//! stdio serves the MCP tool only; HTTP (default) serves the tool under
//! `/tools` next to the `/mcp` and `/sse` adapters.

#[cfg(feature = "http")]
mod auth;
#[cfg(feature = "http")]
mod http;
#[cfg(feature = "http")]
mod rest;
#[cfg(feature = "http")]
mod stream;
#[cfg(all(test, feature = "http"))]
mod test_support;

use std::future::Future;

use rmcp::ServiceExt;
use rmcp::transport::io::stdio;

#[cfg(feature = "http")]
pub use auth::{AuthConfig, FORBIDDEN_DETAIL};
#[cfg(feature = "http")]
pub use http::{AppState, MANIFEST_NAME, router};
#[cfg(feature = "http")]
pub use stream::{StreamEvent, handle_call};

use crate::config::{Config, TransportMode};
use crate::server::ServerHandler;
use crate::{Error, Result};

/// Run the server with the configured transport until it ends or `shutdown` resolves
pub async fn run_transport(
    handler: ServerHandler,
    config: &Config,
    #[allow(unused_variables)] shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    match config.transport.mode {
        TransportMode::Stdio => run_stdio(handler).await,
        #[cfg(feature = "http")]
        TransportMode::Http => http::run_http(handler, config, shutdown).await,
        #[cfg(not(feature = "http"))]
        TransportMode::Http => Err(Error::Transport(
            "HTTP transport requires the 'http' feature".into(),
        )),
    }
}

async fn run_stdio(handler: ServerHandler) -> Result<()> {
    let transport = stdio();
    let server = handler
        .serve(transport)
        .await
        .map_err(|e| Error::Transport(format!("Failed to start stdio transport: {e}")))?;

    server
        .waiting()
        .await
        .map_err(|e| Error::Transport(format!("Stdio transport error: {e}")))?;

    Ok(())
}
