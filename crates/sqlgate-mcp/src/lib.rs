//! Read-only SQL gateway for PostgreSQL and MySQL
//!
//! One validated SELECT per call, served as an MCP tool (stdio or
//! streamable HTTP), a JSON request/response endpoint and a push-event
//! stream.

pub mod backend;
pub mod config;
mod error;
pub mod executor;
pub mod observability;
pub mod security;
pub mod server;
pub mod transport;
pub mod types;

pub use backend::{BackendDescriptor, BackendKind, Connection, Connector, connector_for};
pub use config::{Config, ConfigBuilder, TelemetryConfig, TransportConfig, TransportMode};
pub use error::{Error, ExecutionFailure, Rejection, Result};
pub use executor::QueryExecutor;
pub use security::{Policy, SqlValidator};
pub use server::ServerHandler;
pub use types::*;
