//! Database backends
//!
//! A backend is selected once at startup from [`BackendKind`]. Each request
//! opens its own [`Connection`] through the [`Connector`] and closes it
//! before returning; nothing is pooled.

mod mysql;
mod postgres;
mod value;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

pub use mysql::MySqlConnector;
pub use postgres::PostgresConnector;
pub use value::{ArrayElement, ColumnKind};

use crate::types::ResultSet;
use crate::{Error, Result};

pub const DEFAULT_POSTGRES_PORT: u16 = 5432;
pub const DEFAULT_MYSQL_PORT: u16 = 3306;
pub const MYSQL_CHARSET: &str = "utf8mb4";

/// Supported SQL engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Postgres,
    MySql,
}

impl BackendKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Postgres => "postgresql",
            Self::MySql => "mysql",
        }
    }

    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Postgres => DEFAULT_POSTGRES_PORT,
            Self::MySql => DEFAULT_MYSQL_PORT,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(Self::Postgres),
            "mysql" => Ok(Self::MySql),
            other => Err(Error::UnsupportedBackend(other.to_string())),
        }
    }
}

/// Connection parameters derived once from the connection URL
#[derive(Clone, PartialEq, Eq)]
pub struct BackendDescriptor {
    kind: BackendKind,
    url: Url,
    host: String,
    port: u16,
    user: String,
    password: Option<String>,
    database: String,
    charset: &'static str,
}

impl BackendDescriptor {
    /// Derive the descriptor from a connection URL.
    ///
    /// MySQL needs a host in the URL. PostgreSQL hands the URL to the driver
    /// as-is, so socket forms like `postgresql:///db?host=/var/run/postgresql`
    /// are accepted and `host` is left empty.
    pub fn from_url(kind: BackendKind, url: Url) -> Result<Self> {
        let host = url.host_str().filter(|h| !h.is_empty());
        if host.is_none() && kind == BackendKind::MySql {
            return Err(Error::Config(format!(
                "connection URL has no host: {}",
                redact(&url)
            )));
        }
        let host = host.unwrap_or_default().to_string();

        Ok(Self {
            kind,
            host,
            port: url.port().unwrap_or_else(|| kind.default_port()),
            user: url.username().to_string(),
            password: url.password().map(ToString::to_string),
            database: url.path().trim_start_matches('/').to_string(),
            charset: MYSQL_CHARSET,
            url,
        })
    }

    #[must_use]
    pub const fn kind(&self) -> BackendKind {
        self.kind
    }

    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    #[must_use]
    pub const fn charset(&self) -> &'static str {
        self.charset
    }
}

impl fmt::Debug for BackendDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendDescriptor")
            .field("kind", &self.kind)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .field("charset", &self.charset)
            .finish()
    }
}

/// URL with the password masked, for logs and error messages
#[must_use]
pub fn redact(url: &Url) -> String {
    let mut masked = url.clone();
    if masked.password().is_some() {
        let _ = masked.set_password(Some("***"));
    }
    masked.to_string()
}

/// Opens per-request connections to one backend
#[async_trait]
pub trait Connector: Send + Sync + fmt::Debug {
    fn kind(&self) -> BackendKind;

    /// Establish a new connection; failures are [`Error::Connection`]
    async fn open(&self) -> Result<Box<dyn Connection>>;
}

/// A single open database connection
#[async_trait]
pub trait Connection: Send {
    /// Run one statement verbatim and buffer every row
    async fn fetch_all(&mut self, sql: &str) -> Result<ResultSet>;

    async fn close(self: Box<Self>) -> Result<()>;
}

/// Build the connector matching the descriptor's backend kind
#[must_use]
pub fn connector_for(descriptor: &Arc<BackendDescriptor>) -> Arc<dyn Connector> {
    match descriptor.kind() {
        BackendKind::Postgres => Arc::new(PostgresConnector::new(Arc::clone(descriptor))),
        BackendKind::MySql => Arc::new(MySqlConnector::new(Arc::clone(descriptor))),
    }
}
