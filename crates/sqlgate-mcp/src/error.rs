use std::fmt;

use rmcp::ErrorData;
use thiserror::Error;

/// Reason a query was refused by the validator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    NotSelect,
    ForbiddenKeyword(String),
    TableNotAllowed(String),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotSelect => write!(f, "Only SELECT queries allowed"),
            Self::ForbiddenKeyword(kw) => write!(f, "Forbidden keyword: {kw}"),
            Self::TableNotAllowed(name) => write!(f, "Table '{name}' not allowed"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Rejected(Rejection),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Unsupported DB_TYPE: {0}")]
    UnsupportedBackend(String),

    #[error("Missing valid '{0}' parameter")]
    MissingParameter(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Failures produced by the query executor
pub type ExecutionFailure = Error;

impl Error {
    pub fn connection(err: impl fmt::Display) -> Self {
        Self::Connection(err.to_string())
    }

    pub fn execution(err: impl fmt::Display) -> Self {
        Self::Execution(err.to_string())
    }

    #[must_use]
    pub const fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected(reason) => Some(reason),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    #[must_use]
    pub const fn is_unsupported_backend(&self) -> bool {
        matches!(self, Self::UnsupportedBackend(_))
    }

    #[must_use]
    pub const fn is_missing_parameter(&self) -> bool {
        matches!(self, Self::MissingParameter(_))
    }

    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Whether the caller can fix the request (as opposed to a backend or server fault)
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Rejected(_) | Self::MissingParameter(_))
    }

    /// Short label used for logs and metrics
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Rejected(_) => "rejected",
            Self::Connection(_) => "connection",
            Self::Execution(_) => "execution",
            Self::UnsupportedBackend(_) => "unsupported_backend",
            Self::MissingParameter(_) => "missing_parameter",
            Self::Config(_) => "config",
            Self::Transport(_) => "transport",
        }
    }
}

impl From<Rejection> for Error {
    fn from(reason: Rejection) -> Self {
        Self::Rejected(reason)
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(_)
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::connection(err),
            other => Self::execution(other),
        }
    }
}

/// Convert our Error type to rmcp `ErrorData`
impl From<Error> for ErrorData {
    fn from(err: Error) -> Self {
        let message = err.to_string();
        if err.is_client_error() || err.is_config() {
            Self::invalid_params(message, None)
        } else {
            Self::internal_error(message, None)
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
