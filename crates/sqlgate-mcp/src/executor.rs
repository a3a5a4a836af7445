//! Validate-then-run query execution

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;

use crate::backend::{BackendKind, Connector};
use crate::error::ExecutionFailure;
use crate::security::{KeywordValidator, Policy, SqlValidator};
use crate::types::ResultSet;

/// Runs caller-supplied SQL against the configured backend.
///
/// Every call validates first; only accepted queries open a connection. The
/// connection is used for exactly one statement and is closed on every path
/// once opened. Shared freely between transports.
#[derive(Clone)]
pub struct QueryExecutor {
    policy: Arc<Policy>,
    validator: Arc<dyn SqlValidator>,
    connector: Arc<dyn Connector>,
}

impl fmt::Debug for QueryExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryExecutor")
            .field("policy", &self.policy)
            .field("validator", &self.validator)
            .field("backend", &self.connector.kind())
            .finish()
    }
}

impl QueryExecutor {
    /// Executor using the default keyword validator
    pub fn new(policy: Policy, connector: Arc<dyn Connector>) -> Self {
        Self::with_validator(policy, Arc::new(KeywordValidator), connector)
    }

    pub fn with_validator(
        policy: Policy,
        validator: Arc<dyn SqlValidator>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            policy: Arc::new(policy),
            validator,
            connector,
        }
    }

    #[must_use]
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    #[must_use]
    pub fn backend(&self) -> BackendKind {
        self.connector.kind()
    }

    /// Validate `raw` and, if accepted, run it on a fresh connection
    pub async fn execute(&self, raw: &str) -> Result<ResultSet, ExecutionFailure> {
        let span = tracing::debug_span!("query.execute", db.system = self.backend().as_str());
        self.run(raw).instrument(span).await
    }

    async fn run(&self, raw: &str) -> Result<ResultSet, ExecutionFailure> {
        let sql = match self.validator.validate(raw, &self.policy).into_result() {
            Ok(sql) => sql,
            Err(err) => {
                tracing::warn!(reason = %err, "Query rejected");
                #[cfg(feature = "metrics")]
                crate::observability::record_rejection(&err);
                return Err(err);
            }
        };

        let start = Instant::now();

        let mut conn = match self.connector.open().await {
            Ok(conn) => conn,
            Err(err) => {
                tracing::error!(error = %err, "Failed to open database connection");
                #[cfg(feature = "metrics")]
                crate::observability::record_query_error(self.backend().as_str(), err.kind());
                return Err(err);
            }
        };

        let result = conn.fetch_all(&sql).await;

        if let Err(err) = conn.close().await {
            tracing::warn!(error = %err, "Failed to close database connection");
        }

        match &result {
            Ok(rows) => {
                tracing::debug!(
                    rows = rows.len(),
                    columns = rows.columns().len(),
                    elapsed_ms = start.elapsed().as_millis(),
                    "Query completed"
                );
                #[cfg(feature = "metrics")]
                crate::observability::record_query(
                    self.backend().as_str(),
                    start.elapsed(),
                    rows.len() as u64,
                );
            }
            Err(err) => {
                tracing::warn!(error = %err, kind = err.kind(), "Query failed");
                #[cfg(feature = "metrics")]
                crate::observability::record_query_error(self.backend().as_str(), err.kind());
            }
        }

        result
    }
}
