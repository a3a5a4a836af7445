//! MCP server implementation

use std::fmt;
use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, ServerCapabilities, ServerInfo};
use rmcp::{ErrorData, ServerHandler as RmcpServerHandler, tool, tool_handler, tool_router};

use crate::executor::QueryExecutor;
use crate::Error;
use crate::types::{QueryParams, ResultSet};

pub const TOOL_NAME: &str = "query_database";
pub const NO_RESULTS_TEXT: &str = "Query executed successfully but returned no results.";

pub struct ServerHandler {
    executor: Arc<QueryExecutor>,
    tool_router: ToolRouter<Self>,
}

impl Clone for ServerHandler {
    fn clone(&self) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
            tool_router: Self::tool_router(),
        }
    }
}

impl fmt::Debug for ServerHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerHandler")
            .field("executor", &self.executor)
            .field("tool_router", &"<ToolRouter>")
            .finish()
    }
}

impl ServerHandler {
    pub fn new(executor: Arc<QueryExecutor>) -> Self {
        Self {
            executor,
            tool_router: Self::tool_router(),
        }
    }

    #[must_use]
    pub fn executor(&self) -> &Arc<QueryExecutor> {
        &self.executor
    }

    /// Run one tool call and render its outcome as text.
    ///
    /// Failures are returned as ordinary text so the calling agent can read
    /// them and correct its SQL.
    pub async fn run_tool(&self, sql: &str) -> String {
        #[cfg(feature = "metrics")]
        crate::observability::record_request("tool");

        tracing::info!(tool = TOOL_NAME, sql, "Executing SQL");

        let outcome = if sql.trim().is_empty() {
            Err(Error::MissingParameter("sql".into()))
        } else {
            self.executor.execute(sql).await
        };

        match outcome.and_then(|rows| render(&rows)) {
            Ok(text) => text,
            Err(err) => {
                tracing::error!(tool = TOOL_NAME, error = %err, "Query failed");
                format!("Error executing query: {err}")
            }
        }
    }

    fn instructions(&self) -> String {
        let policy = self.executor.policy();
        let tables: Vec<&str> = policy.allowed_tables().into_iter().collect();
        let columns: Vec<&str> = policy.allowed_columns().into_iter().collect();
        format!(
            "Read-only SQL gateway for a {} database. Only single SELECT statements are \
             accepted. Allowed tables: {}. Known columns: {}.",
            self.executor.backend(),
            tables.join(", "),
            columns.join(", "),
        )
    }
}

fn render(rows: &ResultSet) -> crate::Result<String> {
    if !rows.has_columns() {
        return Ok(NO_RESULTS_TEXT.to_string());
    }
    serde_json::to_string(&rows.data()).map_err(Error::execution)
}

#[tool_router]
impl ServerHandler {
    #[tool(
        description = "Execute a read-only SQL SELECT query against the connected database. Use syntax of the underlying database (PostgreSQL or MySQL). Returns the rows as a JSON array of objects."
    )]
    async fn query_database(
        &self,
        Parameters(params): Parameters<QueryParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let text = self.run_tool(&params.sql).await;
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }
}

#[tool_handler]
impl RmcpServerHandler for ServerHandler {
    fn get_info(&self) -> ServerInfo {
        ServerInfo::new(ServerCapabilities::builder().enable_tools().build())
            .with_instructions(self.instructions())
    }
}
