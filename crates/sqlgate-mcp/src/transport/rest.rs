//! Request/response adapter on `POST /mcp`

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::http::AppState;
use crate::Error;
use crate::server::TOOL_NAME;
use crate::types::QueryOutput;

/// `{method, params}` envelope
#[derive(Debug, Deserialize)]
pub struct McpRequest {
    pub method: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

#[derive(Debug, Serialize)]
struct McpResponse {
    result: McpResult,
}

#[derive(Debug, Serialize)]
struct McpResult {
    #[serde(flatten)]
    output: QueryOutput,
    success: bool,
}

/// Failure rendered as `{"detail": message}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            detail: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

pub async fn mcp_handler(
    State(state): State<AppState>,
    payload: Result<Json<McpRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    #[cfg(feature = "metrics")]
    crate::observability::record_request("rest");

    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    tracing::info!(method = %request.method, "[MCP] request");

    if request.method != TOOL_NAME {
        return Err(ApiError::bad_request("Unsupported method"));
    }

    let sql = match request.params.get("sql") {
        Some(Value::String(sql)) if !sql.trim().is_empty() => sql.clone(),
        _ => return Err(Error::MissingParameter("sql".into()).into()),
    };

    // Detached so a disconnecting client does not abort the query mid-flight
    let executor = Arc::clone(&state.executor);
    let rows = tokio::spawn(async move { executor.execute(&sql).await })
        .await
        .unwrap_or_else(|e| Err(Error::execution(e)))
        .map_err(|err| {
            tracing::error!(error = %err, "Query failed");
            ApiError::from(err)
        })?;

    let body = McpResponse {
        result: McpResult {
            output: QueryOutput::from(rows),
            success: true,
        },
    };
    Ok(Json(body).into_response())
}
