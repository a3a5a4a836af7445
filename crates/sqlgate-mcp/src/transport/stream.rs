//! Push-event stream adapter on `/sse`
//!
//! The request body is a single call message
//! `{"type": "call", "tool": "query_database", "arguments": {"sql": ...}, "call_id": ...}`.
//! The response stream carries one `result` or `error` event, always
//! followed by a `done` event.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};

use super::http::AppState;
use crate::executor::QueryExecutor;
use crate::server::TOOL_NAME;
use crate::types::QueryOutput;

/// One server-sent event of a call stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Result {
        call_id: Value,
        result: QueryOutput,
    },
    Error {
        /// Absent when the failure happened before the call was recognized
        call_id: Option<Value>,
        message: String,
    },
    Done,
}

#[derive(Serialize)]
struct ResultPayload<'a> {
    call_id: &'a Value,
    result: &'a QueryOutput,
}

#[derive(Serialize)]
struct ErrorPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    call_id: Option<&'a Value>,
    message: &'a str,
}

impl StreamEvent {
    fn error(message: impl Into<String>) -> Self {
        Self::Error {
            call_id: None,
            message: message.into(),
        }
    }

    fn call_error(call_id: &Value, message: impl Into<String>) -> Self {
        Self::Error {
            call_id: Some(call_id.clone()),
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Result { .. } => "result",
            Self::Error { .. } => "error",
            Self::Done => "done",
        }
    }

    /// JSON payload of the event; empty for `done`
    #[must_use]
    pub fn data(&self) -> String {
        let encoded = match self {
            Self::Result { call_id, result } => {
                serde_json::to_string(&ResultPayload { call_id, result })
            }
            Self::Error { call_id, message } => serde_json::to_string(&ErrorPayload {
                call_id: call_id.as_ref(),
                message,
            }),
            Self::Done => return String::new(),
        };
        encoded.unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to encode stream event");
            String::new()
        })
    }

    #[must_use]
    pub fn into_event(self) -> Event {
        Event::default().event(self.name()).data(self.data())
    }
}

/// Turn one call body into its terminal event.
///
/// Fields are read leniently: a wrong-typed field fails only its own check,
/// and `call_id` is echoed whenever the call itself was recognized.
pub async fn handle_call(executor: &QueryExecutor, body: &[u8]) -> StreamEvent {
    if body.iter().all(u8::is_ascii_whitespace) {
        return StreamEvent::error("Empty request");
    }

    let payload: Value = match serde_json::from_slice(body) {
        Ok(payload) => payload,
        Err(e) => return StreamEvent::error(format!("Invalid JSON payload: {e}")),
    };
    let call_id = payload.get("call_id").cloned().unwrap_or(Value::Null);
    let tool = match payload.get("tool") {
        Some(Value::String(tool)) => tool.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    tracing::info!(tool = %tool, call_id = %call_id, "[MCP SSE] call received");

    if payload.get("type").and_then(Value::as_str) != Some("call") {
        return StreamEvent::error("Only 'call' type supported");
    }

    if tool != TOOL_NAME {
        return StreamEvent::error(format!("Tool '{tool}' not found"));
    }

    let sql = payload
        .get("arguments")
        .and_then(|arguments| arguments.get("sql"))
        .and_then(Value::as_str);
    let Some(sql) = sql else {
        return StreamEvent::call_error(&call_id, "Missing 'sql' string argument");
    };

    match executor.execute(sql).await {
        Ok(rows) => StreamEvent::Result {
            call_id,
            result: QueryOutput::from(rows),
        },
        Err(err) => {
            tracing::error!(error = %err, "SSE query failed");
            StreamEvent::call_error(&call_id, err.to_string())
        }
    }
}

/// Spawn the call and stream its events, ending with `done`
pub fn call_events(executor: Arc<QueryExecutor>, body: Bytes) -> ReceiverStream<StreamEvent> {
    let (tx, rx) = mpsc::channel(2);

    tokio::spawn(async move {
        let event = handle_call(&executor, &body).await;
        if tx.send(event).await.is_err() {
            tracing::debug!("SSE client disconnected before result");
            return;
        }
        let _ = tx.send(StreamEvent::Done).await;
    });

    ReceiverStream::new(rx)
}

pub async fn sse_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    #[cfg(feature = "metrics")]
    crate::observability::record_request("stream");

    let events = call_events(Arc::clone(&state.executor), body)
        .map(|event| Ok::<_, Infallible>(event.into_event()));

    Sse::new(events).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::transport::test_support::{failing_executor, sales_executor};

    async fn collect(executor: QueryExecutor, body: &str) -> Vec<StreamEvent> {
        call_events(Arc::new(executor), Bytes::from(body.to_string()))
            .collect()
            .await
    }

    fn error_message(event: &StreamEvent) -> &str {
        match event {
            StreamEvent::Error { message, .. } => message,
            other => panic!("expected error event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_successful_call_emits_result_then_done() {
        let body = json!({
            "type": "call",
            "tool": "query_database",
            "arguments": {"sql": "SELECT product_name, sale_amount FROM sales"},
            "call_id": "c-1"
        })
        .to_string();

        let events = collect(sales_executor(), &body).await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name(), "result");
        assert_eq!(
            serde_json::from_str::<Value>(&events[0].data()).unwrap(),
            json!({
                "call_id": "c-1",
                "result": {"data": [{"product_name": "X", "sale_amount": 10.0}], "count": 1}
            })
        );
        assert_eq!(events[1], StreamEvent::Done);
        assert_eq!(events[1].data(), "");
    }

    #[tokio::test]
    async fn test_empty_body() {
        let events = collect(sales_executor(), "").await;
        assert_eq!(error_message(&events[0]), "Empty request");
        assert_eq!(events[0].data(), r#"{"message":"Empty request"}"#);
        assert_eq!(events.last(), Some(&StreamEvent::Done));
    }

    #[tokio::test]
    async fn test_non_call_type() {
        let body = json!({"type": "ping"}).to_string();
        let events = collect(sales_executor(), &body).await;
        assert_eq!(error_message(&events[0]), "Only 'call' type supported");
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let body = json!({"type": "call", "tool": "drop_db", "arguments": {}}).to_string();
        let events = collect(sales_executor(), &body).await;
        assert_eq!(error_message(&events[0]), "Tool 'drop_db' not found");
    }

    #[tokio::test]
    async fn test_missing_sql_argument_keeps_call_id() {
        let body = json!({
            "type": "call",
            "tool": "query_database",
            "arguments": {"sql": 7},
            "call_id": 99
        })
        .to_string();
        let events = collect(sales_executor(), &body).await;
        assert_eq!(error_message(&events[0]), "Missing 'sql' string argument");
        assert_eq!(
            serde_json::from_str::<Value>(&events[0].data()).unwrap(),
            json!({"call_id": 99, "message": "Missing 'sql' string argument"})
        );
    }

    #[tokio::test]
    async fn test_rejected_query_is_error_event() {
        let body = json!({
            "type": "call",
            "tool": "query_database",
            "arguments": {"sql": "UPDATE sales SET x = 1"}
        })
        .to_string();
        let events = collect(sales_executor(), &body).await;
        assert_eq!(error_message(&events[0]), "Only SELECT queries allowed");
        assert_eq!(events[1], StreamEvent::Done);
    }

    #[tokio::test]
    async fn test_execution_error_is_error_event() {
        let body = json!({
            "type": "call",
            "tool": "query_database",
            "arguments": {"sql": "SELECT * FROM sales"},
            "call_id": "c-2"
        })
        .to_string();
        let events = collect(failing_executor(), &body).await;
        assert!(error_message(&events[0]).starts_with("Execution error:"));
        assert_eq!(events[1], StreamEvent::Done);
    }

    #[tokio::test]
    async fn test_wrong_typed_arguments_keep_call_id() {
        let body = json!({
            "type": "call",
            "tool": "query_database",
            "arguments": "x",
            "call_id": "c-3"
        })
        .to_string();
        let events = collect(sales_executor(), &body).await;
        assert_eq!(
            serde_json::from_str::<Value>(&events[0].data()).unwrap(),
            json!({"call_id": "c-3", "message": "Missing 'sql' string argument"})
        );
        assert_eq!(events[1], StreamEvent::Done);
    }

    #[tokio::test]
    async fn test_non_string_type_is_not_a_call() {
        let body = json!({"type": 5, "tool": "query_database", "call_id": 1}).to_string();
        let events = collect(sales_executor(), &body).await;
        assert_eq!(error_message(&events[0]), "Only 'call' type supported");
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_json_body() {
        let events = collect(sales_executor(), "{not json").await;
        assert!(error_message(&events[0]).starts_with("Invalid JSON payload"));
        assert_eq!(events.last(), Some(&StreamEvent::Done));
    }
}
