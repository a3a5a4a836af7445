//! Prometheus metrics for sqlgate-mcp

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::Result;
use crate::error::Error;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static START_TIME: OnceLock<Instant> = OnceLock::new();

// Server metrics
const METRIC_UPTIME: &str = "sqlgate_mcp_uptime_seconds";
const METRIC_INFO: &str = "sqlgate_mcp_info";
const METRIC_REQUESTS: &str = "sqlgate_mcp_requests_total";

// Query metrics
const METRIC_QUERY_DURATION: &str = "sqlgate_mcp_query_duration_seconds";
const METRIC_QUERY_TOTAL: &str = "sqlgate_mcp_queries_total";
const METRIC_QUERY_ERRORS: &str = "sqlgate_mcp_query_errors_total";
const METRIC_QUERY_ROWS: &str = "sqlgate_mcp_query_rows_total";
const METRIC_REJECTIONS: &str = "sqlgate_mcp_rejections_total";

/// Initialize Prometheus metrics recorder.
pub fn init_metrics() -> Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::Config(format!("Failed to install metrics recorder: {e}")))?;

    PROMETHEUS_HANDLE.set(handle).ok();
    START_TIME.set(Instant::now()).ok();

    register_metrics();
    tracing::info!("Prometheus metrics initialized");
    Ok(())
}

fn register_metrics() {
    describe_gauge!(METRIC_UPTIME, "Server uptime in seconds");
    describe_gauge!(METRIC_INFO, "Server information (always 1)");
    describe_counter!(METRIC_REQUESTS, "Total requests processed per adapter");

    describe_histogram!(METRIC_QUERY_DURATION, "Query execution duration in seconds");
    describe_counter!(METRIC_QUERY_TOTAL, "Total queries executed");
    describe_counter!(METRIC_QUERY_ERRORS, "Total query connection and execution errors");
    describe_counter!(METRIC_QUERY_ROWS, "Total rows returned by queries");
    describe_counter!(METRIC_REJECTIONS, "Total queries refused by the validator");

    gauge!(
        METRIC_INFO,
        "version" => env!("CARGO_PKG_VERSION"),
    )
    .set(1.0);
}

/// Render metrics in Prometheus text format.
#[must_use]
pub fn render_metrics() -> String {
    if let Some(start) = START_TIME.get() {
        gauge!(METRIC_UPTIME).set(start.elapsed().as_secs_f64());
    }

    PROMETHEUS_HANDLE
        .get()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}

/// Record a request on one of the adapters (`rest`, `stream`, `tool`).
pub fn record_request(adapter: &str) {
    counter!(METRIC_REQUESTS, "adapter" => adapter.to_owned()).increment(1);
}

/// Record a successful query execution.
pub fn record_query(backend: &str, duration: Duration, row_count: u64) {
    histogram!(METRIC_QUERY_DURATION, "backend" => backend.to_owned())
        .record(duration.as_secs_f64());

    counter!(
        METRIC_QUERY_TOTAL,
        "backend" => backend.to_owned(),
        "status" => "success".to_owned(),
    )
    .increment(1);

    counter!(METRIC_QUERY_ROWS, "backend" => backend.to_owned()).increment(row_count);
}

/// Record a connection or execution failure.
pub fn record_query_error(backend: &str, error_type: &str) {
    counter!(
        METRIC_QUERY_ERRORS,
        "backend" => backend.to_owned(),
        "error_type" => error_type.to_owned(),
    )
    .increment(1);

    counter!(
        METRIC_QUERY_TOTAL,
        "backend" => backend.to_owned(),
        "status" => "error".to_owned(),
    )
    .increment(1);
}

/// Record a validator rejection, labelled by rule.
pub fn record_rejection(err: &Error) {
    let rule = match err.rejection() {
        Some(crate::error::Rejection::NotSelect) => "not_select",
        Some(crate::error::Rejection::ForbiddenKeyword(_)) => "forbidden_keyword",
        Some(crate::error::Rejection::TableNotAllowed(_)) => "table_not_allowed",
        None => err.kind(),
    };
    counter!(METRIC_REJECTIONS, "rule" => rule.to_owned()).increment(1);
}
