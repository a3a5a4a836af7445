//! Fixtures shared by the HTTP adapter tests

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use serde_json::Value;

use super::http::AppState;
use crate::backend::{BackendKind, Connection, Connector};
use crate::executor::QueryExecutor;
use crate::security::Policy;
use crate::types::{ResultSet, Scalar};
use crate::{Error, Result};

#[derive(Debug)]
struct FixedConnector {
    rows: Option<ResultSet>,
}

struct FixedConnection {
    rows: Option<ResultSet>,
}

#[async_trait]
impl Connector for FixedConnector {
    fn kind(&self) -> BackendKind {
        BackendKind::Postgres
    }

    async fn open(&self) -> Result<Box<dyn Connection>> {
        Ok(Box::new(FixedConnection {
            rows: self.rows.clone(),
        }))
    }
}

#[async_trait]
impl Connection for FixedConnection {
    async fn fetch_all(&mut self, _sql: &str) -> Result<ResultSet> {
        self.rows
            .clone()
            .ok_or_else(|| Error::execution("relation \"sales\" is locked"))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// Connector whose queries take `delay` and count closed connections
#[derive(Debug)]
struct SlowConnector {
    delay: Duration,
    closed: Arc<AtomicU64>,
}

struct SlowConnection {
    delay: Duration,
    closed: Arc<AtomicU64>,
}

#[async_trait]
impl Connector for SlowConnector {
    fn kind(&self) -> BackendKind {
        BackendKind::Postgres
    }

    async fn open(&self) -> Result<Box<dyn Connection>> {
        Ok(Box::new(SlowConnection {
            delay: self.delay,
            closed: Arc::clone(&self.closed),
        }))
    }
}

#[async_trait]
impl Connection for SlowConnection {
    async fn fetch_all(&mut self, _sql: &str) -> Result<ResultSet> {
        tokio::time::sleep(self.delay).await;
        Ok(one_sale())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn one_sale() -> ResultSet {
    ResultSet::new(
        vec!["product_name".into(), "sale_amount".into()],
        vec![vec![Scalar::from("X"), Scalar::Float(10.0)]],
    )
}

fn executor(rows: Option<ResultSet>) -> QueryExecutor {
    QueryExecutor::new(Policy::default(), Arc::new(FixedConnector { rows }))
}

/// Executor whose every accepted query returns one `sales` row
pub fn sales_executor() -> QueryExecutor {
    executor(Some(one_sale()))
}

/// Executor whose queries take `delay`, plus its closed-connection counter
pub fn slow_executor(delay: Duration) -> (QueryExecutor, Arc<AtomicU64>) {
    let closed = Arc::new(AtomicU64::new(0));
    let connector = SlowConnector {
        delay,
        closed: Arc::clone(&closed),
    };
    (
        QueryExecutor::new(Policy::default(), Arc::new(connector)),
        closed,
    )
}

/// Executor whose every accepted query fails during execution
pub fn failing_executor() -> QueryExecutor {
    executor(None)
}

pub fn app_state() -> AppState {
    AppState::from_executor(Arc::new(sales_executor()))
}

pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
