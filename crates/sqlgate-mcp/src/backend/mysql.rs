//! MySQL backend over a single sqlx connection

use std::sync::Arc;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{
    Column, ConnectOptions, Connection as _, Decode, Executor, MySql, Row, Statement, Type,
    TypeInfo, ValueRef,
};
use tracing::{debug, warn};

use super::value::{self, ColumnKind};
use super::{BackendDescriptor, BackendKind, Connection, Connector};
use crate::types::{ResultSet, Scalar};
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct MySqlConnector {
    descriptor: Arc<BackendDescriptor>,
}

impl MySqlConnector {
    #[must_use]
    pub const fn new(descriptor: Arc<BackendDescriptor>) -> Self {
        Self { descriptor }
    }

    fn options(&self) -> MySqlConnectOptions {
        let d = &self.descriptor;
        let mut options = MySqlConnectOptions::new()
            .host(d.host())
            .port(d.port())
            .username(d.user())
            .charset(d.charset());
        if let Some(password) = d.password() {
            options = options.password(password);
        }
        if !d.database().is_empty() {
            options = options.database(d.database());
        }
        options
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    fn kind(&self) -> BackendKind {
        BackendKind::MySql
    }

    async fn open(&self) -> Result<Box<dyn Connection>> {
        let conn = self.options().connect().await.map_err(Error::connection)?;
        debug!(
            host = %self.descriptor.host(),
            port = self.descriptor.port(),
            "MySQL connection opened"
        );
        Ok(Box::new(MySqlSession { conn }))
    }
}

struct MySqlSession {
    conn: MySqlConnection,
}

#[async_trait]
impl Connection for MySqlSession {
    async fn fetch_all(&mut self, sql: &str) -> Result<ResultSet> {
        let statement = (&mut self.conn).prepare(sql).await?;

        let columns: Vec<(String, ColumnKind)> = statement
            .columns()
            .iter()
            .map(|c| (c.name().to_string(), ColumnKind::mysql(c.type_info().name())))
            .collect();
        if columns.is_empty() {
            return Ok(ResultSet::empty());
        }

        let rows = statement.query().fetch_all(&mut self.conn).await?;

        let values = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .enumerate()
                    .map(|(idx, (name, kind))| decode(row, idx, *kind, name))
                    .collect()
            })
            .collect();

        Ok(ResultSet::new(
            columns.into_iter().map(|(name, _)| name).collect(),
            values,
        ))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.conn.close().await.map_err(Error::connection)
    }
}

fn get<'r, T>(row: &'r MySqlRow, idx: usize) -> Option<T>
where
    T: Decode<'r, MySql> + Type<MySql>,
{
    row.try_get::<T, _>(idx).ok()
}

fn decode(row: &MySqlRow, idx: usize, kind: ColumnKind, column: &str) -> Scalar {
    if row.try_get_raw(idx).is_ok_and(|raw| raw.is_null()) {
        return Scalar::Null;
    }

    let decoded = match kind {
        ColumnKind::Bool => get::<bool>(row, idx).map(Scalar::Bool),
        ColumnKind::Int8 | ColumnKind::Int16 | ColumnKind::Int32 | ColumnKind::Int64 => {
            get::<i64>(row, idx).map(Scalar::Int)
        }
        ColumnKind::UInt64 => get::<u64>(row, idx).map(Scalar::UInt),
        ColumnKind::Float32 => get::<f32>(row, idx).map(|v| value::float(v.into())),
        ColumnKind::Float64 => get::<f64>(row, idx).map(value::float),
        ColumnKind::Decimal => get::<BigDecimal>(row, idx).map(|v| value::decimal(&v)),
        ColumnKind::Text => get::<String>(row, idx).map(Scalar::Text),
        ColumnKind::Date => get::<NaiveDate>(row, idx).map(value::date),
        ColumnKind::Time => get::<NaiveTime>(row, idx).map(value::time),
        ColumnKind::DateTime => get::<NaiveDateTime>(row, idx).map(value::datetime),
        ColumnKind::DateTimeTz => get::<DateTime<Utc>>(row, idx).map(value::datetime_tz),
        ColumnKind::Json => get::<serde_json::Value>(row, idx).map(Scalar::Json),
        ColumnKind::Bytes => get::<Vec<u8>>(row, idx).map(|v| value::bytes(&v)),
        ColumnKind::Uuid
        | ColumnKind::Array(_)
        | ColumnKind::Interval
        | ColumnKind::Oid
        | ColumnKind::Money
        | ColumnKind::Label
        | ColumnKind::Other => None,
    };

    decoded.unwrap_or_else(|| fallback(row, idx, column))
}

fn fallback(row: &MySqlRow, idx: usize, column: &str) -> Scalar {
    get::<String>(row, idx)
        .map(Scalar::Text)
        .or_else(|| get::<i64>(row, idx).map(Scalar::Int))
        .or_else(|| get::<u64>(row, idx).map(Scalar::UInt))
        .or_else(|| get::<f64>(row, idx).map(value::float))
        .or_else(|| get::<Vec<u8>>(row, idx).map(|v| value::bytes(&v)))
        .unwrap_or_else(|| {
            let type_name = row
                .columns()
                .get(idx)
                .map_or("unknown", |c| c.type_info().name());
            warn!(column, %type_name, "Unsupported column type, emitting null");
            Scalar::Null
        })
}
