//! PostgreSQL backend over a single sqlx connection

use std::sync::Arc;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::postgres::types::{Oid, PgInterval, PgMoney};
use sqlx::postgres::{PgConnection, PgRow, PgTypeInfo, PgTypeKind};
use sqlx::{
    Column, Connection as _, Decode, Executor, Postgres, Row, Statement, Type, TypeInfo, ValueRef,
};
use tracing::{debug, warn};
use uuid::Uuid;

use super::value::{self, ArrayElement, ColumnKind};
use super::{BackendDescriptor, BackendKind, Connection, Connector};
use crate::types::{ResultSet, Scalar};
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct PostgresConnector {
    descriptor: Arc<BackendDescriptor>,
}

impl PostgresConnector {
    #[must_use]
    pub const fn new(descriptor: Arc<BackendDescriptor>) -> Self {
        Self { descriptor }
    }
}

#[async_trait]
impl Connector for PostgresConnector {
    fn kind(&self) -> BackendKind {
        BackendKind::Postgres
    }

    async fn open(&self) -> Result<Box<dyn Connection>> {
        let conn = PgConnection::connect(self.descriptor.url().as_str())
            .await
            .map_err(Error::connection)?;
        debug!(host = %self.descriptor.host(), "PostgreSQL connection opened");
        Ok(Box::new(PostgresConnection { conn }))
    }
}

struct PostgresConnection {
    conn: PgConnection,
}

#[async_trait]
impl Connection for PostgresConnection {
    async fn fetch_all(&mut self, sql: &str) -> Result<ResultSet> {
        let statement = (&mut self.conn).prepare(sql).await?;

        let columns: Vec<(String, ColumnKind)> = statement
            .columns()
            .iter()
            .map(|c| (c.name().to_string(), column_kind(c.type_info())))
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

fn column_kind(type_info: &PgTypeInfo) -> ColumnKind {
    match type_info.kind() {
        PgTypeKind::Enum(_) => ColumnKind::Label,
        _ => ColumnKind::postgres(type_info.name()),
    }
}

fn get<'r, T>(row: &'r PgRow, idx: usize) -> Option<T>
where
    T: Decode<'r, Postgres> + Type<Postgres>,
{
    row.try_get::<T, _>(idx).ok()
}

fn decode(row: &PgRow, idx: usize, kind: ColumnKind, column: &str) -> Scalar {
    if row.try_get_raw(idx).is_ok_and(|raw| raw.is_null()) {
        return Scalar::Null;
    }

    let decoded = match kind {
        ColumnKind::Bool => get::<bool>(row, idx).map(Scalar::Bool),
        ColumnKind::Int8 => get::<i8>(row, idx).map(|v| Scalar::Int(v.into())),
        ColumnKind::Int16 => get::<i16>(row, idx).map(|v| Scalar::Int(v.into())),
        ColumnKind::Int32 => get::<i32>(row, idx).map(|v| Scalar::Int(v.into())),
        ColumnKind::Int64 => get::<i64>(row, idx).map(Scalar::Int),
        ColumnKind::UInt64 => None,
        ColumnKind::Float32 => get::<f32>(row, idx).map(|v| value::float(v.into())),
        ColumnKind::Float64 => get::<f64>(row, idx).map(value::float),
        ColumnKind::Decimal => get::<BigDecimal>(row, idx).map(|v| value::decimal(&v)),
        ColumnKind::Text => get::<String>(row, idx).map(Scalar::Text),
        ColumnKind::Date => get::<NaiveDate>(row, idx).map(value::date),
        ColumnKind::Time => get::<NaiveTime>(row, idx).map(value::time),
        ColumnKind::DateTime => get::<NaiveDateTime>(row, idx).map(value::datetime),
        ColumnKind::DateTimeTz => get::<DateTime<Utc>>(row, idx).map(value::datetime_tz),
        ColumnKind::Uuid => get::<Uuid>(row, idx).map(|v| Scalar::Text(v.to_string())),
        ColumnKind::Json => get::<serde_json::Value>(row, idx).map(Scalar::Json),
        ColumnKind::Bytes => get::<Vec<u8>>(row, idx).map(|v| value::bytes(&v)),
        ColumnKind::Array(element) => decode_array(row, idx, element),
        ColumnKind::Interval => get::<PgInterval>(row, idx)
            .map(|v| value::interval(v.months, v.days, v.microseconds)),
        ColumnKind::Oid => get::<Oid>(row, idx).map(|v| Scalar::Int(v.0.into())),
        ColumnKind::Money => {
            get::<PgMoney>(row, idx).map(|v| value::decimal(&v.to_bigdecimal(2)))
        }
        ColumnKind::Label => row
            .try_get_raw(idx)
            .ok()
            .and_then(|raw| raw.as_str().ok())
            .map(Scalar::from),
        ColumnKind::Other => None,
    };

    decoded.unwrap_or_else(|| fallback(row, idx, column))
}

fn array<T>(row: &PgRow, idx: usize, convert: impl Fn(T) -> Scalar) -> Option<Scalar>
where
    Vec<Option<T>>: for<'r> Decode<'r, Postgres> + Type<Postgres>,
{
    get::<Vec<Option<T>>>(row, idx).map(|items| {
        value::list(
            items
                .into_iter()
                .map(|item| item.map_or(Scalar::Null, &convert)),
        )
    })
}

fn decode_array(row: &PgRow, idx: usize, element: ArrayElement) -> Option<Scalar> {
    match element {
        ArrayElement::Bool => array::<bool>(row, idx, Scalar::Bool),
        ArrayElement::Int16 => array::<i16>(row, idx, |v| Scalar::Int(v.into())),
        ArrayElement::Int32 => array::<i32>(row, idx, |v| Scalar::Int(v.into())),
        ArrayElement::Int64 => array::<i64>(row, idx, Scalar::Int),
        ArrayElement::Float32 => array::<f32>(row, idx, |v| value::float(v.into())),
        ArrayElement::Float64 => array::<f64>(row, idx, value::float),
        ArrayElement::Decimal => array::<BigDecimal>(row, idx, |v| value::decimal(&v)),
        ArrayElement::Text => array::<String>(row, idx, Scalar::Text),
        ArrayElement::Uuid => array::<Uuid>(row, idx, |v| Scalar::Text(v.to_string())),
        ArrayElement::Date => array::<NaiveDate>(row, idx, value::date),
        ArrayElement::DateTime => array::<NaiveDateTime>(row, idx, value::datetime),
        ArrayElement::DateTimeTz => array::<DateTime<Utc>>(row, idx, value::datetime_tz),
    }
}

fn fallback(row: &PgRow, idx: usize, column: &str) -> Scalar {
    get::<String>(row, idx)
        .map(Scalar::Text)
        .or_else(|| get::<i64>(row, idx).map(Scalar::Int))
        .or_else(|| get::<f64>(row, idx).map(value::float))
        .or_else(|| get::<Vec<u8>>(row, idx).map(|v| value::bytes(&v)))
        .unwrap_or_else(|| {
            let type_name = row
                .columns()
                .get(idx)
                .map_or("unknown", |c| c.type_info().name());
            match row.try_get_raw(idx).ok().and_then(|raw| raw.as_bytes().ok()) {
                Some(bytes) => {
                    debug!(column, %type_name, "Emitting raw column value");
                    value::raw(bytes)
                }
                None => {
                    warn!(column, %type_name, "Unreadable column value, emitting null");
                    Scalar::Null
                }
            }
        })
}
