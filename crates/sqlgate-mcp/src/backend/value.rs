//! Cell normalization shared by the sqlx backends
//!
//! Each result column is classified once from its reported type name into a
//! [`ColumnKind`]; every cell in that column is then decoded through the same
//! conversion.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use num_traits::ToPrimitive;

use crate::types::Scalar;

/// Conversion selected for a result column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt64,
    Float32,
    Float64,
    Decimal,
    Text,
    Date,
    Time,
    DateTime,
    DateTimeTz,
    Uuid,
    Json,
    Bytes,
    /// One-dimensional PostgreSQL array, emitted as a JSON array
    Array(ArrayElement),
    Interval,
    Oid,
    Money,
    /// PostgreSQL enum; the label is read from the raw value
    Label,
    /// Unrecognized type; decoded by trying text, numbers and bytes in turn
    Other,
}

/// Element types of the arrays decoded natively
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayElement {
    Bool,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Decimal,
    Text,
    Uuid,
    Date,
    DateTime,
    DateTimeTz,
}

impl ArrayElement {
    const fn from_kind(kind: ColumnKind) -> Option<Self> {
        Some(match kind {
            ColumnKind::Bool => Self::Bool,
            ColumnKind::Int16 => Self::Int16,
            ColumnKind::Int32 => Self::Int32,
            ColumnKind::Int64 => Self::Int64,
            ColumnKind::Float32 => Self::Float32,
            ColumnKind::Float64 => Self::Float64,
            ColumnKind::Decimal => Self::Decimal,
            ColumnKind::Text => Self::Text,
            ColumnKind::Uuid => Self::Uuid,
            ColumnKind::Date => Self::Date,
            ColumnKind::DateTime => Self::DateTime,
            ColumnKind::DateTimeTz => Self::DateTimeTz,
            _ => return None,
        })
    }
}

impl ColumnKind {
    /// Classify a PostgreSQL type name as reported by sqlx
    #[must_use]
    pub fn postgres(type_name: &str) -> Self {
        let upper = type_name.to_uppercase();
        if let Some(element) = upper.strip_suffix("[]") {
            return ArrayElement::from_kind(Self::postgres(element))
                .map_or(Self::Other, Self::Array);
        }

        match upper.as_str() {
            "BOOL" => Self::Bool,
            "\"CHAR\"" => Self::Int8,
            "INT2" => Self::Int16,
            "INT4" => Self::Int32,
            "INT8" => Self::Int64,
            "FLOAT4" => Self::Float32,
            "FLOAT8" => Self::Float64,
            "NUMERIC" => Self::Decimal,
            "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" | "CITEXT" => Self::Text,
            "DATE" => Self::Date,
            "TIME" => Self::Time,
            "TIMESTAMP" => Self::DateTime,
            "TIMESTAMPTZ" => Self::DateTimeTz,
            "UUID" => Self::Uuid,
            "JSON" | "JSONB" => Self::Json,
            "BYTEA" => Self::Bytes,
            "INTERVAL" => Self::Interval,
            "OID" => Self::Oid,
            "MONEY" => Self::Money,
            _ => Self::Other,
        }
    }

    /// Classify a MySQL type name as reported by sqlx
    #[must_use]
    pub fn mysql(type_name: &str) -> Self {
        let upper = type_name.to_uppercase();
        let unsigned = upper.ends_with(" UNSIGNED");
        let base = upper.trim_end_matches(" UNSIGNED");

        match base {
            "BOOLEAN" => Self::Bool,
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" if unsigned => Self::UInt64,
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => Self::Int64,
            "FLOAT" => Self::Float32,
            "DOUBLE" => Self::Float64,
            "DECIMAL" => Self::Decimal,
            "VARCHAR" | "CHAR" | "TEXT" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM"
            | "SET" => Self::Text,
            "DATE" => Self::Date,
            "TIME" => Self::Time,
            "DATETIME" => Self::DateTime,
            "TIMESTAMP" => Self::DateTimeTz,
            "JSON" => Self::Json,
            "BINARY" | "VARBINARY" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
                Self::Bytes
            }
            _ => Self::Other,
        }
    }
}

/// Exact decimals become floats; out-of-range values keep their text form
pub fn decimal(value: &BigDecimal) -> Scalar {
    value
        .to_f64()
        .filter(|f| f.is_finite())
        .map_or_else(|| Scalar::Text(value.to_string()), Scalar::Float)
}

pub fn float(value: f64) -> Scalar {
    if value.is_finite() {
        Scalar::Float(value)
    } else {
        Scalar::Text(value.to_string())
    }
}

pub fn bytes(value: &[u8]) -> Scalar {
    Scalar::Text(BASE64.encode(value))
}

/// Undecodable value: UTF-8 text as-is, anything else as base64
pub fn raw(value: &[u8]) -> Scalar {
    std::str::from_utf8(value).map_or_else(|_| bytes(value), Scalar::from)
}

pub fn list(items: impl IntoIterator<Item = Scalar>) -> Scalar {
    Scalar::Json(serde_json::Value::Array(
        items.into_iter().map(serde_json::Value::from).collect(),
    ))
}

/// Interval in PostgreSQL's default output style, e.g. `1 year 2 mons 3 days 04:05:06.5`
pub fn interval(months: i32, days: i32, microseconds: i64) -> Scalar {
    fn unit(parts: &mut Vec<String>, value: i64, name: &str) {
        if value != 0 {
            let plural = if value == 1 { "" } else { "s" };
            parts.push(format!("{value} {name}{plural}"));
        }
    }

    let mut parts = Vec::new();
    unit(&mut parts, i64::from(months / 12), "year");
    unit(&mut parts, i64::from(months % 12), "mon");
    unit(&mut parts, i64::from(days), "day");

    if microseconds != 0 || parts.is_empty() {
        let sign = if microseconds < 0 { "-" } else { "" };
        let total = microseconds.unsigned_abs();
        let hours = total / 3_600_000_000;
        let minutes = total / 60_000_000 % 60;
        let seconds = total / 1_000_000 % 60;
        let fraction = total % 1_000_000;

        let mut clock = format!("{sign}{hours:02}:{minutes:02}:{seconds:02}");
        if fraction > 0 {
            let digits = format!("{fraction:06}");
            clock.push('.');
            clock.push_str(digits.trim_end_matches('0'));
        }
        parts.push(clock);
    }

    Scalar::Text(parts.join(" "))
}

pub fn date(value: NaiveDate) -> Scalar {
    Scalar::Text(value.format("%Y-%m-%d").to_string())
}

pub fn time(value: NaiveTime) -> Scalar {
    Scalar::Text(value.format("%H:%M:%S%.f").to_string())
}

pub fn datetime(value: NaiveDateTime) -> Scalar {
    Scalar::Text(value.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
}

pub fn datetime_tz(value: DateTime<Utc>) -> Scalar {
    Scalar::Text(value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_postgres_column_kinds() {
        assert_eq!(ColumnKind::postgres("INT4"), ColumnKind::Int32);
        assert_eq!(ColumnKind::postgres("int8"), ColumnKind::Int64);
        assert_eq!(ColumnKind::postgres("NUMERIC"), ColumnKind::Decimal);
        assert_eq!(ColumnKind::postgres("VARCHAR"), ColumnKind::Text);
        assert_eq!(ColumnKind::postgres("TIMESTAMPTZ"), ColumnKind::DateTimeTz);
        assert_eq!(ColumnKind::postgres("JSONB"), ColumnKind::Json);
        assert_eq!(ColumnKind::postgres("BYTEA"), ColumnKind::Bytes);
        assert_eq!(ColumnKind::postgres("INTERVAL"), ColumnKind::Interval);
        assert_eq!(ColumnKind::postgres("OID"), ColumnKind::Oid);
        assert_eq!(ColumnKind::postgres("MONEY"), ColumnKind::Money);
        assert_eq!(ColumnKind::postgres("INET"), ColumnKind::Other);
    }

    #[test]
    fn test_postgres_array_kinds() {
        assert_eq!(
            ColumnKind::postgres("INT4[]"),
            ColumnKind::Array(ArrayElement::Int32)
        );
        assert_eq!(
            ColumnKind::postgres("TEXT[]"),
            ColumnKind::Array(ArrayElement::Text)
        );
        assert_eq!(
            ColumnKind::postgres("varchar[]"),
            ColumnKind::Array(ArrayElement::Text)
        );
        assert_eq!(
            ColumnKind::postgres("NUMERIC[]"),
            ColumnKind::Array(ArrayElement::Decimal)
        );
        assert_eq!(
            ColumnKind::postgres("TIMESTAMPTZ[]"),
            ColumnKind::Array(ArrayElement::DateTimeTz)
        );
        assert_eq!(ColumnKind::postgres("JSONB[]"), ColumnKind::Other);
        assert_eq!(ColumnKind::postgres("INTERVAL[]"), ColumnKind::Other);
    }

    #[test]
    fn test_raw_value_text_or_base64() {
        assert_eq!(raw(b"shipped"), Scalar::Text("shipped".into()));
        assert_eq!(raw(&[0xff, 0x00]), Scalar::Text("/wA=".into()));
    }

    #[test]
    fn test_list_is_json_array() {
        let value = list([Scalar::Int(1), Scalar::Null, Scalar::from("a")]);
        assert_eq!(value, Scalar::Json(serde_json::json!([1, null, "a"])));
    }

    #[test]
    fn test_interval_formatting() {
        let micros = 4 * 3_600_000_000 + 5 * 60_000_000 + 6_500_000;
        assert_eq!(
            interval(14, 3, micros),
            Scalar::Text("1 year 2 mons 3 days 04:05:06.5".into())
        );
        assert_eq!(interval(0, 1, 0), Scalar::Text("1 day".into()));
        assert_eq!(interval(0, 0, 0), Scalar::Text("00:00:00".into()));
        assert_eq!(
            interval(0, 0, -3_600_000_000),
            Scalar::Text("-01:00:00".into())
        );
        assert_eq!(interval(-2, 0, 0), Scalar::Text("-2 mons".into()));
    }

    #[test]
    fn test_mysql_column_kinds() {
        assert_eq!(ColumnKind::mysql("INT"), ColumnKind::Int64);
        assert_eq!(ColumnKind::mysql("BIGINT UNSIGNED"), ColumnKind::UInt64);
        assert_eq!(ColumnKind::mysql("BOOLEAN"), ColumnKind::Bool);
        assert_eq!(ColumnKind::mysql("DECIMAL"), ColumnKind::Decimal);
        assert_eq!(ColumnKind::mysql("LONGTEXT"), ColumnKind::Text);
        assert_eq!(ColumnKind::mysql("DATETIME"), ColumnKind::DateTime);
        assert_eq!(ColumnKind::mysql("BLOB"), ColumnKind::Bytes);
        assert_eq!(ColumnKind::mysql("YEAR"), ColumnKind::Other);
    }

    #[test]
    fn test_decimal_to_float() {
        let value = BigDecimal::from_str("10.50").unwrap();
        assert_eq!(decimal(&value), Scalar::Float(10.5));
    }

    #[test]
    fn test_non_finite_float_kept_as_text() {
        assert_eq!(float(f64::NAN), Scalar::Text("NaN".into()));
        assert_eq!(float(2.25), Scalar::Float(2.25));
    }

    #[test]
    fn test_bytes_base64() {
        assert_eq!(bytes(b"hi"), Scalar::Text("aGk=".into()));
    }

    #[test]
    fn test_temporal_iso_strings() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(date(d), Scalar::Text("2024-03-09".into()));

        let dt = d.and_hms_opt(14, 5, 0).unwrap();
        assert_eq!(datetime(dt), Scalar::Text("2024-03-09T14:05:00".into()));
        assert_eq!(
            datetime_tz(dt.and_utc()),
            Scalar::Text("2024-03-09T14:05:00Z".into())
        );

        let t = NaiveTime::from_hms_opt(8, 30, 15).unwrap();
        assert_eq!(time(t), Scalar::Text("08:30:15".into()));
    }
}
