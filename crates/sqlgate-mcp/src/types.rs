//! Transport-neutral result types and tool parameters

use schemars::JsonSchema;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};

/// A single normalized cell value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Json(serde_json::Value),
}

impl Scalar {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Scalar {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl From<Scalar> for serde_json::Value {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::Null => Self::Null,
            Scalar::Bool(b) => Self::Bool(b),
            Scalar::Int(i) => i.into(),
            Scalar::UInt(u) => u.into(),
            Scalar::Float(f) => serde_json::Number::from_f64(f).map_or(Self::Null, Self::Number),
            Scalar::Text(s) => Self::String(s),
            Scalar::Json(v) => v,
        }
    }
}

/// Tabular query output in backend cursor order.
///
/// Every row holds exactly one value per column, in column order. Rows
/// serialize as JSON objects whose keys follow the column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    columns: Vec<String>,
    rows: Vec<Vec<Scalar>>,
}

impl ResultSet {
    /// Build a result set, padding or truncating rows to the column count
    #[must_use]
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Scalar>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Scalar::Null);
                row
            })
            .collect();
        Self { columns, rows }
    }

    #[must_use]
    pub const fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<Scalar>] {
        &self.rows
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether the statement reported any result columns at all
    #[must_use]
    pub const fn has_columns(&self) -> bool {
        !self.columns.is_empty()
    }

    /// Value at `row` for the named column
    #[must_use]
    pub fn get(&self, row: usize, column: &str) -> Option<&Scalar> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(idx)
    }

    pub fn records(&self) -> impl ExactSizeIterator<Item = Record<'_>> {
        self.rows.iter().map(|values| Record {
            columns: &self.columns,
            values,
        })
    }

    /// Rows as a serializable sequence of objects
    #[must_use]
    pub const fn data(&self) -> Records<'_> {
        Records(self)
    }
}

impl Serialize for ResultSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("columns", &self.columns)?;
        map.serialize_entry("rows", &self.data())?;
        map.end()
    }
}

/// One row viewed as column → value
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    columns: &'a [String],
    values: &'a [Scalar],
}

impl<'a> Record<'a> {
    pub fn iter(self) -> impl Iterator<Item = (&'a str, &'a Scalar)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

impl Serialize for Record<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// All rows of a [`ResultSet`] as an ordered sequence of objects
#[derive(Debug, Clone, Copy)]
pub struct Records<'a>(&'a ResultSet);

impl Serialize for Records<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for record in self.0.records() {
            seq.serialize_element(&record)?;
        }
        seq.end()
    }
}

/// Success payload shared by the HTTP and stream adapters: `{data, count}`
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutput {
    result: ResultSet,
}

impl QueryOutput {
    #[must_use]
    pub const fn new(result: ResultSet) -> Self {
        Self { result }
    }

    #[must_use]
    pub const fn count(&self) -> usize {
        self.result.len()
    }

    #[must_use]
    pub const fn result(&self) -> &ResultSet {
        &self.result
    }
}

impl From<ResultSet> for QueryOutput {
    fn from(result: ResultSet) -> Self {
        Self::new(result)
    }
}

impl Serialize for QueryOutput {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("data", &self.result.data())?;
        map.serialize_entry("count", &self.count())?;
        map.end()
    }
}

/// Parameters of the `query_database` tool
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueryParams {
    /// SQL SELECT statement to run
    #[schemars(
        description = "A single SELECT statement over the allowed tables. Use syntax of the underlying database (PostgreSQL or MySQL)"
    )]
    pub sql: String,
}
