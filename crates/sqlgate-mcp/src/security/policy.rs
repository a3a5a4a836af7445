//! Static allow/deny policy for caller-supplied SQL

use std::collections::{BTreeSet, HashSet};

use crate::{Error, Result};

pub const DEFAULT_ALLOWED_TABLES: &[&str] = &["sales", "users", "products", "orders"];

pub const DEFAULT_ALLOWED_COLUMNS: &[&str] = &[
    "id",
    "name",
    "email",
    "product_name",
    "sale_amount",
    "order_date",
    "customer_id",
    "created_at",
    "status",
];

/// Matched as plain substrings of the lower-cased query, in this order.
pub const DEFAULT_FORBIDDEN_KEYWORDS: &[&str] = &[
    "drop",
    "delete",
    "update",
    "insert",
    "create",
    "alter",
    "exec",
    "execute",
    "union",
    "load_file",
    "information_schema",
    "pg_",
    "mysql.",
    "sqlite_",
    "sys.",
    "schema",
    "table",
];

/// Allowed tables, allowed columns and forbidden keywords.
///
/// All entries are lower-cased on construction. Keyword order is kept as
/// given (duplicates dropped) so the first reported match is stable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    allowed_tables: HashSet<String>,
    allowed_columns: HashSet<String>,
    forbidden_keywords: Vec<String>,
}

impl Policy {
    pub fn new<T, C, K>(tables: T, columns: C, keywords: K) -> Result<Self>
    where
        T: IntoIterator,
        T::Item: AsRef<str>,
        C: IntoIterator,
        C::Item: AsRef<str>,
        K: IntoIterator,
        K::Item: AsRef<str>,
    {
        let allowed_tables = normalize_set(tables);
        if allowed_tables.is_empty() {
            return Err(Error::Config(
                "policy requires at least one allowed table".into(),
            ));
        }

        let mut forbidden_keywords: Vec<String> = Vec::new();
        for kw in keywords {
            let kw = kw.as_ref().trim().to_lowercase();
            if !kw.is_empty() && !forbidden_keywords.contains(&kw) {
                forbidden_keywords.push(kw);
            }
        }

        Ok(Self {
            allowed_tables,
            allowed_columns: normalize_set(columns),
            forbidden_keywords,
        })
    }

    pub fn is_table_allowed(&self, table: &str) -> bool {
        self.allowed_tables.contains(&table.to_lowercase())
    }

    pub fn is_column_allowed(&self, column: &str) -> bool {
        self.allowed_columns.contains(&column.to_lowercase())
    }

    pub fn forbidden_keywords(&self) -> &[String] {
        &self.forbidden_keywords
    }

    /// Allowed tables in sorted order
    pub fn allowed_tables(&self) -> BTreeSet<&str> {
        self.allowed_tables.iter().map(String::as_str).collect()
    }

    /// Allowed columns in sorted order
    pub fn allowed_columns(&self) -> BTreeSet<&str> {
        self.allowed_columns.iter().map(String::as_str).collect()
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            allowed_tables: normalize_set(DEFAULT_ALLOWED_TABLES),
            allowed_columns: normalize_set(DEFAULT_ALLOWED_COLUMNS),
            forbidden_keywords: DEFAULT_FORBIDDEN_KEYWORDS
                .iter()
                .map(|kw| (*kw).to_string())
                .collect(),
        }
    }
}

fn normalize_set<I>(items: I) -> HashSet<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| s.as_ref().trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Split a comma-separated list as used by env vars and CLI flags
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}
