//! Read-only query validation
//!
//! The default [`KeywordValidator`] is a prefix/substring heuristic, not a
//! parser. It does not look inside string literals, comments, subqueries or
//! additional statements: a keyword inside a literal is still blocked, and
//! only the first `FROM <identifier>` is checked against the table allowlist.

use std::fmt::Debug;

use super::Policy;
use crate::Error;
use crate::error::Rejection;

/// Result of validating a raw query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// The query may run; carries the SQL to execute
    Accepted(String),
    Rejected(Rejection),
}

impl ValidationOutcome {
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    pub fn into_result(self) -> Result<String, Error> {
        match self {
            Self::Accepted(sql) => Ok(sql),
            Self::Rejected(reason) => Err(Error::Rejected(reason)),
        }
    }
}

/// Strategy deciding whether a query may run under a policy
pub trait SqlValidator: Send + Sync + Debug {
    fn validate(&self, sql: &str, policy: &Policy) -> ValidationOutcome;
}

/// Prefix, forbidden-substring and first-`FROM` table check
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordValidator;

impl SqlValidator for KeywordValidator {
    fn validate(&self, sql: &str, policy: &Policy) -> ValidationOutcome {
        let lowered = sql.trim().to_lowercase();

        if !lowered.starts_with("select") {
            return ValidationOutcome::Rejected(Rejection::NotSelect);
        }

        if let Some(kw) = policy
            .forbidden_keywords()
            .iter()
            .find(|kw| lowered.contains(kw.as_str()))
        {
            return ValidationOutcome::Rejected(Rejection::ForbiddenKeyword(kw.clone()));
        }

        if let Some(table) = first_from_table(&lowered)
            && !policy.is_table_allowed(table)
        {
            return ValidationOutcome::Rejected(Rejection::TableNotAllowed(table.to_string()));
        }

        ValidationOutcome::Accepted(sql.to_string())
    }
}

/// Find the identifier after the first word-bounded `from` followed by whitespace.
///
/// Expects lower-cased input. Identifiers are ASCII `[a-z_][a-z0-9_]*`.
pub fn first_from_table(lowered: &str) -> Option<&str> {
    const KEYWORD: &str = "from";

    let mut offset = 0;
    while let Some(pos) = lowered[offset..].find(KEYWORD) {
        let start = offset + pos;
        offset = start + KEYWORD.len();

        let bounded = lowered[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !is_word_char(c));
        if !bounded {
            continue;
        }

        let rest = &lowered[offset..];
        let ident_start = rest.trim_start();
        if ident_start.len() == rest.len() {
            continue;
        }

        let ident_len = ident_start
            .char_indices()
            .take_while(|&(i, c)| {
                c == '_' || c.is_ascii_lowercase() || (i > 0 && c.is_ascii_digit())
            })
            .count();
        if ident_len > 0 {
            return Some(&ident_start[..ident_len]);
        }
    }

    None
}

fn is_word_char(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

/// Validate with the default strategy
pub fn validate(sql: &str, policy: &Policy) -> ValidationOutcome {
    KeywordValidator.validate(sql, policy)
}
