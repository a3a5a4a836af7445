//! Query policy and validation

mod policy;
mod validator;

pub use policy::{
    DEFAULT_ALLOWED_COLUMNS, DEFAULT_ALLOWED_TABLES, DEFAULT_FORBIDDEN_KEYWORDS, Policy, parse_list,
};
pub use validator::{KeywordValidator, SqlValidator, ValidationOutcome, first_from_table, validate};
