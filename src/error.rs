use thiserror::Error;

use crate::query::SqlValue;

/// Failure of a repository or service operation.
///
/// Every public operation returns one of these; nothing is retried or
/// swallowed on the way up.
#[derive(Debug, Error)]
pub enum RepoError {
    /// A stored value could not be coerced to the declared column kind.
    #[error("cannot decode column `{column}`: {message}")]
    Decode { column: String, message: String },

    /// The addressed id does not exist.
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// The store (or pre-write validation) rejected a write.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// I/O or driver failure talking to the store.
    #[error("database connectivity error: {0}")]
    Connectivity(String),

    /// A sort key does not name a column of the queried table.
    #[error("cannot sort {table} by unknown field `{field}`")]
    InvalidSort { table: &'static str, field: String },
}

impl RepoError {
    pub fn decode(column: &str, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.to_string(),
            message: message.into(),
        }
    }

    pub fn missing_column(column: &str) -> Self {
        Self::decode(column, "column not present in result set")
    }

    pub fn type_mismatch(column: &str, expected: &str, found: &SqlValue) -> Self {
        Self::decode(
            column,
            format!("expected {expected}, found {}", found.type_name()),
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

fn is_constraint_state(code: &str) -> bool {
    // 22xxx data exception (e.g. value too long), 23xxx integrity violation
    code.starts_with("22") || code.starts_with("23")
}

impl From<tokio_postgres::Error> for RepoError {
    fn from(err: tokio_postgres::Error) -> Self {
        match err.as_db_error() {
            Some(db) if is_constraint_state(db.code().code()) => {
                Self::ConstraintViolation(db.message().to_string())
            }
            _ => Self::Connectivity(err.to_string()),
        }
    }
}

const MSSQL_CONSTRAINT_CODES: &[u32] = &[515, 547, 2601, 2627, 2628, 8152];

impl From<tiberius::error::Error> for RepoError {
    fn from(err: tiberius::error::Error) -> Self {
        match &err {
            tiberius::error::Error::Server(token) if MSSQL_CONSTRAINT_CODES.contains(&token.code()) => {
                Self::ConstraintViolation(token.message().to_string())
            }
            _ => Self::Connectivity(err.to_string()),
        }
    }
}
