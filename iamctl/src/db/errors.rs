use crate::types::Operation;
use thiserror::Error;

/// Unified error type for store operations that application code can handle
#[derive(Error, Debug)]
pub enum DbError {
    /// Entity not found by the given identifier
    #[error("Entity not found")]
    NotFound,

    /// Unique constraint violation
    #[error("Unique constraint violation")]
    UniqueViolation {
        constraint: Option<String>,
        table: Option<String>,
        message: String,
    },

    /// Entity cannot be modified or deleted due to protection rules
    #[error("{operation} cannot be applied to entity of type {entity_type}: {reason}")]
    ProtectedEntity {
        operation: Operation,
        reason: String,
        entity_type: String,
        entity_id: Option<String>,
    },

    /// Catch-all for non-recoverable errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convert from sqlx::Error using proper sqlx error categorization
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DbError::NotFound,
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => DbError::UniqueViolation {
                constraint: db_err.constraint().map(|s| s.to_string()),
                table: db_err.table().map(|s| s.to_string()),
                message: db_err.message().to_string(),
            },
            // All other sqlx errors are non-recoverable - convert to anyhow with context
            _ => DbError::Other(anyhow::Error::from(err)),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::Other(anyhow::Error::from(err))
    }
}

impl DbError {
    /// Build the unique violation the in-memory store reports for a taken value.
    pub fn duplicate(table: &str, column: &str, value: &str) -> Self {
        DbError::UniqueViolation {
            constraint: Some(format!("{table}_{column}_key")),
            table: Some(table.to_string()),
            message: format!("duplicate key value violates unique constraint: {column}={value}"),
        }
    }
}

/// Type alias for store operation results
pub type Result<T> = std::result::Result<T, DbError>;
