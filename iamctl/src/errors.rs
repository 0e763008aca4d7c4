use crate::db::errors::DbError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::fmt;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Authentication required but not provided, or the principal may not perform the action
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Conflict error, e.g., for unique constraint violations
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Outbound mail could not be delivered
    #[error("Mail delivery failed: {message}")]
    Mail { message: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),

    /// A step that runs after the primary mutation failed. The mutation itself stays committed.
    #[error("{stage} step failed after commit: {source}")]
    Incomplete { stage: CommitStage, source: Box<Error> },
}

/// Side-effect stages that run after a mutation has been persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitStage {
    /// Revoking sessions and reset tokens tied to a changed or removed account
    Credentials,
    Membership,
    Audit,
    Mail,
}

impl fmt::Display for CommitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitStage::Credentials => write!(f, "credentials"),
            CommitStage::Membership => write!(f, "membership"),
            CommitStage::Audit => write!(f, "audit"),
            CommitStage::Mail => write!(f, "mail"),
        }
    }
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Conflict { .. } => StatusCode::CONFLICT,
            Error::Mail { .. } => StatusCode::BAD_GATEWAY,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DbError::ProtectedEntity { .. } => StatusCode::FORBIDDEN,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Incomplete { stage, .. } => match stage {
                CommitStage::Mail => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "Authentication required".to_string()),
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { resource, .. } => format!("No such {resource} exists"),
            Error::Conflict { message } => message.clone(),
            Error::Mail { .. } => "Email could not be delivered".to_string(),
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { constraint, table, .. } => unique_violation_message(table.as_deref(), constraint.as_deref()),
                DbError::ProtectedEntity {
                    operation,
                    entity_type,
                    reason,
                    ..
                } => format!("Cannot {operation} {entity_type}: {reason}"),
                DbError::Other(_) => "Database error occurred".to_string(),
            },
            Error::Other(_) => "Internal server error".to_string(),
            Error::Incomplete { stage, .. } => match stage {
                CommitStage::Credentials => "Change saved, but existing sessions or reset links could not be revoked".to_string(),
                CommitStage::Membership => "Change saved, but membership records could not be updated".to_string(),
                CommitStage::Audit => "Change saved, but the audit record could not be written".to_string(),
                CommitStage::Mail => "Change saved, but the email could not be delivered".to_string(),
            },
        }
    }
}

fn unique_violation_message(table: Option<&str>, constraint: Option<&str>) -> String {
    match (table, constraint) {
        (Some("users"), Some(c)) if c.contains("email") || c.contains("username") => {
            "An employee with this email address already exists".to_string()
        }
        (Some("roles"), _) => "A role with this name already exists".to_string(),
        (Some("departments"), _) => "A department with this name already exists".to_string(),
        (Some("permissions"), _) => "A permission with this name already exists".to_string(),
        _ => "Resource already exists".to_string(),
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::Other(_)) | Error::Internal { .. } | Error::Other(_) | Error::Mail { .. } => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Database(_) => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::Incomplete { .. } => {
                tracing::warn!("Post-commit failure: {:#}", self);
            }
            Error::Unauthenticated { .. } => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::BadRequest { .. } | Error::NotFound { .. } | Error::Conflict { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();

        match &self {
            // Post-commit failures tell the caller the mutation went through
            Error::Incomplete { stage, .. } => {
                let body = serde_json::json!({
                    "message": self.user_message(),
                    "committed": true,
                    "stage": stage,
                });
                (status, axum::response::Json(body)).into_response()
            }
            Error::Conflict { message } => {
                let body = serde_json::json!({ "message": message });
                (status, axum::response::Json(body)).into_response()
            }
            Error::Database(DbError::UniqueViolation { table, .. }) => {
                let body = serde_json::json!({
                    "message": self.user_message(),
                    "resource": table.as_deref().unwrap_or("unknown"),
                });
                (status, axum::response::Json(body)).into_response()
            }
            _ => (status, self.user_message()).into_response(),
        }
    }
}

/// Convert from String errors (e.g., from external functions)
impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Internal { operation: msg }
    }
}

/// Collects the results of the side-effect stages that follow a committed mutation.
///
/// Every stage is attempted even if an earlier one failed; [`PostCommit::finish`] reports the
/// first failure as [`Error::Incomplete`].
#[derive(Debug, Default)]
pub struct PostCommit {
    failure: Option<Error>,
}

impl PostCommit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one stage, returning the value on success.
    pub fn record<T>(&mut self, stage: CommitStage, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(%stage, error = %e, "Post-commit stage failed");
                if self.failure.is_none() {
                    self.failure = Some(Error::Incomplete {
                        stage,
                        source: Box::new(e),
                    });
                }
                None
            }
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failure.is_none()
    }

    pub fn finish(self) -> Result<()> {
        match self.failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Operation;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::Unauthenticated { message: None }.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            Error::NotFound {
                resource: "Employee".to_string(),
                id: "x".to_string()
            }
            .status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(Error::Database(DbError::duplicate("roles", "name", "Admin")).status_code(), StatusCode::CONFLICT);
        assert_eq!(
            Error::Database(DbError::ProtectedEntity {
                operation: Operation::Delete,
                reason: "built-in role".to_string(),
                entity_type: "role".to_string(),
                entity_id: None,
            })
            .status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_not_found_message() {
        let err = Error::NotFound {
            resource: "Employee".to_string(),
            id: "abc".to_string(),
        };
        assert_eq!(err.user_message(), "No such Employee exists");
    }

    #[test]
    fn test_unique_violation_messages() {
        let err = Error::Database(DbError::duplicate("users", "email", "a@x.com"));
        assert_eq!(err.user_message(), "An employee with this email address already exists");
        let err = Error::Database(DbError::duplicate("departments", "name", "Sales"));
        assert_eq!(err.user_message(), "A department with this name already exists");
    }

    #[test]
    fn test_post_commit_reports_first_failure() {
        let mut post = PostCommit::new();
        assert_eq!(post.record(CommitStage::Membership, Ok::<_, Error>(1)), Some(1));
        assert!(post.is_clean());

        let audit: Result<()> = Err(Error::Internal {
            operation: "write audit".to_string(),
        });
        assert!(post.record(CommitStage::Audit, audit).is_none());

        let mail: Result<()> = Err(Error::Mail {
            message: "smtp down".to_string(),
        });
        post.record(CommitStage::Mail, mail);

        match post.finish() {
            Err(Error::Incomplete { stage, .. }) => assert_eq!(stage, CommitStage::Audit),
            other => panic!("expected incomplete audit error, got {other:?}"),
        }
    }

    #[test]
    fn test_incomplete_status() {
        let err = Error::Incomplete {
            stage: CommitStage::Mail,
            source: Box::new(Error::Mail {
                message: "refused".to_string(),
            }),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);

        let err = Error::Incomplete {
            stage: CommitStage::Membership,
            source: Box::new(Error::Database(DbError::NotFound)),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
