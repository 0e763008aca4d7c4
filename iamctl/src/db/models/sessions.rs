use chrono::{DateTime, Utc};

use crate::types::EmployeeId;

/// The single active refresh-token record of an employee.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SessionDBResponse {
    pub emp_id: EmployeeId,
    /// SHA-256 digest of the refresh token, base64url encoded
    pub token_digest: String,
    pub created_at: DateTime<Utc>,
}
