//! Database models for password reset tokens.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Database request for storing a reset token digest
#[derive(Debug, Clone)]
pub struct ResetTokenCreateDBRequest {
    pub email: String,
    pub token_digest: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ResetTokenDBResponse {
    pub id: Uuid,
    pub email: String,
    pub token_digest: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ResetTokenDBResponse {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Outcome of an atomic consume attempt.
#[derive(Debug, Clone)]
pub enum ResetTokenConsumption {
    /// The token matched and was live. It and every sibling token for the email are gone.
    Consumed(ResetTokenDBResponse),
    /// The token matched but had expired. It has been purged, siblings are untouched.
    Expired,
    /// No token with this digest exists for the email.
    NotFound,
}
