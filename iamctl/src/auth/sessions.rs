//! One refresh session per employee.
//!
//! ```text
//! NoSession --login--> Active --login--> Active' (previous token superseded)
//!                        |
//!                        +--logout / password change / reset / failed refresh--> NoSession
//! ```
//!
//! Only the SHA-256 digest of the refresh token is stored. Concurrent logins resolve
//! last-writer-wins; the loser's token fails its next refresh because its digest is gone.

use tracing::{debug, instrument};

use crate::{
    auth::tokens::token_digest,
    db::{Store, models::sessions::SessionDBResponse},
    errors::Result,
    types::{EmployeeId, abbrev_uuid},
};

/// Replace any session of `emp_id` with one for `refresh_token`.
#[instrument(skip(store, refresh_token), fields(emp_id = %abbrev_uuid(&emp_id)), err)]
pub async fn create(store: &dyn Store, emp_id: EmployeeId, refresh_token: &str) -> Result<SessionDBResponse> {
    let session = store.replace_session(emp_id, &token_digest(refresh_token)).await?;
    debug!("Session created");
    Ok(session)
}

/// The stored session, if it was created for exactly this refresh token.
#[instrument(skip(store, refresh_token), fields(emp_id = %abbrev_uuid(&emp_id)), err)]
pub async fn find_active(store: &dyn Store, emp_id: EmployeeId, refresh_token: &str) -> Result<Option<SessionDBResponse>> {
    let digest = token_digest(refresh_token);
    let session = store.get_session(emp_id).await?;
    Ok(session.filter(|s| s.token_digest == digest))
}

/// Delete the session of `emp_id`. Idempotent; returns whether a session existed.
#[instrument(skip(store), fields(emp_id = %abbrev_uuid(&emp_id)), err)]
pub async fn revoke(store: &dyn Store, emp_id: EmployeeId) -> Result<bool> {
    Ok(store.delete_session(emp_id).await?)
}
