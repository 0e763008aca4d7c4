//! HTTP request handlers.
//!
//! - [`auth`]: login, logout, token refresh, profile and password management (`/auth`)
//! - [`users`]: employee directory (`/api/v1/users`)
//! - [`roles`], [`permissions`], [`departments`]: the rest of the directory
//! - [`audit_logs`]: read side of the audit trail
//! - [`integrity`]: on-demand reconciliation of the membership caches
//!
//! Handlers authorize with [`crate::auth::authorization::RequiresRole`] and return
//! [`crate::errors::Error`], which renders the status code and message. Mutations run their
//! follow-up steps (membership propagation, audit, mail) through
//! [`crate::errors::PostCommit`] so that a late failure is reported as committed.

pub mod audit_logs;
pub mod auth;
pub mod departments;
pub mod integrity;
pub mod permissions;
pub mod roles;
pub mod users;

/// Trim an optional field, treating blank input as absent.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
