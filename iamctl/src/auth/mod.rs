//! Authentication and authorization.
//!
//! # Authentication
//!
//! Browser clients authenticate with two http-only cookies:
//!
//! - `accessToken`: short-lived JWT carrying the [`Principal`]. Verified without touching
//!   the store.
//! - `refreshToken`: longer-lived JWT. Only valid while it matches the employee's single
//!   stored session ([`sessions`]), so deleting the session revokes it immediately.
//!
//! [`middleware::authenticate`] runs in front of every `/api/v1` route. It tries the access
//! cookie first and falls back to the refresh cookie, in which case the principal is rebuilt
//! from the live employee record and a new access cookie is attached to the response.
//!
//! # Authorization
//!
//! Routes declare their allowed roles with [`authorization::RequiresRole`] and a policy
//! marker type. Department Managers are additionally scoped to the department they manage;
//! that check re-reads the department on every request.
//!
//! # Modules
//!
//! - [`authorization`]: role policies, the scoped department check and the extractor
//! - [`cookies`]: reading and writing the token cookies
//! - [`current_user`]: extractor for the authenticated [`Principal`]
//! - [`middleware`]: the authentication layer
//! - [`password`]: Argon2id hashing and credential generation
//! - [`sessions`]: the one-session-per-employee refresh store
//! - [`tokens`]: JWT and reset token issuance

pub mod authorization;
pub mod cookies;
pub mod current_user;
pub mod middleware;
pub mod password;
pub mod sessions;
pub mod tokens;

use serde::Serialize;

use crate::db::models::users::UserDBResponse;
use crate::types::{DepartmentId, EmployeeId, RoleId};

/// The authenticated actor of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub emp_id: EmployeeId,
    pub name: String,
    pub role: String,
    pub role_id: RoleId,
    pub department_id: DepartmentId,
}

impl From<&UserDBResponse> for Principal {
    fn from(user: &UserDBResponse) -> Self {
        Self {
            emp_id: user.id,
            name: user.full_name(),
            role: user.role.clone(),
            role_id: user.role_id,
            department_id: user.department_id,
        }
    }
}
