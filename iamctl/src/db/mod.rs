//! Persistence layer.
//!
//! All access goes through the [`Store`] trait, an async trait made of one sub-trait per
//! collection. Two backends implement it:
//!
//! - [`memory::MemoryStore`]: `DashMap` collections living in the process. Used for local
//!   development and by the HTTP tests.
//! - [`postgres::PostgresStore`]: a `sqlx` pool over PostgreSQL with embedded migrations.
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (api::handlers, integrity, auth)
//! └──────┬──────┘
//!        │  Arc<dyn Store>
//!        ↓
//! ┌─────────────┐
//! │   Store     │  (UserStore + RoleStore + ... + AuditStore)
//! └──────┬──────┘
//!        │
//!   ┌────┴──────┐
//!   ↓           ↓
//! Memory     Postgres
//! ```
//!
//! Role and department records embed denormalized member lists (see
//! [`models::MemberEntry`]). The store only offers primitive, single-call operations on
//! them; keeping them in step with the employee records is the job of
//! [`crate::integrity`].
//!
//! Every multi-step sequence that must not be observed half-done (session replacement,
//! reset-token consumption, membership edits) is a single store call, so a cancelled
//! request either completes it or leaves it untouched.

pub mod errors;
pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::errors::Result;
use crate::db::models::{
    MemberEntry, MembershipOwner, PermissionRef,
    audit_logs::{AuditLogCreateDBRequest, AuditLogDBResponse, AuditLogFilter},
    departments::{DepartmentCreateDBRequest, DepartmentDBResponse, DepartmentFilter, DepartmentUpdateDBRequest},
    permissions::{PermissionCreateDBRequest, PermissionDBResponse, PermissionFilter, PermissionUpdateDBRequest},
    reset_tokens::{ResetTokenConsumption, ResetTokenCreateDBRequest, ResetTokenDBResponse},
    roles::{RoleCreateDBRequest, RoleDBResponse, RoleFilter, RoleUpdateDBRequest},
    sessions::SessionDBResponse,
    users::{UserCreateDBRequest, UserDBResponse, UserFilter, UserUpdateDBRequest},
};
use crate::types::{AuditLogId, DepartmentId, EmployeeId, PermissionId, RoleId};

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert an employee; `username` is set to `email`.
    async fn create_user(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse>;

    async fn get_user(&self, id: EmployeeId) -> Result<Option<UserDBResponse>>;

    async fn get_user_by_username(&self, username: &str) -> Result<Option<UserDBResponse>>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserDBResponse>>;

    /// One page of matching employees plus the total match count.
    async fn list_users(&self, filter: &UserFilter) -> Result<(Vec<UserDBResponse>, i64)>;

    /// Every employee, unpaginated. Used by reconciliation.
    async fn all_users(&self) -> Result<Vec<UserDBResponse>>;

    /// Apply a partial update; an email change also rewrites `username`.
    /// Fails with `NotFound` when the employee does not exist.
    async fn update_user(&self, id: EmployeeId, request: &UserUpdateDBRequest) -> Result<UserDBResponse>;

    async fn delete_user(&self, id: EmployeeId) -> Result<bool>;

    /// Rewrite the redundant role name on every employee holding `role_id`.
    async fn rename_role_on_users(&self, role_id: RoleId, name: &str) -> Result<u64>;

    /// Rewrite the redundant department name on every employee in `department_id`.
    async fn rename_department_on_users(&self, department_id: DepartmentId, name: &str) -> Result<u64>;
}

#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn create_role(&self, request: &RoleCreateDBRequest) -> Result<RoleDBResponse>;

    async fn get_role(&self, id: RoleId) -> Result<Option<RoleDBResponse>>;

    async fn get_role_by_name(&self, name: &str) -> Result<Option<RoleDBResponse>>;

    async fn list_roles(&self, filter: &RoleFilter) -> Result<(Vec<RoleDBResponse>, i64)>;

    async fn all_roles(&self) -> Result<Vec<RoleDBResponse>>;

    async fn update_role(&self, id: RoleId, request: &RoleUpdateDBRequest) -> Result<RoleDBResponse>;

    async fn delete_role(&self, id: RoleId) -> Result<bool>;

    /// Refresh the cached name of a permission in every role that carries it.
    async fn rename_permission_in_roles(&self, permission_id: PermissionId, name: &str) -> Result<u64>;

    /// Drop a permission from every role cache.
    async fn remove_permission_from_roles(&self, permission_id: PermissionId) -> Result<u64>;
}

#[async_trait]
pub trait DepartmentStore: Send + Sync {
    async fn create_department(&self, request: &DepartmentCreateDBRequest) -> Result<DepartmentDBResponse>;

    async fn get_department(&self, id: DepartmentId) -> Result<Option<DepartmentDBResponse>>;

    async fn get_department_by_name(&self, name: &str) -> Result<Option<DepartmentDBResponse>>;

    async fn list_departments(&self, filter: &DepartmentFilter) -> Result<(Vec<DepartmentDBResponse>, i64)>;

    async fn all_departments(&self) -> Result<Vec<DepartmentDBResponse>>;

    async fn update_department(&self, id: DepartmentId, request: &DepartmentUpdateDBRequest) -> Result<DepartmentDBResponse>;

    async fn delete_department(&self, id: DepartmentId) -> Result<bool>;

    /// Set or clear the manager pointer. Fails with `NotFound` for a missing department.
    async fn set_department_manager(&self, id: DepartmentId, manager: Option<&MemberEntry>) -> Result<()>;

    /// Clear the manager pointer only while it still points at `emp_id`.
    async fn clear_department_manager_if(&self, id: DepartmentId, emp_id: EmployeeId) -> Result<bool>;
}

#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn create_permission(&self, request: &PermissionCreateDBRequest) -> Result<PermissionDBResponse>;

    async fn get_permission(&self, id: PermissionId) -> Result<Option<PermissionDBResponse>>;

    /// Fetch the permissions that exist among `ids`; missing ids are simply absent.
    async fn get_permissions(&self, ids: &[PermissionId]) -> Result<Vec<PermissionDBResponse>>;

    async fn list_permissions(&self, filter: &PermissionFilter) -> Result<(Vec<PermissionDBResponse>, i64)>;

    async fn all_permissions(&self) -> Result<Vec<PermissionDBResponse>>;

    async fn update_permission(&self, id: PermissionId, request: &PermissionUpdateDBRequest) -> Result<PermissionDBResponse>;

    async fn delete_permission(&self, id: PermissionId) -> Result<bool>;
}

/// Primitive edits of the embedded member lists.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Add an entry, or refresh its name when `user_id` is already listed.
    /// Fails with `NotFound` when the owner does not exist.
    async fn add_member(&self, owner: MembershipOwner, owner_id: uuid::Uuid, entry: &MemberEntry) -> Result<()>;

    /// Remove every entry for `user_id`. Returns whether anything was removed.
    async fn remove_member(&self, owner: MembershipOwner, owner_id: uuid::Uuid, user_id: EmployeeId) -> Result<bool>;

    /// Overwrite the whole list. Used by reconciliation.
    async fn replace_members(&self, owner: MembershipOwner, owner_id: uuid::Uuid, members: &[MemberEntry]) -> Result<()>;

    /// Overwrite a role's permission cache. Used by reconciliation.
    async fn replace_role_permissions(&self, role_id: RoleId, permissions: &[PermissionRef]) -> Result<()>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Evict the employee's session and insert the new one as one unit.
    async fn replace_session(&self, emp_id: EmployeeId, token_digest: &str) -> Result<SessionDBResponse>;

    async fn get_session(&self, emp_id: EmployeeId) -> Result<Option<SessionDBResponse>>;

    async fn delete_session(&self, emp_id: EmployeeId) -> Result<bool>;
}

#[async_trait]
pub trait ResetTokenStore: Send + Sync {
    async fn create_reset_token(&self, request: &ResetTokenCreateDBRequest) -> Result<ResetTokenDBResponse>;

    /// Atomically take the token matching `email` and `token_digest`.
    ///
    /// A live match removes it together with every other token for the email. An expired
    /// match removes only that token.
    async fn consume_reset_token(&self, email: &str, token_digest: &str, now: DateTime<Utc>) -> Result<ResetTokenConsumption>;

    async fn delete_reset_tokens_for_email(&self, email: &str) -> Result<u64>;
}

/// Append-only: inserts and reads, no update or delete.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn insert_audit_log(&self, request: &AuditLogCreateDBRequest) -> Result<AuditLogDBResponse>;

    async fn get_audit_log(&self, id: AuditLogId) -> Result<Option<AuditLogDBResponse>>;

    async fn list_audit_logs(&self, filter: &AuditLogFilter) -> Result<(Vec<AuditLogDBResponse>, i64)>;
}

/// The complete backing store.
#[async_trait]
pub trait Store:
    UserStore + RoleStore + DepartmentStore + PermissionStore + MembershipStore + SessionStore + ResetTokenStore + AuditStore
{
    /// Cheap liveness probe for `/healthz`.
    async fn ping(&self) -> Result<()>;
}
