//! In-process store backed by `DashMap` collections.
//!
//! Uniqueness is enforced the way the Postgres unique indexes would, by holding a single
//! writer lock across the check and the insert. Violations are reported with the same
//! constraint names the migrations declare, so error mapping is identical for both backends.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Mutex;
#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use tracing::instrument;
use uuid::Uuid;

use crate::db::errors::{DbError, Result};
use crate::db::models::{
    MemberEntry, MembershipOwner, PermissionRef, SortOrder, contains_ci,
    audit_logs::{AuditLogCreateDBRequest, AuditLogDBResponse, AuditLogFilter, AuditLogSortField},
    departments::{DepartmentCreateDBRequest, DepartmentDBResponse, DepartmentFilter, DepartmentSortField, DepartmentUpdateDBRequest},
    permissions::{PermissionCreateDBRequest, PermissionDBResponse, PermissionFilter, PermissionSortField, PermissionUpdateDBRequest},
    reset_tokens::{ResetTokenConsumption, ResetTokenCreateDBRequest, ResetTokenDBResponse},
    roles::{RoleCreateDBRequest, RoleDBResponse, RoleFilter, RoleSortField, RoleUpdateDBRequest},
    sessions::SessionDBResponse,
    users::{UserCreateDBRequest, UserDBResponse, UserFilter, UserSortField, UserUpdateDBRequest},
};
use crate::db::{AuditStore, DepartmentStore, MembershipStore, PermissionStore, ResetTokenStore, RoleStore, SessionStore, Store, UserStore};
use crate::types::{AuditLogId, DepartmentId, EmployeeId, PermissionId, RoleId, abbrev_uuid};

#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<EmployeeId, UserDBResponse>,
    roles: DashMap<RoleId, RoleDBResponse>,
    departments: DashMap<DepartmentId, DepartmentDBResponse>,
    permissions: DashMap<PermissionId, PermissionDBResponse>,
    sessions: DashMap<EmployeeId, SessionDBResponse>,
    reset_tokens: Mutex<Vec<ResetTokenDBResponse>>,
    audit_logs: DashMap<AuditLogId, AuditLogDBResponse>,
    /// Serializes check-then-write sequences on unique columns
    writer: Mutex<()>,
    #[cfg(test)]
    fail_audit_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent audit insert fail, to exercise post-commit error handling.
    #[cfg(test)]
    pub fn set_fail_audit_writes(&self, fail: bool) {
        self.fail_audit_writes.store(fail, AtomicOrdering::SeqCst);
    }

    fn lock_writer(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.writer
            .lock()
            .map_err(|_| DbError::Other(anyhow::anyhow!("memory store writer lock poisoned")))
    }

    fn lock_reset_tokens(&self) -> Result<std::sync::MutexGuard<'_, Vec<ResetTokenDBResponse>>> {
        self.reset_tokens
            .lock()
            .map_err(|_| DbError::Other(anyhow::anyhow!("memory store reset token lock poisoned")))
    }

    fn email_taken(&self, email: &str, except: Option<EmployeeId>) -> bool {
        self.users
            .iter()
            .any(|u| Some(u.id) != except && (u.email == email || u.username == email))
    }

    fn role_name_taken(&self, name: &str, except: Option<RoleId>) -> bool {
        self.roles.iter().any(|r| Some(r.id) != except && r.name == name)
    }

    fn department_name_taken(&self, name: &str, except: Option<DepartmentId>) -> bool {
        self.departments.iter().any(|d| Some(d.id) != except && d.name == name)
    }

    fn permission_name_taken(&self, name: &str, except: Option<PermissionId>) -> bool {
        self.permissions.iter().any(|p| Some(p.id) != except && p.name == name)
    }

    fn with_members<R>(&self, owner: MembershipOwner, owner_id: Uuid, f: impl FnOnce(&mut Vec<MemberEntry>) -> R) -> Option<R> {
        match owner {
            MembershipOwner::Role => self.roles.get_mut(&owner_id).map(|mut role| {
                let result = f(&mut role.employees);
                role.updated_at = Utc::now();
                result
            }),
            MembershipOwner::Department => self.departments.get_mut(&owner_id).map(|mut dep| {
                let result = f(&mut dep.employees);
                dep.updated_at = Utc::now();
                result
            }),
        }
    }
}

/// Sort by `key`, breaking ties by id so pages are stable.
fn sort_records<T, K: Ord>(items: &mut [T], order: SortOrder, key: impl Fn(&T) -> K, id: impl Fn(&T) -> Uuid) {
    items.sort_by(|a, b| order.apply(key(a).cmp(&key(b)).then_with(|| id(a).cmp(&id(b)))));
}

#[async_trait]
impl UserStore for MemoryStore {
    #[instrument(skip(self, request), fields(email = %request.email), err)]
    async fn create_user(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        let _guard = self.lock_writer()?;
        if self.email_taken(&request.email, None) {
            return Err(DbError::duplicate("users", "email", &request.email));
        }

        let now = Utc::now();
        let user = UserDBResponse {
            id: Uuid::new_v4(),
            first_name: request.first_name.clone(),
            last_name: request.last_name.clone(),
            email: request.email.clone(),
            username: request.email.clone(),
            role: request.role.clone(),
            department: request.department.clone(),
            role_id: request.role_id,
            department_id: request.department_id,
            password_hash: request.password_hash.clone(),
            created_at: now,
            updated_at: now,
        };
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: EmployeeId) -> Result<Option<UserDBResponse>> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<UserDBResponse>> {
        Ok(self.users.iter().find(|u| u.username == username).map(|u| u.clone()))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserDBResponse>> {
        Ok(self.users.iter().find(|u| u.email == email).map(|u| u.clone()))
    }

    #[instrument(skip(self, filter), err)]
    async fn list_users(&self, filter: &UserFilter) -> Result<(Vec<UserDBResponse>, i64)> {
        let mut users: Vec<UserDBResponse> = self
            .users
            .iter()
            .filter(|u| {
                filter
                    .name
                    .as_deref()
                    .is_none_or(|name| contains_ci(&u.first_name, name) || contains_ci(&u.last_name, name))
                    && filter.role.as_deref().is_none_or(|role| contains_ci(&u.role, role))
                    && filter.department.as_deref().is_none_or(|dep| contains_ci(&u.department, dep))
                    && filter.department_id.is_none_or(|id| u.department_id == id)
            })
            .map(|u| u.clone())
            .collect();

        let order = filter.sort_order;
        match filter.sort_by {
            UserSortField::CreatedAt => sort_records(&mut users, order, |u| u.created_at, |u| u.id),
            UserSortField::UpdatedAt => sort_records(&mut users, order, |u| u.updated_at, |u| u.id),
            UserSortField::FirstName => sort_records(&mut users, order, |u| u.first_name.clone(), |u| u.id),
            UserSortField::LastName => sort_records(&mut users, order, |u| u.last_name.clone(), |u| u.id),
            UserSortField::Email => sort_records(&mut users, order, |u| u.email.clone(), |u| u.id),
            UserSortField::Role => sort_records(&mut users, order, |u| u.role.clone(), |u| u.id),
            UserSortField::Department => sort_records(&mut users, order, |u| u.department.clone(), |u| u.id),
        }

        let total = users.len() as i64;
        Ok((filter.window.slice(users), total))
    }

    async fn all_users(&self) -> Result<Vec<UserDBResponse>> {
        let mut users: Vec<UserDBResponse> = self.users.iter().map(|u| u.clone()).collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(users)
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn update_user(&self, id: EmployeeId, request: &UserUpdateDBRequest) -> Result<UserDBResponse> {
        let _guard = self.lock_writer()?;
        if let Some(email) = &request.email
            && self.email_taken(email, Some(id))
        {
            return Err(DbError::duplicate("users", "email", email));
        }

        let mut user = self.users.get_mut(&id).ok_or(DbError::NotFound)?;
        if let Some(first_name) = &request.first_name {
            user.first_name = first_name.clone();
        }
        if let Some(last_name) = &request.last_name {
            user.last_name = last_name.clone();
        }
        if let Some(email) = &request.email {
            user.email = email.clone();
            user.username = email.clone();
        }
        if let Some((role_id, role)) = &request.role {
            user.role_id = *role_id;
            user.role = role.clone();
        }
        if let Some((department_id, department)) = &request.department {
            user.department_id = *department_id;
            user.department = department.clone();
        }
        if let Some(password_hash) = &request.password_hash {
            user.password_hash = password_hash.clone();
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn delete_user(&self, id: EmployeeId) -> Result<bool> {
        Ok(self.users.remove(&id).is_some())
    }

    async fn rename_role_on_users(&self, role_id: RoleId, name: &str) -> Result<u64> {
        let mut count = 0;
        for mut user in self.users.iter_mut() {
            if user.role_id == role_id && user.role != name {
                user.role = name.to_string();
                user.updated_at = Utc::now();
                count += 1;
            }
        }
        Ok(count)
    }

    async fn rename_department_on_users(&self, department_id: DepartmentId, name: &str) -> Result<u64> {
        let mut count = 0;
        for mut user in self.users.iter_mut() {
            if user.department_id == department_id && user.department != name {
                user.department = name.to_string();
                user.updated_at = Utc::now();
                count += 1;
            }
        }
        Ok(count)
    }
}

#[async_trait]
impl RoleStore for MemoryStore {
    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create_role(&self, request: &RoleCreateDBRequest) -> Result<RoleDBResponse> {
        let _guard = self.lock_writer()?;
        if self.role_name_taken(&request.name, None) {
            return Err(DbError::duplicate("roles", "name", &request.name));
        }

        let now = Utc::now();
        let role = RoleDBResponse {
            id: Uuid::new_v4(),
            name: request.name.clone(),
            description: request.description.clone(),
            permissions: request.permissions.clone(),
            employees: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn get_role(&self, id: RoleId) -> Result<Option<RoleDBResponse>> {
        Ok(self.roles.get(&id).map(|r| r.clone()))
    }

    async fn get_role_by_name(&self, name: &str) -> Result<Option<RoleDBResponse>> {
        Ok(self.roles.iter().find(|r| r.name == name).map(|r| r.clone()))
    }

    #[instrument(skip(self, filter), err)]
    async fn list_roles(&self, filter: &RoleFilter) -> Result<(Vec<RoleDBResponse>, i64)> {
        let mut roles: Vec<RoleDBResponse> = self
            .roles
            .iter()
            .filter(|r| {
                filter.name.as_deref().is_none_or(|name| contains_ci(&r.name, name))
                    && filter
                        .permissions
                        .iter()
                        .all(|wanted| r.permissions.iter().any(|p| contains_ci(&p.permission_name, wanted)))
            })
            .map(|r| r.clone())
            .collect();

        let order = filter.sort_order;
        match filter.sort_by {
            RoleSortField::CreatedAt => sort_records(&mut roles, order, |r| r.created_at, |r| r.id),
            RoleSortField::UpdatedAt => sort_records(&mut roles, order, |r| r.updated_at, |r| r.id),
            RoleSortField::Name => sort_records(&mut roles, order, |r| r.name.clone(), |r| r.id),
        }

        let total = roles.len() as i64;
        Ok((filter.window.slice(roles), total))
    }

    async fn all_roles(&self) -> Result<Vec<RoleDBResponse>> {
        let mut roles: Vec<RoleDBResponse> = self.roles.iter().map(|r| r.clone()).collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    #[instrument(skip(self, request), fields(role_id = %abbrev_uuid(&id)), err)]
    async fn update_role(&self, id: RoleId, request: &RoleUpdateDBRequest) -> Result<RoleDBResponse> {
        let _guard = self.lock_writer()?;
        if let Some(name) = &request.name
            && self.role_name_taken(name, Some(id))
        {
            return Err(DbError::duplicate("roles", "name", name));
        }

        let mut role = self.roles.get_mut(&id).ok_or(DbError::NotFound)?;
        if let Some(name) = &request.name {
            role.name = name.clone();
        }
        if let Some(description) = &request.description {
            role.description = description.clone();
        }
        if let Some(permissions) = &request.permissions {
            role.permissions = permissions.clone();
        }
        role.updated_at = Utc::now();
        Ok(role.clone())
    }

    async fn delete_role(&self, id: RoleId) -> Result<bool> {
        Ok(self.roles.remove(&id).is_some())
    }

    async fn rename_permission_in_roles(&self, permission_id: PermissionId, name: &str) -> Result<u64> {
        let mut count = 0;
        for mut role in self.roles.iter_mut() {
            let mut touched = false;
            for permission in role.permissions.iter_mut().filter(|p| p.permission_id == permission_id) {
                if permission.permission_name != name {
                    permission.permission_name = name.to_string();
                    touched = true;
                }
            }
            if touched {
                role.updated_at = Utc::now();
                count += 1;
            }
        }
        Ok(count)
    }

    async fn remove_permission_from_roles(&self, permission_id: PermissionId) -> Result<u64> {
        let mut count = 0;
        for mut role in self.roles.iter_mut() {
            let before = role.permissions.len();
            role.permissions.retain(|p| p.permission_id != permission_id);
            if role.permissions.len() != before {
                role.updated_at = Utc::now();
                count += 1;
            }
        }
        Ok(count)
    }
}

#[async_trait]
impl DepartmentStore for MemoryStore {
    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create_department(&self, request: &DepartmentCreateDBRequest) -> Result<DepartmentDBResponse> {
        let _guard = self.lock_writer()?;
        if self.department_name_taken(&request.name, None) {
            return Err(DbError::duplicate("departments", "name", &request.name));
        }

        let now = Utc::now();
        let department = DepartmentDBResponse {
            id: Uuid::new_v4(),
            name: request.name.clone(),
            description: request.description.clone(),
            manager_id: None,
            manager_name: None,
            employees: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.departments.insert(department.id, department.clone());
        Ok(department)
    }

    async fn get_department(&self, id: DepartmentId) -> Result<Option<DepartmentDBResponse>> {
        Ok(self.departments.get(&id).map(|d| d.clone()))
    }

    async fn get_department_by_name(&self, name: &str) -> Result<Option<DepartmentDBResponse>> {
        Ok(self.departments.iter().find(|d| d.name == name).map(|d| d.clone()))
    }

    #[instrument(skip(self, filter), err)]
    async fn list_departments(&self, filter: &DepartmentFilter) -> Result<(Vec<DepartmentDBResponse>, i64)> {
        let mut departments: Vec<DepartmentDBResponse> = self
            .departments
            .iter()
            .filter(|d| {
                filter.name.as_deref().is_none_or(|name| contains_ci(&d.name, name))
                    && filter
                        .manager_name
                        .as_deref()
                        .is_none_or(|manager| d.manager_name.as_deref().is_some_and(|m| contains_ci(m, manager)))
                    && (filter.employees.is_empty()
                        || d.employees
                            .iter()
                            .any(|e| filter.employees.iter().any(|wanted| contains_ci(&e.employee_name, wanted))))
            })
            .map(|d| d.clone())
            .collect();

        let order = filter.sort_order;
        match filter.sort_by {
            DepartmentSortField::CreatedAt => sort_records(&mut departments, order, |d| d.created_at, |d| d.id),
            DepartmentSortField::UpdatedAt => sort_records(&mut departments, order, |d| d.updated_at, |d| d.id),
            DepartmentSortField::Name => sort_records(&mut departments, order, |d| d.name.clone(), |d| d.id),
            DepartmentSortField::ManagerName => sort_records(&mut departments, order, |d| d.manager_name.clone(), |d| d.id),
        }

        let total = departments.len() as i64;
        Ok((filter.window.slice(departments), total))
    }

    async fn all_departments(&self) -> Result<Vec<DepartmentDBResponse>> {
        let mut departments: Vec<DepartmentDBResponse> = self.departments.iter().map(|d| d.clone()).collect();
        departments.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(departments)
    }

    #[instrument(skip(self, request), fields(department_id = %abbrev_uuid(&id)), err)]
    async fn update_department(&self, id: DepartmentId, request: &DepartmentUpdateDBRequest) -> Result<DepartmentDBResponse> {
        let _guard = self.lock_writer()?;
        if let Some(name) = &request.name
            && self.department_name_taken(name, Some(id))
        {
            return Err(DbError::duplicate("departments", "name", name));
        }

        let mut department = self.departments.get_mut(&id).ok_or(DbError::NotFound)?;
        if let Some(name) = &request.name {
            department.name = name.clone();
        }
        if let Some(description) = &request.description {
            department.description = description.clone();
        }
        department.updated_at = Utc::now();
        Ok(department.clone())
    }

    async fn delete_department(&self, id: DepartmentId) -> Result<bool> {
        Ok(self.departments.remove(&id).is_some())
    }

    async fn set_department_manager(&self, id: DepartmentId, manager: Option<&MemberEntry>) -> Result<()> {
        let mut department = self.departments.get_mut(&id).ok_or(DbError::NotFound)?;
        department.manager_id = manager.map(|m| m.user_id);
        department.manager_name = manager.map(|m| m.employee_name.clone());
        department.updated_at = Utc::now();
        Ok(())
    }

    async fn clear_department_manager_if(&self, id: DepartmentId, emp_id: EmployeeId) -> Result<bool> {
        match self.departments.get_mut(&id) {
            Some(mut department) if department.manager_id == Some(emp_id) => {
                department.manager_id = None;
                department.manager_name = None;
                department.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create_permission(&self, request: &PermissionCreateDBRequest) -> Result<PermissionDBResponse> {
        let _guard = self.lock_writer()?;
        if self.permission_name_taken(&request.name, None) {
            return Err(DbError::duplicate("permissions", "name", &request.name));
        }

        let now = Utc::now();
        let permission = PermissionDBResponse {
            id: Uuid::new_v4(),
            name: request.name.clone(),
            description: request.description.clone(),
            created_at: now,
            updated_at: now,
        };
        self.permissions.insert(permission.id, permission.clone());
        Ok(permission)
    }

    async fn get_permission(&self, id: PermissionId) -> Result<Option<PermissionDBResponse>> {
        Ok(self.permissions.get(&id).map(|p| p.clone()))
    }

    async fn get_permissions(&self, ids: &[PermissionId]) -> Result<Vec<PermissionDBResponse>> {
        Ok(ids.iter().filter_map(|id| self.permissions.get(id).map(|p| p.clone())).collect())
    }

    #[instrument(skip(self, filter), err)]
    async fn list_permissions(&self, filter: &PermissionFilter) -> Result<(Vec<PermissionDBResponse>, i64)> {
        let mut permissions: Vec<PermissionDBResponse> = self
            .permissions
            .iter()
            .filter(|p| filter.name.as_deref().is_none_or(|name| contains_ci(&p.name, name)))
            .map(|p| p.clone())
            .collect();

        let order = filter.sort_order;
        match filter.sort_by {
            PermissionSortField::CreatedAt => sort_records(&mut permissions, order, |p| p.created_at, |p| p.id),
            PermissionSortField::UpdatedAt => sort_records(&mut permissions, order, |p| p.updated_at, |p| p.id),
            PermissionSortField::Name => sort_records(&mut permissions, order, |p| p.name.clone(), |p| p.id),
        }

        let total = permissions.len() as i64;
        Ok((filter.window.slice(permissions), total))
    }

    async fn all_permissions(&self) -> Result<Vec<PermissionDBResponse>> {
        let mut permissions: Vec<PermissionDBResponse> = self.permissions.iter().map(|p| p.clone()).collect();
        permissions.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(permissions)
    }

    #[instrument(skip(self, request), fields(permission_id = %abbrev_uuid(&id)), err)]
    async fn update_permission(&self, id: PermissionId, request: &PermissionUpdateDBRequest) -> Result<PermissionDBResponse> {
        let _guard = self.lock_writer()?;
        if let Some(name) = &request.name
            && self.permission_name_taken(name, Some(id))
        {
            return Err(DbError::duplicate("permissions", "name", name));
        }

        let mut permission = self.permissions.get_mut(&id).ok_or(DbError::NotFound)?;
        if let Some(name) = &request.name {
            permission.name = name.clone();
        }
        if let Some(description) = &request.description {
            permission.description = description.clone();
        }
        permission.updated_at = Utc::now();
        Ok(permission.clone())
    }

    async fn delete_permission(&self, id: PermissionId) -> Result<bool> {
        Ok(self.permissions.remove(&id).is_some())
    }
}

#[async_trait]
impl MembershipStore for MemoryStore {
    #[instrument(skip_all, fields(owner = owner.resource(), owner_id = %abbrev_uuid(&owner_id), user_id = %abbrev_uuid(&entry.user_id)), err)]
    async fn add_member(&self, owner: MembershipOwner, owner_id: Uuid, entry: &MemberEntry) -> Result<()> {
        self.with_members(owner, owner_id, |members| {
            match members.iter_mut().find(|m| m.user_id == entry.user_id) {
                Some(existing) => existing.employee_name = entry.employee_name.clone(),
                None => members.push(entry.clone()),
            }
        })
        .ok_or(DbError::NotFound)
    }

    #[instrument(skip_all, fields(owner = owner.resource(), owner_id = %abbrev_uuid(&owner_id), user_id = %abbrev_uuid(&user_id)), err)]
    async fn remove_member(&self, owner: MembershipOwner, owner_id: Uuid, user_id: EmployeeId) -> Result<bool> {
        let removed = self.with_members(owner, owner_id, |members| {
            let before = members.len();
            members.retain(|m| m.user_id != user_id);
            members.len() != before
        });
        Ok(removed.unwrap_or(false))
    }

    async fn replace_members(&self, owner: MembershipOwner, owner_id: Uuid, members: &[MemberEntry]) -> Result<()> {
        self.with_members(owner, owner_id, |current| *current = members.to_vec())
            .ok_or(DbError::NotFound)
    }

    async fn replace_role_permissions(&self, role_id: RoleId, permissions: &[PermissionRef]) -> Result<()> {
        let mut role = self.roles.get_mut(&role_id).ok_or(DbError::NotFound)?;
        role.permissions = permissions.to_vec();
        role.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    #[instrument(skip(self, token_digest), fields(emp_id = %abbrev_uuid(&emp_id)), err)]
    async fn replace_session(&self, emp_id: EmployeeId, token_digest: &str) -> Result<SessionDBResponse> {
        let session = SessionDBResponse {
            emp_id,
            token_digest: token_digest.to_string(),
            created_at: Utc::now(),
        };
        // A single entry swap: the previous session is evicted by the insert itself
        self.sessions.insert(emp_id, session.clone());
        Ok(session)
    }

    async fn get_session(&self, emp_id: EmployeeId) -> Result<Option<SessionDBResponse>> {
        Ok(self.sessions.get(&emp_id).map(|s| s.clone()))
    }

    #[instrument(skip(self), fields(emp_id = %abbrev_uuid(&emp_id)), err)]
    async fn delete_session(&self, emp_id: EmployeeId) -> Result<bool> {
        Ok(self.sessions.remove(&emp_id).is_some())
    }
}

#[async_trait]
impl ResetTokenStore for MemoryStore {
    async fn create_reset_token(&self, request: &ResetTokenCreateDBRequest) -> Result<ResetTokenDBResponse> {
        let token = ResetTokenDBResponse {
            id: Uuid::new_v4(),
            email: request.email.clone(),
            token_digest: request.token_digest.clone(),
            expires_at: request.expires_at,
            created_at: Utc::now(),
        };
        self.lock_reset_tokens()?.push(token.clone());
        Ok(token)
    }

    #[instrument(skip(self, token_digest), err)]
    async fn consume_reset_token(&self, email: &str, token_digest: &str, now: DateTime<Utc>) -> Result<ResetTokenConsumption> {
        let mut tokens = self.lock_reset_tokens()?;
        let Some(index) = tokens.iter().position(|t| t.email == email && t.token_digest == token_digest) else {
            return Ok(ResetTokenConsumption::NotFound);
        };

        let token = tokens.remove(index);
        if token.is_expired(now) {
            return Ok(ResetTokenConsumption::Expired);
        }

        tokens.retain(|t| t.email != email);
        Ok(ResetTokenConsumption::Consumed(token))
    }

    async fn delete_reset_tokens_for_email(&self, email: &str) -> Result<u64> {
        let mut tokens = self.lock_reset_tokens()?;
        let before = tokens.len();
        tokens.retain(|t| t.email != email);
        Ok((before - tokens.len()) as u64)
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    #[instrument(skip(self, request), fields(log_type = %request.log_type), err)]
    async fn insert_audit_log(&self, request: &AuditLogCreateDBRequest) -> Result<AuditLogDBResponse> {
        #[cfg(test)]
        if self.fail_audit_writes.load(AtomicOrdering::SeqCst) {
            return Err(DbError::Other(anyhow::anyhow!("audit log writes are disabled")));
        }

        let record = AuditLogDBResponse {
            id: Uuid::new_v4(),
            log_type: request.log_type.clone(),
            user_name: request.user_name.clone(),
            actor_id: request.actor_id,
            target_id: request.target_id.clone(),
            action: request.action.clone(),
            created_at: Utc::now(),
        };
        self.audit_logs.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_audit_log(&self, id: AuditLogId) -> Result<Option<AuditLogDBResponse>> {
        Ok(self.audit_logs.get(&id).map(|r| r.clone()))
    }

    #[instrument(skip(self, filter), err)]
    async fn list_audit_logs(&self, filter: &AuditLogFilter) -> Result<(Vec<AuditLogDBResponse>, i64)> {
        let mut logs: Vec<AuditLogDBResponse> = self
            .audit_logs
            .iter()
            .filter(|l| {
                filter.log_type.as_deref().is_none_or(|t| contains_ci(&l.log_type, t))
                    && filter.actor_id.is_none_or(|actor| l.actor_id == Some(actor))
                    && filter.from.is_none_or(|from| l.created_at >= from)
                    && filter.to.is_none_or(|to| l.created_at <= to)
            })
            .map(|l| l.clone())
            .collect();

        let order = filter.sort_order;
        match filter.sort_by {
            AuditLogSortField::CreatedAt => sort_records(&mut logs, order, |l| l.created_at, |l| l.id),
            AuditLogSortField::Type => sort_records(&mut logs, order, |l| l.log_type.clone(), |l| l.id),
            AuditLogSortField::UserName => sort_records(&mut logs, order, |l| l.user_name.clone(), |l| l.id),
        }

        let total = logs.len() as i64;
        Ok((filter.window.slice(logs), total))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
