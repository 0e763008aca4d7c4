//! Referential integrity between employees and the caches that mirror them.
//!
//! Roles and departments carry denormalized `employees` lists, departments carry a manager
//! pointer, employees carry the names of their role and department, and roles carry copies of
//! their permissions. The authoritative links are the ids on the employee record and the
//! permission collection; everything here keeps the copies in step.
//!
//! There are no cross-collection transactions. Each step below is a single store call, and
//! the steps are ordered remove-before-add so that an interrupted sequence leaves at worst a
//! missing entry, never a duplicate. [`Integrity::reconcile`] recomputes every cache from the
//! authoritative data and repairs whatever an interrupted sequence left behind.
//!
//! ```text
//! create user  --> attach     : + role.employees, + department.employees, manager if DM
//! update user  --> propagate  : - old memberships, + new memberships, manager pointers
//! delete user  --> detach     : - memberships, clear manager pointer
//! rename role  --> rename_role: users.role
//! ```
//!
//! Changes to one employee are serialized with [`Integrity::lock_user`].

use dashmap::DashMap;
use serde::Serialize;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::{
    audit::{Actor, AuditRecorder, kinds},
    db::{
        Store,
        errors::DbError,
        models::{
            MemberEntry, MembershipOwner, PermissionRef,
            departments::DepartmentDBResponse,
            roles::RoleDBResponse,
            users::{UserDBResponse, UserUpdateDBRequest},
        },
    },
    errors::{Error, Result},
    types::{DepartmentId, EmployeeId, PermissionId, RoleId, abbrev_uuid, roles::DEPARTMENT_MANAGER},
};

type LockTable = DashMap<EmployeeId, Arc<Mutex<()>>>;

/// Exclusive hold on one employee's record. The table entry is removed when the last holder
/// releases it.
pub struct UserLock {
    guard: Option<OwnedMutexGuard<()>>,
    emp_id: EmployeeId,
    table: Arc<LockTable>,
}

impl Drop for UserLock {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.table.remove_if(&self.emp_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

/// Counts of what a reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    /// Roles whose employee list was rewritten
    pub role_memberships_repaired: u64,
    /// Departments whose employee list was rewritten
    pub department_memberships_repaired: u64,
    /// Manager pointers removed because they no longer held
    pub managers_cleared: u64,
    /// Manager pointers set on departments that had none
    pub managers_assigned: u64,
    /// Manager pointers whose cached name was refreshed
    pub manager_names_refreshed: u64,
    /// Employees whose cached role or department name was rewritten
    pub users_renamed: u64,
    /// Roles whose permission list was pruned or renamed
    pub role_permissions_repaired: u64,
    /// Employees pointing at a role or department that no longer exists. Reported only.
    #[schema(value_type = Vec<String>)]
    pub orphaned_users: Vec<EmployeeId>,
}

impl ReconcileReport {
    /// Number of writes performed. Orphans are not counted.
    pub fn changes(&self) -> u64 {
        self.role_memberships_repaired
            + self.department_memberships_repaired
            + self.managers_cleared
            + self.managers_assigned
            + self.manager_names_refreshed
            + self.users_renamed
            + self.role_permissions_repaired
    }
}

#[derive(Clone)]
pub struct Integrity {
    store: Arc<dyn Store>,
    locks: Arc<LockTable>,
}

fn missing_owner(owner: MembershipOwner, owner_id: uuid::Uuid) -> Error {
    Error::Internal {
        operation: format!("update membership of missing {} {}", owner.resource(), owner_id),
    }
}

/// Run every step and keep the first failure.
fn first_error(results: impl IntoIterator<Item = Result<()>>) -> Result<()> {
    let mut first = None;
    for result in results {
        if let Err(e) = result {
            warn!(error = %e, "Integrity step failed");
            first.get_or_insert(e);
        }
    }
    first.map_or(Ok(()), Err)
}

impl Integrity {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Wait for exclusive access to an employee.
    pub async fn lock_user(&self, emp_id: EmployeeId) -> UserLock {
        let mutex = self.locks.entry(emp_id).or_default().clone();
        let guard = mutex.lock_owned().await;
        UserLock {
            guard: Some(guard),
            emp_id,
            table: self.locks.clone(),
        }
    }

    #[cfg(test)]
    fn held_locks(&self) -> usize {
        self.locks.len()
    }

    /// Add or refresh an employee in a membership cache. A missing owner is a server error.
    #[instrument(skip(self, entry), fields(owner = owner.resource(), owner_id = %abbrev_uuid(&owner_id)), err)]
    pub async fn add_membership(&self, owner: MembershipOwner, owner_id: uuid::Uuid, entry: &MemberEntry) -> Result<()> {
        match self.store.add_member(owner, owner_id, entry).await {
            Ok(()) => Ok(()),
            Err(DbError::NotFound) => Err(missing_owner(owner, owner_id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove an employee from a membership cache by id. Idempotent.
    #[instrument(skip(self), fields(owner = owner.resource(), owner_id = %abbrev_uuid(&owner_id)), err)]
    pub async fn remove_membership(&self, owner: MembershipOwner, owner_id: uuid::Uuid, user_id: EmployeeId) -> Result<bool> {
        Ok(self.store.remove_member(owner, owner_id, user_id).await?)
    }

    async fn set_manager(&self, department_id: DepartmentId, entry: &MemberEntry) -> Result<()> {
        match self.store.set_department_manager(department_id, Some(entry)).await {
            Ok(()) => Ok(()),
            Err(DbError::NotFound) => Err(missing_owner(MembershipOwner::Department, department_id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Link a newly created employee into its role and department.
    #[instrument(skip_all, fields(emp_id = %abbrev_uuid(&user.id)), err)]
    pub async fn attach(&self, user: &UserDBResponse) -> Result<()> {
        let entry = user.member_entry();
        self.add_membership(MembershipOwner::Department, user.department_id, &entry).await?;
        self.add_membership(MembershipOwner::Role, user.role_id, &entry).await?;
        if user.role == DEPARTMENT_MANAGER {
            self.set_manager(user.department_id, &entry).await?;
        }
        Ok(())
    }

    /// Carry an employee update into the caches.
    #[instrument(skip_all, fields(emp_id = %abbrev_uuid(&after.id)), err)]
    pub async fn propagate(&self, before: &UserDBResponse, after: &UserDBResponse) -> Result<()> {
        let entry = after.member_entry();

        if before.department_id != after.department_id {
            self.remove_membership(MembershipOwner::Department, before.department_id, before.id)
                .await?;
        }
        if before.role_id != after.role_id {
            self.remove_membership(MembershipOwner::Role, before.role_id, before.id).await?;
        }

        let manages_old = after.department_id == before.department_id && after.role == DEPARTMENT_MANAGER;
        if !manages_old && self.store.clear_department_manager_if(before.department_id, before.id).await? {
            debug!(department_id = %abbrev_uuid(&before.department_id), "Cleared manager pointer");
        }

        self.add_membership(MembershipOwner::Department, after.department_id, &entry).await?;
        self.add_membership(MembershipOwner::Role, after.role_id, &entry).await?;
        if after.role == DEPARTMENT_MANAGER {
            self.set_manager(after.department_id, &entry).await?;
        }
        Ok(())
    }

    /// Unlink a deleted employee. Every step is attempted; the first failure is returned.
    #[instrument(skip_all, fields(emp_id = %abbrev_uuid(&user.id)), err)]
    pub async fn detach(&self, user: &UserDBResponse) -> Result<()> {
        first_error([
            self.remove_membership(MembershipOwner::Role, user.role_id, user.id).await.map(drop),
            self.remove_membership(MembershipOwner::Department, user.department_id, user.id)
                .await
                .map(drop),
            self.store
                .clear_department_manager_if(user.department_id, user.id)
                .await
                .map(drop)
                .map_err(Error::from),
        ])
    }

    #[instrument(skip(self, name), fields(role_id = %abbrev_uuid(&role_id)), err)]
    pub async fn rename_role(&self, role_id: RoleId, name: &str) -> Result<u64> {
        Ok(self.store.rename_role_on_users(role_id, name).await?)
    }

    #[instrument(skip(self, name), fields(department_id = %abbrev_uuid(&department_id)), err)]
    pub async fn rename_department(&self, department_id: DepartmentId, name: &str) -> Result<u64> {
        Ok(self.store.rename_department_on_users(department_id, name).await?)
    }

    #[instrument(skip(self), fields(permission_id = %abbrev_uuid(&permission_id)), err)]
    pub async fn detach_permission(&self, permission_id: PermissionId) -> Result<u64> {
        Ok(self.store.remove_permission_from_roles(permission_id).await?)
    }

    #[instrument(skip(self, name), fields(permission_id = %abbrev_uuid(&permission_id)), err)]
    pub async fn rename_permission(&self, permission_id: PermissionId, name: &str) -> Result<u64> {
        Ok(self.store.rename_permission_in_roles(permission_id, name).await?)
    }

    /// Recompute every cache from the authoritative links and write what differs.
    ///
    /// Idempotent: a second pass over unchanged data reports no changes.
    ///
    /// Works from one snapshot and takes no employee locks. A [`propagate`](Self::propagate)
    /// that lands between the snapshot and a rewrite can be overwritten with the snapshot's
    /// view; the next pass recomputes from the employee records and restores it.
    #[instrument(skip(self), err)]
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        let mut users = self.store.all_users().await?;
        let roles: HashMap<RoleId, RoleDBResponse> = self.store.all_roles().await?.into_iter().map(|r| (r.id, r)).collect();
        let departments: HashMap<DepartmentId, DepartmentDBResponse> =
            self.store.all_departments().await?.into_iter().map(|d| (d.id, d)).collect();
        let permissions: HashMap<PermissionId, String> =
            self.store.all_permissions().await?.into_iter().map(|p| (p.id, p.name)).collect();

        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        // Cached names on employees
        for user in users.iter_mut() {
            let role = roles.get(&user.role_id);
            let department = departments.get(&user.department_id);
            if role.is_none() || department.is_none() {
                report.orphaned_users.push(user.id);
            }

            let mut update = UserUpdateDBRequest::default();
            if let Some(role) = role.filter(|r| r.name != user.role) {
                update.role = Some((role.id, role.name.clone()));
            }
            if let Some(department) = department.filter(|d| d.name != user.department) {
                update.department = Some((department.id, department.name.clone()));
            }
            if !update.is_empty() {
                *user = self.store.update_user(user.id, &update).await?;
                report.users_renamed += 1;
            }
        }

        // Membership caches
        for role in roles.values() {
            let expected: Vec<MemberEntry> = users.iter().filter(|u| u.role_id == role.id).map(|u| u.member_entry()).collect();
            if !same_members(&role.employees, &expected) {
                self.store.replace_members(MembershipOwner::Role, role.id, &expected).await?;
                report.role_memberships_repaired += 1;
            }
        }
        for department in departments.values() {
            let expected: Vec<MemberEntry> = users
                .iter()
                .filter(|u| u.department_id == department.id)
                .map(|u| u.member_entry())
                .collect();
            if !same_members(&department.employees, &expected) {
                self.store
                    .replace_members(MembershipOwner::Department, department.id, &expected)
                    .await?;
                report.department_memberships_repaired += 1;
            }
        }

        // Manager pointers
        let is_manager_of = |user: &UserDBResponse, department_id: DepartmentId| {
            user.department_id == department_id && roles.get(&user.role_id).is_some_and(|r| r.name == DEPARTMENT_MANAGER)
        };
        for department in departments.values() {
            let current = department
                .manager_id
                .and_then(|id| users.iter().find(|u| u.id == id))
                .filter(|u| is_manager_of(u, department.id));

            match (department.manager_id, current) {
                (Some(_), Some(manager)) => {
                    if department.manager_name.as_deref() != Some(manager.full_name().as_str()) {
                        self.store
                            .set_department_manager(department.id, Some(&manager.member_entry()))
                            .await?;
                        report.manager_names_refreshed += 1;
                    }
                }
                (pointer, _) => {
                    let candidate = users
                        .iter()
                        .filter(|u| is_manager_of(u, department.id))
                        .max_by(|a, b| a.updated_at.cmp(&b.updated_at).then_with(|| a.id.cmp(&b.id)));
                    match candidate {
                        Some(manager) => {
                            self.store
                                .set_department_manager(department.id, Some(&manager.member_entry()))
                                .await?;
                            report.managers_assigned += 1;
                        }
                        None if pointer.is_some() => {
                            self.store.set_department_manager(department.id, None).await?;
                            report.managers_cleared += 1;
                        }
                        None => {}
                    }
                }
            }
        }

        // Role permission caches
        for role in roles.values() {
            let mut seen = HashSet::new();
            let expected: Vec<PermissionRef> = role
                .permissions
                .iter()
                .filter(|p| seen.insert(p.permission_id))
                .filter_map(|p| {
                    permissions.get(&p.permission_id).map(|name| PermissionRef {
                        permission_id: p.permission_id,
                        permission_name: name.clone(),
                    })
                })
                .collect();
            if expected != role.permissions {
                self.store.replace_role_permissions(role.id, &expected).await?;
                report.role_permissions_repaired += 1;
            }
        }

        if !report.orphaned_users.is_empty() {
            warn!(count = report.orphaned_users.len(), "Employees reference a missing role or department");
        }
        info!(changes = report.changes(), "Reconciliation finished");
        Ok(report)
    }
}

/// Membership lists compare as sets of (id, name) without duplicates.
fn same_members(current: &[MemberEntry], expected: &[MemberEntry]) -> bool {
    if current.len() != expected.len() {
        return false;
    }
    let current: HashSet<(EmployeeId, &str)> = current.iter().map(|m| (m.user_id, m.employee_name.as_str())).collect();
    current.len() == expected.len()
        && expected
            .iter()
            .all(|m| current.contains(&(m.user_id, m.employee_name.as_str())))
}

/// Periodically reconcile until `shutdown` is cancelled. Passes that change something are
/// audited as the system actor.
pub async fn run_reconciliation_loop(integrity: Integrity, audit: AuditRecorder, interval: Duration, shutdown: CancellationToken) {
    info!(interval = ?interval, "Starting scheduled reconciliation");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.cancelled() => {
                info!("Scheduled reconciliation shutting down");
                return;
            }
        }

        match integrity.reconcile().await {
            Ok(report) if report.changes() > 0 => {
                let action = format!("Scheduled reconciliation repaired {} records", report.changes());
                if let Err(e) = audit.record(kinds::RECONCILIATION, &Actor::system(), None, action).await {
                    warn!(error = %e, "Failed to audit scheduled reconciliation");
                }
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Scheduled reconciliation failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{
            DepartmentStore, MembershipStore, PermissionStore, RoleStore, UserStore,
            memory::MemoryStore,
            models::{
                departments::DepartmentCreateDBRequest, permissions::PermissionCreateDBRequest, roles::RoleCreateDBRequest,
                users::UserCreateDBRequest,
            },
        },
        types::roles,
    };

    struct Fixture {
        store: Arc<MemoryStore>,
        integrity: Integrity,
        manager_role: RoleDBResponse,
        admin_role: RoleDBResponse,
        first: DepartmentDBResponse,
        second: DepartmentDBResponse,
    }

    async fn role(store: &MemoryStore, name: &str) -> RoleDBResponse {
        store
            .create_role(&RoleCreateDBRequest {
                name: name.to_string(),
                description: format!("{name} role"),
                permissions: vec![],
            })
            .await
            .unwrap()
    }

    async fn department(store: &MemoryStore, name: &str) -> DepartmentDBResponse {
        store
            .create_department(&DepartmentCreateDBRequest {
                name: name.to_string(),
                description: format!("{name} department"),
            })
            .await
            .unwrap()
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let integrity = Integrity::new(store.clone());
        Fixture {
            manager_role: role(&store, roles::DEPARTMENT_MANAGER).await,
            admin_role: role(&store, roles::ADMIN).await,
            first: department(&store, "Research").await,
            second: department(&store, "Operations").await,
            store,
            integrity,
        }
    }

    async fn employee(f: &Fixture, email: &str, role: &RoleDBResponse, department: &DepartmentDBResponse) -> UserDBResponse {
        let user = f
            .store
            .create_user(&UserCreateDBRequest {
                first_name: "Test".to_string(),
                last_name: email.to_string(),
                email: email.to_string(),
                role: role.name.clone(),
                role_id: role.id,
                department: department.name.clone(),
                department_id: department.id,
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();
        f.integrity.attach(&user).await.unwrap();
        user
    }

    async fn dep(f: &Fixture, id: DepartmentId) -> DepartmentDBResponse {
        f.store.get_department(id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_move_between_departments_leaves_one_membership() {
        let f = fixture().await;
        let before = employee(&f, "mover@example.com", &f.admin_role, &f.first).await;

        let after = f
            .store
            .update_user(
                before.id,
                &UserUpdateDBRequest {
                    department: Some((f.second.id, f.second.name.clone())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        f.integrity.propagate(&before, &after).await.unwrap();

        let in_first = dep(&f, f.first.id).await.has_member(before.id);
        let in_second = dep(&f, f.second.id).await.has_member(before.id);
        assert!(!in_first);
        assert!(in_second);

        // Re-running the same propagation does not duplicate anything
        f.integrity.propagate(&before, &after).await.unwrap();
        assert_eq!(dep(&f, f.second.id).await.employees.len(), 1);
    }

    #[tokio::test]
    async fn test_manager_pointer_follows_role_and_department() {
        let f = fixture().await;
        let before = employee(&f, "lead@example.com", &f.manager_role, &f.first).await;
        assert_eq!(dep(&f, f.first.id).await.manager_id, Some(before.id));

        // Moving to another department hands over the pointer
        let after = f
            .store
            .update_user(
                before.id,
                &UserUpdateDBRequest {
                    department: Some((f.second.id, f.second.name.clone())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        f.integrity.propagate(&before, &after).await.unwrap();
        assert_eq!(dep(&f, f.first.id).await.manager_id, None);
        assert_eq!(dep(&f, f.second.id).await.manager_id, Some(before.id));

        // Demotion clears it
        let demoted = f
            .store
            .update_user(
                before.id,
                &UserUpdateDBRequest {
                    role: Some((f.admin_role.id, f.admin_role.name.clone())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        f.integrity.propagate(&after, &demoted).await.unwrap();
        assert_eq!(dep(&f, f.second.id).await.manager_id, None);
        let manager_role = f.store.get_role(f.manager_role.id).await.unwrap().unwrap();
        assert!(manager_role.employees.is_empty());
    }

    #[tokio::test]
    async fn test_propagate_keeps_other_managers_pointer() {
        let f = fixture().await;
        let lead = employee(&f, "lead@example.com", &f.manager_role, &f.first).await;
        let other = employee(&f, "other@example.com", &f.admin_role, &f.first).await;

        let moved = f
            .store
            .update_user(
                other.id,
                &UserUpdateDBRequest {
                    department: Some((f.second.id, f.second.name.clone())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        f.integrity.propagate(&other, &moved).await.unwrap();

        assert_eq!(dep(&f, f.first.id).await.manager_id, Some(lead.id));
    }

    #[tokio::test]
    async fn test_detach_removes_memberships_and_pointer() {
        let f = fixture().await;
        let lead = employee(&f, "lead@example.com", &f.manager_role, &f.first).await;

        f.store.delete_user(lead.id).await.unwrap();
        f.integrity.detach(&lead).await.unwrap();

        let department = dep(&f, f.first.id).await;
        assert!(department.employees.is_empty());
        assert_eq!(department.manager_id, None);
        // Detaching twice is harmless
        f.integrity.detach(&lead).await.unwrap();
    }

    #[tokio::test]
    async fn test_add_membership_to_missing_owner_is_server_error() {
        let f = fixture().await;
        let entry = MemberEntry {
            user_id: uuid::Uuid::new_v4(),
            employee_name: "Nobody".to_string(),
        };
        let err = f
            .integrity
            .add_membership(MembershipOwner::Role, uuid::Uuid::new_v4(), &entry)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Internal { .. }));
    }

    #[test_log::test(tokio::test)]
    async fn test_reconcile_repairs_and_is_idempotent() {
        let f = fixture().await;
        let lead = employee(&f, "lead@example.com", &f.manager_role, &f.first).await;
        let staff = employee(&f, "staff@example.com", &f.admin_role, &f.first).await;
        let permission = f
            .store
            .create_permission(&PermissionCreateDBRequest {
                name: "read:reports".to_string(),
                description: "Read reports".to_string(),
            })
            .await
            .unwrap();

        // Corrupt the caches by hand
        f.store
            .replace_members(MembershipOwner::Department, f.first.id, &[staff.member_entry(), staff.member_entry()])
            .await
            .unwrap();
        f.store.set_department_manager(f.first.id, None).await.unwrap();
        f.store
            .replace_role_permissions(
                f.admin_role.id,
                &[
                    PermissionRef {
                        permission_id: permission.id,
                        permission_name: "stale".to_string(),
                    },
                    PermissionRef {
                        permission_id: uuid::Uuid::new_v4(),
                        permission_name: "deleted".to_string(),
                    },
                ],
            )
            .await
            .unwrap();

        let report = f.integrity.reconcile().await.unwrap();
        assert_eq!(report.department_memberships_repaired, 1);
        assert_eq!(report.managers_assigned, 1);
        assert_eq!(report.role_permissions_repaired, 1);
        assert!(report.orphaned_users.is_empty());

        let department = dep(&f, f.first.id).await;
        assert_eq!(department.employees.len(), 2);
        assert_eq!(department.manager_id, Some(lead.id));
        let admin_role = f.store.get_role(f.admin_role.id).await.unwrap().unwrap();
        assert_eq!(admin_role.permissions, vec![permission.as_ref_entry()]);

        let second = f.integrity.reconcile().await.unwrap();
        assert_eq!(second.changes(), 0);
    }

    #[tokio::test]
    async fn test_reconcile_restores_move_overwritten_by_stale_rewrite() {
        let f = fixture().await;
        let before = employee(&f, "mover@example.com", &f.admin_role, &f.first).await;
        let stale_first = dep(&f, f.first.id).await.employees;
        let stale_second = dep(&f, f.second.id).await.employees;

        let after = f
            .store
            .update_user(
                before.id,
                &UserUpdateDBRequest {
                    department: Some((f.second.id, f.second.name.clone())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        f.integrity.propagate(&before, &after).await.unwrap();

        // A pass that snapshotted before the move writes its view back over the caches
        f.store
            .replace_members(MembershipOwner::Department, f.first.id, &stale_first)
            .await
            .unwrap();
        f.store
            .replace_members(MembershipOwner::Department, f.second.id, &stale_second)
            .await
            .unwrap();
        assert!(dep(&f, f.first.id).await.has_member(before.id));

        let report = f.integrity.reconcile().await.unwrap();
        assert_eq!(report.department_memberships_repaired, 2);
        assert!(!dep(&f, f.first.id).await.has_member(before.id));
        assert!(dep(&f, f.second.id).await.has_member(before.id));
    }

    #[tokio::test]
    async fn test_reconcile_reports_orphans_without_touching_them() {
        let f = fixture().await;
        let orphan = employee(&f, "orphan@example.com", &f.admin_role, &f.second).await;
        f.store.delete_department(f.second.id).await.unwrap();

        let report = f.integrity.reconcile().await.unwrap();
        assert_eq!(report.orphaned_users, vec![orphan.id]);

        let unchanged = f.store.get_user(orphan.id).await.unwrap().unwrap();
        assert_eq!(unchanged.department_id, f.second.id);
    }

    #[tokio::test]
    async fn test_user_lock_serializes_and_cleans_up() {
        let f = fixture().await;
        let emp_id = uuid::Uuid::new_v4();

        let guard = f.integrity.lock_user(emp_id).await;
        assert_eq!(f.integrity.held_locks(), 1);

        let integrity = f.integrity.clone();
        let waiter = tokio::spawn(async move {
            let _second = integrity.lock_user(emp_id).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
        assert_eq!(f.integrity.held_locks(), 0);
    }
}
