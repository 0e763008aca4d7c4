//! Append-only audit trail.
//!
//! Every privileged mutation records one entry after it commits. A failed write is reported
//! to the caller as a post-commit error; the mutation it describes is never undone.

use std::sync::Arc;
use tracing::{info, instrument};

use crate::{
    db::{
        Store,
        models::audit_logs::{AuditLogCreateDBRequest, AuditLogDBResponse},
    },
    errors::Result,
    types::EmployeeId,
};

/// Audit entry types.
pub mod kinds {
    pub const EMPLOYEE_CREATED: &str = "Employee Created";
    pub const EMPLOYEE_UPDATED: &str = "Employee Updated";
    pub const EMPLOYEE_DELETED: &str = "Employee Deleted";
    pub const ROLE_CREATED: &str = "Create Role";
    pub const ROLE_UPDATED: &str = "Role Updated";
    pub const ROLE_DELETED: &str = "Role Deleted";
    pub const DEPARTMENT_CREATED: &str = "Create Department";
    pub const DEPARTMENT_UPDATED: &str = "Update Department";
    pub const DEPARTMENT_DELETED: &str = "Delete Department";
    pub const PERMISSION_CREATED: &str = "Create Permission";
    pub const PERMISSION_UPDATED: &str = "Update Permission";
    pub const PERMISSION_DELETED: &str = "Delete Permission";
    pub const PASSWORD_RESET: &str = "Password Reset";
    pub const PASSWORD_CHANGED: &str = "Password Changed";
    pub const RECONCILIATION: &str = "Reconciliation";
}

/// Who performed an audited action.
#[derive(Debug, Clone)]
pub struct Actor {
    pub name: String,
    pub emp_id: Option<EmployeeId>,
}

impl Actor {
    pub fn new(name: impl Into<String>, emp_id: EmployeeId) -> Self {
        Self {
            name: name.into(),
            emp_id: Some(emp_id),
        }
    }

    /// Actions taken by the service itself, such as scheduled reconciliation.
    pub fn system() -> Self {
        Self {
            name: "system".to_string(),
            emp_id: None,
        }
    }
}

impl From<&crate::auth::Principal> for Actor {
    fn from(principal: &crate::auth::Principal) -> Self {
        Self::new(principal.name.clone(), principal.emp_id)
    }
}

#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn Store>,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Append one entry.
    #[instrument(skip(self, actor, action), fields(actor = %actor.name), err)]
    pub async fn record(&self, kind: &str, actor: &Actor, target_id: Option<String>, action: impl Into<String>) -> Result<AuditLogDBResponse> {
        let entry = self
            .store
            .insert_audit_log(&AuditLogCreateDBRequest {
                log_type: kind.to_string(),
                user_name: actor.name.clone(),
                actor_id: actor.emp_id,
                target_id,
                action: action.into(),
            })
            .await?;

        info!(
            audit_type = %entry.log_type,
            target = entry.target_id.as_deref().unwrap_or("-"),
            audit_id = %entry.id,
            "{}",
            entry.action
        );
        Ok(entry)
    }
}
