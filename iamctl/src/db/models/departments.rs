//! Database models for departments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{MemberEntry, SortOrder, Window};
use crate::types::{DepartmentId, EmployeeId};

#[derive(Debug, Clone)]
pub struct DepartmentCreateDBRequest {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct DepartmentUpdateDBRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DepartmentDBResponse {
    pub id: DepartmentId,
    pub name: String,
    pub description: String,
    pub manager_id: Option<EmployeeId>,
    pub manager_name: Option<String>,
    #[sqlx(json)]
    pub employees: Vec<MemberEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DepartmentDBResponse {
    pub fn has_member(&self, user_id: EmployeeId) -> bool {
        self.employees.iter().any(|e| e.user_id == user_id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum DepartmentSortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Name,
    ManagerName,
}

impl DepartmentSortField {
    pub fn column(&self) -> &'static str {
        match self {
            DepartmentSortField::CreatedAt => "created_at",
            DepartmentSortField::UpdatedAt => "updated_at",
            DepartmentSortField::Name => "name",
            DepartmentSortField::ManagerName => "manager_name",
        }
    }
}

/// Filter for department search. `employees` matches departments with at least one member
/// whose cached name contains any listed value.
#[derive(Debug, Clone, Default)]
pub struct DepartmentFilter {
    pub name: Option<String>,
    pub manager_name: Option<String>,
    pub employees: Vec<String>,
    pub sort_by: DepartmentSortField,
    pub sort_order: SortOrder,
    pub window: Window,
}
