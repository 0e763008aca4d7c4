//! Database models for employees.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{MemberEntry, SortOrder, Window};
use crate::types::{DepartmentId, EmployeeId, RoleId};

/// Database request for creating an employee. `username` is always set to `email` by the store.
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: String,
    pub role_id: RoleId,
    pub department: String,
    pub department_id: DepartmentId,
    pub password_hash: String,
}

/// Database request for updating an employee. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserUpdateDBRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<(RoleId, String)>,
    pub department: Option<(DepartmentId, String)>,
    pub password_hash: Option<String>,
}

impl UserUpdateDBRequest {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.role.is_none()
            && self.department.is_none()
            && self.password_hash.is_none()
    }
}

/// Database response for an employee
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserDBResponse {
    pub id: EmployeeId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub username: String,
    pub role: String,
    pub department: String,
    pub role_id: RoleId,
    pub department_id: DepartmentId,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserDBResponse {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn member_entry(&self) -> MemberEntry {
        MemberEntry {
            user_id: self.id,
            employee_name: self.full_name(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum UserSortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    FirstName,
    LastName,
    Email,
    Role,
    Department,
}

impl UserSortField {
    pub fn column(&self) -> &'static str {
        match self {
            UserSortField::CreatedAt => "created_at",
            UserSortField::UpdatedAt => "updated_at",
            UserSortField::FirstName => "first_name",
            UserSortField::LastName => "last_name",
            UserSortField::Email => "email",
            UserSortField::Role => "role",
            UserSortField::Department => "department",
        }
    }
}

/// Filter for listing employees. String criteria are case-insensitive substrings; `name`
/// matches either the first or the last name.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub name: Option<String>,
    pub role: Option<String>,
    pub department: Option<String>,
    pub department_id: Option<DepartmentId>,
    pub sort_by: UserSortField,
    pub sort_order: SortOrder,
    pub window: Window,
}

impl UserFilter {
    pub fn in_department(department_id: DepartmentId, window: Window) -> Self {
        Self {
            department_id: Some(department_id),
            window,
            ..Default::default()
        }
    }
}
