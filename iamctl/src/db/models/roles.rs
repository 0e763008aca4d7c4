//! Database models for roles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{MemberEntry, PermissionRef, SortOrder, Window};
use crate::types::RoleId;

#[derive(Debug, Clone)]
pub struct RoleCreateDBRequest {
    pub name: String,
    pub description: String,
    pub permissions: Vec<PermissionRef>,
}

#[derive(Debug, Clone, Default)]
pub struct RoleUpdateDBRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Replacement permission cache
    pub permissions: Option<Vec<PermissionRef>>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RoleDBResponse {
    pub id: RoleId,
    pub name: String,
    pub description: String,
    #[sqlx(json)]
    pub permissions: Vec<PermissionRef>,
    #[sqlx(json)]
    pub employees: Vec<MemberEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum RoleSortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Name,
}

impl RoleSortField {
    pub fn column(&self) -> &'static str {
        match self {
            RoleSortField::CreatedAt => "created_at",
            RoleSortField::UpdatedAt => "updated_at",
            RoleSortField::Name => "name",
        }
    }
}

/// Filter for role search. A role matches `permissions` when it carries every listed
/// permission name.
#[derive(Debug, Clone, Default)]
pub struct RoleFilter {
    pub name: Option<String>,
    pub permissions: Vec<String>,
    pub sort_by: RoleSortField,
    pub sort_order: SortOrder,
    pub window: Window,
}
