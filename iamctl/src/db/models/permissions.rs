use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{PermissionRef, SortOrder, Window};
use crate::types::PermissionId;

#[derive(Debug, Clone)]
pub struct PermissionCreateDBRequest {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct PermissionUpdateDBRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PermissionDBResponse {
    pub id: PermissionId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PermissionDBResponse {
    pub fn as_ref_entry(&self) -> PermissionRef {
        PermissionRef {
            permission_id: self.id,
            permission_name: self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum PermissionSortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Name,
}

impl PermissionSortField {
    pub fn column(&self) -> &'static str {
        match self {
            PermissionSortField::CreatedAt => "created_at",
            PermissionSortField::UpdatedAt => "updated_at",
            PermissionSortField::Name => "name",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PermissionFilter {
    pub name: Option<String>,
    pub sort_by: PermissionSortField,
    pub sort_order: SortOrder,
    pub window: Window,
}
