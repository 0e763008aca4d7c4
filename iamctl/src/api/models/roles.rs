use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    api::models::{MemberResponse, PermissionRefResponse, search::Page},
    db::models::{
        SortOrder,
        roles::{RoleDBResponse, RoleFilter, RoleSortField},
    },
    types::RoleId,
};

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: RoleId,
    pub name: String,
    pub description: String,
    pub permissions: Vec<PermissionRefResponse>,
    pub employees: Vec<MemberResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RoleDBResponse> for RoleResponse {
    fn from(role: RoleDBResponse) -> Self {
        Self {
            id: role.id,
            name: role.name,
            description: role.description,
            permissions: role.permissions.into_iter().map(Into::into).collect(),
            employees: role.employees.into_iter().map(Into::into).collect(),
            created_at: role.created_at,
            updated_at: role.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoleSummary {
    #[schema(value_type = String, format = "uuid")]
    pub id: RoleId,
    pub name: String,
}

impl From<RoleDBResponse> for RoleSummary {
    fn from(role: RoleDBResponse) -> Self {
        Self { id: role.id, name: role.name }
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct RoleCreate {
    pub name: String,
    pub description: String,
    /// At least one permission id
    pub permission_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct RoleUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub add_permissions: Vec<String>,
    pub remove_permissions: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct RoleSearch {
    pub name: Option<String>,
    /// Roles holding any permission whose name contains one of these
    pub permissions: Vec<String>,
    pub sort_by: RoleSortField,
    pub sort_order: SortOrder,
    #[serde(flatten)]
    pub page: Page,
}

impl From<RoleSearch> for RoleFilter {
    fn from(search: RoleSearch) -> Self {
        Self {
            name: search.name.filter(|s| !s.trim().is_empty()),
            permissions: search.permissions.into_iter().filter(|p| !p.trim().is_empty()).collect(),
            sort_by: search.sort_by,
            sort_order: search.sort_order,
            window: search.page.window(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoleBody {
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged: Option<bool>,
    pub role: RoleResponse,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleListResponse {
    pub msg: String,
    pub roles: Vec<RoleResponse>,
    pub total_docs: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoleSummaryResponse {
    pub msg: String,
    pub roles: Vec<RoleSummary>,
}
