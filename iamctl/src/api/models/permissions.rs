use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    api::models::search::Page,
    db::models::{
        SortOrder,
        permissions::{PermissionDBResponse, PermissionFilter, PermissionSortField},
    },
    types::PermissionId,
};

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PermissionResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: PermissionId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PermissionDBResponse> for PermissionResponse {
    fn from(permission: PermissionDBResponse) -> Self {
        Self {
            id: permission.id,
            name: permission.name,
            description: permission.description,
            created_at: permission.created_at,
            updated_at: permission.updated_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct PermissionCreate {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct PermissionUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct PermissionSearch {
    pub name: Option<String>,
    pub sort_by: PermissionSortField,
    pub sort_order: SortOrder,
    #[serde(flatten)]
    pub page: Page,
}

impl From<PermissionSearch> for PermissionFilter {
    fn from(search: PermissionSearch) -> Self {
        Self {
            name: search.name.filter(|s| !s.trim().is_empty()),
            sort_by: search.sort_by,
            sort_order: search.sort_order,
            window: search.page.window(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PermissionBody {
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged: Option<bool>,
    pub permission: PermissionResponse,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PermissionListResponse {
    pub msg: String,
    pub permissions: Vec<PermissionResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_docs: Option<i64>,
}
