use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    api::models::search::Page,
    db::models::{
        SortOrder,
        users::{UserDBResponse, UserFilter, UserSortField},
    },
    types::{DepartmentId, EmployeeId, RoleId},
};

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: EmployeeId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: String,
    pub department: String,
    #[schema(value_type = String, format = "uuid")]
    pub role_id: RoleId,
    #[schema(value_type = String, format = "uuid")]
    pub department_id: DepartmentId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserDBResponse> for EmployeeResponse {
    fn from(user: UserDBResponse) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            role: user.role,
            department: user.department,
            role_id: user.role_id,
            department_id: user.department_id,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct EmployeeCreate {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Role name
    pub role: String,
    /// Department name. Ignored when creating through a department route.
    pub department: String,
}

/// Fields to change. Missing or blank fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct EmployeeUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub department: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct EmployeeSearch {
    /// Substring of the first or last name
    pub name: Option<String>,
    pub role: Option<String>,
    pub department: Option<String>,
    pub sort_by: UserSortField,
    pub sort_order: SortOrder,
    #[serde(flatten)]
    pub page: Page,
}

impl From<EmployeeSearch> for UserFilter {
    fn from(search: EmployeeSearch) -> Self {
        Self {
            name: search.name.filter(|s| !s.trim().is_empty()),
            role: search.role.filter(|s| !s.trim().is_empty()),
            department: search.department.filter(|s| !s.trim().is_empty()),
            department_id: None,
            sort_by: search.sort_by,
            sort_order: search.sort_order,
            window: search.page.window(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EmployeeBody {
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged: Option<bool>,
    pub employee: EmployeeResponse,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeListResponse {
    pub msg: String,
    pub employees: Vec<EmployeeResponse>,
    pub total_docs: i64,
}
