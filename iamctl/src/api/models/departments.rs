use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    api::models::{MemberResponse, search::Page},
    db::models::{
        SortOrder,
        departments::{DepartmentDBResponse, DepartmentFilter, DepartmentSortField},
    },
    types::{DepartmentId, EmployeeId},
};

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: DepartmentId,
    pub name: String,
    pub description: String,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub manager_id: Option<EmployeeId>,
    pub manager_name: Option<String>,
    pub employees: Vec<MemberResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DepartmentDBResponse> for DepartmentResponse {
    fn from(department: DepartmentDBResponse) -> Self {
        Self {
            id: department.id,
            name: department.name,
            description: department.description,
            manager_id: department.manager_id,
            manager_name: department.manager_name,
            employees: department.employees.into_iter().map(Into::into).collect(),
            created_at: department.created_at,
            updated_at: department.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DepartmentSummary {
    #[schema(value_type = String, format = "uuid")]
    pub id: DepartmentId,
    pub name: String,
}

impl From<DepartmentDBResponse> for DepartmentSummary {
    fn from(department: DepartmentDBResponse) -> Self {
        Self {
            id: department.id,
            name: department.name,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct DepartmentCreate {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct DepartmentUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct DepartmentSearch {
    pub name: Option<String>,
    pub manager_name: Option<String>,
    /// Departments with any employee whose name contains one of these
    pub employees: Vec<String>,
    pub sort_by: DepartmentSortField,
    pub sort_order: SortOrder,
    #[serde(flatten)]
    pub page: Page,
}

impl From<DepartmentSearch> for DepartmentFilter {
    fn from(search: DepartmentSearch) -> Self {
        Self {
            name: search.name.filter(|s| !s.trim().is_empty()),
            manager_name: search.manager_name.filter(|s| !s.trim().is_empty()),
            employees: search.employees.into_iter().filter(|e| !e.trim().is_empty()).collect(),
            sort_by: search.sort_by,
            sort_order: search.sort_order,
            window: search.page.window(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DepartmentBody {
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged: Option<bool>,
    pub department: DepartmentResponse,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentListResponse {
    pub msg: String,
    pub departments: Vec<DepartmentResponse>,
    pub total_docs: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DepartmentSummaryResponse {
    pub msg: String,
    pub departments: Vec<DepartmentSummary>,
}
