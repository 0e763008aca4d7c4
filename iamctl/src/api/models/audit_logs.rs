use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    api::models::search::Page,
    db::models::{
        SortOrder,
        audit_logs::{AuditLogDBResponse, AuditLogFilter, AuditLogSortField},
    },
    types::{AuditLogId, EmployeeId},
};

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: AuditLogId,
    #[serde(rename = "type")]
    pub log_type: String,
    /// Name of the actor at the time of the action
    pub user_name: String,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub actor_id: Option<EmployeeId>,
    pub target_id: Option<String>,
    pub action: String,
    pub created_at: DateTime<Utc>,
}

impl From<AuditLogDBResponse> for AuditLogResponse {
    fn from(log: AuditLogDBResponse) -> Self {
        Self {
            id: log.id,
            log_type: log.log_type,
            user_name: log.user_name,
            actor_id: log.actor_id,
            target_id: log.target_id,
            action: log.action,
            created_at: log.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct AuditLogSearch {
    /// Substring of the audit type
    #[serde(rename = "type")]
    pub log_type: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub actor_id: Option<EmployeeId>,
    /// Inclusive lower bound on `createdAt`
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `createdAt`
    pub to: Option<DateTime<Utc>>,
    pub sort_by: AuditLogSortField,
    pub sort_order: SortOrder,
    #[serde(flatten)]
    pub page: Page,
}

impl From<AuditLogSearch> for AuditLogFilter {
    fn from(search: AuditLogSearch) -> Self {
        Self {
            log_type: search.log_type.filter(|s| !s.trim().is_empty()),
            actor_id: search.actor_id,
            from: search.from,
            to: search.to,
            sort_by: search.sort_by,
            sort_order: search.sort_order,
            window: search.page.window(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogBody {
    pub msg: String,
    pub audit_log: AuditLogResponse,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogListResponse {
    pub msg: String,
    pub audit_logs: Vec<AuditLogResponse>,
    pub total_docs: i64,
}
