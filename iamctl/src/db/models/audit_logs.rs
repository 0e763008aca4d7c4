//! Database models for the append-only audit log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{SortOrder, Window};
use crate::types::{AuditLogId, EmployeeId};

#[derive(Debug, Clone)]
pub struct AuditLogCreateDBRequest {
    pub log_type: String,
    pub user_name: String,
    pub actor_id: Option<EmployeeId>,
    pub target_id: Option<String>,
    pub action: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuditLogDBResponse {
    pub id: AuditLogId,
    pub log_type: String,
    pub user_name: String,
    pub actor_id: Option<EmployeeId>,
    pub target_id: Option<String>,
    pub action: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum AuditLogSortField {
    #[default]
    CreatedAt,
    Type,
    UserName,
}

impl AuditLogSortField {
    pub fn column(&self) -> &'static str {
        match self {
            AuditLogSortField::CreatedAt => "created_at",
            AuditLogSortField::Type => "log_type",
            AuditLogSortField::UserName => "user_name",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub log_type: Option<String>,
    pub actor_id: Option<EmployeeId>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub sort_by: AuditLogSortField,
    pub sort_order: SortOrder,
    pub window: Window,
}
