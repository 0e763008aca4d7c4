use axum::{
    Json,
    extract::{Path, State},
};

use crate::{
    AppState,
    api::models::audit_logs::{AuditLogBody, AuditLogListResponse, AuditLogResponse, AuditLogSearch},
    auth::authorization::{RequiresRole, policy},
    db::models::audit_logs::AuditLogFilter,
    errors::{Error, Result},
    types::parse_id,
};

/// Search the audit trail
#[utoipa::path(
    post,
    path = "/audit-logs/search",
    tag = "audit",
    request_body = AuditLogSearch,
    responses(
        (status = 200, description = "One page of matching audit entries", body = AuditLogListResponse),
        (status = 401, description = "Not authenticated or not allowed"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn search_audit_logs(
    State(state): State<AppState>,
    _: RequiresRole<policy::AdminsOnly>,
    Json(search): Json<AuditLogSearch>,
) -> Result<Json<AuditLogListResponse>> {
    let (logs, total) = state.store.list_audit_logs(&AuditLogFilter::from(search)).await?;
    Ok(Json(AuditLogListResponse {
        msg: "All Audit Logs".to_string(),
        audit_logs: logs.into_iter().map(AuditLogResponse::from).collect(),
        total_docs: total,
    }))
}

/// Get one audit entry
#[utoipa::path(
    get,
    path = "/audit-logs/{audit_id}",
    tag = "audit",
    params(("audit_id" = String, Path, description = "Audit log id")),
    responses(
        (status = 200, description = "Audit entry", body = AuditLogBody),
        (status = 400, description = "Malformed id"),
        (status = 401, description = "Not authenticated or not allowed"),
        (status = 404, description = "No such audit entry"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_audit_log(
    State(state): State<AppState>,
    Path(audit_id): Path<String>,
    _: RequiresRole<policy::AdminsOnly>,
) -> Result<Json<AuditLogBody>> {
    let id = parse_id(&audit_id, "Audit Log")?;
    let log = state.store.get_audit_log(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Audit Log".to_string(),
        id: id.to_string(),
    })?;
    Ok(Json(AuditLogBody {
        msg: "Audit Log Details".to_string(),
        audit_log: log.into(),
    }))
}
