use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use std::collections::HashSet;

use crate::{
    AppState,
    api::{
        handlers::non_blank,
        models::{
            AcknowledgedResponse,
            roles::{RoleBody, RoleCreate, RoleListResponse, RoleResponse, RoleSearch, RoleSummary, RoleSummaryResponse, RoleUpdate},
        },
    },
    audit::{Actor, kinds},
    auth::authorization::{RequiresRole, policy},
    db::{
        errors::DbError,
        models::{
            PermissionRef,
            roles::{RoleCreateDBRequest, RoleDBResponse, RoleFilter, RoleUpdateDBRequest},
        },
    },
    errors::{CommitStage, Error, PostCommit, Result},
    types::{Operation, PermissionId, RoleId, parse_id, roles},
};

fn bad_request(message: &str) -> Error {
    Error::BadRequest {
        message: message.to_string(),
    }
}

fn protected(operation: Operation, role: &RoleDBResponse) -> Error {
    Error::Database(DbError::ProtectedEntity {
        operation,
        reason: "built-in role".to_string(),
        entity_type: "role".to_string(),
        entity_id: Some(role.id.to_string()),
    })
}

async fn load_role(state: &AppState, id: RoleId) -> Result<RoleDBResponse> {
    state.store.get_role(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Role".to_string(),
        id: id.to_string(),
    })
}

/// Parse permission ids, dropping duplicates.
fn parse_permission_ids(raw: &[String]) -> Result<Vec<PermissionId>> {
    let mut seen = HashSet::new();
    let mut ids = Vec::with_capacity(raw.len());
    for value in raw {
        let id = parse_id(value, "Permission").map_err(|_| bad_request("Object Ids of permissions are not valid"))?;
        if seen.insert(id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// Resolve ids to permission refs, failing with `missing` unless all of them exist.
async fn resolve_permissions(state: &AppState, ids: &[PermissionId], missing: &str) -> Result<Vec<PermissionRef>> {
    let found = state.store.get_permissions(ids).await?;
    if found.len() != ids.len() {
        return Err(bad_request(missing));
    }
    Ok(found.iter().map(|p| p.as_ref_entry()).collect())
}

/// List role ids and names
#[utoipa::path(
    get,
    path = "/roles",
    tag = "roles",
    responses(
        (status = 200, description = "Every role's id and name", body = RoleSummaryResponse),
        (status = 401, description = "Not authenticated or not allowed"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_roles(State(state): State<AppState>, _: RequiresRole<policy::AdminsAndOperators>) -> Result<Json<RoleSummaryResponse>> {
    let roles = state.store.all_roles().await?;
    Ok(Json(RoleSummaryResponse {
        msg: "All Roles with name and Id".to_string(),
        roles: roles.into_iter().map(RoleSummary::from).collect(),
    }))
}

/// Create a role
#[utoipa::path(
    post,
    path = "/roles",
    tag = "roles",
    request_body = RoleCreate,
    responses(
        (status = 201, description = "Role created", body = RoleBody),
        (status = 400, description = "Missing fields or unknown permissions"),
        (status = 401, description = "Not authenticated or not allowed"),
        (status = 409, description = "Role name taken"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_role(
    State(state): State<AppState>,
    auth: RequiresRole<policy::AdminsOnly>,
    Json(request): Json<RoleCreate>,
) -> Result<(StatusCode, Json<RoleBody>)> {
    let name = request.name.trim();
    let description = request.description.trim();
    if name.is_empty() || description.is_empty() {
        return Err(bad_request("Name and description cannot be Empty"));
    }

    let ids = parse_permission_ids(&request.permission_ids)?;
    if ids.is_empty() {
        return Err(bad_request("Object Ids of permissions are not valid"));
    }
    let permissions = resolve_permissions(&state, &ids, "Some or all Permissions do not exist").await?;

    let role = state
        .store
        .create_role(&RoleCreateDBRequest {
            name: name.to_string(),
            description: description.to_string(),
            permissions,
        })
        .await?;

    let mut post = PostCommit::new();
    post.record(
        CommitStage::Audit,
        state
            .audit
            .record(
                kinds::ROLE_CREATED,
                &Actor::from(&auth.principal),
                Some(role.id.to_string()),
                format!("New Role named {} is Created.", role.name),
            )
            .await,
    );
    post.finish()?;

    Ok((
        StatusCode::CREATED,
        Json(RoleBody {
            msg: "Role created Successfully".to_string(),
            acknowledged: Some(true),
            role: role.into(),
        }),
    ))
}

/// Search roles
#[utoipa::path(
    post,
    path = "/roles/search",
    tag = "roles",
    request_body = RoleSearch,
    responses(
        (status = 200, description = "One page of matching roles", body = RoleListResponse),
        (status = 401, description = "Not authenticated or not allowed"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn search_roles(
    State(state): State<AppState>,
    _: RequiresRole<policy::AdminsOnly>,
    Json(search): Json<RoleSearch>,
) -> Result<Json<RoleListResponse>> {
    let (roles, total) = state.store.list_roles(&RoleFilter::from(search)).await?;
    Ok(Json(RoleListResponse {
        msg: "All Roles".to_string(),
        roles: roles.into_iter().map(RoleResponse::from).collect(),
        total_docs: total,
    }))
}

/// Get a role
#[utoipa::path(
    get,
    path = "/roles/{role_id}",
    tag = "roles",
    params(("role_id" = String, Path, description = "Role id")),
    responses(
        (status = 200, description = "Role details", body = RoleBody),
        (status = 400, description = "Malformed id"),
        (status = 401, description = "Not authenticated or not allowed"),
        (status = 404, description = "No such role"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_role(State(state): State<AppState>, Path(role_id): Path<String>, _: RequiresRole<policy::AdminsOnly>) -> Result<Json<RoleBody>> {
    let role = load_role(&state, parse_id(&role_id, "Role")?).await?;
    Ok(Json(RoleBody {
        msg: "Role Details".to_string(),
        acknowledged: None,
        role: role.into(),
    }))
}

/// Update a role
#[utoipa::path(
    put,
    path = "/roles/{role_id}",
    tag = "roles",
    params(("role_id" = String, Path, description = "Role id")),
    request_body = RoleUpdate,
    responses(
        (status = 200, description = "Role updated", body = RoleBody),
        (status = 400, description = "Malformed id, nothing to update, or unknown permissions"),
        (status = 401, description = "Not authenticated or not allowed"),
        (status = 403, description = "Built-in roles cannot be renamed"),
        (status = 404, description = "No such role"),
        (status = 409, description = "Role name taken"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_role(
    State(state): State<AppState>,
    Path(role_id): Path<String>,
    auth: RequiresRole<policy::AdminsOnly>,
    Json(request): Json<RoleUpdate>,
) -> Result<Json<RoleBody>> {
    let role = load_role(&state, parse_id(&role_id, "Role")?).await?;

    let name = non_blank(request.name).filter(|name| *name != role.name);
    if name.is_some() && roles::is_builtin(&role.name) {
        return Err(protected(Operation::Rename, &role));
    }
    let description = non_blank(request.description);

    let added = parse_permission_ids(&request.add_permissions)?;
    let removed = parse_permission_ids(&request.remove_permissions)?;
    let permissions = if added.is_empty() && removed.is_empty() {
        None
    } else {
        let added = resolve_permissions(&state, &added, "Some or all Permission added does not exist").await?;
        resolve_permissions(&state, &removed, "Some or all Permission removed does not exist").await?;

        let mut permissions: Vec<PermissionRef> = role
            .permissions
            .iter()
            .filter(|p| !removed.contains(&p.permission_id))
            .cloned()
            .collect();
        for permission in added {
            if !permissions.iter().any(|p| p.permission_id == permission.permission_id) {
                permissions.push(permission);
            }
        }
        Some(permissions)
    };

    let changes = RoleUpdateDBRequest {
        name,
        description,
        permissions,
    };
    if changes.name.is_none() && changes.description.is_none() && changes.permissions.is_none() {
        return Err(bad_request("No valid fields to update"));
    }

    let updated = state.store.update_role(role.id, &changes).await?;

    let mut post = PostCommit::new();
    if changes.name.is_some() {
        post.record(CommitStage::Membership, state.integrity.rename_role(updated.id, &updated.name).await);
    }
    post.record(
        CommitStage::Audit,
        state
            .audit
            .record(
                kinds::ROLE_UPDATED,
                &Actor::from(&auth.principal),
                Some(updated.id.to_string()),
                format!("Role named {} is Updated.", updated.name),
            )
            .await,
    );
    post.finish()?;

    Ok(Json(RoleBody {
        msg: "Role updated Successfully".to_string(),
        acknowledged: Some(true),
        role: updated.into(),
    }))
}

/// Delete a role
#[utoipa::path(
    delete,
    path = "/roles/{role_id}",
    tag = "roles",
    params(("role_id" = String, Path, description = "Role id")),
    responses(
        (status = 200, description = "Role deleted", body = AcknowledgedResponse),
        (status = 400, description = "Malformed id"),
        (status = 401, description = "Not authenticated or not allowed"),
        (status = 403, description = "Built-in roles cannot be deleted"),
        (status = 404, description = "No such role"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_role(
    State(state): State<AppState>,
    Path(role_id): Path<String>,
    auth: RequiresRole<policy::AdminsOnly>,
) -> Result<Json<AcknowledgedResponse>> {
    let role = load_role(&state, parse_id(&role_id, "Role")?).await?;
    if roles::is_builtin(&role.name) {
        return Err(protected(Operation::Delete, &role));
    }

    if !state.store.delete_role(role.id).await? {
        return Err(Error::NotFound {
            resource: "Role".to_string(),
            id: role.id.to_string(),
        });
    }
    if !role.employees.is_empty() {
        tracing::warn!(role = %role.name, employees = role.employees.len(), "Deleted role still had employees");
    }

    let mut post = PostCommit::new();
    post.record(
        CommitStage::Audit,
        state
            .audit
            .record(
                kinds::ROLE_DELETED,
                &Actor::from(&auth.principal),
                Some(role.id.to_string()),
                format!("Role named {} is Deleted.", role.name),
            )
            .await,
    );
    post.finish()?;

    Ok(Json(AcknowledgedResponse::new("Role data deleted successfully")))
}
