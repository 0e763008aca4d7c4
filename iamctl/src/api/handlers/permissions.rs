use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::{
        handlers::non_blank,
        models::{
            AcknowledgedResponse,
            permissions::{PermissionBody, PermissionCreate, PermissionListResponse, PermissionResponse, PermissionSearch, PermissionUpdate},
        },
    },
    audit::{Actor, kinds},
    auth::authorization::{RequiresRole, policy},
    db::models::permissions::{PermissionCreateDBRequest, PermissionDBResponse, PermissionFilter, PermissionUpdateDBRequest},
    errors::{CommitStage, Error, PostCommit, Result},
    types::{PermissionId, parse_id},
};

async fn load_permission(state: &AppState, id: PermissionId) -> Result<PermissionDBResponse> {
    state.store.get_permission(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Permission".to_string(),
        id: id.to_string(),
    })
}

/// List every permission
#[utoipa::path(
    get,
    path = "/permissions",
    tag = "permissions",
    responses(
        (status = 200, description = "All permissions", body = PermissionListResponse),
        (status = 401, description = "Not authenticated or not allowed"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_permissions(
    State(state): State<AppState>,
    _: RequiresRole<policy::AdminsAndOperators>,
) -> Result<Json<PermissionListResponse>> {
    let permissions = state.store.all_permissions().await?;
    Ok(Json(PermissionListResponse {
        msg: "All Permissions".to_string(),
        permissions: permissions.into_iter().map(PermissionResponse::from).collect(),
        total_docs: None,
    }))
}

/// Create a permission
#[utoipa::path(
    post,
    path = "/permissions",
    tag = "permissions",
    request_body = PermissionCreate,
    responses(
        (status = 201, description = "Permission created", body = PermissionBody),
        (status = 400, description = "Missing fields"),
        (status = 401, description = "Not authenticated or not allowed"),
        (status = 409, description = "Permission name taken"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_permission(
    State(state): State<AppState>,
    auth: RequiresRole<policy::AdminsOnly>,
    Json(request): Json<PermissionCreate>,
) -> Result<(StatusCode, Json<PermissionBody>)> {
    let name = request.name.trim();
    let description = request.description.trim();
    if name.is_empty() || description.is_empty() {
        return Err(Error::BadRequest {
            message: "Name and description cannot be Empty".to_string(),
        });
    }

    let permission = state
        .store
        .create_permission(&PermissionCreateDBRequest {
            name: name.to_string(),
            description: description.to_string(),
        })
        .await?;

    let mut post = PostCommit::new();
    post.record(
        CommitStage::Audit,
        state
            .audit
            .record(
                kinds::PERMISSION_CREATED,
                &Actor::from(&auth.principal),
                Some(permission.id.to_string()),
                format!("New Permission named {} is Created.", permission.name),
            )
            .await,
    );
    post.finish()?;

    Ok((
        StatusCode::CREATED,
        Json(PermissionBody {
            msg: "Permission created successfully".to_string(),
            acknowledged: Some(true),
            permission: permission.into(),
        }),
    ))
}

/// Search permissions
#[utoipa::path(
    post,
    path = "/permissions/search",
    tag = "permissions",
    request_body = PermissionSearch,
    responses(
        (status = 200, description = "One page of matching permissions", body = PermissionListResponse),
        (status = 401, description = "Not authenticated or not allowed"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn search_permissions(
    State(state): State<AppState>,
    _: RequiresRole<policy::AdminsOnly>,
    Json(search): Json<PermissionSearch>,
) -> Result<Json<PermissionListResponse>> {
    let (permissions, total) = state.store.list_permissions(&PermissionFilter::from(search)).await?;
    Ok(Json(PermissionListResponse {
        msg: "All Permissions".to_string(),
        permissions: permissions.into_iter().map(PermissionResponse::from).collect(),
        total_docs: Some(total),
    }))
}

/// Get a permission
#[utoipa::path(
    get,
    path = "/permissions/{perm_id}",
    tag = "permissions",
    params(("perm_id" = String, Path, description = "Permission id")),
    responses(
        (status = 200, description = "Permission details", body = PermissionBody),
        (status = 400, description = "Malformed id"),
        (status = 401, description = "Not authenticated or not allowed"),
        (status = 404, description = "No such permission"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_permission(
    State(state): State<AppState>,
    Path(perm_id): Path<String>,
    _: RequiresRole<policy::AdminsOnly>,
) -> Result<Json<PermissionBody>> {
    let permission = load_permission(&state, parse_id(&perm_id, "Permission")?).await?;
    Ok(Json(PermissionBody {
        msg: "Permission data".to_string(),
        acknowledged: None,
        permission: permission.into(),
    }))
}

/// Update a permission
#[utoipa::path(
    put,
    path = "/permissions/{perm_id}",
    tag = "permissions",
    params(("perm_id" = String, Path, description = "Permission id")),
    request_body = PermissionUpdate,
    responses(
        (status = 200, description = "Permission updated; role caches refreshed on rename", body = PermissionBody),
        (status = 400, description = "Malformed id or nothing to update"),
        (status = 401, description = "Not authenticated or not allowed"),
        (status = 404, description = "No such permission"),
        (status = 409, description = "Permission name taken"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_permission(
    State(state): State<AppState>,
    Path(perm_id): Path<String>,
    auth: RequiresRole<policy::AdminsOnly>,
    Json(request): Json<PermissionUpdate>,
) -> Result<Json<PermissionBody>> {
    let permission = load_permission(&state, parse_id(&perm_id, "Permission")?).await?;

    let changes = PermissionUpdateDBRequest {
        name: non_blank(request.name).filter(|name| *name != permission.name),
        description: non_blank(request.description),
    };
    if changes.name.is_none() && changes.description.is_none() {
        return Err(Error::BadRequest {
            message: "No valid fields to update".to_string(),
        });
    }

    let updated = state.store.update_permission(permission.id, &changes).await?;

    let mut post = PostCommit::new();
    if changes.name.is_some() {
        post.record(
            CommitStage::Membership,
            state.integrity.rename_permission(updated.id, &updated.name).await,
        );
    }
    post.record(
        CommitStage::Audit,
        state
            .audit
            .record(
                kinds::PERMISSION_UPDATED,
                &Actor::from(&auth.principal),
                Some(updated.id.to_string()),
                format!("Permission named {} is Updated.", updated.name),
            )
            .await,
    );
    post.finish()?;

    Ok(Json(PermissionBody {
        msg: "Permission updated successfully".to_string(),
        acknowledged: Some(true),
        permission: updated.into(),
    }))
}

/// Delete a permission
#[utoipa::path(
    delete,
    path = "/permissions/{perm_id}",
    tag = "permissions",
    params(("perm_id" = String, Path, description = "Permission id")),
    responses(
        (status = 200, description = "Permission deleted and removed from every role", body = AcknowledgedResponse),
        (status = 400, description = "Malformed id"),
        (status = 401, description = "Not authenticated or not allowed"),
        (status = 404, description = "No such permission"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_permission(
    State(state): State<AppState>,
    Path(perm_id): Path<String>,
    auth: RequiresRole<policy::AdminsOnly>,
) -> Result<Json<AcknowledgedResponse>> {
    let permission = load_permission(&state, parse_id(&perm_id, "Permission")?).await?;
    if !state.store.delete_permission(permission.id).await? {
        return Err(Error::NotFound {
            resource: "Permission".to_string(),
            id: permission.id.to_string(),
        });
    }

    let mut post = PostCommit::new();
    post.record(CommitStage::Membership, state.integrity.detach_permission(permission.id).await);
    post.record(
        CommitStage::Audit,
        state
            .audit
            .record(
                kinds::PERMISSION_DELETED,
                &Actor::from(&auth.principal),
                Some(permission.id.to_string()),
                format!("Permission named {} is Deleted.", permission.name),
            )
            .await,
    );
    post.finish()?;

    Ok(Json(AcknowledgedResponse::new("Permission data deleted successfully")))
}
