use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::info;

use crate::{
    AppState,
    api::{
        handlers::non_blank,
        models::{
            AcknowledgedResponse,
            users::{EmployeeBody, EmployeeCreate, EmployeeListResponse, EmployeeResponse, EmployeeSearch, EmployeeUpdate},
        },
    },
    audit::{Actor, kinds},
    auth::{
        Principal,
        authorization::{RequiresRole, policy},
        password::{self, Argon2Params},
        sessions,
    },
    db::models::{
        departments::DepartmentDBResponse,
        roles::RoleDBResponse,
        users::{UserCreateDBRequest, UserDBResponse, UserFilter, UserUpdateDBRequest},
    },
    email::CredentialContext,
    errors::{CommitStage, Error, PostCommit, Result},
    types::{DepartmentId, EmployeeId, abbrev_uuid, parse_id},
};

pub(crate) fn employee_not_found(id: EmployeeId) -> Error {
    Error::NotFound {
        resource: "Employee".to_string(),
        id: id.to_string(),
    }
}

/// Load an employee, optionally requiring membership of `department`.
pub(crate) async fn load_employee(state: &AppState, id: EmployeeId, department: Option<DepartmentId>) -> Result<UserDBResponse> {
    match state.store.get_user(id).await? {
        Some(user) if department.is_none_or(|d| d == user.department_id) => Ok(user),
        _ => Err(employee_not_found(id)),
    }
}

async fn role_named(state: &AppState, name: &str) -> Result<RoleDBResponse> {
    state.store.get_role_by_name(name).await?.ok_or_else(|| Error::BadRequest {
        message: "No such Role exists".to_string(),
    })
}

async fn department_named(state: &AppState, name: &str) -> Result<DepartmentDBResponse> {
    state.store.get_department_by_name(name).await?.ok_or_else(|| Error::BadRequest {
        message: "No such Department exists".to_string(),
    })
}

/// Create an employee with a generated credential, then attach memberships, audit and mail
/// the credential. `department` overrides the department named in the request.
pub(crate) async fn create_employee_record(
    state: &AppState,
    principal: &Principal,
    request: EmployeeCreate,
    department: Option<DepartmentDBResponse>,
) -> Result<UserDBResponse> {
    let first_name = request.first_name.trim();
    let last_name = request.last_name.trim();
    let email = request.email.trim();
    let role_name = request.role.trim();
    let department_name = request.department.trim();
    if first_name.is_empty() || last_name.is_empty() || email.is_empty() || role_name.is_empty() || (department.is_none() && department_name.is_empty())
    {
        return Err(Error::BadRequest {
            message: "First, last name, email , role and department cannot be empty".to_string(),
        });
    }

    let role = role_named(state, role_name).await?;
    let department = match department {
        Some(department) => department,
        None => department_named(state, department_name).await?,
    };

    let password_config = &state.config.auth.password;
    let initial_password = password::generate_password(password_config.generated_length.max(password_config.min_length));
    let password_hash = password::hash_password(&initial_password, Argon2Params::from(password_config)).await?;

    let user = state
        .store
        .create_user(&UserCreateDBRequest {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            role: role.name.clone(),
            role_id: role.id,
            department: department.name.clone(),
            department_id: department.id,
            password_hash,
        })
        .await?;
    info!(emp_id = %abbrev_uuid(&user.id), role = %user.role, "Employee created");

    let mut post = PostCommit::new();
    post.record(CommitStage::Membership, state.integrity.attach(&user).await);
    post.record(
        CommitStage::Audit,
        state
            .audit
            .record(
                kinds::EMPLOYEE_CREATED,
                &Actor::from(principal),
                Some(user.id.to_string()),
                format!(
                    "New Employee named {} is Created having role of {} in the {} Department.",
                    user.full_name(),
                    user.role,
                    user.department
                ),
            )
            .await,
    );
    post.record(
        CommitStage::Mail,
        state
            .email
            .send_credential_email(
                &user.email,
                &CredentialContext {
                    name: user.full_name(),
                    username: user.username.clone(),
                    password: initial_password,
                    role: user.role.clone(),
                    department: user.department.clone(),
                },
            )
            .await,
    );
    post.finish()?;

    Ok(user)
}

/// Apply a partial update under the employee's lock and propagate it to the caches.
pub(crate) async fn update_employee_record(
    state: &AppState,
    principal: &Principal,
    id: EmployeeId,
    request: EmployeeUpdate,
    department: Option<DepartmentId>,
) -> Result<UserDBResponse> {
    let _lock = state.integrity.lock_user(id).await;
    let before = load_employee(state, id, department).await?;

    let mut changes = UserUpdateDBRequest {
        first_name: non_blank(request.first_name),
        last_name: non_blank(request.last_name),
        email: non_blank(request.email),
        ..Default::default()
    };
    if let Some(name) = non_blank(request.role) {
        let role = role_named(state, &name).await?;
        changes.role = Some((role.id, role.name));
    }
    if let Some(name) = non_blank(request.department) {
        let department = department_named(state, &name).await?;
        changes.department = Some((department.id, department.name));
    }
    if changes.is_empty() {
        return Err(Error::BadRequest {
            message: "No valid fields to update".to_string(),
        });
    }

    let after = state.store.update_user(id, &changes).await?;

    let mut post = PostCommit::new();
    if before.email != after.email {
        post.record(
            CommitStage::Credentials,
            state
                .store
                .delete_reset_tokens_for_email(&before.email)
                .await
                .map_err(Error::from),
        );
    }
    post.record(CommitStage::Membership, state.integrity.propagate(&before, &after).await);
    post.record(
        CommitStage::Audit,
        state
            .audit
            .record(
                kinds::EMPLOYEE_UPDATED,
                &Actor::from(principal),
                Some(after.id.to_string()),
                format!("Employee named {} is Updated.", after.full_name()),
            )
            .await,
    );
    post.finish()?;

    Ok(after)
}

/// End the refresh session and outstanding reset tokens of a removed employee.
async fn revoke_access(state: &AppState, user: &UserDBResponse) -> Result<()> {
    sessions::revoke(state.store.as_ref(), user.id).await?;
    let purged = state.store.delete_reset_tokens_for_email(&user.email).await?;
    if purged > 0 {
        info!(emp_id = %abbrev_uuid(&user.id), purged, "Purged reset tokens of deleted employee");
    }
    Ok(())
}

/// Delete an employee under its lock and detach it from the caches.
pub(crate) async fn delete_employee_record(
    state: &AppState,
    principal: &Principal,
    id: EmployeeId,
    department: Option<DepartmentId>,
) -> Result<()> {
    let _lock = state.integrity.lock_user(id).await;
    let user = load_employee(state, id, department).await?;

    if !state.store.delete_user(id).await? {
        return Err(employee_not_found(id));
    }
    info!(emp_id = %abbrev_uuid(&id), "Employee deleted");

    let mut post = PostCommit::new();
    post.record(CommitStage::Credentials, revoke_access(state, &user).await);
    post.record(CommitStage::Membership, state.integrity.detach(&user).await);
    post.record(
        CommitStage::Audit,
        state
            .audit
            .record(
                kinds::EMPLOYEE_DELETED,
                &Actor::from(principal),
                Some(id.to_string()),
                format!("Employee named {} is Deleted.", user.full_name()),
            )
            .await,
    );
    post.finish()
}

pub(crate) fn employee_list(users: Vec<UserDBResponse>, total: i64, msg: &str) -> EmployeeListResponse {
    EmployeeListResponse {
        msg: msg.to_string(),
        employees: users.into_iter().map(EmployeeResponse::from).collect(),
        total_docs: total,
    }
}

/// Create an employee
#[utoipa::path(
    post,
    path = "/users",
    tag = "employees",
    request_body = EmployeeCreate,
    responses(
        (status = 201, description = "Employee created; credentials emailed", body = EmployeeBody),
        (status = 400, description = "Missing fields or unknown role/department"),
        (status = 401, description = "Not authenticated or not allowed"),
        (status = 409, description = "Email already in use"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_employee(
    State(state): State<AppState>,
    auth: RequiresRole<policy::AdminsAndOperators>,
    Json(request): Json<EmployeeCreate>,
) -> Result<(StatusCode, Json<EmployeeBody>)> {
    let user = create_employee_record(&state, &auth.principal, request, None).await?;
    Ok((
        StatusCode::CREATED,
        Json(EmployeeBody {
            msg: "Employee created Successfully".to_string(),
            acknowledged: Some(true),
            employee: user.into(),
        }),
    ))
}

/// Search employees
#[utoipa::path(
    post,
    path = "/users/search",
    tag = "employees",
    request_body = EmployeeSearch,
    responses(
        (status = 200, description = "One page of matching employees", body = EmployeeListResponse),
        (status = 401, description = "Not authenticated or not allowed"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn search_employees(
    State(state): State<AppState>,
    _: RequiresRole<policy::AdminsOnly>,
    Json(search): Json<EmployeeSearch>,
) -> Result<Json<EmployeeListResponse>> {
    let (users, total) = state.store.list_users(&UserFilter::from(search)).await?;
    Ok(Json(employee_list(users, total, "All Employees")))
}

/// Get an employee
#[utoipa::path(
    get,
    path = "/users/{emp_id}",
    tag = "employees",
    params(("emp_id" = String, Path, description = "Employee id")),
    responses(
        (status = 200, description = "Employee details", body = EmployeeBody),
        (status = 400, description = "Malformed id"),
        (status = 401, description = "Not authenticated or not allowed"),
        (status = 404, description = "No such employee"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_employee(
    State(state): State<AppState>,
    Path(emp_id): Path<String>,
    _: RequiresRole<policy::AdminsAndOperators>,
) -> Result<Json<EmployeeBody>> {
    let id = parse_id(&emp_id, "Employee")?;
    let user = load_employee(&state, id, None).await?;
    Ok(Json(EmployeeBody {
        msg: "Employee Details".to_string(),
        acknowledged: None,
        employee: user.into(),
    }))
}

/// Update an employee
#[utoipa::path(
    put,
    path = "/users/{emp_id}",
    tag = "employees",
    params(("emp_id" = String, Path, description = "Employee id")),
    request_body = EmployeeUpdate,
    responses(
        (status = 200, description = "Employee updated", body = EmployeeBody),
        (status = 400, description = "Malformed id, nothing to update, or unknown role/department"),
        (status = 401, description = "Not authenticated or not allowed"),
        (status = 404, description = "No such employee"),
        (status = 409, description = "Email already in use"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_employee(
    State(state): State<AppState>,
    Path(emp_id): Path<String>,
    auth: RequiresRole<policy::AdminsAndOperators>,
    Json(request): Json<EmployeeUpdate>,
) -> Result<Json<EmployeeBody>> {
    let id = parse_id(&emp_id, "Employee")?;
    let user = update_employee_record(&state, &auth.principal, id, request, None).await?;
    Ok(Json(EmployeeBody {
        msg: "Employee data updated Successfully".to_string(),
        acknowledged: Some(true),
        employee: user.into(),
    }))
}

/// Delete an employee
#[utoipa::path(
    delete,
    path = "/users/{emp_id}",
    tag = "employees",
    params(("emp_id" = String, Path, description = "Employee id")),
    responses(
        (status = 200, description = "Employee deleted", body = AcknowledgedResponse),
        (status = 400, description = "Malformed id"),
        (status = 401, description = "Not authenticated or not allowed"),
        (status = 404, description = "No such employee"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_employee(
    State(state): State<AppState>,
    Path(emp_id): Path<String>,
    auth: RequiresRole<policy::AdminsAndOperators>,
) -> Result<Json<AcknowledgedResponse>> {
    let id = parse_id(&emp_id, "Employee")?;
    delete_employee_record(&state, &auth.principal, id, None).await?;
    Ok(Json(AcknowledgedResponse::new("Employee data deleted successfully")))
}

#[cfg(test)]
mod tests {
    use crate::{
        db::{AuditStore, DepartmentStore, ResetTokenStore, RoleStore, SessionStore, UserStore, models::audit_logs::AuditLogFilter},
        test_utils::*,
        types::roles,
    };
    use axum::http::StatusCode;
    use chrono::Duration;
    use serde_json::{Value, json};
    use std::fs;

    #[tokio::test]
    async fn test_create_employee_attaches_audits_and_mails() {
        let (server, store) = create_test_app().await;
        let (_admin, session) = login_as(&server, &store, "admin@example.com", roles::ADMIN).await;
        let engineering = seed_department(&store, "Engineering").await;

        let response = server
            .post("/api/v1/users")
            .add_header("cookie", session.header())
            .json(&json!({
                "firstName": "Grace",
                "lastName": "Hopper",
                "email": "grace@example.com",
                "role": roles::DATA_ENTRY_OPERATOR,
                "department": "Engineering",
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        assert_eq!(body["msg"], "Employee created Successfully");
        assert_eq!(body["acknowledged"], true);
        assert!(body["employee"].get("passwordHash").is_none());
        let id = body["employee"]["id"].as_str().unwrap().parse().unwrap();

        let user = store.get_user(id).await.unwrap().unwrap();
        assert_eq!(user.username, "grace@example.com");

        let department = store.get_department(engineering.id).await.unwrap().unwrap();
        assert!(department.has_member(id));
        let role = store.get_role(user.role_id).await.unwrap().unwrap();
        assert!(role.employees.iter().any(|m| m.user_id == id));

        let (logs, _) = store
            .list_audit_logs(&AuditLogFilter {
                log_type: Some("Employee Created".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].target_id.as_deref(), Some(id.to_string().as_str()));

        let mails = fs::read_dir(test_mail_dir()).unwrap().count();
        assert!(mails >= 1);
    }

    #[tokio::test]
    async fn test_create_employee_validation() {
        let (server, store) = create_test_app().await;
        let (_admin, session) = login_as(&server, &store, "admin@example.com", roles::ADMIN).await;

        let missing = server
            .post("/api/v1/users")
            .add_header("cookie", session.header())
            .json(&json!({"firstName": "Grace"}))
            .await;
        missing.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(missing.text(), "First, last name, email , role and department cannot be empty");

        let bad_role = server
            .post("/api/v1/users")
            .add_header("cookie", session.header())
            .json(&json!({
                "firstName": "Grace",
                "lastName": "Hopper",
                "email": "grace@example.com",
                "role": "Astronaut",
                "department": TEST_DEPARTMENT,
            }))
            .await;
        bad_role.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(bad_role.text(), "No such Role exists");

        let duplicate = server
            .post("/api/v1/users")
            .add_header("cookie", session.header())
            .json(&json!({
                "firstName": "Other",
                "lastName": "Admin",
                "email": "admin@example.com",
                "role": roles::ADMIN,
                "department": TEST_DEPARTMENT,
            }))
            .await;
        duplicate.assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_create_employee_requires_operator_or_admin() {
        let (server, store) = create_test_app().await;
        let department = seed_department(&store, "Engineering").await;
        let (_manager, session) = login_as_in(&server, &store, "dm@example.com", roles::DEPARTMENT_MANAGER, &department).await;

        let response = server
            .post("/api/v1/users")
            .add_header("cookie", session.header())
            .json(&json!({}))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(response.text(), "Access Denied");
    }

    #[tokio::test]
    async fn test_unauthenticated_directory_access() {
        let (server, _store) = create_test_app().await;
        let response = server.post("/api/v1/users/search").json(&json!({})).await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(response.text(), "Authentication Invalid, no tokens found");
    }

    #[tokio::test]
    async fn test_search_employees() {
        let (server, store) = create_test_app().await;
        let (_admin, session) = login_as(&server, &store, "admin@example.com", roles::ADMIN).await;
        for i in 0..3 {
            seed_employee(&store, &format!("operator{i}@example.com"), roles::DATA_ENTRY_OPERATOR).await;
        }

        let response = server
            .post("/api/v1/users/search")
            .add_header("cookie", session.header())
            .json(&json!({"role": "operator", "limit": 2, "sortBy": "email", "sortOrder": "asc"}))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["msg"], "All Employees");
        assert_eq!(body["totalDocs"], 3);
        let employees = body["employees"].as_array().unwrap();
        assert_eq!(employees.len(), 2);
        assert_eq!(employees[0]["email"], "operator0@example.com");
    }

    #[tokio::test]
    async fn test_update_employee_moves_memberships() {
        let (server, store) = create_test_app().await;
        let (_admin, session) = login_as(&server, &store, "admin@example.com", roles::ADMIN).await;
        let sales = seed_department(&store, "Sales").await;
        let user = seed_employee(&store, "mover@example.com", roles::DATA_ENTRY_OPERATOR).await;

        let response = server
            .put(&format!("/api/v1/users/{}", user.id))
            .add_header("cookie", session.header())
            .json(&json!({"department": "Sales", "role": roles::DEPARTMENT_MANAGER, "firstName": "  "}))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["employee"]["department"], "Sales");
        assert_eq!(body["employee"]["firstName"], user.first_name);

        let old = store.get_department(user.department_id).await.unwrap().unwrap();
        let new = store.get_department(sales.id).await.unwrap().unwrap();
        assert!(!old.has_member(user.id));
        assert!(new.has_member(user.id));
        assert_eq!(new.manager_id, Some(user.id));

        let old_role = store.get_role(user.role_id).await.unwrap().unwrap();
        assert!(old_role.employees.iter().all(|m| m.user_id != user.id));
    }

    #[tokio::test]
    async fn test_update_employee_rejects_empty_update() {
        let (server, store) = create_test_app().await;
        let (_admin, session) = login_as(&server, &store, "admin@example.com", roles::ADMIN).await;
        let user = seed_employee(&store, "idle@example.com", roles::DATA_ENTRY_OPERATOR).await;

        let response = server
            .put(&format!("/api/v1/users/{}", user.id))
            .add_header("cookie", session.header())
            .json(&json!({"email": ""}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_employee_ids() {
        let (server, store) = create_test_app().await;
        let (_admin, session) = login_as(&server, &store, "admin@example.com", roles::ADMIN).await;

        let malformed = server.get("/api/v1/users/not-an-id").add_header("cookie", session.header()).await;
        malformed.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(malformed.text(), "Employee Id is not valid");

        let missing = server
            .get(&format!("/api/v1/users/{}", uuid::Uuid::new_v4()))
            .add_header("cookie", session.header())
            .await;
        missing.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(missing.text(), "No such Employee exists");
    }

    #[tokio::test]
    async fn test_delete_employee_detaches() {
        let (server, store) = create_test_app().await;
        let (_admin, session) = login_as(&server, &store, "admin@example.com", roles::ADMIN).await;
        let user = seed_employee(&store, "leaver@example.com", roles::DATA_ENTRY_OPERATOR).await;

        let response = server
            .delete(&format!("/api/v1/users/{}", user.id))
            .add_header("cookie", session.header())
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["acknowledged"], true);

        assert!(store.get_user(user.id).await.unwrap().is_none());
        let department = store.get_department(user.department_id).await.unwrap().unwrap();
        assert!(!department.has_member(user.id));

        server
            .delete(&format!("/api/v1/users/{}", user.id))
            .add_header("cookie", session.header())
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_audit_failure_reports_committed() {
        let (server, store) = create_test_app().await;
        let (_admin, session) = login_as(&server, &store, "admin@example.com", roles::ADMIN).await;
        let user = seed_employee(&store, "renamed@example.com", roles::DATA_ENTRY_OPERATOR).await;

        store.set_fail_audit_writes(true);
        let response = server
            .put(&format!("/api/v1/users/{}", user.id))
            .add_header("cookie", session.header())
            .json(&json!({"firstName": "Renamed"}))
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json();
        assert_eq!(body["committed"], true);
        assert_eq!(body["stage"], "audit");

        // The update itself went through
        let stored = store.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(stored.first_name, "Renamed");
        let role = store.get_role(user.role_id).await.unwrap().unwrap();
        assert!(role.employees.iter().any(|m| m.employee_name.starts_with("Renamed")));
    }

    #[tokio::test]
    async fn test_delete_employee_revokes_reset_tokens_and_session() {
        let (server, store) = create_test_app().await;
        let (_admin, session) = login_as(&server, &store, "admin@example.com", roles::ADMIN).await;
        let (leaver, _leaver_session) = login_as(&server, &store, "shared@example.com", roles::DATA_ENTRY_OPERATOR).await;
        let token = store_reset_token(&store, "shared@example.com", Duration::minutes(30)).await;

        server
            .delete(&format!("/api/v1/users/{}", leaver.id))
            .add_header("cookie", session.header())
            .await
            .assert_status_ok();
        assert!(store.get_session(leaver.id).await.unwrap().is_none());

        // The address goes to someone new; the old link must not reset their password
        let newcomer = seed_employee(&store, "shared@example.com", roles::DATA_ENTRY_OPERATOR).await;
        let response = server
            .put(&format!("/auth/reset-password?email=shared@example.com&resetToken={token}"))
            .json(&json!({"password": "taken-over-secret"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.text(), "Invalid reset token");

        let stored = store.get_user(newcomer.id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, newcomer.password_hash);
    }

    #[tokio::test]
    async fn test_email_change_revokes_reset_tokens_for_old_address() {
        let (server, store) = create_test_app().await;
        let (_admin, session) = login_as(&server, &store, "admin@example.com", roles::ADMIN).await;
        let user = seed_employee(&store, "old@example.com", roles::DATA_ENTRY_OPERATOR).await;
        let token = store_reset_token(&store, "old@example.com", Duration::minutes(30)).await;

        server
            .put(&format!("/api/v1/users/{}", user.id))
            .add_header("cookie", session.header())
            .json(&json!({"email": "new@example.com"}))
            .await
            .assert_status_ok();
        assert_eq!(store.delete_reset_tokens_for_email("old@example.com").await.unwrap(), 0);

        let newcomer = seed_employee(&store, "old@example.com", roles::DATA_ENTRY_OPERATOR).await;
        server
            .put(&format!("/auth/reset-password?email=old@example.com&resetToken={token}"))
            .json(&json!({"password": "taken-over-secret"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        let stored = store.get_user(newcomer.id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, newcomer.password_hash);
    }

    #[tokio::test]
    async fn test_unrelated_update_keeps_reset_tokens() {
        let (server, store) = create_test_app().await;
        let (_admin, session) = login_as(&server, &store, "admin@example.com", roles::ADMIN).await;
        let user = seed_employee(&store, "stays@example.com", roles::DATA_ENTRY_OPERATOR).await;
        store_reset_token(&store, "stays@example.com", Duration::minutes(30)).await;

        server
            .put(&format!("/api/v1/users/{}", user.id))
            .add_header("cookie", session.header())
            .json(&json!({"lastName": "Renamed"}))
            .await
            .assert_status_ok();
        assert_eq!(store.delete_reset_tokens_for_email("stays@example.com").await.unwrap(), 1);
    }
}
