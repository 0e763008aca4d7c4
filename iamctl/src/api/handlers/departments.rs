//! Department directory, plus the employee routes nested under a department.
//!
//! Routes carrying `{dep_id}` are open to Department Managers for the department they manage;
//! the scoped check runs inside [`RequiresRole`].

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::{
        handlers::{
            non_blank,
            users::{create_employee_record, delete_employee_record, employee_list, load_employee, update_employee_record},
        },
        models::{
            AcknowledgedResponse,
            departments::{
                DepartmentBody, DepartmentCreate, DepartmentListResponse, DepartmentResponse, DepartmentSearch, DepartmentSummary,
                DepartmentSummaryResponse, DepartmentUpdate,
            },
            search::Page,
            users::{EmployeeBody, EmployeeCreate, EmployeeListResponse, EmployeeUpdate},
        },
    },
    audit::{Actor, kinds},
    auth::authorization::{RequiresRole, policy},
    db::models::{
        departments::{DepartmentCreateDBRequest, DepartmentDBResponse, DepartmentFilter, DepartmentUpdateDBRequest},
        users::UserFilter,
    },
    errors::{CommitStage, Error, PostCommit, Result},
    types::{DepartmentId, parse_id},
};

async fn load_department(state: &AppState, id: DepartmentId) -> Result<DepartmentDBResponse> {
    state.store.get_department(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Department".to_string(),
        id: id.to_string(),
    })
}

/// List department ids and names
#[utoipa::path(
    get,
    path = "/departments",
    tag = "departments",
    responses(
        (status = 200, description = "Every department's id and name", body = DepartmentSummaryResponse),
        (status = 401, description = "Not authenticated or not allowed"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_departments(
    State(state): State<AppState>,
    _: RequiresRole<policy::AdminsAndOperators>,
) -> Result<Json<DepartmentSummaryResponse>> {
    let departments = state.store.all_departments().await?;
    Ok(Json(DepartmentSummaryResponse {
        msg: "All Departments with name and Id".to_string(),
        departments: departments.into_iter().map(DepartmentSummary::from).collect(),
    }))
}

/// Create a department
#[utoipa::path(
    post,
    path = "/departments",
    tag = "departments",
    request_body = DepartmentCreate,
    responses(
        (status = 201, description = "Department created", body = DepartmentBody),
        (status = 400, description = "Missing fields"),
        (status = 401, description = "Not authenticated or not allowed"),
        (status = 409, description = "Department name taken"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_department(
    State(state): State<AppState>,
    auth: RequiresRole<policy::AdminsOnly>,
    Json(request): Json<DepartmentCreate>,
) -> Result<(StatusCode, Json<DepartmentBody>)> {
    let name = request.name.trim();
    let description = request.description.trim();
    if name.is_empty() || description.is_empty() {
        return Err(Error::BadRequest {
            message: "Name and description cannot be Empty".to_string(),
        });
    }

    let department = state
        .store
        .create_department(&DepartmentCreateDBRequest {
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
                kinds::DEPARTMENT_CREATED,
                &Actor::from(&auth.principal),
                Some(department.id.to_string()),
                format!("New Department named {} is Created.", department.name),
            )
            .await,
    );
    post.finish()?;

    Ok((
        StatusCode::CREATED,
        Json(DepartmentBody {
            msg: "Department created Successfully".to_string(),
            acknowledged: Some(true),
            department: department.into(),
        }),
    ))
}

/// Search departments
#[utoipa::path(
    post,
    path = "/departments/search",
    tag = "departments",
    request_body = DepartmentSearch,
    responses(
        (status = 200, description = "One page of matching departments", body = DepartmentListResponse),
        (status = 401, description = "Not authenticated or not allowed"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn search_departments(
    State(state): State<AppState>,
    _: RequiresRole<policy::AdminsOnly>,
    Json(search): Json<DepartmentSearch>,
) -> Result<Json<DepartmentListResponse>> {
    let (departments, total) = state.store.list_departments(&DepartmentFilter::from(search)).await?;
    Ok(Json(DepartmentListResponse {
        msg: "All Departments".to_string(),
        departments: departments.into_iter().map(DepartmentResponse::from).collect(),
        total_docs: total,
    }))
}

/// Get a department
#[utoipa::path(
    get,
    path = "/departments/{dep_id}",
    tag = "departments",
    params(("dep_id" = String, Path, description = "Department id")),
    responses(
        (status = 200, description = "Department details", body = DepartmentBody),
        (status = 400, description = "Malformed id"),
        (status = 401, description = "Not authenticated, not allowed, or not this department's manager"),
        (status = 404, description = "No such department"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_department(
    State(state): State<AppState>,
    Path(dep_id): Path<String>,
    _: RequiresRole<policy::AdminsAndManagers>,
) -> Result<Json<DepartmentBody>> {
    let department = load_department(&state, parse_id(&dep_id, "Department")?).await?;
    Ok(Json(DepartmentBody {
        msg: "Department Details".to_string(),
        acknowledged: None,
        department: department.into(),
    }))
}

/// Update a department
#[utoipa::path(
    put,
    path = "/departments/{dep_id}",
    tag = "departments",
    params(("dep_id" = String, Path, description = "Department id")),
    request_body = DepartmentUpdate,
    responses(
        (status = 200, description = "Department updated; employee records follow a rename", body = DepartmentBody),
        (status = 400, description = "Malformed id or nothing to update"),
        (status = 401, description = "Not authenticated or not allowed"),
        (status = 404, description = "No such department"),
        (status = 409, description = "Department name taken"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_department(
    State(state): State<AppState>,
    Path(dep_id): Path<String>,
    auth: RequiresRole<policy::AdminsOnly>,
    Json(request): Json<DepartmentUpdate>,
) -> Result<Json<DepartmentBody>> {
    let department = load_department(&state, parse_id(&dep_id, "Department")?).await?;

    let changes = DepartmentUpdateDBRequest {
        name: non_blank(request.name).filter(|name| *name != department.name),
        description: non_blank(request.description),
    };
    if changes.name.is_none() && changes.description.is_none() {
        return Err(Error::BadRequest {
            message: "No valid fields to update".to_string(),
        });
    }

    let updated = state.store.update_department(department.id, &changes).await?;

    let mut post = PostCommit::new();
    if changes.name.is_some() {
        post.record(
            CommitStage::Membership,
            state.integrity.rename_department(updated.id, &updated.name).await,
        );
    }
    post.record(
        CommitStage::Audit,
        state
            .audit
            .record(
                kinds::DEPARTMENT_UPDATED,
                &Actor::from(&auth.principal),
                Some(updated.id.to_string()),
                format!("Department named {} is Updated.", updated.name),
            )
            .await,
    );
    post.finish()?;

    Ok(Json(DepartmentBody {
        msg: "Department updated Successfully".to_string(),
        acknowledged: Some(true),
        department: updated.into(),
    }))
}

/// Delete a department
///
/// Employees of the department are left in place and show up as orphans in reconciliation.
#[utoipa::path(
    delete,
    path = "/departments/{dep_id}",
    tag = "departments",
    params(("dep_id" = String, Path, description = "Department id")),
    responses(
        (status = 200, description = "Department deleted", body = AcknowledgedResponse),
        (status = 400, description = "Malformed id"),
        (status = 401, description = "Not authenticated or not allowed"),
        (status = 404, description = "No such department"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_department(
    State(state): State<AppState>,
    Path(dep_id): Path<String>,
    auth: RequiresRole<policy::AdminsOnly>,
) -> Result<Json<AcknowledgedResponse>> {
    let department = load_department(&state, parse_id(&dep_id, "Department")?).await?;
    if !state.store.delete_department(department.id).await? {
        return Err(Error::NotFound {
            resource: "Department".to_string(),
            id: department.id.to_string(),
        });
    }
    if !department.employees.is_empty() {
        tracing::warn!(department = %department.name, employees = department.employees.len(), "Deleted department still had employees");
    }

    let mut post = PostCommit::new();
    post.record(
        CommitStage::Audit,
        state
            .audit
            .record(
                kinds::DEPARTMENT_DELETED,
                &Actor::from(&auth.principal),
                Some(department.id.to_string()),
                format!("Department named {} is Deleted.", department.name),
            )
            .await,
    );
    post.finish()?;

    Ok(Json(AcknowledgedResponse::new("Department data deleted successfully")))
}

/// List a department's employees
#[utoipa::path(
    get,
    path = "/departments/{dep_id}/emp",
    tag = "departments",
    params(("dep_id" = String, Path, description = "Department id"), Page),
    responses(
        (status = 200, description = "One page of the department's employees", body = EmployeeListResponse),
        (status = 400, description = "Malformed id"),
        (status = 401, description = "Not authenticated, not allowed, or not this department's manager"),
        (status = 404, description = "No such department"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_department_employees(
    State(state): State<AppState>,
    Path(dep_id): Path<String>,
    Query(page): Query<Page>,
    _: RequiresRole<policy::AdminsAndManagers>,
) -> Result<Json<EmployeeListResponse>> {
    let department = load_department(&state, parse_id(&dep_id, "Department")?).await?;
    let (users, total) = state
        .store
        .list_users(&UserFilter::in_department(department.id, page.window()))
        .await?;
    Ok(Json(employee_list(users, total, "All Employees in this Department")))
}

/// Create an employee in this department
#[utoipa::path(
    post,
    path = "/departments/{dep_id}/emp",
    tag = "departments",
    params(("dep_id" = String, Path, description = "Department id")),
    request_body = EmployeeCreate,
    responses(
        (status = 201, description = "Employee created; credentials emailed", body = EmployeeBody),
        (status = 400, description = "Missing fields or unknown role"),
        (status = 401, description = "Not authenticated or not allowed"),
        (status = 404, description = "No such department"),
        (status = 409, description = "Email already in use"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_department_employee(
    State(state): State<AppState>,
    Path(dep_id): Path<String>,
    auth: RequiresRole<policy::AdminsOnly>,
    Json(request): Json<EmployeeCreate>,
) -> Result<(StatusCode, Json<EmployeeBody>)> {
    let department = load_department(&state, parse_id(&dep_id, "Department")?).await?;
    let user = create_employee_record(&state, &auth.principal, request, Some(department)).await?;
    Ok((
        StatusCode::CREATED,
        Json(EmployeeBody {
            msg: "Employee created Successfully".to_string(),
            acknowledged: Some(true),
            employee: user.into(),
        }),
    ))
}

/// Get an employee of this department
#[utoipa::path(
    get,
    path = "/departments/{dep_id}/emp/{emp_id}",
    tag = "departments",
    params(
        ("dep_id" = String, Path, description = "Department id"),
        ("emp_id" = String, Path, description = "Employee id"),
    ),
    responses(
        (status = 200, description = "Employee details", body = EmployeeBody),
        (status = 400, description = "Malformed id"),
        (status = 401, description = "Not authenticated, not allowed, or not this department's manager"),
        (status = 404, description = "No such employee in this department"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_department_employee(
    State(state): State<AppState>,
    Path((dep_id, emp_id)): Path<(String, String)>,
    _: RequiresRole<policy::AdminsAndManagers>,
) -> Result<Json<EmployeeBody>> {
    let department_id = parse_id(&dep_id, "Department")?;
    let user = load_employee(&state, parse_id(&emp_id, "Employee")?, Some(department_id)).await?;
    Ok(Json(EmployeeBody {
        msg: "Employee Details".to_string(),
        acknowledged: None,
        employee: user.into(),
    }))
}

/// Update an employee of this department
#[utoipa::path(
    put,
    path = "/departments/{dep_id}/emp/{emp_id}",
    tag = "departments",
    params(
        ("dep_id" = String, Path, description = "Department id"),
        ("emp_id" = String, Path, description = "Employee id"),
    ),
    request_body = EmployeeUpdate,
    responses(
        (status = 200, description = "Employee updated", body = EmployeeBody),
        (status = 400, description = "Malformed id, nothing to update, or unknown role/department"),
        (status = 401, description = "Not authenticated or not allowed"),
        (status = 404, description = "No such employee in this department"),
        (status = 409, description = "Email already in use"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_department_employee(
    State(state): State<AppState>,
    Path((dep_id, emp_id)): Path<(String, String)>,
    auth: RequiresRole<policy::AdminsOnly>,
    Json(request): Json<EmployeeUpdate>,
) -> Result<Json<EmployeeBody>> {
    let department_id = parse_id(&dep_id, "Department")?;
    let id = parse_id(&emp_id, "Employee")?;
    let user = update_employee_record(&state, &auth.principal, id, request, Some(department_id)).await?;
    Ok(Json(EmployeeBody {
        msg: "Employee data updated Successfully".to_string(),
        acknowledged: Some(true),
        employee: user.into(),
    }))
}

/// Delete an employee of this department
#[utoipa::path(
    delete,
    path = "/departments/{dep_id}/emp/{emp_id}",
    tag = "departments",
    params(
        ("dep_id" = String, Path, description = "Department id"),
        ("emp_id" = String, Path, description = "Employee id"),
    ),
    responses(
        (status = 200, description = "Employee deleted", body = AcknowledgedResponse),
        (status = 400, description = "Malformed id"),
        (status = 401, description = "Not authenticated or not allowed"),
        (status = 404, description = "No such employee in this department"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_department_employee(
    State(state): State<AppState>,
    Path((dep_id, emp_id)): Path<(String, String)>,
    auth: RequiresRole<policy::AdminsOnly>,
) -> Result<Json<AcknowledgedResponse>> {
    let department_id = parse_id(&dep_id, "Department")?;
    let id = parse_id(&emp_id, "Employee")?;
    delete_employee_record(&state, &auth.principal, id, Some(department_id)).await?;
    Ok(Json(AcknowledgedResponse::new("Employee data deleted successfully")))
}

#[cfg(test)]
mod tests {
    use crate::{
        db::{DepartmentStore, UserStore},
        test_utils::*,
        types::roles,
    };
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    #[tokio::test]
    async fn test_manager_is_scoped_to_own_department() {
        let (server, store) = create_test_app().await;
        let d1 = seed_department(&store, "D1").await;
        let d2 = seed_department(&store, "D2").await;
        seed_employee_in(&store, "d2-worker@example.com", roles::DATA_ENTRY_OPERATOR, &d2).await;
        let (_e1, session) = login_as_in(&server, &store, "e1@example.com", roles::DEPARTMENT_MANAGER, &d1).await;

        let denied = server
            .get(&format!("/api/v1/departments/{}/emp", d2.id))
            .add_header("cookie", session.header())
            .await;
        denied.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(denied.text(), "Access denied");

        let allowed = server
            .get(&format!("/api/v1/departments/{}/emp", d1.id))
            .add_header("cookie", session.header())
            .await;
        allowed.assert_status_ok();
        let body: Value = allowed.json();
        assert_eq!(body["msg"], "All Employees in this Department");
        assert_eq!(body["totalDocs"], 1);

        server
            .get(&format!("/api/v1/departments/{}", d1.id))
            .add_header("cookie", session.header())
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn test_demoted_manager_loses_scope() {
        let (server, store) = create_test_app().await;
        let d1 = seed_department(&store, "D1").await;
        let (_e1, session) = login_as_in(&server, &store, "e1@example.com", roles::DEPARTMENT_MANAGER, &d1).await;

        store.set_department_manager(d1.id, None).await.unwrap();

        server
            .get(&format!("/api/v1/departments/{}/emp", d1.id))
            .add_header("cookie", session.header())
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_manager_cannot_mutate_department() {
        let (server, store) = create_test_app().await;
        let d1 = seed_department(&store, "D1").await;
        let (_e1, session) = login_as_in(&server, &store, "e1@example.com", roles::DEPARTMENT_MANAGER, &d1).await;

        let response = server
            .put(&format!("/api/v1/departments/{}", d1.id))
            .add_header("cookie", session.header())
            .json(&json!({"description": "mine now"}))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(response.text(), "Access Denied");
    }

    #[tokio::test]
    async fn test_nested_employee_routes_check_membership() {
        let (server, store) = create_test_app().await;
        let (_admin, session) = login_as(&server, &store, "admin@example.com", roles::ADMIN).await;
        let d1 = seed_department(&store, "D1").await;
        let d2 = seed_department(&store, "D2").await;
        let worker = seed_employee_in(&store, "worker@example.com", roles::DATA_ENTRY_OPERATOR, &d1).await;

        server
            .get(&format!("/api/v1/departments/{}/emp/{}", d1.id, worker.id))
            .add_header("cookie", session.header())
            .await
            .assert_status_ok();

        let elsewhere = server
            .get(&format!("/api/v1/departments/{}/emp/{}", d2.id, worker.id))
            .add_header("cookie", session.header())
            .await;
        elsewhere.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(elsewhere.text(), "No such Employee exists");

        server
            .delete(&format!("/api/v1/departments/{}/emp/{}", d2.id, worker.id))
            .add_header("cookie", session.header())
            .await
            .assert_status(StatusCode::NOT_FOUND);
        assert!(store.get_user(worker.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_create_employee_in_department_ignores_body_department() {
        let (server, store) = create_test_app().await;
        let (_admin, session) = login_as(&server, &store, "admin@example.com", roles::ADMIN).await;
        let d1 = seed_department(&store, "D1").await;

        let response = server
            .post(&format!("/api/v1/departments/{}/emp", d1.id))
            .add_header("cookie", session.header())
            .json(&json!({
                "firstName": "New",
                "lastName": "Hire",
                "email": "hire@example.com",
                "role": roles::DATA_ENTRY_OPERATOR,
                "department": "Somewhere Else",
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        assert_eq!(body["employee"]["department"], "D1");
    }

    #[tokio::test]
    async fn test_rename_department_updates_employees() {
        let (server, store) = create_test_app().await;
        let (_admin, session) = login_as(&server, &store, "admin@example.com", roles::ADMIN).await;
        let d1 = seed_department(&store, "D1").await;
        let worker = seed_employee_in(&store, "worker@example.com", roles::DATA_ENTRY_OPERATOR, &d1).await;

        server
            .put(&format!("/api/v1/departments/{}", d1.id))
            .add_header("cookie", session.header())
            .json(&json!({"name": "Research"}))
            .await
            .assert_status_ok();

        let worker = store.get_user(worker.id).await.unwrap().unwrap();
        assert_eq!(worker.department, "Research");
    }

    #[tokio::test]
    async fn test_department_crud() {
        let (server, store) = create_test_app().await;
        let (_admin, session) = login_as(&server, &store, "admin@example.com", roles::ADMIN).await;

        let created = server
            .post("/api/v1/departments")
            .add_header("cookie", session.header())
            .json(&json!({"name": "Legal", "description": "Contracts"}))
            .await;
        created.assert_status(StatusCode::CREATED);
        let id = created.json::<Value>()["department"]["id"].as_str().unwrap().to_string();

        server
            .post("/api/v1/departments")
            .add_header("cookie", session.header())
            .json(&json!({"name": "Legal", "description": "Again"}))
            .await
            .assert_status(StatusCode::CONFLICT);

        let found: Value = server
            .post("/api/v1/departments/search")
            .add_header("cookie", session.header())
            .json(&json!({"name": "leg"}))
            .await
            .json();
        assert_eq!(found["totalDocs"], 1);

        server
            .delete(&format!("/api/v1/departments/{id}"))
            .add_header("cookie", session.header())
            .await
            .assert_status_ok();
        server
            .get(&format!("/api/v1/departments/{id}"))
            .add_header("cookie", session.header())
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
