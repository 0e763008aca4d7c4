//! OpenAPI documentation for the directory API at `/api/v1`.

use utoipa::OpenApi;

use crate::{api, integrity::ReconcileReport};

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::users::create_employee,
        api::handlers::users::search_employees,
        api::handlers::users::get_employee,
        api::handlers::users::update_employee,
        api::handlers::users::delete_employee,
        api::handlers::roles::list_roles,
        api::handlers::roles::create_role,
        api::handlers::roles::search_roles,
        api::handlers::roles::get_role,
        api::handlers::roles::update_role,
        api::handlers::roles::delete_role,
        api::handlers::permissions::list_permissions,
        api::handlers::permissions::create_permission,
        api::handlers::permissions::search_permissions,
        api::handlers::permissions::get_permission,
        api::handlers::permissions::update_permission,
        api::handlers::permissions::delete_permission,
        api::handlers::departments::list_departments,
        api::handlers::departments::create_department,
        api::handlers::departments::search_departments,
        api::handlers::departments::get_department,
        api::handlers::departments::update_department,
        api::handlers::departments::delete_department,
        api::handlers::departments::list_department_employees,
        api::handlers::departments::create_department_employee,
        api::handlers::departments::get_department_employee,
        api::handlers::departments::update_department_employee,
        api::handlers::departments::delete_department_employee,
        api::handlers::audit_logs::search_audit_logs,
        api::handlers::audit_logs::get_audit_log,
        api::handlers::integrity::reconcile,
    ),
    components(schemas(
        api::models::AcknowledgedResponse,
        api::models::MemberResponse,
        api::models::PermissionRefResponse,
        api::models::users::EmployeeResponse,
        api::models::users::EmployeeCreate,
        api::models::users::EmployeeUpdate,
        api::models::users::EmployeeSearch,
        api::models::users::EmployeeBody,
        api::models::users::EmployeeListResponse,
        api::models::roles::RoleResponse,
        api::models::roles::RoleSummary,
        api::models::roles::RoleCreate,
        api::models::roles::RoleUpdate,
        api::models::roles::RoleSearch,
        api::models::roles::RoleBody,
        api::models::roles::RoleListResponse,
        api::models::roles::RoleSummaryResponse,
        api::models::permissions::PermissionResponse,
        api::models::permissions::PermissionCreate,
        api::models::permissions::PermissionUpdate,
        api::models::permissions::PermissionSearch,
        api::models::permissions::PermissionBody,
        api::models::permissions::PermissionListResponse,
        api::models::departments::DepartmentResponse,
        api::models::departments::DepartmentSummary,
        api::models::departments::DepartmentCreate,
        api::models::departments::DepartmentUpdate,
        api::models::departments::DepartmentSearch,
        api::models::departments::DepartmentBody,
        api::models::departments::DepartmentListResponse,
        api::models::departments::DepartmentSummaryResponse,
        api::models::audit_logs::AuditLogResponse,
        api::models::audit_logs::AuditLogSearch,
        api::models::audit_logs::AuditLogBody,
        api::models::audit_logs::AuditLogListResponse,
        api::models::integrity::ReconcileResponse,
        ReconcileReport,
    )),
    tags(
        (name = "employees", description = "Employee directory"),
        (name = "roles", description = "Roles and their permissions"),
        (name = "permissions", description = "Permission catalogue"),
        (name = "departments", description = "Departments and their employees"),
        (name = "audit", description = "Audit trail"),
        (name = "integrity", description = "Membership cache maintenance"),
    )
)]
pub struct DirectoryApiDoc;
