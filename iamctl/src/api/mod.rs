//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures (camelCase on the wire)
//!
//! # API Structure
//!
//! - **Authentication** (`/auth/*`): login, logout, refresh, profile, password change and reset
//! - **Employees** (`/api/v1/users/*`)
//! - **Roles** (`/api/v1/roles/*`) and **Permissions** (`/api/v1/permissions/*`)
//! - **Departments** (`/api/v1/departments/*`), including the department-scoped employee routes
//!   under `/api/v1/departments/{dep_id}/emp`
//! - **Audit logs** (`/api/v1/audit-logs/*`)
//! - **Integrity** (`/api/v1/integrity/reconcile`)
//!
//! # OpenAPI Documentation
//!
//! All endpoints are annotated with `utoipa`. The reference is served at `/docs`.

pub mod handlers;
pub mod models;
