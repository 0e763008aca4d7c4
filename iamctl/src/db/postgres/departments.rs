use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use tracing::instrument;
use uuid::Uuid;

use super::PostgresStore;
use crate::db::DepartmentStore;
use crate::db::errors::{DbError, Result};
use crate::db::models::departments::{DepartmentCreateDBRequest, DepartmentDBResponse, DepartmentFilter, DepartmentUpdateDBRequest};
use crate::db::models::{MemberEntry, like_pattern};
use crate::types::{DepartmentId, EmployeeId, abbrev_uuid};

const DEPARTMENT_COLUMNS: &str = "id, name, description, manager_id, manager_name, employees, created_at, updated_at";

fn push_department_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &DepartmentFilter) {
    if let Some(name) = &filter.name {
        query.push(" AND name ILIKE ");
        query.push_bind(like_pattern(name));
    }
    if let Some(manager_name) = &filter.manager_name {
        query.push(" AND manager_name ILIKE ");
        query.push_bind(like_pattern(manager_name));
    }
    if !filter.employees.is_empty() {
        let patterns: Vec<String> = filter.employees.iter().map(|e| like_pattern(e)).collect();
        query.push(" AND EXISTS (SELECT 1 FROM jsonb_array_elements(employees) e WHERE e->>'employee_name' ILIKE ANY(");
        query.push_bind(patterns);
        query.push("))");
    }
}

#[async_trait]
impl DepartmentStore for PostgresStore {
    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create_department(&self, request: &DepartmentCreateDBRequest) -> Result<DepartmentDBResponse> {
        let department = sqlx::query_as::<_, DepartmentDBResponse>(&format!(
            "INSERT INTO departments (id, name, description) VALUES ($1, $2, $3) RETURNING {DEPARTMENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&request.name)
        .bind(&request.description)
        .fetch_one(&self.pool)
        .await?;

        Ok(department)
    }

    #[instrument(skip(self), fields(department_id = %abbrev_uuid(&id)), err)]
    async fn get_department(&self, id: DepartmentId) -> Result<Option<DepartmentDBResponse>> {
        let department = sqlx::query_as::<_, DepartmentDBResponse>(&format!("SELECT {DEPARTMENT_COLUMNS} FROM departments WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(department)
    }

    #[instrument(skip(self), err)]
    async fn get_department_by_name(&self, name: &str) -> Result<Option<DepartmentDBResponse>> {
        let department = sqlx::query_as::<_, DepartmentDBResponse>(&format!("SELECT {DEPARTMENT_COLUMNS} FROM departments WHERE name = $1"))
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(department)
    }

    #[instrument(skip(self, filter), fields(limit = filter.window.limit, skip = filter.window.skip), err)]
    async fn list_departments(&self, filter: &DepartmentFilter) -> Result<(Vec<DepartmentDBResponse>, i64)> {
        let mut query = QueryBuilder::new(format!("SELECT {DEPARTMENT_COLUMNS} FROM departments WHERE 1=1"));
        push_department_filter(&mut query, filter);
        query.push(format!(
            " ORDER BY {} {}, id {} LIMIT ",
            filter.sort_by.column(),
            filter.sort_order.sql(),
            filter.sort_order.sql()
        ));
        query.push_bind(filter.window.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.window.skip);
        let departments = query.build_query_as::<DepartmentDBResponse>().fetch_all(&self.pool).await?;

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM departments WHERE 1=1");
        push_department_filter(&mut count, filter);
        let total: (i64,) = count.build_query_as().fetch_one(&self.pool).await?;

        Ok((departments, total.0))
    }

    #[instrument(skip(self), err)]
    async fn all_departments(&self) -> Result<Vec<DepartmentDBResponse>> {
        let departments = sqlx::query_as::<_, DepartmentDBResponse>(&format!("SELECT {DEPARTMENT_COLUMNS} FROM departments ORDER BY name"))
            .fetch_all(&self.pool)
            .await?;

        Ok(departments)
    }

    #[instrument(skip(self, request), fields(department_id = %abbrev_uuid(&id)), err)]
    async fn update_department(&self, id: DepartmentId, request: &DepartmentUpdateDBRequest) -> Result<DepartmentDBResponse> {
        let department = sqlx::query_as::<_, DepartmentDBResponse>(&format!(
            r#"
            UPDATE departments SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {DEPARTMENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&request.name)
        .bind(&request.description)
        .fetch_optional(&self.pool)
        .await?;

        department.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), fields(department_id = %abbrev_uuid(&id)), err)]
    async fn delete_department(&self, id: DepartmentId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM departments WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, manager), fields(department_id = %abbrev_uuid(&id)), err)]
    async fn set_department_manager(&self, id: DepartmentId, manager: Option<&MemberEntry>) -> Result<()> {
        let result = sqlx::query("UPDATE departments SET manager_id = $2, manager_name = $3, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(manager.map(|m| m.user_id))
            .bind(manager.map(|m| m.employee_name.clone()))
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(department_id = %abbrev_uuid(&id), emp_id = %abbrev_uuid(&emp_id)), err)]
    async fn clear_department_manager_if(&self, id: DepartmentId, emp_id: EmployeeId) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE departments SET manager_id = NULL, manager_name = NULL, updated_at = NOW() WHERE id = $1 AND manager_id = $2",
        )
        .bind(id)
        .bind(emp_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
