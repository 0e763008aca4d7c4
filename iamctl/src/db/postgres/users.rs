use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use tracing::instrument;
use uuid::Uuid;

use super::PostgresStore;
use crate::db::UserStore;
use crate::db::errors::{DbError, Result};
use crate::db::models::like_pattern;
use crate::db::models::users::{UserCreateDBRequest, UserDBResponse, UserFilter, UserUpdateDBRequest};
use crate::types::{DepartmentId, EmployeeId, RoleId, abbrev_uuid};

const USER_COLUMNS: &str = "id, first_name, last_name, email, username, role, department, role_id, department_id, \
                            password_hash, created_at, updated_at";

fn push_user_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    if let Some(name) = &filter.name {
        let pattern = like_pattern(name);
        query.push(" AND (first_name ILIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR last_name ILIKE ");
        query.push_bind(pattern);
        query.push(")");
    }
    if let Some(role) = &filter.role {
        query.push(" AND role ILIKE ");
        query.push_bind(like_pattern(role));
    }
    if let Some(department) = &filter.department {
        query.push(" AND department ILIKE ");
        query.push_bind(like_pattern(department));
    }
    if let Some(department_id) = filter.department_id {
        query.push(" AND department_id = ");
        query.push_bind(department_id);
    }
}

#[async_trait]
impl UserStore for PostgresStore {
    #[instrument(skip(self, request), fields(email = %request.email), err)]
    async fn create_user(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        let user = sqlx::query_as::<_, UserDBResponse>(&format!(
            "INSERT INTO users (id, first_name, last_name, email, username, role, department, role_id, department_id, password_hash) \
             VALUES ($1, $2, $3, $4, $4, $5, $6, $7, $8, $9) RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(&request.email)
        .bind(&request.role)
        .bind(&request.department)
        .bind(request.role_id)
        .bind(request.department_id)
        .bind(&request.password_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn get_user(&self, id: EmployeeId) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    #[instrument(skip(self, username), err)]
    async fn get_user_by_username(&self, username: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1"))
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    #[instrument(skip(self, email), err)]
    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    #[instrument(skip(self, filter), fields(limit = filter.window.limit, skip = filter.window.skip), err)]
    async fn list_users(&self, filter: &UserFilter) -> Result<(Vec<UserDBResponse>, i64)> {
        let mut query = QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users WHERE 1=1"));
        push_user_filter(&mut query, filter);
        query.push(format!(
            " ORDER BY {} {}, id {} LIMIT ",
            filter.sort_by.column(),
            filter.sort_order.sql(),
            filter.sort_order.sql()
        ));
        query.push_bind(filter.window.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.window.skip);
        let users = query.build_query_as::<UserDBResponse>().fetch_all(&self.pool).await?;

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM users WHERE 1=1");
        push_user_filter(&mut count, filter);
        let total: (i64,) = count.build_query_as().fetch_one(&self.pool).await?;

        Ok((users, total.0))
    }

    #[instrument(skip(self), err)]
    async fn all_users(&self) -> Result<Vec<UserDBResponse>> {
        let users = sqlx::query_as::<_, UserDBResponse>(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at, id"))
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn update_user(&self, id: EmployeeId, request: &UserUpdateDBRequest) -> Result<UserDBResponse> {
        let user = sqlx::query_as::<_, UserDBResponse>(&format!(
            r#"
            UPDATE users SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                email = COALESCE($4, email),
                username = COALESCE($4, username),
                role_id = COALESCE($5, role_id),
                role = COALESCE($6, role),
                department_id = COALESCE($7, department_id),
                department = COALESCE($8, department),
                password_hash = COALESCE($9, password_hash),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(&request.email)
        .bind(request.role.as_ref().map(|(role_id, _)| *role_id))
        .bind(request.role.as_ref().map(|(_, role)| role.clone()))
        .bind(request.department.as_ref().map(|(department_id, _)| *department_id))
        .bind(request.department.as_ref().map(|(_, department)| department.clone()))
        .bind(&request.password_hash)
        .fetch_optional(&self.pool)
        .await?;

        user.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn delete_user(&self, id: EmployeeId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, name), fields(role_id = %abbrev_uuid(&role_id)), err)]
    async fn rename_role_on_users(&self, role_id: RoleId, name: &str) -> Result<u64> {
        let result = sqlx::query("UPDATE users SET role = $2, updated_at = NOW() WHERE role_id = $1 AND role <> $2")
            .bind(role_id)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self, name), fields(department_id = %abbrev_uuid(&department_id)), err)]
    async fn rename_department_on_users(&self, department_id: DepartmentId, name: &str) -> Result<u64> {
        let result = sqlx::query("UPDATE users SET department = $2, updated_at = NOW() WHERE department_id = $1 AND department <> $2")
            .bind(department_id)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Window;
    use crate::db::postgres::fixtures::{role_and_department, user_request};
    use sqlx::PgPool;

    #[sqlx::test]
    async fn test_duplicate_email_is_unique_violation(pool: PgPool) {
        let store = PostgresStore::new(pool);
        let (role, department) = role_and_department(&store).await;
        store.create_user(&user_request("ada@example.com", &role, &department)).await.unwrap();

        let err = store
            .create_user(&user_request("ada@example.com", &role, &department))
            .await
            .unwrap_err();
        match err {
            DbError::UniqueViolation { constraint, table, .. } => {
                assert_eq!(constraint.as_deref(), Some("users_email_key"));
                assert_eq!(table.as_deref(), Some("users"));
            }
            other => panic!("expected unique violation, got {other:?}"),
        }
    }

    #[sqlx::test]
    async fn test_email_update_rewrites_username(pool: PgPool) {
        let store = PostgresStore::new(pool);
        let (role, department) = role_and_department(&store).await;
        let user = store.create_user(&user_request("ada@example.com", &role, &department)).await.unwrap();
        assert_eq!(user.username, "ada@example.com");

        let updated = store
            .update_user(
                user.id,
                &UserUpdateDBRequest {
                    email: Some("countess@example.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.email, "countess@example.com");
        assert_eq!(updated.username, "countess@example.com");
        assert_eq!(updated.first_name, user.first_name);

        let missing = store.update_user(Uuid::new_v4(), &UserUpdateDBRequest::default()).await.unwrap_err();
        assert!(matches!(missing, DbError::NotFound));
    }

    #[sqlx::test]
    async fn test_list_users_filters_literally_and_pages(pool: PgPool) {
        let store = PostgresStore::new(pool);
        let (role, department) = role_and_department(&store).await;
        for i in 0..15 {
            store
                .create_user(&user_request(&format!("user{i}@example.com"), &role, &department))
                .await
                .unwrap();
        }
        store
            .create_user(&user_request("100%_sure@example.com", &role, &department))
            .await
            .unwrap();

        let (page, total) = store
            .list_users(&UserFilter {
                window: Window::new(10, 10),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 16);
        assert_eq!(page.len(), 6);

        // Wildcards in the needle match themselves only
        let (matched, total) = store
            .list_users(&UserFilter {
                name: Some("%_".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(matched[0].email, "100%_sure@example.com");

        let (scoped, total) = store
            .list_users(&UserFilter::in_department(Uuid::new_v4(), Window::default()))
            .await
            .unwrap();
        assert_eq!(total, 0);
        assert!(scoped.is_empty());
    }

    #[sqlx::test]
    async fn test_rename_cached_names(pool: PgPool) {
        let store = PostgresStore::new(pool);
        let (role, department) = role_and_department(&store).await;
        let user = store.create_user(&user_request("ada@example.com", &role, &department)).await.unwrap();

        assert_eq!(store.rename_role_on_users(role.id, "Operator").await.unwrap(), 1);
        assert_eq!(store.rename_role_on_users(role.id, "Operator").await.unwrap(), 0);
        assert_eq!(store.rename_department_on_users(department.id, "Labs").await.unwrap(), 1);

        let user = store.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(user.role, "Operator");
        assert_eq!(user.department, "Labs");

        assert!(store.delete_user(user.id).await.unwrap());
        assert!(!store.delete_user(user.id).await.unwrap());
    }
}
