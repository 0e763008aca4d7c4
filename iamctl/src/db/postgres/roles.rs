use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};
use tracing::instrument;
use uuid::Uuid;

use super::PostgresStore;
use crate::db::RoleStore;
use crate::db::errors::{DbError, Result};
use crate::db::models::like_pattern;
use crate::db::models::roles::{RoleCreateDBRequest, RoleDBResponse, RoleFilter, RoleUpdateDBRequest};
use crate::types::{PermissionId, RoleId, abbrev_uuid};

const ROLE_COLUMNS: &str = "id, name, description, permissions, employees, created_at, updated_at";

fn push_role_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &RoleFilter) {
    if let Some(name) = &filter.name {
        query.push(" AND name ILIKE ");
        query.push_bind(like_pattern(name));
    }
    for wanted in &filter.permissions {
        query.push(" AND EXISTS (SELECT 1 FROM jsonb_array_elements(permissions) p WHERE p->>'permission_name' ILIKE ");
        query.push_bind(like_pattern(wanted));
        query.push(")");
    }
}

#[async_trait]
impl RoleStore for PostgresStore {
    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create_role(&self, request: &RoleCreateDBRequest) -> Result<RoleDBResponse> {
        let role = sqlx::query_as::<_, RoleDBResponse>(&format!(
            "INSERT INTO roles (id, name, description, permissions) VALUES ($1, $2, $3, $4) RETURNING {ROLE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&request.name)
        .bind(&request.description)
        .bind(Json(&request.permissions))
        .fetch_one(&self.pool)
        .await?;

        Ok(role)
    }

    #[instrument(skip(self), fields(role_id = %abbrev_uuid(&id)), err)]
    async fn get_role(&self, id: RoleId) -> Result<Option<RoleDBResponse>> {
        let role = sqlx::query_as::<_, RoleDBResponse>(&format!("SELECT {ROLE_COLUMNS} FROM roles WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(role)
    }

    #[instrument(skip(self), err)]
    async fn get_role_by_name(&self, name: &str) -> Result<Option<RoleDBResponse>> {
        let role = sqlx::query_as::<_, RoleDBResponse>(&format!("SELECT {ROLE_COLUMNS} FROM roles WHERE name = $1"))
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(role)
    }

    #[instrument(skip(self, filter), fields(limit = filter.window.limit, skip = filter.window.skip), err)]
    async fn list_roles(&self, filter: &RoleFilter) -> Result<(Vec<RoleDBResponse>, i64)> {
        let mut query = QueryBuilder::new(format!("SELECT {ROLE_COLUMNS} FROM roles WHERE 1=1"));
        push_role_filter(&mut query, filter);
        query.push(format!(
            " ORDER BY {} {}, id {} LIMIT ",
            filter.sort_by.column(),
            filter.sort_order.sql(),
            filter.sort_order.sql()
        ));
        query.push_bind(filter.window.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.window.skip);
        let roles = query.build_query_as::<RoleDBResponse>().fetch_all(&self.pool).await?;

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM roles WHERE 1=1");
        push_role_filter(&mut count, filter);
        let total: (i64,) = count.build_query_as().fetch_one(&self.pool).await?;

        Ok((roles, total.0))
    }

    #[instrument(skip(self), err)]
    async fn all_roles(&self) -> Result<Vec<RoleDBResponse>> {
        let roles = sqlx::query_as::<_, RoleDBResponse>(&format!("SELECT {ROLE_COLUMNS} FROM roles ORDER BY name"))
            .fetch_all(&self.pool)
            .await?;

        Ok(roles)
    }

    #[instrument(skip(self, request), fields(role_id = %abbrev_uuid(&id)), err)]
    async fn update_role(&self, id: RoleId, request: &RoleUpdateDBRequest) -> Result<RoleDBResponse> {
        let role = sqlx::query_as::<_, RoleDBResponse>(&format!(
            r#"
            UPDATE roles SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                permissions = COALESCE($4, permissions),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ROLE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&request.name)
        .bind(&request.description)
        .bind(request.permissions.as_ref().map(Json))
        .fetch_optional(&self.pool)
        .await?;

        role.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), fields(role_id = %abbrev_uuid(&id)), err)]
    async fn delete_role(&self, id: RoleId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, name), fields(permission_id = %abbrev_uuid(&permission_id)), err)]
    async fn rename_permission_in_roles(&self, permission_id: PermissionId, name: &str) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE roles SET
                permissions = (
                    SELECT jsonb_agg(
                        CASE WHEN p->>'permission_id' = $1
                            THEN jsonb_set(p, '{permission_name}', to_jsonb($2::text))
                            ELSE p
                        END ORDER BY ord)
                    FROM jsonb_array_elements(permissions) WITH ORDINALITY AS t(p, ord)
                ),
                updated_at = NOW()
            WHERE EXISTS (
                SELECT 1 FROM jsonb_array_elements(permissions) p
                WHERE p->>'permission_id' = $1 AND p->>'permission_name' <> $2
            )
            "#,
        )
        .bind(permission_id.to_string())
        .bind(name)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self), fields(permission_id = %abbrev_uuid(&permission_id)), err)]
    async fn remove_permission_from_roles(&self, permission_id: PermissionId) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE roles SET
                permissions = COALESCE((
                    SELECT jsonb_agg(p ORDER BY ord)
                    FROM jsonb_array_elements(permissions) WITH ORDINALITY AS t(p, ord)
                    WHERE p->>'permission_id' <> $1
                ), '[]'::jsonb),
                updated_at = NOW()
            WHERE EXISTS (
                SELECT 1 FROM jsonb_array_elements(permissions) p WHERE p->>'permission_id' = $1
            )
            "#,
        )
        .bind(permission_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::PermissionRef;
    use sqlx::PgPool;

    fn permission(name: &str) -> PermissionRef {
        PermissionRef {
            permission_id: Uuid::new_v4(),
            permission_name: name.to_string(),
        }
    }

    async fn role_with(store: &PostgresStore, name: &str, permissions: Vec<PermissionRef>) -> RoleDBResponse {
        store
            .create_role(&RoleCreateDBRequest {
                name: name.to_string(),
                description: format!("{name} role"),
                permissions,
            })
            .await
            .unwrap()
    }

    #[sqlx::test]
    async fn test_duplicate_name_is_unique_violation(pool: PgPool) {
        let store = PostgresStore::new(pool);
        role_with(&store, "Auditor", vec![]).await;

        let err = store
            .create_role(&RoleCreateDBRequest {
                name: "Auditor".to_string(),
                description: String::new(),
                permissions: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { constraint: Some(ref c), .. } if c == "roles_name_key"));
    }

    #[sqlx::test]
    async fn test_permission_rename_and_removal_keep_order(pool: PgPool) {
        let store = PostgresStore::new(pool);
        let read = permission("read:reports");
        let write = permission("write:reports");
        let first = role_with(&store, "Auditor", vec![read.clone(), write.clone()]).await;
        let second = role_with(&store, "Editor", vec![write.clone()]).await;

        assert_eq!(store.rename_permission_in_roles(read.permission_id, "view:reports").await.unwrap(), 1);
        assert_eq!(store.rename_permission_in_roles(read.permission_id, "view:reports").await.unwrap(), 0);

        let auditor = store.get_role(first.id).await.unwrap().unwrap();
        assert_eq!(auditor.permissions[0].permission_name, "view:reports");
        assert_eq!(auditor.permissions[1], write);

        assert_eq!(store.remove_permission_from_roles(write.permission_id).await.unwrap(), 2);
        assert_eq!(store.remove_permission_from_roles(write.permission_id).await.unwrap(), 0);

        let auditor = store.get_role(first.id).await.unwrap().unwrap();
        assert_eq!(auditor.permissions.len(), 1);
        let editor = store.get_role(second.id).await.unwrap().unwrap();
        assert!(editor.permissions.is_empty());
    }

    #[sqlx::test]
    async fn test_search_by_permission_names(pool: PgPool) {
        let store = PostgresStore::new(pool);
        role_with(&store, "Auditor", vec![permission("read:reports"), permission("read:logs")]).await;
        role_with(&store, "Reader", vec![permission("read:reports")]).await;

        let (roles, total) = store
            .list_roles(&RoleFilter {
                permissions: vec!["reports".to_string(), "LOGS".to_string()],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(roles[0].name, "Auditor");
    }
}
