use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use tracing::instrument;
use uuid::Uuid;

use super::PostgresStore;
use crate::db::PermissionStore;
use crate::db::errors::{DbError, Result};
use crate::db::models::like_pattern;
use crate::db::models::permissions::{PermissionCreateDBRequest, PermissionDBResponse, PermissionFilter, PermissionUpdateDBRequest};
use crate::types::{PermissionId, abbrev_uuid};

const PERMISSION_COLUMNS: &str = "id, name, description, created_at, updated_at";

fn push_permission_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &PermissionFilter) {
    if let Some(name) = &filter.name {
        query.push(" AND name ILIKE ");
        query.push_bind(like_pattern(name));
    }
}

#[async_trait]
impl PermissionStore for PostgresStore {
    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create_permission(&self, request: &PermissionCreateDBRequest) -> Result<PermissionDBResponse> {
        let permission = sqlx::query_as::<_, PermissionDBResponse>(&format!(
            "INSERT INTO permissions (id, name, description) VALUES ($1, $2, $3) RETURNING {PERMISSION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&request.name)
        .bind(&request.description)
        .fetch_one(&self.pool)
        .await?;

        Ok(permission)
    }

    #[instrument(skip(self), fields(permission_id = %abbrev_uuid(&id)), err)]
    async fn get_permission(&self, id: PermissionId) -> Result<Option<PermissionDBResponse>> {
        let permission = sqlx::query_as::<_, PermissionDBResponse>(&format!("SELECT {PERMISSION_COLUMNS} FROM permissions WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(permission)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_permissions(&self, ids: &[PermissionId]) -> Result<Vec<PermissionDBResponse>> {
        let permissions = sqlx::query_as::<_, PermissionDBResponse>(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions WHERE id = ANY($1) ORDER BY name"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(permissions)
    }

    #[instrument(skip(self, filter), fields(limit = filter.window.limit, skip = filter.window.skip), err)]
    async fn list_permissions(&self, filter: &PermissionFilter) -> Result<(Vec<PermissionDBResponse>, i64)> {
        let mut query = QueryBuilder::new(format!("SELECT {PERMISSION_COLUMNS} FROM permissions WHERE 1=1"));
        push_permission_filter(&mut query, filter);
        query.push(format!(
            " ORDER BY {} {}, id {} LIMIT ",
            filter.sort_by.column(),
            filter.sort_order.sql(),
            filter.sort_order.sql()
        ));
        query.push_bind(filter.window.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.window.skip);
        let permissions = query.build_query_as::<PermissionDBResponse>().fetch_all(&self.pool).await?;

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM permissions WHERE 1=1");
        push_permission_filter(&mut count, filter);
        let total: (i64,) = count.build_query_as().fetch_one(&self.pool).await?;

        Ok((permissions, total.0))
    }

    #[instrument(skip(self), err)]
    async fn all_permissions(&self) -> Result<Vec<PermissionDBResponse>> {
        let permissions = sqlx::query_as::<_, PermissionDBResponse>(&format!("SELECT {PERMISSION_COLUMNS} FROM permissions ORDER BY name"))
            .fetch_all(&self.pool)
            .await?;

        Ok(permissions)
    }

    #[instrument(skip(self, request), fields(permission_id = %abbrev_uuid(&id)), err)]
    async fn update_permission(&self, id: PermissionId, request: &PermissionUpdateDBRequest) -> Result<PermissionDBResponse> {
        let permission = sqlx::query_as::<_, PermissionDBResponse>(&format!(
            r#"
            UPDATE permissions SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PERMISSION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&request.name)
        .bind(&request.description)
        .fetch_optional(&self.pool)
        .await?;

        permission.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), fields(permission_id = %abbrev_uuid(&id)), err)]
    async fn delete_permission(&self, id: PermissionId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM permissions WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}
