use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use tracing::instrument;
use uuid::Uuid;

use super::PostgresStore;
use crate::db::AuditStore;
use crate::db::errors::Result;
use crate::db::models::audit_logs::{AuditLogCreateDBRequest, AuditLogDBResponse, AuditLogFilter};
use crate::db::models::like_pattern;
use crate::types::{AuditLogId, abbrev_uuid};

const AUDIT_LOG_COLUMNS: &str = "id, log_type, user_name, actor_id, target_id, action, created_at";

fn push_audit_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &AuditLogFilter) {
    if let Some(log_type) = &filter.log_type {
        query.push(" AND log_type ILIKE ");
        query.push_bind(like_pattern(log_type));
    }
    if let Some(actor_id) = filter.actor_id {
        query.push(" AND actor_id = ");
        query.push_bind(actor_id);
    }
    if let Some(from) = filter.from {
        query.push(" AND created_at >= ");
        query.push_bind(from);
    }
    if let Some(to) = filter.to {
        query.push(" AND created_at <= ");
        query.push_bind(to);
    }
}

#[async_trait]
impl AuditStore for PostgresStore {
    #[instrument(skip(self, request), fields(log_type = %request.log_type), err)]
    async fn insert_audit_log(&self, request: &AuditLogCreateDBRequest) -> Result<AuditLogDBResponse> {
        let record = sqlx::query_as::<_, AuditLogDBResponse>(&format!(
            "INSERT INTO audit_logs (id, log_type, user_name, actor_id, target_id, action) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {AUDIT_LOG_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&request.log_type)
        .bind(&request.user_name)
        .bind(request.actor_id)
        .bind(&request.target_id)
        .bind(&request.action)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    #[instrument(skip(self), fields(audit_id = %abbrev_uuid(&id)), err)]
    async fn get_audit_log(&self, id: AuditLogId) -> Result<Option<AuditLogDBResponse>> {
        let record = sqlx::query_as::<_, AuditLogDBResponse>(&format!("SELECT {AUDIT_LOG_COLUMNS} FROM audit_logs WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    #[instrument(skip(self, filter), fields(limit = filter.window.limit, skip = filter.window.skip), err)]
    async fn list_audit_logs(&self, filter: &AuditLogFilter) -> Result<(Vec<AuditLogDBResponse>, i64)> {
        let mut query = QueryBuilder::new(format!("SELECT {AUDIT_LOG_COLUMNS} FROM audit_logs WHERE 1=1"));
        push_audit_filter(&mut query, filter);
        query.push(format!(
            " ORDER BY {} {}, id {} LIMIT ",
            filter.sort_by.column(),
            filter.sort_order.sql(),
            filter.sort_order.sql()
        ));
        query.push_bind(filter.window.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.window.skip);
        let logs = query.build_query_as::<AuditLogDBResponse>().fetch_all(&self.pool).await?;

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM audit_logs WHERE 1=1");
        push_audit_filter(&mut count, filter);
        let total: (i64,) = count.build_query_as().fetch_one(&self.pool).await?;

        Ok((logs, total.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    fn entry(log_type: &str, actor_id: Option<Uuid>) -> AuditLogCreateDBRequest {
        AuditLogCreateDBRequest {
            log_type: log_type.to_string(),
            user_name: "Ada Lovelace".to_string(),
            actor_id,
            target_id: None,
            action: format!("{log_type} happened"),
        }
    }

    #[sqlx::test]
    async fn test_audit_log_is_append_only(pool: PgPool) {
        let store = PostgresStore::new(pool);
        let record = store.insert_audit_log(&entry("LOGIN", None)).await.unwrap();

        let update = sqlx::query("UPDATE audit_logs SET action = 'rewritten' WHERE id = $1")
            .bind(record.id)
            .execute(store.pool())
            .await;
        assert!(update.is_err());
        let delete = sqlx::query("DELETE FROM audit_logs WHERE id = $1")
            .bind(record.id)
            .execute(store.pool())
            .await;
        assert!(delete.is_err());

        let stored = store.get_audit_log(record.id).await.unwrap().unwrap();
        assert_eq!(stored.action, "LOGIN happened");
    }

    #[sqlx::test]
    async fn test_filter_by_type_and_actor(pool: PgPool) {
        let store = PostgresStore::new(pool);
        let actor = Uuid::new_v4();
        store.insert_audit_log(&entry("EMPLOYEE_CREATED", Some(actor))).await.unwrap();
        store.insert_audit_log(&entry("EMPLOYEE_DELETED", Some(actor))).await.unwrap();
        store.insert_audit_log(&entry("ROLE_CREATED", None)).await.unwrap();

        let (logs, total) = store
            .list_audit_logs(&AuditLogFilter {
                log_type: Some("employee".to_string()),
                actor_id: Some(actor),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert!(logs.iter().all(|l| l.actor_id == Some(actor)));
    }
}
