use async_trait::async_trait;
use tracing::{debug, instrument};

use super::PostgresStore;
use crate::db::SessionStore;
use crate::db::errors::{DbError, Result};
use crate::db::models::sessions::SessionDBResponse;
use crate::types::{EmployeeId, abbrev_uuid};

#[async_trait]
impl SessionStore for PostgresStore {
    #[instrument(skip(self, token_digest), fields(emp_id = %abbrev_uuid(&emp_id)), err)]
    async fn replace_session(&self, emp_id: EmployeeId, token_digest: &str) -> Result<SessionDBResponse> {
        // A concurrent login can commit its insert between our delete and insert. The unique
        // index turns that into a violation; one retry makes the later writer win.
        let mut attempts = 0;
        loop {
            attempts += 1;
            let mut tx = self.pool.begin().await?;

            sqlx::query("DELETE FROM sessions WHERE emp_id = $1")
                .bind(emp_id)
                .execute(&mut *tx)
                .await?;

            let inserted = sqlx::query_as::<_, SessionDBResponse>(
                "INSERT INTO sessions (emp_id, token_digest) VALUES ($1, $2) RETURNING emp_id, token_digest, created_at",
            )
            .bind(emp_id)
            .bind(token_digest)
            .fetch_one(&mut *tx)
            .await;

            match inserted.map_err(DbError::from) {
                Ok(session) => {
                    tx.commit().await?;
                    return Ok(session);
                }
                Err(DbError::UniqueViolation { .. }) if attempts < 2 => {
                    debug!("Concurrent session insert, retrying replacement");
                    tx.rollback().await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    #[instrument(skip(self), fields(emp_id = %abbrev_uuid(&emp_id)), err)]
    async fn get_session(&self, emp_id: EmployeeId) -> Result<Option<SessionDBResponse>> {
        let session =
            sqlx::query_as::<_, SessionDBResponse>("SELECT emp_id, token_digest, created_at FROM sessions WHERE emp_id = $1")
                .bind(emp_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(session)
    }

    #[instrument(skip(self), fields(emp_id = %abbrev_uuid(&emp_id)), err)]
    async fn delete_session(&self, emp_id: EmployeeId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE emp_id = $1")
            .bind(emp_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;
    use uuid::Uuid;

    #[sqlx::test]
    async fn test_replace_session_supersedes(pool: PgPool) {
        let store = PostgresStore::new(pool);
        let emp_id = Uuid::new_v4();

        store.replace_session(emp_id, "digest-a").await.unwrap();
        store.replace_session(emp_id, "digest-b").await.unwrap();

        let session = store.get_session(emp_id).await.unwrap().unwrap();
        assert_eq!(session.token_digest, "digest-b");

        assert!(store.delete_session(emp_id).await.unwrap());
        assert!(!store.delete_session(emp_id).await.unwrap());
        assert!(store.get_session(emp_id).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_concurrent_replacements_leave_one_session(pool: PgPool) {
        let store = PostgresStore::new(pool);
        let emp_id = Uuid::new_v4();

        let (a, b) = tokio::join!(store.replace_session(emp_id, "digest-a"), store.replace_session(emp_id, "digest-b"));
        a.unwrap();
        b.unwrap();

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sessions WHERE emp_id = $1")
            .bind(emp_id)
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count.0, 1);

        let session = store.get_session(emp_id).await.unwrap().unwrap();
        assert!(session.token_digest == "digest-a" || session.token_digest == "digest-b");
    }
}
