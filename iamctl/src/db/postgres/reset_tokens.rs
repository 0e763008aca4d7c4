use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::instrument;
use uuid::Uuid;

use super::PostgresStore;
use crate::db::ResetTokenStore;
use crate::db::errors::Result;
use crate::db::models::reset_tokens::{ResetTokenConsumption, ResetTokenCreateDBRequest, ResetTokenDBResponse};

const RESET_TOKEN_COLUMNS: &str = "id, email, token_digest, expires_at, created_at";

#[async_trait]
impl ResetTokenStore for PostgresStore {
    #[instrument(skip(self, request), err)]
    async fn create_reset_token(&self, request: &ResetTokenCreateDBRequest) -> Result<ResetTokenDBResponse> {
        let token = sqlx::query_as::<_, ResetTokenDBResponse>(&format!(
            "INSERT INTO reset_tokens (id, email, token_digest, expires_at) VALUES ($1, $2, $3, $4) RETURNING {RESET_TOKEN_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&request.email)
        .bind(&request.token_digest)
        .bind(request.expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(token)
    }

    #[instrument(skip(self, email, token_digest), err)]
    async fn consume_reset_token(&self, email: &str, token_digest: &str, now: DateTime<Utc>) -> Result<ResetTokenConsumption> {
        let mut tx = self.pool.begin().await?;

        // The row lock taken by DELETE makes a concurrent attempt with the same token miss
        let mut taken = sqlx::query_as::<_, ResetTokenDBResponse>(&format!(
            "DELETE FROM reset_tokens WHERE email = $1 AND token_digest = $2 RETURNING {RESET_TOKEN_COLUMNS}"
        ))
        .bind(email)
        .bind(token_digest)
        .fetch_all(&mut *tx)
        .await?;

        let Some(token) = taken.pop() else {
            tx.rollback().await?;
            return Ok(ResetTokenConsumption::NotFound);
        };

        if token.is_expired(now) {
            tx.commit().await?;
            return Ok(ResetTokenConsumption::Expired);
        }

        sqlx::query("DELETE FROM reset_tokens WHERE email = $1")
            .bind(email)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(ResetTokenConsumption::Consumed(token))
    }

    #[instrument(skip(self, email), err)]
    async fn delete_reset_tokens_for_email(&self, email: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM reset_tokens WHERE email = $1")
            .bind(email)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sqlx::PgPool;

    async fn store_token(store: &PostgresStore, email: &str, digest: &str, expires_at: DateTime<Utc>) {
        store
            .create_reset_token(&ResetTokenCreateDBRequest {
                email: email.to_string(),
                token_digest: digest.to_string(),
                expires_at,
            })
            .await
            .unwrap();
    }

    #[sqlx::test]
    async fn test_consume_purges_siblings(pool: PgPool) {
        let store = PostgresStore::new(pool);
        let now = Utc::now();
        store_token(&store, "ada@example.com", "a", now + Duration::minutes(30)).await;
        store_token(&store, "ada@example.com", "b", now + Duration::minutes(30)).await;
        store_token(&store, "grace@example.com", "c", now + Duration::minutes(30)).await;

        let outcome = store.consume_reset_token("ada@example.com", "a", now).await.unwrap();
        assert!(matches!(outcome, ResetTokenConsumption::Consumed(ref t) if t.token_digest == "a"));
        let outcome = store.consume_reset_token("ada@example.com", "b", now).await.unwrap();
        assert!(matches!(outcome, ResetTokenConsumption::NotFound));

        // Another address is untouched
        assert_eq!(store.delete_reset_tokens_for_email("grace@example.com").await.unwrap(), 1);
    }

    #[sqlx::test]
    async fn test_expired_token_is_purged_alone(pool: PgPool) {
        let store = PostgresStore::new(pool);
        let now = Utc::now();
        store_token(&store, "ada@example.com", "stale", now - Duration::minutes(1)).await;
        store_token(&store, "ada@example.com", "live", now + Duration::minutes(30)).await;

        let outcome = store.consume_reset_token("ada@example.com", "stale", now).await.unwrap();
        assert!(matches!(outcome, ResetTokenConsumption::Expired));
        let outcome = store.consume_reset_token("ada@example.com", "stale", now).await.unwrap();
        assert!(matches!(outcome, ResetTokenConsumption::NotFound));

        let outcome = store.consume_reset_token("ada@example.com", "live", now).await.unwrap();
        assert!(matches!(outcome, ResetTokenConsumption::Consumed(_)));
    }

    #[sqlx::test]
    async fn test_token_is_bound_to_its_email(pool: PgPool) {
        let store = PostgresStore::new(pool);
        let now = Utc::now();
        store_token(&store, "ada@example.com", "a", now + Duration::minutes(30)).await;

        let outcome = store.consume_reset_token("grace@example.com", "a", now).await.unwrap();
        assert!(matches!(outcome, ResetTokenConsumption::NotFound));
        assert_eq!(store.delete_reset_tokens_for_email("ada@example.com").await.unwrap(), 1);
    }
}
