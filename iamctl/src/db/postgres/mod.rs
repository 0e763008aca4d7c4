//! PostgreSQL store.
//!
//! Queries are built at runtime with `sqlx::query_as` and [`sqlx::QueryBuilder`], so the crate
//! compiles without a live database. Member and permission caches are JSONB arrays edited in
//! place by single `UPDATE` statements.

mod audit_logs;
mod departments;
mod memberships;
mod permissions;
mod reset_tokens;
mod roles;
mod sessions;
mod users;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::config::PoolSettings;
use crate::db::Store;
use crate::db::errors::Result;

/// Get the iamctl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with the configured pool settings and run pending migrations.
    pub async fn connect(url: &str, settings: &PoolSettings) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(settings.acquire_timeout)
            .connect(url)
            .await?;

        migrator().run(&pool).await?;
        info!("Database migrations applied");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::PostgresStore;
    use crate::db::models::{
        departments::{DepartmentCreateDBRequest, DepartmentDBResponse},
        roles::{RoleCreateDBRequest, RoleDBResponse},
        users::UserCreateDBRequest,
    };
    use crate::db::{DepartmentStore, RoleStore};

    pub async fn role_and_department(store: &PostgresStore) -> (RoleDBResponse, DepartmentDBResponse) {
        let role = store
            .create_role(&RoleCreateDBRequest {
                name: "Admin".to_string(),
                description: "Admin role".to_string(),
                permissions: vec![],
            })
            .await
            .expect("Failed to create test role");
        let department = store
            .create_department(&DepartmentCreateDBRequest {
                name: "Research".to_string(),
                description: "Research department".to_string(),
            })
            .await
            .expect("Failed to create test department");
        (role, department)
    }

    pub fn user_request(email: &str, role: &RoleDBResponse, department: &DepartmentDBResponse) -> UserCreateDBRequest {
        UserCreateDBRequest {
            first_name: "Test".to_string(),
            last_name: email.split('@').next().unwrap_or(email).to_string(),
            email: email.to_string(),
            role: role.name.clone(),
            role_id: role.id,
            department: department.name.clone(),
            department_id: department.id,
            password_hash: "hash".to_string(),
        }
    }
}
