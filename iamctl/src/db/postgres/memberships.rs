use async_trait::async_trait;
use sqlx::types::Json;
use tracing::instrument;
use uuid::Uuid;

use super::PostgresStore;
use crate::db::MembershipStore;
use crate::db::errors::{DbError, Result};
use crate::db::models::{MemberEntry, MembershipOwner, PermissionRef};
use crate::types::{EmployeeId, RoleId, abbrev_uuid};

fn owner_table(owner: MembershipOwner) -> &'static str {
    match owner {
        MembershipOwner::Role => "roles",
        MembershipOwner::Department => "departments",
    }
}

#[async_trait]
impl MembershipStore for PostgresStore {
    #[instrument(skip_all, fields(owner = owner.resource(), owner_id = %abbrev_uuid(&owner_id), user_id = %abbrev_uuid(&entry.user_id)), err)]
    async fn add_member(&self, owner: MembershipOwner, owner_id: Uuid, entry: &MemberEntry) -> Result<()> {
        // Refresh the name in place when the user is already listed, append otherwise
        let sql = format!(
            r#"
            UPDATE {table} SET
                employees = CASE
                    WHEN EXISTS (SELECT 1 FROM jsonb_array_elements(employees) e WHERE e->>'user_id' = $2)
                    THEN (
                        SELECT jsonb_agg(
                            CASE WHEN e->>'user_id' = $2
                                THEN jsonb_set(e, '{{employee_name}}', to_jsonb($3::text))
                                ELSE e
                            END ORDER BY ord)
                        FROM jsonb_array_elements(employees) WITH ORDINALITY AS t(e, ord)
                    )
                    ELSE employees || jsonb_build_array(jsonb_build_object('user_id', $2::text, 'employee_name', $3::text))
                END,
                updated_at = NOW()
            WHERE id = $1
            "#,
            table = owner_table(owner)
        );

        let result = sqlx::query(&sql)
            .bind(owner_id)
            .bind(entry.user_id.to_string())
            .bind(&entry.employee_name)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip_all, fields(owner = owner.resource(), owner_id = %abbrev_uuid(&owner_id), user_id = %abbrev_uuid(&user_id)), err)]
    async fn remove_member(&self, owner: MembershipOwner, owner_id: Uuid, user_id: EmployeeId) -> Result<bool> {
        let sql = format!(
            r#"
            UPDATE {table} SET
                employees = COALESCE((
                    SELECT jsonb_agg(e ORDER BY ord)
                    FROM jsonb_array_elements(employees) WITH ORDINALITY AS t(e, ord)
                    WHERE e->>'user_id' <> $2
                ), '[]'::jsonb),
                updated_at = NOW()
            WHERE id = $1
              AND EXISTS (SELECT 1 FROM jsonb_array_elements(employees) e WHERE e->>'user_id' = $2)
            "#,
            table = owner_table(owner)
        );

        let result = sqlx::query(&sql)
            .bind(owner_id)
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip_all, fields(owner = owner.resource(), owner_id = %abbrev_uuid(&owner_id), count = members.len()), err)]
    async fn replace_members(&self, owner: MembershipOwner, owner_id: Uuid, members: &[MemberEntry]) -> Result<()> {
        let sql = format!(
            "UPDATE {} SET employees = $2, updated_at = NOW() WHERE id = $1",
            owner_table(owner)
        );
        let result = sqlx::query(&sql).bind(owner_id).bind(Json(members)).execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip_all, fields(role_id = %abbrev_uuid(&role_id), count = permissions.len()), err)]
    async fn replace_role_permissions(&self, role_id: RoleId, permissions: &[PermissionRef]) -> Result<()> {
        let result = sqlx::query("UPDATE roles SET permissions = $2, updated_at = NOW() WHERE id = $1")
            .bind(role_id)
            .bind(Json(permissions))
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }
}
