use axum::{Json, extract::State};

use crate::{
    AppState,
    api::models::integrity::ReconcileResponse,
    audit::{Actor, kinds},
    auth::authorization::{RequiresRole, policy},
    errors::{CommitStage, PostCommit, Result},
};

/// Recompute every membership cache from the employee records
#[utoipa::path(
    post,
    path = "/integrity/reconcile",
    tag = "integrity",
    responses(
        (status = 200, description = "Reconciliation report", body = ReconcileResponse),
        (status = 401, description = "Not authenticated or not a Super Admin"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn reconcile(State(state): State<AppState>, auth: RequiresRole<policy::SuperAdminOnly>) -> Result<Json<ReconcileResponse>> {
    let report = state.integrity.reconcile().await?;

    let mut post = PostCommit::new();
    post.record(
        CommitStage::Audit,
        state
            .audit
            .record(
                kinds::RECONCILIATION,
                &Actor::from(&auth.principal),
                None,
                format!(
                    "Reconciliation repaired {} inconsistencies and found {} orphaned employees.",
                    report.changes(),
                    report.orphaned_users.len()
                ),
            )
            .await,
    );
    post.finish()?;

    Ok(Json(ReconcileResponse {
        msg: "Reconciliation complete".to_string(),
        report,
    }))
}

#[cfg(test)]
mod tests {
    use crate::{
        db::{DepartmentStore, MembershipStore, models::MembershipOwner},
        test_utils::*,
        types::roles,
    };
    use axum::http::StatusCode;
    use serde_json::Value;

    #[test_log::test(tokio::test)]
    async fn test_reconcile_repairs_and_is_idempotent() {
        let (server, store) = create_test_app().await;
        let (_root, session) = login_as(&server, &store, "root@example.com", roles::SUPER_ADMIN).await;
        let worker = seed_employee(&store, "worker@example.com", roles::DATA_ENTRY_OPERATOR).await;

        store
            .remove_member(MembershipOwner::Department, worker.department_id, worker.id)
            .await
            .unwrap();

        let first: Value = server
            .post("/api/v1/integrity/reconcile")
            .add_header("cookie", session.header())
            .await
            .json();
        assert_eq!(first["report"]["departmentMembershipsRepaired"], 1);

        let department = store.get_department(worker.department_id).await.unwrap().unwrap();
        assert!(department.has_member(worker.id));

        let second = server.post("/api/v1/integrity/reconcile").add_header("cookie", session.header()).await;
        second.assert_status_ok();
        let second: Value = second.json();
        assert_eq!(second["report"]["departmentMembershipsRepaired"], 0);
        assert_eq!(second["report"]["roleMembershipsRepaired"], 0);
    }

    #[tokio::test]
    async fn test_reconcile_is_super_admin_only() {
        let (server, store) = create_test_app().await;
        let (_admin, session) = login_as(&server, &store, "admin@example.com", roles::ADMIN).await;

        server
            .post("/api/v1/integrity/reconcile")
            .add_header("cookie", session.header())
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }
}
