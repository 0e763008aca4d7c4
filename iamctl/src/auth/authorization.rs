//! Role-based authorization with a department scope for managers.
//!
//! Handlers declare their policy in the signature:
//!
//! ```ignore
//! async fn get_department(_: RequiresRole<policy::AdminsAndManagers>, ...) -> ...
//! ```
//!
//! The extractor resolves the [`Principal`] set by the authentication middleware, checks the
//! role against the policy's allowed set and, for Department Managers on routes carrying a
//! `dep_id` path parameter, runs [`authorize_scoped`].

use axum::{
    extract::{FromRequestParts, RawPathParams},
    http::request::Parts,
};
use std::marker::PhantomData;
use tracing::{debug, instrument};

use crate::{
    AppState,
    auth::Principal,
    db::Store,
    errors::{Error, Result},
    types::{DepartmentId, abbrev_uuid, parse_id, roles},
};

/// A named set of roles allowed on a route.
pub trait Policy: Send + Sync + 'static {
    const ALLOWED: &'static [&'static str];
}

/// Route policies.
pub mod policy {
    use super::Policy;
    use crate::types::roles::{ADMIN, DATA_ENTRY_OPERATOR, DEPARTMENT_MANAGER, SUPER_ADMIN};

    pub struct AdminsOnly;
    pub struct AdminsAndOperators;
    pub struct AdminsAndManagers;
    pub struct SuperAdminOnly;

    impl Policy for AdminsOnly {
        const ALLOWED: &'static [&'static str] = &[SUPER_ADMIN, ADMIN];
    }

    impl Policy for AdminsAndOperators {
        const ALLOWED: &'static [&'static str] = &[SUPER_ADMIN, ADMIN, DATA_ENTRY_OPERATOR];
    }

    impl Policy for AdminsAndManagers {
        const ALLOWED: &'static [&'static str] = &[SUPER_ADMIN, ADMIN, DEPARTMENT_MANAGER];
    }

    impl Policy for SuperAdminOnly {
        const ALLOWED: &'static [&'static str] = &[SUPER_ADMIN];
    }
}

fn access_denied(message: &str) -> Error {
    Error::Unauthenticated {
        message: Some(message.to_string()),
    }
}

/// Exact-match check of the principal's role against `allowed`. Unknown roles never pass.
pub fn authorize(principal: &Principal, allowed: &[&str]) -> Result<()> {
    if allowed.contains(&principal.role.as_str()) {
        Ok(())
    } else {
        debug!(role = %principal.role, "Role not permitted on route");
        Err(access_denied("Access Denied"))
    }
}

/// Department scope check for managers.
///
/// Passes only if `target` is the principal's own department and the live department record
/// still names the principal as its manager.
#[instrument(skip(store, principal), fields(emp_id = %abbrev_uuid(&principal.emp_id), target = %abbrev_uuid(&target)), err)]
pub async fn authorize_scoped(store: &dyn Store, principal: &Principal, target: DepartmentId) -> Result<()> {
    if target != principal.department_id {
        return Err(access_denied("Access denied"));
    }

    match store.get_department(principal.department_id).await? {
        Some(department) if department.manager_id == Some(principal.emp_id) => Ok(()),
        _ => Err(access_denied("Access denied")),
    }
}

/// Extractor that authorizes the request against policy `P`.
pub struct RequiresRole<P: Policy> {
    pub principal: Principal,
    _policy: PhantomData<P>,
}

impl<P: Policy> FromRequestParts<AppState> for RequiresRole<P> {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let principal = Principal::from_request_parts(parts, state).await?;
        authorize(&principal, P::ALLOWED)?;

        if principal.role == roles::DEPARTMENT_MANAGER {
            let dep_id = RawPathParams::from_request_parts(parts, state)
                .await
                .ok()
                .and_then(|params| params.iter().find(|(key, _)| *key == "dep_id").map(|(_, value)| value.to_string()));
            if let Some(raw) = dep_id {
                let target = parse_id(&raw, "Department")?;
                authorize_scoped(state.store.as_ref(), &principal, target).await?;
            }
        }

        Ok(Self {
            principal,
            _policy: PhantomData,
        })
    }
}
