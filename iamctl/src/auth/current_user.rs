use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::trace;

use crate::{
    AppState,
    auth::Principal,
    errors::{Error, Result},
};

/// The principal is resolved once by [`crate::auth::middleware::authenticate`] and stored in
/// the request extensions; this extractor only reads it back.
impl FromRequestParts<AppState> for Principal {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self> {
        match parts.extensions.get::<Principal>() {
            Some(principal) => Ok(principal.clone()),
            None => {
                trace!("No principal in request extensions");
                Err(Error::Unauthenticated { message: None })
            }
        }
    }
}
