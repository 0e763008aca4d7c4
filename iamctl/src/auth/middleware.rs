use axum::{
    extract::{Request, State},
    http::{HeaderValue, header},
    middleware::Next,
    response::Response,
};
use tracing::{debug, instrument, trace};

use crate::{
    AppState,
    auth::{
        Principal, cookies,
        sessions,
        tokens::{self, decode_expired_refresh_token, verify_access_token, verify_refresh_token},
    },
    errors::{Error, Result},
    types::abbrev_uuid,
};

fn invalid() -> Error {
    Error::Unauthenticated {
        message: Some("Authentication Invalid".to_string()),
    }
}

/// Resolve a principal from a refresh token.
///
/// The token must verify and match the employee's stored session, and the employee must still
/// exist. The returned principal is rebuilt from the live record, so role or department changes
/// since login take effect. A session is revoked when its token has expired or when its
/// employee is gone.
#[instrument(skip_all, err)]
pub async fn resolve_refresh(state: &AppState, refresh_token: &str) -> Result<Principal> {
    let token_config = &state.config.auth.tokens;
    let store = state.store.as_ref();

    let claims = match verify_refresh_token(refresh_token, token_config) {
        Ok(claims) => claims,
        Err(Error::Unauthenticated { .. }) => {
            if let Ok(expired) = decode_expired_refresh_token(refresh_token, token_config)
                && sessions::find_active(store, expired.emp_id, refresh_token).await?.is_some()
            {
                debug!(emp_id = %abbrev_uuid(&expired.emp_id), "Revoking session of expired refresh token");
                sessions::revoke(store, expired.emp_id).await?;
            }
            return Err(invalid());
        }
        Err(e) => return Err(e),
    };

    if sessions::find_active(store, claims.emp_id, refresh_token).await?.is_none() {
        trace!("Refresh token does not match the stored session");
        return Err(invalid());
    }

    match store.get_user(claims.emp_id).await? {
        Some(user) => Ok(Principal::from(&user)),
        None => {
            debug!(emp_id = %abbrev_uuid(&claims.emp_id), "Revoking session of deleted employee");
            sessions::revoke(store, claims.emp_id).await?;
            Err(invalid())
        }
    }
}

/// Authentication layer for the directory routes.
///
/// Tries the access cookie, then the refresh cookie. On the refresh path a new access cookie
/// is appended to the response.
#[instrument(skip_all)]
pub async fn authenticate(State(state): State<AppState>, mut request: Request, next: Next) -> Result<Response> {
    let cookie_config = &state.config.auth.cookies;
    let access = cookies::read_cookie(request.headers(), &cookie_config.access_cookie_name).map(str::to_string);
    let refresh = cookies::read_cookie(request.headers(), &cookie_config.refresh_cookie_name).map(str::to_string);

    if access.is_none() && refresh.is_none() {
        return Err(Error::Unauthenticated {
            message: Some("Authentication Invalid, no tokens found".to_string()),
        });
    }

    if let Some(token) = access.as_deref() {
        match verify_access_token(token, &state.config.auth.tokens) {
            Ok(claims) => {
                trace!(emp_id = %abbrev_uuid(&claims.emp_id), "Authenticated by access token");
                request.extensions_mut().insert(Principal::from(claims));
                return Ok(next.run(request).await);
            }
            Err(Error::Unauthenticated { .. }) => trace!("Access token rejected, trying refresh token"),
            Err(e) => return Err(e),
        }
    }

    let Some(token) = refresh.as_deref() else {
        return Err(invalid());
    };

    let principal = resolve_refresh(&state, token).await?;
    let issued = tokens::issue_access_token(&principal, &state.config.auth.tokens)?;
    let cookie = cookies::token_cookie(
        &cookie_config.access_cookie_name,
        &issued.token,
        state.config.auth.tokens.access_expiry,
        cookie_config,
    );
    debug!(emp_id = %abbrev_uuid(&principal.emp_id), "Authenticated by refresh token, access token reissued");

    request.extensions_mut().insert(principal);
    let mut response = next.run(request).await;
    let value = HeaderValue::from_str(&cookie).map_err(|e| Error::Internal {
        operation: format!("build access cookie header: {e}"),
    })?;
    response.headers_mut().append(header::SET_COOKIE, value);
    Ok(response)
}
