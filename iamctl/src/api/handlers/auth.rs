use axum::{
    Json,
    extract::{Query, State},
    http::HeaderMap,
};
use chrono::Utc;
use tracing::{debug, info};
use url::Url;

use crate::{
    AppState,
    api::models::{
        CookieResponse, MessageResponse,
        auth::{
            ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, LoginResponse, LoginUser, MeResponse, ProfileResponse,
            ResetPasswordQuery, ResetPasswordRequest,
        },
    },
    audit::{Actor, kinds},
    auth::{
        Principal, cookies, middleware::resolve_refresh,
        password::{self, Argon2Params},
        sessions,
        tokens::{self, token_digest},
    },
    db::models::{
        reset_tokens::{ResetTokenConsumption, ResetTokenCreateDBRequest},
        users::{UserDBResponse, UserUpdateDBRequest},
    },
    errors::{CommitStage, Error, PostCommit, Result},
};

fn employee_not_found(id: impl Into<String>) -> Error {
    Error::NotFound {
        resource: "Employee".to_string(),
        id: id.into(),
    }
}

fn bad_request(message: &str) -> Error {
    Error::BadRequest {
        message: message.to_string(),
    }
}

/// Replace an employee's password hash and end everything the old credential granted: the
/// refresh session and any outstanding reset tokens.
pub(crate) async fn rotate_credential(state: &AppState, user: &UserDBResponse, new_password: &str) -> Result<()> {
    let hash = password::hash_password(new_password, Argon2Params::from(&state.config.auth.password)).await?;
    state
        .store
        .update_user(
            user.id,
            &UserUpdateDBRequest {
                password_hash: Some(hash),
                ..Default::default()
            },
        )
        .await?;
    sessions::revoke(state.store.as_ref(), user.id).await?;
    state.store.delete_reset_tokens_for_email(&user.email).await?;
    Ok(())
}

fn clear_token_cookies(state: &AppState) -> [String; 2] {
    let config = &state.config.auth.cookies;
    [
        cookies::clear_cookie(&config.access_cookie_name, config),
        cookies::clear_cookie(&config.refresh_cookie_name, config),
    ]
}

/// Log in with username and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    tag = "auth",
    responses(
        (status = 200, description = "Login successful; access and refresh cookies are set", body = LoginResponse),
        (status = 400, description = "Missing fields or wrong password"),
        (status = 404, description = "No such employee"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<CookieResponse<LoginResponse>> {
    let username = request.username.trim();
    if username.is_empty() || request.password.is_empty() {
        return Err(bad_request("Username and password cannot be empty"));
    }

    let user = state
        .store
        .get_user_by_username(username)
        .await?
        .ok_or_else(|| employee_not_found(username))?;

    if !password::verify_password(&request.password, &user.password_hash).await? {
        return Err(bad_request("Username or password is incorrect"));
    }

    let principal = Principal::from(&user);
    let token_config = &state.config.auth.tokens;
    let access = tokens::issue_access_token(&principal, token_config)?;
    let refresh = tokens::issue_refresh_token(&principal, token_config)?;

    sessions::create(state.store.as_ref(), user.id, &refresh.token).await?;
    state.store.delete_reset_tokens_for_email(&user.email).await?;

    let cookie_config = &state.config.auth.cookies;
    let cookies = [
        cookies::token_cookie(&cookie_config.access_cookie_name, &access.token, token_config.access_expiry, cookie_config),
        cookies::token_cookie(&cookie_config.refresh_cookie_name, &refresh.token, token_config.refresh_expiry, cookie_config),
    ];

    info!(emp_id = %user.id, "Employee logged in");
    CookieResponse::new(
        LoginResponse {
            msg: "Login Successful".to_string(),
            user: LoginUser {
                name: principal.name,
                role: principal.role,
            },
        },
        cookies,
    )
}

/// Log out, ending the refresh session
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Logged out; cookies are cleared", body = MessageResponse),
        (status = 401, description = "Not authenticated"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, principal: Principal) -> Result<CookieResponse<MessageResponse>> {
    if !sessions::revoke(state.store.as_ref(), principal.emp_id).await? {
        debug!("Logout without an active session");
    }
    CookieResponse::new(MessageResponse::new("Logout Successful"), clear_token_cookies(&state))
}

/// Issue a new access token from the refresh cookie
#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "auth",
    responses(
        (status = 200, description = "New access cookie is set", body = MessageResponse),
        (status = 401, description = "Refresh token missing, invalid or revoked"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn refresh(State(state): State<AppState>, headers: HeaderMap) -> Result<CookieResponse<MessageResponse>> {
    let cookie_config = &state.config.auth.cookies;
    let token = cookies::read_cookie(&headers, &cookie_config.refresh_cookie_name).ok_or_else(|| Error::Unauthenticated {
        message: Some("Authentication Invalid, no tokens found".to_string()),
    })?;

    let principal = resolve_refresh(&state, token).await?;
    let access = tokens::issue_access_token(&principal, &state.config.auth.tokens)?;
    let cookie = cookies::token_cookie(
        &cookie_config.access_cookie_name,
        &access.token,
        state.config.auth.tokens.access_expiry,
        cookie_config,
    );

    CookieResponse::new(MessageResponse::new("New Access Token is set"), [cookie])
}

/// The caller's profile
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Profile of the authenticated employee", body = MeResponse),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Employee no longer exists"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn me(State(state): State<AppState>, principal: Principal) -> Result<Json<MeResponse>> {
    let user = state
        .store
        .get_user(principal.emp_id)
        .await?
        .ok_or_else(|| employee_not_found(principal.emp_id.to_string()))?;

    Ok(Json(MeResponse {
        msg: "User data".to_string(),
        user: ProfileResponse::from(user),
    }))
}

/// Email a password reset link
#[utoipa::path(
    post,
    path = "/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    tag = "auth",
    responses(
        (status = 200, description = "Reset link sent", body = MessageResponse),
        (status = 400, description = "Email missing"),
        (status = 404, description = "No employee with this email"),
        (status = 502, description = "Token stored but the email could not be delivered"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn forgot_password(State(state): State<AppState>, Json(request): Json<ForgotPasswordRequest>) -> Result<Json<MessageResponse>> {
    const SENT: &str = "Password reset link sent to the registered email";

    let email = request.email.trim();
    if email.is_empty() {
        return Err(bad_request("Email cannot be empty"));
    }

    let reset_config = &state.config.auth.password_reset;
    let Some(user) = state.store.get_user_by_email(email).await? else {
        if reset_config.uniform_response {
            debug!("Password reset requested for unknown email");
            return Ok(Json(MessageResponse::new(SENT)));
        }
        return Err(employee_not_found(email));
    };

    let issued = tokens::issue_reset_token(reset_config.token_ttl)?;
    state
        .store
        .create_reset_token(&ResetTokenCreateDBRequest {
            email: user.email.clone(),
            token_digest: issued.digest,
            expires_at: issued.expires_at,
        })
        .await?;

    let mut link = Url::parse(&format!("{}/reset-password", reset_config.base_url.trim_end_matches('/'))).map_err(|e| Error::Internal {
        operation: format!("build reset link: {e}"),
    })?;
    link.query_pairs_mut()
        .append_pair("email", &user.email)
        .append_pair("resetToken", &issued.token);

    let mut post = PostCommit::new();
    post.record(
        CommitStage::Mail,
        state
            .email
            .send_password_reset_email(&user.email, &user.full_name(), link.as_str())
            .await,
    );
    post.finish()?;

    Ok(Json(MessageResponse::new(SENT)))
}

/// Set a new password with a reset token
#[utoipa::path(
    put,
    path = "/auth/reset-password",
    params(ResetPasswordQuery),
    request_body = ResetPasswordRequest,
    tag = "auth",
    responses(
        (status = 200, description = "Password changed; existing session revoked", body = MessageResponse),
        (status = 400, description = "Missing input, invalid or expired token, or password out of bounds"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    Query(query): Query<ResetPasswordQuery>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>> {
    let email = query.email.as_deref().map(str::trim).unwrap_or_default();
    let token = query.reset_token.as_deref().map(str::trim).unwrap_or_default();
    if email.is_empty() || token.is_empty() {
        return Err(bad_request("Email and reset token are required"));
    }
    if request.password.is_empty() {
        return Err(bad_request("Password cannot be empty"));
    }
    password::validate_length(&request.password, &state.config.auth.password)?;

    match state.store.consume_reset_token(email, &token_digest(token), Utc::now()).await? {
        ResetTokenConsumption::Consumed(_) => {}
        ResetTokenConsumption::Expired => return Err(bad_request("Reset token has expired")),
        ResetTokenConsumption::NotFound => return Err(bad_request("Invalid reset token")),
    }

    let user = state.store.get_user_by_email(email).await?.ok_or_else(|| employee_not_found(email))?;
    rotate_credential(&state, &user, &request.password).await?;

    let mut post = PostCommit::new();
    let name = user.full_name();
    post.record(
        CommitStage::Audit,
        state
            .audit
            .record(
                kinds::PASSWORD_RESET,
                &Actor::new(name.clone(), user.id),
                Some(user.id.to_string()),
                format!("{name} reset their password using a reset link"),
            )
            .await,
    );
    post.finish()?;

    Ok(Json(MessageResponse::new("Password reset Successful")))
}

/// Change the caller's password
#[utoipa::path(
    post,
    path = "/auth/change-password",
    request_body = ChangePasswordRequest,
    tag = "auth",
    responses(
        (status = 200, description = "Password changed; session ended and cookies cleared", body = MessageResponse),
        (status = 400, description = "New password out of bounds"),
        (status = 401, description = "Not authenticated or current password incorrect"),
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn change_password(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<CookieResponse<MessageResponse>> {
    let user = state
        .store
        .get_user(principal.emp_id)
        .await?
        .ok_or_else(|| employee_not_found(principal.emp_id.to_string()))?;

    if request.current_password.is_empty() || !password::verify_password(&request.current_password, &user.password_hash).await? {
        return Err(Error::Unauthenticated {
            message: Some("Current password is incorrect".to_string()),
        });
    }
    password::validate_length(&request.new_password, &state.config.auth.password)?;

    rotate_credential(&state, &user, &request.new_password).await?;

    let mut post = PostCommit::new();
    post.record(
        CommitStage::Audit,
        state
            .audit
            .record(
                kinds::PASSWORD_CHANGED,
                &Actor::from(&principal),
                Some(user.id.to_string()),
                format!("{} changed their password", principal.name),
            )
            .await,
    );
    post.finish()?;

    CookieResponse::new(MessageResponse::new("Password changed Successfully"), clear_token_cookies(&state))
}
