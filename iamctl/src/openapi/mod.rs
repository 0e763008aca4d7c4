//! OpenAPI documentation.
//!
//! [`ApiDoc`] covers the `/auth` surface and nests [`directory::DirectoryApiDoc`] under
//! `/api/v1`. The document is served by Scalar at `/docs`.

pub mod directory;

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

use crate::api;

/// Cookie authentication, as set by `POST /auth/login`.
struct CookieSecurityAddon;

impl Modify for CookieSecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.security_schemes.insert(
            "CookieAuth".to_string(),
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                "accessToken",
                "Short-lived access token set by `POST /auth/login`. When it expires, the `refreshToken` cookie is \
                 used to issue a new one transparently.",
            ))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "iamctl",
        description = "Identity and access management: employees, roles, departments, permissions, sessions and audit."
    ),
    modifiers(&CookieSecurityAddon),
    nest((path = "/api/v1", api = directory::DirectoryApiDoc)),
    paths(
        api::handlers::auth::login,
        api::handlers::auth::logout,
        api::handlers::auth::refresh,
        api::handlers::auth::me,
        api::handlers::auth::forgot_password,
        api::handlers::auth::reset_password,
        api::handlers::auth::change_password,
    ),
    components(schemas(
        api::models::MessageResponse,
        api::models::auth::LoginRequest,
        api::models::auth::LoginUser,
        api::models::auth::LoginResponse,
        api::models::auth::ForgotPasswordRequest,
        api::models::auth::ResetPasswordRequest,
        api::models::auth::ChangePasswordRequest,
        api::models::auth::ProfileResponse,
        api::models::auth::MeResponse,
    )),
    tags(
        (name = "auth", description = "Login, sessions and password management"),
    )
)]
pub struct ApiDoc;
