use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::db::models::users::UserDBResponse;

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoginUser {
    pub name: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoginResponse {
    pub msg: String,
    pub user: LoginUser,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(default, rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ResetPasswordQuery {
    /// Email the reset link was sent to
    pub email: Option<String>,
    /// Token from the reset link
    pub reset_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct ResetPasswordRequest {
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// The caller's own profile, without credentials or internal ids.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub username: String,
    pub role: String,
    pub department: String,
}

impl From<UserDBResponse> for ProfileResponse {
    fn from(user: UserDBResponse) -> Self {
        Self {
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            username: user.username,
            role: user.role,
            department: user.department,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MeResponse {
    pub msg: String,
    pub user: ProfileResponse,
}
