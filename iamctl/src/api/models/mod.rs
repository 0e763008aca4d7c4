//! Request and response bodies of the HTTP API.
//!
//! Every response body carries a human readable `msg`. Mutations add `acknowledged: true`;
//! searches return the page of items plus `totalDocs`, the number of matches across all
//! pages.

pub mod audit_logs;
pub mod auth;
pub mod departments;
pub mod integrity;
pub mod permissions;
pub mod roles;
pub mod search;
pub mod users;

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    db::models::{MemberEntry, PermissionRef},
    errors::Error,
};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MessageResponse {
    pub msg: String,
}

impl MessageResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

/// Result of a delete.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AcknowledgedResponse {
    pub msg: String,
    pub acknowledged: bool,
}

impl AcknowledgedResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            acknowledged: true,
        }
    }
}

/// An employee as listed inside a role or department.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemberResponse {
    pub user_id: uuid::Uuid,
    pub employee_name: String,
}

impl From<MemberEntry> for MemberResponse {
    fn from(entry: MemberEntry) -> Self {
        Self {
            user_id: entry.user_id,
            employee_name: entry.employee_name,
        }
    }
}

/// A permission as listed inside a role.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRefResponse {
    pub permission_id: uuid::Uuid,
    pub permission_name: String,
}

impl From<PermissionRef> for PermissionRefResponse {
    fn from(permission: PermissionRef) -> Self {
        Self {
            permission_id: permission.permission_id,
            permission_name: permission.permission_name,
        }
    }
}

/// A JSON body that also sets cookies.
pub struct CookieResponse<T> {
    body: T,
    cookies: Vec<HeaderValue>,
}

impl<T> CookieResponse<T> {
    pub fn new(body: T, cookies: impl IntoIterator<Item = String>) -> Result<Self, Error> {
        let cookies = cookies
            .into_iter()
            .map(|cookie| {
                HeaderValue::from_str(&cookie).map_err(|e| Error::Internal {
                    operation: format!("build cookie header: {e}"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { body, cookies })
    }
}

impl<T: Serialize> IntoResponse for CookieResponse<T> {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        for cookie in self.cookies {
            headers.append(header::SET_COOKIE, cookie);
        }
        (StatusCode::OK, headers, Json(self.body)).into_response()
    }
}
