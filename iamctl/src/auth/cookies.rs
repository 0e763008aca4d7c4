//! Token cookie helpers.

use axum::http::{HeaderMap, header};
use std::time::Duration;

use crate::config::CookieConfig;

/// Find a cookie value by name in the request headers.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value)
}

/// `Set-Cookie` value for a token cookie that lives for `max_age`.
pub fn token_cookie(name: &str, token: &str, max_age: Duration, config: &CookieConfig) -> String {
    let secure = if config.secure { " Secure;" } else { "" };
    format!(
        "{}={}; Path=/; HttpOnly;{} SameSite={}; Max-Age={}",
        name,
        token,
        secure,
        config.same_site,
        max_age.as_secs()
    )
}

/// `Set-Cookie` value that expires a cookie immediately.
pub fn clear_cookie(name: &str, config: &CookieConfig) -> String {
    token_cookie(name, "", Duration::ZERO, config)
}
