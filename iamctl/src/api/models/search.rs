//! Paging shared by the search endpoints.
//!
//! Searches are page-based: `page` starts at 1 and `limit` is the page size. Both are
//! normalized before they reach the store, so a zero or negative value never produces an
//! empty or unbounded query.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::db::models::Window;

/// Default number of items to return per page.
pub const DEFAULT_LIMIT: i64 = 10;

/// Maximum number of items that can be requested per page.
pub const MAX_LIMIT: i64 = 100;

/// Page selection for search bodies and list queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams, ToSchema)]
#[serde(default)]
pub struct Page {
    /// 1-based page number (default: 1)
    #[param(default = 1, minimum = 1)]
    pub page: Option<i64>,

    /// Items per page (default: 10, max: 100)
    #[param(default = 10, minimum = 1, maximum = 100)]
    pub limit: Option<i64>,
}

impl Page {
    #[inline]
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    /// Get the limit value, clamped between 1 and MAX_LIMIT.
    #[inline]
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub fn window(&self) -> Window {
        let limit = self.limit();
        Window::new((self.page() - 1).saturating_mul(limit), limit)
    }
}
