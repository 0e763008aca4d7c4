//! Database record structures and filters.
//!
//! Each submodule holds the `*DBResponse` row type for one table, the request structs that
//! the store accepts for writes, and the filter used by list/search queries.

pub mod audit_logs;
pub mod departments;
pub mod permissions;
pub mod reset_tokens;
pub mod roles;
pub mod sessions;
pub mod users;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use utoipa::ToSchema;

use crate::types::{EmployeeId, PermissionId};

/// One entry of a role or department membership cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberEntry {
    pub user_id: EmployeeId,
    pub employee_name: String,
}

/// A permission as cached inside a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRef {
    pub permission_id: PermissionId,
    pub permission_name: String,
}

/// Which collection owns a membership cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipOwner {
    Role,
    Department,
}

impl MembershipOwner {
    pub fn resource(&self) -> &'static str {
        match self {
            MembershipOwner::Role => "Role",
            MembershipOwner::Department => "Department",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    /// Orient an ascending comparison.
    pub fn apply(&self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

/// Offset window applied to list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub skip: i64,
    pub limit: i64,
}

impl Default for Window {
    fn default() -> Self {
        Self { skip: 0, limit: 10 }
    }
}

impl Window {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }
    }

    /// Slice an already sorted in-memory result.
    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.skip.max(0) as usize)
            .take(self.limit.max(0) as usize)
            .collect()
    }
}

/// Case-insensitive substring match used by every search filter.
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Escape `%`, `_` and `\` so user input is matched literally inside an `ILIKE` pattern.
pub fn like_pattern(needle: &str) -> String {
    let escaped = needle.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_slice() {
        let items: Vec<i32> = (0..25).collect();
        assert_eq!(Window::new(20, 10).slice(items.clone()), vec![20, 21, 22, 23, 24]);
        assert_eq!(Window::new(0, 3).slice(items), vec![0, 1, 2]);
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert!(contains_ci("Data Entry Operator", "entry"));
    }
}
