//! Common type definitions: identifier aliases and the built-in role vocabulary.
//!
//! # ID Types
//!
//! All entity IDs are UUIDs wrapped in type aliases:
//!
//! - [`EmployeeId`]: Employee (user) identifier
//! - [`RoleId`]: Role identifier
//! - [`DepartmentId`]: Department identifier
//! - [`PermissionId`]: Permission identifier
//! - [`AuditLogId`]: Audit log record identifier
//!
//! # Role Names
//!
//! Authorization decisions compare role *names*, so the four built-in roles are exposed as
//! constants in [`roles`]. They are seeded on startup and cannot be renamed or deleted.

use std::fmt;
use uuid::Uuid;

use crate::errors::Error;

// Type aliases for IDs
pub type EmployeeId = Uuid;
pub type RoleId = Uuid;
pub type DepartmentId = Uuid;
pub type PermissionId = Uuid;
pub type AuditLogId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

/// Parse an entity id taken from a path segment.
///
/// Path ids are accepted as plain strings so that a malformed id produces the same
/// `"<Entity> Id is not valid"` message as every other input error, instead of axum's
/// generic path rejection.
pub fn parse_id(raw: &str, entity: &str) -> Result<Uuid, Error> {
    if raw.trim().is_empty() {
        return Err(Error::BadRequest {
            message: format!("{entity} Id cannot be empty"),
        });
    }
    Uuid::parse_str(raw.trim()).map_err(|_| Error::BadRequest {
        message: format!("{entity} Id is not valid"),
    })
}

/// Built-in role names.
pub mod roles {
    pub const SUPER_ADMIN: &str = "Super Admin";
    pub const ADMIN: &str = "Admin";
    pub const DATA_ENTRY_OPERATOR: &str = "Data Entry Operator";
    pub const DEPARTMENT_MANAGER: &str = "Department Manager";

    /// All built-in roles, in seeding order.
    pub const BUILTIN: [&str; 4] = [SUPER_ADMIN, ADMIN, DATA_ENTRY_OPERATOR, DEPARTMENT_MANAGER];

    pub fn is_builtin(name: &str) -> bool {
        BUILTIN.contains(&name)
    }
}

/// Operations that protection rules can forbid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Rename,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Rename => write!(f, "rename"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbrev_uuid() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(abbrev_uuid(&id), "550e8400");
    }

    #[test]
    fn test_parse_id_rejects_garbage() {
        let err = parse_id("not-a-uuid", "Employee").unwrap_err();
        assert_eq!(err.user_message(), "Employee Id is not valid");

        let err = parse_id("  ", "Role").unwrap_err();
        assert_eq!(err.user_message(), "Role Id cannot be empty");

        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string(), "Department").unwrap(), id);
    }

    #[test]
    fn test_builtin_roles() {
        assert!(roles::is_builtin("Super Admin"));
        assert!(roles::is_builtin("Department Manager"));
        // Exact match only
        assert!(!roles::is_builtin("super admin"));
        assert!(!roles::is_builtin("Auditor"));
    }
}
