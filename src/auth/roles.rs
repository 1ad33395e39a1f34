// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Caller roles, read from the `role` entry of the token's public metadata.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// ## Role Hierarchy
///
/// - `Admin` - everything an operator can do
/// - `Operator` - settles stuck withdrawal reservations
/// - `Client` - stakes and withdraws; ownership is checked per contract
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Operator,
    #[default]
    Client,
}

impl Role {
    /// Whether this role covers `required`.
    pub fn has_privilege(&self, required: Role) -> bool {
        match (self, required) {
            (Role::Admin, _) => true,
            (Role::Operator, Role::Operator | Role::Client) => true,
            (Role::Client, Role::Client) => true,
            _ => false,
        }
    }

    /// Case-insensitive lookup of a metadata role name.
    pub fn parse(s: &str) -> Option<Role> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "operator" => Some(Role::Operator),
            "client" => Some(Role::Client),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Operator => "operator",
            Role::Client => "client",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_covers_operator() {
        assert!(Role::Admin.has_privilege(Role::Operator));
        assert!(Role::Operator.has_privilege(Role::Operator));
        assert!(!Role::Operator.has_privilege(Role::Admin));
    }

    #[test]
    fn client_cannot_reconcile() {
        assert!(Role::Client.has_privilege(Role::Client));
        assert!(!Role::Client.has_privilege(Role::Operator));
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(Role::parse("OPERATOR"), Some(Role::Operator));
        assert_eq!(Role::parse(" admin "), Some(Role::Admin));
        assert_eq!(Role::parse("support"), None);
        assert_eq!(Role::default(), Role::Client);
    }
}
