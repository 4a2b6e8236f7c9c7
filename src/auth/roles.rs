// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account roles for authorization and compliance limits.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Account roles.
///
/// ## Role Hierarchy
///
/// - `Admin` - Approves workflows, bypasses the compliance gate
/// - `User` - Verified customer without a per-trade notional ceiling
/// - `DomesticUser` - Customer subject to the domestic notional ceiling
/// - `InternationalUser` - Customer subject to the international notional ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Full administrative access
    Admin,
    /// Normal customer
    User,
    /// Customer with the domestic trade limit
    DomesticUser,
    /// Customer with the international trade limit
    InternationalUser,
}

impl Role {
    /// Roles an account may pick for itself at sign-up.
    pub fn is_self_assignable(&self) -> bool {
        !matches!(self, Role::Admin)
    }

    /// Parse role from string (case-insensitive, `-` or `_` separated).
    pub fn from_str(s: &str) -> Option<Role> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "admin" => Some(Role::Admin),
            "user" => Some(Role::User),
            "domestic_user" => Some(Role::DomesticUser),
            "international_user" => Some(Role::InternationalUser),
            _ => None,
        }
    }
}

impl Default for Role {
    /// Least privilege.
    fn default() -> Self {
        Role::User
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "ADMIN"),
            Role::User => write!(f, "USER"),
            Role::DomesticUser => write!(f, "DOMESTIC_USER"),
            Role::InternationalUser => write!(f, "INTERNATIONAL_USER"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_str_parses_correctly() {
        assert_eq!(Role::from_str("admin"), Some(Role::Admin));
        assert_eq!(Role::from_str("DOMESTIC_USER"), Some(Role::DomesticUser));
        assert_eq!(
            Role::from_str("international-user"),
            Some(Role::InternationalUser)
        );
        assert_eq!(Role::from_str("auditor"), None);
    }

    #[test]
    fn admin_is_not_self_assignable() {
        assert!(!Role::Admin.is_self_assignable());
        assert!(Role::User.is_self_assignable());
    }

    #[test]
    fn display_matches_wire_format() {
        assert_eq!(Role::InternationalUser.to_string(), "INTERNATIONAL_USER");
        assert_eq!(
            serde_json::to_string(&Role::DomesticUser).unwrap(),
            "\"DOMESTIC_USER\""
        );
    }
}
