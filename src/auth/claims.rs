// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims and authenticated account representation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roles::Role;

/// Claims carried by a settlement bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the account id.
    pub sub: String,

    /// Expiration timestamp
    pub exp: i64,

    /// Issued at timestamp
    #[serde(default)]
    pub iat: i64,

    /// Issuer
    #[serde(default)]
    pub iss: Option<String>,

    /// Role name (`ADMIN`, `USER`, `DOMESTIC_USER`, `INTERNATIONAL_USER`)
    #[serde(default)]
    pub role: Option<String>,
}

/// Authenticated account extracted from a verified token.
///
/// Passed explicitly into every workflow call; there is no process-wide
/// session state.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Account ID (`sub` claim)
    pub user_id: String,

    /// Role asserted by the token
    pub role: Role,

    /// Token expiration (Unix timestamp)
    #[serde(skip)]
    pub expires_at: i64,
}

impl AuthenticatedUser {
    /// Build from verified claims. Unknown or missing roles fall back to `User`.
    pub fn from_claims(claims: TokenClaims) -> Self {
        let role = claims
            .role
            .as_deref()
            .and_then(Role::from_str)
            .unwrap_or_default();

        Self {
            user_id: claims.sub,
            role,
            expires_at: claims.exp,
        }
    }

    /// Check if this user is an admin.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
