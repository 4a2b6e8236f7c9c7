// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Bearer-token authentication for the settlement API.
//!
//! ## Auth Flow
//!
//! 1. The identity provider issues an HS256 JWT with `sub` = account id and a `role` claim
//! 2. Clients send `Authorization: Bearer <token>`
//! 3. The server verifies signature, expiry and (optionally) issuer, then
//!    hands the resulting [`AuthenticatedUser`] to the handler
//!
//! The token role only selects the router surface (`AdminOnly`). Workflows
//! always re-read the stored account before acting.

pub mod claims;
pub mod error;
pub mod extractor;
pub mod roles;

pub use claims::{AuthenticatedUser, TokenClaims};
pub use error::AuthError;
pub use extractor::{AdminOnly, Auth};
pub use roles::Role;
