// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared fixtures for router and extractor tests.

use std::sync::Arc;

use jsonwebtoken::{encode, EncodingKey, Header};

use crate::auth::{Role, TokenClaims};
use crate::config::SettlementPolicy;
use crate::ledger::SandboxLedger;
use crate::state::{AppState, AuthConfig};
use crate::storage::SettlementDb;
use crate::workflows::WorkflowContext;

pub const TEST_SECRET: &str = "test-secret-do-not-use";
pub const TEST_ISSUER: &str = "https://auth.test.local";

/// App state over a throwaway database and a sandbox ledger.
pub fn test_state() -> (AppState, tempfile::TempDir) {
    let (state, _ledger, dir) = test_state_with_ledger();
    (state, dir)
}

pub fn test_state_with_ledger() -> (AppState, Arc<SandboxLedger>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(SettlementDb::open(&dir.path().join("api.redb")).unwrap());
    let ledger = Arc::new(SandboxLedger::new());
    let ctx = WorkflowContext::new(db, ledger.clone(), SettlementPolicy::default());
    let auth = AuthConfig {
        jwt_secret: Some(TEST_SECRET.to_string()),
        issuer: Some(TEST_ISSUER.to_string()),
    };
    (AppState::new(ctx, auth), ledger, dir)
}

/// A signed token valid for one hour.
pub fn test_token(account_id: &str, role: Role) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = TokenClaims {
        sub: account_id.to_string(),
        exp: now + 3600,
        iat: now,
        iss: Some(TEST_ISSUER.to_string()),
        role: Some(role.to_string()),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .unwrap()
}
