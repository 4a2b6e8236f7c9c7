// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::config::Settings;
use crate::storage::SettlementDb;
use crate::workflows::WorkflowContext;

/// Bearer token verification settings.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// HS256 secret. `None` only in `dev` builds.
    pub jwt_secret: Option<String>,
    /// Expected `iss` claim.
    pub issuer: Option<String>,
}

impl AuthConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            jwt_secret: settings.jwt_secret.clone(),
            issuer: settings.issuer.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    workflows: WorkflowContext,
    pub auth_config: Arc<AuthConfig>,
}

impl AppState {
    pub fn new(workflows: WorkflowContext, auth_config: AuthConfig) -> Self {
        Self {
            workflows,
            auth_config: Arc::new(auth_config),
        }
    }

    pub fn workflows(&self) -> &WorkflowContext {
        &self.workflows
    }

    pub fn db(&self) -> &SettlementDb {
        &self.workflows.db
    }
}
