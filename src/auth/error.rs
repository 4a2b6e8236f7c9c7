// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.
//!
//! Rejections use the same `{error, error_code}` body as workflow errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Authorization header is required")]
    MissingAuthHeader,

    #[error("Invalid authorization header format (expected 'Bearer <token>')")]
    InvalidAuthHeader,

    #[error("Token is malformed")]
    MalformedToken,

    #[error("Token signature is invalid")]
    InvalidSignature,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token issuer is invalid")]
    InvalidIssuer,

    #[error("Token is not yet valid")]
    TokenNotYetValid,

    /// No verification secret configured and insecure decoding is not compiled in.
    #[error("Token verification is not configured")]
    NotConfigured,

    #[error("Admin role required")]
    InsufficientPermissions,
}

impl AuthError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader | AuthError::InvalidAuthHeader => "UNAUTHENTICATED",
            AuthError::MalformedToken | AuthError::InvalidSignature | AuthError::InvalidIssuer => {
                "INVALID_TOKEN"
            }
            AuthError::TokenExpired | AuthError::TokenNotYetValid => "TOKEN_NOT_CURRENT",
            AuthError::NotConfigured => "AUTH_NOT_CONFIGURED",
            AuthError::InsufficientPermissions => "ADMIN_REQUIRED",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AuthError::NotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::new(err.status_code(), err.error_code(), err.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
