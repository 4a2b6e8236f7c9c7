// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Domain and HTTP error types.
//!
//! Workflows return [`SettlementError`]; handlers convert it into
//! [`ApiError`], which renders `{"error": ..., "error_code": ...}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::compliance::DenialReason;
use crate::ledger::LedgerError;
use crate::storage::DbError;

// =============================================================================
// Domain Errors
// =============================================================================

/// Error taxonomy surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    ComplianceDenied,
    StateConflict,
    InventoryExhausted,
    LedgerFailure,
    NotFound,
    Forbidden,
    Unsupported,
    Storage,
}

/// Why a guarded transition was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    /// The record is not in a status this operation accepts.
    InvalidState,
    /// Another operation holds or already consumed the record.
    ConcurrentModification,
    PriceLockExpired,
    MintingPaused,
}

impl ConflictReason {
    pub fn code(&self) -> &'static str {
        match self {
            ConflictReason::InvalidState => "INVALID_STATE",
            ConflictReason::ConcurrentModification => "CONCURRENT_MODIFICATION",
            ConflictReason::PriceLockExpired => "PRICE_LOCK_EXPIRED",
            ConflictReason::MintingPaused => "MINTING_PAUSED",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    #[error("{0}")]
    Validation(String),

    #[error("requested amount {requested} exceeds the maximum loan of {max_amount}")]
    LtvExceeded {
        requested: Decimal,
        max_amount: Decimal,
    },

    #[error("{}", .0.message())]
    ComplianceDenied(DenialReason),

    #[error("{message}")]
    StateConflict {
        reason: ConflictReason,
        message: String,
    },

    #[error("{0}")]
    InsufficientInventory(String),

    #[error("insufficient token balance: {available} available, {required} required")]
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },

    #[error("ledger failure: {0}")]
    LedgerFailure(LedgerError),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("not supported: {0}")]
    Unsupported(String),

    #[error("storage error: {0}")]
    Storage(DbError),
}

pub type SettlementResult<T> = Result<T, SettlementError>;

impl SettlementError {
    pub fn conflict(reason: ConflictReason, message: impl Into<String>) -> Self {
        Self::StateConflict {
            reason,
            message: message.into(),
        }
    }

    /// Status mismatch on a guarded transition.
    pub fn invalid_state(entity: &str, id: &str, current: impl std::fmt::Debug) -> Self {
        Self::conflict(
            ConflictReason::InvalidState,
            format!("{entity} {id} is {current:?}"),
        )
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::LtvExceeded { .. } => ErrorKind::Validation,
            Self::ComplianceDenied(_) => ErrorKind::ComplianceDenied,
            Self::StateConflict { .. } => ErrorKind::StateConflict,
            Self::InsufficientInventory(_) | Self::InsufficientBalance { .. } => {
                ErrorKind::InventoryExhausted
            }
            Self::LedgerFailure(_) => ErrorKind::LedgerFailure,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::LtvExceeded { .. } => "LTV_EXCEEDED",
            Self::ComplianceDenied(reason) => reason.code(),
            Self::StateConflict { reason, .. } => reason.code(),
            Self::InsufficientInventory(_) => "INSUFFICIENT_VAULT_INVENTORY",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::LedgerFailure(_) => "LEDGER_FAILURE",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Unsupported(_) => "UNSUPPORTED",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }
}

impl From<DbError> for SettlementError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(what) => SettlementError::NotFound(what),
            other => SettlementError::Storage(other),
        }
    }
}

impl From<LedgerError> for SettlementError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Unsupported(op) => SettlementError::Unsupported(op),
            other => SettlementError::LedgerFailure(other),
        }
    }
}

// =============================================================================
// HTTP Errors
// =============================================================================

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    error_code: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }
}

impl From<SettlementError> for ApiError {
    fn from(err: SettlementError) -> Self {
        let status = match err.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::ComplianceDenied | ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::StateConflict => StatusCode::CONFLICT,
            ErrorKind::InventoryExhausted => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::LedgerFailure => StatusCode::BAD_GATEWAY,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unsupported => StatusCode::NOT_IMPLEMENTED,
            ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match &err {
            SettlementError::Storage(inner) => {
                tracing::error!(error = %inner, "storage failure");
                "Internal storage error".to_string()
            }
            other => other.to_string(),
        };
        Self::new(status, err.code(), message)
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        SettlementError::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            error_code: self.code.to_string(),
        });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn kinds_map_to_statuses() {
        let cases = [
            (SettlementError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (
                SettlementError::ComplianceDenied(DenialReason::KycUnverified),
                StatusCode::FORBIDDEN,
            ),
            (
                SettlementError::conflict(ConflictReason::ConcurrentModification, "busy"),
                StatusCode::CONFLICT,
            ),
            (
                SettlementError::InsufficientInventory("none".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                SettlementError::LedgerFailure(LedgerError::Unavailable("down".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (SettlementError::Unsupported("transfer".into()), StatusCode::NOT_IMPLEMENTED),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn ledger_unsupported_becomes_unsupported() {
        let err = SettlementError::from(LedgerError::Unsupported("burn".into()));
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn db_not_found_becomes_not_found() {
        let err = SettlementError::from(DbError::NotFound("Account x".into()));
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn ltv_exceeded_is_a_validation_error() {
        let err = SettlementError::LtvExceeded {
            requested: Decimal::from(100),
            max_amount: Decimal::from(50),
        };
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.code(), "LTV_EXCEEDED");
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::from(SettlementError::conflict(
            ConflictReason::PriceLockExpired,
            "price lock expired",
        ))
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["error_code"], "PRICE_LOCK_EXPIRED");
        assert_eq!(body["error"], "price lock expired");
    }
}
