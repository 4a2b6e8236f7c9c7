// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Ledger Adapter
//!
//! The token ledger is an external collaborator. Workflows talk to it only
//! through [`LedgerAdapter`], always between database transactions.
//!
//! ## Implementations
//!
//! - [`SandboxLedger`]: in-process balances, used when `LEDGER_URL` is unset and in tests
//! - [`HttpLedger`]: JSON client for an external ledger gateway
//! - [`TimedLedger`]: wraps either with a per-call timeout
//!
//! Mutating calls carry an idempotency key derived from the workflow
//! reference id so a gateway can deduplicate retried requests.

pub mod http;
pub mod sandbox;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use crate::storage::repository::CustodyAsset;

pub use http::HttpLedger;
pub use sandbox::{LedgerOp, SandboxLedger};

/// Opaque ledger transaction reference.
pub type TxRef = String;

#[derive(Debug, Clone, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger rejected the operation: {0}")]
    Rejected(String),

    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    #[error("ledger call timed out after {0:?}")]
    Timeout(Duration),

    #[error("ledger operation not supported: {0}")]
    Unsupported(String),

    #[error("ledger response was invalid: {0}")]
    InvalidResponse(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Evidence that minted tokens are backed by a specific custody asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReservesProof {
    pub vault_id: String,
    pub asset_id: String,
    pub weight_grams: Decimal,
    /// Hex SHA-256 over vault, asset, weight and mint reference.
    pub digest: String,
}

impl ReservesProof {
    pub fn for_asset(asset: &CustodyAsset, mint_id: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(asset.vault_id.as_bytes());
        hasher.update(b"|");
        hasher.update(asset.asset_id.as_bytes());
        hasher.update(b"|");
        hasher.update(asset.weight_grams.normalize().to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(mint_id.as_bytes());
        let digest = hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();

        Self {
            vault_id: asset.vault_id.clone(),
            asset_id: asset.asset_id.clone(),
            weight_grams: asset.weight_grams,
            digest,
        }
    }
}

/// Token ledger operations.
#[async_trait]
pub trait LedgerAdapter: Send + Sync {
    /// Mint `amount` tokens to `address`.
    async fn mint(
        &self,
        address: &str,
        amount: Decimal,
        proof: &ReservesProof,
        idempotency_key: &str,
    ) -> LedgerResult<TxRef>;

    /// Burn `amount` tokens held by `address`.
    async fn burn(&self, address: &str, amount: Decimal, idempotency_key: &str)
        -> LedgerResult<TxRef>;

    /// Move `amount` tokens between two addresses.
    async fn transfer(
        &self,
        from: &str,
        to: &str,
        amount: Decimal,
        idempotency_key: &str,
    ) -> LedgerResult<TxRef>;

    async fn balance(&self, address: &str) -> LedgerResult<Decimal>;

    async fn total_supply(&self) -> LedgerResult<Decimal>;
}

/// Applies a timeout to every call of the wrapped adapter.
pub struct TimedLedger {
    inner: Arc<dyn LedgerAdapter>,
    timeout: Duration,
}

impl TimedLedger {
    pub fn new(inner: Arc<dyn LedgerAdapter>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn timed<T>(
        &self,
        call: impl std::future::Future<Output = LedgerResult<T>>,
    ) -> LedgerResult<T> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| LedgerError::Timeout(self.timeout))?
    }
}

#[async_trait]
impl LedgerAdapter for TimedLedger {
    async fn mint(
        &self,
        address: &str,
        amount: Decimal,
        proof: &ReservesProof,
        idempotency_key: &str,
    ) -> LedgerResult<TxRef> {
        self.timed(self.inner.mint(address, amount, proof, idempotency_key))
            .await
    }

    async fn burn(
        &self,
        address: &str,
        amount: Decimal,
        idempotency_key: &str,
    ) -> LedgerResult<TxRef> {
        self.timed(self.inner.burn(address, amount, idempotency_key))
            .await
    }

    async fn transfer(
        &self,
        from: &str,
        to: &str,
        amount: Decimal,
        idempotency_key: &str,
    ) -> LedgerResult<TxRef> {
        self.timed(self.inner.transfer(from, to, amount, idempotency_key))
            .await
    }

    async fn balance(&self, address: &str) -> LedgerResult<Decimal> {
        self.timed(self.inner.balance(address)).await
    }

    async fn total_supply(&self) -> LedgerResult<Decimal> {
        self.timed(self.inner.total_supply()).await
    }
}
