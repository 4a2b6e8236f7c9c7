// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Vault custody assets, price locks and mint requests.
//!
//! A custody asset is reserved for a mint request through the
//! `asset_reservations` index table. The reservation is written in the same
//! transaction that creates the mint request and removed only when the
//! request fails, so at most one non-failed mint can reference an asset.

use chrono::{DateTime, Utc};
use redb::TableDefinition;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::OwnedRecord;
use crate::storage::database::{
    DbResult, RecordReader, RecordTable, SettlementDb, StoredRecord, ASSET_RESERVATIONS,
};

// =============================================================================
// Custody Assets
// =============================================================================

/// A specific physical silver unit held in a vault.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CustodyAsset {
    pub asset_id: String,
    pub vault_id: String,
    pub weight_grams: Decimal,
    /// Fineness, e.g. `0.999`.
    pub purity: Decimal,
    pub registered_by: String,
    pub created_at: DateTime<Utc>,
}

impl StoredRecord for CustodyAsset {
    const TABLE: RecordTable = TableDefinition::new("custody_assets");
    const KIND: &'static str = "Custody asset";

    fn record_id(&self) -> &str {
        &self.asset_id
    }
}

/// Unreserved custody assets, earliest registered first.
pub fn available_assets(reader: &impl RecordReader) -> DbResult<Vec<CustodyAsset>> {
    let mut assets = reader.scan::<CustodyAsset>(|_| true)?;
    let mut available = Vec::with_capacity(assets.len());
    for asset in assets.drain(..) {
        if reader.lookup(ASSET_RESERVATIONS, &asset.asset_id)?.is_none() {
            available.push(asset);
        }
    }
    available.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Ok(available)
}

// =============================================================================
// Price Locks
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceLockStatus {
    Active,
    Used,
    Expired,
    Cancelled,
}

/// A time-bounded price for one (owner, asset) pair.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PriceLock {
    pub lock_id: String,
    pub owner_id: String,
    pub asset_id: String,
    pub price_per_gram: Decimal,
    pub status: PriceLockStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PriceLock {
    /// Expired once `now` reaches `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Active and not yet past its expiry.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.status == PriceLockStatus::Active && !self.is_expired_at(now)
    }
}

impl StoredRecord for PriceLock {
    const TABLE: RecordTable = TableDefinition::new("price_locks");
    const KIND: &'static str = "Price lock";

    fn record_id(&self) -> &str {
        &self.lock_id
    }
}

impl OwnedRecord for PriceLock {
    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

// =============================================================================
// Mint Requests
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MintStatus {
    Requested,
    Approved,
    Minted,
    Failed,
}

/// Custody-to-token conversion.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MintRequest {
    pub mint_id: String,
    pub owner_id: String,
    pub custody_asset_id: String,
    pub requested_grams: Decimal,
    pub status: MintStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_lock_id: Option<String>,
    /// Ledger reference of the mint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredRecord for MintRequest {
    const TABLE: RecordTable = TableDefinition::new("mint_requests");
    const KIND: &'static str = "Mint request";

    fn record_id(&self) -> &str {
        &self.mint_id
    }
}

impl OwnedRecord for MintRequest {
    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Vault inventory summary.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VaultInventory {
    pub assets: Vec<CustodyAsset>,
    pub total_grams: Decimal,
    pub count: usize,
}

/// Read-side queries over the vault and mint requests.
pub struct CustodyRepository<'a> {
    db: &'a SettlementDb,
}

impl<'a> CustodyRepository<'a> {
    pub fn new(db: &'a SettlementDb) -> Self {
        Self { db }
    }

    /// Unreserved assets with their combined weight.
    pub fn inventory(&self) -> DbResult<VaultInventory> {
        let assets = self.db.read(|scope| available_assets(scope))?;
        let total_grams = assets.iter().map(|a| a.weight_grams).sum();
        Ok(VaultInventory {
            count: assets.len(),
            total_grams,
            assets,
        })
    }

    /// Every registered asset, reserved or not.
    pub fn list_assets(&self) -> DbResult<Vec<CustodyAsset>> {
        let mut assets = self.db.read(|scope| scope.scan::<CustodyAsset>(|_| true))?;
        assets.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(assets)
    }

    /// Mint requests owned by an account, newest first.
    pub fn list_mints(&self, owner_id: &str) -> DbResult<Vec<MintRequest>> {
        let mut mints = self
            .db
            .read(|scope| scope.scan::<MintRequest>(|m| m.owner_id == owner_id))?;
        mints.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(mints)
    }

    pub fn get_price_lock(&self, lock_id: &str) -> DbResult<PriceLock> {
        self.db.read(|scope| scope.require(lock_id))
    }
}
