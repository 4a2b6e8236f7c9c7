// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Redemption request records.

use chrono::{DateTime, Utc};
use redb::TableDefinition;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::OwnedRecord;
use crate::storage::database::{DbResult, RecordReader, RecordTable, SettlementDb, StoredRecord};

/// Redemption lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RedemptionStatus {
    Pending,
    Approved,
    /// Tokens burned.
    Fulfilled,
    /// Physical silver shipped.
    Dispatched,
    Rejected,
}

/// Token-to-custody conversion.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RedemptionRequest {
    pub redemption_id: String,
    pub owner_id: String,
    pub quantity: Decimal,
    pub delivery_address: String,
    pub status: RedemptionStatus,
    /// Ledger reference of the burn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RedemptionRequest {
    /// Whether the burned quantity counts against circulating supply.
    pub fn is_burned(&self) -> bool {
        matches!(
            self.status,
            RedemptionStatus::Fulfilled | RedemptionStatus::Dispatched
        )
    }
}

impl StoredRecord for RedemptionRequest {
    const TABLE: RecordTable = TableDefinition::new("redemption_requests");
    const KIND: &'static str = "Redemption request";

    fn record_id(&self) -> &str {
        &self.redemption_id
    }
}

impl OwnedRecord for RedemptionRequest {
    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

/// Read-side queries over redemptions.
pub struct RedemptionRepository<'a> {
    db: &'a SettlementDb,
}

impl<'a> RedemptionRepository<'a> {
    pub fn new(db: &'a SettlementDb) -> Self {
        Self { db }
    }

    /// Redemptions owned by an account, newest first.
    pub fn list_for_owner(&self, owner_id: &str) -> DbResult<Vec<RedemptionRequest>> {
        let mut requests = self
            .db
            .read(|scope| scope.scan::<RedemptionRequest>(|r| r.owner_id == owner_id))?;
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    /// Pending and approved redemptions awaiting admin action, oldest first.
    pub fn admin_queue(&self) -> DbResult<Vec<RedemptionRequest>> {
        let mut requests = self.db.read(|scope| {
            scope.scan::<RedemptionRequest>(|r| {
                matches!(
                    r.status,
                    RedemptionStatus::Pending | RedemptionStatus::Approved
                )
            })
        })?;
        requests.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(requests)
    }
}
