// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Collateralized loan records.

use chrono::{DateTime, Utc};
use redb::TableDefinition;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::OwnedRecord;
use crate::storage::database::{DbResult, RecordReader, RecordTable, SettlementDb, StoredRecord};

/// Loan lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    PendingApproval,
    Approved,
    Rejected,
    Active,
    Repaid,
    Liquidated,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoanRequest {
    pub loan_id: String,
    pub owner_id: String,
    pub collateral_grams: Decimal,
    pub requested_amount: Decimal,
    /// Reference price used for the LTV check at application time.
    pub price_per_gram: Decimal,
    pub status: LoanStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredRecord for LoanRequest {
    const TABLE: RecordTable = TableDefinition::new("loan_requests");
    const KIND: &'static str = "Loan request";

    fn record_id(&self) -> &str {
        &self.loan_id
    }
}

impl OwnedRecord for LoanRequest {
    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

pub struct LoanRepository<'a> {
    db: &'a SettlementDb,
}

impl<'a> LoanRepository<'a> {
    pub fn new(db: &'a SettlementDb) -> Self {
        Self { db }
    }

    /// Loans owned by an account, newest first.
    pub fn list_for_owner(&self, owner_id: &str) -> DbResult<Vec<LoanRequest>> {
        let mut loans = self
            .db
            .read(|scope| scope.scan::<LoanRequest>(|l| l.owner_id == owner_id))?;
        loans.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(loans)
    }

    /// Applications awaiting an admin decision, oldest first.
    pub fn pending(&self) -> DbResult<Vec<LoanRequest>> {
        let mut loans = self.db.read(|scope| {
            scope.scan::<LoanRequest>(|l| l.status == LoanStatus::PendingApproval)
        })?;
        loans.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(loans)
    }
}
