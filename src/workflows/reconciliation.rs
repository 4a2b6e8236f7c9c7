// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Compares recorded mints and burns with the ledger's total supply.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use super::{checked, checked_sum, WorkflowContext};
use crate::error::{SettlementError, SettlementResult};
use crate::storage::repository::{MintRequest, MintStatus, RedemptionRequest};
use crate::storage::RecordReader;

/// Largest supply difference still treated as rounding noise.
const TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReconciliationReport {
    pub minted_grams: Decimal,
    pub redeemed_grams: Decimal,
    /// `minted_grams - redeemed_grams`.
    pub expected_supply: Decimal,
    pub ledger_supply: Decimal,
    /// `ledger_supply - expected_supply`.
    pub difference: Decimal,
    pub reconciled: bool,
    pub checked_at: DateTime<Utc>,
}

pub struct Reconciler<'a> {
    ctx: &'a WorkflowContext,
}

impl<'a> Reconciler<'a> {
    pub fn new(ctx: &'a WorkflowContext) -> Self {
        Self { ctx }
    }

    pub async fn reconcile(&self) -> SettlementResult<ReconciliationReport> {
        let (minted_grams, redeemed_grams) = self.ctx.db.read(|scope| {
            let minted = checked_sum(
                scope
                    .scan::<MintRequest>(|m| m.status == MintStatus::Minted)?
                    .iter()
                    .map(|m| m.requested_grams),
            )?;
            let redeemed = checked_sum(
                scope
                    .scan::<RedemptionRequest>(|r| r.is_burned())?
                    .iter()
                    .map(|r| r.quantity),
            )?;
            Ok::<_, SettlementError>((minted, redeemed))
        })?;
        let ledger_supply = self.ctx.ledger.total_supply().await?;

        let expected_supply = checked(minted_grams.checked_sub(redeemed_grams))?;
        let difference = checked(ledger_supply.checked_sub(expected_supply))?;
        let report = ReconciliationReport {
            minted_grams,
            redeemed_grams,
            expected_supply,
            ledger_supply,
            difference,
            reconciled: difference.abs() < TOLERANCE,
            checked_at: Utc::now(),
        };

        if report.reconciled {
            info!(%expected_supply, %ledger_supply, "ledger reconciled");
        } else {
            warn!(
                %expected_supply,
                %ledger_supply,
                %difference,
                "ledger supply does not match settlement records"
            );
        }
        Ok(report)
    }
}
