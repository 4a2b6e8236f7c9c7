// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token-to-custody redemption.
//!
//! ```text
//! PENDING ──approve──► APPROVED ──fulfill (burn)──► FULFILLED ──dispatch──► DISPATCHED
//!    └──────reject──────────┴──────────────► REJECTED
//! ```
//!
//! The owner's balance is checked at submission, again at approval (net of
//! the owner's other approved redemptions) and finally by the ledger burn.
//! A failed burn rejects the redemption; the tokens were never removed.

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{error, info, warn};

use super::{
    checked, checked_sum, ensure_positive, require_admin, require_custody_address,
    require_eligible, WorkflowContext,
};
use crate::compliance::Action;
use crate::error::{ConflictReason, SettlementError, SettlementResult};
use crate::ledger::LedgerError;
use crate::storage::database::REDEMPTION_CLAIMS;
use crate::storage::repository::{RedemptionRequest, RedemptionStatus};
use crate::storage::{AuditAction, AuditRecord, RecordReader, WriteScope};

/// Quantity the owner has already committed to other redemptions in `statuses`.
fn committed_quantity(
    reader: &impl RecordReader,
    owner_id: &str,
    exclude_id: Option<&str>,
    statuses: &[RedemptionStatus],
) -> SettlementResult<Decimal> {
    let open = reader.scan::<RedemptionRequest>(|r| {
        r.owner_id == owner_id
            && statuses.contains(&r.status)
            && Some(r.redemption_id.as_str()) != exclude_id
    })?;
    checked_sum(open.iter().map(|r| r.quantity))
}

fn ensure_covered(balance: Decimal, committed: Decimal, quantity: Decimal) -> SettlementResult<()> {
    let available = checked(balance.checked_sub(committed))?;
    if available < quantity {
        return Err(SettlementError::InsufficientBalance {
            required: quantity,
            available,
        });
    }
    Ok(())
}

pub struct RedemptionWorkflow<'a> {
    ctx: &'a WorkflowContext,
}

impl<'a> RedemptionWorkflow<'a> {
    pub fn new(ctx: &'a WorkflowContext) -> Self {
        Self { ctx }
    }

    /// Request physical delivery of `quantity` grams worth of tokens.
    pub async fn submit(
        &self,
        account_id: &str,
        quantity: Decimal,
        delivery_address: &str,
    ) -> SettlementResult<RedemptionRequest> {
        ensure_positive(quantity, "quantity")?;
        let delivery_address = delivery_address.trim();
        if delivery_address.is_empty() {
            return Err(SettlementError::Validation(
                "delivery address is required".to_string(),
            ));
        }
        let policy = &self.ctx.policy;

        let account = self
            .ctx
            .db
            .read(|scope| require_eligible(scope, account_id, Action::Redeem, None, policy))?;
        let address = require_custody_address(&account)?;
        let balance = self.ctx.balance_of(&address).await?;

        let now = Utc::now();
        let request = RedemptionRequest {
            redemption_id: uuid::Uuid::new_v4().to_string(),
            owner_id: account_id.to_string(),
            quantity,
            delivery_address: delivery_address.to_string(),
            status: RedemptionStatus::Pending,
            tx_ref: None,
            tracking_number: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        };

        self.ctx.db.write(|scope| {
            require_eligible(scope, account_id, Action::Redeem, None, policy)?;
            let committed = committed_quantity(
                scope,
                account_id,
                None,
                &[RedemptionStatus::Pending, RedemptionStatus::Approved],
            )?;
            ensure_covered(balance, committed, quantity)?;
            scope.insert(&request)?;
            scope.append_audit(
                &AuditRecord::new(
                    AuditAction::RedemptionRequested,
                    account_id,
                    &request.redemption_id,
                )
                .with_details(json!({ "quantity": quantity })),
            )?;
            Ok::<_, SettlementError>(())
        })?;

        info!(
            redemption_id = %request.redemption_id,
            account_id,
            %quantity,
            "redemption requested"
        );
        Ok(request)
    }

    /// PENDING → APPROVED once the owner's current balance still covers it.
    pub async fn approve(&self, admin_id: &str, redemption_id: &str) -> SettlementResult<RedemptionRequest> {
        let policy = &self.ctx.policy;
        let address = self.ctx.db.read(|scope| {
            require_admin(scope, admin_id)?;
            let request: RedemptionRequest = scope.require(redemption_id)?;
            let owner = require_eligible(scope, &request.owner_id, Action::Redeem, None, policy)?;
            require_custody_address(&owner)
        })?;
        let balance = self.ctx.balance_of(&address).await?;

        let request = self.ctx.db.write(|scope| {
            require_admin(scope, admin_id)?;
            let mut request: RedemptionRequest = scope.require(redemption_id)?;
            if request.status != RedemptionStatus::Pending {
                return Err(SettlementError::invalid_state(
                    "Redemption request",
                    redemption_id,
                    request.status,
                ));
            }
            require_eligible(scope, &request.owner_id, Action::Redeem, None, policy)?;
            let committed = committed_quantity(
                scope,
                &request.owner_id,
                Some(redemption_id),
                &[RedemptionStatus::Approved],
            )?;
            ensure_covered(balance, committed, request.quantity)?;

            request.status = RedemptionStatus::Approved;
            request.updated_at = Utc::now();
            scope.update(&request)?;
            scope.append_audit(
                &AuditRecord::new(AuditAction::RedemptionApproved, admin_id, redemption_id)
                    .with_details(json!({ "balance": balance, "committed": committed })),
            )?;
            Ok(request)
        })?;

        info!(redemption_id, admin_id, "redemption approved");
        Ok(request)
    }

    /// APPROVED → FULFILLED by burning the owner's tokens.
    pub async fn fulfill(&self, admin_id: &str, redemption_id: &str) -> SettlementResult<RedemptionRequest> {
        let policy = &self.ctx.policy;
        let (request, address) = self.ctx.db.write(|scope| {
            require_admin(scope, admin_id)?;
            let request: RedemptionRequest = scope.require(redemption_id)?;
            if request.status != RedemptionStatus::Approved {
                return Err(SettlementError::invalid_state(
                    "Redemption request",
                    redemption_id,
                    request.status,
                ));
            }
            if scope.lookup(REDEMPTION_CLAIMS, redemption_id)?.is_some() {
                return Err(SettlementError::conflict(
                    ConflictReason::ConcurrentModification,
                    format!("Redemption request {redemption_id} is already being fulfilled"),
                ));
            }
            let owner = require_eligible(scope, &request.owner_id, Action::Redeem, None, policy)?;
            let address = require_custody_address(&owner)?;
            scope.link(REDEMPTION_CLAIMS, redemption_id, admin_id)?;
            Ok((request, address))
        })?;

        let burn = self
            .ctx
            .ledger
            .burn(&address, request.quantity, redemption_id)
            .await;

        match burn {
            Ok(tx_ref) => {
                let request = self
                    .ctx
                    .db
                    .write(|scope| finalize_fulfilled(scope, admin_id, redemption_id, &tx_ref))
                    .inspect_err(|e| {
                        error!(
                            redemption_id,
                            tx_ref = %tx_ref,
                            error = %e,
                            "ledger burn applied but redemption could not be finalized"
                        )
                    })?;
                info!(
                    redemption_id,
                    owner_id = %request.owner_id,
                    quantity = %request.quantity,
                    tx_ref = %tx_ref,
                    "redemption fulfilled"
                );
                Ok(request)
            }
            Err(ledger_err) => {
                warn!(redemption_id, error = %ledger_err, "ledger burn failed");
                self.ctx
                    .db
                    .write(|scope| finalize_burn_failed(scope, admin_id, redemption_id, &ledger_err))?;
                Err(ledger_err.into())
            }
        }
    }

    /// FULFILLED → DISPATCHED with the carrier's tracking number.
    pub fn dispatch(
        &self,
        admin_id: &str,
        redemption_id: &str,
        tracking_number: &str,
    ) -> SettlementResult<RedemptionRequest> {
        let tracking_number = tracking_number.trim();
        if tracking_number.is_empty() {
            return Err(SettlementError::Validation(
                "tracking number is required".to_string(),
            ));
        }

        let request = self.ctx.db.write(|scope| {
            require_admin(scope, admin_id)?;
            let mut request: RedemptionRequest = scope.require(redemption_id)?;
            if request.status != RedemptionStatus::Fulfilled {
                return Err(SettlementError::invalid_state(
                    "Redemption request",
                    redemption_id,
                    request.status,
                ));
            }
            request.status = RedemptionStatus::Dispatched;
            request.tracking_number = Some(tracking_number.to_string());
            request.updated_at = Utc::now();
            scope.update(&request)?;
            scope.append_audit(
                &AuditRecord::new(AuditAction::RedemptionDispatched, admin_id, redemption_id)
                    .with_details(json!({ "tracking_number": tracking_number })),
            )?;
            Ok(request)
        })?;

        info!(redemption_id, tracking_number, "redemption dispatched");
        Ok(request)
    }

    /// PENDING or APPROVED → REJECTED. Nothing has been burned yet.
    pub fn reject(&self, admin_id: &str, redemption_id: &str, reason: &str) -> SettlementResult<RedemptionRequest> {
        let request = self.ctx.db.write(|scope| {
            require_admin(scope, admin_id)?;
            let mut request: RedemptionRequest = scope.require(redemption_id)?;
            if !matches!(
                request.status,
                RedemptionStatus::Pending | RedemptionStatus::Approved
            ) {
                return Err(SettlementError::invalid_state(
                    "Redemption request",
                    redemption_id,
                    request.status,
                ));
            }
            if scope.lookup(REDEMPTION_CLAIMS, redemption_id)?.is_some() {
                return Err(SettlementError::conflict(
                    ConflictReason::ConcurrentModification,
                    format!("Redemption request {redemption_id} is being fulfilled"),
                ));
            }
            request.status = RedemptionStatus::Rejected;
            request.rejection_reason = Some(reason.to_string());
            request.updated_at = Utc::now();
            scope.update(&request)?;
            scope.append_audit(
                &AuditRecord::new(AuditAction::RedemptionRejected, admin_id, redemption_id)
                    .with_details(json!({ "reason": reason })),
            )?;
            Ok(request)
        })?;

        info!(redemption_id, admin_id, reason, "redemption rejected");
        Ok(request)
    }
}

fn finalize_fulfilled(
    scope: &WriteScope<'_>,
    admin_id: &str,
    redemption_id: &str,
    tx_ref: &str,
) -> SettlementResult<RedemptionRequest> {
    let mut request: RedemptionRequest = scope.require(redemption_id)?;
    if request.status != RedemptionStatus::Approved {
        return Err(SettlementError::conflict(
            ConflictReason::ConcurrentModification,
            format!("Redemption request {redemption_id} is {:?}", request.status),
        ));
    }
    request.status = RedemptionStatus::Fulfilled;
    request.tx_ref = Some(tx_ref.to_string());
    request.updated_at = Utc::now();
    scope.update(&request)?;
    scope.unlink(REDEMPTION_CLAIMS, redemption_id)?;
    scope.append_audit(
        &AuditRecord::new(AuditAction::RedemptionFulfilled, admin_id, redemption_id)
            .with_details(json!({ "quantity": request.quantity, "tx_ref": tx_ref })),
    )?;
    Ok(request)
}

fn finalize_burn_failed(
    scope: &WriteScope<'_>,
    admin_id: &str,
    redemption_id: &str,
    ledger_err: &LedgerError,
) -> SettlementResult<()> {
    let mut request: RedemptionRequest = scope.require(redemption_id)?;
    request.status = RedemptionStatus::Rejected;
    request.rejection_reason = Some(format!("burn failed: {ledger_err}"));
    request.updated_at = Utc::now();
    scope.update(&request)?;
    scope.unlink(REDEMPTION_CLAIMS, redemption_id)?;
    scope.append_audit(
        &AuditRecord::new(AuditAction::RedemptionRejected, admin_id, redemption_id)
            .with_details(json!({ "quantity": request.quantity }))
            .failed(ledger_err.to_string()),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::error::ErrorKind;
    use crate::ledger::{LedgerAdapter, LedgerOp};
    use crate::storage::repository::RedemptionRepository;
    use crate::workflows::testing::Harness;

    fn d(v: i64) -> Decimal {
        Decimal::from(v)
    }

    fn status(h: &Harness, id: &str) -> RedemptionStatus {
        h.ctx
            .db
            .read(|s| s.require::<RedemptionRequest>(id))
            .unwrap()
            .status
    }

    #[tokio::test]
    async fn approval_rechecks_balance() {
        let h = Harness::new();
        h.admin("root");
        h.verified("alice", Role::User);
        h.ledger.credit("G-alice", d(500)).await;
        let redemptions = h.ctx.redemptions();

        let request = redemptions.submit("alice", d(500), "1 Main St").await.unwrap();
        // Balance drops to 400 before approval.
        h.ledger.transfer("G-alice", "G-bob", d(100), "t-1").await.unwrap();

        let err = redemptions.approve("root", &request.redemption_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InventoryExhausted);
        assert_eq!(status(&h, &request.redemption_id), RedemptionStatus::Pending);
    }

    #[tokio::test]
    async fn submission_counts_open_redemptions() {
        let h = Harness::new();
        h.verified("alice", Role::User);
        h.ledger.credit("G-alice", d(300)).await;
        let redemptions = h.ctx.redemptions();

        redemptions.submit("alice", d(200), "1 Main St").await.unwrap();
        let err = redemptions.submit("alice", d(200), "1 Main St").await.unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_BALANCE");

        let err = redemptions.submit("alice", d(10), "   ").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn full_lifecycle_burns_once() {
        let h = Harness::new();
        h.admin("root");
        h.verified("alice", Role::User);
        h.ledger.credit("G-alice", d(100)).await;
        let redemptions = h.ctx.redemptions();

        let request = redemptions.submit("alice", d(60), "1 Main St").await.unwrap();
        let id = request.redemption_id.as_str();

        let err = redemptions.fulfill("root", id).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE");

        redemptions.approve("root", id).await.unwrap();
        let err = redemptions.dispatch("root", id, "TRK-1").unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE");

        let fulfilled = redemptions.fulfill("root", id).await.unwrap();
        assert_eq!(fulfilled.status, RedemptionStatus::Fulfilled);
        assert!(fulfilled.tx_ref.is_some());
        assert_eq!(h.ledger.balance("G-alice").await.unwrap(), d(40));

        let err = redemptions.fulfill("root", id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);
        assert_eq!(h.ledger.balance("G-alice").await.unwrap(), d(40));

        let dispatched = redemptions.dispatch("root", id, " TRK-1 ").unwrap();
        assert_eq!(dispatched.status, RedemptionStatus::Dispatched);
        assert_eq!(dispatched.tracking_number.as_deref(), Some("TRK-1"));

        let err = redemptions.reject("root", id, "too late").unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE");
        assert_eq!(
            &h.audit_actions()[..4],
            &[
                AuditAction::RedemptionDispatched,
                AuditAction::RedemptionFulfilled,
                AuditAction::RedemptionApproved,
                AuditAction::RedemptionRequested,
            ]
        );
    }

    #[tokio::test]
    async fn failed_burn_rejects_request() {
        let h = Harness::new();
        h.admin("root");
        h.verified("alice", Role::User);
        h.ledger.credit("G-alice", d(100)).await;
        let redemptions = h.ctx.redemptions();

        let request = redemptions.submit("alice", d(50), "1 Main St").await.unwrap();
        redemptions.approve("root", &request.redemption_id).await.unwrap();

        h.ledger
            .fail_next(LedgerOp::Burn, LedgerError::Unavailable("gateway down".into()))
            .await;
        let err = redemptions
            .fulfill("root", &request.redemption_id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LedgerFailure);

        let stored = h
            .ctx
            .db
            .read(|s| s.require::<RedemptionRequest>(&request.redemption_id))
            .unwrap();
        assert_eq!(stored.status, RedemptionStatus::Rejected);
        assert!(stored.rejection_reason.is_some());
        assert_eq!(h.ledger.balance("G-alice").await.unwrap(), d(100));
        assert_eq!(h.audit_actions()[0], AuditAction::RedemptionRejected);
    }

    #[tokio::test]
    async fn admin_queue_and_permissions() {
        let h = Harness::new();
        h.admin("root");
        h.verified("alice", Role::User);
        h.ledger.credit("G-alice", d(100)).await;
        let redemptions = h.ctx.redemptions();

        let first = redemptions.submit("alice", d(10), "1 Main St").await.unwrap();
        let second = redemptions.submit("alice", d(10), "1 Main St").await.unwrap();

        let err = redemptions.approve("alice", &first.redemption_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        redemptions.reject("root", &second.redemption_id, "duplicate").unwrap();
        let queue = RedemptionRepository::new(&h.ctx.db).admin_queue().unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].redemption_id, first.redemption_id);
    }
}
