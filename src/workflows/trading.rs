// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Trade intent engine.
//!
//! ## Matching
//!
//! For an intent, the engine scans PENDING, unexpired, unclaimed intents of
//! the opposite side whose quantity covers the requested quantity and whose
//! price crosses, ordered by submission time. The first counterparty that
//! passes the compliance gate wins. The execution price is the limit price of
//! the earlier (resting) intent. A candidate whose execution value would push
//! the requester over its trade cap is skipped; if nothing else matches, the
//! attempt fails with `LIMIT_EXCEEDED`.
//!
//! Both intents are claimed in the `intent_claims` table inside the same
//! transaction that creates the PENDING trade, so an intent is matched at
//! most once. The ledger transfer runs after that transaction commits; a
//! second transaction then marks everything EXECUTED or marks the trade
//! FAILED and releases the claims.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{error, info, warn};

use super::{
    checked, checked_sum, ensure_owner, ensure_positive, require_custody_address,
    require_eligible, WorkflowContext, SYSTEM_ACTOR,
};
use crate::compliance::{check_eligibility, Action, DenialReason};
use crate::error::{ConflictReason, SettlementError, SettlementResult};
use crate::ledger::LedgerError;
use crate::storage::database::INTENT_CLAIMS;
use crate::storage::repository::{
    Account, IntentSide, IntentStatus, Trade, TradeIntent, TradeStatus,
};
use crate::storage::{AuditAction, AuditRecord, RecordReader, WriteScope};

/// Result of a match attempt.
#[derive(Debug, Clone)]
pub enum MatchOutcome {
    Executed(Trade),
    /// No compatible counterparty right now; the intent stays PENDING.
    NoMatch,
}

/// A trade claimed in the database, awaiting its ledger transfer.
struct ClaimedTrade {
    trade: Trade,
    seller_address: String,
    buyer_address: String,
}

pub struct TradingEngine<'a> {
    ctx: &'a WorkflowContext,
}

impl<'a> TradingEngine<'a> {
    pub fn new(ctx: &'a WorkflowContext) -> Self {
        Self { ctx }
    }

    /// Accept a limit order after validation, the compliance gate and (for
    /// sells) a balance check against the ledger.
    pub async fn submit_intent(
        &self,
        account_id: &str,
        side: IntentSide,
        quantity: Decimal,
        limit_price: Decimal,
    ) -> SettlementResult<TradeIntent> {
        ensure_positive(quantity, "quantity")?;
        ensure_positive(limit_price, "limit price")?;
        let notional = checked(quantity.checked_mul(limit_price))?;
        let policy = &self.ctx.policy;

        let account = self.ctx.db.read(|scope| {
            require_eligible(scope, account_id, Action::Trade, Some(notional), policy)
        })?;
        let address = require_custody_address(&account)?;

        let balance = match side {
            IntentSide::Sell => Some(self.ctx.balance_of(&address).await?),
            IntentSide::Buy => None,
        };

        let now = Utc::now();
        let intent = TradeIntent {
            intent_id: uuid::Uuid::new_v4().to_string(),
            owner_id: account_id.to_string(),
            side,
            quantity,
            limit_price,
            status: IntentStatus::Pending,
            created_at: now,
            expires_at: now + policy.intent_ttl,
            updated_at: now,
        };

        self.ctx.db.write(|scope| {
            require_eligible(scope, account_id, Action::Trade, Some(notional), policy)?;
            if let Some(balance) = balance {
                // Tokens already offered by other open sells are not available again.
                let committed = checked_sum(
                    scope
                        .scan::<TradeIntent>(|i| {
                            i.owner_id == account_id
                                && i.side == IntentSide::Sell
                                && i.status == IntentStatus::Pending
                        })?
                        .iter()
                        .map(|i| i.quantity),
                )?;
                let available = checked(balance.checked_sub(committed))?;
                if available < quantity {
                    return Err(SettlementError::InsufficientBalance {
                        required: quantity,
                        available,
                    });
                }
            }
            scope.insert(&intent)?;
            scope.append_audit(
                &AuditRecord::new(AuditAction::IntentSubmitted, account_id, &intent.intent_id)
                    .with_details(json!({
                        "side": side,
                        "quantity": quantity,
                        "limit_price": limit_price,
                    })),
            )?;
            Ok(())
        })?;

        info!(
            intent_id = %intent.intent_id,
            account_id,
            side = ?side,
            %quantity,
            %limit_price,
            "trade intent submitted"
        );
        Ok(intent)
    }

    /// Try to pair an intent with a resting counter-intent and settle it.
    pub async fn match_and_execute(
        &self,
        requester_id: &str,
        intent_id: &str,
    ) -> SettlementResult<MatchOutcome> {
        let now = Utc::now();
        let claimed = self
            .ctx
            .db
            .write(|scope| self.claim_match(scope, requester_id, intent_id, now))?;

        let Some(claimed) = claimed else {
            info!(intent_id, "no compatible counter-intent");
            return Ok(MatchOutcome::NoMatch);
        };
        let trade_id = claimed.trade.trade_id.clone();

        let transfer = self
            .ctx
            .ledger
            .transfer(
                &claimed.seller_address,
                &claimed.buyer_address,
                claimed.trade.quantity,
                &trade_id,
            )
            .await;

        match transfer {
            Ok(tx_ref) => {
                let trade = self
                    .ctx
                    .db
                    .write(|scope| finalize_executed(scope, requester_id, &claimed.trade, &tx_ref))
                    .inspect_err(|e| {
                        error!(
                            trade_id = %trade_id,
                            tx_ref = %tx_ref,
                            error = %e,
                            "ledger transfer applied but trade could not be finalized"
                        )
                    })?;
                info!(
                    trade_id = %trade.trade_id,
                    buyer = %trade.buyer_id,
                    seller = %trade.seller_id,
                    quantity = %trade.quantity,
                    price = %trade.execution_price,
                    tx_ref = %tx_ref,
                    "trade executed"
                );
                Ok(MatchOutcome::Executed(trade))
            }
            Err(ledger_err) => {
                warn!(trade_id = %trade_id, error = %ledger_err, "ledger transfer failed");
                self.ctx.db.write(|scope| {
                    finalize_failed(scope, requester_id, &claimed.trade, &ledger_err)
                })?;
                Err(ledger_err.into())
            }
        }
    }

    fn claim_match(
        &self,
        scope: &WriteScope<'_>,
        requester_id: &str,
        intent_id: &str,
        now: DateTime<Utc>,
    ) -> SettlementResult<Option<ClaimedTrade>> {
        let policy = &self.ctx.policy;
        let intent: TradeIntent = scope.require(intent_id)?;
        let requester: Account = scope.require(requester_id)?;
        if !requester.is_admin() {
            ensure_owner(&intent, requester_id, "trade intent")?;
        }

        if intent.status != IntentStatus::Pending {
            return Err(SettlementError::invalid_state(
                "Trade intent",
                intent_id,
                intent.status,
            ));
        }
        if intent.is_expired_at(now) {
            return Err(SettlementError::conflict(
                ConflictReason::InvalidState,
                format!("Trade intent {intent_id} has expired"),
            ));
        }
        if scope.lookup(INTENT_CLAIMS, intent_id)?.is_some() {
            return Err(SettlementError::conflict(
                ConflictReason::ConcurrentModification,
                format!("Trade intent {intent_id} is already being settled"),
            ));
        }

        let owner = require_eligible(scope, &intent.owner_id, Action::Trade, None, policy)?;
        let owner_address = require_custody_address(&owner)?;

        let mut candidates = scope.scan::<TradeIntent>(|c| {
            c.side == intent.side.opposite()
                && c.status == IntentStatus::Pending
                && !c.is_expired_at(now)
                && c.owner_id != intent.owner_id
                && c.quantity >= intent.quantity
                && intent.crosses(c)
        })?;
        candidates.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        let mut over_limit = false;
        for counter in candidates {
            if scope.lookup(INTENT_CLAIMS, &counter.intent_id)?.is_some() {
                continue;
            }

            let resting = if counter.created_at <= intent.created_at {
                &counter
            } else {
                &intent
            };
            let execution_price = resting.limit_price;
            let notional = checked(intent.quantity.checked_mul(execution_price))?;

            // The requesting side must pass at the execution value. A cheaper
            // later candidate may still fit under the cap.
            if !check_eligibility(&owner, Action::Trade, Some(notional), policy).is_allowed() {
                over_limit = true;
                continue;
            }

            let counterparty: Account = scope.require(&counter.owner_id)?;
            let eligible = check_eligibility(&counterparty, Action::Trade, Some(notional), policy);
            let Some(counter_address) = counterparty.custody_address.clone() else {
                continue;
            };
            if !eligible.is_allowed() {
                continue;
            }

            let (buy, sell, buyer_address, seller_address) = match intent.side {
                IntentSide::Buy => (&intent, &counter, owner_address, counter_address),
                IntentSide::Sell => (&counter, &intent, counter_address, owner_address),
            };

            let now = Utc::now();
            let trade = Trade {
                trade_id: uuid::Uuid::new_v4().to_string(),
                buy_intent_id: buy.intent_id.clone(),
                sell_intent_id: sell.intent_id.clone(),
                buyer_id: buy.owner_id.clone(),
                seller_id: sell.owner_id.clone(),
                quantity: intent.quantity,
                execution_price,
                status: TradeStatus::Pending,
                tx_ref: None,
                failure_reason: None,
                created_at: now,
                updated_at: now,
            };
            scope.insert(&trade)?;
            scope.link(INTENT_CLAIMS, &buy.intent_id, &trade.trade_id)?;
            scope.link(INTENT_CLAIMS, &sell.intent_id, &trade.trade_id)?;

            return Ok(Some(ClaimedTrade {
                trade,
                seller_address,
                buyer_address,
            }));
        }

        if over_limit {
            return Err(SettlementError::ComplianceDenied(DenialReason::LimitExceeded));
        }
        Ok(None)
    }

    /// Cancel a PENDING intent owned by the requester.
    pub fn cancel_intent(&self, requester_id: &str, intent_id: &str) -> SettlementResult<TradeIntent> {
        let intent = self.ctx.db.write(|scope| {
            let mut intent: TradeIntent = scope.require(intent_id)?;
            ensure_owner(&intent, requester_id, "trade intent")?;
            if intent.status != IntentStatus::Pending {
                return Err(SettlementError::invalid_state(
                    "Trade intent",
                    intent_id,
                    intent.status,
                ));
            }
            if scope.lookup(INTENT_CLAIMS, intent_id)?.is_some() {
                return Err(SettlementError::conflict(
                    ConflictReason::ConcurrentModification,
                    format!("Trade intent {intent_id} is being settled"),
                ));
            }

            intent.status = IntentStatus::Cancelled;
            intent.updated_at = Utc::now();
            scope.update(&intent)?;
            scope.append_audit(&AuditRecord::new(
                AuditAction::IntentCancelled,
                requester_id,
                intent_id,
            ))?;
            Ok(intent)
        })?;

        info!(intent_id, requester_id, "trade intent cancelled");
        Ok(intent)
    }

    /// Move PENDING intents past their expiry to EXPIRED. Intents claimed by
    /// an in-flight trade are left for the next sweep.
    pub fn expire_stale_intents(&self, now: DateTime<Utc>) -> SettlementResult<usize> {
        let expired = self.ctx.db.write(|scope| {
            let stale = scope.scan::<TradeIntent>(|i| {
                i.status == IntentStatus::Pending && i.is_expired_at(now)
            })?;
            let mut count = 0;
            for mut intent in stale {
                if scope.lookup(INTENT_CLAIMS, &intent.intent_id)?.is_some() {
                    continue;
                }
                intent.status = IntentStatus::Expired;
                intent.updated_at = now;
                scope.update(&intent)?;
                scope.append_audit(
                    &AuditRecord::new(AuditAction::IntentExpired, SYSTEM_ACTOR, &intent.intent_id)
                        .with_details(json!({ "expires_at": intent.expires_at })),
                )?;
                count += 1;
            }
            Ok::<_, SettlementError>(count)
        })?;

        if expired > 0 {
            info!(count = expired, "expired stale trade intents");
        }
        Ok(expired)
    }
}

fn finalize_executed(
    scope: &WriteScope<'_>,
    actor_id: &str,
    claimed: &Trade,
    tx_ref: &str,
) -> SettlementResult<Trade> {
    let mut trade: Trade = scope.require(&claimed.trade_id)?;
    if trade.status != TradeStatus::Pending {
        return Err(SettlementError::conflict(
            ConflictReason::ConcurrentModification,
            format!("Trade {} is {:?}", trade.trade_id, trade.status),
        ));
    }

    let now = Utc::now();
    for intent_id in [&trade.buy_intent_id, &trade.sell_intent_id] {
        let mut intent: TradeIntent = scope.require(intent_id)?;
        if intent.status != IntentStatus::Pending {
            return Err(SettlementError::conflict(
                ConflictReason::ConcurrentModification,
                format!("Trade intent {intent_id} changed while settling"),
            ));
        }
        intent.status = IntentStatus::Executed;
        intent.updated_at = now;
        scope.update(&intent)?;
        scope.unlink(INTENT_CLAIMS, intent_id)?;
    }

    trade.status = TradeStatus::Executed;
    trade.tx_ref = Some(tx_ref.to_string());
    trade.updated_at = now;
    scope.update(&trade)?;
    scope.append_audit(
        &AuditRecord::new(AuditAction::TradeExecuted, actor_id, &trade.trade_id).with_details(
            json!({
                "buy_intent_id": trade.buy_intent_id,
                "sell_intent_id": trade.sell_intent_id,
                "quantity": trade.quantity,
                "execution_price": trade.execution_price,
                "tx_ref": tx_ref,
            }),
        ),
    )?;
    Ok(trade)
}

fn finalize_failed(
    scope: &WriteScope<'_>,
    actor_id: &str,
    claimed: &Trade,
    ledger_err: &LedgerError,
) -> SettlementResult<()> {
    let mut trade: Trade = scope.require(&claimed.trade_id)?;
    trade.status = TradeStatus::Failed;
    trade.failure_reason = Some(ledger_err.to_string());
    trade.updated_at = Utc::now();
    scope.update(&trade)?;
    scope.unlink(INTENT_CLAIMS, &trade.buy_intent_id)?;
    scope.unlink(INTENT_CLAIMS, &trade.sell_intent_id)?;
    scope.append_audit(
        &AuditRecord::new(AuditAction::TradeFailed, actor_id, &trade.trade_id)
            .with_details(json!({
                "buy_intent_id": trade.buy_intent_id,
                "sell_intent_id": trade.sell_intent_id,
            }))
            .failed(ledger_err.to_string()),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::config::SettlementPolicy;
    use crate::error::ErrorKind;
    use crate::ledger::{LedgerAdapter, LedgerOp};
    use crate::storage::repository::{KycStatus, TradingRepository};
    use crate::workflows::testing::Harness;
    use std::time::Duration;

    fn d(v: i64) -> Decimal {
        Decimal::from(v)
    }

    fn intent_status(h: &Harness, id: &str) -> IntentStatus {
        h.ctx
            .db
            .read(|s| s.require::<TradeIntent>(id))
            .unwrap()
            .status
    }

    #[tokio::test]
    async fn unverified_account_cannot_submit() {
        let h = Harness::new();
        h.ctx.accounts().register("newbie", Role::User).unwrap();

        let err = h
            .ctx
            .trading()
            .submit_intent("newbie", IntentSide::Buy, d(10), d(100))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ComplianceDenied);
        assert_eq!(err.code(), "KYC_UNVERIFIED");

        let intents = TradingRepository::new(&h.ctx.db).list_intents("newbie").unwrap();
        assert!(intents.is_empty());
    }

    #[tokio::test]
    async fn non_positive_values_are_rejected() {
        let h = Harness::new();
        h.verified("alice", Role::User);
        let engine = h.ctx.trading();

        let err = engine
            .submit_intent("alice", IntentSide::Buy, d(0), d(100))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = engine
            .submit_intent("alice", IntentSide::Buy, d(1), d(-5))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn domestic_notional_limit_applies() {
        let h = Harness::new();
        h.verified("dom", Role::DomesticUser);

        let err = h
            .ctx
            .trading()
            .submit_intent("dom", IntentSide::Buy, d(20), d(100))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "LIMIT_EXCEEDED");
    }

    #[tokio::test]
    async fn sell_requires_uncommitted_balance() {
        let h = Harness::new();
        h.verified("seller", Role::User);
        h.ledger.credit("G-seller", d(15)).await;
        let engine = h.ctx.trading();

        engine
            .submit_intent("seller", IntentSide::Sell, d(10), d(100))
            .await
            .unwrap();
        let err = engine
            .submit_intent("seller", IntentSide::Sell, d(10), d(100))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InventoryExhausted);
        assert_eq!(err.code(), "INSUFFICIENT_BALANCE");
    }

    #[tokio::test]
    async fn resting_buy_price_wins() {
        let h = Harness::new();
        h.verified("buyer", Role::User);
        h.verified("seller", Role::User);
        h.ledger.credit("G-seller", d(10)).await;
        let engine = h.ctx.trading();

        let buy = engine
            .submit_intent("buyer", IntentSide::Buy, d(10), d(110))
            .await
            .unwrap();
        let sell = engine
            .submit_intent("seller", IntentSide::Sell, d(10), d(100))
            .await
            .unwrap();

        let outcome = engine
            .match_and_execute("seller", &sell.intent_id)
            .await
            .unwrap();
        let MatchOutcome::Executed(trade) = outcome else {
            panic!("expected a trade");
        };
        assert_eq!(trade.quantity, d(10));
        assert_eq!(trade.execution_price, d(110));
        assert_eq!(trade.status, TradeStatus::Executed);
        assert_eq!(trade.buyer_id, "buyer");
        assert_eq!(trade.seller_id, "seller");
        assert!(trade.tx_ref.is_some());

        assert_eq!(intent_status(&h, &buy.intent_id), IntentStatus::Executed);
        assert_eq!(intent_status(&h, &sell.intent_id), IntentStatus::Executed);
        assert_eq!(h.ledger.balance("G-buyer").await.unwrap(), d(10));
        assert_eq!(h.ledger.balance("G-seller").await.unwrap(), d(0));
        assert_eq!(h.audit_actions()[0], AuditAction::TradeExecuted);
    }

    #[tokio::test]
    async fn incompatible_or_own_intents_do_not_match() {
        let h = Harness::new();
        h.verified("alice", Role::User);
        h.verified("bob", Role::User);
        h.ledger.credit("G-alice", d(10)).await;
        let engine = h.ctx.trading();

        engine
            .submit_intent("alice", IntentSide::Sell, d(10), d(100))
            .await
            .unwrap();
        let own_buy = engine
            .submit_intent("alice", IntentSide::Buy, d(10), d(120))
            .await
            .unwrap();
        let cheap_buy = engine
            .submit_intent("bob", IntentSide::Buy, d(10), d(90))
            .await
            .unwrap();

        assert!(matches!(
            engine.match_and_execute("alice", &own_buy.intent_id).await.unwrap(),
            MatchOutcome::NoMatch
        ));
        assert!(matches!(
            engine.match_and_execute("bob", &cheap_buy.intent_id).await.unwrap(),
            MatchOutcome::NoMatch
        ));
        assert_eq!(intent_status(&h, &cheap_buy.intent_id), IntentStatus::Pending);
    }

    #[tokio::test]
    async fn ledger_failure_leaves_intents_pending() {
        let h = Harness::new();
        h.verified("buyer", Role::User);
        h.verified("seller", Role::User);
        h.ledger.credit("G-seller", d(10)).await;
        let engine = h.ctx.trading();

        let buy = engine
            .submit_intent("buyer", IntentSide::Buy, d(10), d(100))
            .await
            .unwrap();
        let sell = engine
            .submit_intent("seller", IntentSide::Sell, d(10), d(100))
            .await
            .unwrap();

        h.ledger
            .fail_next(LedgerOp::Transfer, LedgerError::Unavailable("node down".into()))
            .await;
        let err = engine
            .match_and_execute("buyer", &buy.intent_id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LedgerFailure);
        assert_eq!(intent_status(&h, &buy.intent_id), IntentStatus::Pending);
        assert_eq!(intent_status(&h, &sell.intent_id), IntentStatus::Pending);

        let trades = TradingRepository::new(&h.ctx.db).list_trades("buyer").unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].status, TradeStatus::Failed);
        assert_eq!(h.audit_actions()[0], AuditAction::TradeFailed);

        // Claims were released, so a retry can settle.
        let outcome = engine
            .match_and_execute("buyer", &buy.intent_id)
            .await
            .unwrap();
        assert!(matches!(outcome, MatchOutcome::Executed(_)));
    }

    #[tokio::test]
    async fn concurrent_matches_settle_once() {
        let h = Harness::new();
        h.verified("buyer", Role::User);
        h.verified("seller", Role::User);
        h.ledger.credit("G-seller", d(10)).await;
        let engine = h.ctx.trading();

        let buy = engine
            .submit_intent("buyer", IntentSide::Buy, d(10), d(100))
            .await
            .unwrap();
        engine
            .submit_intent("seller", IntentSide::Sell, d(10), d(100))
            .await
            .unwrap();
        h.ledger.set_latency(Duration::from_millis(50)).await;

        let (first, second) = tokio::join!(
            engine.match_and_execute("buyer", &buy.intent_id),
            engine.match_and_execute("buyer", &buy.intent_id),
        );

        let results = [first, second];
        let executed = results
            .iter()
            .filter(|r| matches!(r, Ok(MatchOutcome::Executed(_))))
            .count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(e) if e.kind() == ErrorKind::StateConflict))
            .count();
        assert_eq!(executed, 1);
        assert_eq!(conflicts, 1);
        assert_eq!(h.ledger.balance("G-buyer").await.unwrap(), d(10));
    }

    #[tokio::test]
    async fn terminal_intents_are_immutable() {
        let h = Harness::new();
        h.verified("alice", Role::User);
        h.verified("bob", Role::User);
        let engine = h.ctx.trading();

        let intent = engine
            .submit_intent("alice", IntentSide::Buy, d(1), d(50))
            .await
            .unwrap();

        let err = engine.cancel_intent("bob", &intent.intent_id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let cancelled = engine.cancel_intent("alice", &intent.intent_id).unwrap();
        assert_eq!(cancelled.status, IntentStatus::Cancelled);

        let err = engine.cancel_intent("alice", &intent.intent_id).unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE");
        let err = engine
            .match_and_execute("alice", &intent.intent_id)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE");
        assert_eq!(
            engine.expire_stale_intents(Utc::now() + chrono::Duration::days(2)).unwrap(),
            0
        );
        assert_eq!(intent_status(&h, &intent.intent_id), IntentStatus::Cancelled);
    }

    #[tokio::test]
    async fn sweep_expires_stale_intents_once() {
        let policy = SettlementPolicy {
            intent_ttl: chrono::Duration::zero(),
            ..SettlementPolicy::default()
        };
        let h = Harness::with_policy(policy);
        h.verified("alice", Role::User);
        let engine = h.ctx.trading();

        let intent = engine
            .submit_intent("alice", IntentSide::Buy, d(1), d(50))
            .await
            .unwrap();

        let err = engine
            .match_and_execute("alice", &intent.intent_id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);

        let now = Utc::now();
        assert_eq!(engine.expire_stale_intents(now).unwrap(), 1);
        assert_eq!(engine.expire_stale_intents(now).unwrap(), 0);
        assert_eq!(intent_status(&h, &intent.intent_id), IntentStatus::Expired);
        assert_eq!(h.audit_actions()[0], AuditAction::IntentExpired);
    }

    #[tokio::test]
    async fn ineligible_counterparty_is_skipped() {
        let h = Harness::new();
        h.verified("buyer", Role::User);
        let mut flagged = h.verified("flagged", Role::User);
        h.verified("seller", Role::User);
        h.ledger.credit("G-flagged", d(10)).await;
        h.ledger.credit("G-seller", d(10)).await;
        let engine = h.ctx.trading();

        engine
            .submit_intent("flagged", IntentSide::Sell, d(10), d(100))
            .await
            .unwrap();
        let good_sell = engine
            .submit_intent("seller", IntentSide::Sell, d(10), d(100))
            .await
            .unwrap();
        flagged.kyc_status = KycStatus::Rejected;
        h.update_account(&flagged);

        let buy = engine
            .submit_intent("buyer", IntentSide::Buy, d(10), d(100))
            .await
            .unwrap();
        let MatchOutcome::Executed(trade) = engine
            .match_and_execute("buyer", &buy.intent_id)
            .await
            .unwrap()
        else {
            panic!("expected a trade");
        };
        assert_eq!(trade.sell_intent_id, good_sell.intent_id);
    }

    #[tokio::test]
    async fn oversized_notional_is_a_validation_error() {
        let h = Harness::new();
        h.verified("alice", Role::User);

        let err = h
            .ctx
            .trading()
            .submit_intent("alice", IntentSide::Buy, Decimal::MAX, d(2))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("amount too large"));
    }

    #[tokio::test]
    async fn over_cap_candidate_is_skipped_for_a_cheaper_one() {
        let h = Harness::new();
        h.verified("rich", Role::User);
        h.verified("modest", Role::User);
        h.verified("dom", Role::DomesticUser);
        h.ledger.credit("G-dom", d(10)).await;
        let engine = h.ctx.trading();

        // Resting at 150 the trade would be worth 1500, above the domestic cap.
        engine
            .submit_intent("rich", IntentSide::Buy, d(10), d(150))
            .await
            .unwrap();
        let cheap_buy = engine
            .submit_intent("modest", IntentSide::Buy, d(10), d(90))
            .await
            .unwrap();
        let sell = engine
            .submit_intent("dom", IntentSide::Sell, d(10), d(90))
            .await
            .unwrap();

        let MatchOutcome::Executed(trade) = engine
            .match_and_execute("dom", &sell.intent_id)
            .await
            .unwrap()
        else {
            panic!("expected a trade");
        };
        assert_eq!(trade.buy_intent_id, cheap_buy.intent_id);
        assert_eq!(trade.execution_price, d(90));
    }

    #[tokio::test]
    async fn only_over_cap_candidates_report_limit_exceeded() {
        let h = Harness::new();
        h.verified("rich", Role::User);
        h.verified("dom", Role::DomesticUser);
        h.ledger.credit("G-dom", d(10)).await;
        let engine = h.ctx.trading();

        engine
            .submit_intent("rich", IntentSide::Buy, d(10), d(150))
            .await
            .unwrap();
        let sell = engine
            .submit_intent("dom", IntentSide::Sell, d(10), d(90))
            .await
            .unwrap();

        let err = engine
            .match_and_execute("dom", &sell.intent_id)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "LIMIT_EXCEEDED");
        assert_eq!(intent_status(&h, &sell.intent_id), IntentStatus::Pending);
        assert!(TradingRepository::new(&h.ctx.db)
            .list_trades("dom")
            .unwrap()
            .is_empty());
    }
}
