// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Custody-to-token minting.
//!
//! ```text
//! initiate ──► REQUESTED ──execute──► APPROVED ──ledger ok──► MINTED
//!                 │                        └──ledger err──► FAILED
//!                 └──reject──► FAILED
//! ```
//!
//! Initiation reserves one custody asset and locks the reference price for
//! the policy TTL. Execution requires the lock to still be usable; an expired
//! lock leaves the request REQUESTED so the owner can renew it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use super::{ensure_owner, ensure_positive, require_admin, require_custody_address, require_eligible};
use super::{WorkflowContext, SYSTEM_ACTOR};
use crate::compliance::Action;
use crate::error::{ConflictReason, SettlementError, SettlementResult};
use crate::ledger::{LedgerError, ReservesProof};
use crate::storage::database::ASSET_RESERVATIONS;
use crate::storage::repository::custody::available_assets;
use crate::storage::repository::settings;
use crate::storage::repository::{
    CustodyAsset, MintRequest, MintStatus, PriceLock, PriceLockStatus,
};
use crate::storage::{AuditAction, AuditRecord, RecordReader, WriteScope};

/// A mint request together with the price lock that currently backs it.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MintQuote {
    pub mint: MintRequest,
    pub price_lock: PriceLock,
}

/// Everything the ledger call needs, captured by the claim transaction.
struct ApprovedMint {
    mint: MintRequest,
    asset: CustodyAsset,
    address: String,
}

pub struct MintWorkflow<'a> {
    ctx: &'a WorkflowContext,
}

impl<'a> MintWorkflow<'a> {
    pub fn new(ctx: &'a WorkflowContext) -> Self {
        Self { ctx }
    }

    /// Reserve a custody asset for `grams` and lock the current reference price.
    pub fn initiate(&self, account_id: &str, grams: Decimal) -> SettlementResult<MintQuote> {
        ensure_positive(grams, "grams")?;
        let policy = &self.ctx.policy;

        let quote = self.ctx.db.write(|scope| {
            let account = require_eligible(scope, account_id, Action::Mint, None, policy)?;
            if settings::minting_paused(scope)? {
                return Err(SettlementError::conflict(
                    ConflictReason::MintingPaused,
                    "minting is paused",
                ));
            }
            require_custody_address(&account)?;

            let asset = available_assets(scope)?
                .into_iter()
                .find(|a| a.weight_grams >= grams)
                .ok_or_else(|| {
                    SettlementError::InsufficientInventory(format!(
                        "no unreserved custody asset covers {grams} g"
                    ))
                })?;

            let now = Utc::now();
            cancel_active_locks(scope, account_id, &asset.asset_id, now)?;

            let price = settings::reference_price(scope, policy.default_reference_price)?;
            let price_lock = PriceLock {
                lock_id: uuid::Uuid::new_v4().to_string(),
                owner_id: account_id.to_string(),
                asset_id: asset.asset_id.clone(),
                price_per_gram: price,
                status: PriceLockStatus::Active,
                created_at: now,
                expires_at: now + policy.price_lock_ttl,
            };
            let mint = MintRequest {
                mint_id: uuid::Uuid::new_v4().to_string(),
                owner_id: account_id.to_string(),
                custody_asset_id: asset.asset_id.clone(),
                requested_grams: grams,
                status: MintStatus::Requested,
                price_lock_id: Some(price_lock.lock_id.clone()),
                tx_ref: None,
                failure_reason: None,
                created_at: now,
                updated_at: now,
            };

            scope.insert(&price_lock)?;
            scope.insert(&mint)?;
            scope.link(ASSET_RESERVATIONS, &asset.asset_id, &mint.mint_id)?;
            scope.append_audit(
                &AuditRecord::new(AuditAction::MintRequested, account_id, &mint.mint_id)
                    .with_details(json!({
                        "asset_id": asset.asset_id,
                        "grams": grams,
                        "price_per_gram": price,
                        "lock_expires_at": price_lock.expires_at,
                    })),
            )?;
            Ok(MintQuote { mint, price_lock })
        })?;

        info!(
            mint_id = %quote.mint.mint_id,
            account_id,
            asset_id = %quote.mint.custody_asset_id,
            %grams,
            "mint requested"
        );
        Ok(quote)
    }

    /// Replace the request's price lock with a fresh one at the current price.
    pub fn renew_price_lock(&self, account_id: &str, mint_id: &str) -> SettlementResult<MintQuote> {
        let policy = &self.ctx.policy;
        let quote = self.ctx.db.write(|scope| {
            let mut mint: MintRequest = scope.require(mint_id)?;
            ensure_owner(&mint, account_id, "mint request")?;
            if mint.status != MintStatus::Requested {
                return Err(SettlementError::invalid_state("Mint request", mint_id, mint.status));
            }
            if settings::minting_paused(scope)? {
                return Err(SettlementError::conflict(
                    ConflictReason::MintingPaused,
                    "minting is paused",
                ));
            }

            let now = Utc::now();
            cancel_active_locks(scope, account_id, &mint.custody_asset_id, now)?;

            let price = settings::reference_price(scope, policy.default_reference_price)?;
            let price_lock = PriceLock {
                lock_id: uuid::Uuid::new_v4().to_string(),
                owner_id: account_id.to_string(),
                asset_id: mint.custody_asset_id.clone(),
                price_per_gram: price,
                status: PriceLockStatus::Active,
                created_at: now,
                expires_at: now + policy.price_lock_ttl,
            };
            let previous = mint.price_lock_id.replace(price_lock.lock_id.clone());
            mint.updated_at = now;

            scope.insert(&price_lock)?;
            scope.update(&mint)?;
            scope.append_audit(
                &AuditRecord::new(AuditAction::PriceLockRenewed, account_id, mint_id).with_details(
                    json!({
                        "previous_lock_id": previous,
                        "lock_id": price_lock.lock_id,
                        "price_per_gram": price,
                    }),
                ),
            )?;
            Ok(MintQuote { mint, price_lock })
        })?;

        info!(mint_id, account_id, "price lock renewed");
        Ok(quote)
    }

    /// Admin approval: verify the lock and reservation, then mint on the ledger.
    pub async fn execute(&self, admin_id: &str, mint_id: &str) -> SettlementResult<MintRequest> {
        let approved = self
            .ctx
            .db
            .write(|scope| self.approve(scope, admin_id, mint_id))?;
        let proof = ReservesProof::for_asset(&approved.asset, mint_id);

        let result = self
            .ctx
            .ledger
            .mint(&approved.address, approved.mint.requested_grams, &proof, mint_id)
            .await;

        match result {
            Ok(tx_ref) => {
                let mint = self
                    .ctx
                    .db
                    .write(|scope| finalize_minted(scope, admin_id, &approved.mint, &tx_ref))
                    .inspect_err(|e| {
                        error!(
                            mint_id,
                            tx_ref = %tx_ref,
                            error = %e,
                            "ledger mint applied but request could not be finalized"
                        )
                    })?;
                info!(
                    mint_id,
                    owner_id = %mint.owner_id,
                    grams = %mint.requested_grams,
                    tx_ref = %tx_ref,
                    "tokens minted"
                );
                Ok(mint)
            }
            Err(ledger_err) => {
                warn!(mint_id, error = %ledger_err, "ledger mint failed");
                self.ctx
                    .db
                    .write(|scope| finalize_failed(scope, admin_id, &approved.mint, &ledger_err))?;
                Err(ledger_err.into())
            }
        }
    }

    fn approve(
        &self,
        scope: &WriteScope<'_>,
        admin_id: &str,
        mint_id: &str,
    ) -> SettlementResult<ApprovedMint> {
        require_admin(scope, admin_id)?;
        let mut mint: MintRequest = scope.require(mint_id)?;
        if mint.status != MintStatus::Requested {
            return Err(SettlementError::invalid_state("Mint request", mint_id, mint.status));
        }
        if settings::minting_paused(scope)? {
            return Err(SettlementError::conflict(
                ConflictReason::MintingPaused,
                "minting is paused",
            ));
        }

        let now = Utc::now();
        let lock: Option<PriceLock> = match &mint.price_lock_id {
            Some(lock_id) => scope.get(lock_id)?,
            None => None,
        };
        if !lock.is_some_and(|l| l.is_usable_at(now)) {
            return Err(SettlementError::conflict(
                ConflictReason::PriceLockExpired,
                format!("price lock for mint request {mint_id} has expired; renew it first"),
            ));
        }

        let holder = scope.lookup(ASSET_RESERVATIONS, &mint.custody_asset_id)?;
        if holder.as_deref() != Some(mint_id) {
            return Err(SettlementError::conflict(
                ConflictReason::ConcurrentModification,
                format!("custody asset {} is not reserved for this request", mint.custody_asset_id),
            ));
        }

        let owner = require_eligible(scope, &mint.owner_id, Action::Mint, None, &self.ctx.policy)?;
        let address = require_custody_address(&owner)?;
        let asset: CustodyAsset = scope.require(&mint.custody_asset_id)?;

        mint.status = MintStatus::Approved;
        mint.updated_at = now;
        scope.update(&mint)?;
        scope.append_audit(&AuditRecord::new(AuditAction::MintApproved, admin_id, mint_id))?;

        Ok(ApprovedMint {
            mint,
            asset,
            address,
        })
    }

    /// Admin rejection of a REQUESTED mint; releases the reserved asset.
    pub fn reject(&self, admin_id: &str, mint_id: &str, reason: &str) -> SettlementResult<MintRequest> {
        let mint = self.ctx.db.write(|scope| {
            require_admin(scope, admin_id)?;
            let mut mint: MintRequest = scope.require(mint_id)?;
            if mint.status != MintStatus::Requested {
                return Err(SettlementError::invalid_state("Mint request", mint_id, mint.status));
            }

            let now = Utc::now();
            mint.status = MintStatus::Failed;
            mint.failure_reason = Some(reason.to_string());
            mint.updated_at = now;
            scope.update(&mint)?;
            release_reservation(scope, &mint)?;
            scope.append_audit(
                &AuditRecord::new(AuditAction::MintRejected, admin_id, mint_id)
                    .with_details(json!({ "reason": reason })),
            )?;
            Ok(mint)
        })?;

        info!(mint_id, admin_id, reason, "mint request rejected");
        Ok(mint)
    }

    // -------------------------------------------------------------------------
    // Vault administration
    // -------------------------------------------------------------------------

    pub fn register_custody_asset(
        &self,
        admin_id: &str,
        vault_id: &str,
        weight_grams: Decimal,
        purity: Decimal,
    ) -> SettlementResult<CustodyAsset> {
        let vault_id = vault_id.trim();
        if vault_id.is_empty() {
            return Err(SettlementError::Validation("vault id is required".to_string()));
        }
        ensure_positive(weight_grams, "weight")?;
        if purity <= Decimal::ZERO || purity > Decimal::ONE {
            return Err(SettlementError::Validation(
                "purity must be within (0, 1]".to_string(),
            ));
        }

        let asset = CustodyAsset {
            asset_id: uuid::Uuid::new_v4().to_string(),
            vault_id: vault_id.to_string(),
            weight_grams,
            purity,
            registered_by: admin_id.to_string(),
            created_at: Utc::now(),
        };
        self.ctx.db.write(|scope| {
            require_admin(scope, admin_id)?;
            scope.insert(&asset)?;
            scope.append_audit(
                &AuditRecord::new(AuditAction::CustodyAssetRegistered, admin_id, &asset.asset_id)
                    .with_details(json!({
                        "vault_id": asset.vault_id,
                        "weight_grams": weight_grams,
                        "purity": purity,
                    })),
            )?;
            Ok::<_, SettlementError>(())
        })?;

        info!(asset_id = %asset.asset_id, vault_id, %weight_grams, "custody asset registered");
        Ok(asset)
    }

    pub fn reference_price(&self) -> SettlementResult<Decimal> {
        Ok(self.ctx.db.read(|scope| {
            settings::reference_price(scope, self.ctx.policy.default_reference_price)
        })?)
    }

    pub fn set_reference_price(&self, admin_id: &str, price: Decimal) -> SettlementResult<Decimal> {
        ensure_positive(price, "reference price")?;
        self.ctx.db.write(|scope| {
            require_admin(scope, admin_id)?;
            let previous = settings::reference_price(scope, self.ctx.policy.default_reference_price)?;
            settings::set_reference_price(scope, price)?;
            scope.append_audit(
                &AuditRecord::new(AuditAction::ReferencePriceChanged, admin_id, "reference_price")
                    .with_details(json!({ "from": previous, "to": price })),
            )?;
            Ok::<_, SettlementError>(())
        })?;

        info!(admin_id, %price, "reference price changed");
        Ok(price)
    }

    pub fn minting_paused(&self) -> SettlementResult<bool> {
        Ok(self.ctx.db.read(|scope| settings::minting_paused(scope))?)
    }

    pub fn set_minting_paused(&self, admin_id: &str, paused: bool) -> SettlementResult<bool> {
        self.ctx.db.write(|scope| {
            require_admin(scope, admin_id)?;
            settings::set_minting_paused(scope, paused)?;
            let action = if paused {
                AuditAction::MintingPaused
            } else {
                AuditAction::MintingResumed
            };
            scope.append_audit(&AuditRecord::new(action, admin_id, "minting"))?;
            Ok::<_, SettlementError>(())
        })?;

        info!(admin_id, paused, "minting pause toggled");
        Ok(paused)
    }

    /// Move ACTIVE price locks past their expiry to EXPIRED.
    pub fn expire_price_locks(&self, now: DateTime<Utc>) -> SettlementResult<usize> {
        let expired = self.ctx.db.write(|scope| {
            let stale = scope.scan::<PriceLock>(|l| {
                l.status == PriceLockStatus::Active && l.is_expired_at(now)
            })?;
            let count = stale.len();
            for mut lock in stale {
                lock.status = PriceLockStatus::Expired;
                scope.update(&lock)?;
                scope.append_audit(
                    &AuditRecord::new(AuditAction::PriceLockExpired, SYSTEM_ACTOR, &lock.lock_id)
                        .with_details(json!({ "asset_id": lock.asset_id })),
                )?;
            }
            Ok::<_, SettlementError>(count)
        })?;

        if expired > 0 {
            info!(count = expired, "expired stale price locks");
        }
        Ok(expired)
    }
}

fn cancel_active_locks(
    scope: &WriteScope<'_>,
    owner_id: &str,
    asset_id: &str,
    now: DateTime<Utc>,
) -> SettlementResult<()> {
    let active = scope.scan::<PriceLock>(|l| {
        l.owner_id == owner_id && l.asset_id == asset_id && l.status == PriceLockStatus::Active
    })?;
    for mut lock in active {
        lock.status = if lock.is_expired_at(now) {
            PriceLockStatus::Expired
        } else {
            PriceLockStatus::Cancelled
        };
        scope.update(&lock)?;
    }
    Ok(())
}

/// Free the custody asset and retire the request's price lock.
fn release_reservation(scope: &WriteScope<'_>, mint: &MintRequest) -> SettlementResult<()> {
    let holder = scope.lookup(ASSET_RESERVATIONS, &mint.custody_asset_id)?;
    if holder.as_deref() == Some(mint.mint_id.as_str()) {
        scope.unlink(ASSET_RESERVATIONS, &mint.custody_asset_id)?;
    }
    if let Some(lock_id) = &mint.price_lock_id {
        if let Some(mut lock) = scope.get::<PriceLock>(lock_id)? {
            if lock.status == PriceLockStatus::Active {
                lock.status = PriceLockStatus::Cancelled;
                scope.update(&lock)?;
            }
        }
    }
    Ok(())
}

fn finalize_minted(
    scope: &WriteScope<'_>,
    admin_id: &str,
    approved: &MintRequest,
    tx_ref: &str,
) -> SettlementResult<MintRequest> {
    let mut mint: MintRequest = scope.require(&approved.mint_id)?;
    if mint.status != MintStatus::Approved {
        return Err(SettlementError::conflict(
            ConflictReason::ConcurrentModification,
            format!("Mint request {} is {:?}", mint.mint_id, mint.status),
        ));
    }

    mint.status = MintStatus::Minted;
    mint.tx_ref = Some(tx_ref.to_string());
    mint.updated_at = Utc::now();
    scope.update(&mint)?;
    if let Some(lock_id) = &mint.price_lock_id {
        let mut lock: PriceLock = scope.require(lock_id)?;
        lock.status = PriceLockStatus::Used;
        scope.update(&lock)?;
    }
    scope.append_audit(
        &AuditRecord::new(AuditAction::MintExecuted, admin_id, &mint.mint_id).with_details(json!({
            "grams": mint.requested_grams,
            "asset_id": mint.custody_asset_id,
            "tx_ref": tx_ref,
        })),
    )?;
    Ok(mint)
}

fn finalize_failed(
    scope: &WriteScope<'_>,
    admin_id: &str,
    approved: &MintRequest,
    ledger_err: &LedgerError,
) -> SettlementResult<()> {
    let mut mint: MintRequest = scope.require(&approved.mint_id)?;
    mint.status = MintStatus::Failed;
    mint.failure_reason = Some(ledger_err.to_string());
    mint.updated_at = Utc::now();
    scope.update(&mint)?;
    release_reservation(scope, &mint)?;
    scope.append_audit(
        &AuditRecord::new(AuditAction::MintFailed, admin_id, &mint.mint_id)
            .with_details(json!({ "asset_id": mint.custody_asset_id }))
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
    use crate::storage::repository::{CustodyRepository, KycStatus};
    use crate::workflows::testing::Harness;

    fn d(v: i64) -> Decimal {
        Decimal::from(v)
    }

    fn vault(h: &Harness, grams: i64) -> CustodyAsset {
        h.ctx
            .minting()
            .register_custody_asset("root", "vault-zrh", d(grams), Decimal::new(999, 3))
            .unwrap()
    }

    fn mint_status(h: &Harness, id: &str) -> MintStatus {
        h.ctx
            .db
            .read(|s| s.require::<MintRequest>(id))
            .unwrap()
            .status
    }

    fn lock_status(h: &Harness, lock_id: &str) -> PriceLockStatus {
        CustodyRepository::new(&h.ctx.db)
            .get_price_lock(lock_id)
            .unwrap()
            .status
    }

    #[tokio::test]
    async fn mint_happy_path() {
        let h = Harness::new();
        h.admin("root");
        h.verified("alice", Role::User);
        let asset = vault(&h, 500);
        let minting = h.ctx.minting();

        let quote = minting.initiate("alice", d(400)).unwrap();
        assert_eq!(quote.mint.status, MintStatus::Requested);
        assert_eq!(quote.mint.custody_asset_id, asset.asset_id);
        assert_eq!(quote.price_lock.price_per_gram, Decimal::new(7500, 2));
        assert_eq!(CustodyRepository::new(&h.ctx.db).inventory().unwrap().count, 0);

        let mint = minting.execute("root", &quote.mint.mint_id).await.unwrap();
        assert_eq!(mint.status, MintStatus::Minted);
        assert!(mint.tx_ref.is_some());
        assert_eq!(h.ledger.balance("G-alice").await.unwrap(), d(400));

        let lock = CustodyRepository::new(&h.ctx.db)
            .get_price_lock(&quote.price_lock.lock_id)
            .unwrap();
        assert_eq!(lock.status, PriceLockStatus::Used);
        assert_eq!(
            &h.audit_actions()[..3],
            &[
                AuditAction::MintExecuted,
                AuditAction::MintApproved,
                AuditAction::MintRequested
            ]
        );

        let err = minting.execute("root", &quote.mint.mint_id).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE");
    }

    #[tokio::test]
    async fn oversized_mint_creates_nothing() {
        let h = Harness::new();
        h.admin("root");
        h.verified("alice", Role::User);
        vault(&h, 500);

        let err = h.ctx.minting().initiate("alice", d(1000)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InventoryExhausted);
        assert_eq!(err.code(), "INSUFFICIENT_VAULT_INVENTORY");

        let mints = CustodyRepository::new(&h.ctx.db).list_mints("alice").unwrap();
        assert!(mints.is_empty());
        let locks = h.ctx.db.read(|s| s.scan::<PriceLock>(|_| true)).unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn reserved_asset_is_not_offered_twice() {
        let h = Harness::new();
        h.admin("root");
        h.verified("alice", Role::User);
        h.verified("bob", Role::User);
        vault(&h, 500);
        let minting = h.ctx.minting();

        minting.initiate("alice", d(100)).unwrap();
        let err = minting.initiate("bob", d(100)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InventoryExhausted);
    }

    #[tokio::test]
    async fn expired_lock_blocks_execution() {
        let policy = SettlementPolicy {
            price_lock_ttl: chrono::Duration::zero(),
            ..SettlementPolicy::default()
        };
        let h = Harness::with_policy(policy);
        h.admin("root");
        h.verified("alice", Role::User);
        vault(&h, 500);

        let quote = h.ctx.minting().initiate("alice", d(100)).unwrap();
        let err = h
            .ctx
            .minting()
            .execute("root", &quote.mint.mint_id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);
        assert_eq!(err.code(), "PRICE_LOCK_EXPIRED");
        assert_eq!(mint_status(&h, &quote.mint.mint_id), MintStatus::Requested);
        assert_eq!(h.ledger.total_supply().await.unwrap(), d(0));
    }

    #[tokio::test]
    async fn renewed_lock_allows_execution() {
        let h = Harness::new();
        h.admin("root");
        h.verified("alice", Role::User);
        vault(&h, 500);
        let minting = h.ctx.minting();

        let quote = minting.initiate("alice", d(100)).unwrap();
        let mut lock = quote.price_lock.clone();
        lock.expires_at = Utc::now() - chrono::Duration::seconds(1);
        h.ctx.db.write(|s| s.update(&lock)).unwrap();

        assert!(minting.execute("root", &quote.mint.mint_id).await.is_err());
        assert_eq!(minting.expire_price_locks(Utc::now()).unwrap(), 1);

        minting.set_reference_price("root", d(80)).unwrap();
        let err = minting.renew_price_lock("bob", &quote.mint.mint_id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        let renewed = minting.renew_price_lock("alice", &quote.mint.mint_id).unwrap();
        assert_eq!(renewed.price_lock.price_per_gram, d(80));
        assert_ne!(renewed.price_lock.lock_id, quote.price_lock.lock_id);

        let mint = minting.execute("root", &quote.mint.mint_id).await.unwrap();
        assert_eq!(mint.status, MintStatus::Minted);
    }

    #[tokio::test]
    async fn ledger_failure_releases_asset() {
        let h = Harness::new();
        h.admin("root");
        h.verified("alice", Role::User);
        vault(&h, 500);
        let minting = h.ctx.minting();

        let quote = minting.initiate("alice", d(100)).unwrap();
        h.ledger
            .fail_next(LedgerOp::Mint, LedgerError::Timeout(std::time::Duration::from_secs(5)))
            .await;
        let err = minting.execute("root", &quote.mint.mint_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LedgerFailure);

        let failed = h
            .ctx
            .db
            .read(|s| s.require::<MintRequest>(&quote.mint.mint_id))
            .unwrap();
        assert_eq!(failed.status, MintStatus::Failed);
        assert!(failed.failure_reason.is_some());
        assert_eq!(CustodyRepository::new(&h.ctx.db).inventory().unwrap().count, 1);
        assert_eq!(h.audit_actions()[0], AuditAction::MintFailed);
        assert_eq!(
            lock_status(&h, &quote.price_lock.lock_id),
            PriceLockStatus::Cancelled
        );

        // The freed asset can back a new request.
        minting.initiate("alice", d(100)).unwrap();
    }

    #[tokio::test]
    async fn pause_and_permissions() {
        let h = Harness::new();
        h.admin("root");
        h.verified("alice", Role::User);
        vault(&h, 500);
        let minting = h.ctx.minting();

        let err = minting.set_minting_paused("alice", true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        minting.set_minting_paused("root", true).unwrap();
        let err = minting.initiate("alice", d(100)).unwrap_err();
        assert_eq!(err.code(), "MINTING_PAUSED");

        minting.set_minting_paused("root", false).unwrap();
        let quote = minting.initiate("alice", d(100)).unwrap();
        let err = minting.execute("alice", &quote.mint.mint_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let rejected = minting
            .reject("root", &quote.mint.mint_id, "documents incomplete")
            .unwrap();
        assert_eq!(rejected.status, MintStatus::Failed);
        assert_eq!(CustodyRepository::new(&h.ctx.db).inventory().unwrap().count, 1);
        assert_eq!(
            lock_status(&h, &quote.price_lock.lock_id),
            PriceLockStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn renewal_cancels_the_superseded_lock() {
        let h = Harness::new();
        h.admin("root");
        h.verified("alice", Role::User);
        let asset = vault(&h, 500);
        let minting = h.ctx.minting();

        let quote = minting.initiate("alice", d(100)).unwrap();
        let first = minting.renew_price_lock("alice", &quote.mint.mint_id).unwrap();
        let second = minting.renew_price_lock("alice", &quote.mint.mint_id).unwrap();

        assert_eq!(
            lock_status(&h, &quote.price_lock.lock_id),
            PriceLockStatus::Cancelled
        );
        assert_eq!(
            lock_status(&h, &first.price_lock.lock_id),
            PriceLockStatus::Cancelled
        );
        let active = h
            .ctx
            .db
            .read(|s| {
                s.scan::<PriceLock>(|l| {
                    l.owner_id == "alice"
                        && l.asset_id == asset.asset_id
                        && l.status == PriceLockStatus::Active
                })
            })
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].lock_id, second.price_lock.lock_id);
        assert_eq!(
            second.mint.price_lock_id.as_deref(),
            Some(second.price_lock.lock_id.as_str())
        );
    }

    #[tokio::test]
    async fn unverified_owner_cannot_mint() {
        let h = Harness::new();
        h.admin("root");
        let mut alice = h.verified("alice", Role::User);
        vault(&h, 500);

        alice.kyc_status = KycStatus::InReview;
        h.update_account(&alice);
        let err = h.ctx.minting().initiate("alice", d(10)).unwrap_err();
        assert_eq!(err.code(), "KYC_UNVERIFIED");
    }

    #[test]
    fn custody_asset_validation() {
        let h = Harness::new();
        h.admin("root");
        let minting = h.ctx.minting();

        let err = minting
            .register_custody_asset("root", " ", d(10), Decimal::ONE)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = minting
            .register_custody_asset("root", "v", d(10), Decimal::new(11, 1))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = minting
            .register_custody_asset("nobody", "v", d(10), Decimal::ONE)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }
}
