// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account registration and compliance administration.

use chrono::Utc;
use serde_json::json;
use tracing::info;

use crate::auth::Role;
use crate::error::{ConflictReason, SettlementError, SettlementResult};
use crate::storage::repository::accounts::find_by_custody_address;
use crate::storage::repository::{Account, AmlStatus, KycStatus};
use crate::storage::{AuditAction, AuditRecord, RecordReader};
use crate::workflows::{require_admin, WorkflowContext};

pub struct AccountService<'a> {
    ctx: &'a WorkflowContext,
}

impl<'a> AccountService<'a> {
    pub fn new(ctx: &'a WorkflowContext) -> Self {
        Self { ctx }
    }

    pub fn get(&self, account_id: &str) -> SettlementResult<Account> {
        self.ctx.db.read(|scope| Ok(scope.require(account_id)?))
    }

    /// Self sign-up. Admin accounts are only created through seeding.
    pub fn register(&self, account_id: &str, role: Role) -> SettlementResult<Account> {
        let account_id = account_id.trim();
        if account_id.is_empty() {
            return Err(SettlementError::Validation("account id is required".to_string()));
        }
        if !role.is_self_assignable() {
            return Err(SettlementError::Forbidden(format!(
                "role {role} cannot be self-assigned"
            )));
        }

        let account = Account::new(account_id, role);
        self.ctx.db.write(|scope| {
            if scope.get::<Account>(account_id)?.is_some() {
                return Err(SettlementError::conflict(
                    ConflictReason::InvalidState,
                    format!("account {account_id} is already registered"),
                ));
            }
            scope.insert(&account)?;
            scope.append_audit(
                &AuditRecord::new(AuditAction::AccountRegistered, account_id, account_id)
                    .with_details(json!({ "role": role })),
            )?;
            Ok(())
        })?;

        info!(account_id, role = %role, "account registered");
        Ok(account)
    }

    /// Create or promote an admin account. Safe to call on every start-up.
    pub fn seed_admin(&self, account_id: &str) -> SettlementResult<Account> {
        self.ctx.db.write(|scope| {
            let existing: Option<Account> = scope.get(account_id)?;
            let account = match existing {
                Some(account) if account.is_admin() => return Ok(account),
                Some(mut account) => {
                    account.role = Role::Admin;
                    account.kyc_status = KycStatus::Verified;
                    account.aml_status = AmlStatus::Cleared;
                    account.updated_at = Utc::now();
                    scope.update(&account)?;
                    account
                }
                None => {
                    let account = Account::seeded_admin(account_id);
                    scope.insert(&account)?;
                    account
                }
            };
            scope.append_audit(
                &AuditRecord::new(AuditAction::AccountRegistered, "system", account_id)
                    .with_details(json!({ "role": Role::Admin, "seeded": true })),
            )?;
            info!(account_id, "admin account seeded");
            Ok(account)
        })
    }

    /// Submit KYC for review: NOT_STARTED or REJECTED → IN_REVIEW.
    pub fn start_kyc(&self, account_id: &str) -> SettlementResult<Account> {
        let account = self.ctx.db.write(|scope| {
            let mut account: Account = scope.require(account_id)?;
            if !matches!(account.kyc_status, KycStatus::NotStarted | KycStatus::Rejected) {
                return Err(SettlementError::invalid_state(
                    "KYC for account",
                    account_id,
                    account.kyc_status,
                ));
            }
            account.kyc_status = KycStatus::InReview;
            account.updated_at = Utc::now();
            scope.update(&account)?;
            scope.append_audit(&AuditRecord::new(
                AuditAction::KycSubmitted,
                account_id,
                account_id,
            ))?;
            Ok(account)
        })?;

        info!(account_id, "KYC submitted for review");
        Ok(account)
    }

    /// Decide a KYC review: IN_REVIEW → VERIFIED | REJECTED.
    pub fn review_kyc(
        &self,
        admin_id: &str,
        account_id: &str,
        approve: bool,
        note: Option<String>,
    ) -> SettlementResult<Account> {
        let account = self.ctx.db.write(|scope| {
            require_admin(scope, admin_id)?;
            let mut account: Account = scope.require(account_id)?;
            if account.kyc_status != KycStatus::InReview {
                return Err(SettlementError::invalid_state(
                    "KYC for account",
                    account_id,
                    account.kyc_status,
                ));
            }

            let (status, action) = if approve {
                (KycStatus::Verified, AuditAction::KycApproved)
            } else {
                (KycStatus::Rejected, AuditAction::KycRejected)
            };
            account.kyc_status = status;
            account.updated_at = Utc::now();
            scope.update(&account)?;
            scope.append_audit(
                &AuditRecord::new(action, admin_id, account_id)
                    .with_details(json!({ "note": note })),
            )?;
            Ok(account)
        })?;

        info!(admin_id, account_id, kyc_status = ?account.kyc_status, "KYC reviewed");
        Ok(account)
    }

    /// Record an AML screening outcome.
    pub fn set_aml_status(
        &self,
        admin_id: &str,
        account_id: &str,
        status: AmlStatus,
        reason: Option<String>,
    ) -> SettlementResult<Account> {
        let account = self.ctx.db.write(|scope| {
            require_admin(scope, admin_id)?;
            let mut account: Account = scope.require(account_id)?;
            let previous = account.aml_status;
            account.aml_status = status;
            account.aml_reason = reason.clone();
            account.updated_at = Utc::now();
            scope.update(&account)?;

            let action = if status.blocks_money_movement() {
                AuditAction::AmlFlagRaised
            } else {
                AuditAction::AmlCleared
            };
            scope.append_audit(
                &AuditRecord::new(action, admin_id, account_id).with_details(json!({
                    "from": previous,
                    "to": status,
                    "reason": reason,
                })),
            )?;
            Ok::<_, SettlementError>(account)
        })?;

        info!(admin_id, account_id, aml_status = ?status, "AML status changed");
        Ok(account)
    }

    /// Link the ledger account that receives the holder's tokens.
    pub fn link_custody_address(&self, account_id: &str, address: &str) -> SettlementResult<Account> {
        let address = address.trim();
        if address.is_empty() {
            return Err(SettlementError::Validation(
                "custody address must not be empty".to_string(),
            ));
        }

        let account = self.ctx.db.write(|scope| {
            if let Some(holder) = find_by_custody_address(scope, address)? {
                if holder.account_id != account_id {
                    return Err(SettlementError::Validation(
                        "custody address is linked to another account".to_string(),
                    ));
                }
            }
            let mut account: Account = scope.require(account_id)?;
            let previous = account.custody_address.replace(address.to_string());
            account.updated_at = Utc::now();
            scope.update(&account)?;
            scope.append_audit(
                &AuditRecord::new(AuditAction::CustodyLinked, account_id, account_id)
                    .with_details(json!({ "address": address, "previous": previous })),
            )?;
            Ok(account)
        })?;

        info!(account_id, "custody address linked");
        Ok(account)
    }
}
