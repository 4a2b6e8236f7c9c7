// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Eligibility rules for money-movement actions.
//!
//! Rules are evaluated in order and the first failing rule wins:
//!
//! 1. `ADMIN` bypasses every remaining rule
//! 2. KYC must be `VERIFIED`
//! 3. AML must not be `FLAGGED` or `BLOCKED`
//! 4. Domestic and international roles have a per-trade notional ceiling
//!
//! The gate is a pure function over an account snapshot. Callers re-read the
//! account right before each mutating step and never cache a decision.

use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::Role;
use crate::config::SettlementPolicy;
use crate::storage::repository::{Account, KycStatus};

/// Actions guarded by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Trade,
    Mint,
    Redeem,
    Loan,
    WalletOp,
}

/// Stable denial reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenialReason {
    KycUnverified,
    AmlBlocked,
    LimitExceeded,
}

impl DenialReason {
    pub fn code(&self) -> &'static str {
        match self {
            DenialReason::KycUnverified => "KYC_UNVERIFIED",
            DenialReason::AmlBlocked => "AML_BLOCKED",
            DenialReason::LimitExceeded => "LIMIT_EXCEEDED",
        }
    }

    /// Actionable message for the account holder.
    pub fn message(&self) -> &'static str {
        match self {
            DenialReason::KycUnverified => {
                "KYC verification must be completed and approved before this action"
            }
            DenialReason::AmlBlocked => {
                "Account is held for AML review; contact compliance to lift the restriction"
            }
            DenialReason::LimitExceeded => {
                "Trade value exceeds the limit for this account type; split it into smaller trades"
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Allowed,
    Denied(DenialReason),
}

impl Eligibility {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Eligibility::Allowed)
    }
}

/// Per-trade notional ceiling for a role, if it has one.
pub fn trade_limit(role: Role, policy: &SettlementPolicy) -> Option<Decimal> {
    match role {
        Role::DomesticUser => Some(policy.domestic_trade_limit),
        Role::InternationalUser => Some(policy.international_trade_limit),
        Role::Admin | Role::User => None,
    }
}

/// Decide whether `account` may perform `action`.
///
/// `notional` is the value of the trade (quantity × price) and only applies
/// to [`Action::Trade`].
pub fn check_eligibility(
    account: &Account,
    action: Action,
    notional: Option<Decimal>,
    policy: &SettlementPolicy,
) -> Eligibility {
    if account.role == Role::Admin {
        return Eligibility::Allowed;
    }

    if account.kyc_status != KycStatus::Verified {
        return Eligibility::Denied(DenialReason::KycUnverified);
    }

    if account.aml_status.blocks_money_movement() {
        return Eligibility::Denied(DenialReason::AmlBlocked);
    }

    if action == Action::Trade {
        if let (Some(limit), Some(value)) = (trade_limit(account.role, policy), notional) {
            if value > limit {
                return Eligibility::Denied(DenialReason::LimitExceeded);
            }
        }
    }

    Eligibility::Allowed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::repository::AmlStatus;

    fn verified(role: Role) -> Account {
        let mut account = Account::new("acct", role);
        account.kyc_status = KycStatus::Verified;
        account.aml_status = AmlStatus::Cleared;
        account
    }

    #[test]
    fn admin_bypasses_all_rules() {
        let mut admin = Account::new("root", Role::Admin);
        admin.aml_status = AmlStatus::Blocked;
        let policy = SettlementPolicy::default();
        assert!(check_eligibility(&admin, Action::Mint, None, &policy).is_allowed());
    }

    #[test]
    fn unverified_kyc_is_denied_first() {
        let mut account = Account::new("acct", Role::User);
        account.aml_status = AmlStatus::Flagged;
        let policy = SettlementPolicy::default();
        assert_eq!(
            check_eligibility(&account, Action::Trade, None, &policy),
            Eligibility::Denied(DenialReason::KycUnverified)
        );

        account.kyc_status = KycStatus::InReview;
        assert_eq!(
            check_eligibility(&account, Action::Redeem, None, &policy),
            Eligibility::Denied(DenialReason::KycUnverified)
        );
    }

    #[test]
    fn flagged_or_blocked_aml_is_denied() {
        let policy = SettlementPolicy::default();
        for status in [AmlStatus::Flagged, AmlStatus::Blocked] {
            let mut account = verified(Role::User);
            account.aml_status = status;
            assert_eq!(
                check_eligibility(&account, Action::Loan, None, &policy),
                Eligibility::Denied(DenialReason::AmlBlocked)
            );
            assert_eq!(
                check_eligibility(&account, Action::WalletOp, None, &policy),
                Eligibility::Denied(DenialReason::AmlBlocked)
            );
        }
    }

    #[test]
    fn pending_aml_is_allowed() {
        let mut account = verified(Role::User);
        account.aml_status = AmlStatus::Pending;
        let policy = SettlementPolicy::default();
        assert!(check_eligibility(&account, Action::Mint, None, &policy).is_allowed());
    }

    #[test]
    fn domestic_limit_is_lower_than_international() {
        let policy = SettlementPolicy::default();
        let notional = Some(Decimal::from(2000));

        assert_eq!(
            check_eligibility(&verified(Role::DomesticUser), Action::Trade, notional, &policy),
            Eligibility::Denied(DenialReason::LimitExceeded)
        );
        assert!(check_eligibility(
            &verified(Role::InternationalUser),
            Action::Trade,
            notional,
            &policy
        )
        .is_allowed());
        assert!(check_eligibility(&verified(Role::User), Action::Trade, notional, &policy)
            .is_allowed());
    }

    #[test]
    fn limits_only_apply_to_trades() {
        let policy = SettlementPolicy::default();
        assert!(check_eligibility(
            &verified(Role::DomesticUser),
            Action::Mint,
            Some(Decimal::from(1_000_000)),
            &policy
        )
        .is_allowed());
    }
}
