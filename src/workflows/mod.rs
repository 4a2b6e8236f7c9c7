// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Settlement Workflows
//!
//! State machines for trade intents, mint and redemption requests, and
//! loans. Every workflow follows the same shape:
//!
//! 1. **Claim**: one write transaction re-reads the acting account, runs the
//!    compliance gate, checks the expected status and records the claim
//! 2. **Ledger call**: awaited outside any transaction
//! 3. **Finalize**: a second write transaction records the outcome and its
//!    audit record
//!
//! A status mismatch in either transaction aborts it and surfaces
//! `StateConflict`. Ledger failures always leave a durable FAILED record.

pub mod loans;
pub mod minting;
pub mod reconciliation;
pub mod redemption;
pub mod trading;

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::compliance::{check_eligibility, Action, Eligibility};
use crate::config::SettlementPolicy;
use crate::error::{SettlementError, SettlementResult};
use crate::ledger::LedgerAdapter;
use crate::storage::repository::{Account, OwnedRecord};
use crate::storage::{RecordReader, SettlementDb};

pub use loans::{LoanTerms, LoanWorkflow};
pub use minting::MintWorkflow;
pub use reconciliation::{ReconciliationReport, Reconciler};
pub use redemption::RedemptionWorkflow;
pub use trading::TradingEngine;

/// Actor id recorded for transitions made by the background sweeper.
pub const SYSTEM_ACTOR: &str = "system";

/// Shared collaborators for every workflow.
#[derive(Clone)]
pub struct WorkflowContext {
    pub db: Arc<SettlementDb>,
    pub ledger: Arc<dyn LedgerAdapter>,
    pub policy: SettlementPolicy,
}

impl WorkflowContext {
    pub fn new(
        db: Arc<SettlementDb>,
        ledger: Arc<dyn LedgerAdapter>,
        policy: SettlementPolicy,
    ) -> Self {
        Self { db, ledger, policy }
    }

    pub fn accounts(&self) -> crate::compliance::AccountService<'_> {
        crate::compliance::AccountService::new(self)
    }

    pub fn trading(&self) -> TradingEngine<'_> {
        TradingEngine::new(self)
    }

    pub fn minting(&self) -> MintWorkflow<'_> {
        MintWorkflow::new(self)
    }

    pub fn redemptions(&self) -> RedemptionWorkflow<'_> {
        RedemptionWorkflow::new(self)
    }

    pub fn loans(&self) -> LoanWorkflow<'_> {
        LoanWorkflow::new(self)
    }

    pub fn reconciler(&self) -> Reconciler<'_> {
        Reconciler::new(self)
    }

    /// Current ledger balance of an address.
    pub(crate) async fn balance_of(&self, address: &str) -> SettlementResult<Decimal> {
        Ok(self.ledger.balance(address).await?)
    }
}

// =============================================================================
// Guards shared by all workflows
// =============================================================================

/// Load an account and run the compliance gate on the fresh snapshot.
pub(crate) fn require_eligible(
    reader: &impl RecordReader,
    account_id: &str,
    action: Action,
    notional: Option<Decimal>,
    policy: &SettlementPolicy,
) -> SettlementResult<Account> {
    let account: Account = reader.require(account_id)?;
    match check_eligibility(&account, action, notional, policy) {
        Eligibility::Allowed => Ok(account),
        Eligibility::Denied(reason) => Err(SettlementError::ComplianceDenied(reason)),
    }
}

/// Load the acting account and verify its stored role is admin.
pub(crate) fn require_admin(reader: &impl RecordReader, admin_id: &str) -> SettlementResult<Account> {
    let account: Option<Account> = reader.get(admin_id)?;
    match account {
        Some(account) if account.is_admin() => Ok(account),
        _ => Err(SettlementError::Forbidden(format!(
            "account {admin_id} is not an administrator"
        ))),
    }
}

/// The account's linked custody address.
pub(crate) fn require_custody_address(account: &Account) -> SettlementResult<String> {
    account.custody_address.clone().ok_or_else(|| {
        SettlementError::Validation(
            "link a custody address to the account before moving tokens".to_string(),
        )
    })
}

pub(crate) fn ensure_owner<R: OwnedRecord>(
    record: &R,
    account_id: &str,
    what: &str,
) -> SettlementResult<()> {
    if record.is_owned_by(account_id) {
        Ok(())
    } else {
        Err(SettlementError::Forbidden(format!(
            "{what} belongs to another account"
        )))
    }
}

pub(crate) fn ensure_positive(value: Decimal, field: &str) -> SettlementResult<()> {
    if value > Decimal::ZERO {
        Ok(())
    } else {
        Err(SettlementError::Validation(format!(
            "{field} must be greater than zero"
        )))
    }
}

/// Unwrap a checked decimal operation. Overflow on client-supplied amounts
/// is a validation failure.
pub(crate) fn checked(value: Option<Decimal>) -> SettlementResult<Decimal> {
    value.ok_or_else(|| SettlementError::Validation("amount too large".to_string()))
}

/// Overflow-checked sum.
pub(crate) fn checked_sum(values: impl IntoIterator<Item = Decimal>) -> SettlementResult<Decimal> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |total, value| checked(total.checked_add(value)))
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fixtures shared by workflow tests.

    use super::*;
    use crate::auth::Role;
    use crate::ledger::SandboxLedger;
    use crate::storage::repository::{AmlStatus, KycStatus};

    pub struct Harness {
        pub ctx: WorkflowContext,
        pub ledger: Arc<SandboxLedger>,
        _dir: tempfile::TempDir,
    }

    impl Harness {
        pub fn new() -> Self {
            Self::with_policy(SettlementPolicy::default())
        }

        pub fn with_policy(policy: SettlementPolicy) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let db = Arc::new(SettlementDb::open(&dir.path().join("wf.redb")).unwrap());
            let ledger = Arc::new(SandboxLedger::new());
            let ctx = WorkflowContext::new(db, ledger.clone(), policy);
            Self {
                ctx,
                ledger,
                _dir: dir,
            }
        }

        /// A verified, cleared account with custody address `G-{id}`.
        pub fn verified(&self, id: &str, role: Role) -> Account {
            let mut account = Account::new(id, role);
            account.kyc_status = KycStatus::Verified;
            account.aml_status = AmlStatus::Cleared;
            account.custody_address = Some(format!("G-{id}"));
            self.ctx.db.write(|s| s.insert(&account)).unwrap();
            account
        }

        pub fn admin(&self, id: &str) -> Account {
            let account = Account::seeded_admin(id);
            self.ctx.db.write(|s| s.insert(&account)).unwrap();
            account
        }

        pub fn update_account(&self, account: &Account) {
            self.ctx.db.write(|s| s.update(account)).unwrap();
        }

        pub fn audit_actions(&self) -> Vec<crate::storage::AuditAction> {
            self.ctx
                .db
                .read(|s| s.audit_records())
                .unwrap()
                .into_iter()
                .map(|r| r.action)
                .collect()
        }
    }
}
