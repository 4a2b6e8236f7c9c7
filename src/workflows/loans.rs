// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Silver-collateralised loans.
//!
//! Applications are checked against the loan-to-value cap at the current
//! reference price. Every later transition is admin-only; disbursement and
//! collateral movement happen outside this service.

use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use serde_json::json;
use tracing::info;
use utoipa::ToSchema;

use super::{checked, ensure_positive, require_admin, require_eligible, WorkflowContext};
use crate::compliance::Action;
use crate::config::SettlementPolicy;
use crate::error::{SettlementError, SettlementResult};
use crate::storage::repository::settings;
use crate::storage::repository::{LoanRequest, LoanStatus};
use crate::storage::{AuditAction, AuditRecord, RecordReader};

/// Quote for a prospective loan.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoanTerms {
    pub collateral_grams: Decimal,
    pub price_per_gram: Decimal,
    pub collateral_value: Decimal,
    pub max_ltv: Decimal,
    pub max_loan_amount: Decimal,
    pub requested_amount: Decimal,
    /// Whether `requested_amount` fits under the cap.
    pub within_limit: bool,
    pub annual_rate: Decimal,
    pub term_months: u32,
    pub monthly_payment: Decimal,
}

impl LoanTerms {
    pub fn quote(
        collateral_grams: Decimal,
        requested_amount: Decimal,
        price_per_gram: Decimal,
        policy: &SettlementPolicy,
    ) -> SettlementResult<Self> {
        let collateral_value = checked(collateral_grams.checked_mul(price_per_gram))?;
        let max_loan_amount = checked(collateral_value.checked_mul(policy.max_ltv))?;
        Ok(Self {
            collateral_grams,
            price_per_gram,
            collateral_value,
            max_ltv: policy.max_ltv,
            max_loan_amount,
            requested_amount,
            within_limit: requested_amount <= max_loan_amount,
            annual_rate: policy.loan_annual_rate,
            term_months: policy.loan_term_months,
            monthly_payment: monthly_payment(
                requested_amount,
                policy.loan_annual_rate,
                policy.loan_term_months,
            )?,
        })
    }
}

/// Level payment of an amortising loan, rounded to cents.
fn monthly_payment(
    principal: Decimal,
    annual_rate: Decimal,
    months: u32,
) -> SettlementResult<Decimal> {
    if months == 0 || principal <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }
    let n = Decimal::from(months);
    let rate = annual_rate / Decimal::from(12);
    let payment = if rate.is_zero() {
        principal / n
    } else {
        let factor = checked(Decimal::ONE.checked_add(rate))?;
        let mut growth = Decimal::ONE;
        for _ in 0..months {
            growth = checked(growth.checked_mul(factor))?;
        }
        let interest = checked(principal.checked_mul(rate))?;
        let numerator = checked(interest.checked_mul(growth))?;
        checked(numerator.checked_div(growth - Decimal::ONE))?
    };
    Ok(payment.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

pub struct LoanWorkflow<'a> {
    ctx: &'a WorkflowContext,
}

impl<'a> LoanWorkflow<'a> {
    pub fn new(ctx: &'a WorkflowContext) -> Self {
        Self { ctx }
    }

    /// Quote terms at the current reference price.
    pub fn terms(&self, collateral_grams: Decimal, requested_amount: Decimal) -> SettlementResult<LoanTerms> {
        ensure_positive(collateral_grams, "collateral grams")?;
        if requested_amount < Decimal::ZERO {
            return Err(SettlementError::Validation(
                "requested amount must not be negative".to_string(),
            ));
        }
        let policy = &self.ctx.policy;
        let price = self
            .ctx
            .db
            .read(|scope| settings::reference_price(scope, policy.default_reference_price))?;
        LoanTerms::quote(collateral_grams, requested_amount, price, policy)
    }

    /// File an application. Nothing is stored when the LTV cap is exceeded.
    pub fn apply(
        &self,
        account_id: &str,
        collateral_grams: Decimal,
        requested_amount: Decimal,
    ) -> SettlementResult<LoanRequest> {
        ensure_positive(collateral_grams, "collateral grams")?;
        ensure_positive(requested_amount, "requested amount")?;
        let policy = &self.ctx.policy;

        let loan = self.ctx.db.write(|scope| {
            require_eligible(scope, account_id, Action::Loan, None, policy)?;
            let price = settings::reference_price(scope, policy.default_reference_price)?;
            let terms = LoanTerms::quote(collateral_grams, requested_amount, price, policy)?;
            if !terms.within_limit {
                return Err(SettlementError::LtvExceeded {
                    requested: requested_amount,
                    max_amount: terms.max_loan_amount,
                });
            }

            let now = Utc::now();
            let loan = LoanRequest {
                loan_id: uuid::Uuid::new_v4().to_string(),
                owner_id: account_id.to_string(),
                collateral_grams,
                requested_amount,
                price_per_gram: price,
                status: LoanStatus::PendingApproval,
                decision_reason: None,
                created_at: now,
                updated_at: now,
            };
            scope.insert(&loan)?;
            scope.append_audit(
                &AuditRecord::new(AuditAction::LoanApplied, account_id, &loan.loan_id)
                    .with_details(json!({
                        "collateral_grams": collateral_grams,
                        "requested_amount": requested_amount,
                        "price_per_gram": price,
                        "max_loan_amount": terms.max_loan_amount,
                    })),
            )?;
            Ok(loan)
        })?;

        info!(
            loan_id = %loan.loan_id,
            account_id,
            %collateral_grams,
            %requested_amount,
            "loan application filed"
        );
        Ok(loan)
    }

    pub fn approve(&self, admin_id: &str, loan_id: &str, note: Option<String>) -> SettlementResult<LoanRequest> {
        self.transition(
            admin_id,
            loan_id,
            &[LoanStatus::PendingApproval],
            LoanStatus::Approved,
            note,
        )
    }

    pub fn reject(&self, admin_id: &str, loan_id: &str, reason: Option<String>) -> SettlementResult<LoanRequest> {
        self.transition(
            admin_id,
            loan_id,
            &[LoanStatus::PendingApproval],
            LoanStatus::Rejected,
            reason,
        )
    }

    /// APPROVED → ACTIVE once funds have been disbursed externally.
    pub fn activate(&self, admin_id: &str, loan_id: &str) -> SettlementResult<LoanRequest> {
        self.transition(admin_id, loan_id, &[LoanStatus::Approved], LoanStatus::Active, None)
    }

    pub fn mark_repaid(&self, admin_id: &str, loan_id: &str) -> SettlementResult<LoanRequest> {
        self.transition(admin_id, loan_id, &[LoanStatus::Active], LoanStatus::Repaid, None)
    }

    pub fn liquidate(&self, admin_id: &str, loan_id: &str, reason: Option<String>) -> SettlementResult<LoanRequest> {
        self.transition(
            admin_id,
            loan_id,
            &[LoanStatus::Active],
            LoanStatus::Liquidated,
            reason,
        )
    }

    fn transition(
        &self,
        admin_id: &str,
        loan_id: &str,
        from: &[LoanStatus],
        to: LoanStatus,
        reason: Option<String>,
    ) -> SettlementResult<LoanRequest> {
        let policy = &self.ctx.policy;
        let loan = self.ctx.db.write(|scope| {
            require_admin(scope, admin_id)?;
            let mut loan: LoanRequest = scope.require(loan_id)?;
            if !from.contains(&loan.status) {
                return Err(SettlementError::invalid_state("Loan request", loan_id, loan.status));
            }
            if matches!(to, LoanStatus::Approved | LoanStatus::Active) {
                require_eligible(scope, &loan.owner_id, Action::Loan, None, policy)?;
            }

            let previous = loan.status;
            loan.status = to;
            if reason.is_some() {
                loan.decision_reason = reason.clone();
            }
            loan.updated_at = Utc::now();
            scope.update(&loan)?;

            let action = match to {
                LoanStatus::Approved => AuditAction::LoanApproved,
                LoanStatus::Rejected => AuditAction::LoanRejected,
                LoanStatus::Active => AuditAction::LoanActivated,
                LoanStatus::Repaid => AuditAction::LoanRepaid,
                LoanStatus::Liquidated => AuditAction::LoanLiquidated,
                LoanStatus::PendingApproval => AuditAction::LoanApplied,
            };
            scope.append_audit(
                &AuditRecord::new(action, admin_id, loan_id).with_details(json!({
                    "from": previous,
                    "to": to,
                    "reason": reason,
                })),
            )?;
            Ok(loan)
        })?;

        info!(loan_id, admin_id, status = ?loan.status, "loan status changed");
        Ok(loan)
    }
}
