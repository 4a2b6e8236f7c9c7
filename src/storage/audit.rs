// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Append-only audit trail for settlement state transitions.
//!
//! Every status change is recorded in the same redb write transaction as
//! the change itself, so the trail can never disagree with the entity
//! tables. Records are never mutated or deleted; no workflow reads them
//! back to make decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::database::{DbResult, SettlementDb};

/// Auditable actions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    // Account and compliance events
    AccountRegistered,
    KycSubmitted,
    KycApproved,
    KycRejected,
    AmlFlagRaised,
    AmlCleared,
    CustodyLinked,

    // Trading events
    IntentSubmitted,
    IntentCancelled,
    IntentExpired,
    TradeExecuted,
    TradeFailed,

    // Vault and pricing events
    CustodyAssetRegistered,
    ReferencePriceChanged,
    MintingPaused,
    MintingResumed,

    // Mint events
    MintRequested,
    PriceLockRenewed,
    PriceLockExpired,
    MintApproved,
    MintExecuted,
    MintFailed,
    MintRejected,

    // Redemption events
    RedemptionRequested,
    RedemptionApproved,
    RedemptionFulfilled,
    RedemptionDispatched,
    RedemptionRejected,

    // Loan events
    LoanApplied,
    LoanApproved,
    LoanRejected,
    LoanActivated,
    LoanRepaid,
    LoanLiquidated,
}

impl std::str::FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_ascii_uppercase()))
            .map_err(|_| format!("unknown audit action: {s}"))
    }
}

/// A single audit trail entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditRecord {
    /// Unique record ID.
    pub record_id: String,
    /// When the transition happened.
    pub timestamp: DateTime<Utc>,
    /// Account that caused the transition (the system sweeper uses `system`).
    pub actor_id: String,
    /// What happened.
    pub action: AuditAction,
    /// Entity the transition applies to.
    pub reference_id: String,
    /// Free-form details.
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    /// Whether the underlying operation succeeded.
    pub success: bool,
    /// Error message for failed operations.
    pub error: Option<String>,
}

impl AuditRecord {
    pub fn new(
        action: AuditAction,
        actor_id: impl Into<String>,
        reference_id: impl Into<String>,
    ) -> Self {
        Self {
            record_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            actor_id: actor_id.into(),
            action,
            reference_id: reference_id.into(),
            details: None,
            success: true,
            error: None,
        }
    }

    /// Add details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark as failed with error message.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

/// Filters for listing the audit trail.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub actor_id: Option<String>,
    pub reference_id: Option<String>,
    pub action: Option<AuditAction>,
    pub limit: usize,
    pub offset: usize,
}

impl AuditQuery {
    fn matches(&self, record: &AuditRecord) -> bool {
        self.actor_id.as_deref().is_none_or(|a| a == record.actor_id)
            && self
                .reference_id
                .as_deref()
                .is_none_or(|r| r == record.reference_id)
            && self.action.is_none_or(|a| a == record.action)
    }
}

/// Read side of the audit trail.
pub struct AuditRepository<'a> {
    db: &'a SettlementDb,
}

impl<'a> AuditRepository<'a> {
    pub fn new(db: &'a SettlementDb) -> Self {
        Self { db }
    }

    /// List matching records, newest first. Returns the page and the total match count.
    pub fn query(&self, query: &AuditQuery) -> DbResult<(Vec<AuditRecord>, usize)> {
        let records = self.db.read(|scope| scope.audit_records())?;
        let matching: Vec<AuditRecord> = records.into_iter().filter(|r| query.matches(r)).collect();
        let total = matching.len();
        let page = matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect();
        Ok((page, total))
    }
}
