// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account records: role, compliance status and linked custody address.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::Role;
use crate::storage::database::{
    DbResult, RecordReader, RecordTable, SettlementDb, StoredRecord,
};
use redb::TableDefinition;

/// KYC verification status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KycStatus {
    NotStarted,
    InReview,
    Verified,
    Rejected,
}

/// AML screening status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AmlStatus {
    Pending,
    Cleared,
    Flagged,
    Blocked,
}

impl AmlStatus {
    /// Flagged and blocked accounts may not move money.
    pub fn blocks_money_movement(&self) -> bool {
        matches!(self, AmlStatus::Flagged | AmlStatus::Blocked)
    }
}

/// Persisted account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Account {
    /// Account identifier (token `sub`).
    pub account_id: String,
    /// Stored role; authoritative over the token role.
    pub role: Role,
    pub kyc_status: KycStatus,
    pub aml_status: AmlStatus,
    /// Ledger account that receives minted and purchased tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custody_address: Option<String>,
    /// Reason recorded with the latest AML change.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aml_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// A freshly registered account with no compliance progress.
    pub fn new(account_id: impl Into<String>, role: Role) -> Self {
        let now = Utc::now();
        Self {
            account_id: account_id.into(),
            role,
            kyc_status: KycStatus::NotStarted,
            aml_status: AmlStatus::Pending,
            custody_address: None,
            aml_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A seeded admin: verified and cleared from the start.
    pub fn seeded_admin(account_id: impl Into<String>) -> Self {
        let mut account = Self::new(account_id, Role::Admin);
        account.kyc_status = KycStatus::Verified;
        account.aml_status = AmlStatus::Cleared;
        account
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl StoredRecord for Account {
    const TABLE: RecordTable = TableDefinition::new("accounts");
    const KIND: &'static str = "Account";

    fn record_id(&self) -> &str {
        &self.account_id
    }
}

/// Read-side queries over accounts.
pub struct AccountRepository<'a> {
    db: &'a SettlementDb,
}

impl<'a> AccountRepository<'a> {
    pub fn new(db: &'a SettlementDb) -> Self {
        Self { db }
    }

    /// Get account by ID.
    pub fn get(&self, account_id: &str) -> DbResult<Account> {
        self.db.read(|scope| scope.require(account_id))
    }

    /// Account currently holding a custody address, if any.
    pub fn find_by_custody_address(&self, address: &str) -> DbResult<Option<Account>> {
        self.db.read(|scope| find_by_custody_address(scope, address))
    }
}

/// Account currently holding a custody address, within an open scope.
pub fn find_by_custody_address(
    reader: &impl RecordReader,
    address: &str,
) -> DbResult<Option<Account>> {
    let mut found =
        reader.scan::<Account>(|a| a.custody_address.as_deref() == Some(address))?;
    Ok(found.pop())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_account_starts_unverified() {
        let account = Account::new("acct", Role::DomesticUser);
        assert_eq!(account.kyc_status, KycStatus::NotStarted);
        assert_eq!(account.aml_status, AmlStatus::Pending);
        assert!(!account.is_admin());
    }

    #[test]
    fn seeded_admin_is_verified() {
        let admin = Account::seeded_admin("root");
        assert!(admin.is_admin());
        assert_eq!(admin.kyc_status, KycStatus::Verified);
        assert_eq!(admin.aml_status, AmlStatus::Cleared);
    }

    #[test]
    fn find_by_custody_address_scans_accounts() {
        let dir = tempfile::tempdir().unwrap();
        let db = SettlementDb::open(&dir.path().join("accounts.redb")).unwrap();
        let mut account = Account::new("acct", Role::User);
        account.custody_address = Some("G-ADDR".to_string());
        db.write(|scope| scope.insert(&account)).unwrap();

        let repo = AccountRepository::new(&db);
        let found = repo.find_by_custody_address("G-ADDR").unwrap().unwrap();
        assert_eq!(found.account_id, "acct");
        assert!(repo.find_by_custody_address("G-OTHER").unwrap().is_none());
    }
}
