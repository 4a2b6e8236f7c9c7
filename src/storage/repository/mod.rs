// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Entity records and read-side repositories over the settlement database.
//!
//! Records implement [`StoredRecord`](super::database::StoredRecord) and are
//! mutated only by workflows inside write transactions. The repositories
//! here serve listings for the HTTP layer.

pub mod accounts;
pub mod custody;
pub mod loans;
pub mod redemptions;
pub mod settings;
pub mod trading;

pub use accounts::{Account, AccountRepository, AmlStatus, KycStatus};
pub use custody::{
    CustodyAsset, CustodyRepository, MintRequest, MintStatus, PriceLock, PriceLockStatus,
    VaultInventory,
};
pub use loans::{LoanRepository, LoanRequest, LoanStatus};
pub use redemptions::{RedemptionRepository, RedemptionRequest, RedemptionStatus};
pub use trading::{IntentSide, IntentStatus, Trade, TradeIntent, TradeStatus, TradingRepository};

/// Records owned by a single account.
pub trait OwnedRecord {
    fn owner_id(&self) -> &str;

    fn is_owned_by(&self, account_id: &str) -> bool {
        self.owner_id() == account_id
    }
}
