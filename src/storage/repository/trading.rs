// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Trade intent and trade records.

use chrono::{DateTime, Utc};
use redb::TableDefinition;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::OwnedRecord;
use crate::storage::database::{DbResult, RecordReader, RecordTable, SettlementDb, StoredRecord};

/// Intent side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentSide {
    Buy,
    Sell,
}

impl IntentSide {
    pub fn opposite(&self) -> IntentSide {
        match self {
            IntentSide::Buy => IntentSide::Sell,
            IntentSide::Sell => IntentSide::Buy,
        }
    }
}

/// Trade intent lifecycle. Only `Pending` may transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentStatus {
    Pending,
    Executed,
    Cancelled,
    Expired,
}

/// A limit order to buy or sell tokens.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TradeIntent {
    pub intent_id: String,
    pub owner_id: String,
    pub side: IntentSide,
    /// Token quantity (grams).
    pub quantity: Decimal,
    /// Limit price per token.
    pub limit_price: Decimal,
    pub status: IntentStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TradeIntent {
    /// Expired once `now` reaches `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether this intent's price crosses `other`'s.
    pub fn crosses(&self, other: &TradeIntent) -> bool {
        match self.side {
            IntentSide::Buy => self.limit_price >= other.limit_price,
            IntentSide::Sell => other.limit_price >= self.limit_price,
        }
    }
}

impl StoredRecord for TradeIntent {
    const TABLE: RecordTable = TableDefinition::new("trade_intents");
    const KIND: &'static str = "Trade intent";

    fn record_id(&self) -> &str {
        &self.intent_id
    }
}

impl OwnedRecord for TradeIntent {
    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

/// Trade lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeStatus {
    /// Claimed, ledger transfer in flight.
    Pending,
    Executed,
    Failed,
    Cancelled,
}

/// Two matched intents.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Trade {
    pub trade_id: String,
    pub buy_intent_id: String,
    pub sell_intent_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub quantity: Decimal,
    pub execution_price: Decimal,
    pub status: TradeStatus,
    /// Ledger reference of the settling transfer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trade {
    pub fn involves(&self, account_id: &str) -> bool {
        self.buyer_id == account_id || self.seller_id == account_id
    }
}

impl StoredRecord for Trade {
    const TABLE: RecordTable = TableDefinition::new("trades");
    const KIND: &'static str = "Trade";

    fn record_id(&self) -> &str {
        &self.trade_id
    }
}

/// Read-side queries over intents and trades.
pub struct TradingRepository<'a> {
    db: &'a SettlementDb,
}

impl<'a> TradingRepository<'a> {
    pub fn new(db: &'a SettlementDb) -> Self {
        Self { db }
    }

    /// Intents owned by an account, newest first.
    pub fn list_intents(&self, owner_id: &str) -> DbResult<Vec<TradeIntent>> {
        let mut intents = self
            .db
            .read(|scope| scope.scan::<TradeIntent>(|i| i.owner_id == owner_id))?;
        intents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(intents)
    }

    /// Trades where the account is buyer or seller, newest first.
    pub fn list_trades(&self, account_id: &str) -> DbResult<Vec<Trade>> {
        let mut trades = self
            .db
            .read(|scope| scope.scan::<Trade>(|t| t.involves(account_id)))?;
        trades.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(trades)
    }
}
