// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Settlement Storage
//!
//! Persistent state lives in a single redb file (`{DATA_DIR}/settlement.redb`).
//!
//! ## Layout
//!
//! ```text
//! settlement.redb
//!   accounts, trade_intents, trades,
//!   custody_assets, price_locks, mint_requests,
//!   redemption_requests, loan_requests      # id -> JSON record
//!   asset_reservations                      # asset id -> mint id
//!   intent_claims                           # intent id -> trade id
//!   redemption_claims                       # redemption id -> admin id
//!   settings                                # key -> value
//!   audit_log                               # sequence -> JSON record
//! ```
//!
//! Every guarded status transition is a single write transaction: read the
//! current status, compare, write the new state plus its audit record.

pub mod audit;
pub mod database;
pub mod repository;

pub use audit::{AuditAction, AuditQuery, AuditRecord, AuditRepository};
pub use database::{DbError, DbResult, RecordReader, SettlementDb, WriteScope};
