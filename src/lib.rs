// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Silver Settlement - Compliance-Gated Tokenized Silver Settlement Service
//!
//! This crate runs the settlement state machines for custodial tokenized
//! silver: trade intents and matching, custody-backed minting with price
//! locks, physical redemption, and silver-collateralised loans. Every money
//! movement passes a KYC/AML gate, and every status transition is written
//! to an embedded ACID store together with its audit record.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Bearer JWT authentication and roles
//! - `compliance` - Account lifecycle and the eligibility gate
//! - `ledger` - Token ledger adapter (HTTP gateway or sandbox)
//! - `storage` - Embedded redb database and audit trail
//! - `sweeper` - Background expiry of intents and price locks
//! - `workflows` - Trading, minting, redemption, loan and reconciliation workflows

pub mod api;
pub mod auth;
pub mod compliance;
pub mod config;
pub mod error;
pub mod ledger;
pub mod state;
pub mod storage;
pub mod sweeper;
pub mod workflows;

#[cfg(test)]
mod test_support;
