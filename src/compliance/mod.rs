// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Compliance gate and account administration.

pub mod accounts;
pub mod gate;

pub use accounts::AccountService;
pub use gate::{check_eligibility, trade_limit, Action, DenialReason, Eligibility};
