// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Runtime settings changed by admins: reference price and minting pause.
//!
//! Values fall back to the configured policy until an admin overrides them.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::storage::database::{DbError, DbResult, RecordReader, WriteScope, SETTINGS};

const REFERENCE_PRICE_KEY: &str = "reference_price";
const MINTING_PAUSED_KEY: &str = "minting_paused";

/// Current reference price per gram.
pub fn reference_price(reader: &impl RecordReader, default: Decimal) -> DbResult<Decimal> {
    match reader.lookup(SETTINGS, REFERENCE_PRICE_KEY)? {
        Some(raw) => Decimal::from_str(&raw)
            .map_err(|e| DbError::Corrupt(format!("reference price {raw:?}: {e}"))),
        None => Ok(default),
    }
}

pub fn set_reference_price(scope: &WriteScope<'_>, price: Decimal) -> DbResult<()> {
    scope.link(SETTINGS, REFERENCE_PRICE_KEY, &price.to_string())
}

/// Whether new mint intents are refused.
pub fn minting_paused(reader: &impl RecordReader) -> DbResult<bool> {
    Ok(reader.lookup(SETTINGS, MINTING_PAUSED_KEY)?.as_deref() == Some("true"))
}

pub fn set_minting_paused(scope: &WriteScope<'_>, paused: bool) -> DbResult<()> {
    scope.link(SETTINGS, MINTING_PAUSED_KEY, if paused { "true" } else { "false" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SettlementDb;

    #[test]
    fn settings_default_then_override() {
        let dir = tempfile::tempdir().unwrap();
        let db = SettlementDb::open(&dir.path().join("settings.redb")).unwrap();
        let default = Decimal::new(7500, 2);

        assert_eq!(db.read(|s| reference_price(s, default)).unwrap(), default);
        assert!(!db.read(|s| minting_paused(s)).unwrap());

        db.write(|s| {
            set_reference_price(s, Decimal::new(8125, 2))?;
            set_minting_paused(s, true)
        })
        .unwrap();

        assert_eq!(
            db.read(|s| reference_price(s, default)).unwrap(),
            Decimal::new(8125, 2)
        );
        assert!(db.read(|s| minting_paused(s)).unwrap());
    }
}
