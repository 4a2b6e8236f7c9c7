// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Settings are loaded from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Directory holding `settlement.redb` | `./data` |
//! | `AUTH_JWT_SECRET` | HS256 secret for bearer tokens | Required unless built with `dev` |
//! | `AUTH_ISSUER` | Expected JWT issuer claim | Optional |
//! | `LEDGER_URL` | Ledger gateway base URL; unset selects the sandbox ledger | Unset |
//! | `LEDGER_TIMEOUT_SECS` | Per-call ledger timeout | `15` |
//! | `SWEEP_INTERVAL_SECS` | Expiry sweep period | `60` |
//! | `INTENT_TTL_SECS` | Trade intent horizon | `86400` |
//! | `PRICE_LOCK_TTL_SECS` | Price lock horizon | `900` |
//! | `REFERENCE_PRICE` | Initial silver price per gram | `75.00` |
//! | `MAX_LTV` | Loan-to-value cap | `0.5` |
//! | `DOMESTIC_TRADE_LIMIT` | Per-trade notional ceiling, domestic accounts | `1000` |
//! | `INTERNATIONAL_TRADE_LIMIT` | Per-trade notional ceiling, international accounts | `5000` |
//! | `SEED_ADMIN_IDS` | Comma-separated account ids created as admins | Unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use url::Url;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const AUTH_JWT_SECRET_ENV: &str = "AUTH_JWT_SECRET";
pub const AUTH_ISSUER_ENV: &str = "AUTH_ISSUER";
pub const LEDGER_URL_ENV: &str = "LEDGER_URL";
pub const LEDGER_TIMEOUT_ENV: &str = "LEDGER_TIMEOUT_SECS";
pub const SWEEP_INTERVAL_ENV: &str = "SWEEP_INTERVAL_SECS";
pub const INTENT_TTL_ENV: &str = "INTENT_TTL_SECS";
pub const PRICE_LOCK_TTL_ENV: &str = "PRICE_LOCK_TTL_SECS";
pub const REFERENCE_PRICE_ENV: &str = "REFERENCE_PRICE";
pub const MAX_LTV_ENV: &str = "MAX_LTV";
pub const DOMESTIC_LIMIT_ENV: &str = "DOMESTIC_TRADE_LIMIT";
pub const INTERNATIONAL_LIMIT_ENV: &str = "INTERNATIONAL_TRADE_LIMIT";
pub const SEED_ADMIN_IDS_ENV: &str = "SEED_ADMIN_IDS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Database file name inside `DATA_DIR`.
pub const DB_FILE_NAME: &str = "settlement.redb";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Business parameters passed explicitly to every workflow.
#[derive(Debug, Clone)]
pub struct SettlementPolicy {
    pub intent_ttl: chrono::Duration,
    pub price_lock_ttl: chrono::Duration,
    /// Used until an admin sets a price.
    pub default_reference_price: Decimal,
    pub max_ltv: Decimal,
    pub domestic_trade_limit: Decimal,
    pub international_trade_limit: Decimal,
    /// Annual interest quoted by the loan terms calculator.
    pub loan_annual_rate: Decimal,
    pub loan_term_months: u32,
}

impl Default for SettlementPolicy {
    fn default() -> Self {
        Self {
            intent_ttl: chrono::Duration::hours(24),
            price_lock_ttl: chrono::Duration::minutes(15),
            default_reference_price: Decimal::new(7500, 2),
            max_ltv: Decimal::new(5, 1),
            domestic_trade_limit: Decimal::from(1000),
            international_trade_limit: Decimal::from(5000),
            loan_annual_rate: Decimal::new(5, 2),
            loan_term_months: 12,
        }
    }
}

/// Process configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub jwt_secret: Option<String>,
    pub issuer: Option<String>,
    pub ledger_url: Option<Url>,
    pub ledger_timeout: Duration,
    pub sweep_interval: Duration,
    pub seed_admin_ids: Vec<String>,
    pub policy: SettlementPolicy,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load settings through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let jwt_secret = get(AUTH_JWT_SECRET_ENV);
        if jwt_secret.is_none() && !cfg!(feature = "dev") {
            return Err(ConfigError::Missing(AUTH_JWT_SECRET_ENV));
        }

        let ledger_url = get(LEDGER_URL_ENV)
            .map(|raw| gateway_base(&raw))
            .transpose()?;

        let defaults = SettlementPolicy::default();
        let policy = SettlementPolicy {
            intent_ttl: chrono::Duration::seconds(parse_or(
                get(INTENT_TTL_ENV),
                INTENT_TTL_ENV,
                86_400i64,
            )?),
            price_lock_ttl: chrono::Duration::seconds(parse_or(
                get(PRICE_LOCK_TTL_ENV),
                PRICE_LOCK_TTL_ENV,
                900i64,
            )?),
            default_reference_price: positive(parse_or(
                get(REFERENCE_PRICE_ENV),
                REFERENCE_PRICE_ENV,
                defaults.default_reference_price,
            )?, REFERENCE_PRICE_ENV)?,
            max_ltv: positive(
                parse_or(get(MAX_LTV_ENV), MAX_LTV_ENV, defaults.max_ltv)?,
                MAX_LTV_ENV,
            )?,
            domestic_trade_limit: positive(parse_or(
                get(DOMESTIC_LIMIT_ENV),
                DOMESTIC_LIMIT_ENV,
                defaults.domestic_trade_limit,
            )?, DOMESTIC_LIMIT_ENV)?,
            international_trade_limit: positive(parse_or(
                get(INTERNATIONAL_LIMIT_ENV),
                INTERNATIONAL_LIMIT_ENV,
                defaults.international_trade_limit,
            )?, INTERNATIONAL_LIMIT_ENV)?,
            ..defaults
        };

        Ok(Self {
            host: get(HOST_ENV).unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(get(PORT_ENV), PORT_ENV, 8080u16)?,
            data_dir: PathBuf::from(get(DATA_DIR_ENV).unwrap_or_else(|| "./data".to_string())),
            jwt_secret,
            issuer: get(AUTH_ISSUER_ENV),
            ledger_url,
            ledger_timeout: Duration::from_secs(parse_or(
                get(LEDGER_TIMEOUT_ENV),
                LEDGER_TIMEOUT_ENV,
                15u64,
            )?),
            sweep_interval: Duration::from_secs(
                parse_or(get(SWEEP_INTERVAL_ENV), SWEEP_INTERVAL_ENV, 60u64)?.max(1),
            ),
            seed_admin_ids: get(SEED_ADMIN_IDS_ENV)
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|id| !id.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            policy,
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T>(raw: Option<String>, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Parse the ledger gateway URL as a directory, so relative endpoint paths
/// extend it instead of replacing its last segment.
fn gateway_base(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        var: LEDGER_URL_ENV,
        reason,
    };
    let mut url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(invalid("must be a hierarchical http(s) URL".to_string()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn positive(value: Decimal, var: &'static str) -> Result<Decimal, ConfigError> {
    if value > Decimal::ZERO {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            var,
            reason: "must be greater than zero".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_apply() {
        let settings = load(&[(AUTH_JWT_SECRET_ENV, "s3cret")]).unwrap();
        assert_eq!(settings.bind_addr(), "0.0.0.0:8080");
        assert_eq!(settings.db_path(), PathBuf::from("./data/settlement.redb"));
        assert!(settings.ledger_url.is_none());
        assert_eq!(settings.ledger_timeout, Duration::from_secs(15));
        assert_eq!(settings.policy.intent_ttl, chrono::Duration::hours(24));
        assert_eq!(settings.policy.price_lock_ttl, chrono::Duration::minutes(15));
        assert_eq!(settings.policy.default_reference_price, Decimal::new(7500, 2));
        assert_eq!(settings.policy.max_ltv, Decimal::new(5, 1));
        assert!(settings.seed_admin_ids.is_empty());
    }

    #[test]
    fn overrides_parse() {
        let settings = load(&[
            (AUTH_JWT_SECRET_ENV, "s3cret"),
            (PORT_ENV, "9090"),
            (LEDGER_URL_ENV, "http://ledger.internal:7000/"),
            (REFERENCE_PRICE_ENV, "81.25"),
            (SEED_ADMIN_IDS_ENV, "root, ops ,,"),
        ])
        .unwrap();
        assert_eq!(settings.port, 9090);
        assert_eq!(
            settings.ledger_url.unwrap().as_str(),
            "http://ledger.internal:7000/"
        );
        assert_eq!(settings.policy.default_reference_price, Decimal::new(8125, 2));
        assert_eq!(settings.seed_admin_ids, vec!["root", "ops"]);
    }

    #[test]
    fn ledger_url_keeps_its_path_prefix() {
        let settings = load(&[
            (AUTH_JWT_SECRET_ENV, "s3cret"),
            (LEDGER_URL_ENV, "http://gw.internal/ledger"),
        ])
        .unwrap();
        let base = settings.ledger_url.unwrap();
        assert_eq!(base.as_str(), "http://gw.internal/ledger/");
        assert_eq!(base.join("mint").unwrap().as_str(), "http://gw.internal/ledger/mint");

        let err = load(&[(AUTH_JWT_SECRET_ENV, "s"), (LEDGER_URL_ENV, "mailto:ops@example.com")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: LEDGER_URL_ENV, .. }));
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = load(&[(AUTH_JWT_SECRET_ENV, "s"), (PORT_ENV, "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: PORT_ENV, .. }));

        let err = load(&[(AUTH_JWT_SECRET_ENV, "s"), (MAX_LTV_ENV, "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: MAX_LTV_ENV, .. }));
    }

    #[cfg(not(feature = "dev"))]
    #[test]
    fn secret_is_required() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(AUTH_JWT_SECRET_ENV)));
    }
}
