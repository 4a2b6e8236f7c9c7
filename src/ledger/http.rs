// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JSON client for an external ledger gateway.
//!
//! ## Gateway Contract
//!
//! | Method | Path | Body | Response |
//! |---|---|---|---|
//! | POST | `/mint` | `{address, amount, proof}` | `{tx_ref}` |
//! | POST | `/burn` | `{address, amount}` | `{tx_ref}` |
//! | POST | `/transfer` | `{from, to, amount}` | `{tx_ref}` |
//! | GET | `/balance/{address}` | | `{balance}` |
//! | GET | `/supply` | | `{total_supply}` |
//!
//! Paths are appended to the configured base URL segment by segment, so an
//! address is always a single percent-encoded segment. Mutating calls send
//! an `Idempotency-Key` header. `501` maps to
//! [`LedgerError::Unsupported`], other `4xx` to `Rejected`, `5xx` and
//! transport errors to `Unavailable`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use super::{LedgerAdapter, LedgerError, LedgerResult, ReservesProof, TxRef};

const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

#[derive(Serialize)]
struct MintBody<'a> {
    address: &'a str,
    amount: Decimal,
    proof: &'a ReservesProof,
}

#[derive(Serialize)]
struct BurnBody<'a> {
    address: &'a str,
    amount: Decimal,
}

#[derive(Serialize)]
struct TransferBody<'a> {
    from: &'a str,
    to: &'a str,
    amount: Decimal,
}

#[derive(Deserialize)]
struct TxResponse {
    tx_ref: String,
}

#[derive(Deserialize)]
struct BalanceResponse {
    balance: Decimal,
}

#[derive(Deserialize)]
struct SupplyResponse {
    total_supply: Decimal,
}

#[derive(Debug, Clone)]
pub struct HttpLedger {
    base_url: Url,
    http: Client,
}

impl HttpLedger {
    /// Build a client for the gateway at `base_url`.
    pub fn new(base_url: Url, timeout: Duration) -> LedgerResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { base_url, http })
    }

    fn endpoint(&self, segments: &[&str]) -> LedgerResult<Url> {
        if let Some(bad) = segments
            .iter()
            .find(|s| s.is_empty() || **s == "." || **s == "..")
        {
            return Err(LedgerError::Rejected(format!(
                "invalid ledger path segment {bad:?}"
            )));
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                LedgerError::InvalidResponse(format!(
                    "ledger base URL {} has no path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn post_tx<B: Serialize>(
        &self,
        path: &str,
        body: &B,
        idempotency_key: &str,
    ) -> LedgerResult<TxRef> {
        let response = self
            .http
            .post(self.endpoint(&[path])?)
            .header(IDEMPOTENCY_HEADER, idempotency_key)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        let parsed: TxResponse = decode(path, response).await?;
        debug!(path, tx_ref = %parsed.tx_ref, "ledger gateway accepted operation");
        Ok(parsed.tx_ref)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> LedgerResult<T> {
        let url = self.endpoint(segments)?;
        let path = url.path().to_string();
        let response = self.http.get(url).send().await.map_err(transport_error)?;
        decode(&path, response).await
    }
}

fn transport_error(e: reqwest::Error) -> LedgerError {
    LedgerError::Unavailable(e.to_string())
}

async fn decode<T: DeserializeOwned>(path: &str, response: Response) -> LedgerResult<T> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| LedgerError::InvalidResponse(format!("{path}: {e}")));
    }

    let detail = response.text().await.unwrap_or_default();
    warn!(path, status = %status, detail = %detail, "ledger gateway returned error");
    Err(match status {
        StatusCode::NOT_IMPLEMENTED => LedgerError::Unsupported(path.to_string()),
        s if s.is_client_error() => LedgerError::Rejected(format!("{status}: {detail}")),
        _ => LedgerError::Unavailable(format!("{status}: {detail}")),
    })
}

#[async_trait]
impl LedgerAdapter for HttpLedger {
    async fn mint(
        &self,
        address: &str,
        amount: Decimal,
        proof: &ReservesProof,
        idempotency_key: &str,
    ) -> LedgerResult<TxRef> {
        let body = MintBody {
            address,
            amount,
            proof,
        };
        self.post_tx("mint", &body, idempotency_key).await
    }

    async fn burn(
        &self,
        address: &str,
        amount: Decimal,
        idempotency_key: &str,
    ) -> LedgerResult<TxRef> {
        self.post_tx("burn", &BurnBody { address, amount }, idempotency_key)
            .await
    }

    async fn transfer(
        &self,
        from: &str,
        to: &str,
        amount: Decimal,
        idempotency_key: &str,
    ) -> LedgerResult<TxRef> {
        self.post_tx("transfer", &TransferBody { from, to, amount }, idempotency_key)
            .await
    }

    async fn balance(&self, address: &str) -> LedgerResult<Decimal> {
        let parsed: BalanceResponse = self.get_json(&["balance", address]).await?;
        Ok(parsed.balance)
    }

    async fn total_supply(&self) -> LedgerResult<Decimal> {
        let parsed: SupplyResponse = self.get_json(&["supply"]).await?;
        Ok(parsed.total_supply)
    }
}
