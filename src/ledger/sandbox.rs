// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process sandbox ledger.
//!
//! Keeps balances and total supply in memory. Replays of an idempotency key
//! return the original transaction reference without applying the
//! operation twice. Only the most recent [`DEFAULT_REPLAY_CAPACITY`] keys are
//! remembered. Failures and latency can be injected per operation.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::debug;

use super::{LedgerAdapter, LedgerError, LedgerResult, ReservesProof, TxRef};

/// Ledger operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerOp {
    Mint,
    Burn,
    Transfer,
    Balance,
    TotalSupply,
}

/// Idempotency keys remembered for replay.
pub const DEFAULT_REPLAY_CAPACITY: usize = 10_000;

struct SandboxState {
    balances: HashMap<String, Decimal>,
    total_supply: Decimal,
    /// Idempotency key → transaction reference, least recently used evicted.
    applied: LruCache<String, TxRef>,
    /// Fail the next call of each operation once.
    fail_once: HashMap<LedgerOp, LedgerError>,
    /// Fail every call of these operations.
    fail_always: HashSet<LedgerOp>,
    latency: Option<Duration>,
    next_tx: u64,
}

impl SandboxState {
    fn new(replay_capacity: usize) -> Self {
        Self {
            balances: HashMap::new(),
            total_supply: Decimal::ZERO,
            applied: LruCache::new(
                NonZeroUsize::new(replay_capacity).unwrap_or(NonZeroUsize::MIN),
            ),
            fail_once: HashMap::new(),
            fail_always: HashSet::new(),
            latency: None,
            next_tx: 0,
        }
    }

    fn replayed(&mut self, idempotency_key: &str) -> Option<TxRef> {
        self.applied.get(idempotency_key).cloned()
    }

    fn check_failure(&mut self, op: LedgerOp) -> LedgerResult<()> {
        if let Some(err) = self.fail_once.remove(&op) {
            return Err(err);
        }
        if self.fail_always.contains(&op) {
            return Err(LedgerError::Unavailable(format!("{op:?} disabled in sandbox")));
        }
        Ok(())
    }

    fn balance_of(&self, address: &str) -> Decimal {
        self.balances.get(address).copied().unwrap_or_default()
    }

    fn record(&mut self, idempotency_key: &str) -> TxRef {
        self.next_tx += 1;
        let tx_ref = format!("sandbox-tx-{:06}", self.next_tx);
        self.applied.put(idempotency_key.to_string(), tx_ref.clone());
        tx_ref
    }
}

fn checked(value: Option<Decimal>) -> LedgerResult<Decimal> {
    value.ok_or_else(|| LedgerError::Rejected("amount overflows the sandbox ledger".to_string()))
}

pub struct SandboxLedger {
    state: Mutex<SandboxState>,
}

impl SandboxLedger {
    pub fn new() -> Self {
        Self::with_replay_capacity(DEFAULT_REPLAY_CAPACITY)
    }

    /// Remember at most `capacity` idempotency keys.
    pub fn with_replay_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(SandboxState::new(capacity)),
        }
    }

    /// Credit an address out of thin air (also grows total supply).
    pub async fn credit(&self, address: &str, amount: Decimal) {
        let mut state = self.state.lock().await;
        let balance = state.balance_of(address).saturating_add(amount);
        state.balances.insert(address.to_string(), balance);
        state.total_supply = state.total_supply.saturating_add(amount);
    }

    /// Make the next call of `op` fail with `error`.
    pub async fn fail_next(&self, op: LedgerOp, error: LedgerError) {
        self.state.lock().await.fail_once.insert(op, error);
    }

    /// Make every call of `op` fail until [`SandboxLedger::restore`].
    pub async fn fail_always(&self, op: LedgerOp) {
        self.state.lock().await.fail_always.insert(op);
    }

    pub async fn restore(&self, op: LedgerOp) {
        let mut state = self.state.lock().await;
        state.fail_always.remove(&op);
        state.fail_once.remove(&op);
    }

    /// Delay every call by `latency`.
    pub async fn set_latency(&self, latency: Duration) {
        self.state.lock().await.latency = Some(latency);
    }

    async fn simulate_latency(&self) {
        let latency = self.state.lock().await.latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for SandboxLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerAdapter for SandboxLedger {
    async fn mint(
        &self,
        address: &str,
        amount: Decimal,
        proof: &ReservesProof,
        idempotency_key: &str,
    ) -> LedgerResult<TxRef> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        state.check_failure(LedgerOp::Mint)?;
        if let Some(tx_ref) = state.replayed(idempotency_key) {
            return Ok(tx_ref);
        }
        if amount > proof.weight_grams {
            return Err(LedgerError::Rejected(format!(
                "mint of {amount} exceeds reserves of {}",
                proof.weight_grams
            )));
        }

        let balance = checked(state.balance_of(address).checked_add(amount))?;
        let supply = checked(state.total_supply.checked_add(amount))?;
        state.balances.insert(address.to_string(), balance);
        state.total_supply = supply;
        let tx_ref = state.record(idempotency_key);
        debug!(address, %amount, tx_ref = %tx_ref, "sandbox mint");
        Ok(tx_ref)
    }

    async fn burn(
        &self,
        address: &str,
        amount: Decimal,
        idempotency_key: &str,
    ) -> LedgerResult<TxRef> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        state.check_failure(LedgerOp::Burn)?;
        if let Some(tx_ref) = state.replayed(idempotency_key) {
            return Ok(tx_ref);
        }
        let balance = state.balance_of(address);
        if balance < amount {
            return Err(LedgerError::Rejected(format!(
                "insufficient balance: {balance} < {amount}"
            )));
        }

        let remaining = checked(balance.checked_sub(amount))?;
        let supply = checked(state.total_supply.checked_sub(amount))?;
        state.balances.insert(address.to_string(), remaining);
        state.total_supply = supply;
        let tx_ref = state.record(idempotency_key);
        debug!(address, %amount, tx_ref = %tx_ref, "sandbox burn");
        Ok(tx_ref)
    }

    async fn transfer(
        &self,
        from: &str,
        to: &str,
        amount: Decimal,
        idempotency_key: &str,
    ) -> LedgerResult<TxRef> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        state.check_failure(LedgerOp::Transfer)?;
        if let Some(tx_ref) = state.replayed(idempotency_key) {
            return Ok(tx_ref);
        }
        let balance = state.balance_of(from);
        if balance < amount {
            return Err(LedgerError::Rejected(format!(
                "insufficient balance: {balance} < {amount}"
            )));
        }

        let debited = checked(balance.checked_sub(amount))?;
        let receiving = if from == to { debited } else { state.balance_of(to) };
        let credited = checked(receiving.checked_add(amount))?;
        state.balances.insert(from.to_string(), debited);
        state.balances.insert(to.to_string(), credited);
        let tx_ref = state.record(idempotency_key);
        debug!(from, to, %amount, tx_ref = %tx_ref, "sandbox transfer");
        Ok(tx_ref)
    }

    async fn balance(&self, address: &str) -> LedgerResult<Decimal> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        state.check_failure(LedgerOp::Balance)?;
        Ok(state.balance_of(address))
    }

    async fn total_supply(&self) -> LedgerResult<Decimal> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        state.check_failure(LedgerOp::TotalSupply)?;
        Ok(state.total_supply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proof(grams: i64) -> ReservesProof {
        ReservesProof {
            vault_id: "v".to_string(),
            asset_id: "a".to_string(),
            weight_grams: Decimal::from(grams),
            digest: "00".to_string(),
        }
    }

    #[tokio::test]
    async fn mint_burn_transfer_move_balances() {
        let ledger = SandboxLedger::new();
        ledger
            .mint("alice", Decimal::from(100), &proof(100), "m-1")
            .await
            .unwrap();
        ledger
            .transfer("alice", "bob", Decimal::from(30), "t-1")
            .await
            .unwrap();
        ledger.burn("bob", Decimal::from(10), "b-1").await.unwrap();

        assert_eq!(ledger.balance("alice").await.unwrap(), Decimal::from(70));
        assert_eq!(ledger.balance("bob").await.unwrap(), Decimal::from(20));
        assert_eq!(ledger.total_supply().await.unwrap(), Decimal::from(90));
    }

    #[tokio::test]
    async fn replayed_idempotency_key_applies_once() {
        let ledger = SandboxLedger::new();
        let first = ledger
            .mint("alice", Decimal::from(5), &proof(10), "m-1")
            .await
            .unwrap();
        let second = ledger
            .mint("alice", Decimal::from(5), &proof(10), "m-1")
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(ledger.balance("alice").await.unwrap(), Decimal::from(5));
    }

    #[tokio::test]
    async fn transfer_rejects_overdraft() {
        let ledger = SandboxLedger::new();
        ledger.credit("alice", Decimal::from(5)).await;
        let result = ledger
            .transfer("alice", "bob", Decimal::from(6), "t-1")
            .await;
        assert!(matches!(result, Err(LedgerError::Rejected(_))));
        assert_eq!(ledger.balance("alice").await.unwrap(), Decimal::from(5));
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let ledger = SandboxLedger::new();
        ledger
            .fail_next(LedgerOp::Balance, LedgerError::Unavailable("down".into()))
            .await;

        assert!(ledger.balance("alice").await.is_err());
        assert!(ledger.balance("alice").await.is_ok());
    }

    #[tokio::test]
    async fn persistent_failure_until_restored() {
        let ledger = SandboxLedger::new();
        ledger.fail_always(LedgerOp::TotalSupply).await;
        assert!(ledger.total_supply().await.is_err());
        assert!(ledger.total_supply().await.is_err());
        ledger.restore(LedgerOp::TotalSupply).await;
        assert!(ledger.total_supply().await.is_ok());
    }

    #[tokio::test]
    async fn replay_window_is_bounded() {
        let ledger = SandboxLedger::with_replay_capacity(2);
        for key in ["m-1", "m-2", "m-3"] {
            ledger
                .mint("alice", Decimal::ONE, &proof(10), key)
                .await
                .unwrap();
        }
        assert_eq!(ledger.state.lock().await.applied.len(), 2);

        // m-3 is still remembered, m-1 has been evicted.
        ledger
            .mint("alice", Decimal::ONE, &proof(10), "m-3")
            .await
            .unwrap();
        assert_eq!(ledger.balance("alice").await.unwrap(), Decimal::from(3));
        ledger
            .mint("alice", Decimal::ONE, &proof(10), "m-1")
            .await
            .unwrap();
        assert_eq!(ledger.balance("alice").await.unwrap(), Decimal::from(4));
    }

    #[tokio::test]
    async fn overflowing_mint_is_rejected_without_side_effects() {
        let ledger = SandboxLedger::new();
        ledger.credit("alice", Decimal::MAX).await;

        let result = ledger.mint("alice", Decimal::ONE, &proof(10), "m-1").await;
        assert!(matches!(result, Err(LedgerError::Rejected(_))));
        assert_eq!(ledger.balance("alice").await.unwrap(), Decimal::MAX);
        assert_eq!(ledger.total_supply().await.unwrap(), Decimal::MAX);
    }
}
