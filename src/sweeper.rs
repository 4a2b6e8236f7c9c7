// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Expiry Sweeper
//!
//! Background task that moves stale trade intents and price locks to
//! EXPIRED, independent of request traffic.
//!
//! Every `interval` (default 60 s, `SWEEP_INTERVAL_SECS`) the sweeper runs
//! [`TradingEngine::expire_stale_intents`](crate::workflows::TradingEngine::expire_stale_intents)
//! and [`MintWorkflow::expire_price_locks`](crate::workflows::MintWorkflow::expire_price_locks).
//! Both are idempotent, so a sweep that races a request handler is harmless.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken`; the server cancels it when it
//! receives a shutdown signal.

use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::workflows::WorkflowContext;

pub struct ExpirySweeper {
    ctx: WorkflowContext,
    interval: Duration,
}

/// Counts from one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepOutcome {
    pub intents_expired: usize,
    pub locks_expired: usize,
}

impl ExpirySweeper {
    pub fn new(ctx: WorkflowContext, interval: Duration) -> Self {
        Self { ctx, interval }
    }

    /// Run until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Expiry sweeper starting");

        loop {
            if shutdown.is_cancelled() {
                info!("Expiry sweeper shutting down");
                return;
            }

            self.sweep_step();

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Expiry sweeper shutting down");
                    return;
                }
            }
        }
    }

    /// One sweep. Failures are logged and retried on the next tick.
    pub fn sweep_step(&self) -> SweepOutcome {
        let now = Utc::now();
        let mut outcome = SweepOutcome::default();

        match self.ctx.trading().expire_stale_intents(now) {
            Ok(count) => outcome.intents_expired = count,
            Err(e) => warn!(error = %e, "Expiry sweeper: failed to expire trade intents"),
        }
        match self.ctx.minting().expire_price_locks(now) {
            Ok(count) => outcome.locks_expired = count,
            Err(e) => warn!(error = %e, "Expiry sweeper: failed to expire price locks"),
        }

        debug!(
            intents = outcome.intents_expired,
            locks = outcome.locks_expired,
            "Expiry sweep finished"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::config::SettlementPolicy;
    use crate::storage::repository::IntentSide;
    use crate::workflows::testing::Harness;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn sweep_expires_intents_and_locks() {
        let policy = SettlementPolicy {
            intent_ttl: chrono::Duration::zero(),
            price_lock_ttl: chrono::Duration::zero(),
            ..SettlementPolicy::default()
        };
        let h = Harness::with_policy(policy);
        h.admin("root");
        h.verified("alice", Role::User);
        h.ctx
            .minting()
            .register_custody_asset("root", "vault-1", Decimal::from(100), Decimal::ONE)
            .unwrap();
        h.ctx
            .trading()
            .submit_intent("alice", IntentSide::Buy, Decimal::ONE, Decimal::from(50))
            .await
            .unwrap();
        h.ctx.minting().initiate("alice", Decimal::from(10)).unwrap();

        let sweeper = ExpirySweeper::new(h.ctx.clone(), Duration::from_secs(60));
        assert_eq!(
            sweeper.sweep_step(),
            SweepOutcome {
                intents_expired: 1,
                locks_expired: 1
            }
        );
        assert_eq!(sweeper.sweep_step(), SweepOutcome::default());
    }

    #[tokio::test]
    async fn run_stops_on_cancellation() {
        let h = Harness::new();
        let sweeper = ExpirySweeper::new(h.ctx.clone(), Duration::from_secs(3600));
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(sweeper.run(shutdown.clone()));

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
