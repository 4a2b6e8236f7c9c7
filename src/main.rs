// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use silver_settlement::{
    api::router,
    config::{Settings, LOG_FORMAT_ENV},
    ledger::{HttpLedger, LedgerAdapter, SandboxLedger, TimedLedger},
    state::{AppState, AuthConfig},
    storage::SettlementDb,
    sweeper::ExpirySweeper,
    workflows::WorkflowContext,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

type StartupResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[tokio::main]
async fn main() -> StartupResult<()> {
    init_tracing();

    let settings = Settings::from_env()?;

    let db_path = settings.db_path();
    let db = Arc::new(SettlementDb::open(&db_path)?);
    tracing::info!(path = %db_path.display(), "settlement database opened");

    let inner: Arc<dyn LedgerAdapter> = match &settings.ledger_url {
        Some(url) => {
            tracing::info!(%url, "using ledger gateway");
            Arc::new(HttpLedger::new(url.clone(), settings.ledger_timeout)?)
        }
        None => {
            tracing::warn!("LEDGER_URL not set, using the in-memory sandbox ledger");
            Arc::new(SandboxLedger::new())
        }
    };
    let ledger: Arc<dyn LedgerAdapter> =
        Arc::new(TimedLedger::new(inner, settings.ledger_timeout));

    let workflows = WorkflowContext::new(db, ledger, settings.policy.clone());
    for admin_id in &settings.seed_admin_ids {
        workflows.accounts().seed_admin(admin_id)?;
    }

    let shutdown = CancellationToken::new();
    let sweeper = ExpirySweeper::new(workflows.clone(), settings.sweep_interval);
    let sweeper_handle = tokio::spawn(sweeper.run(shutdown.clone()));

    let state = AppState::new(workflows, AuthConfig::from_settings(&settings));
    let app = router(state);

    let addr = settings.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "silver settlement server listening (docs at /docs)");

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            server_shutdown.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Err(e) = sweeper_handle.await {
        tracing::error!(error = %e, "expiry sweeper task failed");
    }
    tracing::info!("silver settlement server stopped");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
