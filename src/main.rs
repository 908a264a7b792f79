// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use emailpay_rust_server::api::router;
use emailpay_rust_server::blockchain::{ChainClient, NetworkConfig};
use emailpay_rust_server::config::Config;
use emailpay_rust_server::directory::WalletDirectory;
use emailpay_rust_server::inbox::MessageIntake;
use emailpay_rust_server::ledger::{ChainLedger, LedgerBackend, SimulatedLedger};
use emailpay_rust_server::notify::{run_log_sink, Notifier};
use emailpay_rust_server::pipeline::SettlementPipeline;
use emailpay_rust_server::policy::PolicyEngine;
use emailpay_rust_server::signer::{LocalKeySigner, Signer};
use emailpay_rust_server::state::AppState;
use emailpay_rust_server::storage::{BalanceCache, PaymentDb};
use emailpay_rust_server::sweeper::ExpirySweeper;

/// Balance cache sizing: small, short-lived, per-address.
const BALANCE_CACHE_CAPACITY: usize = 256;
const BALANCE_CACHE_TTL: Duration = Duration::from_secs(30);

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").map(|f| f == "json").unwrap_or(false);

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let config = Arc::new(Config::from_env());

    // Durable state
    let db = Arc::new(PaymentDb::open(&config.db_path).expect("Failed to open payment database"));
    let directory = WalletDirectory::new(db.clone());
    let policy = PolicyEngine::from_config(&config);

    // Chain access
    let network = NetworkConfig::from_config(&config);
    let chain = Arc::new(
        ChainClient::new(network.clone(), &config.pyusd_address)
            .expect("Failed to build chain client"),
    );

    // Signing backend
    let signer = LocalKeySigner::from_config(&config).expect("Failed to load hot wallet key");
    tracing::info!(address = %signer.address(), "Hot wallet signer ready");
    let signer: Arc<dyn Signer> = Arc::new(signer);

    // Ordered settlement strategies
    let mut ledgers = vec![LedgerBackend::Chain(ChainLedger::new(
        network.clone(),
        config.pyusd_address.clone(),
    ))];
    if config.simulated_fallback {
        ledgers.push(LedgerBackend::Simulated(SimulatedLedger::new(network.clone())));
    }

    // Outbound notifications
    let (notifier, outbox_rx) = Notifier::channel(
        config.frontend_url.clone(),
        config.policies.expiry_minutes,
    );

    let pipeline = Arc::new(SettlementPipeline::new(
        db.clone(),
        directory.clone(),
        policy.clone(),
        signer,
        ledgers,
        notifier.clone(),
        config.frontend_url.clone(),
    ));

    // Background tasks
    let shutdown = CancellationToken::new();
    let (feed, intake) = MessageIntake::new(db.clone(), pipeline.clone());
    tokio::spawn(intake.run(shutdown.clone()));
    tokio::spawn(run_log_sink(outbox_rx, shutdown.clone()));
    tokio::spawn(
        ExpirySweeper::new(db.clone(), Duration::from_secs(config.sweep_interval_secs))
            .run(shutdown.clone()),
    );

    let state = AppState {
        config: config.clone(),
        db,
        directory,
        policy,
        pipeline,
        chain,
        balances: Arc::new(BalanceCache::new(BALANCE_CACHE_CAPACITY, BALANCE_CACHE_TTL)),
        notifier,
        feed,
    };

    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Failed to parse bind address");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind server address");

    tracing::info!(%addr, chain_id = config.chain_id, "EmailPay server listening (docs at /docs)");

    let shutdown_handle = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
            shutdown_handle.cancel();
        })
        .await
        .expect("HTTP server failed");
}
