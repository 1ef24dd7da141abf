//! SOL payment-relay HTTP server.
//!
//! # Usage
//!
//! ```bash
//! # Configuration comes from the environment (or a .env file)
//! SOL_WALLET=... PRIVATE_KEY=... cargo run -p solrelay-server --release
//!
//! # Configure logging level
//! RUST_LOG=info cargo run -p solrelay-server
//! ```
//!
//! See `solrelay::config` for the full list of environment variables.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::Method;
use solrelay::chain::{ChainClient, RpcChainClient};
use solrelay::ledger::SignatureLedger;
use solrelay::{RelayConfig, RelayService};
use tower_http::cors;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use solrelay_server::handlers::relay_router;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("Relay failed: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = RelayConfig::from_env()?;
    tracing::info!(
        receiving = %config.receiving_address,
        payout = ?config.payout,
        exchange_rate = config.exchange_rate,
        min_purchase = %config.min_purchase,
        lookback = config.lookback_limit,
        "Loaded configuration"
    );

    let chain: Arc<dyn ChainClient> =
        Arc::new(RpcChainClient::new(config.rpc_url.clone(), config.commitment));
    let ledger = Arc::new(match &config.ledger_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "using persistent consumed-payment ledger");
            SignatureLedger::with_file(path)?
        }
        None => {
            tracing::warn!("no LEDGER_PATH set; consumed payments are forgotten on restart");
            SignatureLedger::in_memory()
        }
    });
    let service = Arc::new(RelayService::new(&config, chain, ledger));

    let app = relay_router(service)
        .layer(TraceLayer::new_for_http())
        .layer(
            cors::CorsLayer::new()
                .allow_origin(cors::Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(cors::Any),
        );

    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Relay listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Relay shut down gracefully");
    Ok(())
}

/// Waits for Ctrl-C or SIGTERM (Unix) to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => tracing::info!("Received Ctrl-C, shutting down..."),
            _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down..."),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for Ctrl-C");
        tracing::info!("Received Ctrl-C, shutting down...");
    }
}
