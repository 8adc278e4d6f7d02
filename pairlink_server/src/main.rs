//! Binary entry point for the signaling relay

use clap::Parser;
use pairlink_server::{RelayConfig, RelayError, RelayServer};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), RelayError> {
    let config = RelayConfig::parse();
    init_tracing();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %config.addr,
        candidate_policy = ?config.candidate_policy,
        "pairlink signaling relay starting"
    );

    let server = RelayServer::bind(config).await?;
    server
        .serve_with_shutdown(async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        })
        .await
}

fn init_tracing() {
    // RUST_LOG wins, otherwise info
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
