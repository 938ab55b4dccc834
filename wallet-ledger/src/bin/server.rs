//! Wallet ledger server binary

use anyhow::Result;
use wallet_ledger::{Config, WalletLedger};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting Wallet Ledger Server");

    // Load configuration
    let config = Config::from_env()?;

    // Open ledger
    let ledger = WalletLedger::open(config).await?;
    tracing::info!("Wallet ledger opened successfully");

    // TODO: serve ledger.metrics().registry() on config.metrics_listen_addr
    // For now, just keep running
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down wallet ledger server");
    ledger.shutdown().await?;
    Ok(())
}
