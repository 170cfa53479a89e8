use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tron_wallet::TronWallet;
use tron_wallet::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Tron wallet");

    let config = Config::from_env()?;
    info!("Configuration loaded");
    info!("Network: {:?}", config.network);
    info!("Watch address: {}", config.watch_address);
    info!("API keys: {} key(s) configured", config.api_keys.len());

    let (wallet, _connectivity) = TronWallet::from_config(&config)?;
    info!("Wallet initialized");

    let mut sync_state = wallet.subscribe_sync_state();
    let mut balance = wallet.subscribe_trx_balance();
    let mut transactions = wallet.transactions();

    wallet.start();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
            changed = sync_state.changed() => {
                if changed.is_err() {
                    error!("Sync state channel closed");
                    break;
                }
                info!("Sync state: {}", *sync_state.borrow_and_update());
            }
            changed = balance.changed() => {
                if changed.is_ok() {
                    info!("TRX balance: {} sun", *balance.borrow_and_update());
                }
            }
            changed = transactions.changed() => {
                if changed.is_ok() {
                    let (count, initial) = {
                        let current = transactions.borrow_and_update();
                        (current.0.len(), current.1)
                    };
                    info!(
                        "{} transaction(s) processed{}",
                        count,
                        if initial { " (initial sync)" } else { "" }
                    );
                }
            }
        }
    }

    wallet.stop();
    info!("Status: {}", serde_json::to_string(&wallet.status_info())?);

    Ok(())
}
