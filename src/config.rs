use crate::address::{Address, Network};
use crate::signer::{LocalSigner, Signer};
use anyhow::{Context, Result};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub network: Network,
    pub api_keys: Vec<String>,
    pub watch_address: Address,
    pub private_key: Option<String>,
    pub database_url: String,
    pub sync_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let network = match std::env::var("TRON_NETWORK") {
            Ok(value) => Network::from_str(&value).context("Invalid TRON_NETWORK value")?,
            Err(_) => Network::default(),
        };

        let api_keys: Vec<String> = std::env::var("TRONGRID_API_KEYS")
            .context("TRONGRID_API_KEYS must be set in .env")?
            .split(',')
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .collect();

        if api_keys.is_empty() {
            anyhow::bail!("TRONGRID_API_KEYS must contain at least one key");
        }

        let private_key = std::env::var("PRIVATE_KEY").ok();

        let watch_address = match std::env::var("WATCH_ADDRESS") {
            Ok(value) => Address::from_str(&value).context("Invalid WATCH_ADDRESS format")?,
            Err(_) => {
                let key = private_key
                    .as_deref()
                    .context("WATCH_ADDRESS or PRIVATE_KEY must be set in .env")?;
                LocalSigner::from_hex(key, network)
                    .context("Invalid PRIVATE_KEY format")?
                    .address()
            }
        };

        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:./wallet.db".to_string());

        let sync_interval = match std::env::var("SYNC_INTERVAL_SECS") {
            Ok(value) => parse_sync_interval(&value)?,
            Err(_) => Duration::from_secs(30),
        };

        Ok(Config {
            network,
            api_keys,
            watch_address,
            private_key,
            database_url,
            sync_interval,
        })
    }
}

fn parse_sync_interval(value: &str) -> Result<Duration> {
    let secs: u64 = value
        .trim()
        .parse()
        .context("SYNC_INTERVAL_SECS must be a number of seconds")?;
    if secs == 0 {
        anyhow::bail!("SYNC_INTERVAL_SECS must be greater than zero");
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sync_interval() {
        assert_eq!(parse_sync_interval("15").unwrap(), Duration::from_secs(15));
        assert_eq!(parse_sync_interval(" 5 ").unwrap(), Duration::from_secs(5));
        assert!(parse_sync_interval("soon").is_err());
    }

    #[test]
    fn test_zero_sync_interval_is_rejected() {
        let error = parse_sync_interval("0").unwrap_err();
        assert!(error.to_string().contains("greater than zero"));
    }
}
