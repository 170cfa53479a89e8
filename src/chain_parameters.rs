use crate::error::SyncError;
use crate::gateway::Gateway;
use crate::repository::{Database, SyncStateRepository};
use crate::syncer::SyncState;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

const TRANSACTION_FEE_KEY: &str = "getTransactionFee";
const ENERGY_FEE_KEY: &str = "getEnergyFee";
const CREATE_ACCOUNT_FEE_KEY: &str = "getCreateAccountFee";
const CREATE_NEW_ACCOUNT_FEE_KEY: &str = "getCreateNewAccountFeeInSystemContract";

const DEFAULT_TRANSACTION_FEE: i64 = 1_000;
const DEFAULT_ENERGY_FEE: i64 = 420;
const DEFAULT_CREATE_ACCOUNT_FEE: i64 = 100_000;
const DEFAULT_CREATE_NEW_ACCOUNT_FEE: i64 = 1_000_000;

/// Network prices used by fee estimation. Falls back to the mainnet
/// defaults until the first successful fetch.
pub struct ChainParameterManager {
    gateway: Arc<dyn Gateway>,
    db: Arc<Database>,
    parameters: RwLock<HashMap<String, i64>>,
    state: RwLock<SyncState>,
}

impl ChainParameterManager {
    pub fn new(gateway: Arc<dyn Gateway>, db: Arc<Database>) -> Result<Self> {
        let cached = {
            let conn = db.conn()?;
            SyncStateRepository::new(&conn).get_chain_parameters()?
        };

        Ok(Self {
            gateway,
            db,
            parameters: RwLock::new(cached.into_iter().map(|p| (p.key, p.value)).collect()),
            state: RwLock::new(SyncState::Syncing { progress: None }),
        })
    }

    pub async fn sync(&self) {
        let state = match self.fetch().await {
            Ok(count) => {
                info!("Synced {} chain parameters", count);
                SyncState::Synced
            }
            Err(e) => {
                warn!("Failed to sync chain parameters: {:#}", e);
                SyncState::NotSynced(SyncError::Failed(e.to_string()))
            }
        };

        if let Ok(mut current) = self.state.write() {
            *current = state;
        }
    }

    async fn fetch(&self) -> Result<usize> {
        let parameters = self.gateway.get_chain_parameters().await?;

        {
            let conn = self.db.conn()?;
            SyncStateRepository::new(&conn).save_chain_parameters(&parameters)?;
        }

        let count = parameters.len();
        if let Ok(mut current) = self.parameters.write() {
            *current = parameters.into_iter().map(|p| (p.key, p.value)).collect();
        }
        Ok(count)
    }

    pub fn sync_state(&self) -> SyncState {
        self.state
            .read()
            .map(|state| state.clone())
            .unwrap_or(SyncState::NotSynced(SyncError::NotStarted))
    }

    fn get(&self, key: &str, default: i64) -> i64 {
        self.parameters
            .read()
            .ok()
            .and_then(|parameters| parameters.get(key).copied())
            .unwrap_or(default)
    }

    /// Price of one bandwidth point, in sun.
    pub fn transaction_fee(&self) -> i64 {
        self.get(TRANSACTION_FEE_KEY, DEFAULT_TRANSACTION_FEE)
    }

    /// Price of one energy unit, in sun.
    pub fn energy_fee(&self) -> i64 {
        self.get(ENERGY_FEE_KEY, DEFAULT_ENERGY_FEE)
    }

    /// Bandwidth points burned when a transfer creates a new account.
    pub fn create_account_fee(&self) -> i64 {
        let price = self.transaction_fee();
        if price == 0 {
            return 0;
        }
        self.get(CREATE_ACCOUNT_FEE_KEY, DEFAULT_CREATE_ACCOUNT_FEE) / price
    }

    /// Flat activation fee charged by a system contract transfer, in sun.
    pub fn create_new_account_fee_in_system_contract(&self) -> i64 {
        self.get(CREATE_NEW_ACCOUNT_FEE_KEY, DEFAULT_CREATE_NEW_ACCOUNT_FEE)
    }
}
