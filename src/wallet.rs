use crate::account::AccountInfoManager;
use crate::address::{Address, Network};
use crate::chain_parameters::ChainParameterManager;
use crate::config::Config;
use crate::contract::{Contract, TransferContract};
use crate::decoration::{
    DecorationManager, FullTransaction, TokenInfo, Trc20TransactionDecorator, TransactionWithTags,
};
use crate::error::TokenError;
use crate::fee::{Fee, FeeProvider};
use crate::gateway::{Gateway, TronGridClient};
use crate::repository::Database;
use crate::sender::TransactionSender;
use crate::signer::{LocalSigner, Signer};
use crate::syncer::{SyncState, Syncer};
use crate::token::{self, AllowanceManager, Trc20Provider};
use crate::transaction_manager::TransactionManager;
use alloy_primitives::{B256, U256};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub address: String,
    pub started: bool,
    pub last_block_height: u64,
    pub sync_state: String,
    pub chain_parameters_state: String,
    pub account_active: bool,
}

/// Single-account wallet: sync engine, transaction feed, fees and sending.
pub struct TronWallet {
    address: Address,
    network: Network,
    started: AtomicBool,
    chain_parameters: Arc<ChainParameterManager>,
    account_info_manager: Arc<AccountInfoManager>,
    transaction_manager: Arc<TransactionManager>,
    syncer: Arc<Syncer>,
    fee_provider: FeeProvider,
    sender: TransactionSender,
    trc20_provider: Trc20Provider,
    allowance_manager: AllowanceManager,
    signer: Option<Arc<dyn Signer>>,
}

impl TronWallet {
    pub fn new(
        address: Address,
        network: Network,
        gateway: Arc<dyn Gateway>,
        db: Arc<Database>,
        sync_interval: Duration,
        connectivity: watch::Receiver<bool>,
    ) -> Result<Self> {
        let mut decoration_manager = DecorationManager::new(address);
        decoration_manager.add_decorator(Box::new(Trc20TransactionDecorator::new(address, network)));

        let chain_parameters = Arc::new(ChainParameterManager::new(gateway.clone(), db.clone())?);
        let account_info_manager = Arc::new(AccountInfoManager::new(db.clone())?);
        let transaction_manager = Arc::new(TransactionManager::new(db.clone(), decoration_manager));
        let syncer = Arc::new(Syncer::new(
            address,
            gateway.clone(),
            db,
            account_info_manager.clone(),
            transaction_manager.clone(),
            sync_interval,
            connectivity,
        )?);

        Ok(Self {
            address,
            network,
            started: AtomicBool::new(false),
            fee_provider: FeeProvider::new(gateway.clone(), chain_parameters.clone()),
            sender: TransactionSender::new(gateway.clone()),
            trc20_provider: Trc20Provider::new(gateway.clone()),
            allowance_manager: AllowanceManager::new(gateway, address),
            chain_parameters,
            account_info_manager,
            transaction_manager,
            syncer,
            signer: None,
        })
    }

    /// Builds a wallet against TronGrid. The connectivity sender is returned
    /// so the caller can report network changes; it starts out connected.
    pub fn from_config(config: &Config) -> Result<(Self, watch::Sender<bool>)> {
        let gateway = Arc::new(
            TronGridClient::new(config.network, config.api_keys.clone())
                .context("Failed to create TronGrid client")?,
        );
        let db = Arc::new(Database::new(&config.database_url).context("Failed to open database")?);
        let (connectivity, receiver) = watch::channel(true);

        let mut wallet = Self::new(
            config.watch_address,
            config.network,
            gateway,
            db,
            config.sync_interval,
            receiver,
        )?;

        if let Some(key) = &config.private_key {
            let signer = LocalSigner::from_hex(key, config.network).context("Invalid PRIVATE_KEY")?;
            if signer.address() != config.watch_address {
                anyhow::bail!(
                    "PRIVATE_KEY belongs to {}, not to WATCH_ADDRESS {}",
                    signer.address(),
                    config.watch_address
                );
            }
            wallet = wallet.with_signer(Arc::new(signer));
        }

        Ok((wallet, connectivity))
    }

    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Starting wallet for {}", self.address);

        let chain_parameters = self.chain_parameters.clone();
        tokio::spawn(async move { chain_parameters.sync().await });

        self.syncer.start();
    }

    pub fn stop(&self) {
        self.started.store(false, Ordering::SeqCst);
        self.syncer.stop();
        info!("Stopped wallet for {}", self.address);
    }

    pub fn refresh(&self) {
        self.syncer.refresh();
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn sync_state(&self) -> SyncState {
        self.syncer.state()
    }

    pub fn subscribe_sync_state(&self) -> watch::Receiver<SyncState> {
        self.syncer.subscribe_state()
    }

    pub fn last_block_height(&self) -> u64 {
        self.syncer.last_block_height()
    }

    pub fn subscribe_last_block_height(&self) -> watch::Receiver<u64> {
        self.syncer.subscribe_last_block_height()
    }

    pub fn is_account_active(&self) -> bool {
        self.account_info_manager.is_account_active()
    }

    pub fn trx_balance(&self) -> U256 {
        self.account_info_manager.trx_balance()
    }

    pub fn trc20_balance(&self, contract: &Address) -> U256 {
        self.account_info_manager.trc20_balance(contract)
    }

    pub fn subscribe_trx_balance(&self) -> watch::Receiver<U256> {
        self.account_info_manager.subscribe_trx_balance()
    }

    pub fn subscribe_trc20_balances(&self) -> watch::Receiver<HashMap<Address, U256>> {
        self.account_info_manager.subscribe_trc20_balances()
    }

    pub fn transactions(&self) -> watch::Receiver<(Vec<FullTransaction>, bool)> {
        self.transaction_manager.subscribe_transactions()
    }

    pub fn transactions_with_tags(&self) -> watch::Receiver<Vec<TransactionWithTags>> {
        self.transaction_manager.subscribe_transactions_with_tags()
    }

    pub fn get_full_transactions(
        &self,
        tag_groups: &[Vec<String>],
        from_hash: Option<&B256>,
        limit: Option<usize>,
    ) -> Result<Vec<FullTransaction>> {
        self.transaction_manager
            .get_full_transactions(tag_groups, from_hash, limit)
    }

    pub fn get_full_transactions_by_hashes(&self, hashes: &[B256]) -> Result<Vec<FullTransaction>> {
        self.transaction_manager
            .get_full_transactions_by_hashes(hashes)
    }

    pub async fn estimate_fee(&self, contract: &Contract) -> Result<Vec<Fee>> {
        self.fee_provider.estimate_fee(contract).await
    }

    pub async fn is_address_active(&self, address: &Address) -> Result<bool> {
        Ok(self.fee_provider.is_account_active(address).await?)
    }

    pub fn transfer_contract(&self, amount: i64, to: Address) -> Contract {
        Contract::Transfer(TransferContract {
            amount,
            owner_address: self.address,
            to_address: to,
        })
    }

    pub fn transfer_trc20_trigger_smart_contract(
        &self,
        token: Address,
        to: Address,
        amount: U256,
    ) -> Contract {
        token::transfer_trc20_trigger_smart_contract(self.address, token, to, amount)
    }

    pub fn approve_trc20_trigger_smart_contract(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Contract {
        self.allowance_manager
            .approve_trc20_trigger_smart_contract(token, spender, amount)
    }

    pub async fn allowance(&self, token: &Address, spender: &Address) -> Result<U256, TokenError> {
        self.allowance_manager.allowance(token, spender).await
    }

    pub async fn token_info(&self, token: &Address) -> Result<TokenInfo, TokenError> {
        self.trc20_provider.token_info(token).await
    }

    /// Builds, validates, signs and broadcasts `contract`, then records it
    /// locally as unconfirmed. Returns the transaction id.
    pub async fn send(&self, contract: &Contract, fee_limit: Option<i64>) -> Result<String> {
        let signer = self
            .signer
            .as_ref()
            .context("Wallet has no signer, it is watch-only")?;

        let created = self.sender.create_transaction(contract, fee_limit).await?;
        self.sender.broadcast(&created, signer.as_ref()).await?;
        self.transaction_manager.handle(&created)?;

        info!("Sent transaction {}", created.tx_id);
        Ok(created.tx_id)
    }

    pub fn status_info(&self) -> StatusInfo {
        StatusInfo {
            address: self.address.base58(),
            started: self.is_started(),
            last_block_height: self.last_block_height(),
            sync_state: self.sync_state().to_string(),
            chain_parameters_state: self.chain_parameters.sync_state().to_string(),
            account_active: self.is_account_active(),
        }
    }
}
