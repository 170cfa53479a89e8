pub mod trongrid;
pub mod types;

use crate::address::Address;
use crate::error::GatewayError;
use crate::repository::ChainParameter;
use async_trait::async_trait;

pub use trongrid::{ApiKeyProvider, TronGridClient};
pub use types::{
    AccountInfo, BroadcastResponse, ContractTransactionData, CreatedTransaction,
    InternalTransactionData, Page, PageQuery, RegularTransactionData, TransactionData,
    TriggerSmartContractRequest,
};

/// Remote node access used by the sync engine and the transaction sender.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn get_block_height(&self) -> Result<u64, GatewayError>;

    /// Fails with `GatewayError::NoAccountInfo` for addresses never activated on chain.
    async fn get_account_info(&self, address: &Address) -> Result<AccountInfo, GatewayError>;

    async fn get_transactions(
        &self,
        address: &Address,
        query: &PageQuery,
    ) -> Result<Page<TransactionData>, GatewayError>;

    async fn get_contract_transactions(
        &self,
        address: &Address,
        query: &PageQuery,
    ) -> Result<Page<ContractTransactionData>, GatewayError>;

    async fn estimate_energy(
        &self,
        owner: &Address,
        contract: &Address,
        call_value: i64,
        data: &[u8],
    ) -> Result<u64, GatewayError>;

    async fn call_read_only(&self, contract: &Address, data: &[u8])
    -> Result<Vec<u8>, GatewayError>;

    async fn create_transaction(
        &self,
        from: &Address,
        to: &Address,
        amount: i64,
    ) -> Result<CreatedTransaction, GatewayError>;

    async fn trigger_smart_contract(
        &self,
        request: &TriggerSmartContractRequest,
    ) -> Result<CreatedTransaction, GatewayError>;

    async fn broadcast_transaction(
        &self,
        transaction: &CreatedTransaction,
        signature: &[u8],
    ) -> Result<BroadcastResponse, GatewayError>;

    async fn get_chain_parameters(&self) -> Result<Vec<ChainParameter>, GatewayError>;
}
