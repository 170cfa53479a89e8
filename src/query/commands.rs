use crate::address::Address;
use crate::query::formatters::{
    OutputFormat, SyncStatus, TokenMeta, format_balances, format_status, format_transactions,
};
use crate::repository::{
    BalanceRepository, CONTRACT_SYNC_STATE_ID, NATIVE_SYNC_STATE_ID, SyncStateRepository,
    TransactionRepository,
};
use crate::transaction_manager::TransactionManager;
use alloy_primitives::B256;
use anyhow::Result;
use std::collections::HashMap;
use std::str::FromStr;

#[derive(Default)]
pub struct TransactionQuery {
    /// Each entry is one OR-group of comma separated tags; groups are ANDed.
    pub tags: Vec<String>,
    pub from_hash: Option<String>,
    pub limit: Option<usize>,
}

impl TransactionQuery {
    pub fn tag_groups(&self) -> Vec<Vec<String>> {
        self.tags
            .iter()
            .map(|group| {
                group
                    .split(',')
                    .map(|tag| tag.trim().to_string())
                    .filter(|tag| !tag.is_empty())
                    .collect()
            })
            .collect()
    }
}

pub fn cmd_transactions(
    transaction_manager: &TransactionManager,
    user_address: &Address,
    query: TransactionQuery,
    format: &OutputFormat,
) -> Result<()> {
    let from_hash = query
        .from_hash
        .as_ref()
        .map(|hash| {
            B256::from_str(hash).map_err(|_| anyhow::anyhow!("Invalid transaction hash: {}", hash))
        })
        .transpose()?;

    let transactions = transaction_manager.get_full_transactions(
        &query.tag_groups(),
        from_hash.as_ref(),
        query.limit,
    )?;

    let output = format_transactions(&transactions, user_address, format);
    println!("{output}");

    Ok(())
}

pub fn cmd_transaction(
    transaction_manager: &TransactionManager,
    user_address: &Address,
    hash: &str,
    format: &OutputFormat,
) -> Result<()> {
    let hash =
        B256::from_str(hash).map_err(|_| anyhow::anyhow!("Invalid transaction hash: {}", hash))?;

    let transactions = transaction_manager.get_full_transactions_by_hashes(&[hash])?;
    if transactions.is_empty() {
        return Err(anyhow::anyhow!("Transaction {:?} not found", hash));
    }

    let output = format_transactions(&transactions, user_address, format);
    println!("{output}");

    Ok(())
}

pub fn cmd_balances(
    balance_repo: &BalanceRepository,
    transaction_repo: &TransactionRepository,
    format: &OutputFormat,
) -> Result<()> {
    let balances = balance_repo.get_all()?;

    let tokens: HashMap<String, TokenMeta> = transaction_repo
        .get_events(None)?
        .into_iter()
        .map(|event| {
            (
                event.contract_address.base58(),
                TokenMeta {
                    symbol: event.token_symbol,
                    decimals: event.token_decimals,
                },
            )
        })
        .collect();

    let output = format_balances(&balances, &tokens, format);
    println!("{output}");

    Ok(())
}

pub fn cmd_status(
    sync_state_repo: &SyncStateRepository,
    transaction_repo: &TransactionRepository,
    format: &OutputFormat,
) -> Result<()> {
    let status = SyncStatus {
        last_block_height: sync_state_repo.get_last_block_height()?,
        native_cursor: sync_state_repo.get_sync_timestamp(NATIVE_SYNC_STATE_ID)?,
        contract_cursor: sync_state_repo.get_sync_timestamp(CONTRACT_SYNC_STATE_ID)?,
        transactions: transaction_repo.count()?,
        chain_parameters: sync_state_repo.get_chain_parameters()?,
    };

    let output = format_status(&status, format);
    println!("{output}");

    Ok(())
}
