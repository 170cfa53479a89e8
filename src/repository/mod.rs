pub mod balance_repository;
pub mod database;
pub mod models;
pub mod sync_state_repository;
pub mod transaction_repository;

pub use balance_repository::BalanceRepository;
pub use database::Database;
pub use models::{
    Balance, CONTRACT_SYNC_STATE_ID, ChainParameter, InternalTransaction, NATIVE_BALANCE_ID,
    NATIVE_SYNC_STATE_ID, Trc20EventRecord, Transaction, TransactionTag,
};
pub use sync_state_repository::SyncStateRepository;
pub use transaction_repository::TransactionRepository;

use crate::address::Address;
use alloy_primitives::{B256, hex};
use rusqlite::Row;
use std::str::FromStr;

pub(crate) fn hash_hex(hash: &B256) -> String {
    hex::encode(hash)
}

pub(crate) fn hash_from_row(row: &Row, index: usize) -> rusqlite::Result<B256> {
    B256::from_str(&row.get::<_, String>(index)?).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
    })
}

pub(crate) fn address_from_row(row: &Row, index: usize) -> rusqlite::Result<Address> {
    Address::from_hex(&row.get::<_, String>(index)?).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
    })
}
