use crate::address::Address;
use crate::contract::Contract;
use alloy_primitives::{B256, U256};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    pub hash: B256,
    /// Milliseconds since epoch.
    pub timestamp: i64,
    pub is_failed: bool,
    pub block_number: Option<i64>,
    pub fee: Option<i64>,
    pub net_usage: Option<i64>,
    pub net_fee: Option<i64>,
    pub energy_usage: Option<i64>,
    pub energy_fee: Option<i64>,
    pub energy_usage_total: Option<i64>,
    contracts_raw: Option<String>,
    /// Parsed from `contracts_raw` whenever it is set.
    #[serde(skip)]
    contract: Option<Contract>,
    pub confirmed: bool,
    pub processed: bool,
}

impl Transaction {
    /// Row created from the token or internal stream before the native record is known.
    pub fn placeholder(hash: B256, timestamp: i64, confirmed: bool) -> Self {
        Transaction {
            hash,
            timestamp,
            is_failed: false,
            block_number: None,
            fee: None,
            net_usage: None,
            net_fee: None,
            energy_usage: None,
            energy_fee: None,
            energy_usage_total: None,
            contracts_raw: None,
            contract: None,
            confirmed,
            processed: false,
        }
    }

    pub fn with_contracts_raw(mut self, contracts_raw: Option<String>) -> Self {
        self.contract = contracts_raw.as_deref().and_then(Contract::from_raw);
        self.contracts_raw = contracts_raw;
        self
    }

    pub fn contracts_raw(&self) -> Option<&str> {
        self.contracts_raw.as_deref()
    }

    pub fn contract(&self) -> Option<&Contract> {
        self.contract.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InternalTransaction {
    pub transaction_hash: B256,
    pub internal_tx_id: String,
    pub timestamp: i64,
    pub from: Address,
    pub to: Address,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Trc20EventRecord {
    pub id: Option<i64>,
    pub transaction_hash: B256,
    pub block_timestamp: i64,
    pub contract_address: Address,
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub event_type: String,
    pub token_name: String,
    pub token_symbol: String,
    pub token_decimals: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionTag {
    pub name: String,
    pub transaction_hash: B256,
}

pub const NATIVE_BALANCE_ID: &str = "TRX";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Balance {
    pub id: String,
    pub balance: U256,
}

impl Balance {
    pub fn trc20_id(contract: &Address) -> String {
        format!("TRC20|{}", contract.base58())
    }
}

pub const NATIVE_SYNC_STATE_ID: &str = "native";
pub const CONTRACT_SYNC_STATE_ID: &str = "contract";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainParameter {
    pub key: String,
    pub value: i64,
}
