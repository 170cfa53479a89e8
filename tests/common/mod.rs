#![allow(dead_code)]

use alloy_primitives::hex;
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;
use tron_wallet::address::Address;
use prost::Message;
use tron_wallet::codec::sha256;
use tron_wallet::contract::{Contract, TransferContract};
use tron_wallet::error::GatewayError;
use tron_wallet::gateway::{
    AccountInfo, BroadcastResponse, ContractTransactionData, CreatedTransaction, Gateway, Page,
    PageQuery, TransactionData, TriggerSmartContractRequest,
};
use tron_wallet::protocol::RawData;
use tron_wallet::repository::ChainParameter;

/// Address of private key 0x01.
pub const USER: &str = "417e5f4552091a69125d5dfcb7b8c2659029395bdf";
pub const USER_KEY: &str = "0000000000000000000000000000000000000000000000000000000000000001";
pub const OTHER: &str = "4115208ef33a926919ed270e2fa61367b2da3753da";
pub const TOKEN: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";

pub fn user() -> Address {
    Address::from_hex(USER).unwrap()
}

pub fn other() -> Address {
    Address::from_hex(OTHER).unwrap()
}

pub fn token() -> Address {
    Address::from_base58(TOKEN).unwrap()
}

pub fn hash(index: u32) -> String {
    format!("{:064x}", index)
}

pub fn native_transfer(index: u32, timestamp: i64, from: &str, to: &str, amount: i64) -> TransactionData {
    TransactionData::from_json(json!({
        "txID": hash(index),
        "block_timestamp": timestamp,
        "blockNumber": 1000 + index,
        "ret": [{"contractRet": "SUCCESS", "fee": 0}],
        "net_usage": 268,
        "raw_data": {"contract": [{
            "type": "TransferContract",
            "parameter": {"value": {"amount": amount, "owner_address": from, "to_address": to}}
        }]}
    }))
    .unwrap()
}

pub fn token_transfer(index: u32, timestamp: i64, from: &str, to: &str, value: &str) -> ContractTransactionData {
    serde_json::from_value(json!({
        "transaction_id": hash(index),
        "token_info": {"address": TOKEN, "name": "Tether USD", "symbol": "USDT", "decimals": 6},
        "block_timestamp": timestamp,
        "from": Address::from_hex(from).unwrap().base58(),
        "to": Address::from_hex(to).unwrap().base58(),
        "type": "Transfer",
        "value": value
    }))
    .unwrap()
}

/// One history stream: ascending records served `page_size` at a time,
/// filtered by the requested lower bound like the real endpoint.
struct Stream<T> {
    records: Vec<(i64, T)>,
    page_size: usize,
    fail_on_page: Option<usize>,
}

impl<T: Clone> Stream<T> {
    fn new() -> Self {
        Self {
            records: Vec::new(),
            page_size: 200,
            fail_on_page: None,
        }
    }

    fn page(&self, query: &PageQuery) -> Result<Page<T>, GatewayError> {
        let index: usize = match &query.fingerprint {
            Some(fingerprint) => fingerprint
                .parse()
                .map_err(|_| GatewayError::UnexpectedResponse(fingerprint.clone()))?,
            None => 0,
        };

        if self.fail_on_page == Some(index) {
            return Err(GatewayError::RequestFailed(format!("page {index} unavailable")));
        }

        let mut matching: Vec<&(i64, T)> = self
            .records
            .iter()
            .filter(|(timestamp, _)| *timestamp >= query.min_timestamp)
            .collect();
        matching.sort_by_key(|(timestamp, _)| *timestamp);

        let chunks: Vec<&[&(i64, T)]> = matching.chunks(self.page_size).collect();
        let data = chunks
            .get(index)
            .map(|chunk| chunk.iter().map(|(_, record)| record.clone()).collect())
            .unwrap_or_default();
        let fingerprint = (index + 1 < chunks.len()).then(|| (index + 1).to_string());

        Ok(Page { data, fingerprint })
    }
}

pub struct MockGateway {
    height: Mutex<u64>,
    accounts: Mutex<HashMap<Address, AccountInfo>>,
    transactions: Mutex<Stream<TransactionData>>,
    contract_transactions: Mutex<Stream<ContractTransactionData>>,
    pub transaction_queries: Mutex<Vec<PageQuery>>,
    pub contract_queries: Mutex<Vec<PageQuery>>,
    pub height_calls: AtomicUsize,
    pub account_calls: AtomicUsize,
    pub broadcasts: AtomicUsize,
    pub energy: u64,
    height_gate: Mutex<Option<Arc<Notify>>>,
    transactions_gate: Mutex<Option<Arc<Notify>>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            height: Mutex::new(100),
            accounts: Mutex::new(HashMap::new()),
            transactions: Mutex::new(Stream::new()),
            contract_transactions: Mutex::new(Stream::new()),
            transaction_queries: Mutex::new(Vec::new()),
            contract_queries: Mutex::new(Vec::new()),
            height_calls: AtomicUsize::new(0),
            account_calls: AtomicUsize::new(0),
            broadcasts: AtomicUsize::new(0),
            energy: 13_000,
            height_gate: Mutex::new(None),
            transactions_gate: Mutex::new(None),
        }
    }

    pub fn set_height(&self, height: u64) {
        *self.height.lock().unwrap() = height;
    }

    pub fn set_account(&self, address: Address, balance: i64) {
        self.accounts.lock().unwrap().insert(
            address,
            AccountInfo {
                balance,
                trc20: HashMap::new(),
            },
        );
    }

    pub fn add_transactions(&self, records: Vec<TransactionData>) {
        let mut stream = self.transactions.lock().unwrap();
        for record in records {
            stream.records.push((record.block_timestamp(), record));
        }
    }

    pub fn add_contract_transactions(&self, records: Vec<ContractTransactionData>) {
        let mut stream = self.contract_transactions.lock().unwrap();
        for record in records {
            stream.records.push((record.block_timestamp, record));
        }
    }

    pub fn set_transaction_page_size(&self, page_size: usize) {
        self.transactions.lock().unwrap().page_size = page_size;
    }

    pub fn fail_transactions_on_page(&self, page: Option<usize>) {
        self.transactions.lock().unwrap().fail_on_page = page;
    }

    /// Makes block height requests wait until the returned handle is notified.
    pub fn hold_height_requests(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.height_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Makes transaction page requests wait until the returned handle is notified.
    pub fn hold_transaction_requests(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.transactions_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn height_fetches(&self) -> usize {
        self.height_calls.load(Ordering::SeqCst)
    }

    pub fn transaction_fetches(&self) -> usize {
        self.transaction_queries.lock().unwrap().len()
    }

    pub fn contract_fetches(&self) -> usize {
        self.contract_queries.lock().unwrap().len()
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn get_block_height(&self) -> Result<u64, GatewayError> {
        self.height_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.height_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(*self.height.lock().unwrap())
    }

    async fn get_account_info(&self, address: &Address) -> Result<AccountInfo, GatewayError> {
        self.account_calls.fetch_add(1, Ordering::SeqCst);
        self.accounts
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .ok_or(GatewayError::NoAccountInfo)
    }

    async fn get_transactions(
        &self,
        _address: &Address,
        query: &PageQuery,
    ) -> Result<Page<TransactionData>, GatewayError> {
        self.transaction_queries.lock().unwrap().push(query.clone());
        let gate = self.transactions_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.transactions.lock().unwrap().page(query)
    }

    async fn get_contract_transactions(
        &self,
        _address: &Address,
        query: &PageQuery,
    ) -> Result<Page<ContractTransactionData>, GatewayError> {
        self.contract_queries.lock().unwrap().push(query.clone());
        self.contract_transactions.lock().unwrap().page(query)
    }

    async fn estimate_energy(
        &self,
        _owner: &Address,
        _contract: &Address,
        _call_value: i64,
        _data: &[u8],
    ) -> Result<u64, GatewayError> {
        Ok(self.energy)
    }

    async fn call_read_only(
        &self,
        _contract: &Address,
        _data: &[u8],
    ) -> Result<Vec<u8>, GatewayError> {
        Ok(Vec::new())
    }

    async fn create_transaction(
        &self,
        from: &Address,
        to: &Address,
        amount: i64,
    ) -> Result<CreatedTransaction, GatewayError> {
        let contract = Contract::Transfer(TransferContract {
            amount,
            owner_address: *from,
            to_address: *to,
        });
        let message = contract
            .to_wire_message()
            .map_err(|e| GatewayError::UnexpectedResponse(e.to_string()))?;
        let timestamp = 1_700_000_000_000i64;

        let raw_data = RawData {
            ref_block_bytes: vec![0x12, 0x34],
            ref_block_hash: vec![7u8; 8],
            expiration: timestamp + 60_000,
            contract: vec![message],
            timestamp,
            fee_limit: 0,
        }
        .encode_to_vec();

        Ok(CreatedTransaction {
            visible: false,
            tx_id: hex::encode(sha256(&raw_data)),
            raw_data: json!({
                "contract": [{
                    "type": "TransferContract",
                    "parameter": {"value": {
                        "amount": amount,
                        "owner_address": from.hex(),
                        "to_address": to.hex()
                    }}
                }],
                "timestamp": timestamp
            }),
            raw_data_hex: hex::encode(&raw_data),
        })
    }

    async fn trigger_smart_contract(
        &self,
        _request: &TriggerSmartContractRequest,
    ) -> Result<CreatedTransaction, GatewayError> {
        Err(GatewayError::RequestFailed("not scripted".to_string()))
    }

    async fn broadcast_transaction(
        &self,
        transaction: &CreatedTransaction,
        signature: &[u8],
    ) -> Result<BroadcastResponse, GatewayError> {
        assert_eq!(signature.len(), 65);
        self.broadcasts.fetch_add(1, Ordering::SeqCst);
        Ok(BroadcastResponse {
            result: true,
            txid: Some(transaction.tx_id.clone()),
            code: None,
            message: None,
        })
    }

    async fn get_chain_parameters(&self) -> Result<Vec<ChainParameter>, GatewayError> {
        Ok(vec![ChainParameter {
            key: "getTransactionFee".to_string(),
            value: 1000,
        }])
    }
}
