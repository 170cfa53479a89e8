use crate::address::Address;
use crate::contract::ContractRaw;
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub min_timestamp: i64,
    pub fingerprint: Option<String>,
    pub limit: u32,
    pub only_confirmed: bool,
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub fingerprint: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountInfo {
    pub balance: i64,
    pub trc20: HashMap<Address, U256>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccountResponse {
    #[serde(default)]
    pub data: Vec<AccountData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccountData {
    #[serde(default)]
    pub balance: i64,
    #[serde(default)]
    pub trc20: Vec<HashMap<String, String>>,
}

impl From<AccountData> for AccountInfo {
    fn from(data: AccountData) -> Self {
        let mut trc20 = HashMap::new();
        for (contract, balance) in data.trc20.into_iter().flatten() {
            match (Address::from_str(&contract), U256::from_str(&balance)) {
                (Ok(address), Ok(value)) => {
                    trc20.insert(address, value);
                }
                _ => warn!("Skipping malformed TRC20 balance {}: {}", contract, balance),
            }
        }

        AccountInfo {
            balance: data.balance,
            trc20,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct Meta {
    #[serde(default)]
    pub fingerprint: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListResponse<T> {
    #[serde(default)]
    pub data: Vec<T>,
    #[serde(default)]
    pub success: bool,
    pub meta: Option<Meta>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransactionData {
    Internal(InternalTransactionData),
    Regular(Box<RegularTransactionData>),
}

impl TransactionData {
    /// Records carrying `internal_tx_id` describe a nested value transfer.
    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        if value.get("internal_tx_id").is_some() {
            serde_json::from_value(value).map(TransactionData::Internal)
        } else {
            serde_json::from_value(value).map(|data| TransactionData::Regular(Box::new(data)))
        }
    }

    pub fn block_timestamp(&self) -> i64 {
        match self {
            TransactionData::Internal(data) => data.block_timestamp,
            TransactionData::Regular(data) => data.block_timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalTransactionData {
    pub block_timestamp: i64,
    pub internal_tx_id: String,
    #[serde(default)]
    pub data: serde_json::Value,
    pub to_address: Address,
    pub tx_id: String,
    pub from_address: Address,
}

impl InternalTransactionData {
    /// Native value moved by the internal transfer. The gateway nests it as
    /// `data.call_value._`, sometimes as a string.
    pub fn value(&self) -> Option<i64> {
        let value = self.data.get("call_value")?.get("_")?;
        value
            .as_i64()
            .or_else(|| value.as_f64().map(|v| v as i64))
            .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRet {
    #[serde(rename = "contractRet", default)]
    pub contract_ret: Option<String>,
    #[serde(default)]
    pub fee: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawData {
    #[serde(default)]
    pub contract: Vec<ContractRaw>,
    #[serde(default)]
    pub ref_block_bytes: Option<String>,
    #[serde(default)]
    pub ref_block_hash: Option<String>,
    #[serde(default)]
    pub expiration: Option<i64>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub fee_limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegularTransactionData {
    pub block_timestamp: i64,
    #[serde(rename = "txID")]
    pub tx_id: String,
    #[serde(default)]
    pub ret: Vec<TransactionRet>,
    #[serde(default)]
    pub withdraw_amount: Option<i64>,
    #[serde(rename = "blockNumber", default)]
    pub block_number: Option<i64>,
    #[serde(default)]
    pub net_usage: Option<i64>,
    #[serde(default)]
    pub net_fee: Option<i64>,
    #[serde(default)]
    pub energy_usage: Option<i64>,
    #[serde(default)]
    pub energy_fee: Option<i64>,
    #[serde(default)]
    pub energy_usage_total: Option<i64>,
    pub raw_data: RawData,
}

impl RegularTransactionData {
    pub fn is_failed(&self) -> bool {
        self.ret.iter().any(|ret| {
            !ret.contract_ret
                .as_deref()
                .is_some_and(|result| result.eq_ignore_ascii_case("SUCCESS"))
        })
    }

    pub fn fee(&self) -> Option<i64> {
        self.ret.first().and_then(|ret| ret.fee)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfoData {
    pub address: Address,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub decimals: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractTransactionData {
    pub transaction_id: String,
    pub token_info: TokenInfoData,
    pub block_timestamp: i64,
    pub from: Address,
    pub to: Address,
    #[serde(rename = "type")]
    pub event_type: String,
    pub value: String,
}

/// A transaction built by the gateway, ready to be signed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedTransaction {
    #[serde(default)]
    pub visible: bool,
    #[serde(rename = "txID")]
    pub tx_id: String,
    pub raw_data: serde_json::Value,
    pub raw_data_hex: String,
}

impl CreatedTransaction {
    pub fn contracts_json(&self) -> Option<String> {
        self.raw_data.get("contract").map(|c| c.to_string())
    }

    pub fn timestamp(&self) -> i64 {
        self.raw_data
            .get("timestamp")
            .and_then(|t| t.as_i64())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TriggerSmartContractRequest {
    pub owner_address: Address,
    pub contract_address: Address,
    pub function_selector: String,
    pub parameter: String,
    pub fee_limit: i64,
    pub call_value: i64,
    pub visible: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TriggerResult {
    #[serde(default)]
    pub result: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TriggerSmartContractResponse {
    pub result: TriggerResult,
    #[serde(default)]
    pub transaction: Option<CreatedTransaction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct BroadcastResponse {
    #[serde(default)]
    pub result: bool,
    #[serde(default)]
    pub txid: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChainParameterEntry {
    pub key: String,
    #[serde(default)]
    pub value: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChainParametersResponse {
    #[serde(rename = "chainParameter", default)]
    pub chain_parameter: Vec<ChainParameterEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_internal_record_detection_and_value() {
        let record = json!({
            "internal_tx_id": "9a0c",
            "data": {"note": "63616c6c", "rejected": false, "call_value": {"_": 1500}},
            "block_timestamp": 1_700_000_000_000i64,
            "to_address": "41a614f803b6fd780986a42c78ec9c7f77e6ded13c",
            "tx_id": "ab",
            "from_address": "4115208ef33a926919ed270e2fa61367b2da3753da"
        });

        match TransactionData::from_json(record).unwrap() {
            TransactionData::Internal(internal) => assert_eq!(internal.value(), Some(1500)),
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn test_internal_record_without_value() {
        let record = json!({
            "internal_tx_id": "9a0c",
            "data": {"note": "63616c6c", "call_value": {"1002000": 5}},
            "block_timestamp": 1,
            "to_address": "41a614f803b6fd780986a42c78ec9c7f77e6ded13c",
            "tx_id": "ab",
            "from_address": "4115208ef33a926919ed270e2fa61367b2da3753da"
        });

        match TransactionData::from_json(record).unwrap() {
            TransactionData::Internal(internal) => assert_eq!(internal.value(), None),
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn test_regular_record_failure_flag() {
        let mut record = json!({
            "txID": "ab",
            "block_timestamp": 1,
            "ret": [{"contractRet": "success", "fee": 1100}],
            "raw_data": {"contract": [], "timestamp": 1}
        });

        match TransactionData::from_json(record.clone()).unwrap() {
            TransactionData::Regular(regular) => {
                assert!(!regular.is_failed());
                assert_eq!(regular.fee(), Some(1100));
            }
            other => panic!("unexpected record {:?}", other),
        }

        record["ret"] = json!([{"contractRet": "SUCCESS"}, {"contractRet": "OUT_OF_ENERGY"}]);
        match TransactionData::from_json(record).unwrap() {
            TransactionData::Regular(regular) => assert!(regular.is_failed()),
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn test_account_data_conversion_skips_malformed_entries() {
        let data: AccountData = serde_json::from_value(json!({
            "balance": 42,
            "trc20": [
                {"TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t": "1000000"},
                {"not-an-address": "1"}
            ]
        }))
        .unwrap();

        let info = AccountInfo::from(data);
        assert_eq!(info.balance, 42);
        assert_eq!(info.trc20.len(), 1);
    }
}
