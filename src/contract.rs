use crate::address::Address;
use crate::codec::serde_hex;
use crate::error::TransactionError;
use crate::protocol;
use prost::Message;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

const TYPE_URL_PREFIX: &str = "type.googleapis.com/protocol.";
const TRANSFER_CONTRACT_TYPE: i32 = 1;
const TRANSFER_ASSET_CONTRACT_TYPE: i32 = 2;
const TRIGGER_SMART_CONTRACT_TYPE: i32 = 31;

/// One element of a transaction's `raw_data.contract` list as returned by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContractRaw {
    #[serde(rename = "type")]
    pub contract_type: String,
    pub parameter: ContractParameter,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContractParameter {
    pub value: serde_json::Value,
    #[serde(default)]
    pub type_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferContract {
    pub amount: i64,
    pub owner_address: Address,
    pub to_address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferAssetContract {
    pub amount: i64,
    pub asset_name: String,
    pub owner_address: Address,
    pub to_address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerSmartContract {
    #[serde(with = "serde_hex", default)]
    pub data: Vec<u8>,
    pub owner_address: Address,
    pub contract_address: Address,
    #[serde(default)]
    pub call_value: Option<i64>,
    #[serde(default)]
    pub call_token_value: Option<i64>,
    #[serde(default)]
    pub token_id: Option<i64>,
    /// Set only on locally built calls; the gateway builds `data` from these.
    #[serde(skip)]
    pub function_selector: Option<String>,
    #[serde(skip)]
    pub parameter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawBalanceContract {
    #[serde(rename = "withdraw_amount", default)]
    pub amount: Option<i64>,
    pub owner_address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetIssueContract {
    pub owner_address: Address,
    pub name: String,
    #[serde(rename = "abbr", default)]
    pub abbreviation: String,
    pub total_supply: i64,
    #[serde(default)]
    pub precision: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreezeBalanceV2Contract {
    pub owner_address: Address,
    pub frozen_balance: i64,
    #[serde(default = "default_resource")]
    pub resource: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnfreezeBalanceV2Contract {
    pub owner_address: Address,
    pub unfreeze_balance: i64,
    #[serde(default = "default_resource")]
    pub resource: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub vote_address: Address,
    pub vote_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteWitnessContract {
    pub owner_address: Address,
    pub votes: Vec<Vote>,
}

impl VoteWitnessContract {
    pub fn total_votes(&self) -> i64 {
        self.votes.iter().map(|vote| vote.vote_count).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSmartContract {
    pub owner_address: Address,
}

fn default_resource() -> String {
    "BANDWIDTH".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum Contract {
    Transfer(TransferContract),
    TransferAsset(TransferAssetContract),
    TriggerSmartContract(TriggerSmartContract),
    WithdrawBalance(WithdrawBalanceContract),
    AssetIssue(AssetIssueContract),
    FreezeBalanceV2(FreezeBalanceV2Contract),
    UnfreezeBalanceV2(UnfreezeBalanceV2Contract),
    VoteWitness(VoteWitnessContract),
    CreateSmartContract(CreateSmartContract),
    Unknown { raw_type: String, raw_json: String },
}

impl Contract {
    /// Parses the first element of a stored contract list.
    ///
    /// Returns `None` when the text is not a JSON contract list at all, and
    /// `Unknown` when the element has an unrecognised type or is missing
    /// fields its type requires.
    pub fn from_raw(contracts_json: &str) -> Option<Contract> {
        let contracts: Vec<ContractRaw> = match serde_json::from_str(contracts_json) {
            Ok(contracts) => contracts,
            Err(e) => {
                warn!("Failed to parse contract list: {}", e);
                return None;
            }
        };

        contracts.first().map(Contract::from_record)
    }

    pub fn from_record(record: &ContractRaw) -> Contract {
        let value = &record.parameter.value;
        let parsed = match record.contract_type.as_str() {
            "TransferContract" => parse(value).map(Contract::Transfer),
            "TransferAssetContract" => parse(value).map(Contract::TransferAsset),
            "TriggerSmartContract" => parse(value).map(Contract::TriggerSmartContract),
            "WithdrawBalanceContract" => parse(value).map(Contract::WithdrawBalance),
            "AssetIssueContract" => parse(value).map(Contract::AssetIssue),
            "FreezeBalanceV2Contract" => parse(value).map(Contract::FreezeBalanceV2),
            "UnfreezeBalanceV2Contract" => parse(value).map(Contract::UnfreezeBalanceV2),
            "VoteWitnessContract" => parse(value).map(Contract::VoteWitness),
            "CreateSmartContract" => parse(value).map(Contract::CreateSmartContract),
            other => {
                warn!("Unknown contract type: {}", other);
                None
            }
        };

        parsed.unwrap_or_else(|| Contract::Unknown {
            raw_type: record.contract_type.clone(),
            raw_json: serde_json::to_string(record).unwrap_or_default(),
        })
    }

    pub fn type_name(&self) -> &str {
        match self {
            Contract::Transfer(_) => "TransferContract",
            Contract::TransferAsset(_) => "TransferAssetContract",
            Contract::TriggerSmartContract(_) => "TriggerSmartContract",
            Contract::WithdrawBalance(_) => "WithdrawBalanceContract",
            Contract::AssetIssue(_) => "AssetIssueContract",
            Contract::FreezeBalanceV2(_) => "FreezeBalanceV2Contract",
            Contract::UnfreezeBalanceV2(_) => "UnfreezeBalanceV2Contract",
            Contract::VoteWitness(_) => "VoteWitnessContract",
            Contract::CreateSmartContract(_) => "CreateSmartContract",
            Contract::Unknown { raw_type, .. } => raw_type,
        }
    }

    pub fn owner_address(&self) -> Option<Address> {
        match self {
            Contract::Transfer(c) => Some(c.owner_address),
            Contract::TransferAsset(c) => Some(c.owner_address),
            Contract::TriggerSmartContract(c) => Some(c.owner_address),
            Contract::WithdrawBalance(c) => Some(c.owner_address),
            Contract::AssetIssue(c) => Some(c.owner_address),
            Contract::FreezeBalanceV2(c) => Some(c.owner_address),
            Contract::UnfreezeBalanceV2(c) => Some(c.owner_address),
            Contract::VoteWitness(c) => Some(c.owner_address),
            Contract::CreateSmartContract(c) => Some(c.owner_address),
            Contract::Unknown { .. } => None,
        }
    }

    /// Canonical `Transaction.Contract` message for submission.
    pub fn to_wire_message(&self) -> Result<protocol::Contract, TransactionError> {
        match self {
            Contract::Transfer(_) | Contract::TriggerSmartContract(_) => self.to_message(),
            other => Err(TransactionError::UnsupportedContractForSubmission(
                other.type_name().to_string(),
            )),
        }
    }

    /// Like `to_wire_message`, but also covers asset transfers, which are only
    /// ever encoded to size a simulated transaction.
    pub(crate) fn to_simulation_message(&self) -> Result<protocol::Contract, TransactionError> {
        self.to_message()
    }

    fn to_message(&self) -> Result<protocol::Contract, TransactionError> {
        let (contract_type, value) = match self {
            Contract::Transfer(c) => (
                TRANSFER_CONTRACT_TYPE,
                protocol::TransferContract {
                    owner_address: c.owner_address.as_bytes().to_vec(),
                    to_address: c.to_address.as_bytes().to_vec(),
                    amount: c.amount,
                }
                .encode_to_vec(),
            ),
            Contract::TransferAsset(c) => (
                TRANSFER_ASSET_CONTRACT_TYPE,
                protocol::TransferAssetContract {
                    asset_name: c.asset_name.as_bytes().to_vec(),
                    owner_address: c.owner_address.as_bytes().to_vec(),
                    to_address: c.to_address.as_bytes().to_vec(),
                    amount: c.amount,
                }
                .encode_to_vec(),
            ),
            Contract::TriggerSmartContract(c) => (
                TRIGGER_SMART_CONTRACT_TYPE,
                protocol::TriggerSmartContract {
                    owner_address: c.owner_address.as_bytes().to_vec(),
                    contract_address: c.contract_address.as_bytes().to_vec(),
                    call_value: c.call_value.unwrap_or_default(),
                    data: c.data.clone(),
                    call_token_value: c.call_token_value.unwrap_or_default(),
                    token_id: c.token_id.unwrap_or_default(),
                }
                .encode_to_vec(),
            ),
            other => {
                return Err(TransactionError::UnsupportedContractForSubmission(
                    other.type_name().to_string(),
                ));
            }
        };

        Ok(protocol::Contract {
            r#type: contract_type,
            parameter: Some(protocol::Any {
                type_url: format!("{}{}", TYPE_URL_PREFIX, self.type_name()),
                value,
            }),
        })
    }
}

fn parse<T: DeserializeOwned>(value: &serde_json::Value) -> Option<T> {
    match serde_json::from_value(value.clone()) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!("Malformed contract parameter: {}", e);
            None
        }
    }
}
