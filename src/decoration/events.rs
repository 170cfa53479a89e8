use super::tags;
use crate::address::Address;
use crate::repository::Trc20EventRecord;
use alloy_primitives::{B256, U256};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenInfo {
    pub token_name: String,
    pub token_symbol: String,
    pub token_decimals: u8,
}

impl TokenInfo {
    fn from_record(record: &Trc20EventRecord) -> Self {
        TokenInfo {
            token_name: record.token_name.clone(),
            token_symbol: record.token_symbol.clone(),
            token_decimals: record.token_decimals,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Trc20TransferEvent {
    pub transaction_hash: B256,
    pub contract_address: Address,
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub token_info: TokenInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Trc20ApproveEvent {
    pub transaction_hash: B256,
    pub contract_address: Address,
    pub owner: Address,
    pub spender: Address,
    pub value: U256,
    pub token_info: TokenInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    Trc20Transfer(Trc20TransferEvent),
    Trc20Approve(Trc20ApproveEvent),
}

impl Event {
    /// Only `Transfer` and `Approval` records are meaningful; anything else is dropped.
    pub fn from_record(record: &Trc20EventRecord) -> Option<Event> {
        match record.event_type.as_str() {
            "Transfer" => Some(Event::Trc20Transfer(Trc20TransferEvent {
                transaction_hash: record.transaction_hash,
                contract_address: record.contract_address,
                from: record.from,
                to: record.to,
                value: record.value,
                token_info: TokenInfo::from_record(record),
            })),
            "Approval" => Some(Event::Trc20Approve(Trc20ApproveEvent {
                transaction_hash: record.transaction_hash,
                contract_address: record.contract_address,
                owner: record.from,
                spender: record.to,
                value: record.value,
                token_info: TokenInfo::from_record(record),
            })),
            _ => None,
        }
    }

    pub fn transaction_hash(&self) -> B256 {
        match self {
            Event::Trc20Transfer(event) => event.transaction_hash,
            Event::Trc20Approve(event) => event.transaction_hash,
        }
    }

    pub fn contract_address(&self) -> Address {
        match self {
            Event::Trc20Transfer(event) => event.contract_address,
            Event::Trc20Approve(event) => event.contract_address,
        }
    }

    pub fn tags(&self, user_address: &Address) -> Vec<String> {
        match self {
            Event::Trc20Transfer(event) => {
                let contract = &event.contract_address;
                let mut tags = vec![contract.base58(), tags::TRC20_TRANSFER.to_string()];

                if event.from == *user_address {
                    tags.push(tags::trc20_outgoing(contract));
                    tags.push(tags::OUTGOING.to_string());
                }

                if event.to == *user_address {
                    tags.push(tags::trc20_incoming(contract));
                    tags.push(tags::INCOMING.to_string());
                }

                tags
            }
            Event::Trc20Approve(event) => vec![
                event.contract_address.base58(),
                tags::TRC20_APPROVE.to_string(),
            ],
        }
    }
}
