pub mod events;
pub mod manager;
pub mod tags;
pub mod trc20;

pub use events::{Event, TokenInfo, Trc20ApproveEvent, Trc20TransferEvent};
pub use manager::{DecorationManager, TransactionDecorator};
pub use trc20::Trc20TransactionDecorator;

use crate::address::Address;
use crate::contract::{Contract, TriggerSmartContract};
use crate::repository::{InternalTransaction, Transaction};
use alloy_primitives::U256;
use serde::Serialize;
use std::collections::HashSet;

/// What a transaction means for the watched address. Derived on demand,
/// never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind")]
pub enum Decoration {
    Native(NativeDecoration),
    OutgoingTrc20(OutgoingTrc20Decoration),
    ApproveTrc20(ApproveTrc20Decoration),
    Unknown(UnknownDecoration),
}

impl Decoration {
    pub fn tags(&self, user_address: &Address) -> Vec<String> {
        let tags = match self {
            Decoration::Native(decoration) => decoration.tags(user_address),
            Decoration::OutgoingTrc20(decoration) => decoration.tags(),
            Decoration::ApproveTrc20(decoration) => decoration.tags(),
            Decoration::Unknown(decoration) => decoration.tags(user_address),
        };
        tags::dedup(tags)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativeDecoration {
    pub contract: Contract,
}

impl NativeDecoration {
    fn tags(&self, user_address: &Address) -> Vec<String> {
        let mut result = Vec::new();

        match &self.contract {
            Contract::Transfer(transfer) => {
                if transfer.owner_address == *user_address {
                    result.push(tags::TRX_OUTGOING.to_string());
                    result.push(tags::OUTGOING.to_string());
                }
                if transfer.to_address == *user_address {
                    result.push(tags::TRX_INCOMING.to_string());
                    result.push(tags::INCOMING.to_string());
                }
            }
            Contract::TransferAsset(transfer) => {
                if transfer.owner_address == *user_address {
                    result.push(tags::trc10_outgoing(&transfer.asset_name));
                    result.push(tags::OUTGOING.to_string());
                }
                if transfer.to_address == *user_address {
                    result.push(tags::trc10_incoming(&transfer.asset_name));
                    result.push(tags::INCOMING.to_string());
                }
            }
            _ => {}
        }

        result
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingTrc20Decoration {
    pub contract_address: Address,
    pub to: Address,
    pub value: U256,
    pub sent_to_self: bool,
    pub token_info: Option<TokenInfo>,
}

impl OutgoingTrc20Decoration {
    fn tags(&self) -> Vec<String> {
        vec![
            self.contract_address.base58(),
            tags::TRC20_TRANSFER.to_string(),
            tags::trc20_outgoing(&self.contract_address),
            tags::OUTGOING.to_string(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApproveTrc20Decoration {
    pub contract_address: Address,
    pub spender: Address,
    pub value: U256,
}

impl ApproveTrc20Decoration {
    fn tags(&self) -> Vec<String> {
        vec![
            self.contract_address.base58(),
            tags::TRC20_APPROVE.to_string(),
        ]
    }
}

/// Fallback when no decorator recognises the call, or when only token
/// events and internal transfers are known for the transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnknownDecoration {
    pub from_address: Option<Address>,
    pub to_address: Option<Address>,
    pub value: Option<i64>,
    pub token_value: Option<i64>,
    pub token_id: Option<i64>,
    pub internal_transactions: Vec<InternalTransaction>,
    pub events: Vec<Event>,
}

impl UnknownDecoration {
    pub fn new(
        contract: Option<&TriggerSmartContract>,
        internal_transactions: Vec<InternalTransaction>,
        events: Vec<Event>,
    ) -> Self {
        UnknownDecoration {
            from_address: contract.map(|c| c.owner_address),
            to_address: contract.map(|c| c.contract_address),
            value: contract.and_then(|c| c.call_value),
            token_value: contract.and_then(|c| c.call_token_value),
            token_id: contract.and_then(|c| c.token_id),
            internal_transactions,
            events,
        }
    }

    fn tags(&self, user_address: &Address) -> Vec<String> {
        let mut incoming: i128 = self
            .internal_transactions
            .iter()
            .filter(|tx| tx.to == *user_address)
            .map(|tx| tx.value as i128)
            .sum();
        let mut outgoing: i128 = self
            .internal_transactions
            .iter()
            .filter(|tx| tx.from == *user_address)
            .map(|tx| tx.value as i128)
            .sum();

        if let Some(value) = self.value {
            if self.to_address == Some(*user_address) {
                incoming += value as i128;
            } else if self.from_address == Some(*user_address) {
                outgoing += value as i128;
            }
        }

        // Equal non-zero flows cancel out and get no direction tag.
        let mut result = Vec::new();
        if incoming > outgoing {
            result.push(tags::TRX_INCOMING.to_string());
            result.push(tags::INCOMING.to_string());
        } else if incoming < outgoing {
            result.push(tags::TRX_OUTGOING.to_string());
            result.push(tags::OUTGOING.to_string());
        }

        for event in &self.events {
            result.extend(event.tags(user_address));
        }

        result
    }
}

/// A stored transaction together with its decoration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FullTransaction {
    pub transaction: Transaction,
    pub decoration: Decoration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionWithTags {
    pub transaction: FullTransaction,
    pub tags: Vec<String>,
}

/// Keeps transactions whose tags satisfy every group, where a group is
/// satisfied by any one of its tags. An empty group matches nothing.
pub fn filter_by_tags<'a>(
    transactions: &'a [TransactionWithTags],
    tag_groups: &[Vec<String>],
) -> Vec<&'a FullTransaction> {
    transactions
        .iter()
        .filter(|item| {
            let tags: HashSet<&String> = item.tags.iter().collect();
            tag_groups
                .iter()
                .all(|group| group.iter().any(|tag| tags.contains(tag)))
        })
        .map(|item| &item.transaction)
        .collect()
}
