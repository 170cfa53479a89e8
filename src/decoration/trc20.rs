use super::events::Event;
use super::manager::TransactionDecorator;
use super::{ApproveTrc20Decoration, Decoration, OutgoingTrc20Decoration};
use crate::abi::Trc20Method;
use crate::address::{Address, Network};
use crate::contract::TriggerSmartContract;
use crate::repository::InternalTransaction;

/// Recognises `transfer` and `approve` calls on TRC-20 contracts.
pub struct Trc20TransactionDecorator {
    user_address: Address,
    network: Network,
}

impl Trc20TransactionDecorator {
    pub fn new(user_address: Address, network: Network) -> Self {
        Self {
            user_address,
            network,
        }
    }
}

impl TransactionDecorator for Trc20TransactionDecorator {
    fn decoration(
        &self,
        contract: &TriggerSmartContract,
        _internal_transactions: &[InternalTransaction],
        events: &[Event],
    ) -> Option<Decoration> {
        match Trc20Method::decode(&contract.data, self.network)? {
            Trc20Method::Transfer { to, value } => {
                if contract.owner_address != self.user_address {
                    return None;
                }

                let token_info = events.iter().find_map(|event| match event {
                    Event::Trc20Transfer(transfer)
                        if transfer.contract_address == contract.contract_address =>
                    {
                        Some(transfer.token_info.clone())
                    }
                    _ => None,
                });

                Some(Decoration::OutgoingTrc20(OutgoingTrc20Decoration {
                    contract_address: contract.contract_address,
                    to,
                    value,
                    sent_to_self: to == self.user_address,
                    token_info,
                }))
            }
            Trc20Method::Approve { spender, value } => {
                Some(Decoration::ApproveTrc20(ApproveTrc20Decoration {
                    contract_address: contract.contract_address,
                    spender,
                    value,
                }))
            }
        }
    }
}
