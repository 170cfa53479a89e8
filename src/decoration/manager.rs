use super::events::Event;
use super::{Decoration, FullTransaction, NativeDecoration, UnknownDecoration};
use crate::address::Address;
use crate::contract::{Contract, TriggerSmartContract};
use crate::repository::{InternalTransaction, Transaction, TransactionRepository};
use alloy_primitives::B256;
use anyhow::Result;
use std::collections::HashMap;
use tracing::debug;

/// Above this many transactions the child rows are loaded in one full scan
/// instead of an `IN (...)` lookup.
const FETCH_ALL_THRESHOLD: usize = 100;

/// A per-protocol decoder for smart contract calls.
pub trait TransactionDecorator: Send + Sync {
    fn decoration(
        &self,
        contract: &TriggerSmartContract,
        internal_transactions: &[InternalTransaction],
        events: &[Event],
    ) -> Option<Decoration>;
}

pub struct DecorationManager {
    user_address: Address,
    decorators: Vec<Box<dyn TransactionDecorator>>,
}

impl DecorationManager {
    pub fn new(user_address: Address) -> Self {
        Self {
            user_address,
            decorators: Vec::new(),
        }
    }

    pub fn user_address(&self) -> &Address {
        &self.user_address
    }

    /// Decorators are tried in the order they were added.
    pub fn add_decorator(&mut self, decorator: Box<dyn TransactionDecorator>) {
        self.decorators.push(decorator);
    }

    pub fn decorate(
        &self,
        contract: Option<&Contract>,
        internal_transactions: Vec<InternalTransaction>,
        events: Vec<Event>,
    ) -> Decoration {
        match contract {
            None => Decoration::Unknown(UnknownDecoration::new(None, internal_transactions, events)),
            Some(Contract::TriggerSmartContract(trigger)) => self
                .decorators
                .iter()
                .find_map(|d| d.decoration(trigger, &internal_transactions, &events))
                .unwrap_or_else(|| {
                    Decoration::Unknown(UnknownDecoration::new(
                        Some(trigger),
                        internal_transactions,
                        events,
                    ))
                }),
            Some(other) => Decoration::Native(NativeDecoration {
                contract: other.clone(),
            }),
        }
    }

    /// Joins each transaction with its stored internal transfers and token
    /// events, then decorates it.
    pub fn decorate_transactions(
        &self,
        repo: &TransactionRepository,
        transactions: Vec<Transaction>,
    ) -> Result<Vec<FullTransaction>> {
        if transactions.is_empty() {
            return Ok(Vec::new());
        }

        let hashes: Vec<B256> = transactions.iter().map(|tx| tx.hash).collect();
        let filter = if hashes.len() > FETCH_ALL_THRESHOLD {
            debug!("Loading all child rows for {} transactions", hashes.len());
            None
        } else {
            Some(hashes.as_slice())
        };

        let mut internals: HashMap<B256, Vec<InternalTransaction>> = HashMap::new();
        for internal in repo.get_internal_transactions(filter)? {
            internals
                .entry(internal.transaction_hash)
                .or_default()
                .push(internal);
        }

        let mut events: HashMap<B256, Vec<Event>> = HashMap::new();
        for record in repo.get_events(filter)? {
            if let Some(event) = Event::from_record(&record) {
                events.entry(record.transaction_hash).or_default().push(event);
            }
        }

        Ok(transactions
            .into_iter()
            .map(|transaction| {
                let decoration = self.decorate(
                    transaction.contract(),
                    internals.remove(&transaction.hash).unwrap_or_default(),
                    events.remove(&transaction.hash).unwrap_or_default(),
                );
                FullTransaction {
                    transaction,
                    decoration,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Network;
    use crate::contract::TransferContract;
    use crate::decoration::Trc20TransactionDecorator;
    use crate::repository::{Database, Trc20EventRecord};
    use alloy_primitives::U256;
    use serde_json::json;

    fn address(byte: u8) -> Address {
        let mut raw = [byte; 21];
        raw[0] = 0x41;
        Address::from_bytes(&raw).unwrap()
    }

    fn manager(user: Address) -> DecorationManager {
        let mut manager = DecorationManager::new(user);
        manager.add_decorator(Box::new(Trc20TransactionDecorator::new(
            user,
            Network::Mainnet,
        )));
        manager
    }

    #[test]
    fn test_dispatch_by_contract_kind() {
        let user = address(0xaa);
        let manager = manager(user);

        assert!(matches!(
            manager.decorate(None, vec![], vec![]),
            Decoration::Unknown(_)
        ));

        let transfer = Contract::Transfer(TransferContract {
            amount: 100,
            owner_address: user,
            to_address: address(0xbb),
        });
        assert!(matches!(
            manager.decorate(Some(&transfer), vec![], vec![]),
            Decoration::Native(_)
        ));

        let unrecognised = Contract::TriggerSmartContract(TriggerSmartContract {
            data: vec![1, 2, 3, 4],
            owner_address: user,
            contract_address: address(0xcc),
            call_value: Some(7),
            call_token_value: None,
            token_id: None,
            function_selector: None,
            parameter: None,
        });
        match manager.decorate(Some(&unrecognised), vec![], vec![]) {
            Decoration::Unknown(decoration) => {
                assert_eq!(decoration.value, Some(7));
                assert_eq!(decoration.to_address, Some(address(0xcc)));
            }
            other => panic!("unexpected decoration {:?}", other),
        }
    }

    #[test]
    fn test_placeholder_decorated_from_events() {
        let user = address(0xaa);
        let manager = manager(user);
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();
        let repo = TransactionRepository::new(&conn);

        let hash = B256::repeat_byte(9);
        repo.save_if_not_exists(&Transaction::placeholder(hash, 1000, true))
            .unwrap();
        repo.save_events(&[Trc20EventRecord {
            id: None,
            transaction_hash: hash,
            block_timestamp: 1000,
            contract_address: address(0xcc),
            from: address(0xbb),
            to: user,
            value: U256::from(3),
            event_type: "Transfer".into(),
            token_name: "Token".into(),
            token_symbol: "TKN".into(),
            token_decimals: 18,
        }])
        .unwrap();

        let full = manager
            .decorate_transactions(&repo, repo.get_unprocessed().unwrap())
            .unwrap();

        assert_eq!(full.len(), 1);
        let tags = full[0].decoration.tags(&user);
        assert!(tags.contains(&"incoming".to_string()));
        assert!(tags.contains(&format!("trc20Incoming:{}", address(0xcc).base58())));
    }

    #[test]
    fn test_native_record_decorated_from_contract_json() {
        let user = address(0xaa);
        let manager = manager(user);
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();
        let repo = TransactionRepository::new(&conn);

        let contracts = json!([{
            "type": "TransferContract",
            "parameter": {"value": {
                "amount": 100,
                "owner_address": user.hex(),
                "to_address": address(0xbb).hex()
            }}
        }]);
        let transaction = Transaction::placeholder(B256::repeat_byte(1), 1000, true)
            .with_contracts_raw(Some(contracts.to_string()));
        repo.save(&transaction).unwrap();

        let full = manager
            .decorate_transactions(&repo, vec![transaction])
            .unwrap();
        assert_eq!(
            full[0].decoration.tags(&user),
            vec!["TRX_outgoing", "outgoing"]
        );
    }
}
