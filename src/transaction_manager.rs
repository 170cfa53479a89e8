use crate::address::Address;
use crate::contract::ContractRaw;
use crate::decoration::{DecorationManager, FullTransaction, TransactionWithTags};
use crate::gateway::{
    ContractTransactionData, CreatedTransaction, RegularTransactionData, TransactionData,
};
use crate::repository::{
    Database, InternalTransaction, Trc20EventRecord, Transaction, TransactionRepository,
    TransactionTag,
};
use alloy_primitives::{B256, U256};
use anyhow::{Context, Result};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Normalises fetched records into storage, decorates what has not been
/// processed yet and publishes the result.
pub struct TransactionManager {
    user_address: Address,
    db: Arc<Database>,
    decoration_manager: DecorationManager,
    transactions: watch::Sender<(Vec<FullTransaction>, bool)>,
    transactions_with_tags: watch::Sender<Vec<TransactionWithTags>>,
}

impl TransactionManager {
    pub fn new(db: Arc<Database>, decoration_manager: DecorationManager) -> Self {
        Self {
            user_address: *decoration_manager.user_address(),
            db,
            decoration_manager,
            transactions: watch::Sender::new((Vec::new(), false)),
            transactions_with_tags: watch::Sender::new(Vec::new()),
        }
    }

    /// Emits `(newly processed transactions, initial)` after every non-empty pass.
    pub fn subscribe_transactions(&self) -> watch::Receiver<(Vec<FullTransaction>, bool)> {
        self.transactions.subscribe()
    }

    pub fn subscribe_transactions_with_tags(&self) -> watch::Receiver<Vec<TransactionWithTags>> {
        self.transactions_with_tags.subscribe()
    }

    /// Stores native and internal records. Native records replace whatever
    /// is stored under their hash; internal transfers only add a placeholder.
    pub fn save_transaction_data(&self, records: &[TransactionData], confirmed: bool) -> Result<()> {
        let mut transactions = Vec::new();
        let mut placeholders = Vec::new();
        let mut internals = Vec::new();

        for record in records {
            match record {
                TransactionData::Internal(internal) => {
                    let Some(value) = internal.value() else {
                        debug!("Skipping internal transfer {} without value", internal.internal_tx_id);
                        continue;
                    };
                    let hash = match parse_hash(&internal.tx_id) {
                        Ok(hash) => hash,
                        Err(e) => {
                            warn!("Skipping internal transfer {}: {:#}", internal.internal_tx_id, e);
                            continue;
                        }
                    };

                    internals.push(InternalTransaction {
                        transaction_hash: hash,
                        internal_tx_id: internal.internal_tx_id.clone(),
                        timestamp: internal.block_timestamp,
                        from: internal.from_address,
                        to: internal.to_address,
                        value,
                    });
                    placeholders.push(Transaction::placeholder(
                        hash,
                        internal.block_timestamp,
                        confirmed,
                    ));
                }
                TransactionData::Regular(regular) => match native_transaction(regular, confirmed) {
                    Ok(transaction) => transactions.push(transaction),
                    Err(e) => warn!("Skipping transaction {}: {:#}", regular.tx_id, e),
                },
            }
        }

        let conn = self.db.conn()?;
        let tx = conn.unchecked_transaction()?;
        {
            let repo = TransactionRepository::new(&tx);
            repo.save_internal_transactions(&internals)?;
            for placeholder in &placeholders {
                repo.save_if_not_exists(placeholder)?;
            }
            for transaction in &transactions {
                repo.save(transaction)?;
            }
        }
        tx.commit()?;

        debug!(
            "Saved {} transactions and {} internal transfers",
            transactions.len(),
            internals.len()
        );
        Ok(())
    }

    /// Stores TRC-20 events and a placeholder for each unseen transaction.
    pub fn save_contract_transaction_data(
        &self,
        records: &[ContractTransactionData],
        confirmed: bool,
    ) -> Result<()> {
        let mut events = Vec::new();
        let mut placeholders = Vec::new();

        for record in records {
            match event_record(record) {
                Ok(event) => {
                    placeholders.push(Transaction::placeholder(
                        event.transaction_hash,
                        record.block_timestamp,
                        confirmed,
                    ));
                    events.push(event);
                }
                Err(e) => warn!("Skipping token event of {}: {:#}", record.transaction_id, e),
            }
        }

        let conn = self.db.conn()?;
        let tx = conn.unchecked_transaction()?;
        let inserted = {
            let repo = TransactionRepository::new(&tx);
            let inserted = repo.save_events(&events)?;
            for placeholder in &placeholders {
                repo.save_if_not_exists(placeholder)?;
            }
            inserted
        };
        tx.commit()?;

        debug!("Saved {} of {} token events", inserted, events.len());
        Ok(())
    }

    /// Decorates every unprocessed transaction, rewrites its tags and marks
    /// it processed. A pass over an empty backlog does nothing.
    pub fn process(&self, initial: bool) -> Result<Vec<FullTransaction>> {
        let conn = self.db.conn()?;

        let full_transactions = {
            let repo = TransactionRepository::new(&conn);
            let unprocessed = repo.get_unprocessed()?;
            if unprocessed.is_empty() {
                return Ok(Vec::new());
            }
            self.decoration_manager
                .decorate_transactions(&repo, unprocessed)?
        };

        let mut with_tags = Vec::with_capacity(full_transactions.len());
        let mut all_tags = Vec::new();
        for full_transaction in &full_transactions {
            let tags = full_transaction.decoration.tags(&self.user_address);
            all_tags.extend(tags.iter().map(|name| TransactionTag {
                name: name.clone(),
                transaction_hash: full_transaction.transaction.hash,
            }));
            with_tags.push(TransactionWithTags {
                transaction: full_transaction.clone(),
                tags,
            });
        }

        let hashes: Vec<B256> = full_transactions.iter().map(|t| t.transaction.hash).collect();
        let tx = conn.unchecked_transaction()?;
        {
            let repo = TransactionRepository::new(&tx);
            repo.replace_tags(&hashes, &all_tags)?;
            repo.mark_processed(&hashes)?;
        }
        tx.commit()?;
        drop(conn);

        info!(
            "Processed {} transactions (initial: {})",
            full_transactions.len(),
            initial
        );

        self.transactions
            .send_replace((full_transactions.clone(), initial));
        self.transactions_with_tags.send_replace(with_tags);

        Ok(full_transactions)
    }

    /// Records a locally broadcast transaction so it shows up before the
    /// next poll confirms it. A record already stored under the same hash
    /// is left untouched.
    pub fn handle(&self, created: &CreatedTransaction) -> Result<()> {
        let transaction =
            Transaction::placeholder(parse_hash(&created.tx_id)?, created.timestamp(), false)
                .with_contracts_raw(created.contracts_json());

        {
            let conn = self.db.conn()?;
            TransactionRepository::new(&conn).save_if_not_exists(&transaction)?;
        }

        self.process(false)?;
        Ok(())
    }

    pub fn get_full_transactions(
        &self,
        tag_groups: &[Vec<String>],
        from_hash: Option<&B256>,
        limit: Option<usize>,
    ) -> Result<Vec<FullTransaction>> {
        let conn = self.db.conn()?;
        let repo = TransactionRepository::new(&conn);
        let transactions = repo.get_before(tag_groups, from_hash, limit)?;
        self.decoration_manager
            .decorate_transactions(&repo, transactions)
    }

    pub fn get_full_transactions_by_hashes(&self, hashes: &[B256]) -> Result<Vec<FullTransaction>> {
        let conn = self.db.conn()?;
        let repo = TransactionRepository::new(&conn);
        let transactions = repo.get_by_hashes(hashes)?;
        self.decoration_manager
            .decorate_transactions(&repo, transactions)
    }
}

fn parse_hash(value: &str) -> Result<B256> {
    B256::from_str(value).with_context(|| format!("Invalid transaction hash: {}", value))
}

fn native_transaction(record: &RegularTransactionData, confirmed: bool) -> Result<Transaction> {
    let contracts = contracts_with_withdraw_amount(record);

    let mut transaction =
        Transaction::placeholder(parse_hash(&record.tx_id)?, record.block_timestamp, confirmed)
            .with_contracts_raw(Some(serde_json::to_string(&contracts)?));
    transaction.is_failed = record.is_failed();
    transaction.block_number = record.block_number;
    transaction.fee = record.fee();
    transaction.net_usage = record.net_usage;
    transaction.net_fee = record.net_fee;
    transaction.energy_usage = record.energy_usage;
    transaction.energy_fee = record.energy_fee;
    transaction.energy_usage_total = record.energy_usage_total;
    Ok(transaction)
}

/// Reward withdrawals report the amount beside the contract; fold it into
/// the contract parameters so the parsed contract carries it.
fn contracts_with_withdraw_amount(record: &RegularTransactionData) -> Vec<ContractRaw> {
    let mut contracts = record.raw_data.contract.clone();
    if let Some(amount) = record.withdraw_amount {
        for contract in &mut contracts {
            if let Some(value) = contract.parameter.value.as_object_mut() {
                value.insert("withdraw_amount".to_string(), amount.into());
            }
        }
    }
    contracts
}

fn event_record(record: &ContractTransactionData) -> Result<Trc20EventRecord> {
    Ok(Trc20EventRecord {
        id: None,
        transaction_hash: parse_hash(&record.transaction_id)?,
        block_timestamp: record.block_timestamp,
        contract_address: record.token_info.address,
        from: record.from,
        to: record.to,
        value: U256::from_str(&record.value)
            .with_context(|| format!("Invalid token value: {}", record.value))?,
        event_type: record.event_type.clone(),
        token_name: record.token_info.name.clone(),
        token_symbol: record.token_info.symbol.clone(),
        token_decimals: record.token_info.decimals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Network;
    use crate::contract::Contract;
    use crate::decoration::{Decoration, Trc20TransactionDecorator};
    use serde_json::json;

    const USER: &str = "41a614f803b6fd780986a42c78ec9c7f77e6ded13c";
    const OTHER: &str = "4115208ef33a926919ed270e2fa61367b2da3753da";
    const TOKEN: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";

    fn hash(byte: u8) -> String {
        format!("{:02x}", byte).repeat(32)
    }

    fn manager() -> (TransactionManager, Arc<Database>) {
        let db = Arc::new(Database::in_memory().unwrap());
        let user = Address::from_hex(USER).unwrap();
        let mut decorations = DecorationManager::new(user);
        decorations.add_decorator(Box::new(Trc20TransactionDecorator::new(
            user,
            Network::Mainnet,
        )));
        (TransactionManager::new(db.clone(), decorations), db)
    }

    fn native_record(byte: u8, timestamp: i64) -> TransactionData {
        TransactionData::from_json(json!({
            "txID": hash(byte),
            "block_timestamp": timestamp,
            "blockNumber": 100,
            "ret": [{"contractRet": "SUCCESS", "fee": 1100}],
            "net_usage": 268,
            "raw_data": {"contract": [{
                "type": "TransferContract",
                "parameter": {"value": {"amount": 100, "owner_address": USER, "to_address": OTHER}}
            }]}
        }))
        .unwrap()
    }

    fn internal_record(byte: u8, value: serde_json::Value) -> TransactionData {
        TransactionData::from_json(json!({
            "internal_tx_id": format!("internal-{}", byte),
            "tx_id": hash(byte),
            "block_timestamp": 2000,
            "from_address": OTHER,
            "to_address": USER,
            "data": {"call_value": {"_": value}}
        }))
        .unwrap()
    }

    fn token_record(byte: u8) -> ContractTransactionData {
        serde_json::from_value(json!({
            "transaction_id": hash(byte),
            "token_info": {"address": TOKEN, "name": "Tether USD", "symbol": "USDT", "decimals": 6},
            "block_timestamp": 3000,
            "from": OTHER,
            "to": USER,
            "type": "Transfer",
            "value": "1000000"
        }))
        .unwrap()
    }

    #[test]
    fn test_process_tags_and_marks_once() {
        let (manager, _) = manager();
        manager
            .save_transaction_data(&[native_record(1, 1000)], true)
            .unwrap();

        let mut receiver = manager.subscribe_transactions();
        let processed = manager.process(true).unwrap();
        assert_eq!(processed.len(), 1);
        assert!(matches!(processed[0].decoration, Decoration::Native(_)));
        assert_eq!(processed[0].transaction.fee, Some(1100));

        let (published, initial) = receiver.borrow_and_update().clone();
        assert_eq!(published.len(), 1);
        assert!(initial);

        assert!(manager.process(false).unwrap().is_empty());
        assert!(!receiver.has_changed().unwrap());

        let outgoing = manager
            .get_full_transactions(&[vec!["outgoing".into()]], None, None)
            .unwrap();
        assert_eq!(outgoing.len(), 1);
        assert!(
            manager
                .get_full_transactions(&[vec!["incoming".into()]], None, None)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_native_record_supersedes_placeholder() {
        let (manager, db) = manager();
        manager
            .save_contract_transaction_data(&[token_record(2)], true)
            .unwrap();
        manager
            .save_transaction_data(&[native_record(2, 1000)], true)
            .unwrap();
        manager
            .save_contract_transaction_data(&[token_record(2)], true)
            .unwrap();

        let conn = db.conn().unwrap();
        let stored = TransactionRepository::new(&conn)
            .get_by_hashes(&[B256::from_str(&hash(2)).unwrap()])
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].block_number, Some(100));
        assert!(matches!(stored[0].contract(), Some(Contract::Transfer(_))));
        assert_eq!(TransactionRepository::new(&conn).get_events(None).unwrap().len(), 1);
    }

    #[test]
    fn test_internal_values_are_tolerant() {
        let (manager, db) = manager();
        manager
            .save_transaction_data(
                &[
                    internal_record(3, json!(1500)),
                    internal_record(4, json!("2500")),
                    internal_record(5, serde_json::Value::Null),
                ],
                true,
            )
            .unwrap();

        let conn = db.conn().unwrap();
        let repo = TransactionRepository::new(&conn);
        assert_eq!(repo.get_internal_transactions(None).unwrap().len(), 2);
        assert_eq!(repo.count().unwrap(), 2);
    }

    #[test]
    fn test_token_event_placeholder_is_incoming() {
        let (manager, _) = manager();
        manager
            .save_contract_transaction_data(&[token_record(6)], true)
            .unwrap();

        let processed = manager.process(false).unwrap();
        let tags = processed[0]
            .decoration
            .tags(&Address::from_hex(USER).unwrap());
        assert!(tags.contains(&"incoming".to_string()));
        assert!(tags.contains(&format!("trc20Incoming:{}", TOKEN)));
    }

    fn created_transaction(byte: u8) -> CreatedTransaction {
        serde_json::from_value(json!({
            "visible": true,
            "txID": hash(byte),
            "raw_data": {
                "contract": [{
                    "type": "TransferContract",
                    "parameter": {"value": {"amount": 5, "owner_address": USER, "to_address": OTHER}}
                }],
                "timestamp": 1_700_000_000_000i64
            },
            "raw_data_hex": "0a"
        }))
        .unwrap()
    }

    #[test]
    fn test_handle_keeps_confirmed_record() {
        let (manager, db) = manager();
        manager
            .save_transaction_data(&[native_record(9, 1000)], true)
            .unwrap();
        manager.process(true).unwrap();

        manager.handle(&created_transaction(9)).unwrap();

        let conn = db.conn().unwrap();
        let stored = TransactionRepository::new(&conn)
            .get_by_hashes(&[B256::from_str(&hash(9)).unwrap()])
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].confirmed);
        assert_eq!(stored[0].block_number, Some(100));
        assert_eq!(stored[0].fee, Some(1100));
        assert!(matches!(
            stored[0].contract(),
            Some(Contract::Transfer(transfer)) if transfer.amount == 100
        ));
    }

    #[test]
    fn test_handle_created_transaction() {
        let (manager, _) = manager();
        let created = created_transaction(7);

        let mut receiver = manager.subscribe_transactions();
        manager.handle(&created).unwrap();

        let (published, initial) = receiver.borrow_and_update().clone();
        assert!(!initial);
        assert_eq!(published.len(), 1);
        assert!(!published[0].transaction.confirmed);

        manager
            .save_transaction_data(&[native_record(7, 1_700_000_003_000)], true)
            .unwrap();
        let reprocessed = manager.process(false).unwrap();
        assert_eq!(reprocessed.len(), 1);
        assert!(reprocessed[0].transaction.confirmed);
    }

    #[test]
    fn test_withdraw_amount_folded_into_contract() {
        let record = TransactionData::from_json(json!({
            "txID": hash(8),
            "block_timestamp": 1000,
            "ret": [{"contractRet": "SUCCESS"}],
            "withdraw_amount": 777,
            "raw_data": {"contract": [{
                "type": "WithdrawBalanceContract",
                "parameter": {"value": {"owner_address": USER}}
            }]}
        }))
        .unwrap();

        let TransactionData::Regular(regular) = record else {
            panic!("expected a native record");
        };
        let transaction = native_transaction(&regular, true).unwrap();
        match transaction.contract() {
            Some(Contract::WithdrawBalance(withdraw)) => assert_eq!(withdraw.amount, Some(777)),
            other => panic!("unexpected contract {:?}", other),
        }
    }
}
