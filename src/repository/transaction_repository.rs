use super::models::{InternalTransaction, Trc20EventRecord, Transaction, TransactionTag};
use super::{address_from_row, hash_from_row, hash_hex};
use alloy_primitives::{B256, U256};
use anyhow::Result;
use rusqlite::{OptionalExtension, Row, ToSql, params, params_from_iter};
use std::str::FromStr;

pub struct TransactionRepository<'a> {
    conn: &'a rusqlite::Connection,
}

impl<'a> TransactionRepository<'a> {
    const COLUMNS: &'static str = "hash, timestamp, is_failed, block_number, fee, net_usage, net_fee,
        energy_usage, energy_fee, energy_usage_total, contracts_raw, confirmed, processed";

    // An existing full confirmed row keeps its processed flag; anything thinner
    // is superseded and has to be decorated again.
    const UPSERT_TRANSACTION: &'static str = "INSERT INTO transactions (
            hash, timestamp, is_failed, block_number, fee, net_usage, net_fee,
            energy_usage, energy_fee, energy_usage_total, contracts_raw, confirmed, processed
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        ON CONFLICT(hash) DO UPDATE SET
            timestamp = excluded.timestamp,
            is_failed = excluded.is_failed,
            block_number = excluded.block_number,
            fee = excluded.fee,
            net_usage = excluded.net_usage,
            net_fee = excluded.net_fee,
            energy_usage = excluded.energy_usage,
            energy_fee = excluded.energy_fee,
            energy_usage_total = excluded.energy_usage_total,
            contracts_raw = excluded.contracts_raw,
            confirmed = excluded.confirmed,
            processed = CASE
                WHEN transactions.confirmed = 1 AND transactions.contracts_raw IS NOT NULL
                THEN transactions.processed
                ELSE excluded.processed
            END";

    const INSERT_IF_NOT_EXISTS: &'static str = "INSERT OR IGNORE INTO transactions (
            hash, timestamp, is_failed, block_number, fee, net_usage, net_fee,
            energy_usage, energy_fee, energy_usage_total, contracts_raw, confirmed, processed
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)";

    const INSERT_INTERNAL: &'static str = "INSERT OR REPLACE INTO internal_transactions (
            transaction_hash, internal_tx_id, timestamp, from_address, to_address, value
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

    const INSERT_EVENT: &'static str = "INSERT OR IGNORE INTO trc20_events (
            transaction_hash, block_timestamp, contract_address, from_address, to_address,
            value, event_type, token_name, token_symbol, token_decimals
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)";

    const SELECT_INTERNAL: &'static str = "SELECT transaction_hash, internal_tx_id, timestamp,
        from_address, to_address, value FROM internal_transactions";

    const SELECT_EVENT: &'static str = "SELECT id, transaction_hash, block_timestamp,
        contract_address, from_address, to_address, value, event_type, token_name,
        token_symbol, token_decimals FROM trc20_events";

    const MARK_PROCESSED: &'static str = "UPDATE transactions SET processed = 1 WHERE hash = ?1";

    const DELETE_TAGS: &'static str = "DELETE FROM transaction_tags WHERE transaction_hash = ?1";

    const INSERT_TAG: &'static str =
        "INSERT OR IGNORE INTO transaction_tags (name, transaction_hash) VALUES (?1, ?2)";

    pub fn new(conn: &'a rusqlite::Connection) -> Self {
        Self { conn }
    }

    pub fn save(&self, transaction: &Transaction) -> Result<()> {
        self.conn
            .execute(Self::UPSERT_TRANSACTION, params_from_iter(Self::transaction_params(transaction)))?;
        Ok(())
    }

    /// Returns whether a new row was created.
    pub fn save_if_not_exists(&self, transaction: &Transaction) -> Result<bool> {
        let inserted = self
            .conn
            .execute(Self::INSERT_IF_NOT_EXISTS, params_from_iter(Self::transaction_params(transaction)))?;
        Ok(inserted > 0)
    }

    pub fn save_internal_transactions(&self, internals: &[InternalTransaction]) -> Result<usize> {
        let mut stmt = self.conn.prepare(Self::INSERT_INTERNAL)?;
        let mut count = 0;
        for internal in internals {
            count += stmt.execute(params![
                hash_hex(&internal.transaction_hash),
                internal.internal_tx_id,
                internal.timestamp,
                internal.from.hex(),
                internal.to.hex(),
                internal.value,
            ])?;
        }
        Ok(count)
    }

    pub fn save_events(&self, events: &[Trc20EventRecord]) -> Result<usize> {
        let mut stmt = self.conn.prepare(Self::INSERT_EVENT)?;
        let mut count = 0;
        for event in events {
            count += stmt.execute(params![
                hash_hex(&event.transaction_hash),
                event.block_timestamp,
                event.contract_address.hex(),
                event.from.hex(),
                event.to.hex(),
                event.value.to_string(),
                event.event_type,
                event.token_name,
                event.token_symbol,
                event.token_decimals,
            ])?;
        }
        Ok(count)
    }

    pub fn get_unprocessed(&self) -> Result<Vec<Transaction>> {
        let query = format!(
            "SELECT {} FROM transactions WHERE processed = 0 ORDER BY timestamp DESC, hash DESC",
            Self::COLUMNS
        );
        let mut stmt = self.conn.prepare(&query)?;
        let transactions = stmt
            .query_map([], Self::row_to_transaction)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(transactions)
    }

    pub fn mark_processed(&self, hashes: &[B256]) -> Result<()> {
        let mut stmt = self.conn.prepare(Self::MARK_PROCESSED)?;
        for hash in hashes {
            stmt.execute(params![hash_hex(hash)])?;
        }
        Ok(())
    }

    /// Replaces the whole tag set of every transaction in `hashes`.
    pub fn replace_tags(&self, hashes: &[B256], tags: &[TransactionTag]) -> Result<()> {
        let mut delete = self.conn.prepare(Self::DELETE_TAGS)?;
        for hash in hashes {
            delete.execute(params![hash_hex(hash)])?;
        }

        let mut insert = self.conn.prepare(Self::INSERT_TAG)?;
        for tag in tags {
            insert.execute(params![tag.name, hash_hex(&tag.transaction_hash)])?;
        }
        Ok(())
    }

    pub fn get_tags(&self, hashes: &[B256]) -> Result<Vec<TransactionTag>> {
        if hashes.is_empty() {
            return Ok(Vec::new());
        }

        let query = format!(
            "SELECT name, transaction_hash FROM transaction_tags WHERE transaction_hash IN ({}) ORDER BY name",
            Self::placeholders(hashes.len())
        );
        let mut stmt = self.conn.prepare(&query)?;
        let tags = stmt
            .query_map(params_from_iter(hashes.iter().map(hash_hex)), |row| {
                Ok(TransactionTag {
                    name: row.get(0)?,
                    transaction_hash: hash_from_row(row, 1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    pub fn get_by_hashes(&self, hashes: &[B256]) -> Result<Vec<Transaction>> {
        if hashes.is_empty() {
            return Ok(Vec::new());
        }

        let query = format!(
            "SELECT {} FROM transactions WHERE hash IN ({}) ORDER BY timestamp DESC, hash DESC",
            Self::COLUMNS,
            Self::placeholders(hashes.len())
        );
        let mut stmt = self.conn.prepare(&query)?;
        let transactions = stmt
            .query_map(
                params_from_iter(hashes.iter().map(hash_hex)),
                Self::row_to_transaction,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(transactions)
    }

    /// Newest-first page of transactions matching every tag group, where a
    /// group matches when any of its tags is attached. `from_hash` continues
    /// after the given transaction.
    pub fn get_before(
        &self,
        tag_groups: &[Vec<String>],
        from_hash: Option<&B256>,
        limit: Option<usize>,
    ) -> Result<Vec<Transaction>> {
        let mut conditions: Vec<String> = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        for group in tag_groups {
            if group.is_empty() {
                return Ok(Vec::new());
            }

            conditions.push(format!(
                "EXISTS (SELECT 1 FROM transaction_tags t
                    WHERE t.transaction_hash = transactions.hash AND t.name IN ({}))",
                Self::placeholders(group.len())
            ));
            for name in group {
                params.push(Box::new(name.clone()));
            }
        }

        if let Some(hash) = from_hash {
            let hash = hash_hex(hash);
            let anchor: Option<i64> = self
                .conn
                .query_row(
                    "SELECT timestamp FROM transactions WHERE hash = ?1",
                    params![hash],
                    |row| row.get(0),
                )
                .optional()?;

            let Some(timestamp) = anchor else {
                return Ok(Vec::new());
            };

            conditions.push("(timestamp < ? OR (timestamp = ? AND hash < ?))".to_string());
            params.push(Box::new(timestamp));
            params.push(Box::new(timestamp));
            params.push(Box::new(hash));
        }

        let mut query = format!("SELECT {} FROM transactions", Self::COLUMNS);
        if !conditions.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&conditions.join(" AND "));
        }
        query.push_str(" ORDER BY timestamp DESC, hash DESC");
        if let Some(limit) = limit {
            query.push_str(&format!(" LIMIT {limit}"));
        }

        let mut stmt = self.conn.prepare(&query)?;
        let transactions = stmt
            .query_map(params_from_iter(params), Self::row_to_transaction)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(transactions)
    }

    /// Internal transfers for `hashes`, or every stored one when `None`.
    pub fn get_internal_transactions(
        &self,
        hashes: Option<&[B256]>,
    ) -> Result<Vec<InternalTransaction>> {
        let query = Self::with_hash_filter(Self::SELECT_INTERNAL, hashes);
        let hash_params: Vec<String> = hashes.unwrap_or_default().iter().map(hash_hex).collect();

        let mut stmt = self.conn.prepare(&query)?;
        let internals = stmt
            .query_map(params_from_iter(hash_params), Self::row_to_internal)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(internals)
    }

    /// Token events for `hashes`, or every stored one when `None`.
    pub fn get_events(&self, hashes: Option<&[B256]>) -> Result<Vec<Trc20EventRecord>> {
        let query = Self::with_hash_filter(Self::SELECT_EVENT, hashes);
        let hash_params: Vec<String> = hashes.unwrap_or_default().iter().map(hash_hex).collect();

        let mut stmt = self.conn.prepare(&query)?;
        let events = stmt
            .query_map(params_from_iter(hash_params), Self::row_to_event)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    pub fn count(&self) -> Result<usize> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;
        Ok(count)
    }

    fn with_hash_filter(select: &str, hashes: Option<&[B256]>) -> String {
        match hashes {
            Some(hashes) if hashes.is_empty() => format!("{select} WHERE 0"),
            Some(hashes) => format!(
                "{select} WHERE transaction_hash IN ({})",
                Self::placeholders(hashes.len())
            ),
            None => select.to_string(),
        }
    }

    fn placeholders(count: usize) -> String {
        vec!["?"; count].join(", ")
    }

    fn transaction_params(transaction: &Transaction) -> Vec<Box<dyn ToSql>> {
        vec![
            Box::new(hash_hex(&transaction.hash)),
            Box::new(transaction.timestamp),
            Box::new(transaction.is_failed),
            Box::new(transaction.block_number),
            Box::new(transaction.fee),
            Box::new(transaction.net_usage),
            Box::new(transaction.net_fee),
            Box::new(transaction.energy_usage),
            Box::new(transaction.energy_fee),
            Box::new(transaction.energy_usage_total),
            Box::new(transaction.contracts_raw().map(str::to_string)),
            Box::new(transaction.confirmed),
            Box::new(transaction.processed),
        ]
    }

    fn row_to_transaction(row: &Row) -> rusqlite::Result<Transaction> {
        let mut transaction =
            Transaction::placeholder(hash_from_row(row, 0)?, row.get(1)?, row.get(11)?)
                .with_contracts_raw(row.get(10)?);
        transaction.is_failed = row.get(2)?;
        transaction.block_number = row.get(3)?;
        transaction.fee = row.get(4)?;
        transaction.net_usage = row.get(5)?;
        transaction.net_fee = row.get(6)?;
        transaction.energy_usage = row.get(7)?;
        transaction.energy_fee = row.get(8)?;
        transaction.energy_usage_total = row.get(9)?;
        transaction.processed = row.get(12)?;
        Ok(transaction)
    }

    fn row_to_internal(row: &Row) -> rusqlite::Result<InternalTransaction> {
        Ok(InternalTransaction {
            transaction_hash: hash_from_row(row, 0)?,
            internal_tx_id: row.get(1)?,
            timestamp: row.get(2)?,
            from: address_from_row(row, 3)?,
            to: address_from_row(row, 4)?,
            value: row.get(5)?,
        })
    }

    fn row_to_event(row: &Row) -> rusqlite::Result<Trc20EventRecord> {
        let value = U256::from_str(&row.get::<_, String>(6)?).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(Trc20EventRecord {
            id: row.get(0)?,
            transaction_hash: hash_from_row(row, 1)?,
            block_timestamp: row.get(2)?,
            contract_address: address_from_row(row, 3)?,
            from: address_from_row(row, 4)?,
            to: address_from_row(row, 5)?,
            value,
            event_type: row.get(7)?,
            token_name: row.get(8)?,
            token_symbol: row.get(9)?,
            token_decimals: row.get(10)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::contract::Contract;
    use crate::repository::Database;

    fn hash(byte: u8) -> B256 {
        B256::repeat_byte(byte)
    }

    fn full(hash: B256, timestamp: i64) -> Transaction {
        let mut transaction = Transaction::placeholder(hash, timestamp, true)
            .with_contracts_raw(Some("[]".to_string()));
        transaction.block_number = Some(100);
        transaction.fee = Some(1_100_000);
        transaction
    }

    fn address(byte: u8) -> Address {
        let mut raw = [byte; 21];
        raw[0] = 0x41;
        Address::from_bytes(&raw).unwrap()
    }

    fn tag(name: &str, hash: B256) -> TransactionTag {
        TransactionTag {
            name: name.to_string(),
            transaction_hash: hash,
        }
    }

    #[test]
    fn test_placeholder_never_overwrites_full_record() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();
        let repo = TransactionRepository::new(&conn);

        let record = full(hash(1), 1000);
        repo.save(&record).unwrap();
        assert!(!repo.save_if_not_exists(&Transaction::placeholder(hash(1), 5, true)).unwrap());

        let stored = repo.get_by_hashes(&[hash(1)]).unwrap();
        assert_eq!(stored, vec![record]);
    }

    #[test]
    fn test_loaded_row_carries_parsed_contract() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();
        let repo = TransactionRepository::new(&conn);

        let owner = address(0xaa);
        let contracts = serde_json::json!([{
            "type": "TransferContract",
            "parameter": {"value": {"amount": 42, "owner_address": owner.hex(), "to_address": address(0xbb).hex()}}
        }]);
        repo.save(
            &Transaction::placeholder(hash(9), 1000, true)
                .with_contracts_raw(Some(contracts.to_string())),
        )
        .unwrap();

        let stored = repo.get_by_hashes(&[hash(9)]).unwrap();
        assert!(matches!(
            stored[0].contract(),
            Some(Contract::Transfer(transfer)) if transfer.amount == 42 && transfer.owner_address == owner
        ));
        assert!(repo.get_by_hashes(&[hash(1)]).unwrap().is_empty());
    }

    #[test]
    fn test_full_record_supersedes_placeholder_and_reflags() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();
        let repo = TransactionRepository::new(&conn);

        repo.save_if_not_exists(&Transaction::placeholder(hash(2), 5, true)).unwrap();
        repo.mark_processed(&[hash(2)]).unwrap();

        let record = full(hash(2), 2000);
        repo.save(&record).unwrap();

        let stored = repo.get_by_hashes(&[hash(2)]).unwrap();
        assert_eq!(stored, vec![record]);
        assert!(!stored[0].processed);
    }

    #[test]
    fn test_refetched_full_record_keeps_processed_flag() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();
        let repo = TransactionRepository::new(&conn);

        repo.save(&full(hash(3), 3000)).unwrap();
        repo.mark_processed(&[hash(3)]).unwrap();
        repo.save(&full(hash(3), 3000)).unwrap();

        assert!(repo.get_unprocessed().unwrap().is_empty());
    }

    #[test]
    fn test_events_are_deduplicated() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();
        let repo = TransactionRepository::new(&conn);

        let event = Trc20EventRecord {
            id: None,
            transaction_hash: hash(4),
            block_timestamp: 4000,
            contract_address: address(9),
            from: address(1),
            to: address(2),
            value: U256::from(10),
            event_type: "Transfer".to_string(),
            token_name: "Tether USD".to_string(),
            token_symbol: "USDT".to_string(),
            token_decimals: 6,
        };

        assert_eq!(repo.save_events(&[event.clone(), event.clone()]).unwrap(), 1);

        let stored = repo.get_events(Some(&[hash(4)])).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].value, U256::from(10));
        assert_eq!(stored[0].contract_address, address(9));
        assert!(repo.get_events(Some(&[])).unwrap().is_empty());
        assert_eq!(repo.get_events(None).unwrap().len(), 1);
    }

    #[test]
    fn test_tag_groups_and_keyset_pagination() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();
        let repo = TransactionRepository::new(&conn);

        for (byte, timestamp) in [(1u8, 1000), (2, 2000), (3, 2000), (4, 3000)] {
            repo.save(&full(hash(byte), timestamp)).unwrap();
        }
        repo.replace_tags(
            &[hash(1), hash(2), hash(3), hash(4)],
            &[
                tag("TRX_outgoing", hash(1)),
                tag("outgoing", hash(1)),
                tag("TRX_incoming", hash(2)),
                tag("incoming", hash(2)),
                tag("trc20Transfer", hash(3)),
                tag("outgoing", hash(3)),
                tag("TRX_outgoing", hash(4)),
                tag("outgoing", hash(4)),
            ],
        )
        .unwrap();

        let all = repo.get_before(&[], None, None).unwrap();
        let order: Vec<B256> = all.iter().map(|t| t.hash).collect();
        assert_eq!(order, vec![hash(4), hash(3), hash(2), hash(1)]);

        let outgoing = repo
            .get_before(&[vec!["outgoing".into()]], None, None)
            .unwrap();
        assert_eq!(outgoing.len(), 3);

        let trx_outgoing = repo
            .get_before(
                &[
                    vec!["outgoing".into()],
                    vec!["TRX_outgoing".into(), "TRX_incoming".into()],
                ],
                None,
                None,
            )
            .unwrap();
        let order: Vec<B256> = trx_outgoing.iter().map(|t| t.hash).collect();
        assert_eq!(order, vec![hash(4), hash(1)]);

        let page = repo.get_before(&[], Some(&hash(3)), Some(1)).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].hash, hash(2));

        assert!(repo.get_before(&[vec![]], None, None).unwrap().is_empty());
        assert!(repo.get_before(&[], Some(&hash(9)), None).unwrap().is_empty());
    }

    #[test]
    fn test_replace_tags_is_full_replace() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();
        let repo = TransactionRepository::new(&conn);

        repo.save(&full(hash(5), 5000)).unwrap();
        repo.replace_tags(&[hash(5)], &[tag("incoming", hash(5))]).unwrap();
        repo.replace_tags(&[hash(5)], &[tag("outgoing", hash(5))]).unwrap();

        let tags = repo.get_tags(&[hash(5)]).unwrap();
        assert_eq!(tags, vec![tag("outgoing", hash(5))]);
    }
}
