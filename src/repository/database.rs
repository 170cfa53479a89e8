use anyhow::{Context, Result};
use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn new(db_path: &str) -> Result<Self> {
        let db_path = db_path.strip_prefix("sqlite:").unwrap_or(db_path);
        let conn = Connection::open(db_path).context("Failed to open database")?;

        let db = Database {
            conn: Mutex::new(conn),
        };
        db.create_tables()?;
        Ok(db)
    }

    pub fn in_memory() -> Result<Self> {
        Self::new(":memory:")
    }

    /// Locks the connection for the duration of one repository operation.
    pub fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Database connection mutex poisoned"))
    }

    fn create_tables(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS transactions (
                hash TEXT PRIMARY KEY,
                timestamp INTEGER NOT NULL,
                is_failed INTEGER NOT NULL,
                block_number INTEGER,
                fee INTEGER,
                net_usage INTEGER,
                net_fee INTEGER,
                energy_usage INTEGER,
                energy_fee INTEGER,
                energy_usage_total INTEGER,
                contracts_raw TEXT,
                confirmed INTEGER NOT NULL,
                processed INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_transactions_timestamp
             ON transactions(timestamp, hash)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_transactions_processed
             ON transactions(processed)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS internal_transactions (
                transaction_hash TEXT NOT NULL,
                internal_tx_id TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                from_address TEXT NOT NULL,
                to_address TEXT NOT NULL,
                value INTEGER NOT NULL,
                PRIMARY KEY (transaction_hash, internal_tx_id)
            )",
            [],
        )?;

        // Overlapping page re-fetches hit the unique key and are ignored
        conn.execute(
            "CREATE TABLE IF NOT EXISTS trc20_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                transaction_hash TEXT NOT NULL,
                block_timestamp INTEGER NOT NULL,
                contract_address TEXT NOT NULL,
                from_address TEXT NOT NULL,
                to_address TEXT NOT NULL,
                value TEXT NOT NULL,
                event_type TEXT NOT NULL,
                token_name TEXT NOT NULL,
                token_symbol TEXT NOT NULL,
                token_decimals INTEGER NOT NULL,
                UNIQUE (transaction_hash, contract_address, from_address, to_address, value, event_type)
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_trc20_events_hash
             ON trc20_events(transaction_hash)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS transaction_tags (
                name TEXT NOT NULL,
                transaction_hash TEXT NOT NULL,
                PRIMARY KEY (name, transaction_hash)
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_transaction_tags_hash
             ON transaction_tags(transaction_hash)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS balances (
                id TEXT PRIMARY KEY,
                balance TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS last_block_height (
                id INTEGER PRIMARY KEY CHECK (id = 0),
                height INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS transaction_sync_states (
                id TEXT PRIMARY KEY,
                last_transaction_timestamp INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS chain_parameters (
                key TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            )",
            [],
        )?;

        Ok(())
    }
}
