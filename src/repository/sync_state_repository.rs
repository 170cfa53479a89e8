use super::models::ChainParameter;
use anyhow::Result;
use rusqlite::{OptionalExtension, params};

/// Scalar sync progress: last block height, history cursors and chain parameters.
pub struct SyncStateRepository<'a> {
    conn: &'a rusqlite::Connection,
}

impl<'a> SyncStateRepository<'a> {
    const UPSERT_BLOCK_HEIGHT: &'static str =
        "INSERT OR REPLACE INTO last_block_height (id, height) VALUES (0, ?1)";

    const GET_BLOCK_HEIGHT: &'static str = "SELECT height FROM last_block_height WHERE id = 0";

    const UPSERT_SYNC_TIMESTAMP: &'static str = "INSERT OR REPLACE INTO transaction_sync_states
        (id, last_transaction_timestamp) VALUES (?1, ?2)";

    const GET_SYNC_TIMESTAMP: &'static str =
        "SELECT last_transaction_timestamp FROM transaction_sync_states WHERE id = ?1";

    const UPSERT_CHAIN_PARAMETER: &'static str =
        "INSERT OR REPLACE INTO chain_parameters (key, value) VALUES (?1, ?2)";

    const GET_CHAIN_PARAMETERS: &'static str =
        "SELECT key, value FROM chain_parameters ORDER BY key";

    pub fn new(conn: &'a rusqlite::Connection) -> Self {
        Self { conn }
    }

    pub fn save_last_block_height(&self, height: u64) -> Result<()> {
        self.conn
            .execute(Self::UPSERT_BLOCK_HEIGHT, params![height as i64])?;
        Ok(())
    }

    pub fn get_last_block_height(&self) -> Result<Option<u64>> {
        let height: Option<i64> = self
            .conn
            .query_row(Self::GET_BLOCK_HEIGHT, [], |row| row.get(0))
            .optional()?;
        Ok(height.map(|h| h as u64))
    }

    pub fn save_sync_timestamp(&self, id: &str, timestamp: i64) -> Result<()> {
        self.conn
            .execute(Self::UPSERT_SYNC_TIMESTAMP, params![id, timestamp])?;
        Ok(())
    }

    pub fn get_sync_timestamp(&self, id: &str) -> Result<Option<i64>> {
        let timestamp: Option<i64> = self
            .conn
            .query_row(Self::GET_SYNC_TIMESTAMP, params![id], |row| row.get(0))
            .optional()?;
        Ok(timestamp)
    }

    pub fn save_chain_parameters(&self, parameters: &[ChainParameter]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(Self::UPSERT_CHAIN_PARAMETER)?;
            for parameter in parameters {
                stmt.execute(params![parameter.key, parameter.value])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get_chain_parameters(&self) -> Result<Vec<ChainParameter>> {
        let mut stmt = self.conn.prepare(Self::GET_CHAIN_PARAMETERS)?;
        let parameters = stmt
            .query_map([], |row| {
                Ok(ChainParameter {
                    key: row.get(0)?,
                    value: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{CONTRACT_SYNC_STATE_ID, Database, NATIVE_SYNC_STATE_ID};

    #[test]
    fn test_block_height_and_cursors() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();
        let repo = SyncStateRepository::new(&conn);

        assert_eq!(repo.get_last_block_height().unwrap(), None);
        repo.save_last_block_height(100).unwrap();
        repo.save_last_block_height(101).unwrap();
        assert_eq!(repo.get_last_block_height().unwrap(), Some(101));

        repo.save_sync_timestamp(NATIVE_SYNC_STATE_ID, 5000).unwrap();
        assert_eq!(repo.get_sync_timestamp(NATIVE_SYNC_STATE_ID).unwrap(), Some(5000));
        assert_eq!(repo.get_sync_timestamp(CONTRACT_SYNC_STATE_ID).unwrap(), None);
    }

    #[test]
    fn test_chain_parameters_upsert() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();
        let repo = SyncStateRepository::new(&conn);

        repo.save_chain_parameters(&[ChainParameter {
            key: "getEnergyFee".into(),
            value: 210,
        }])
        .unwrap();
        repo.save_chain_parameters(&[ChainParameter {
            key: "getEnergyFee".into(),
            value: 420,
        }])
        .unwrap();

        assert_eq!(
            repo.get_chain_parameters().unwrap(),
            vec![ChainParameter {
                key: "getEnergyFee".into(),
                value: 420
            }]
        );
    }
}
