use super::models::Balance;
use alloy_primitives::U256;
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};
use std::str::FromStr;

pub struct BalanceRepository<'a> {
    conn: &'a Connection,
}

impl<'a> BalanceRepository<'a> {
    const DELETE_ALL: &'static str = "DELETE FROM balances";

    const INSERT_BALANCE: &'static str = "INSERT INTO balances (id, balance) VALUES (?1, ?2)";

    const SELECT_BALANCE: &'static str = "SELECT balance FROM balances WHERE id = ?1";

    const SELECT_ALL: &'static str = "SELECT id, balance FROM balances ORDER BY id";

    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Replaces every stored balance with `balances`.
    pub fn replace_all(&self, balances: &[Balance]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(Self::DELETE_ALL, [])?;
        {
            let mut stmt = tx.prepare(Self::INSERT_BALANCE)?;
            for balance in balances {
                stmt.execute(params![balance.id, balance.balance.to_string()])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<U256>> {
        let value: Option<String> = self
            .conn
            .query_row(Self::SELECT_BALANCE, params![id], |row| row.get(0))
            .optional()?;

        value
            .map(|v| {
                U256::from_str(&v)
                    .map_err(|_| anyhow::anyhow!("Invalid balance format in database: {}", v))
            })
            .transpose()
    }

    pub fn get_all(&self) -> Result<Vec<Balance>> {
        let mut stmt = self.conn.prepare(Self::SELECT_ALL)?;
        let balances = stmt
            .query_map([], |row| {
                let value = U256::from_str(&row.get::<_, String>(1)?).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        1,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                Ok(Balance {
                    id: row.get(0)?,
                    balance: value,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(balances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{Database, NATIVE_BALANCE_ID};

    #[test]
    fn test_replace_all_drops_stale_tokens() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();
        let repo = BalanceRepository::new(&conn);

        repo.replace_all(&[
            Balance {
                id: NATIVE_BALANCE_ID.to_string(),
                balance: U256::from(10),
            },
            Balance {
                id: "TRC20|TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t".to_string(),
                balance: U256::from(5),
            },
        ])
        .unwrap();

        repo.replace_all(&[Balance {
            id: NATIVE_BALANCE_ID.to_string(),
            balance: U256::from(20),
        }])
        .unwrap();

        assert_eq!(repo.get(NATIVE_BALANCE_ID).unwrap(), Some(U256::from(20)));
        assert_eq!(
            repo.get("TRC20|TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t").unwrap(),
            None
        );
        assert_eq!(repo.get_all().unwrap().len(), 1);
    }

    #[test]
    fn test_large_values_survive_storage() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();
        let repo = BalanceRepository::new(&conn);

        repo.replace_all(&[Balance {
            id: "TRC20|x".to_string(),
            balance: U256::MAX,
        }])
        .unwrap();

        assert_eq!(repo.get("TRC20|x").unwrap(), Some(U256::MAX));
    }
}
