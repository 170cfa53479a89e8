use crate::address::Address;
use crate::gateway::AccountInfo;
use crate::repository::{Balance, BalanceRepository, Database, NATIVE_BALANCE_ID};
use alloy_primitives::U256;
use anyhow::Result;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tracing::{debug, info};

/// Owns the stored balances and publishes them on change.
pub struct AccountInfoManager {
    db: Arc<Database>,
    account_active: AtomicBool,
    trx_balance: watch::Sender<U256>,
    trc20_balances: watch::Sender<HashMap<Address, U256>>,
}

impl AccountInfoManager {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let stored = {
            let conn = db.conn()?;
            BalanceRepository::new(&conn).get_all()?
        };

        let mut trx_balance = U256::ZERO;
        let mut trc20_balances = HashMap::new();
        for balance in stored {
            if balance.id == NATIVE_BALANCE_ID {
                trx_balance = balance.balance;
            } else if let Some(address) = balance
                .id
                .strip_prefix("TRC20|")
                .and_then(|a| Address::from_str(a).ok())
            {
                trc20_balances.insert(address, balance.balance);
            }
        }

        Ok(Self {
            db,
            account_active: AtomicBool::new(true),
            trx_balance: watch::Sender::new(trx_balance),
            trc20_balances: watch::Sender::new(trc20_balances),
        })
    }

    pub fn is_account_active(&self) -> bool {
        self.account_active.load(Ordering::SeqCst)
    }

    pub fn trx_balance(&self) -> U256 {
        *self.trx_balance.borrow()
    }

    pub fn trc20_balance(&self, contract: &Address) -> U256 {
        self.trc20_balances
            .borrow()
            .get(contract)
            .copied()
            .unwrap_or_default()
    }

    pub fn subscribe_trx_balance(&self) -> watch::Receiver<U256> {
        self.trx_balance.subscribe()
    }

    pub fn subscribe_trc20_balances(&self) -> watch::Receiver<HashMap<Address, U256>> {
        self.trc20_balances.subscribe()
    }

    /// Replaces every stored balance with the fetched snapshot.
    pub fn handle(&self, info: &AccountInfo) -> Result<()> {
        let trx_balance = U256::from(info.balance.max(0) as u64);

        let mut balances = vec![Balance {
            id: NATIVE_BALANCE_ID.to_string(),
            balance: trx_balance,
        }];
        balances.extend(info.trc20.iter().map(|(contract, value)| Balance {
            id: Balance::trc20_id(contract),
            balance: *value,
        }));

        {
            let conn = self.db.conn()?;
            BalanceRepository::new(&conn).replace_all(&balances)?;
        }

        self.account_active.store(true, Ordering::SeqCst);

        let trx_changed = self.trx_balance.send_if_modified(|current| {
            if *current != trx_balance {
                *current = trx_balance;
                true
            } else {
                false
            }
        });
        let trc20_changed = self.trc20_balances.send_if_modified(|current| {
            if *current != info.trc20 {
                *current = info.trc20.clone();
                true
            } else {
                false
            }
        });

        if trx_changed || trc20_changed {
            info!(
                "Balances updated: {} sun, {} tokens",
                trx_balance,
                info.trc20.len()
            );
        } else {
            debug!("Balances unchanged");
        }

        Ok(())
    }

    pub fn handle_inactive_account(&self) {
        if self.account_active.swap(false, Ordering::SeqCst) {
            info!("Account is not activated on chain");
        }
    }
}
