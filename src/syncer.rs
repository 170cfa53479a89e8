use crate::account::AccountInfoManager;
use crate::address::Address;
use crate::error::{GatewayError, SyncError};
use crate::gateway::{Gateway, PageQuery};
use crate::repository::{
    CONTRACT_SYNC_STATE_ID, Database, NATIVE_SYNC_STATE_ID, SyncStateRepository,
};
use crate::sync_timer::{SyncTimer, SyncTimerListener, SyncTimerState};
use crate::transaction_manager::TransactionManager;
use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

const PAGE_LIMIT: u32 = 200;
/// Lower bound of the next history request relative to the stored cursor.
const CURSOR_STEP_MS: i64 = 1000;

#[derive(Debug, Clone, PartialEq)]
pub enum SyncState {
    Syncing { progress: Option<f64> },
    Synced,
    NotSynced(SyncError),
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::Syncing { progress: Some(p) } => write!(f, "syncing ({:.0}%)", p * 100.0),
            SyncState::Syncing { progress: None } => write!(f, "syncing"),
            SyncState::Synced => write!(f, "synced"),
            SyncState::NotSynced(e) => write!(f, "not synced: {}", e),
        }
    }
}

/// Clears the in-flight flag however the cycle ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct Syncer {
    address: Address,
    gateway: Arc<dyn Gateway>,
    db: Arc<Database>,
    account_info_manager: Arc<AccountInfoManager>,
    transaction_manager: Arc<TransactionManager>,
    timer: SyncTimer,
    in_flight: AtomicBool,
    cancel: Mutex<CancellationToken>,
    state: watch::Sender<SyncState>,
    last_block_height: watch::Sender<u64>,
}

impl Syncer {
    pub fn new(
        address: Address,
        gateway: Arc<dyn Gateway>,
        db: Arc<Database>,
        account_info_manager: Arc<AccountInfoManager>,
        transaction_manager: Arc<TransactionManager>,
        sync_interval: Duration,
        connectivity: watch::Receiver<bool>,
    ) -> Result<Self> {
        let last_block_height = {
            let conn = db.conn()?;
            SyncStateRepository::new(&conn)
                .get_last_block_height()?
                .unwrap_or_default()
        };

        Ok(Self {
            address,
            gateway,
            db,
            account_info_manager,
            transaction_manager,
            timer: SyncTimer::new(sync_interval, connectivity),
            in_flight: AtomicBool::new(false),
            cancel: Mutex::new(CancellationToken::new()),
            state: watch::Sender::new(SyncState::NotSynced(SyncError::NotStarted)),
            last_block_height: watch::Sender::new(last_block_height),
        })
    }

    pub fn state(&self) -> SyncState {
        self.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    pub fn last_block_height(&self) -> u64 {
        *self.last_block_height.borrow()
    }

    pub fn subscribe_last_block_height(&self) -> watch::Receiver<u64> {
        self.last_block_height.subscribe()
    }

    pub fn timer_state(&self) -> SyncTimerState {
        self.timer.state()
    }

    pub fn start(self: &Arc<Self>) {
        if let Ok(mut cancel) = self.cancel.lock() {
            if cancel.is_cancelled() {
                *cancel = CancellationToken::new();
            }
        }
        self.timer.start(self.clone());
    }

    /// Stops ticking and cancels any cycle in flight.
    pub fn stop(&self) {
        if let Ok(cancel) = self.cancel.lock() {
            cancel.cancel();
        }
        self.timer.stop();
        self.set_state(SyncState::NotSynced(SyncError::NotStarted));
    }

    /// Syncs right away when the timer is running, otherwise restarts it.
    pub fn refresh(self: &Arc<Self>) {
        match self.timer.state() {
            SyncTimerState::Ready => {
                let syncer = self.clone();
                tokio::spawn(async move { syncer.sync().await });
            }
            SyncTimerState::NotReady(_) => self.start(),
        }
    }

    /// Runs one sync cycle unless another one is still in flight.
    pub async fn sync(&self) {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            debug!("Sync already in flight, skipping");
            return;
        }
        let _in_flight = InFlight(&self.in_flight);

        let cancel = match self.cancel.lock() {
            Ok(cancel) => cancel.clone(),
            Err(_) => return,
        };

        let result = tokio::select! {
            result = self.run_cycle() => result,
            _ = cancel.cancelled() => {
                info!("Sync cycle cancelled");
                return;
            }
        };

        if let Err(e) = result {
            error!("Sync failed: {:#}", e);
            self.set_state(SyncState::NotSynced(SyncError::Failed(e.to_string())));
        }
    }

    async fn run_cycle(&self) -> Result<()> {
        let height = self.gateway.get_block_height().await?;

        if height == self.last_block_height() && self.state() == SyncState::Synced {
            debug!("Block height {} unchanged, nothing to sync", height);
            return Ok(());
        }

        self.set_state(SyncState::Syncing { progress: None });
        info!("Syncing at block height {}", height);

        {
            let conn = self.db.conn()?;
            SyncStateRepository::new(&conn).save_last_block_height(height)?;
        }
        self.last_block_height.send_if_modified(|current| {
            if *current != height {
                *current = height;
                true
            } else {
                false
            }
        });

        match self.gateway.get_account_info(&self.address).await {
            Ok(info) => self.account_info_manager.handle(&info)?,
            Err(GatewayError::NoAccountInfo) => self.account_info_manager.handle_inactive_account(),
            Err(e) => return Err(e.into()),
        }

        let (native_cursor, contract_cursor) = {
            let conn = self.db.conn()?;
            let repo = SyncStateRepository::new(&conn);
            (
                repo.get_sync_timestamp(NATIVE_SYNC_STATE_ID)?.unwrap_or_default(),
                repo.get_sync_timestamp(CONTRACT_SYNC_STATE_ID)?.unwrap_or_default(),
            )
        };

        futures::try_join!(
            self.sync_transactions(native_cursor),
            self.sync_contract_transactions(contract_cursor)
        )?;

        let initial = native_cursor == 0 || contract_cursor == 0;
        self.transaction_manager.process(initial)?;

        self.set_state(SyncState::Synced);
        info!("Sync complete at block height {}", height);
        Ok(())
    }

    async fn sync_transactions(&self, cursor: i64) -> Result<()> {
        let mut query = first_page(cursor);
        let mut stored = cursor;

        loop {
            let page = self.gateway.get_transactions(&self.address, &query).await?;
            debug!("Fetched {} transactions", page.data.len());

            self.transaction_manager.save_transaction_data(&page.data, true)?;

            if let Some(max) = page.data.iter().map(|tx| tx.block_timestamp()).max() {
                stored = self.advance_cursor(NATIVE_SYNC_STATE_ID, stored, max)?;
            }

            match page.fingerprint {
                Some(fingerprint) if !page.data.is_empty() => query.fingerprint = Some(fingerprint),
                _ => return Ok(()),
            }
        }
    }

    async fn sync_contract_transactions(&self, cursor: i64) -> Result<()> {
        let mut query = first_page(cursor);
        let mut stored = cursor;

        loop {
            let page = self
                .gateway
                .get_contract_transactions(&self.address, &query)
                .await?;
            debug!("Fetched {} token transfers", page.data.len());

            self.transaction_manager
                .save_contract_transaction_data(&page.data, true)?;

            if let Some(max) = page.data.iter().map(|tx| tx.block_timestamp).max() {
                stored = self.advance_cursor(CONTRACT_SYNC_STATE_ID, stored, max)?;
            }

            match page.fingerprint {
                Some(fingerprint) if !page.data.is_empty() => query.fingerprint = Some(fingerprint),
                _ => return Ok(()),
            }
        }
    }

    /// Persists progress after every page so a crash resumes from here.
    fn advance_cursor(&self, id: &str, stored: i64, candidate: i64) -> Result<i64> {
        if candidate <= stored {
            return Ok(stored);
        }
        let conn = self.db.conn()?;
        SyncStateRepository::new(&conn).save_sync_timestamp(id, candidate)?;
        Ok(candidate)
    }

    fn set_state(&self, new_state: SyncState) {
        self.state.send_if_modified(|current| {
            if *current != new_state {
                *current = new_state;
                true
            } else {
                false
            }
        });
    }
}

fn first_page(cursor: i64) -> PageQuery {
    PageQuery {
        min_timestamp: cursor + CURSOR_STEP_MS,
        fingerprint: None,
        limit: PAGE_LIMIT,
        only_confirmed: true,
    }
}

#[async_trait]
impl SyncTimerListener for Syncer {
    fn on_timer_state_changed(&self, state: SyncTimerState) {
        if let SyncTimerState::NotReady(error) = state {
            self.set_state(SyncState::NotSynced(error));
        }
    }

    async fn on_tick(&self) {
        self.sync().await;
    }
}
