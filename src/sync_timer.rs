use crate::error::SyncError;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncTimerState {
    Ready,
    NotReady(SyncError),
}

#[async_trait]
pub trait SyncTimerListener: Send + Sync {
    fn on_timer_state_changed(&self, state: SyncTimerState);

    /// Runs on its own task; ticks do not wait for the previous one.
    async fn on_tick(&self);
}

/// Shortest period the timer accepts; smaller intervals are raised to it.
pub const MIN_SYNC_INTERVAL: Duration = Duration::from_millis(100);

/// Periodic ticker gated on network connectivity.
///
/// `connectivity` is fed by whatever watches the network; `true` means
/// connected. While connected the listener is ticked immediately and then
/// every `interval`.
pub struct SyncTimer {
    interval: Duration,
    connectivity: watch::Receiver<bool>,
    state: Arc<watch::Sender<SyncTimerState>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SyncTimer {
    pub fn new(interval: Duration, connectivity: watch::Receiver<bool>) -> Self {
        Self {
            interval: interval.max(MIN_SYNC_INTERVAL),
            connectivity,
            state: Arc::new(watch::Sender::new(SyncTimerState::NotReady(
                SyncError::NotStarted,
            ))),
            task: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> SyncTimerState {
        self.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SyncTimerState> {
        self.state.subscribe()
    }

    pub fn start(&self, listener: Arc<dyn SyncTimerListener>) {
        self.abort_task();

        let handle = tokio::spawn(run(
            self.interval,
            self.connectivity.clone(),
            self.state.clone(),
            listener,
        ));

        if let Ok(mut task) = self.task.lock() {
            *task = Some(handle);
        }
    }

    pub fn stop(&self) {
        self.abort_task();
        self.state
            .send_replace(SyncTimerState::NotReady(SyncError::NotStarted));
    }

    fn abort_task(&self) {
        if let Ok(mut task) = self.task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
            }
        }
    }
}

impl Drop for SyncTimer {
    fn drop(&mut self) {
        self.abort_task();
    }
}

fn publish(
    state: &watch::Sender<SyncTimerState>,
    listener: &dyn SyncTimerListener,
    new_state: SyncTimerState,
) {
    let changed = state.send_if_modified(|current| {
        if *current != new_state {
            *current = new_state.clone();
            true
        } else {
            false
        }
    });

    if changed {
        debug!("Sync timer state: {:?}", new_state);
        listener.on_timer_state_changed(new_state);
    }
}

async fn run(
    interval: Duration,
    mut connectivity: watch::Receiver<bool>,
    state: Arc<watch::Sender<SyncTimerState>>,
    listener: Arc<dyn SyncTimerListener>,
) {
    // Once the monitor goes away the last known connectivity is kept.
    let mut monitor_alive = true;

    loop {
        let connected = *connectivity.borrow_and_update();

        if !connected {
            publish(
                &state,
                listener.as_ref(),
                SyncTimerState::NotReady(SyncError::NoNetworkConnection),
            );
            if connectivity.changed().await.is_err() {
                info!("Connectivity monitor closed while offline, sync timer stopped");
                return;
            }
            continue;
        }

        publish(&state, listener.as_ref(), SyncTimerState::Ready);

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let listener = listener.clone();
                    tokio::spawn(async move { listener.on_tick().await });
                }
                changed = connectivity.changed(), if monitor_alive => {
                    if changed.is_err() {
                        monitor_alive = false;
                    } else if !*connectivity.borrow() {
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingListener {
        ticks: AtomicUsize,
        states: Mutex<Vec<SyncTimerState>>,
    }

    #[async_trait]
    impl SyncTimerListener for CountingListener {
        fn on_timer_state_changed(&self, state: SyncTimerState) {
            self.states.lock().unwrap().push(state);
        }

        async fn on_tick(&self) {
            self.ticks.fetch_add(1, Ordering::SeqCst);
        }
    }

    const INTERVAL: Duration = Duration::from_millis(200);

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_ticks_immediately_then_every_interval() {
        let (_connectivity, receiver) = watch::channel(true);
        let timer = SyncTimer::new(INTERVAL, receiver);
        let listener = Arc::new(CountingListener::default());

        timer.start(listener.clone());
        settle().await;
        assert_eq!(timer.state(), SyncTimerState::Ready);
        assert_eq!(listener.ticks.load(Ordering::SeqCst), 1);

        tokio::time::sleep(INTERVAL).await;
        assert_eq!(listener.ticks.load(Ordering::SeqCst), 2);

        timer.stop();
        assert_eq!(
            timer.state(),
            SyncTimerState::NotReady(SyncError::NotStarted)
        );
        tokio::time::sleep(INTERVAL * 2).await;
        assert_eq!(listener.ticks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_interval_is_raised_to_minimum() {
        let (_connectivity, receiver) = watch::channel(true);
        let timer = SyncTimer::new(Duration::ZERO, receiver);
        assert_eq!(timer.interval(), MIN_SYNC_INTERVAL);

        let listener = Arc::new(CountingListener::default());
        timer.start(listener.clone());
        settle().await;
        assert_eq!(timer.state(), SyncTimerState::Ready);
        assert_eq!(listener.ticks.load(Ordering::SeqCst), 1);

        tokio::time::sleep(MIN_SYNC_INTERVAL * 2).await;
        assert!(listener.ticks.load(Ordering::SeqCst) >= 2);
        timer.stop();
    }

    #[tokio::test]
    async fn test_connectivity_loss_pauses_ticking() {
        let (connectivity, receiver) = watch::channel(false);
        let timer = SyncTimer::new(INTERVAL, receiver);
        let listener = Arc::new(CountingListener::default());

        timer.start(listener.clone());
        settle().await;
        assert_eq!(
            timer.state(),
            SyncTimerState::NotReady(SyncError::NoNetworkConnection)
        );
        assert_eq!(listener.ticks.load(Ordering::SeqCst), 0);

        connectivity.send_replace(true);
        settle().await;
        assert_eq!(timer.state(), SyncTimerState::Ready);
        assert_eq!(listener.ticks.load(Ordering::SeqCst), 1);

        connectivity.send_replace(false);
        settle().await;
        tokio::time::sleep(INTERVAL * 2).await;
        assert_eq!(listener.ticks.load(Ordering::SeqCst), 1);
        assert_eq!(
            listener.states.lock().unwrap().last(),
            Some(&SyncTimerState::NotReady(SyncError::NoNetworkConnection))
        );
    }
}
