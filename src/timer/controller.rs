use std::sync::Arc;

use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
    time::{self, Duration, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use super::{
    clock::Clock,
    handoff::ExtractionHandoff,
    state::{BrewInputs, ExtractionTimer, TimerError, TimerSnapshot},
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

struct Ticker {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

impl Ticker {
    fn stop(self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

/// Drives an `ExtractionTimer` and refreshes the display while it runs.
///
/// Every transition publishes a snapshot on the watch channel. While the
/// timer is active a background task publishes one more snapshot per tick.
/// The tick task is stopped when the extraction finishes, on `shutdown`, and
/// when the controller is dropped.
pub struct TimerController {
    timer: Arc<Mutex<ExtractionTimer>>,
    ticker: Mutex<Option<Ticker>>,
    tick_interval: Duration,
    snapshots: Arc<watch::Sender<TimerSnapshot>>,
}

impl TimerController {
    pub fn new(clock: Arc<dyn Clock>, tick_interval: Duration) -> Self {
        let (snapshots, _) = watch::channel(TimerSnapshot::default());
        Self {
            timer: Arc::new(Mutex::new(ExtractionTimer::new(clock))),
            ticker: Mutex::new(None),
            tick_interval,
            snapshots: Arc::new(snapshots),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<TimerSnapshot> {
        self.snapshots.subscribe()
    }

    pub async fn snapshot(&self) -> TimerSnapshot {
        self.timer.lock().await.snapshot()
    }

    pub async fn is_ticking(&self) -> bool {
        self.ticker
            .lock()
            .await
            .as_ref()
            .is_some_and(|ticker| !ticker.handle.is_finished())
    }

    pub async fn start(&self, inputs: &BrewInputs) -> Result<TimerSnapshot, TimerError> {
        let snapshot = {
            let mut timer = self.timer.lock().await;
            timer.start(inputs)?;
            timer.snapshot()
        };
        log_info!("Extraction started for {}", inputs.bean_type.trim());
        self.spawn_ticker().await;
        self.publish(snapshot.clone());
        Ok(snapshot)
    }

    pub async fn begin_lap(&self) -> TimerSnapshot {
        self.transition(|timer| timer.begin_lap()).await
    }

    pub async fn adjust_amount(&self, delta: f64) -> TimerSnapshot {
        self.transition(|timer| timer.adjust_amount(delta)).await
    }

    pub async fn reset_amount(&self) -> TimerSnapshot {
        self.transition(|timer| timer.reset_amount()).await
    }

    /// Returns whether the pour was recorded.
    pub async fn confirm_lap(&self) -> bool {
        let (confirmed, snapshot) = {
            let mut timer = self.timer.lock().await;
            let confirmed = timer.confirm_lap();
            (confirmed, timer.snapshot())
        };
        self.publish(snapshot);
        confirmed
    }

    pub async fn cancel_lap(&self) -> TimerSnapshot {
        self.transition(|timer| timer.cancel_lap()).await
    }

    pub async fn finish(&self) -> Option<ExtractionHandoff> {
        let (handoff, snapshot) = {
            let mut timer = self.timer.lock().await;
            let handoff = timer.finish();
            (handoff, timer.snapshot())
        };
        if handoff.is_some() {
            self.cancel_ticker().await;
            log_info!("Extraction finished");
        }
        self.publish(snapshot);
        handoff
    }

    /// Stops the tick task without touching timer state.
    pub async fn shutdown(&self) {
        self.cancel_ticker().await;
    }

    async fn transition<F>(&self, apply: F) -> TimerSnapshot
    where
        F: FnOnce(&mut ExtractionTimer),
    {
        let snapshot = {
            let mut timer = self.timer.lock().await;
            apply(&mut timer);
            timer.snapshot()
        };
        self.publish(snapshot.clone());
        snapshot
    }

    fn publish(&self, snapshot: TimerSnapshot) {
        self.snapshots.send_replace(snapshot);
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(previous) = ticker_guard.take() {
            previous.stop();
        }

        let timer = self.timer.clone();
        let snapshots = self.snapshots.clone();
        let tick_interval = self.tick_interval;
        let cancel = CancellationToken::new();
        let cancel_for_task = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let snapshot = {
                            let guard = timer.lock().await;
                            if !guard.phase().is_active() {
                                break;
                            }
                            guard.snapshot()
                        };
                        snapshots.send_replace(snapshot);
                    }
                    _ = cancel_for_task.cancelled() => {
                        break;
                    }
                }
            }
            log_debug!("extraction tick loop stopped");
        });

        *ticker_guard = Some(Ticker { handle, cancel });
    }

    async fn cancel_ticker(&self) {
        if let Some(ticker) = self.ticker.lock().await.take() {
            ticker.stop();
        }
    }
}

impl Drop for TimerController {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.get_mut().take() {
            ticker.stop();
        }
    }
}
