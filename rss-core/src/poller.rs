use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::error::PollError;

pub const DEFAULT_POLLING_INTERVAL_MS: u64 = 600_000;

/// Persisted polling preferences.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PollingConfig {
    /// Unix time in milliseconds of the last completed poll.
    pub last_polled_at: Option<i64>,
    /// Interval in milliseconds.
    pub polling_interval: u64,
    pub enabled: bool,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            last_polled_at: None,
            polling_interval: DEFAULT_POLLING_INTERVAL_MS,
            enabled: true,
        }
    }
}

impl PollingConfig {
    /// Field-by-field validation; each bad field falls back on its own.
    pub fn from_value(value: &Value) -> Self {
        let defaults = Self::default();
        Self {
            last_polled_at: value.get("lastPolledAt").and_then(Value::as_i64),
            polling_interval: value
                .get("pollingInterval")
                .and_then(Value::as_u64)
                .filter(|ms| *ms > 0)
                .unwrap_or(defaults.polling_interval),
            enabled: value
                .get("enabled")
                .and_then(Value::as_bool)
                .unwrap_or(defaults.enabled),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval)
    }
}

/// Work run on every tick. The poller awaits it before the next tick.
pub type PollCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

pub fn poll_callback<F, Fut>(f: F) -> PollCallback
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move || Box::pin(f()))
}

/// Running timer. Dropping the handle aborts the task.
pub struct PollerHandle {
    cancel_tx: broadcast::Sender<()>,
    join: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub(crate) fn from_parts(cancel_tx: broadcast::Sender<()>, join: JoinHandle<()>) -> Self {
        Self {
            cancel_tx,
            join: Some(join),
        }
    }

    pub async fn stop(mut self) -> Result<(), PollError> {
        let _ = self.cancel_tx.send(());
        match self.join.take() {
            Some(join) => join.await.map_err(PollError::from),
            None => Ok(()),
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            join.abort();
        }
    }
}

/// Fires `on_tick` every `interval`, first one full interval from now.
pub fn spawn_poller(interval: Duration, on_tick: PollCallback) -> PollerHandle {
    let (cancel_tx, mut cancel_rx) = broadcast::channel(1);
    let join = tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel_rx.recv() => {
                    info!("poller shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    debug!("poll tick");
                    tokio::select! {
                        _ = cancel_rx.recv() => {
                            info!("poller shutdown requested during tick");
                            break;
                        }
                        _ = on_tick() => {}
                    }
                }
            }
        }
    });

    PollerHandle::from_parts(cancel_tx, join)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Active,
}

/// Starts the timer only while online with at least one subscription.
pub struct Poller {
    interval: Duration,
    enabled: bool,
    on_tick: PollCallback,
    active: Option<PollerHandle>,
}

impl Poller {
    pub fn new(interval: Duration, on_tick: PollCallback) -> Self {
        Self {
            interval,
            enabled: true,
            on_tick,
            active: None,
        }
    }

    pub fn from_config(config: &PollingConfig, on_tick: PollCallback) -> Self {
        Self {
            enabled: config.enabled,
            ..Self::new(config.interval(), on_tick)
        }
    }

    /// Takes effect on the next [`Poller::update`].
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn state(&self) -> PollState {
        if self.active.is_some() {
            PollState::Active
        } else {
            PollState::Idle
        }
    }

    /// Re-evaluates the gate. An already running timer keeps its phase.
    pub fn update(&mut self, is_online: bool, subscription_count: usize) -> PollState {
        let should_run = self.enabled && is_online && subscription_count > 0;
        match (should_run, self.active.is_some()) {
            (true, false) => {
                info!(interval = ?self.interval, "polling started");
                self.active = Some(spawn_poller(self.interval, self.on_tick.clone()));
            }
            (false, true) => {
                info!(is_online, subscription_count, "polling stopped");
                self.active = None;
            }
            _ => {}
        }
        self.state()
    }

    pub async fn stop(&mut self) -> Result<(), PollError> {
        match self.active.take() {
            Some(handle) => handle.stop().await,
            None => Ok(()),
        }
    }
}
