//! Periodic read timer used when the control characteristic cannot notify.

use log::{debug, info};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Generations are unique process-wide so a tick can never match a later session's timer.
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// One timer firing. The generation ties it to the `start` call that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTick {
    pub generation: u64,
}

struct ActivePoll {
    generation: u64,
    interval: Duration,
    cancel_token: CancellationToken,
    task_handle: JoinHandle<()>,
}

/// At most one recurring timer. Ticks are handed to the `on_tick` callback given
/// to [`start`](PollScheduler::start); the receiver checks them with
/// [`accepts`](PollScheduler::accepts) so that ticks already queued when
/// [`stop`](PollScheduler::stop) returns are dropped.
#[derive(Default)]
pub struct PollScheduler {
    active: Option<ActivePoll>,
}

impl PollScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts firing `on_tick` every `interval`, the first time one interval from now.
    ///
    /// Returns `false` without doing anything if a timer is already running.
    /// Must be called from within a tokio runtime.
    pub fn start<F>(&mut self, interval: Duration, on_tick: F) -> bool
    where
        F: Fn(PollTick) + Send + 'static,
    {
        if self.active.is_some() {
            debug!("Poll timer already running, ignoring start.");
            return false;
        }

        let generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
        let cancel_token = CancellationToken::new();
        let cancel_for_task = cancel_token.clone();

        let task_handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel_for_task.cancelled() => break,
                    _ = ticker.tick() => {
                        if cancel_for_task.is_cancelled() {
                            break;
                        }
                        on_tick(PollTick { generation });
                    }
                }
            }
        });

        self.active = Some(ActivePoll {
            generation,
            interval,
            cancel_token,
            task_handle,
        });
        info!(
            "Started periodic control characteristic reads every {} seconds.",
            interval.as_secs_f64()
        );
        true
    }

    /// Cancels the timer. A no-op when nothing is running.
    pub fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel_token.cancel();
            active.task_handle.abort();
            debug!("Poll timer (generation {}) stopped.", active.generation);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn interval(&self) -> Option<Duration> {
        self.active.as_ref().map(|a| a.interval)
    }

    /// Whether `tick` comes from the currently running timer.
    pub fn accepts(&self, tick: PollTick) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| a.generation == tick.generation)
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
