use crate::clock::unix_millis;
use crate::orchestrator::RefreshOrchestrator;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{error, info, warn};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_REDISCOVERY_WINDOW: Duration = Duration::from_secs(60 * 60);

/// True when `now_ms` falls in the first `interval_ms` of a rediscovery
/// window. Ticks spaced `interval_ms` apart hit this roughly once per window;
/// clock jitter near the boundary can skip a window or hit it twice.
pub fn should_rediscover(now_ms: u64, window_ms: u64, interval_ms: u64) -> bool {
    if window_ms == 0 {
        return true;
    }
    now_ms % window_ms < interval_ms
}

type WallClock = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Re-runs the orchestrator on a fixed interval. Passes may overlap; only the
/// timer is owned here.
pub struct Scheduler {
    orchestrator: Arc<RefreshOrchestrator>,
    interval: Duration,
    rediscovery_window: Duration,
    clock: WallClock,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(
        orchestrator: Arc<RefreshOrchestrator>,
        interval: Duration,
        rediscovery_window: Duration,
    ) -> Self {
        Self {
            orchestrator,
            interval,
            rediscovery_window,
            clock: Arc::new(unix_millis),
            timer: Mutex::new(None),
        }
    }

    /// Replaces the wall clock used for the rediscovery decision.
    pub fn with_clock(mut self, clock: impl Fn() -> u64 + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn is_running(&self) -> bool {
        self.timer
            .lock()
            .map(|timer| timer.as_ref().is_some_and(|handle| !handle.is_finished()))
            .unwrap_or(false)
    }

    /// Runs one pass with forced discovery now, then one pass per interval.
    pub fn start(&self) {
        let Ok(mut timer) = self.timer.lock() else {
            error!("Scheduler state poisoned, not starting");
            return;
        };
        if timer.as_ref().is_some_and(|handle| !handle.is_finished()) {
            warn!("Scheduler already running");
            return;
        }

        info!(
            "Starting price refresh every {:?} (rediscovery window {:?})",
            self.interval, self.rediscovery_window
        );

        let orchestrator = self.orchestrator.clone();
        let clock = self.clock.clone();
        let interval = self.interval;
        let window_ms = self.rediscovery_window.as_millis() as u64;
        let interval_ms = interval.as_millis() as u64;

        trigger_pass(orchestrator.clone(), true);

        *timer = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let force = should_rediscover(clock(), window_ms, interval_ms);
                trigger_pass(orchestrator.clone(), force);
            }
        }));
    }

    /// Cancels future ticks. Passes already running finish on their own.
    pub fn stop(&self) {
        let handle = match self.timer.lock() {
            Ok(mut timer) => timer.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            handle.abort();
            info!("Price refresh scheduler stopped");
        }
    }

    /// Runs a single pass outside the schedule.
    pub fn trigger(&self, force_discovery: bool) -> JoinHandle<()> {
        trigger_pass(self.orchestrator.clone(), force_discovery)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn trigger_pass(orchestrator: Arc<RefreshOrchestrator>, force_discovery: bool) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = orchestrator.run(force_discovery).await {
            error!("Price refresh pass failed: {:#}", e);
        }
    })
}
