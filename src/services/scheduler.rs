use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::config::{AppConfig, DEFAULT_TICK_SECS, DEFAULT_WINDOW_SECS};
use crate::db::ReminderStore;
use crate::services::notification::{DispatchOutcome, NotificationDispatcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub tick_period: Duration,
    pub look_ahead: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_secs(DEFAULT_TICK_SECS),
            look_ahead: Duration::from_secs(DEFAULT_WINDOW_SECS),
        }
    }
}

impl From<&AppConfig> for SchedulerConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            tick_period: config.tick_period,
            look_ahead: config.look_ahead,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Stopped,
    Running,
}

/// Summary of one tick.
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    /// Another tick still held the lock; nothing was queried.
    pub overlapped: bool,
    /// `now + look_ahead` is not representable; nothing was queried.
    pub window_overflowed: bool,
    pub query_failed: bool,
    pub candidates: usize,
    pub delivered: usize,
    pub skipped: usize,
    pub no_subscription: usize,
    pub subscriptions_invalidated: usize,
    pub failed: usize,
    pub errors: usize,
}

impl TickReport {
    fn new(window_start: DateTime<Utc>, window_end: DateTime<Utc>) -> Self {
        Self {
            window_start,
            window_end,
            overlapped: false,
            window_overflowed: false,
            query_failed: false,
            candidates: 0,
            delivered: 0,
            skipped: 0,
            no_subscription: 0,
            subscriptions_invalidated: 0,
            failed: 0,
            errors: 0,
        }
    }

    fn record(&mut self, outcome: DispatchOutcome) {
        match outcome {
            DispatchOutcome::Delivered => self.delivered += 1,
            DispatchOutcome::Skipped => self.skipped += 1,
            DispatchOutcome::NoSubscription => self.no_subscription += 1,
            DispatchOutcome::SubscriptionInvalidated => self.subscriptions_invalidated += 1,
            DispatchOutcome::DeliveryFailed => self.failed += 1,
        }
    }
}

struct RunningLoop {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Periodically scans for reminders due within the look-ahead window and
/// hands each one to the dispatcher.
pub struct ReminderScheduler {
    reminders: Arc<dyn ReminderStore>,
    dispatcher: Arc<NotificationDispatcher>,
    config: SchedulerConfig,
    tick_lock: tokio::sync::Mutex<()>,
    running: Mutex<Option<RunningLoop>>,
}

impl ReminderScheduler {
    pub fn new(
        reminders: Arc<dyn ReminderStore>,
        dispatcher: Arc<NotificationDispatcher>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            reminders,
            dispatcher,
            config,
            tick_lock: tokio::sync::Mutex::new(()),
            running: Mutex::new(None),
        }
    }

    pub fn config(&self) -> SchedulerConfig {
        self.config
    }

    pub fn state(&self) -> SchedulerState {
        let running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        match running.as_ref() {
            Some(running) if !running.handle.is_finished() => SchedulerState::Running,
            _ => SchedulerState::Stopped,
        }
    }

    /// Spawns the tick loop. Returns `false` if it was already running or the
    /// tick period cannot be scheduled.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            warn!("Reminder scheduler already running");
            return false;
        }

        let period = self.config.tick_period;
        let first_tick = match Instant::now().checked_add(period) {
            Some(at) if !period.is_zero() => at,
            _ => {
                error!("Cannot start reminder scheduler with tick period {:?}", period);
                return false;
            }
        };

        info!(
            "Starting reminder scheduler (interval: {:?}, window: {:?})",
            self.config.tick_period, self.config.look_ahead
        );

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(first_tick, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = interval.tick() => {
                        // A tick in progress runs to completion before shutdown is observed.
                        scheduler.tick().await;
                    }
                }
            }

            info!("Reminder scheduler stopped");
        });

        *running = Some(RunningLoop { shutdown, handle });
        true
    }

    /// Stops the tick loop and waits for the current tick, if any, to finish.
    pub async fn stop(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        let Some(RunningLoop { shutdown, handle }) = running else {
            return;
        };

        let _ = shutdown.send(true);
        if let Err(e) = handle.await {
            error!("Reminder scheduler task ended abnormally: {}", e);
        }
    }

    pub async fn tick(&self) -> TickReport {
        self.tick_at(Utc::now()).await
    }

    /// Runs one tick as if the clock read `now`.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> TickReport {
        let Some(window_end) = self.window_end(now) else {
            error!(
                "Reminder window of {:?} from {} is out of range, skipping tick",
                self.config.look_ahead, now
            );
            let mut report = TickReport::new(now, now);
            report.window_overflowed = true;
            return report;
        };
        let mut report = TickReport::new(now, window_end);

        let Ok(_guard) = self.tick_lock.try_lock() else {
            warn!("Previous reminder tick still running, skipping this one");
            report.overlapped = true;
            return report;
        };

        let candidates = match self.reminders.find_due(now, window_end).await {
            Ok(candidates) => candidates,
            Err(e) => {
                error!("Error in reminder scheduler: {}", e);
                report.query_failed = true;
                return report;
            }
        };
        report.candidates = candidates.len();

        for reminder in &candidates {
            match self.dispatcher.dispatch(reminder).await {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    warn!("Error dispatching reminder {}: {}", reminder.id, e);
                    report.errors += 1;
                }
            }
        }

        if report.candidates > 0 {
            info!(
                "Reminder tick processed {} candidates - delivered: {}, skipped: {}, no subscription: {}, invalidated: {}, failed: {}, errors: {}",
                report.candidates,
                report.delivered,
                report.skipped,
                report.no_subscription,
                report.subscriptions_invalidated,
                report.failed,
                report.errors
            );
        }

        report
    }

    fn window_end(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let width = chrono::Duration::from_std(self.config.look_ahead).ok()?;
        now.checked_add_signed(width)
    }
}
