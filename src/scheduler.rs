//! Countdown-driven refresh loop.
//!
//! [`RefreshScheduler`] is the pure countdown state machine. [`spawn_refresh_loop`]
//! drives it from a single tokio task that owns every fetch, so two downloads
//! of the sheet are never in flight at the same time.

use std::sync::Arc;
use std::time::Instant as StdInstant;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

use crate::dashboard::DashboardHandle;
use crate::observability::{
    log_countdown, log_refresh_interval_changed, log_refresh_interval_persist_error,
    log_refresh_loop_join_error, log_refresh_loop_started, log_refresh_loop_stopped,
    log_source_refresh_error, log_source_refresh_ok,
};
use crate::preferences::{save_refresh_interval, PreferenceStore};
use crate::source::{fetch_sales_records, CsvFetcher};

const TICK: Duration = Duration::from_secs(1);
const COMMAND_BUFFER: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Counting { remaining_secs: u64 },
    Refreshing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Idle,
    Counting { remaining_secs: u64 },
    Expired,
    Refreshing,
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("refresh interval must be at least 1 second")]
    ZeroInterval,
    #[error("refresh loop is not running")]
    LoopStopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshScheduler {
    interval_secs: u64,
    state: SchedulerState,
}

impl RefreshScheduler {
    pub fn new(interval_secs: u64) -> Result<Self, SchedulerError> {
        if interval_secs == 0 {
            return Err(SchedulerError::ZeroInterval);
        }
        Ok(Self {
            interval_secs,
            state: SchedulerState::Idle,
        })
    }

    pub fn interval_secs(&self) -> u64 {
        self.interval_secs
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Starts (or restarts) the countdown from the full interval.
    pub fn start(&mut self) {
        self.state = SchedulerState::Counting {
            remaining_secs: self.interval_secs,
        };
    }

    pub fn tick(&mut self) -> TickOutcome {
        match self.state {
            SchedulerState::Idle => TickOutcome::Idle,
            SchedulerState::Refreshing => TickOutcome::Refreshing,
            SchedulerState::Counting { remaining_secs } => {
                let remaining_secs = remaining_secs.saturating_sub(1);
                if remaining_secs == 0 {
                    self.state = SchedulerState::Refreshing;
                    TickOutcome::Expired
                } else {
                    self.state = SchedulerState::Counting { remaining_secs };
                    TickOutcome::Counting { remaining_secs }
                }
            }
        }
    }

    pub fn finish_refresh(&mut self) {
        if self.state == SchedulerState::Refreshing {
            self.start();
        }
    }

    /// Replaces the interval and restarts the countdown with it.
    pub fn set_interval(&mut self, interval_secs: u64) -> Result<(), SchedulerError> {
        if interval_secs == 0 {
            return Err(SchedulerError::ZeroInterval);
        }
        self.interval_secs = interval_secs;
        self.start();
        Ok(())
    }

    pub fn remaining_secs(&self) -> u64 {
        match self.state {
            SchedulerState::Idle => self.interval_secs,
            SchedulerState::Counting { remaining_secs } => remaining_secs,
            SchedulerState::Refreshing => 0,
        }
    }

    pub fn countdown_text(&self) -> String {
        format_countdown(self.remaining_secs())
    }
}

/// `MM:SS`; minutes keep growing past two digits instead of wrapping.
pub fn format_countdown(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[derive(Debug)]
pub enum RefreshCommand {
    RefreshNow,
    SetInterval {
        secs: u64,
        reply: oneshot::Sender<Result<u64, SchedulerError>>,
    },
    Shutdown,
}

/// Cloneable sender side of the refresh loop's command channel.
#[derive(Debug, Clone)]
pub struct RefreshControl {
    tx: mpsc::Sender<RefreshCommand>,
}

impl RefreshControl {
    pub fn channel() -> (Self, mpsc::Receiver<RefreshCommand>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        (Self { tx }, rx)
    }

    pub async fn refresh_now(&self) -> Result<(), SchedulerError> {
        self.tx
            .send(RefreshCommand::RefreshNow)
            .await
            .map_err(|_| SchedulerError::LoopStopped)
    }

    pub async fn set_interval(&self, secs: u64) -> Result<u64, SchedulerError> {
        if secs == 0 {
            return Err(SchedulerError::ZeroInterval);
        }
        let (reply, response) = oneshot::channel();
        self.tx
            .send(RefreshCommand::SetInterval { secs, reply })
            .await
            .map_err(|_| SchedulerError::LoopStopped)?;
        response.await.map_err(|_| SchedulerError::LoopStopped)?
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(RefreshCommand::Shutdown).await;
    }
}

pub struct RefreshLoopHandle {
    pub control: RefreshControl,
    join: JoinHandle<()>,
}

impl RefreshLoopHandle {
    /// Stops the countdown and waits for any in-flight fetch to finish.
    pub async fn shutdown(self) {
        self.control.shutdown().await;
        if let Err(err) = self.join.await {
            log_refresh_loop_join_error(&err);
        }
    }
}

struct RefreshLoop<F> {
    dashboard: DashboardHandle,
    fetcher: F,
    prefs: Arc<dyn PreferenceStore>,
    csv_url: String,
    scheduler: RefreshScheduler,
}

pub fn spawn_refresh_loop<F: CsvFetcher>(
    dashboard: DashboardHandle,
    fetcher: F,
    prefs: Arc<dyn PreferenceStore>,
    csv_url: impl Into<String>,
    scheduler: RefreshScheduler,
) -> RefreshLoopHandle {
    let (control, commands) = RefreshControl::channel();
    let refresh_loop = RefreshLoop {
        dashboard,
        fetcher,
        prefs,
        csv_url: csv_url.into(),
        scheduler,
    };
    let join = tokio::spawn(refresh_loop.run(commands));
    RefreshLoopHandle { control, join }
}

impl<F: CsvFetcher> RefreshLoop<F> {
    async fn run(mut self, mut commands: mpsc::Receiver<RefreshCommand>) {
        log_refresh_loop_started(self.scheduler.interval_secs());

        self.dashboard
            .set_refresh_interval(self.scheduler.interval_secs());
        self.refresh_once().await;
        self.scheduler.start();
        self.publish_countdown();

        let mut ticker = interval_at(Instant::now() + TICK, TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.scheduler.tick() == TickOutcome::Expired {
                        self.publish_countdown();
                        self.refresh_once().await;
                        self.scheduler.finish_refresh();
                    }
                    self.publish_countdown();
                }
                command = commands.recv() => match command {
                    Some(RefreshCommand::RefreshNow) => {
                        self.refresh_once().await;
                        self.scheduler.start();
                        ticker.reset();
                        self.publish_countdown();
                    }
                    Some(RefreshCommand::SetInterval { secs, reply }) => {
                        let result = self.change_interval(secs);
                        ticker.reset();
                        self.publish_countdown();
                        let _ = reply.send(result);
                    }
                    Some(RefreshCommand::Shutdown) | None => break,
                },
            }
        }

        log_refresh_loop_stopped();
    }

    async fn refresh_once(&mut self) {
        let started = StdInstant::now();
        let now_ms = Utc::now().timestamp_millis();

        match fetch_sales_records(&self.fetcher, &self.csv_url, now_ms).await {
            Ok(records) => {
                let rows = records.len();
                self.dashboard.apply_records(records);
                log_source_refresh_ok(rows, started.elapsed().as_millis() as u64);
            }
            Err(err) => {
                log_source_refresh_error(&self.csv_url, &err);
            }
        }
    }

    fn change_interval(&mut self, secs: u64) -> Result<u64, SchedulerError> {
        self.scheduler.set_interval(secs)?;
        self.dashboard.set_refresh_interval(secs);

        if let Err(err) = save_refresh_interval(self.prefs.as_ref(), secs) {
            log_refresh_interval_persist_error(secs, &err);
        }

        log_refresh_interval_changed(secs);
        Ok(secs)
    }

    fn publish_countdown(&self) {
        let text = self.scheduler.countdown_text();
        log_countdown(&text);
        self.dashboard.set_countdown(&text);
    }
}
