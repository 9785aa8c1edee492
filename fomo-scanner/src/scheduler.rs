//! Background refresh loop.
//!
//! Drives Filter → Score → Publish on a fixed interval. A failed cycle keeps
//! the current generation and waits the error backoff; an empty cycle keeps
//! it and waits the normal interval. Every sleep races the stop signal.
//!
//! ```text
//! start ─► [initial delay] ─► refresh ─┬─ published ─► sleep(interval) ─┐
//!                               ▲      ├─ empty ─────► sleep(interval) ─┤
//!                               │      └─ failed ────► sleep(backoff) ──┤
//!                               └───────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use fomo_common::config::ScannerConfig;
use fomo_common::logging::generate_trace_id;
use fomo_common::{Error, Result, ResultExt};

use crate::batch::BatchScorer;
use crate::cache::RankedCache;
use crate::clock::Clock;
use crate::filter::CandidateFilter;

/// Loop timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerTiming {
    pub interval: Duration,
    pub error_backoff: Duration,
    pub initial_delay: Duration,
    pub cycle_timeout: Duration,
}

impl SchedulerTiming {
    pub fn from_config(config: &ScannerConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.refresh_interval_secs),
            error_backoff: Duration::from_secs(config.error_backoff_secs),
            initial_delay: Duration::from_secs(config.initial_delay_secs),
            cycle_timeout: Duration::from_secs(config.cycle_timeout_secs),
        }
    }

    /// Wait before the next cycle. Transient failures retry after the
    /// backoff; anything else waits a full interval.
    pub fn pause_after(&self, result: &Result<CycleOutcome>) -> Duration {
        match result {
            Err(e) if e.is_transient() => self.error_backoff,
            _ => self.interval,
        }
    }
}

/// Scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    /// Loop not started
    Idle,
    /// Loop running
    Running,
    /// Loop exited after a stop request
    Stopped,
}

/// Events emitted by the refresh loop
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshEvent {
    Started,
    /// A new generation was published
    Refreshed {
        run_id: String,
        count: usize,
        generation_id: u64,
    },
    /// The cycle produced nothing; the previous generation stays
    EmptyResult { run_id: String },
    Failed { run_id: String, error: String },
    Stopped,
}

/// Outcome of one refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Published { count: usize },
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    pub interval_secs: u64,
    pub cycles_completed: u64,
    pub consecutive_failures: u32,
    pub last_run_id: Option<String>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_count: usize,
}

struct SchedulerInner {
    filter: CandidateFilter,
    scorer: BatchScorer,
    cache: Arc<RankedCache>,
    clock: Arc<dyn Clock>,
    timing: SchedulerTiming,
    state: RwLock<SchedulerState>,
    status: RwLock<SchedulerStatus>,
    /// Serializes scheduled and forced refreshes
    refresh_lock: Mutex<()>,
    stop_tx: watch::Sender<bool>,
    event_tx: broadcast::Sender<RefreshEvent>,
}

/// Owns the refresh loop and its handle on the cache. Cheap to clone.
#[derive(Clone)]
pub struct RefreshScheduler {
    inner: Arc<SchedulerInner>,
}

async fn stop_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

impl RefreshScheduler {
    pub fn new(
        filter: CandidateFilter,
        scorer: BatchScorer,
        cache: Arc<RankedCache>,
        clock: Arc<dyn Clock>,
        timing: SchedulerTiming,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        let (stop_tx, _) = watch::channel(false);

        let status = SchedulerStatus {
            state: SchedulerState::Idle,
            interval_secs: timing.interval.as_secs(),
            cycles_completed: 0,
            consecutive_failures: 0,
            last_run_id: None,
            last_success: None,
            last_error: None,
            last_count: 0,
        };

        Self {
            inner: Arc::new(SchedulerInner {
                filter,
                scorer,
                cache,
                clock,
                timing,
                state: RwLock::new(SchedulerState::Idle),
                status: RwLock::new(status),
                refresh_lock: Mutex::new(()),
                stop_tx,
                event_tx,
            }),
        }
    }

    pub fn cache(&self) -> &Arc<RankedCache> {
        &self.inner.cache
    }

    /// Subscribe to refresh events
    pub fn subscribe(&self) -> broadcast::Receiver<RefreshEvent> {
        self.inner.event_tx.subscribe()
    }

    pub async fn state(&self) -> SchedulerState {
        *self.inner.state.read().await
    }

    pub async fn status(&self) -> SchedulerStatus {
        let mut status = self.inner.status.read().await.clone();
        status.state = self.state().await;
        status
    }

    fn emit(&self, event: RefreshEvent) {
        // No subscribers is fine
        let _ = self.inner.event_tx.send(event);
    }

    /// Spawn the loop on the current runtime.
    pub fn start(&self) -> JoinHandle<()> {
        self.inner.stop_tx.send_replace(false);
        let this = self.clone();
        tokio::spawn(async move { this.run().await })
    }

    /// Ask the loop to exit at its next await point.
    pub fn stop(&self) {
        self.inner.stop_tx.send_replace(true);
        info!("Refresh loop stopping...");
    }

    /// Run the loop until stopped.
    pub async fn run(&self) {
        {
            let mut state = self.inner.state.write().await;
            if *state == SchedulerState::Running {
                warn!("Refresh loop already running");
                return;
            }
            *state = SchedulerState::Running;
        }

        let timing = self.inner.timing;
        let mut stop_rx = self.inner.stop_tx.subscribe();
        self.emit(RefreshEvent::Started);
        info!(
            interval_secs = timing.interval.as_secs(),
            initial_delay_secs = timing.initial_delay.as_secs(),
            "Refresh loop started"
        );

        let mut stopped = false;
        if !timing.initial_delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(timing.initial_delay) => {}
                _ = stop_requested(&mut stop_rx) => stopped = true,
            }
        }

        while !stopped {
            let pause = tokio::select! {
                result = self.refresh_once() => timing.pause_after(&result),
                _ = stop_requested(&mut stop_rx) => break,
            };

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = stop_requested(&mut stop_rx) => stopped = true,
            }
        }

        *self.inner.state.write().await = SchedulerState::Stopped;
        self.emit(RefreshEvent::Stopped);
        info!("Refresh loop stopped");
    }

    /// Run one refresh cycle now, waiting for any cycle in progress.
    ///
    /// Returns true when a new generation was published.
    pub async fn force_refresh(&self) -> bool {
        info!("Forced refresh requested");
        matches!(self.refresh_once().await, Ok(CycleOutcome::Published { .. }))
    }

    /// Filter, score, and publish once.
    pub async fn refresh_once(&self) -> Result<CycleOutcome> {
        let _guard = self.inner.refresh_lock.lock().await;
        let run_id = generate_trace_id();
        debug!(run_id = %run_id, "Refresh cycle starting");

        let work = async {
            let candidates = self.inner.filter.run().await.context("candidate filter")?;
            if candidates.is_empty() {
                return Ok(Vec::new());
            }
            Ok::<_, Error>(self.inner.scorer.score_all(candidates).await)
        };

        let result = match tokio::time::timeout(self.inner.timing.cycle_timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout),
        };

        match result {
            Ok(scored) if scored.is_empty() => {
                warn!(run_id = %run_id, "Refresh produced no opportunities, keeping current generation");
                self.record(&run_id, None, 0).await;
                self.emit(RefreshEvent::EmptyResult { run_id });
                Ok(CycleOutcome::Empty)
            }
            Ok(scored) => {
                self.inner.cache.publish(scored);
                let stats = self.inner.cache.stats();
                info!(
                    run_id = %run_id,
                    count = stats.count,
                    generation_id = stats.generation_id,
                    "Refresh complete"
                );
                self.record(&run_id, None, stats.count).await;
                self.emit(RefreshEvent::Refreshed {
                    run_id,
                    count: stats.count,
                    generation_id: stats.generation_id,
                });
                Ok(CycleOutcome::Published { count: stats.count })
            }
            Err(e) => {
                error!(run_id = %run_id, error = %e, "Refresh cycle failed");
                self.record(&run_id, Some(e.to_string()), 0).await;
                self.emit(RefreshEvent::Failed {
                    run_id,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn record(&self, run_id: &str, failure: Option<String>, count: usize) {
        let mut status = self.inner.status.write().await;
        status.cycles_completed += 1;
        status.last_run_id = Some(run_id.to_string());

        match failure {
            Some(message) => {
                status.consecutive_failures += 1;
                status.last_error = Some(message);
            }
            None => {
                status.consecutive_failures = 0;
                status.last_success = Some(self.inner.clock.now());
                if count > 0 {
                    status.last_count = count;
                }
            }
        }
    }
}
