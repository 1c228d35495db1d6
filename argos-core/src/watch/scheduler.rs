use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use argos_domain::config::ArgosConfig;
use argos_domain::watch::evaluation::Evaluation;

use super::engine::{CancelFlag, EngineError, WatchEngine};

/// Receives the action identifiers emitted by a transition.
///
/// Resolution and execution are the receiver's concern; a failing sink
/// never rolls back the already-persisted transition.
pub trait ActionSink: Send + Sync {
    fn dispatch(&self, evaluation: &Evaluation);
}

/// Sink for deployments without an action resolver: transitions are only
/// logged.
pub struct LogSink;

impl ActionSink for LogSink {
    fn dispatch(&self, evaluation: &Evaluation) {
        info!(
            watch = %evaluation.watch_name,
            state = %evaluation.state,
            actions = ?evaluation.actions,
            "actions emitted"
        );
    }
}

/// Drives periodic evaluation of every registered watch.
///
/// Each pass asks the engine for the current watches and evaluates the ones
/// whose period has elapsed since their persisted `last_evaluated`. Due-ness
/// is derived from persisted state, so a restarted process resumes the
/// cadence where it left off; a watch that missed several periods is
/// evaluated once, not once per missed period.
pub struct WatchScheduler {
    engine: Arc<WatchEngine>,
    sink: Arc<dyn ActionSink>,
    tick: Duration,
}

impl WatchScheduler {
    /// Creates a scheduler with the configured tick and a logging sink.
    pub fn new(engine: Arc<WatchEngine>) -> Self {
        Self {
            engine,
            sink: Arc::new(LogSink),
            tick: ArgosConfig::get().scheduler_tick(),
        }
    }

    /// Replaces the action sink.
    pub fn with_sink(mut self, sink: Arc<dyn ActionSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Overrides the pass interval.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Names of the watches due for evaluation at `now`.
    pub fn due_watches(&self, now: DateTime<Utc>) -> Vec<String> {
        match self.engine.list_watches() {
            Ok(watches) => watches
                .into_iter()
                .filter(|(rule, runtime)| now - runtime.last_evaluated >= rule.period_chrono())
                .map(|(rule, _)| rule.name)
                .collect(),
            Err(e) => {
                warn!(error = %e, "could not list watches, skipping pass");
                Vec::new()
            }
        }
    }

    /// Runs a single scheduling pass at `now` and returns the evaluations
    /// that ran. Emitted actions are handed to the sink.
    pub fn tick_once(&self, now: DateTime<Utc>, cancel: &CancelFlag) -> Vec<Evaluation> {
        let mut evaluations = Vec::new();
        for name in self.due_watches(now) {
            if cancel.is_cancelled() {
                break;
            }
            match self.engine.evaluate_with_cancel(&name, now, cancel) {
                Ok(evaluation) => {
                    if !evaluation.actions.is_empty() {
                        self.sink.dispatch(&evaluation);
                    }
                    evaluations.push(evaluation);
                }
                // Quarantined watches are filtered out of listings; seeing
                // one here means it was poisoned mid-pass.
                Err(EngineError::Quarantined(name, reason)) => {
                    warn!(watch = %name, reason = %reason, "watch quarantined, skipping");
                }
                Err(e) => {
                    warn!(error = %e, "evaluation failed, will retry next pass");
                }
            }
        }
        evaluations
    }

    /// Starts the scheduling loop on a background thread.
    pub fn spawn(self) -> SchedulerHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let cancel = CancelFlag::new();

        let loop_stop = Arc::clone(&stop);
        let loop_cancel = cancel.clone();
        let tick = self.tick;
        let thread = thread::Builder::new()
            .name("argos-scheduler".into())
            .spawn(move || {
                debug!(tick_ms = tick.as_millis() as u64, "scheduler started");
                while !loop_stop.load(Ordering::SeqCst) {
                    let ran = self.tick_once(Utc::now(), &loop_cancel);
                    if !ran.is_empty() {
                        debug!(evaluated = ran.len(), "scheduler pass complete");
                    }
                    thread::sleep(tick);
                }
                debug!("scheduler stopped");
            })
            .expect("failed to spawn scheduler thread");

        SchedulerHandle {
            stop,
            cancel,
            thread,
        }
    }
}

/// Handle to a running scheduler loop.
pub struct SchedulerHandle {
    stop: Arc<AtomicBool>,
    cancel: CancelFlag,
    thread: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signals the loop to stop, cancels any in-flight evaluation, and
    /// waits for the thread to exit.
    pub fn stop(self) {
        self.stop.store(true, Ordering::SeqCst);
        self.cancel.cancel();
        let _ = self.thread.join();
    }
}
